pub mod domain {
    pub mod entities {
        pub mod emojis;
        pub mod profiles;
        pub mod subscriptions;
    }

    pub mod repositories {
        pub mod emojis;
        pub mod generation;
        pub mod identity;
        pub mod profiles;
        pub mod storage;
        pub mod subscriptions;
    }

    pub mod value_objects {
        pub mod emojis;
        pub mod entitlements;
        pub mod generation;
        pub mod identity;
        pub mod plans;
        pub mod profiles;
        pub mod subscriptions;

        pub mod enums {
            pub mod plan_tiers;
            pub mod subscription_statuses;
        }
    }
}

pub mod infra {
    pub mod db {
        pub mod postgres {
            pub mod postgres_connection;
            pub mod schema;
        }

        pub mod repositories {
            pub mod emojis;
            pub mod profiles;
            pub mod subscriptions;
        }
    }

    pub mod identity {
        pub mod supabase_auth;
    }

    pub mod storages {
        pub mod supabase_storage;
    }
}

pub mod generation {
    pub mod openai_client;
}

pub mod payments {
    pub mod stripe_client;
}

pub mod observability;
