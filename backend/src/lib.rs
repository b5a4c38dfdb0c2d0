pub mod auth;

pub mod config {
    pub mod config_loader;
    pub mod config_model;
    pub mod stage;
}

pub mod axum_http {
    pub mod default_routers;
    pub mod error_responses;
    pub mod http_serve;

    pub mod routers {
        pub mod emojis;
        pub mod identity;
        pub mod profiles;
        pub mod subscriptions;
        pub mod webhooks;
    }
}

pub mod usecases {
    pub mod credits;
    pub mod emojis;
    pub mod identity;
    pub mod profiles;
    pub mod subscriptions;

    #[cfg(test)]
    pub(crate) mod test_support;
}
