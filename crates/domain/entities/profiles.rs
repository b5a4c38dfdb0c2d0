use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::profiles;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = profiles)]
pub struct ProfileEntity {
    pub id: Uuid,
    pub generation_api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileEntity {
    pub fn api_key(&self) -> Option<&str> {
        self.generation_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = profiles, treat_none_as_null = true)]
pub struct UpsertProfileEntity {
    pub id: Uuid,
    pub generation_api_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}
