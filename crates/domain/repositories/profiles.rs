use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::profiles::ProfileEntity;

#[automock]
#[async_trait]
pub trait ProfileRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<ProfileEntity>>;

    /// Upserts on the profile id. `None` clears the stored credential.
    async fn upsert_api_key(
        &self,
        user_id: Uuid,
        api_key: Option<String>,
    ) -> Result<ProfileEntity>;
}
