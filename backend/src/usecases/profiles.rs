use std::sync::Arc;

use crates::domain::{
    entities::profiles::ProfileEntity,
    repositories::{generation::ImageGenerator, profiles::ProfileRepository},
    value_objects::profiles::{ApiKeySyncDto, CredentialSource, ProfileDto},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("API key must not be empty")]
    BlankApiKey,
    #[error("Invalid OpenAI API key")]
    InvalidApiKey,
    #[error("could not reach the generation provider to validate the key")]
    ValidationUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProfileError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ProfileError::BlankApiKey | ProfileError::InvalidApiKey => StatusCode::BAD_REQUEST,
            ProfileError::ValidationUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProfileError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ProfileError>;

fn summary(profile: Option<&ProfileEntity>) -> ProfileDto {
    ProfileDto {
        has_api_key: profile.and_then(ProfileEntity::api_key).is_some(),
        updated_at: profile.map(|p| p.updated_at),
    }
}

pub struct ProfileUseCase<P, G>
where
    P: ProfileRepository + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    profile_repo: Arc<P>,
    generator: Arc<G>,
}

impl<P, G> ProfileUseCase<P, G>
where
    P: ProfileRepository + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    pub fn new(profile_repo: Arc<P>, generator: Arc<G>) -> Self {
        Self {
            profile_repo,
            generator,
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> UseCaseResult<ProfileDto> {
        let profile = self
            .profile_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "profiles: failed to load profile");
                ProfileError::Internal(err)
            })?;

        Ok(summary(profile.as_ref()))
    }

    pub async fn set_api_key(&self, user_id: Uuid, api_key: &str) -> UseCaseResult<ProfileDto> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ProfileError::BlankApiKey);
        }

        let valid = self
            .generator
            .validate_api_key(api_key)
            .await
            .map_err(|err| {
                warn!(%user_id, error = ?err, "profiles: key validation unavailable");
                ProfileError::ValidationUnavailable(err)
            })?;

        if !valid {
            info!(%user_id, "profiles: rejected invalid api key");
            return Err(ProfileError::InvalidApiKey);
        }

        let stored = self.store(user_id, Some(api_key.to_string())).await?;
        info!(%user_id, "profiles: api key stored");
        Ok(summary(Some(&stored)))
    }

    pub async fn clear_api_key(&self, user_id: Uuid) -> UseCaseResult<ProfileDto> {
        let stored = self.store(user_id, None).await?;
        info!(%user_id, "profiles: api key cleared");
        Ok(summary(Some(&stored)))
    }

    /// The profile copy wins; a client-held key is adopted only when the profile has none.
    pub async fn sync_api_key(
        &self,
        user_id: Uuid,
        client_key: Option<&str>,
    ) -> UseCaseResult<ApiKeySyncDto> {
        if let Some(key) = self.credential_for(user_id).await? {
            return Ok(ApiKeySyncDto {
                source: CredentialSource::Profile,
                api_key: Some(key),
            });
        }

        match client_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => {
                self.store(user_id, Some(key.to_string())).await?;
                info!(%user_id, "profiles: adopted client api key into profile");
                Ok(ApiKeySyncDto {
                    source: CredentialSource::Client,
                    api_key: Some(key.to_string()),
                })
            }
            None => Ok(ApiKeySyncDto {
                source: CredentialSource::None,
                api_key: None,
            }),
        }
    }

    pub async fn credential_for(&self, user_id: Uuid) -> UseCaseResult<Option<String>> {
        let profile = self
            .profile_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "profiles: failed to load profile");
                ProfileError::Internal(err)
            })?;

        Ok(profile.as_ref().and_then(ProfileEntity::api_key).map(str::to_string))
    }

    async fn store(&self, user_id: Uuid, api_key: Option<String>) -> UseCaseResult<ProfileEntity> {
        self.profile_repo
            .upsert_api_key(user_id, api_key)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "profiles: failed to store api key");
                ProfileError::Internal(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{InMemoryProfiles, StubGenerator};
    use crates::domain::repositories::{
        generation::MockImageGenerator, profiles::MockProfileRepository,
    };

    fn usecase(profiles: InMemoryProfiles) -> (Arc<InMemoryProfiles>, ProfileUseCase<InMemoryProfiles, StubGenerator>) {
        let profiles = Arc::new(profiles);
        let usecase = ProfileUseCase::new(Arc::clone(&profiles), Arc::new(StubGenerator::succeeding(b"")));
        (profiles, usecase)
    }

    #[tokio::test]
    async fn sync_prefers_profile_key() {
        let user_id = Uuid::new_v4();
        let (profiles, usecase) = usecase(InMemoryProfiles::with_key(user_id, "sk-profile"));

        let synced = usecase.sync_api_key(user_id, Some("sk-client")).await.unwrap();

        assert_eq!(synced.source, CredentialSource::Profile);
        assert_eq!(synced.api_key.as_deref(), Some("sk-profile"));
        assert_eq!(profiles.key_of(user_id).as_deref(), Some("sk-profile"));
    }

    #[tokio::test]
    async fn sync_adopts_client_key_when_profile_is_empty() {
        let user_id = Uuid::new_v4();
        let (profiles, usecase) = usecase(InMemoryProfiles::default());

        let synced = usecase.sync_api_key(user_id, Some(" sk-client ")).await.unwrap();

        assert_eq!(synced.source, CredentialSource::Client);
        assert_eq!(profiles.key_of(user_id).as_deref(), Some("sk-client"));
    }

    #[tokio::test]
    async fn sync_without_any_key_reports_none() {
        let (_, usecase) = usecase(InMemoryProfiles::default());

        let synced = usecase.sync_api_key(Uuid::new_v4(), Some("  ")).await.unwrap();

        assert_eq!(synced.source, CredentialSource::None);
        assert!(synced.api_key.is_none());
    }

    #[tokio::test]
    async fn set_api_key_validates_before_storing() {
        let user_id = Uuid::new_v4();
        let (profiles, usecase) = usecase(InMemoryProfiles::default());

        assert!(matches!(
            usecase.set_api_key(user_id, "   ").await,
            Err(ProfileError::BlankApiKey)
        ));
        assert!(matches!(
            usecase.set_api_key(user_id, "not-a-key").await,
            Err(ProfileError::InvalidApiKey)
        ));
        assert!(profiles.key_of(user_id).is_none());

        let summary = usecase.set_api_key(user_id, "sk-valid").await.unwrap();
        assert!(summary.has_api_key);
        assert_eq!(profiles.key_of(user_id).as_deref(), Some("sk-valid"));

        let cleared = usecase.clear_api_key(user_id).await.unwrap();
        assert!(!cleared.has_api_key);
    }

    #[tokio::test]
    async fn validation_outage_is_bad_gateway() {
        let mut generator = MockImageGenerator::new();
        generator
            .expect_validate_api_key()
            .returning(|_| Err(anyhow::anyhow!("timeout")));
        let mut repo = MockProfileRepository::new();
        repo.expect_upsert_api_key().never();

        let usecase = ProfileUseCase::new(Arc::new(repo), Arc::new(generator));
        let err = usecase.set_api_key(Uuid::new_v4(), "sk-1").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
