use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    entities::{emojis::InsertEmojiEntity, profiles::ProfileEntity},
    repositories::{
        emojis::EmojiRepository,
        generation::{GenerationFailure, ImageGenerator},
        profiles::ProfileRepository,
        storage::EmojiStorageClient,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        emojis::{EmojiDto, GeneratedEmojiDto, emoji_object_key, normalize_description},
        entitlements::{available_credits, can_generate},
        generation::GenerationState,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::credits::CreditConsumptionService;

pub const CREDIT_WARNING: &str = "Emoji saved, but your credit usage could not be updated";

#[derive(Debug, Error)]
pub enum EmojiError {
    #[error("{0}")]
    InvalidDescription(String),
    #[error("An OpenAI API key is required to generate emojis")]
    CredentialRequired,
    #[error("You have no credits left for this billing period")]
    NoCredits,
    #[error("OpenAI API key not configured or invalid")]
    InvalidCredential,
    #[error("{0}")]
    ProviderRejected(String),
    #[error("Failed to generate emoji")]
    ProviderUnavailable,
    #[error("Emoji not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EmojiError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            EmojiError::InvalidDescription(_) => StatusCode::BAD_REQUEST,
            EmojiError::CredentialRequired | EmojiError::InvalidCredential => {
                StatusCode::PRECONDITION_REQUIRED
            }
            EmojiError::NoCredits => StatusCode::PAYMENT_REQUIRED,
            EmojiError::ProviderRejected(_) | EmojiError::ProviderUnavailable => {
                StatusCode::BAD_GATEWAY
            }
            EmojiError::NotFound => StatusCode::NOT_FOUND,
            EmojiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason for the states a client must react to.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            EmojiError::CredentialRequired => Some("credential_required"),
            EmojiError::InvalidCredential => Some("invalid_credential"),
            EmojiError::NoCredits => Some("no_credits"),
            _ => None,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EmojiError>;

pub struct EmojiUseCase<S, P, E, St, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
    E: EmojiRepository + Send + Sync + 'static,
    St: EmojiStorageClient + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    profile_repo: Arc<P>,
    emoji_repo: Arc<E>,
    storage: Arc<St>,
    generator: Arc<G>,
    credits: CreditConsumptionService<S>,
    default_api_key: Option<String>,
}

impl<S, P, E, St, G> EmojiUseCase<S, P, E, St, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
    E: EmojiRepository + Send + Sync + 'static,
    St: EmojiStorageClient + Send + Sync + 'static,
    G: ImageGenerator + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        profile_repo: Arc<P>,
        emoji_repo: Arc<E>,
        storage: Arc<St>,
        generator: Arc<G>,
        default_api_key: Option<String>,
    ) -> Self {
        Self {
            credits: CreditConsumptionService::new(Arc::clone(&subscription_repo)),
            subscription_repo,
            profile_repo,
            emoji_repo,
            storage,
            generator,
            default_api_key: default_api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub async fn generate(&self, user_id: Uuid, raw_description: &str) -> UseCaseResult<GeneratedEmojiDto> {
        let description = normalize_description(raw_description).map_err(|message| {
            info!(%user_id, state = %GenerationState::Idle, "emojis: description rejected");
            EmojiError::InvalidDescription(message)
        })?;
        enter(user_id, GenerationState::Checking);

        let Some(api_key) = self.resolve_api_key(user_id).await? else {
            enter(user_id, GenerationState::AwaitingCredential);
            return Err(EmojiError::CredentialRequired);
        };

        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "emojis: failed to load subscription");
                EmojiError::Internal(err)
            })?;

        if !can_generate(subscription.as_ref(), Utc::now()) {
            enter(user_id, GenerationState::Blocked);
            return Err(EmojiError::NoCredits);
        }

        enter(user_id, GenerationState::Generating);
        let image = self
            .generator
            .generate_emoji(&api_key, &description)
            .await
            .map_err(|failure| {
                enter(user_id, GenerationState::Error);
                warn!(%user_id, failure = %failure, "emojis: generation provider failed");
                match failure {
                    GenerationFailure::InvalidCredential => EmojiError::InvalidCredential,
                    GenerationFailure::Rejected(message) => EmojiError::ProviderRejected(message),
                    GenerationFailure::Transport(_) => EmojiError::ProviderUnavailable,
                }
            })?;

        enter(user_id, GenerationState::Persisting);
        let object_key = emoji_object_key(user_id, &description, Utc::now());
        let stored = self
            .storage
            .upload_emoji(&object_key, image.bytes, &image.content_type)
            .await
            .map_err(|err| {
                enter(user_id, GenerationState::Error);
                error!(%user_id, %object_key, storage_error = ?err, "emojis: upload failed");
                EmojiError::Internal(err)
            })?;

        let inserted = self
            .emoji_repo
            .insert(InsertEmojiEntity {
                user_id,
                description,
                image_url: stored.public_url.clone(),
                storage_path: stored.object_key.clone(),
                revised_prompt: image.revised_prompt,
            })
            .await;

        let emoji = match inserted {
            Ok(emoji) => emoji,
            Err(err) => {
                enter(user_id, GenerationState::Error);
                error!(%user_id, object_key = %stored.object_key, db_error = ?err, "emojis: failed to save emoji row");
                if let Err(cleanup_err) = self.storage.delete_object(&stored.object_key).await {
                    warn!(
                        %user_id,
                        object_key = %stored.object_key,
                        storage_error = ?cleanup_err,
                        "emojis: failed to remove orphaned upload"
                    );
                }
                return Err(EmojiError::Internal(err));
            }
        };

        let (credits_used, available, warning) = match self.credits.consume(user_id).await {
            Ok(credits_used) => {
                let available = subscription.map(|mut row| {
                    row.credits_used = credits_used;
                    available_credits(Some(&row), Utc::now())
                });
                (Some(credits_used), available, None)
            }
            Err(err) => {
                warn!(%user_id, emoji_id = %emoji.id, error = ?err, "emojis: credit consumption failed after save");
                (None, None, Some(CREDIT_WARNING.to_string()))
            }
        };

        enter(user_id, GenerationState::Done);
        info!(%user_id, emoji_id = %emoji.id, ?credits_used, "emojis: emoji generated");

        Ok(GeneratedEmojiDto {
            emoji: emoji.into(),
            credits_used,
            available_credits: available,
            warning,
        })
    }

    pub async fn list_emojis(&self, user_id: Uuid) -> UseCaseResult<Vec<EmojiDto>> {
        let emojis = self.emoji_repo.list_by_user(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "emojis: failed to list gallery");
            EmojiError::Internal(err)
        })?;

        info!(%user_id, count = emojis.len(), "emojis: gallery loaded");
        Ok(emojis.into_iter().map(EmojiDto::from).collect())
    }

    pub async fn get_emoji(&self, user_id: Uuid, emoji_id: Uuid) -> UseCaseResult<EmojiDto> {
        self.emoji_repo
            .find_for_user(emoji_id, user_id)
            .await
            .map_err(EmojiError::Internal)?
            .map(EmojiDto::from)
            .ok_or(EmojiError::NotFound)
    }

    /// Blob first, then the row.
    pub async fn delete_emoji(&self, user_id: Uuid, emoji_id: Uuid) -> UseCaseResult<()> {
        let emoji = self
            .emoji_repo
            .find_for_user(emoji_id, user_id)
            .await
            .map_err(EmojiError::Internal)?
            .ok_or(EmojiError::NotFound)?;

        self.storage
            .delete_object(&emoji.storage_path)
            .await
            .map_err(|err| {
                error!(%user_id, %emoji_id, storage_error = ?err, "emojis: failed to delete blob");
                EmojiError::Internal(err)
            })?;

        self.emoji_repo.delete(emoji_id).await.map_err(|err| {
            error!(%user_id, %emoji_id, db_error = ?err, "emojis: failed to delete row");
            EmojiError::Internal(err)
        })?;

        info!(%user_id, %emoji_id, "emojis: emoji deleted");
        Ok(())
    }

    async fn resolve_api_key(&self, user_id: Uuid) -> UseCaseResult<Option<String>> {
        let profile = self
            .profile_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "emojis: failed to load profile");
                EmojiError::Internal(err)
            })?;

        Ok(profile
            .as_ref()
            .and_then(ProfileEntity::api_key)
            .map(str::to_string)
            .or_else(|| self.default_api_key.clone()))
    }
}

fn enter(user_id: Uuid, state: GenerationState) {
    info!(%user_id, %state, "emojis: generation state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{
        InMemoryEmojis, InMemoryProfiles, InMemorySubscriptions, InMemoryStorage, StubGenerator,
        subscription_row,
    };
    use crates::domain::value_objects::{
        entitlements::AvailableCredits, enums::plan_tiers::PlanTier,
    };

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

    struct Harness {
        subscriptions: Arc<InMemorySubscriptions>,
        emojis: Arc<InMemoryEmojis>,
        storage: Arc<InMemoryStorage>,
        generator: Arc<StubGenerator>,
        usecase: EmojiUseCase<InMemorySubscriptions, InMemoryProfiles, InMemoryEmojis, InMemoryStorage, StubGenerator>,
    }

    fn harness(
        subscriptions: InMemorySubscriptions,
        profiles: InMemoryProfiles,
        emojis: InMemoryEmojis,
        storage: InMemoryStorage,
        generator: StubGenerator,
    ) -> Harness {
        let subscriptions = Arc::new(subscriptions);
        let emojis = Arc::new(emojis);
        let storage = Arc::new(storage);
        let generator = Arc::new(generator);
        let usecase = EmojiUseCase::new(
            Arc::clone(&subscriptions),
            Arc::new(profiles),
            Arc::clone(&emojis),
            Arc::clone(&storage),
            Arc::clone(&generator),
            None,
        );
        Harness {
            subscriptions,
            emojis,
            storage,
            generator,
            usecase,
        }
    }

    fn free_user(credits_used: i32) -> (Uuid, InMemorySubscriptions, InMemoryProfiles) {
        let user_id = Uuid::new_v4();
        (
            user_id,
            InMemorySubscriptions::with(vec![subscription_row(user_id, PlanTier::Free, credits_used)]),
            InMemoryProfiles::with_key(user_id, "sk-user"),
        )
    }

    #[tokio::test]
    async fn happy_path_stores_emoji_and_consumes_one_credit() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        let result = h.usecase.generate(user_id, "  happy cat  ").await.unwrap();

        assert_eq!(result.credits_used, Some(1));
        assert_eq!(result.available_credits, Some(AvailableCredits::Limited(9)));
        assert!(result.warning.is_none());
        assert_eq!(result.emoji.description, "happy cat");
        assert_eq!(h.subscriptions.get(user_id).unwrap().credits_used, 1);

        let rows = h.emojis.all();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].storage_path.starts_with(&format!("{user_id}/happy-cat-")));
        assert_eq!(h.storage.object(&rows[0].storage_path).as_deref(), Some(PNG));
        assert_eq!(rows[0].revised_prompt.as_deref(), Some("a revised prompt"));
    }

    #[tokio::test]
    async fn saved_emoji_reads_back_with_same_description_and_bytes() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let image: &[u8] = b"\x89PNG\r\n\x1a\nround-trip-bytes";
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(image),
        );

        let created = h.usecase.generate(user_id, "rocket taco").await.unwrap();

        let fetched = h.usecase.get_emoji(user_id, created.emoji.id).await.unwrap();
        assert_eq!(fetched.description, "rocket taco");
        assert_eq!(h.storage.fetch(&fetched.image_url).as_deref(), Some(image));

        let gallery = h.usecase.list_emojis(user_id).await.unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].id, created.emoji.id);
        assert_eq!(gallery[0].description, "rocket taco");
        assert_eq!(h.storage.fetch(&gallery[0].image_url).as_deref(), Some(image));
    }

    #[tokio::test]
    async fn exhausted_plan_is_blocked_without_provider_call() {
        let (user_id, subscriptions, profiles) = free_user(10);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        let err = h.usecase.generate(user_id, "happy cat").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.reason(), Some("no_credits"));
        assert_eq!(h.generator.call_count(), 0);
        assert!(h.emojis.all().is_empty());
    }

    #[tokio::test]
    async fn missing_subscription_is_blocked() {
        let user_id = Uuid::new_v4();
        let h = harness(
            InMemorySubscriptions::default(),
            InMemoryProfiles::with_key(user_id, "sk-user"),
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        assert!(matches!(
            h.usecase.generate(user_id, "cat").await,
            Err(EmojiError::NoCredits)
        ));
    }

    #[tokio::test]
    async fn invalid_description_fails_before_any_call() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        let too_long = "x".repeat(201);
        for description in ["   ", too_long.as_str()] {
            let err = h.usecase.generate(user_id, description).await.unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        }
        assert_eq!(h.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credential_asks_for_one() {
        let (user_id, subscriptions, _) = free_user(0);
        let h = harness(
            subscriptions,
            InMemoryProfiles::default(),
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        let err = h.usecase.generate(user_id, "cat").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(err.reason(), Some("credential_required"));
        assert_eq!(h.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn server_default_key_is_used_when_profile_has_none() {
        let (user_id, subscriptions, _) = free_user(0);
        let generator = Arc::new(StubGenerator::succeeding(PNG));
        let usecase = EmojiUseCase::new(
            Arc::new(subscriptions),
            Arc::new(InMemoryProfiles::default()),
            Arc::new(InMemoryEmojis::default()),
            Arc::new(InMemoryStorage::default()),
            Arc::clone(&generator),
            Some("sk-server".to_string()),
        );

        assert!(usecase.generate(user_id, "cat").await.is_ok());
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn provider_failure_consumes_nothing() {
        let (user_id, subscriptions, profiles) = free_user(3);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::failing(GenerationFailure::Rejected(
                "Your request was rejected by our safety system.".to_string(),
            )),
        );

        let err = h.usecase.generate(user_id, "cat").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Your request was rejected by our safety system.");
        assert_eq!(h.subscriptions.get(user_id).unwrap().credits_used, 3);
        assert!(h.emojis.all().is_empty());
        assert_eq!(h.storage.len(), 0);
    }

    #[tokio::test]
    async fn rejected_credential_redirects_to_credential_flow() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::failing(GenerationFailure::InvalidCredential),
        );

        let err = h.usecase.generate(user_id, "cat").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(err.to_string(), "OpenAI API key not configured or invalid");
        assert_eq!(h.subscriptions.get(user_id).unwrap().credits_used, 0);
    }

    #[tokio::test]
    async fn upload_failure_saves_nothing() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::failing_uploads(),
            StubGenerator::succeeding(PNG),
        );

        let err = h.usecase.generate(user_id, "cat").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(h.emojis.all().is_empty());
        assert_eq!(h.subscriptions.get(user_id).unwrap().credits_used, 0);
    }

    #[tokio::test]
    async fn insert_failure_removes_orphaned_upload() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::failing_inserts(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        assert!(h.usecase.generate(user_id, "cat").await.is_err());
        assert_eq!(h.storage.len(), 0);
        assert_eq!(h.subscriptions.get(user_id).unwrap().credits_used, 0);
    }

    #[tokio::test]
    async fn credit_write_failure_returns_warning() {
        let user_id = Uuid::new_v4();
        let h = harness(
            InMemorySubscriptions::with(vec![subscription_row(user_id, PlanTier::Pro, 5)]).failing_writes(),
            InMemoryProfiles::with_key(user_id, "sk-user"),
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );

        let result = h.usecase.generate(user_id, "cat").await.unwrap();

        assert_eq!(result.warning.as_deref(), Some(CREDIT_WARNING));
        assert!(result.credits_used.is_none());
        assert_eq!(h.emojis.all().len(), 1);
    }

    #[tokio::test]
    async fn gallery_is_scoped_to_owner() {
        let (user_id, subscriptions, profiles) = free_user(0);
        let h = harness(
            subscriptions,
            profiles,
            InMemoryEmojis::default(),
            InMemoryStorage::default(),
            StubGenerator::succeeding(PNG),
        );
        let created = h.usecase.generate(user_id, "cat").await.unwrap().emoji;
        let stranger = Uuid::new_v4();

        assert_eq!(h.usecase.list_emojis(user_id).await.unwrap().len(), 1);
        assert!(h.usecase.list_emojis(stranger).await.unwrap().is_empty());
        assert!(matches!(
            h.usecase.get_emoji(stranger, created.id).await,
            Err(EmojiError::NotFound)
        ));
        assert!(matches!(
            h.usecase.delete_emoji(stranger, created.id).await,
            Err(EmojiError::NotFound)
        ));

        h.usecase.delete_emoji(user_id, created.id).await.unwrap();

        assert!(h.emojis.all().is_empty());
        assert_eq!(h.storage.len(), 0);
    }
}
