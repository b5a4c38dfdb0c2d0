use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    entities::profiles::ProfileEntity,
    repositories::{
        identity::{IdentityFailure, IdentityProvider},
        profiles::ProfileRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        entitlements::EntitlementSnapshot,
        identity::{AuthResponse, SessionContext},
        profiles::ProfileDto,
        subscriptions::SubscriptionDto,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Authentication service unavailable")]
    ProviderUnavailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IdentityError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            IdentityError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IdentityError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            IdentityError::ProviderUnavailable => StatusCode::BAD_GATEWAY,
            IdentityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<IdentityFailure> for IdentityError {
    fn from(failure: IdentityFailure) -> Self {
        match failure {
            IdentityFailure::InvalidCredentials(message) => IdentityError::InvalidCredentials(message),
            IdentityFailure::Provider(message) => {
                warn!(provider_error = %message, "identity: provider request failed");
                IdentityError::ProviderUnavailable
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, IdentityError>;

fn validate_credentials(email: &str, password: &str) -> UseCaseResult<()> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(IdentityError::InvalidInput("A valid email is required"));
    }
    if password.is_empty() {
        return Err(IdentityError::InvalidInput("Password is required"));
    }
    Ok(())
}

pub struct IdentityUseCase<I, S, P>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    identity: Arc<I>,
    subscription_repo: Arc<S>,
    profile_repo: Arc<P>,
}

impl<I, S, P> IdentityUseCase<I, S, P>
where
    I: IdentityProvider + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: ProfileRepository + Send + Sync + 'static,
{
    pub fn new(identity: Arc<I>, subscription_repo: Arc<S>, profile_repo: Arc<P>) -> Self {
        Self {
            identity,
            subscription_repo,
            profile_repo,
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> UseCaseResult<AuthResponse> {
        let email = email.trim();
        validate_credentials(email, password)?;

        let response = self.identity.sign_up(email, password).await?;
        info!(user_id = %response.user.id, confirmed = response.session.is_some(), "identity: user signed up");
        Ok(response)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> UseCaseResult<AuthResponse> {
        let email = email.trim();
        validate_credentials(email, password)?;

        let response = self.identity.sign_in(email, password).await?;
        info!(user_id = %response.user.id, "identity: user signed in");
        Ok(response)
    }

    /// Revokes the provider session; the next request has no context to rebuild.
    pub async fn sign_out(&self, user_id: Uuid, access_token: &str) -> UseCaseResult<()> {
        self.identity.sign_out(access_token).await?;
        info!(%user_id, "identity: user signed out");
        Ok(())
    }

    pub async fn session_context(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> UseCaseResult<SessionContext> {
        let profile = self
            .profile_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "identity: failed to load profile");
                IdentityError::Internal(err)
            })?;

        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "identity: failed to load subscription");
                IdentityError::Internal(err)
            })?;

        Ok(SessionContext {
            user_id,
            email,
            profile: ProfileDto {
                has_api_key: profile.as_ref().and_then(ProfileEntity::api_key).is_some(),
                updated_at: profile.as_ref().map(|p| p.updated_at),
            },
            entitlement: EntitlementSnapshot::evaluate(subscription.as_ref(), Utc::now()),
            subscription: subscription.map(SubscriptionDto::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::{InMemoryProfiles, InMemorySubscriptions, subscription_row};
    use crates::domain::{
        repositories::identity::MockIdentityProvider,
        value_objects::{
            entitlements::AvailableCredits, enums::plan_tiers::PlanTier, identity::IdentityUser,
        },
    };
    use mockall::predicate::eq;

    fn usecase(
        identity: MockIdentityProvider,
    ) -> IdentityUseCase<MockIdentityProvider, InMemorySubscriptions, InMemoryProfiles> {
        IdentityUseCase::new(
            Arc::new(identity),
            Arc::new(InMemorySubscriptions::default()),
            Arc::new(InMemoryProfiles::default()),
        )
    }

    #[tokio::test]
    async fn sign_in_rejects_malformed_input_locally() {
        let mut identity = MockIdentityProvider::new();
        identity.expect_sign_in().never();
        let usecase = usecase(identity);

        let err = usecase.sign_in("not-an-email", "pw").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_credentials_keep_provider_message() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_sign_in()
            .with(eq("a@b.co"), eq("wrong"))
            .returning(|_, _| {
                Err(IdentityFailure::InvalidCredentials(
                    "Invalid login credentials".to_string(),
                ))
            });
        let usecase = usecase(identity);

        let err = usecase.sign_in(" a@b.co ", "wrong").await.unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn sign_up_returns_provider_session() {
        let user_id = Uuid::new_v4();
        let mut identity = MockIdentityProvider::new();
        identity.expect_sign_up().returning(move |_, _| {
            Ok(AuthResponse {
                user: IdentityUser {
                    id: user_id,
                    email: Some("a@b.co".to_string()),
                },
                session: None,
            })
        });

        let response = usecase(identity).sign_up("a@b.co", "secret123").await.unwrap();

        assert_eq!(response.user.id, user_id);
    }

    #[tokio::test]
    async fn session_context_combines_profile_and_entitlement() {
        let user_id = Uuid::new_v4();
        let usecase = IdentityUseCase::new(
            Arc::new(MockIdentityProvider::new()),
            Arc::new(InMemorySubscriptions::with(vec![subscription_row(user_id, PlanTier::Pro, 40)])),
            Arc::new(InMemoryProfiles::with_key(user_id, "sk-user")),
        );

        let context = usecase
            .session_context(user_id, Some("a@b.co".to_string()))
            .await
            .unwrap();

        assert!(context.profile.has_api_key);
        assert_eq!(context.entitlement.available_credits, AvailableCredits::Limited(60));
        assert_eq!(context.subscription.unwrap().plan, "Pro");
    }

    #[tokio::test]
    async fn session_context_without_rows_is_not_eligible() {
        let context = usecase(MockIdentityProvider::new())
            .session_context(Uuid::new_v4(), None)
            .await
            .unwrap();

        assert!(!context.profile.has_api_key);
        assert!(!context.entitlement.can_generate);
        assert!(context.subscription.is_none());
    }
}
