use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::identity::AuthResponse;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityFailure {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("identity provider request failed: {0}")]
    Provider(String),
}

#[automock]
#[async_trait]
pub trait IdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityFailure>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityFailure>;
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityFailure>;
}
