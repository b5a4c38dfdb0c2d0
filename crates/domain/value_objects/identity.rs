use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{
    entitlements::EntitlementSnapshot, profiles::ProfileDto, subscriptions::SubscriptionDto,
};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IdentitySession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Sign-up may omit the session while the provider waits for email confirmation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthResponse {
    pub user: IdentityUser,
    pub session: Option<IdentitySession>,
}

/// Per-request application context assembled from a validated session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub profile: ProfileDto,
    pub subscription: Option<SubscriptionDto>,
    pub entitlement: EntitlementSnapshot,
}
