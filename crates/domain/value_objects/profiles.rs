use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileDto {
    pub has_api_key: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncApiKeyRequest {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Profile,
    Client,
    None,
}

/// Outcome of reconciling a client-held credential with the profile copy.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiKeySyncDto {
    pub source: CredentialSource,
    pub api_key: Option<String>,
}
