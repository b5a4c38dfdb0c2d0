use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    repositories::identity::{IdentityFailure, IdentityProvider},
    value_objects::identity::{AuthResponse, IdentitySession, IdentityUser},
};

/// Supabase Auth (GoTrue) REST client authenticated with the project's anon key.
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    auth_base: String,
    anon_key: String,
}

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    email: Option<String>,
}

/// Token responses carry the session at the top level; unconfirmed sign-ups return only the user.
#[derive(Debug, Deserialize)]
struct GoTrueAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    user: Option<GoTrueUser>,
    id: Option<Uuid>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueError {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

impl SupabaseAuthClient {
    pub fn new(project_url: &str, anon_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            auth_base: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key,
        })
    }

    async fn password_request(
        &self,
        url: String,
        email: &str,
        password: &str,
        context: &str,
    ) -> Result<AuthResponse, IdentityFailure> {
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&PasswordCredentials { email, password })
            .send()
            .await
            .map_err(|err| IdentityFailure::Provider(err.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| IdentityFailure::Provider(err.to_string()))?;

        if !status.is_success() {
            let failure = classify_failure(status, &body);
            warn!(status = %status, context, failure = %failure, "supabase auth: request rejected");
            return Err(failure);
        }

        parse_auth_response(&body)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> IdentityFailure {
    let message = serde_json::from_str::<GoTrueError>(body)
        .ok()
        .and_then(GoTrueError::into_message)
        .filter(|message| !message.trim().is_empty());

    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::UNPROCESSABLE_ENTITY
        | StatusCode::FORBIDDEN => IdentityFailure::InvalidCredentials(
            message.unwrap_or_else(|| "Invalid login credentials".to_string()),
        ),
        _ => IdentityFailure::Provider(
            message.unwrap_or_else(|| format!("supabase auth returned status {status}")),
        ),
    }
}

fn parse_auth_response(body: &str) -> Result<AuthResponse, IdentityFailure> {
    let parsed: GoTrueAuthResponse = serde_json::from_str(body)
        .map_err(|err| IdentityFailure::Provider(format!("unexpected auth response: {err}")))?;

    let user = match (parsed.user, parsed.id) {
        (Some(user), _) => IdentityUser {
            id: user.id,
            email: user.email,
        },
        (None, Some(id)) => IdentityUser {
            id,
            email: parsed.email,
        },
        (None, None) => {
            return Err(IdentityFailure::Provider(
                "auth response did not include a user".to_string(),
            ));
        }
    };

    let session = match (parsed.access_token, parsed.refresh_token) {
        (Some(access_token), Some(refresh_token)) => Some(IdentitySession {
            access_token,
            refresh_token,
            token_type: parsed.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_in: parsed.expires_in.unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(AuthResponse { user, session })
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityFailure> {
        self.password_request(format!("{}/signup", self.auth_base), email, password, "sign up")
            .await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityFailure> {
        self.password_request(
            format!("{}/token?grant_type=password", self.auth_base),
            email,
            password,
            "sign in",
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityFailure> {
        let resp = self
            .http
            .post(format!("{}/logout", self.auth_base))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(|err| IdentityFailure::Provider(err.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}
