use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::usecases::{
    emojis::EmojiError, identity::IdentityError, profiles::ProfileError,
    subscriptions::SubscriptionError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Use-case failure rendered as `(status, ErrorResponse)`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    reason: Option<&'static str>,
}

impl ApiError {
    fn new(status: StatusCode, message: String) -> Self {
        // Don't leak internal error detail to client
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            message
        };

        Self {
            status,
            message,
            reason: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    fn with_reason(mut self, reason: Option<&'static str>) -> Self {
        self.reason = reason;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            code: self.status.as_u16(),
            message: self.message,
            reason: self.reason,
        });

        (self.status, body).into_response()
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        if let SubscriptionError::Internal(inner) = &err {
            error!(error = ?inner, "subscriptions: internal error");
        }
        ApiError::new(err.status_code(), err.to_string())
    }
}

impl From<EmojiError> for ApiError {
    fn from(err: EmojiError) -> Self {
        if let EmojiError::Internal(inner) = &err {
            error!(error = ?inner, "emojis: internal error");
        }
        ApiError::new(err.status_code(), err.to_string()).with_reason(err.reason())
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        if let ProfileError::Internal(inner) = &err {
            error!(error = ?inner, "profiles: internal error");
        }
        ApiError::new(err.status_code(), err.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        if let IdentityError::Internal(inner) = &err {
            error!(error = ?inner, "identity: internal error");
        }
        ApiError::new(err.status_code(), err.to_string())
    }
}
