//! # Error Handling
//!
//! Error taxonomy for the webhook endpoint and its HTTP mapping. The identity
//! provider only inspects status codes, so responses are short plaintext bodies
//! rather than structured documents.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::identity::IdentityError;
use crate::repositories::StoreError;
use crate::telemetry;
use crate::webhook_verification::VerificationError;

pub const NO_SVIX_HEADERS_BODY: &str = "Error occurred -- no svix headers";
pub const SIGNATURE_FAILED_BODY: &str = "Error occurred";
pub const MISSING_DATA_BODY: &str = "Error occurred -- missing data";
pub const INVALID_PAYLOAD_BODY: &str = "Error occurred -- invalid payload";
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// What was wrong with an otherwise authentic request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    MissingHeaders,
    MissingData,
    InvalidPayload,
}

impl ValidationKind {
    fn body(self) -> &'static str {
        match self {
            Self::MissingHeaders => NO_SVIX_HEADERS_BODY,
            Self::MissingData => MISSING_DATA_BODY,
            Self::InvalidPayload => INVALID_PAYLOAD_BODY,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::MissingHeaders => "missing_headers",
            Self::MissingData => "missing_data",
            Self::InvalidPayload => "invalid_payload",
        }
    }
}

/// Errors returned by the webhook handler
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("validation failed: {message}")]
    Validation {
        kind: ValidationKind,
        message: String,
    },

    #[error("signature verification failed: {0}")]
    Signature(VerificationError),

    #[error("user store failure: {0}")]
    Store(#[from] StoreError),

    #[error("identity provider failure: {0}")]
    Identity(#[from] IdentityError),
}

impl WebhookError {
    pub fn validation(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Signature(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Identity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the rejection counter.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation { kind, .. } => kind.as_str(),
            Self::Signature(_) => "signature",
            Self::Store(_) => "store",
            Self::Identity(_) => "identity",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            Self::Validation { kind, .. } => kind.body(),
            Self::Signature(_) => SIGNATURE_FAILED_BODY,
            Self::Store(_) | Self::Identity(_) => INTERNAL_ERROR_BODY,
        }
    }
}

impl From<VerificationError> for WebhookError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::MissingHeader { header } => Self::validation(
                ValidationKind::MissingHeaders,
                format!("missing header {header}"),
            ),
            other => Self::Signature(other),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let trace_id = telemetry::current_trace_id();

        if status.is_server_error() {
            tracing::error!(error = %self, trace_id = ?trace_id, "Webhook processing failed");
        } else {
            tracing::warn!(error = %self, trace_id = ?trace_id, "Webhook rejected");
        }

        metrics::counter!("clerk_webhook_rejected_total", "reason" => self.reason()).increment(1);

        (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )],
            self.body(),
        )
            .into_response()
    }
}
