//! Client-facing error taxonomy and the error-to-response mapper.
//!
//! Each variant maps to exactly one status code:
//!
//! | Variant            | Status | Message                   |
//! |--------------------|--------|---------------------------|
//! | `Unauthorized`     | 401    | `Unauthorized`            |
//! | `NotFound`         | 404    | `Not Found`               |
//! | `MethodNotAllowed` | 405    | `Method Not Allowed`      |
//! | `Internal`         | 500    | `Internal Server Error`   |
//!
//! Internal detail (the variant's fields) is logged but never sent.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::context::RequestMeta;
use crate::http::{Response, StatusCode};
use crate::quotes::QuoteError;
use crate::security::AccessError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AccessError),

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: String },

    #[error("internal error: {detail}")]
    Internal { detail: String },
}

/// The JSON body of every failed request: `{"code": 404, "message": "Not Found"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorRecord {
    /// HTTP status code, repeated in the body.
    #[schema(example = 404)]
    pub code: u16,
    /// Canonical reason phrase of the status.
    #[schema(example = "Not Found")]
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::Unauthorized,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
            Self::Internal { .. } => StatusCode::InternalServerError,
        }
    }

    pub fn record(&self) -> ErrorRecord {
        let status = self.status();
        ErrorRecord {
            code: status.as_u16(),
            message: status.canonical_reason().to_owned(),
        }
    }

    /// Logs the failure once and renders it as a JSON response.
    ///
    /// Client errors are logged at `warn`, server errors at `error`.
    pub fn into_response(self, meta: &RequestMeta) -> Response {
        let record = self.record();
        if self.status().is_server_error() {
            error!(
                code = record.code,
                method = %meta.method,
                path = %meta.path,
                request_id = %meta.request_id,
                detail = %self,
                "{}",
                record.message
            );
        } else {
            warn!(
                code = record.code,
                method = %meta.method,
                path = %meta.path,
                request_id = %meta.request_id,
                detail = %self,
                "{}",
                record.message
            );
        }
        Response::json(self.status(), &record)
    }
}

impl From<QuoteError> for ApiError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::NotFound { reason } => Self::NotFound { reason },
            QuoteError::Store(e) => Self::Internal {
                detail: e.to_string(),
            },
        }
    }
}
