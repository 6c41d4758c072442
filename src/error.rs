use crate::validation::ValidationError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Backend failures, kept apart from "not found" and from a create collision.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    RateLimited(String),

    #[error("paste not found")]
    NotFound,

    #[error("no free identifier after {attempts} attempts")]
    AllocationExhausted { attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(ValidationError::Empty) => StatusCode::BAD_REQUEST,
            AppError::Validation(ValidationError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation(ValidationError::Blacklisted) => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::AllocationExhausted { .. } | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Read(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Text shown to the client. Internal failures stay generic here; the
    /// detail only goes to the log.
    pub fn client_message(&self, abuse_contact: Option<&str>) -> String {
        match self {
            AppError::Validation(ValidationError::Blacklisted) => match abuse_contact {
                Some(contact) => format!(
                    "{}\ncontact {} if this is in error",
                    ValidationError::Blacklisted,
                    contact
                ),
                None => ValidationError::Blacklisted.to_string(),
            },
            AppError::Validation(e) => e.to_string(),
            AppError::RateLimited(msg) => msg.clone(),
            AppError::NotFound => "not found or expired".to_string(),
            AppError::AllocationExhausted { .. } | AppError::Store(_) => "error".to_string(),
            AppError::Read(_) => "read error".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    /// Emits the log line for failures that are ours rather than the client's.
    pub fn log(&self, client: &str) {
        match self {
            AppError::Store(e) => tracing::error!(client, "Store error: {}", e),
            AppError::AllocationExhausted { attempts } => {
                tracing::error!(client, attempts, "Identifier allocation exhausted")
            }
            AppError::Read(e) => tracing::error!(client, "Read error: {}", e),
            AppError::RateLimited(_) => tracing::warn!(client, "Rate limit exceeded"),
            _ => tracing::debug!(client, "Rejected request: {}", self),
        }
    }
}

/// Error wrapper carrying the abuse contact needed to render deny-list rejections.
pub struct HttpError {
    pub error: AppError,
    pub abuse_contact: Option<String>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = self.error.client_message(self.abuse_contact.as_deref());

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        HttpError {
            error: self,
            abuse_contact: None,
        }
        .into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
