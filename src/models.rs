use crate::constants::{ID_ALPHABET, ID_LENGTH, SECURE_ID_LENGTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Which identifier length a new paste gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdKind {
    #[default]
    Standard, // 7 symbols
    Secure, // 32 symbols, hard to guess
}

impl IdKind {
    pub fn from_secure_flag(secure: bool) -> Self {
        if secure {
            IdKind::Secure
        } else {
            IdKind::Standard
        }
    }

    pub fn id_length(self) -> usize {
        match self {
            IdKind::Standard => ID_LENGTH,
            IdKind::Secure => SECURE_ID_LENGTH,
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdKind::Standard => write!(f, "standard"),
            IdKind::Secure => write!(f, "secure"),
        }
    }
}

/// Whether `id` could have been produced by the allocator.
pub fn is_well_formed_id(id: &str) -> bool {
    (id.len() == ID_LENGTH || id.len() == SECURE_ID_LENGTH)
        && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasteRecord {
    pub id: String,
    pub content: Vec<u8>,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub expires_at: i64,
}

impl PasteRecord {
    pub fn new(id: &str, content: &[u8], created_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            id: id.to_string(),
            content: content.to_vec(),
            created_at: created_at.timestamp_millis(),
            expires_at: (created_at + ttl).timestamp_millis(),
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now.timestamp_millis()
    }
}

/// Successful allocation: the identifier plus the URL handed back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPaste {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreateQuery {
    /// `true` requests a 32-character identifier
    pub secure: Option<String>,
}

impl CreateQuery {
    pub fn id_kind(&self) -> IdKind {
        IdKind::from_secure_flag(self.secure.as_deref() == Some("true"))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Maximum paste size in bytes
    pub max_payload_size: usize,
    /// Hours a paste stays retrievable
    pub retention_hours: i64,
}
