//! Thin async client for the HTTP API.

use crate::constants::MAX_PAYLOAD_SIZE;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("empty payload")]
    EmptyContent,

    #[error("payload too big")]
    PayloadTooLarge,

    #[error("blacklisted phrases, antispam system")]
    Blacklisted,

    #[error("rate limited")]
    RateLimited,

    #[error("not found or expired")]
    NotFound,

    #[error("server error ({0}): {1}")]
    Server(StatusCode, String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct PasteClient {
    http: reqwest::Client,
    base_url: String,
}

impl PasteClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Applies a whole-request timeout to every call.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a paste with a standard identifier and returns its URL.
    pub async fn create(&self, content: &[u8]) -> Result<String, ClientError> {
        self.post(content, false).await
    }

    /// Creates a paste with a 32 character identifier.
    pub async fn create_secure(&self, content: &[u8]) -> Result<String, ClientError> {
        self.post(content, true).await
    }

    /// Fetches a paste by bare id or by the URL `create` returned.
    pub async fn get(&self, id_or_url: &str) -> Result<Vec<u8>, ClientError> {
        let id = paste_id(id_or_url);
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, id))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?.to_vec());
        }
        Err(error_for(status, response.text().await.unwrap_or_default()))
    }

    async fn post(&self, content: &[u8], secure: bool) -> Result<String, ClientError> {
        if content.is_empty() {
            return Err(ClientError::EmptyContent);
        }
        if content.len() > MAX_PAYLOAD_SIZE {
            return Err(ClientError::PayloadTooLarge);
        }

        let mut request = self.http.post(format!("{}/create", self.base_url));
        if secure {
            request = request.query(&[("secure", "true")]);
        }

        let response = request.body(content.to_vec()).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(body.trim_end().to_string())
        } else {
            Err(error_for(status, body))
        }
    }
}

fn error_for(status: StatusCode, body: String) -> ClientError {
    match status {
        StatusCode::BAD_REQUEST if body.starts_with("empty payload") => ClientError::EmptyContent,
        StatusCode::PAYLOAD_TOO_LARGE => ClientError::PayloadTooLarge,
        StatusCode::FORBIDDEN => ClientError::Blacklisted,
        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited,
        StatusCode::NOT_FOUND => ClientError::NotFound,
        _ => ClientError::Server(status, body),
    }
}

fn paste_id(id_or_url: &str) -> &str {
    id_or_url
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(id_or_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_taken_from_the_last_path_segment() {
        assert_eq!(paste_id("abc1234"), "abc1234");
        assert_eq!(paste_id("https://ig.lc/abc1234"), "abc1234");
        assert_eq!(paste_id("https://ig.lc/abc1234/\n"), "abc1234");
    }

    #[test]
    fn statuses_map_to_errors() {
        assert!(matches!(
            error_for(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ClientError::RateLimited
        ));
        assert!(matches!(
            error_for(StatusCode::FORBIDDEN, String::new()),
            ClientError::Blacklisted
        ));
        assert!(matches!(
            error_for(StatusCode::INTERNAL_SERVER_ERROR, "error".into()),
            ClientError::Server(StatusCode::INTERNAL_SERVER_ERROR, _)
        ));
    }

    #[tokio::test]
    async fn bad_payloads_never_leave_the_client() {
        // Nothing listens here; reaching the network would yield Http instead.
        let client = PasteClient::new("http://127.0.0.1:9");
        assert!(matches!(client.create(b"").await, Err(ClientError::EmptyContent)));

        let big = vec![b'a'; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(client.create(&big).await, Err(ClientError::PayloadTooLarge)));
    }
}
