use crate::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_IDLE_READ_TIMEOUT_SECS, DEFAULT_INITIAL_READ_TIMEOUT_SECS,
    DEFAULT_TCP_PORT, DENYLISTED_PHRASES,
};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub http_port: u16,
    pub tcp_port: u16,
    pub database_url: String,
    pub base_url: String,
    pub trust_proxy_headers: bool,
    pub rate_limit_enabled: bool,
    pub initial_read_timeout: Duration,
    pub idle_read_timeout: Duration,
    pub abuse_contact: Option<String>,
    pub deny_list: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            tcp_port: DEFAULT_TCP_PORT,
            database_url: "sqlite:./pastebin.db".to_string(),
            base_url: "http://localhost:3334".to_string(),
            trust_proxy_headers: false,
            rate_limit_enabled: true,
            initial_read_timeout: Duration::from_secs(DEFAULT_INITIAL_READ_TIMEOUT_SECS),
            idle_read_timeout: Duration::from_secs(DEFAULT_IDLE_READ_TIMEOUT_SECS),
            abuse_contact: None,
            deny_list: DENYLISTED_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            bind_host: env::var("BIND_HOST").unwrap_or(defaults.bind_host),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| DEFAULT_HTTP_PORT.to_string())
                .parse()?,
            tcp_port: env::var("TCP_PORT")
                .unwrap_or_else(|_| DEFAULT_TCP_PORT.to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            base_url: normalize_base_url(
                &env::var("BASE_URL").unwrap_or(defaults.base_url),
            ),
            trust_proxy_headers: env::var("TRUST_PROXY_HEADERS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            rate_limit_enabled: env::var("RATE_LIMIT_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            initial_read_timeout: Duration::from_secs(
                env::var("READ_TIMEOUT_INITIAL_SECS")
                    .unwrap_or_else(|_| DEFAULT_INITIAL_READ_TIMEOUT_SECS.to_string())
                    .parse()?,
            ),
            idle_read_timeout: Duration::from_secs(
                env::var("READ_TIMEOUT_IDLE_SECS")
                    .unwrap_or_else(|_| DEFAULT_IDLE_READ_TIMEOUT_SECS.to_string())
                    .parse()?,
            ),
            abuse_contact: env::var("ABUSE_CONTACT").ok().filter(|c| !c.trim().is_empty()),
            deny_list: defaults.deny_list,
        })
    }
}

/// Returned URLs are always `<base>/<id>`, so a configured trailing slash is dropped.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slashes_are_trimmed() {
        assert_eq!(normalize_base_url("https://ig.lc/"), "https://ig.lc");
        assert_eq!(normalize_base_url("https://ig.lc//"), "https://ig.lc");
        assert_eq!(normalize_base_url(" https://ig.lc "), "https://ig.lc");
    }

    #[test]
    fn defaults_match_protocol_ports_and_deny_list() {
        let config = Config::default();
        assert_eq!(config.http_port, 3334);
        assert_eq!(config.tcp_port, 9999);
        assert!(!config.trust_proxy_headers);
        assert_eq!(config.deny_list.len(), DENYLISTED_PHRASES.len());
        assert!(config.idle_read_timeout < config.initial_read_timeout);
    }
}
