//! Per-client admission control.
//!
//! Every ingress path asks a [`RateLimiter`] before it reads any payload. One
//! limiter exists per operation class, each with its own budget, keyed by the
//! best-available client address.
//!
//! Forwarded-address headers are only honoured when `TRUST_PROXY_HEADERS` is
//! set; otherwise anyone could pick their own bucket.

use crate::error::AppError;
use axum::http::HeaderMap;
use governor::{DefaultKeyedRateLimiter, Quota};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Admission decision for one client key.
pub trait RateLimiter: Send + Sync {
    fn allow(&self, key: &str) -> bool;

    /// Drops state for keys that would be allowed a full burst again.
    fn evict_idle(&self) {}
}

/// Budget for one operation class.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    /// Time to replenish one unit of the burst
    pub period: Duration,
    pub burst: u32,
    /// What is being counted, for the rejection message ("paste", "request")
    pub unit: &'static str,
}

impl RatePolicy {
    /// Raw byte-stream pastes: short bursts allowed.
    pub const TCP_CREATE: RatePolicy = RatePolicy {
        period: Duration::from_secs(5),
        burst: 5,
        unit: "paste",
    };

    pub const HTTP_CREATE: RatePolicy = RatePolicy {
        period: Duration::from_secs(5),
        burst: 1,
        unit: "paste",
    };

    pub const HTTP_READ: RatePolicy = RatePolicy {
        period: Duration::from_secs(1),
        burst: 1,
        unit: "request",
    };

    pub fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(self.period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst)
    }

    /// e.g. `rate limit exceeded (1 paste per 5 seconds)`
    pub fn rejection_message(&self) -> String {
        let secs = self.period.as_secs();
        let per = if secs <= 1 {
            "second".to_string()
        } else {
            format!("{} seconds", secs)
        };
        format!("rate limit exceeded (1 {} per {})", self.unit, per)
    }
}

/// In-memory GCRA limiter from `governor`.
pub struct GovernorLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl GovernorLimiter {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            limiter: governor::RateLimiter::keyed(policy.quota()),
        }
    }
}

impl RateLimiter for GovernorLimiter {
    fn allow(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    fn evict_idle(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Admits everything. Used when rate limiting is disabled.
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn allow(&self, _key: &str) -> bool {
        true
    }
}

/// A limiter bound to the message its rejections carry.
#[derive(Clone)]
pub struct Admission {
    limiter: Arc<dyn RateLimiter>,
    rejection: String,
}

impl Admission {
    pub fn new(limiter: Arc<dyn RateLimiter>, rejection: impl Into<String>) -> Self {
        Self {
            limiter,
            rejection: rejection.into(),
        }
    }

    pub fn governed(policy: RatePolicy) -> Self {
        Self::new(
            Arc::new(GovernorLimiter::new(policy)),
            policy.rejection_message(),
        )
    }

    pub fn unlimited() -> Self {
        Self::new(Arc::new(Unlimited), "rate limit exceeded")
    }

    /// Builds a governed or unlimited admission depending on configuration.
    pub fn for_policy(enabled: bool, policy: RatePolicy) -> Self {
        if enabled {
            Self::governed(policy)
        } else {
            Self::unlimited()
        }
    }

    pub fn check(&self, client: &str) -> Result<(), AppError> {
        if self.limiter.allow(client) {
            Ok(())
        } else {
            Err(AppError::RateLimited(self.rejection.clone()))
        }
    }

    pub fn evict_idle(&self) {
        self.limiter.evict_idle();
    }
}

/// Client key for an HTTP request: first `X-Forwarded-For` hop, then
/// `X-Real-IP` (both only when trusted), then the socket peer.
pub fn http_client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}
