//! Identifier allocation.
//!
//! Identifiers are drawn from [`ID_ALPHABET`] with the OS CSPRNG. The alphabet
//! has 35 symbols, so indices are sampled with `Uniform`, which rejects and
//! redraws instead of reducing modulo 35.

use crate::constants::ID_ALPHABET;
use crate::error::{AppError, Result};
use crate::models::IdKind;
use crate::store::PasteStore;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::OsRng;

/// Draws a random identifier of `len` symbols.
pub fn generate_id(len: usize) -> String {
    let symbols = Uniform::from(0..ID_ALPHABET.len());
    let mut rng = OsRng;
    (0..len)
        .map(|_| ID_ALPHABET[symbols.sample(&mut rng)] as char)
        .collect()
}

/// Stores `content` under a fresh identifier, retrying on collision.
///
/// Each attempt is a single atomic create-if-absent, so the first `true` is
/// a win no concurrent caller can share. Store failures end the attempt
/// immediately; only collisions are retried.
pub async fn allocate(
    store: &dyn PasteStore,
    content: &[u8],
    kind: IdKind,
    max_attempts: usize,
) -> Result<String> {
    for attempt in 1..=max_attempts {
        let id = generate_id(kind.id_length());

        if store.create(&id, content).await? {
            return Ok(id);
        }

        tracing::debug!(id = %id, attempt, "Identifier collision, retrying");
    }

    // A 35^7 space should make this practically unreachable. The transport
    // logs it once, with the client attached.
    Err(AppError::AllocationExhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ID_LENGTH, MAX_ALLOCATION_ATTEMPTS, SECURE_ID_LENGTH};
    use crate::error::StoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Reports a collision for the first `collisions` creates.
    struct CollidingStore {
        collisions: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PasteStore for CollidingStore {
        async fn get(&self, _id: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        async fn create(&self, _id: &str, _content: &[u8]) -> std::result::Result<bool, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(call >= self.collisions)
        }

        async fn purge_expired(&self) -> std::result::Result<u64, StoreError> {
            Ok(0)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl PasteStore for BrokenStore {
        async fn get(&self, _id: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            Err(sqlx::Error::PoolClosed.into())
        }

        async fn create(&self, _id: &str, _content: &[u8]) -> std::result::Result<bool, StoreError> {
            Err(sqlx::Error::PoolClosed.into())
        }

        async fn purge_expired(&self) -> std::result::Result<u64, StoreError> {
            Err(sqlx::Error::PoolClosed.into())
        }
    }

    /// Counts ERROR-level events.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn colliding(collisions: usize) -> CollidingStore {
        CollidingStore {
            collisions,
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn ids_use_only_the_alphabet_and_requested_length() {
        for kind in [IdKind::Standard, IdKind::Secure] {
            for _ in 0..200 {
                let id = generate_id(kind.id_length());
                assert_eq!(id.len(), kind.id_length());
                assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)), "{id}");
            }
        }
        assert_eq!(IdKind::Standard.id_length(), ID_LENGTH);
        assert_eq!(IdKind::Secure.id_length(), SECURE_ID_LENGTH);
    }

    #[test]
    fn symbol_frequencies_are_uniform() {
        // 35 symbols, ~10k draws each. A modulo-reduced byte would push the
        // first 11 symbols roughly 9% above the rest, far outside these bounds.
        let draws = 35 * 10_000;
        let sample = generate_id(draws);
        let mut counts: HashMap<u8, usize> = HashMap::new();
        for b in sample.bytes() {
            *counts.entry(b).or_default() += 1;
        }

        assert_eq!(counts.len(), ID_ALPHABET.len());
        let expected = (draws / ID_ALPHABET.len()) as f64;

        let chi_squared: f64 = counts
            .values()
            .map(|&c| {
                let diff = c as f64 - expected;
                diff * diff / expected
            })
            .sum();
        // 34 degrees of freedom; p < 1e-6 lies around 85.
        assert!(chi_squared < 85.0, "chi-squared {chi_squared}");

        for (&symbol, &count) in &counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(
                deviation < 0.05,
                "symbol {} drawn {} times",
                symbol as char,
                count
            );
        }
    }

    #[tokio::test]
    async fn first_successful_create_wins() {
        let store = colliding(0);
        let id = allocate(&store, b"x", IdKind::Standard, MAX_ALLOCATION_ATTEMPTS)
            .await
            .unwrap();
        assert_eq!(id.len(), ID_LENGTH);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn collisions_are_retried() {
        let store = colliding(3);
        let id = allocate(&store, b"x", IdKind::Secure, MAX_ALLOCATION_ATTEMPTS)
            .await
            .unwrap();
        assert_eq!(id.len(), SECURE_ID_LENGTH);
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausts_after_bounded_attempts() {
        let store = colliding(usize::MAX);
        let err = allocate(&store, b"x", IdKind::Standard, MAX_ALLOCATION_ATTEMPTS)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::AllocationExhausted { attempts } if attempts == MAX_ALLOCATION_ATTEMPTS
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), MAX_ALLOCATION_ATTEMPTS);
    }

    #[tokio::test]
    async fn exhaustion_is_logged_once_per_request() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = colliding(usize::MAX);
        let err = allocate(&store, b"x", IdKind::Standard, MAX_ALLOCATION_ATTEMPTS)
            .await
            .unwrap_err();
        assert_eq!(errors.load(Ordering::SeqCst), 0);

        err.log("192.0.2.1");
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_failure_is_not_retried() {
        let err = allocate(&BrokenStore, b"x", IdKind::Standard, MAX_ALLOCATION_ATTEMPTS)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
    }
}
