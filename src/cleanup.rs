use crate::constants::CLEANUP_INTERVAL_SECS;
use crate::ratelimit::Admission;
use crate::store::PasteStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Background housekeeping: purge expired pastes and idle rate-limit buckets.
///
/// Expiry is already enforced on every read; this only reclaims space.
pub async fn start_cleanup_task(store: Arc<dyn PasteStore>, admissions: Vec<Admission>) {
    let mut interval = time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

    tracing::info!("🧹 Starting cleanup task (runs every hour)");

    loop {
        interval.tick().await;
        run_once(store.as_ref(), &admissions).await;
    }
}

pub async fn run_once(store: &dyn PasteStore, admissions: &[Admission]) {
    match store.purge_expired().await {
        Ok(count) => {
            if count > 0 {
                tracing::info!("🗑️  Cleaned up {} expired pastes", count);
            }
        }
        Err(e) => {
            tracing::error!("❌ Cleanup task failed: {}", e);
        }
    }

    for admission in admissions {
        admission.evict_idle();
    }
}
