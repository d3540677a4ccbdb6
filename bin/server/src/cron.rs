//! Periodic removal of expired correlation records.

use hitobito_login_access::CorrelationStore;
use sqlx::PgPool;

use crate::auth::db::CorrelationRepository;

/// Runs one reap pass, logging the result instead of failing.
pub async fn reap_once(pool: &PgPool) {
    let repo = CorrelationRepository::new(pool.clone());
    match repo.reap(chrono::Utc::now()).await {
        Ok(count) if count > 0 => {
            tracing::info!(deleted_records = count, "reaped expired login sessions");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to reap expired login sessions");
        }
    }
}

/// Spawns the background task that reaps on a fixed interval.
///
/// A failed pass is logged and retried at the next tick; the task never
/// exits on its own.
pub fn spawn_expiry_reaper(pool: PgPool, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        // The first tick fires immediately; startup already reaped.
        interval.tick().await;
        loop {
            interval.tick().await;
            reap_once(&pool).await;
        }
    });
}
