//! Background and on-demand keyset refresh.
//!
//! A `KeysetRefresher` fetches the authority's document and publishes the
//! result through a `KeysetHandle`. A failed fetch leaves the previously
//! published keyset in place.
//!
//! # Invariants
//! - At most one fetch is in flight per refresher.
//! - The refresh task holds only a `Weak` reference and exits once the
//!   refresher is dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use super::{FetchError, Keyset, KeysetHandle, fetch_keyset_with, http_client};

/// Fetches and publishes keysets for one authority URL.
#[derive(Debug)]
pub struct KeysetRefresher {
    client: reqwest::Client,
    url: String,
    handle: Arc<KeysetHandle>,
    /// When the last fetch started. Also serialises fetches.
    last_attempt: Mutex<Option<Instant>>,
}

impl KeysetRefresher {
    /// Create a refresher publishing into `handle`.
    ///
    /// # Errors
    /// Returns `FetchError::Network` if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        handle: Arc<KeysetHandle>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
            handle,
            last_attempt: Mutex::new(None),
        })
    }

    /// The handle this refresher publishes into.
    #[must_use]
    pub const fn handle(&self) -> &Arc<KeysetHandle> {
        &self.handle
    }

    /// The authority URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch now and publish the result.
    ///
    /// # Errors
    /// Returns the fetch error; the published keyset is left unchanged.
    pub async fn refresh(&self) -> Result<Arc<Keyset>, FetchError> {
        let mut last_attempt = self.last_attempt.lock().await;
        self.fetch_and_publish(&mut last_attempt).await
    }

    /// Fetch and publish unless the last attempt started less than
    /// `min_interval` ago.
    ///
    /// Returns `Ok(None)` when skipped. Callers that waited on an in-flight
    /// fetch see it as the most recent attempt and are skipped too.
    ///
    /// # Errors
    /// Returns the fetch error; the published keyset is left unchanged.
    pub async fn refresh_if_stale(
        &self,
        min_interval: Duration,
    ) -> Result<Option<Arc<Keyset>>, FetchError> {
        let mut last_attempt = self.last_attempt.lock().await;
        if last_attempt.is_some_and(|at| at.elapsed() < min_interval) {
            return Ok(None);
        }
        self.fetch_and_publish(&mut last_attempt).await.map(Some)
    }

    async fn fetch_and_publish(
        &self,
        last_attempt: &mut Option<Instant>,
    ) -> Result<Arc<Keyset>, FetchError> {
        *last_attempt = Some(Instant::now());

        let keyset = Arc::new(fetch_keyset_with(&self.client, &self.url).await?);
        let previous = self.handle.replace_arc(Arc::clone(&keyset));
        if previous.kids() != keyset.kids() {
            tracing::info!(
                "keyset changed: {:?} -> {:?}",
                previous.kids(),
                keyset.kids()
            );
        }
        Ok(keyset)
    }
}

/// Spawn a task refreshing the keyset every `interval`.
///
/// The first refresh happens one `interval` after spawning; the initial
/// keyset is expected to be fetched by the caller at startup.
///
/// # Arguments
/// * `refresher` - Refresher to drive. Only a weak reference is kept.
/// * `interval` - Time between refreshes.
///
/// # Returns
/// A `JoinHandle` that can be used to cancel the task on shutdown, or `None`
/// if `interval` is zero.
#[must_use]
pub fn spawn_refresh_task(
    refresher: &Arc<KeysetRefresher>,
    interval: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if interval.is_zero() {
        tracing::warn!("keyset refresh interval is zero, background refresh disabled");
        return None;
    }

    let refresher = Arc::downgrade(refresher);
    Some(tokio::spawn(async move {
        refresh_loop(refresher, interval).await;
    }))
}

async fn refresh_loop(refresher: Weak<KeysetRefresher>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(refresher) = refresher.upgrade() else {
            tracing::debug!("keyset refresher dropped, stopping refresh task");
            break;
        };

        if let Err(e) = refresher.refresh().await {
            tracing::warn!(
                "keyset refresh from {} failed, keeping previous keyset: {e}",
                refresher.url()
            );
        }
    }
}
