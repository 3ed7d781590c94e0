//! Watchlist rehydration against a catalog provider.
//!
//! Each [`WatchlistSync::refresh`] takes a fresh generation token. Starting a
//! new refresh, or cancelling through a [`CancelHandle`], bumps the generation
//! and aborts whatever fetch is still in flight; a result whose token is no
//! longer current resolves as [`Refresh::Superseded`] and is never rendered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable};
use tokio::sync::Mutex;

use hoshii_api::traits::{CatalogProvider, CatalogRecord};
use hoshii_core::models::AnimeId;
use hoshii_core::watchlist::WatchlistStore;

/// The process-wide watchlist, serialized behind a single-writer lock.
pub type SharedWatchlist = Arc<Mutex<WatchlistStore>>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("catalog query failed: {0}")]
    Catalog(String),
    #[error("catalog query timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The watchlist has no entries. No catalog query was made.
    Empty,
    /// Records in watchlist order. Entries the catalog no longer knows are absent.
    Populated {
        records: Vec<CatalogRecord>,
        fetched_at: DateTime<Utc>,
    },
    Failed(SyncError),
}

/// A refresh either lands or was overtaken by a newer refresh or a cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    Current(RefreshOutcome),
    Superseded,
}

impl Refresh {
    pub fn into_current(self) -> Option<RefreshOutcome> {
        match self {
            Self::Current(outcome) => Some(outcome),
            Self::Superseded => None,
        }
    }
}

/// Where the latest refresh cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Loading,
    Empty,
    Populated,
    Failed,
}

impl From<&RefreshOutcome> for RefreshState {
    fn from(outcome: &RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Empty => Self::Empty,
            RefreshOutcome::Populated { .. } => Self::Populated,
            RefreshOutcome::Failed(_) => Self::Failed,
        }
    }
}

/// Render collaborator for the watchlist.
pub trait WatchlistView {
    fn show_loading(&mut self);
    fn show(&mut self, outcome: &RefreshOutcome);
}

struct Shared {
    generation: AtomicU64,
    in_flight: StdMutex<Option<AbortHandle>>,
    state: StdMutex<RefreshState>,
}

impl Shared {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            in_flight: StdMutex::new(None),
            state: StdMutex::new(RefreshState::Idle),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: RefreshState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn state(&self) -> RefreshState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bump the generation and abort the in-flight fetch. Caller holds the `in_flight` lock.
    fn advance(&self, in_flight: &mut Option<AbortHandle>) -> u64 {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = in_flight.take() {
            handle.abort();
        }
        token
    }

    /// Start a new refresh cycle in the `Loading` state. Returns its token.
    fn begin(&self) -> u64 {
        let mut in_flight = self.in_flight();
        let token = self.advance(&mut in_flight);
        self.set_state(RefreshState::Loading);
        token
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    /// Register the abort handle for `token`'s fetch. Fails if `token` is already stale.
    fn install(&self, token: u64, handle: AbortHandle) -> bool {
        let mut in_flight = self.in_flight();
        if !self.is_current(token) {
            return false;
        }
        *in_flight = Some(handle);
        true
    }

    /// Invalidate the current cycle. A settled outcome stays observable.
    fn cancel(&self) {
        let mut in_flight = self.in_flight();
        self.advance(&mut in_flight);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == RefreshState::Loading {
            *state = RefreshState::Idle;
        }
    }
}

/// Cancels the current refresh cycle from outside the sync.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        tracing::debug!("Watchlist refresh cancelled");
        self.shared.cancel();
    }
}

/// Ties refresh results to a view's lifetime: dropping the guard cancels.
pub struct ViewGuard {
    handle: CancelHandle,
}

impl ViewGuard {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }
}

impl Drop for ViewGuard {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// Turns the watchlist into display records via a [`CatalogProvider`].
pub struct WatchlistSync<P> {
    store: SharedWatchlist,
    provider: P,
    timeout: Duration,
    shared: Arc<Shared>,
    cycle: Mutex<()>,
}

impl<P: CatalogProvider> WatchlistSync<P> {
    pub fn new(store: SharedWatchlist, provider: P) -> Self {
        Self::with_timeout(store, provider, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(store: SharedWatchlist, provider: P, timeout: Duration) -> Self {
        Self {
            store,
            provider,
            timeout,
            shared: Arc::new(Shared::new()),
            cycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SharedWatchlist {
        &self.store
    }

    pub fn state(&self) -> RefreshState {
        self.shared.state()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Guard for a view that displays refresh results.
    pub fn view_guard(&self) -> ViewGuard {
        ViewGuard {
            handle: self.cancel_handle(),
        }
    }

    /// Run one refresh cycle.
    ///
    /// Makes at most one catalog query, never retries, and never touches the store.
    pub async fn refresh(&self) -> Refresh {
        let token = self.shared.begin();

        let ids = self.store.lock().await.list();
        if ids.is_empty() {
            tracing::debug!("Watchlist empty, skipping catalog query");
            return self.finish(token, RefreshOutcome::Empty);
        }

        // Catalog queries never overlap; a stale cycle gives way without querying.
        let _cycle = self.cycle.lock().await;
        let (handle, registration) = AbortHandle::new_pair();
        if !self.shared.install(token, handle) {
            return Refresh::Superseded;
        }

        let raw: Vec<u64> = ids.iter().map(|id| id.get()).collect();
        tracing::debug!(entries = raw.len(), "Refreshing watchlist");
        let fetch = tokio::time::timeout(self.timeout, self.provider.fetch_by_ids(&raw));

        let outcome = match Abortable::new(fetch, registration).await {
            Err(_aborted) => {
                tracing::debug!(token, "Watchlist refresh aborted");
                return Refresh::Superseded;
            }
            Ok(Err(_elapsed)) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Catalog query timed out");
                RefreshOutcome::Failed(SyncError::Timeout(self.timeout))
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "Catalog query failed");
                RefreshOutcome::Failed(SyncError::Catalog(e.to_string()))
            }
            Ok(Ok(Ok(records))) => {
                let records = arrange(&ids, records);
                if records.len() < ids.len() {
                    tracing::info!(
                        requested = ids.len(),
                        found = records.len(),
                        "Catalog is missing some watchlist entries"
                    );
                }
                RefreshOutcome::Populated {
                    records,
                    fetched_at: Utc::now(),
                }
            }
        };

        self.finish(token, outcome)
    }

    /// Refresh and hand the outcome to `view`, unless the cycle was superseded.
    ///
    /// Returns whether the view received an outcome.
    pub async fn refresh_into<V: WatchlistView>(&self, view: &mut V) -> bool {
        view.show_loading();
        match self.refresh().await {
            Refresh::Current(outcome) => {
                view.show(&outcome);
                true
            }
            Refresh::Superseded => false,
        }
    }

    fn finish(&self, token: u64, outcome: RefreshOutcome) -> Refresh {
        let mut in_flight = self.shared.in_flight();
        if !self.shared.is_current(token) {
            tracing::debug!(token, "Discarding stale watchlist refresh");
            return Refresh::Superseded;
        }
        in_flight.take();
        self.shared.set_state(RefreshState::from(&outcome));
        Refresh::Current(outcome)
    }
}

/// Order `records` by watchlist position, dropping anything not on the list.
fn arrange(ids: &[AnimeId], records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
    let mut by_id: HashMap<u64, CatalogRecord> = HashMap::with_capacity(records.len());
    for record in records {
        by_id.entry(record.id).or_insert(record);
    }
    ids.iter().filter_map(|id| by_id.remove(&id.get())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_store, record, MockProvider};
    use hoshii_core::storage::{KeyValueStore, Storage};
    use hoshii_core::watchlist::WATCHLIST_KEY;

    fn ids_of(outcome: &RefreshOutcome) -> Vec<u64> {
        match outcome {
            RefreshOutcome::Populated { records, .. } => records.iter().map(|r| r.id).collect(),
            other => panic!("expected populated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_watchlist_skips_query() {
        let provider = MockProvider::returning(vec![record(1)]);
        let sync = WatchlistSync::new(mock_store(&[]), provider.clone());

        let outcome = sync.refresh().await.into_current().unwrap();
        assert_eq!(outcome, RefreshOutcome::Empty);
        assert_eq!(provider.calls(), 0);
        assert_eq!(sync.state(), RefreshState::Empty);
    }

    #[tokio::test]
    async fn test_partial_result_keeps_store_order() {
        let provider = MockProvider::returning(vec![record(3), record(1)]);
        let store = mock_store(&[1, 2, 3]);
        let sync = WatchlistSync::new(store.clone(), provider.clone());

        let outcome = sync.refresh().await.into_current().unwrap();
        assert_eq!(ids_of(&outcome), vec![1, 3]);
        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.last_ids(), vec![1, 2, 3]);

        let list = store.lock().await.list();
        assert_eq!(list, vec![AnimeId(1), AnimeId(2), AnimeId(3)]);
    }

    #[tokio::test]
    async fn test_unrequested_and_duplicate_records_are_ignored() {
        let mut dup = record(2);
        dup.title = "Second copy".into();
        let provider = MockProvider::returning(vec![record(2), record(99), dup]);
        let sync = WatchlistSync::new(mock_store(&[2]), provider);

        match sync.refresh().await.into_current().unwrap() {
            RefreshOutcome::Populated { records, .. } => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].title, "Anime 2");
            }
            other => panic!("expected populated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_failed_outcome() {
        let provider = MockProvider::failing("connection reset");
        let store = mock_store(&[5, 6]);
        let sync = WatchlistSync::new(store.clone(), provider.clone());

        let outcome = sync.refresh().await.into_current().unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Failed(SyncError::Catalog("connection reset".into()))
        );
        assert_eq!(provider.calls(), 1);
        assert_eq!(sync.state(), RefreshState::Failed);
        assert_eq!(store.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider = MockProvider::returning(vec![record(1)]).with_delay(Duration::from_secs(60));
        let sync = WatchlistSync::with_timeout(
            mock_store(&[1]),
            provider,
            Duration::from_secs(10),
        );

        let outcome = sync.refresh().await.into_current().unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Failed(SyncError::Timeout(Duration::from_secs(10)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_refresh_supersedes_older() {
        let provider = MockProvider::returning(vec![record(1)]).with_delay(Duration::from_secs(2));
        let sync = Arc::new(WatchlistSync::new(mock_store(&[1]), provider.clone()));

        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sync.state(), RefreshState::Loading);

        let second = sync.refresh().await;
        assert_eq!(first.await.unwrap(), Refresh::Superseded);
        assert_eq!(ids_of(&second.into_current().unwrap()), vec![1]);
        assert_eq!(provider.calls(), 2);
        assert_eq!(sync.state(), RefreshState::Populated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_view_guard_discards_result() {
        let provider = MockProvider::returning(vec![record(1)]).with_delay(Duration::from_secs(2));
        let sync = Arc::new(WatchlistSync::new(mock_store(&[1]), provider));
        let guard = sync.view_guard();

        let pending = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(guard);

        assert_eq!(pending.await.unwrap(), Refresh::Superseded);
        assert_eq!(sync.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_dropping_guard_after_completion_keeps_terminal_state() {
        let sync = WatchlistSync::new(mock_store(&[1]), MockProvider::returning(vec![record(1)]));
        let guard = sync.view_guard();

        sync.refresh().await.into_current().unwrap();
        drop(guard);
        assert_eq!(sync.state(), RefreshState::Populated);

        let failing = WatchlistSync::new(mock_store(&[1]), MockProvider::failing("offline"));
        failing.refresh().await.into_current().unwrap();
        failing.cancel_handle().cancel();
        assert_eq!(failing.state(), RefreshState::Failed);
    }

    #[tokio::test]
    async fn test_refresh_after_cancel_starts_fresh() {
        let sync = WatchlistSync::new(mock_store(&[4]), MockProvider::returning(vec![record(4)]));
        sync.cancel_handle().cancel();

        let outcome = sync.refresh().await.into_current().unwrap();
        assert_eq!(ids_of(&outcome), vec![4]);
    }

    #[derive(Default)]
    struct RecordingView {
        events: Vec<String>,
    }

    impl WatchlistView for RecordingView {
        fn show_loading(&mut self) {
            self.events.push("loading".into());
        }

        fn show(&mut self, outcome: &RefreshOutcome) {
            self.events.push(format!("{:?}", RefreshState::from(outcome)));
        }
    }

    #[tokio::test]
    async fn test_refresh_into_view() {
        let sync = WatchlistSync::new(mock_store(&[]), MockProvider::returning(vec![]));
        let mut view = RecordingView::default();

        assert!(sync.refresh_into(&mut view).await);
        assert_eq!(view.events, vec!["loading", "Empty"]);
    }

    #[tokio::test]
    async fn test_toggle_then_refresh_scenario() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hoshii.db");

        let store = WatchlistStore::load(Box::new(Storage::open(&path).unwrap()));
        assert!(store.list().is_empty());
        let store: SharedWatchlist = Arc::new(Mutex::new(store));

        assert!(store.lock().await.toggle(AnimeId(42)));
        let persisted = Storage::open(&path).unwrap().get(WATCHLIST_KEY).unwrap();
        assert_eq!(persisted.as_deref(), Some("[42]"));

        let sync = WatchlistSync::new(store, MockProvider::returning(vec![record(42)]));
        let outcome = sync.refresh().await.into_current().unwrap();
        assert_eq!(ids_of(&outcome), vec![42]);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_lose_nothing() {
        let store = mock_store(&[]);
        let tasks: Vec<_> = (1..=50u64)
            .map(|id| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.lock().await.toggle(AnimeId(id)) })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(store.lock().await.len(), 50);
    }

    #[test]
    fn test_arrange_empty_response() {
        assert!(arrange(&[AnimeId(1)], vec![]).is_empty());
    }
}
