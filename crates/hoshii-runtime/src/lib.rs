pub mod sync;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use hoshii_api::anilist::AniListClient;
use hoshii_api::traits::CatalogProvider;
use hoshii_core::config::AppConfig;
use hoshii_core::models::AnimeId;
use hoshii_core::storage::{KeyValueStore, Storage};
use hoshii_core::watchlist::WatchlistStore;

pub use sync::{
    CancelHandle, Refresh, RefreshOutcome, RefreshState, SharedWatchlist, SyncError, ViewGuard,
    WatchlistSync, WatchlistView,
};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
}

/// Everything the watchlist needs, built once per process.
pub struct Runtime<P = AniListClient> {
    config: AppConfig,
    sync: WatchlistSync<P>,
}

impl Runtime<AniListClient> {
    /// Open local storage at `db_path` and talk to the configured AniList endpoint.
    pub fn new(config: AppConfig, db_path: &Path) -> Result<Self, RuntimeError> {
        let storage = Storage::open(db_path)
            .map_err(|e| RuntimeError::Database(e.to_string()))?
            .with_quota(config.storage.quota());
        let client = AniListClient::with_endpoint(config.catalog.endpoint.clone());
        Ok(Self::from_parts(config, Box::new(storage), client))
    }
}

impl<P: CatalogProvider> Runtime<P> {
    pub fn from_parts(config: AppConfig, backend: Box<dyn KeyValueStore>, provider: P) -> Self {
        let store: SharedWatchlist = Arc::new(Mutex::new(WatchlistStore::load(backend)));
        let sync = WatchlistSync::with_timeout(store, provider, config.catalog.timeout());
        Self { config, sync }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sync(&self) -> &WatchlistSync<P> {
        &self.sync
    }

    /// Flip watchlist membership. Returns `true` if `id` is now saved.
    pub async fn toggle(&self, id: AnimeId) -> bool {
        let present = self.sync.store().lock().await.toggle(id);
        tracing::info!(%id, present, "Watchlist toggled");
        present
    }

    pub async fn add(&self, id: AnimeId) -> bool {
        self.sync.store().lock().await.add(id)
    }

    pub async fn remove(&self, id: AnimeId) -> bool {
        self.sync.store().lock().await.remove(id)
    }

    pub async fn contains(&self, id: AnimeId) -> bool {
        self.sync.store().lock().await.contains(id)
    }

    pub async fn list(&self) -> Vec<AnimeId> {
        self.sync.store().lock().await.list()
    }

    pub async fn refresh_watchlist(&self) -> Refresh {
        self.sync.refresh().await
    }

    /// Refresh and render into `view`. Returns whether the view was updated.
    pub async fn show_watchlist<V: WatchlistView>(&self, view: &mut V) -> bool {
        self.sync.refresh_into(view).await
    }

    pub fn view_guard(&self) -> ViewGuard {
        self.sync.view_guard()
    }
}
