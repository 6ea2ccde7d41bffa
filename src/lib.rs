// Library exports for testing and reusability

pub mod config;
pub mod constants;
pub mod error;
pub mod geoloc;
pub mod models;
pub mod realtime;
pub mod services;

// Re-export commonly used types
pub use error::{ClientError, GeolocationErrorKind, Result};

use crate::config::Config;
use crate::geoloc::GeolocationProvider;
use crate::realtime::SpawnFeed;
use crate::services::{
    ApiClient, AuthService, HttpSpawnApi, LocationTracker, Session, SpawnSynchronizer,
};
use std::sync::Arc;

/// The assembled client: one instance per process, services injected into
/// each other rather than reached as ambient globals. The geolocation
/// provider and realtime feed are supplied by the host platform.
pub struct GameClient {
    pub session: Arc<Session>,
    pub auth: AuthService,
    pub tracker: Arc<LocationTracker>,
    pub spawns: Arc<SpawnSynchronizer>,
}

impl GameClient {
    /// Wire the services together and connect movement to refetching:
    /// crossing the distance threshold refetches nearby spawns and, on
    /// success, resets the tracker's odometer.
    ///
    /// Must be called within a tokio runtime; movement-triggered
    /// refetches run as spawned tasks.
    pub fn new(
        config: &Config,
        provider: Arc<dyn GeolocationProvider>,
        feed: Arc<dyn SpawnFeed>,
    ) -> Self {
        let session = Arc::new(Session::new(config.token_store_path.clone()));
        let api = ApiClient::new(
            config.api_base_url.clone(),
            config.app_key.clone(),
            config.app_secret.clone(),
            session.clone(),
        );
        let auth = AuthService::new(api.clone(), session.clone());
        let spawn_api = Arc::new(HttpSpawnApi::new(api));
        let spawns = Arc::new(SpawnSynchronizer::new(
            spawn_api,
            feed,
            config.viewport_cache_ttl,
        ));
        let tracker = Arc::new(LocationTracker::new(provider));

        let sync = spawns.clone();
        let odometer = Arc::downgrade(&tracker);
        tracker.on_refetch_required(move |location, distance| {
            let sync = sync.clone();
            let odometer = odometer.clone();
            tokio::spawn(async move {
                tracing::info!("Moved {:.1}m, refetching spawns", distance);
                match sync.fetch_nearby(location.lat, location.lng).await {
                    Ok(()) => {
                        if let Some(tracker) = odometer.upgrade() {
                            tracker.mark_fetched(Some(location));
                        }
                    }
                    Err(e) => tracing::warn!("Movement refetch failed: {}", e),
                }
            });
        });

        GameClient {
            session,
            auth,
            tracker,
            spawns,
        }
    }

    /// Stop tracking and leave the realtime channel. Both are synchronous;
    /// nothing is delivered after this returns.
    pub fn teardown(&self) {
        self.tracker.stop_tracking();
        self.spawns.unsubscribe();
    }
}
