use crate::error::{ClientError, Result};
use crate::models::{
    Coordinates, DistantSpawn, RadiusInfo, Region, Spawn, SpawnRecord, ViewportBounds,
};
use crate::realtime::{parse_spawn_event, SpawnFeed, Subscription};
use crate::services::spawn_api::SpawnApi;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Single-slot cache for the wide-area viewport layer. One entry replaces
/// the previous; a candidate viewport reuses it only while the TTL holds
/// and all four edges sit within the similarity tolerance.
struct ViewportCacheEntry {
    spawns: Vec<DistantSpawn>,
    bounds: ViewportBounds,
    fetched_at: Instant,
    expires_at: Instant,
}

/// The one live region subscription: channel handle plus the task pumping
/// its payloads into the merge path.
struct ActiveSubscription {
    region: Region,
    subscription: Subscription,
    pump: JoinHandle<()>,
}

impl ActiveSubscription {
    /// Synchronous teardown: after this returns no further payloads reach
    /// the collection.
    fn shutdown(self) {
        self.pump.abort();
        self.subscription.leave();
    }
}

#[derive(Default)]
struct SyncState {
    spawns: Vec<Spawn>,
    radius_info: Option<RadiusInfo>,
    viewer_location: Option<Coordinates>,
    nearby_error: Option<String>,
    distant: Vec<DistantSpawn>,
    viewport_cache: Option<ViewportCacheEntry>,
    viewport_error: Option<String>,
    subscription: Option<ActiveSubscription>,
}

/// Keeps the local spawn set consistent with the viewer's movement and
/// with server-pushed events: REST fetches for the nearby and viewport
/// layers, one region-scoped realtime subscription, push-event merging,
/// and capture execution.
///
/// All mutable state lives behind one mutex with exactly one logical
/// writer (the cooperative event loop); locks are never held across await
/// points.
pub struct SpawnSynchronizer {
    api: Arc<dyn SpawnApi>,
    feed: Arc<dyn SpawnFeed>,
    state: Arc<Mutex<SyncState>>,
    nearby_ticket: AtomicU64,
    viewport_ttl: Duration,
}

impl SpawnSynchronizer {
    pub fn new(api: Arc<dyn SpawnApi>, feed: Arc<dyn SpawnFeed>, viewport_ttl_seconds: u64) -> Self {
        SpawnSynchronizer {
            api,
            feed,
            state: Arc::new(Mutex::new(SyncState::default())),
            nearby_ticket: AtomicU64::new(0),
            viewport_ttl: Duration::from_secs(viewport_ttl_seconds),
        }
    }

    /// Fetch the interactive spawn set around the viewer. Success replaces
    /// the whole collection, stores the radius policy, records the viewer
    /// location, and rebinds the region subscription when the feed is up.
    /// Failure clears the collection and records the error.
    ///
    /// Each call takes a monotonic ticket; a completion that is no longer
    /// the newest issued call is discarded (returning `Ok`), so stale
    /// responses can never overwrite newer state.
    pub async fn fetch_nearby(&self, lat: f64, lng: f64) -> Result<()> {
        let location = Coordinates::new(lat, lng)?;
        let ticket = self.nearby_ticket.fetch_add(1, Ordering::SeqCst) + 1;

        let outcome = self.api.fetch_nearby(lat, lng).await.and_then(|response| {
            if response.success {
                Ok(response)
            } else {
                Err(ClientError::Network(
                    "Nearby spawns request reported failure".to_string(),
                ))
            }
        });

        if self.nearby_ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!("Discarding superseded nearby fetch (ticket {})", ticket);
            return Ok(());
        }

        match outcome {
            Ok(response) => {
                let count = {
                    let mut state = self.lock_state();
                    state.spawns = response.data.into_iter().map(Spawn::from_row).collect();
                    state.radius_info = Some(response.meta.radius_info);
                    state.viewer_location = Some(location);
                    state.nearby_error = None;
                    state.spawns.len()
                };
                tracing::info!("Fetched {} nearby spawns", count);

                if self.feed.is_connected() {
                    if let Err(e) = self.bind_region(location).await {
                        tracing::warn!("Failed to bind region subscription: {}", e);
                    }
                }
                Ok(())
            }
            Err(e) => {
                let mut state = self.lock_state();
                state.spawns.clear();
                state.radius_info = None;
                state.nearby_error = Some(e.to_string());
                drop(state);
                tracing::warn!("Nearby spawn fetch failed: {}", e);
                Err(e)
            }
        }
    }

    /// Fetch the wide-area viewport layer, serving from the single-slot
    /// cache when the bounds are similar and the TTL holds. A fresh fetch
    /// replaces the slot unconditionally, empty results included.
    pub async fn fetch_viewport(
        &self,
        bounds: ViewportBounds,
        user_lat: f64,
        user_lng: f64,
        force_refresh: bool,
    ) -> Result<()> {
        if !force_refresh {
            let mut state = self.lock_state();

            let expired = matches!(&state.viewport_cache, Some(entry) if Instant::now() >= entry.expires_at);
            if expired {
                tracing::debug!("Viewport cache expired");
                state.viewport_cache = None;
            }

            let cached = state.viewport_cache.as_ref().and_then(|entry| {
                if entry.bounds.is_similar(&bounds) {
                    Some((entry.spawns.clone(), entry.fetched_at.elapsed()))
                } else {
                    tracing::debug!("Viewport moved past tolerance, cache invalid");
                    None
                }
            });

            if let Some((spawns, age)) = cached {
                tracing::debug!(
                    "Viewport cache hit ({} spawns, {}s old)",
                    spawns.len(),
                    age.as_secs()
                );
                state.distant = spawns;
                state.viewport_error = None;
                return Ok(());
            }
        }

        let outcome = self
            .api
            .fetch_viewport(&bounds, user_lat, user_lng)
            .await
            .and_then(|response| {
                if response.success {
                    Ok(response)
                } else {
                    Err(ClientError::Network(
                        "Viewport spawns request reported failure".to_string(),
                    ))
                }
            });

        match outcome {
            Ok(response) => {
                let mut state = self.lock_state();
                let now = Instant::now();
                state.distant = response.data.clone();
                state.viewport_cache = Some(ViewportCacheEntry {
                    spawns: response.data,
                    bounds,
                    fetched_at: now,
                    expires_at: now + self.viewport_ttl,
                });
                state.viewport_error = None;
                tracing::debug!("Cached {} viewport spawns", state.distant.len());
                Ok(())
            }
            Err(e) => {
                let mut state = self.lock_state();
                state.distant.clear();
                state.viewport_error = Some(e.to_string());
                drop(state);
                tracing::warn!("Viewport spawn fetch failed: {}", e);
                Err(e)
            }
        }
    }

    /// Attempt a capture against one cycle. Success removes the entire
    /// spawn owning the cycle; failure leaves local state untouched and
    /// carries the server's stated reason.
    pub async fn capture(&self, cycle_id: i64, lat: f64, lng: f64) -> Result<()> {
        self.api.capture(cycle_id, lat, lng).await?;

        let removed = {
            let mut state = self.lock_state();
            state
                .spawns
                .iter()
                .position(|s| s.owns_cycle(cycle_id))
                .map(|idx| state.spawns.remove(idx))
        };

        match removed {
            Some(spawn) => tracing::info!("Captured cycle {}, removed spawn {}", cycle_id, spawn.id),
            None => tracing::warn!("Captured cycle {} with no local owning spawn", cycle_id),
        }
        Ok(())
    }

    /// Merge a batch of pushed spawn records into the collection: derive
    /// the viewer-relative fields against the current radius policy, drop
    /// records outside the load radius, upsert by id, then purge every
    /// inactive entry across the whole collection.
    pub fn ingest_records(&self, records: Vec<SpawnRecord>) {
        Self::ingest_into(&self.state, records);
    }

    fn ingest_into(state: &Mutex<SyncState>, records: Vec<SpawnRecord>) {
        let mut state = state.lock().expect("sync state poisoned");

        for record in records {
            let position = match Coordinates::new(record.lat, record.lng) {
                Ok(position) => position,
                Err(e) => {
                    tracing::warn!("Dropping spawn {} with invalid position: {}", record.id, e);
                    continue;
                }
            };

            let distance = match (state.viewer_location.as_ref(), state.radius_info.as_ref()) {
                (Some(viewer), Some(_)) => viewer.distance_meters_to(&position),
                _ => 0.0,
            };

            let (capturable, revealed) = match state.radius_info.as_ref() {
                Some(info) => {
                    if !info.within_load(distance) {
                        tracing::debug!(
                            "Spawn {} outside load radius ({:.0}m), discarded",
                            record.id,
                            distance
                        );
                        continue;
                    }
                    (info.capturable(distance), info.revealed(distance))
                }
                None => (false, false),
            };

            let spawn = Spawn::from_record(record, distance, capturable, revealed);
            match state.spawns.iter_mut().find(|s| s.id == spawn.id) {
                Some(existing) => {
                    tracing::debug!("Updated spawn {}", spawn.id);
                    *existing = spawn;
                }
                None => {
                    tracing::debug!("Added spawn {}", spawn.id);
                    state.spawns.push(spawn);
                }
            }
        }

        state.spawns.retain(|s| s.is_active);
    }

    /// Bind the realtime subscription for the viewer's region. Same region
    /// → no-op; different region → the old channel is left before the new
    /// one is joined, so at most one subscription is ever live.
    async fn bind_region(&self, viewer: Coordinates) -> Result<()> {
        let region = Region::from_coordinates(viewer.lat, viewer.lng);

        let previous = {
            let mut state = self.lock_state();
            match &state.subscription {
                Some(active) if active.region == region => {
                    tracing::debug!("Already subscribed to {}", region.channel());
                    return Ok(());
                }
                _ => state.subscription.take(),
            }
        };

        if let Some(old) = previous {
            tracing::info!(
                "Switching from {} to {}",
                old.region.channel(),
                region.channel()
            );
            old.shutdown();
        }

        let mut subscription = self.feed.subscribe(&region.channel()).await?;
        let mut receiver = subscription.take_receiver().ok_or_else(|| {
            ClientError::Transport("subscription receiver already taken".to_string())
        })?;

        let state = self.state.clone();
        let pump = tokio::spawn(async move {
            while let Some(payload) = receiver.recv().await {
                match parse_spawn_event(&payload) {
                    Ok(Some(event)) => Self::ingest_into(&state, vec![event.spawn]),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Ignoring malformed spawn event: {}", e),
                }
            }
        });

        let stale = self.lock_state().subscription.replace(ActiveSubscription {
            region,
            subscription,
            pump,
        });
        // A concurrent bind lost the race; tear its channel down
        if let Some(stale) = stale {
            stale.shutdown();
        }

        Ok(())
    }

    /// Rebind the region subscription for the last fetched viewer location.
    /// No-op until a nearby fetch succeeded or while the feed is down;
    /// call this when the transport (re)connects.
    pub async fn refresh_subscription(&self) -> Result<()> {
        let viewer = self.lock_state().viewer_location;
        match viewer {
            Some(viewer) if self.feed.is_connected() => self.bind_region(viewer).await,
            _ => Ok(()),
        }
    }

    /// Leave the active region channel, if any. Synchronous: no payloads
    /// are merged after this returns.
    pub fn unsubscribe(&self) {
        let active = self.lock_state().subscription.take();
        if let Some(active) = active {
            tracing::info!("Leaving {}", active.region.channel());
            active.shutdown();
        }
    }

    /// Drop the nearby collection, radius policy, and subscription.
    pub fn clear(&self) {
        self.unsubscribe();
        let mut state = self.lock_state();
        state.spawns.clear();
        state.radius_info = None;
        state.viewer_location = None;
        state.nearby_error = None;
    }

    /// Drop the viewport layer and its cache slot.
    pub fn clear_distant(&self) {
        let mut state = self.lock_state();
        state.distant.clear();
        state.viewport_cache = None;
        state.viewport_error = None;
    }

    // --- Read model ---

    pub fn spawns(&self) -> Vec<Spawn> {
        self.lock_state().spawns.clone()
    }

    pub fn spawn_by_id(&self, spawn_id: i64) -> Option<Spawn> {
        self.lock_state().spawns.iter().find(|s| s.id == spawn_id).cloned()
    }

    pub fn capturable_spawns(&self) -> Vec<Spawn> {
        self.lock_state()
            .spawns
            .iter()
            .filter(|s| s.capturable)
            .cloned()
            .collect()
    }

    /// Spawns ordered nearest-first.
    pub fn spawns_by_distance(&self) -> Vec<Spawn> {
        let mut spawns = self.spawns();
        spawns.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        spawns
    }

    /// Total capture opportunities across the collection.
    pub fn active_companion_count(&self) -> usize {
        self.lock_state()
            .spawns
            .iter()
            .map(|s| s.active_cycles.len())
            .sum()
    }

    pub fn distant_spawns(&self) -> Vec<DistantSpawn> {
        self.lock_state().distant.clone()
    }

    pub fn radius_info(&self) -> Option<RadiusInfo> {
        self.lock_state().radius_info
    }

    pub fn nearby_error(&self) -> Option<String> {
        self.lock_state().nearby_error.clone()
    }

    pub fn viewport_error(&self) -> Option<String> {
        self.lock_state().viewport_error.clone()
    }

    pub fn current_region(&self) -> Option<Region> {
        self.lock_state().subscription.as_ref().map(|s| s.region)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SyncState> {
        self.state.lock().expect("sync state poisoned")
    }
}

impl Drop for SpawnSynchronizer {
    fn drop(&mut self) {
        let active = self.lock_state().subscription.take();
        if let Some(active) = active {
            active.shutdown();
        }
    }
}
