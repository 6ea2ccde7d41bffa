//! End-to-end spawn synchronization scenarios over the in-process feed and
//! a scripted geolocation provider. No network.

use async_trait::async_trait;
use gohunt::error::{ClientError, Result};
use gohunt::geoloc::ReplayProvider;
use gohunt::models::spawn::{NearbyMeta, SearchLocation};
use gohunt::models::{
    DistantSpawnsResponse, NearbySpawnRow, NearbySpawnsResponse, RadiusInfo, Region, SpawnRecord,
    ViewportBounds,
};
use gohunt::realtime::MemoryFeed;
use gohunt::services::{LocationTracker, SpawnApi, SpawnSynchronizer};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

mod common;

const PARIS: (f64, f64) = (48.8566, 2.3522);

fn record(id: i64, lat: f64, lng: f64, active: bool) -> SpawnRecord {
    SpawnRecord {
        id,
        lat,
        lng,
        places_address: format!("Spot {}", id),
        spawned_at: OffsetDateTime::UNIX_EPOCH,
        expires_at: None,
        is_active: active,
        active_cycles: Vec::new(),
    }
}

fn nearby_response(rows: Vec<NearbySpawnRow>) -> NearbySpawnsResponse {
    NearbySpawnsResponse {
        success: true,
        meta: NearbyMeta {
            count: rows.len() as u64,
            search_location: SearchLocation {
                lat: "0".to_string(),
                lng: "0".to_string(),
            },
            radius_info: RadiusInfo {
                capture_radius_meters: 40.0,
                discovery_radius_meters: 100.0,
                load_radius_meters: 500.0,
            },
        },
        data: rows,
    }
}

fn event_json(record: &SpawnRecord) -> String {
    serde_json::json!({
        "event": ".spawn-cycle.created",
        "data": { "spawn": record }
    })
    .to_string()
}

/// Scripted spawn API: pops queued responses, counts calls.
#[derive(Default)]
struct ScriptedApi {
    nearby_queue: Mutex<VecDeque<NearbySpawnsResponse>>,
}

impl ScriptedApi {
    fn push_nearby(&self, response: NearbySpawnsResponse) {
        self.nearby_queue.lock().unwrap().push_back(response);
    }

    fn pending_nearby(&self) -> usize {
        self.nearby_queue.lock().unwrap().len()
    }
}

#[async_trait]
impl SpawnApi for ScriptedApi {
    async fn fetch_nearby(&self, _lat: f64, _lng: f64) -> Result<NearbySpawnsResponse> {
        self.nearby_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ClientError::Network("no scripted response".to_string()))
    }

    async fn fetch_viewport(
        &self,
        _bounds: &ViewportBounds,
        _user_lat: f64,
        _user_lng: f64,
    ) -> Result<DistantSpawnsResponse> {
        Ok(DistantSpawnsResponse {
            success: true,
            data: Vec::new(),
        })
    }

    async fn capture(&self, _cycle_id: i64, _lat: f64, _lng: f64) -> Result<()> {
        Ok(())
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn push_events_reconcile_with_fetched_state() {
    let api = Arc::new(ScriptedApi::default());
    let feed = Arc::new(MemoryFeed::new());
    api.push_nearby(nearby_response(vec![]));

    let sync = Arc::new(SpawnSynchronizer::new(api, feed.clone(), 120));
    sync.fetch_nearby(PARIS.0, PARIS.1).await.unwrap();
    assert_eq!(sync.current_region(), Some(Region::Europe));

    // In capture range: added, capturable, revealed
    feed.publish(
        "spawn-cycles.europe",
        &event_json(&record(1, PARIS.0 + 0.0002, PARIS.1, true)),
    );
    wait_until(|| sync.spawn_by_id(1).is_some()).await;
    let spawn = sync.spawn_by_id(1).unwrap();
    assert!(spawn.capturable && spawn.revealed);
    assert!(spawn.distance > 0.0);

    // Outside the load radius: silently discarded
    feed.publish(
        "spawn-cycles.europe",
        &event_json(&record(2, PARIS.0 + 0.02, PARIS.1, true)),
    );
    // Deactivation of spawn 1 flows through the same channel
    feed.publish(
        "spawn-cycles.europe",
        &event_json(&record(1, PARIS.0 + 0.0002, PARIS.1, false)),
    );
    wait_until(|| sync.spawn_by_id(1).is_none()).await;
    assert!(sync.spawn_by_id(2).is_none());
}

#[tokio::test]
async fn movement_past_threshold_drives_refetch_loop() {
    let api = Arc::new(ScriptedApi::default());
    let feed = Arc::new(MemoryFeed::new());
    // Initial fetch plus one movement-triggered refetch
    api.push_nearby(nearby_response(vec![]));
    api.push_nearby(nearby_response(vec![]));

    let sync = Arc::new(SpawnSynchronizer::new(api.clone(), feed, 120));

    // ~22m steps north: the third step crosses the 50m threshold
    let provider = ReplayProvider::from_path(
        &[
            (PARIS.0, PARIS.1),
            (PARIS.0 + 0.0002, PARIS.1),
            (PARIS.0 + 0.0004, PARIS.1),
            (PARIS.0 + 0.0006, PARIS.1),
        ],
        Duration::from_millis(20),
    );
    let tracker = Arc::new(LocationTracker::new(Arc::new(provider)));

    // Wire movement to refetching the way the assembled client does
    {
        let sync = sync.clone();
        let odometer = Arc::downgrade(&tracker);
        tracker.on_refetch_required(move |location, _distance| {
            let sync = sync.clone();
            let odometer = odometer.clone();
            tokio::spawn(async move {
                if sync.fetch_nearby(location.lat, location.lng).await.is_ok() {
                    if let Some(tracker) = odometer.upgrade() {
                        tracker.mark_fetched(Some(location));
                    }
                }
            });
        });
    }

    sync.fetch_nearby(PARIS.0, PARIS.1).await.unwrap();
    tracker.mark_fetched(Some(
        gohunt::models::Coordinates::new(PARIS.0, PARIS.1).unwrap(),
    ));
    tracker.start_tracking().unwrap();

    // The walk consumes the second scripted response via the refetch loop
    wait_until(|| api.pending_nearby() == 0).await;

    tracker.stop_tracking();
    assert_eq!(sync.current_region(), Some(Region::Europe));
    // The odometer was reset at the refetch location
    assert!(tracker.distance_since_last_fetch() < 50.0);
}

#[tokio::test]
async fn teardown_is_quiescent() {
    let api = Arc::new(ScriptedApi::default());
    let feed = Arc::new(MemoryFeed::new());
    api.push_nearby(nearby_response(vec![]));

    let sync = Arc::new(SpawnSynchronizer::new(api, feed.clone(), 120));
    sync.fetch_nearby(PARIS.0, PARIS.1).await.unwrap();
    assert_eq!(sync.current_region(), Some(Region::Europe));

    sync.unsubscribe();

    // Events published after teardown never reach the collection
    feed.publish(
        "spawn-cycles.europe",
        &event_json(&record(3, PARIS.0, PARIS.1, true)),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sync.spawn_by_id(3).is_none());
    assert_eq!(sync.current_region(), None);
}
