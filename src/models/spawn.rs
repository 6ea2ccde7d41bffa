use crate::constants::VIEWPORT_BOUNDS_TOLERANCE_DEG;
use crate::error::Result;
use crate::models::Coordinates;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// The slice of a companion the spawn feed carries. Full companion profiles
/// (images, personality, traits) belong to the collection screens, not to
/// spawn synchronization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanionSummary {
    pub id: i64,
    pub name: String,
    pub rarity: Rarity,
    pub rarity_label: String,
}

/// One capture opportunity attached to a spawn, with its own capture-count
/// limit. A capture targets a cycle id; a successful capture removes the
/// whole owning spawn from local state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveCycle {
    pub id: i64,
    pub companion: CompanionSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub capture_limit: u32,
    pub current_captures: u32,
    pub remaining_captures: u32,
    pub is_active: bool,
}

/// Raw spawn shape shared by REST rows and push payloads: position,
/// address, lifecycle timestamps, and the cycle list. Push events carry
/// exactly this; REST rows add the server-computed viewer-relative fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpawnRecord {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    pub places_address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub spawned_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub is_active: bool,
    #[serde(default)]
    pub active_cycles: Vec<ActiveCycle>,
}

/// One row of `GET /nearby/spawns`: a [`SpawnRecord`] plus the fields the
/// server derived from the search location.
#[derive(Debug, Clone, Deserialize)]
pub struct NearbySpawnRow {
    #[serde(flatten)]
    pub record: SpawnRecord,
    pub distance: f64,
    pub capturable: bool,
    pub show_silhouette: bool,
}

/// A spawn as the client tracks it. `distance`, `capturable`, and
/// `revealed` are viewer-relative: REST rows carry them server-computed,
/// push events get them re-derived against the current [`RadiusInfo`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Spawn {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    /// Meters from the viewer; 0 when unknown.
    pub distance: f64,
    pub capturable: bool,
    /// Inverse of the wire's `show_silhouette`: true once the companion is
    /// within discovery range and rendered without the silhouette.
    pub revealed: bool,
    pub spawned_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub is_active: bool,
    pub active_cycles: Vec<ActiveCycle>,
}

impl Spawn {
    pub fn from_row(row: NearbySpawnRow) -> Self {
        Spawn {
            id: row.record.id,
            lat: row.record.lat,
            lng: row.record.lng,
            address: row.record.places_address,
            distance: row.distance,
            capturable: row.capturable,
            revealed: !row.show_silhouette,
            spawned_at: row.record.spawned_at,
            expires_at: row.record.expires_at,
            is_active: row.record.is_active,
            active_cycles: row.record.active_cycles,
        }
    }

    pub fn from_record(record: SpawnRecord, distance: f64, capturable: bool, revealed: bool) -> Self {
        Spawn {
            id: record.id,
            lat: record.lat,
            lng: record.lng,
            address: record.places_address,
            distance,
            capturable,
            revealed,
            spawned_at: record.spawned_at,
            expires_at: record.expires_at,
            is_active: record.is_active,
            active_cycles: record.active_cycles,
        }
    }

    pub fn position(&self) -> Result<Coordinates> {
        Coordinates::new(self.lat, self.lng)
    }

    /// Whether any of this spawn's cycles has the given id.
    pub fn owns_cycle(&self, cycle_id: i64) -> bool {
        self.active_cycles.iter().any(|c| c.id == cycle_id)
    }
}

/// Server-declared thresholds governing client-side spawn classification,
/// authoritative from one nearby fetch until the next.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RadiusInfo {
    pub capture_radius_meters: f64,
    pub discovery_radius_meters: f64,
    pub load_radius_meters: f64,
}

impl RadiusInfo {
    pub fn within_load(&self, distance_meters: f64) -> bool {
        distance_meters <= self.load_radius_meters
    }

    pub fn capturable(&self, distance_meters: f64) -> bool {
        distance_meters <= self.capture_radius_meters
    }

    pub fn revealed(&self, distance_meters: f64) -> bool {
        distance_meters <= self.discovery_radius_meters
    }
}

/// `search_location` echo in the nearby-spawns meta. The server stringifies
/// the coordinates; keep them verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchLocation {
    pub lat: String,
    pub lng: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbyMeta {
    pub count: u64,
    pub search_location: SearchLocation,
    pub radius_info: RadiusInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbySpawnsResponse {
    pub success: bool,
    pub data: Vec<NearbySpawnRow>,
    pub meta: NearbyMeta,
}

/// A spawn on the wide-area map layer: position only, no interaction data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DistantSpawn {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistantSpawnsResponse {
    pub success: bool,
    pub data: Vec<DistantSpawn>,
}

/// Map viewport corners as sent to `GET /viewport/spawns`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewportBounds {
    pub ne_lat: f64,
    pub ne_lng: f64,
    pub sw_lat: f64,
    pub sw_lng: f64,
}

impl ViewportBounds {
    /// Whether another viewport is close enough to reuse cached results:
    /// every one of the four edges must differ by less than the tolerance.
    pub fn is_similar(&self, other: &ViewportBounds) -> bool {
        (self.ne_lat - other.ne_lat).abs() < VIEWPORT_BOUNDS_TOLERANCE_DEG
            && (self.ne_lng - other.ne_lng).abs() < VIEWPORT_BOUNDS_TOLERANCE_DEG
            && (self.sw_lat - other.sw_lat).abs() < VIEWPORT_BOUNDS_TOLERANCE_DEG
            && (self.sw_lng - other.sw_lng).abs() < VIEWPORT_BOUNDS_TOLERANCE_DEG
    }
}
