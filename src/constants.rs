//! Stable application-wide constants.
//!
//! Values here are structural invariants of the spawn synchronization
//! protocol and default fallbacks for env-var-based configuration. They
//! should rarely change. Deployment-specific knobs live in
//! [`Config`](crate::config::Config) instead.

// --- Geo grid ---

/// Grid cell size in degrees (~111 m at the equator). The backend partitions
/// spawns with the same constant, so changing it breaks cell identity.
pub const GRID_CELL_SIZE_DEG: f64 = 0.001;

/// Mean Earth radius in meters, used by the Haversine distance everywhere.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// --- Location tracking ---

/// Movement (meters, Haversine) from the last marked fetch location that
/// triggers the refetch-required callback.
pub const REFETCH_DISTANCE_THRESHOLD_METERS: f64 = 50.0;

/// Upper bound (seconds) a one-shot position request may take before the
/// provider reports `Timeout`.
pub const GEOLOCATION_TIMEOUT_SECONDS: u64 = 10;

// --- Viewport spawn cache ---

/// Default TTL for the single-slot viewport spawn cache: 2 minutes.
/// Overridden by `VIEWPORT_CACHE_TTL`.
pub const DEFAULT_VIEWPORT_CACHE_TTL_SECONDS: u64 = 120;

/// Per-edge tolerance (degrees, ~1 km) under which two viewport bounding
/// boxes are considered equivalent for cache reuse.
pub const VIEWPORT_BOUNDS_TOLERANCE_DEG: f64 = 0.01;

// --- Real-time channels ---

/// Channel name prefix; the resolved region name is appended as
/// `spawn-cycles.{region}`.
pub const SPAWN_CHANNEL_PREFIX: &str = "spawn-cycles";

/// Event name broadcast on spawn channels when a cycle is created.
pub const SPAWN_CYCLE_CREATED_EVENT: &str = ".spawn-cycle.created";

// --- Session persistence ---

/// Stored bearer tokens older than this are discarded on restore: 7 days.
pub const TOKEN_MAX_AGE_SECONDS: i64 = 60 * 60 * 24 * 7;

/// Default session file location. Overridden by `TOKEN_STORE_PATH`.
pub const DEFAULT_TOKEN_STORE_PATH: &str = "gohunt-session.json";
