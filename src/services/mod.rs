pub mod api;
pub mod auth;
pub mod location_tracker;
pub mod spawn_api;
pub mod spawn_sync;

pub use api::ApiClient;
pub use auth::{AuthService, Session, User};
pub use location_tracker::{LocationTracker, LocationUpdate, TrackingSnapshot};
pub use spawn_api::{HttpSpawnApi, SpawnApi};
pub use spawn_sync::SpawnSynchronizer;
