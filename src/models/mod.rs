pub mod coordinates;
pub mod grid;
pub mod region;
pub mod spawn;

pub use coordinates::Coordinates;
pub use grid::GridCell;
pub use region::Region;
pub use spawn::{
    ActiveCycle, CompanionSummary, DistantSpawn, DistantSpawnsResponse, NearbySpawnRow,
    NearbySpawnsResponse, RadiusInfo, Rarity, Spawn, SpawnRecord, ViewportBounds,
};
