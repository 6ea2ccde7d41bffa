use crate::constants::SPAWN_CHANNEL_PREFIX;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse geographic partitions used to scope real-time spawn channels.
/// The boxes are deliberately rough: they only need to split broadcast
/// traffic, not describe geography. Points covered by no box fall through
/// to [`Region::Global`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    NorthAmerica,
    SouthAmerica,
    Europe,
    NorthAfrica,
    SouthernAfrica,
    AsiaPacific,
    SoutheastAsia,
    Oceania,
    Global,
}

struct RegionBounds {
    region: Region,
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
}

impl RegionBounds {
    const fn new(region: Region, lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Self {
        RegionBounds {
            region,
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        }
    }

    fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lng >= self.lng_min && lng <= self.lng_max
    }

    fn area(&self) -> f64 {
        (self.lat_max - self.lat_min) * (self.lng_max - self.lng_min)
    }
}

/// Declaration order breaks area ties in [`Region::from_coordinates`].
/// Africa is split at 4°N / 8°E so the equatorial Atlantic stays uncovered;
/// subscribers there land on the global channel.
const REGION_TABLE: &[RegionBounds] = &[
    RegionBounds::new(Region::NorthAmerica, 15.0, 72.0, -168.0, -52.0),
    RegionBounds::new(Region::SouthAmerica, -56.0, 15.0, -82.0, -34.0),
    RegionBounds::new(Region::Europe, 36.0, 71.0, -10.0, 40.0),
    RegionBounds::new(Region::NorthAfrica, 4.0, 37.0, -18.0, 52.0),
    RegionBounds::new(Region::SouthernAfrica, -35.0, 4.0, 8.0, 52.0),
    RegionBounds::new(Region::AsiaPacific, -10.0, 55.0, 60.0, 180.0),
    RegionBounds::new(Region::SoutheastAsia, -10.0, 25.0, 95.0, 140.0),
    RegionBounds::new(Region::Oceania, -47.0, -10.0, 110.0, 180.0),
];

impl Region {
    /// Resolve a coordinate to its region. Where boxes overlap, the smallest
    /// (most specific) one wins. Total: unmatched points resolve to `Global`.
    pub fn from_coordinates(lat: f64, lng: f64) -> Region {
        let mut best: Option<(f64, Region)> = None;

        for bounds in REGION_TABLE {
            if !bounds.contains(lat, lng) {
                continue;
            }
            let area = bounds.area();
            match best {
                Some((best_area, _)) if area >= best_area => {}
                _ => best = Some((area, bounds.region)),
            }
        }

        best.map(|(_, region)| region).unwrap_or(Region::Global)
    }

    /// Real-time channel carrying this region's spawn-cycle events.
    pub fn channel(&self) -> String {
        format!("{}.{}", SPAWN_CHANNEL_PREFIX, self)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::NorthAmerica => "north-america",
            Region::SouthAmerica => "south-america",
            Region::Europe => "europe",
            Region::NorthAfrica => "north-africa",
            Region::SouthernAfrica => "southern-africa",
            Region::AsiaPacific => "asia-pacific",
            Region::SoutheastAsia => "southeast-asia",
            Region::Oceania => "oceania",
            Region::Global => "global",
        };
        write!(f, "{}", s)
    }
}
