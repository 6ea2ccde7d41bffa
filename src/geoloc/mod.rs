//! Platform geolocation boundary.
//!
//! The tracker never talks to a concrete positioning stack; it is handed a
//! [`GeolocationProvider`] and registers a callback for pushed samples.
//! Providers classify their own failures into
//! [`GeolocationErrorKind`](crate::error::GeolocationErrorKind) and own the
//! one-shot request timeout (10 s).

pub mod replay;

use crate::error::GeolocationErrorKind;
use crate::models::Coordinates;
use async_trait::async_trait;

pub use replay::ReplayProvider;

/// One position sample as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub position: Coordinates,
    pub accuracy_meters: Option<f64>,
}

impl PositionSample {
    pub fn new(position: Coordinates) -> Self {
        PositionSample {
            position,
            accuracy_meters: None,
        }
    }
}

pub type SampleResult = std::result::Result<PositionSample, GeolocationErrorKind>;

/// Callback invoked for every pushed sample or watch-level error.
pub type SampleCallback = Box<dyn Fn(SampleResult) + Send + Sync>;

/// Handle to an active continuous watch. `stop()` (or dropping the handle)
/// deregisters the platform callback immediately; no samples are delivered
/// afterwards.
pub struct WatchHandle {
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        WatchHandle {
            stop: Some(Box::new(stop)),
        }
    }

    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Whether this platform can produce positions at all. `false` maps to
    /// the `NotSupported` condition on the tracker.
    fn supported(&self) -> bool {
        true
    }

    /// One-shot position fix, subject to the provider's ambient timeout.
    async fn current_position(&self) -> SampleResult;

    /// Register a continuous watch. Samples arrive push-based with
    /// arbitrary inter-arrival timing until the handle is stopped.
    fn watch(&self, callback: SampleCallback)
        -> std::result::Result<WatchHandle, GeolocationErrorKind>;
}
