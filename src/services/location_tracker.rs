use crate::constants::REFETCH_DISTANCE_THRESHOLD_METERS;
use crate::error::{ClientError, GeolocationErrorKind, Result};
use crate::geoloc::{GeolocationProvider, WatchHandle};
use crate::models::Coordinates;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// One processed position sample, as handed to the location-updated
/// callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationUpdate {
    pub position: Coordinates,
    pub accuracy_meters: Option<f64>,
    pub timestamp: OffsetDateTime,
}

/// Snapshot of the tracker's state. Single-writer: only the tracker
/// mutates it, consumers read copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingSnapshot {
    pub current_location: Option<Coordinates>,
    pub last_fetch_location: Option<Coordinates>,
    pub distance_since_last_fetch: f64,
    pub tracking: bool,
    pub last_error: Option<GeolocationErrorKind>,
}

type UpdateCallback = Box<dyn Fn(&LocationUpdate) + Send + Sync>;
type RefetchCallback = Box<dyn Fn(Coordinates, f64) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(GeolocationErrorKind) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_location_update: Option<UpdateCallback>,
    on_refetch_required: Option<RefetchCallback>,
    on_tracking_error: Option<ErrorCallback>,
}

/// Continuous position-sampling state machine: Idle until a watch is
/// registered on the injected provider, Tracking until stopped.
///
/// Every pushed sample updates the odometer against the last location at
/// which a fetch was *marked* done; crossing 50 m fires the
/// refetch-required callback. The callback never resets the odometer;
/// the consumer calls [`LocationTracker::mark_fetched`] once it acted.
pub struct LocationTracker {
    provider: Arc<dyn GeolocationProvider>,
    state: Arc<Mutex<TrackingSnapshot>>,
    callbacks: Arc<Mutex<Callbacks>>,
    watch: Mutex<Option<WatchHandle>>,
}

impl LocationTracker {
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        LocationTracker {
            provider,
            state: Arc::new(Mutex::new(TrackingSnapshot::default())),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
            watch: Mutex::new(None),
        }
    }

    pub fn on_location_update(&self, callback: impl Fn(&LocationUpdate) + Send + Sync + 'static) {
        self.lock_callbacks().on_location_update = Some(Box::new(callback));
    }

    pub fn on_refetch_required(&self, callback: impl Fn(Coordinates, f64) + Send + Sync + 'static) {
        self.lock_callbacks().on_refetch_required = Some(Box::new(callback));
    }

    pub fn on_tracking_error(
        &self,
        callback: impl Fn(GeolocationErrorKind) + Send + Sync + 'static,
    ) {
        self.lock_callbacks().on_tracking_error = Some(Box::new(callback));
    }

    /// Idle → Tracking. Reports `NotSupported` (and stays Idle) when the
    /// platform has no geolocation capability; starting while already
    /// Tracking is a no-op.
    pub fn start_tracking(&self) -> Result<()> {
        if !self.provider.supported() {
            return Err(self.report_error(GeolocationErrorKind::NotSupported));
        }

        if self.lock_state().tracking {
            tracing::debug!("Location tracking already active");
            return Ok(());
        }

        let state = self.state.clone();
        let callbacks = self.callbacks.clone();

        let handle = self
            .provider
            .watch(Box::new(move |sample| match sample {
                Ok(sample) => {
                    state.lock().expect("tracking state poisoned").last_error = None;
                    Self::apply_sample(
                        &state,
                        &callbacks,
                        sample.position,
                        sample.accuracy_meters,
                    );
                }
                Err(kind) => {
                    tracing::warn!("Location watch error: {}", kind);
                    state.lock().expect("tracking state poisoned").last_error = Some(kind);
                    if let Some(cb) = &callbacks
                        .lock()
                        .expect("tracking callbacks poisoned")
                        .on_tracking_error
                    {
                        cb(kind);
                    }
                }
            }))
            .map_err(|kind| match kind {
                GeolocationErrorKind::NotSupported => {
                    self.report_error(GeolocationErrorKind::NotSupported)
                }
                _ => self.report_error(GeolocationErrorKind::StartFailed),
            })?;

        *self.watch.lock().expect("watch handle poisoned") = Some(handle);
        {
            let mut state = self.lock_state();
            state.tracking = true;
            state.last_error = None;
        }

        tracing::info!("Location tracking started");
        Ok(())
    }

    /// Tracking → Idle. The platform callback is deregistered immediately;
    /// no samples are delivered after this returns.
    pub fn stop_tracking(&self) {
        if let Some(handle) = self.watch.lock().expect("watch handle poisoned").take() {
            handle.stop();
        }
        self.lock_state().tracking = false;
        tracing::info!("Location tracking stopped");
    }

    /// One-shot position fix through the same update-and-callback path as
    /// continuous samples. Does not change the Idle/Tracking state.
    pub async fn get_current_location(&self) -> Result<Coordinates> {
        match self.provider.current_position().await {
            Ok(sample) => {
                Self::apply_sample(
                    &self.state,
                    &self.callbacks,
                    sample.position,
                    sample.accuracy_meters,
                );
                Ok(sample.position)
            }
            Err(kind) => Err(ClientError::Geolocation(kind)),
        }
    }

    /// Feed one position sample through the tracker. Continuous watches
    /// call this internally; it is public so one-shot flows from other
    /// sources funnel through the same path.
    pub fn update_location(&self, position: Coordinates, accuracy_meters: Option<f64>) {
        Self::apply_sample(&self.state, &self.callbacks, position, accuracy_meters);
    }

    /// Record that spawns were fetched at `location` (defaults to the
    /// current location), resetting the odometer.
    pub fn mark_fetched(&self, location: Option<Coordinates>) {
        let mut state = self.lock_state();
        let fetch_location = location.or(state.current_location);

        if let Some(fetch_location) = fetch_location {
            state.last_fetch_location = Some(fetch_location);
            state.distance_since_last_fetch = 0.0;
            tracing::debug!(
                "Spawns fetched at {:.6}, {:.6}",
                fetch_location.lat,
                fetch_location.lng
            );
        }
    }

    /// Stop and forget all tracking state.
    pub fn reset(&self) {
        self.stop_tracking();
        *self.lock_state() = TrackingSnapshot::default();
    }

    /// Haversine meters from the current location to `target`; `None` when
    /// the current location is unknown.
    pub fn distance_to(&self, target: &Coordinates) -> Option<f64> {
        self.lock_state()
            .current_location
            .map(|current| current.distance_meters_to(target))
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.lock_state().clone()
    }

    pub fn current_location(&self) -> Option<Coordinates> {
        self.lock_state().current_location
    }

    pub fn is_tracking(&self) -> bool {
        self.lock_state().tracking
    }

    pub fn distance_since_last_fetch(&self) -> f64 {
        self.lock_state().distance_since_last_fetch
    }

    pub fn should_refetch(&self) -> bool {
        let state = self.lock_state();
        state.last_fetch_location.is_some()
            && state.distance_since_last_fetch >= REFETCH_DISTANCE_THRESHOLD_METERS
    }

    fn apply_sample(
        state: &Mutex<TrackingSnapshot>,
        callbacks: &Mutex<Callbacks>,
        position: Coordinates,
        accuracy_meters: Option<f64>,
    ) {
        let (distance, has_fetch_location) = {
            let mut state = state.lock().expect("tracking state poisoned");
            let distance = match state.last_fetch_location {
                Some(fetch_location) => fetch_location.distance_meters_to(&position),
                None => 0.0,
            };
            state.current_location = Some(position);
            state.distance_since_last_fetch = distance;
            (distance, state.last_fetch_location.is_some())
        };

        let update = LocationUpdate {
            position,
            accuracy_meters,
            timestamp: OffsetDateTime::now_utc(),
        };

        let callbacks = callbacks.lock().expect("tracking callbacks poisoned");
        if let Some(cb) = &callbacks.on_location_update {
            cb(&update);
        }

        if has_fetch_location && distance >= REFETCH_DISTANCE_THRESHOLD_METERS {
            tracing::debug!("Moved {:.1}m since last fetch, refetch required", distance);
            if let Some(cb) = &callbacks.on_refetch_required {
                cb(position, distance);
            }
        }
    }

    fn report_error(&self, kind: GeolocationErrorKind) -> ClientError {
        self.lock_state().last_error = Some(kind);
        if let Some(cb) = &self.lock_callbacks().on_tracking_error {
            cb(kind);
        }
        ClientError::Geolocation(kind)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TrackingSnapshot> {
        self.state.lock().expect("tracking state poisoned")
    }

    fn lock_callbacks(&self) -> std::sync::MutexGuard<'_, Callbacks> {
        self.callbacks.lock().expect("tracking callbacks poisoned")
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.watch.lock().expect("watch handle poisoned").take() {
            handle.stop();
        }
    }
}
