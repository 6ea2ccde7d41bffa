use crate::error::GeolocationErrorKind;
use crate::geoloc::{GeolocationProvider, PositionSample, SampleCallback, SampleResult, WatchHandle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deterministic provider that replays a scripted sample sequence.
///
/// Used by tests and by the probe binary, where no real positioning stack
/// exists. Samples are pushed in order with a fixed inter-arrival delay;
/// error entries exercise the tracker's failure paths.
pub struct ReplayProvider {
    samples: Vec<SampleResult>,
    interval: Duration,
    supported: bool,
}

impl ReplayProvider {
    pub fn new(samples: Vec<SampleResult>, interval: Duration) -> Self {
        ReplayProvider {
            samples,
            interval,
            supported: true,
        }
    }

    /// A provider that reports the platform as lacking geolocation.
    pub fn unsupported() -> Self {
        ReplayProvider {
            samples: Vec::new(),
            interval: Duration::ZERO,
            supported: false,
        }
    }

    /// Convenience: replay a path of raw coordinates.
    pub fn from_path(path: &[(f64, f64)], interval: Duration) -> Self {
        let samples = path
            .iter()
            .filter_map(|&(lat, lng)| crate::models::Coordinates::new(lat, lng).ok())
            .map(|position| Ok(PositionSample::new(position)))
            .collect();
        ReplayProvider::new(samples, interval)
    }
}

#[async_trait]
impl GeolocationProvider for ReplayProvider {
    fn supported(&self) -> bool {
        self.supported
    }

    async fn current_position(&self) -> SampleResult {
        if !self.supported {
            return Err(GeolocationErrorKind::NotSupported);
        }
        match self.samples.first() {
            Some(sample) => *sample,
            None => Err(GeolocationErrorKind::PositionUnavailable),
        }
    }

    fn watch(
        &self,
        callback: SampleCallback,
    ) -> std::result::Result<WatchHandle, GeolocationErrorKind> {
        if !self.supported {
            return Err(GeolocationErrorKind::NotSupported);
        }

        let samples = self.samples.clone();
        let interval = self.interval;
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancelled.clone();

        let task = tokio::spawn(async move {
            for sample in samples {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                callback(sample);
                tokio::time::sleep(interval).await;
            }
        });

        Ok(WatchHandle::new(move || {
            cancel_flag.store(true, Ordering::SeqCst);
            task.abort();
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use std::sync::Mutex;

    fn sample(lat: f64, lng: f64) -> SampleResult {
        Ok(PositionSample::new(Coordinates::new(lat, lng).unwrap()))
    }

    #[tokio::test]
    async fn replays_all_samples_in_order() {
        let provider = ReplayProvider::new(
            vec![sample(0.0, 0.0), sample(0.0, 0.001), sample(0.0, 0.002)],
            Duration::ZERO,
        );

        let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = provider
            .watch(Box::new(move |result| {
                if let Ok(s) = result {
                    sink.lock().unwrap().push(s.position.lng);
                }
            }))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.001, 0.002]);
    }

    #[tokio::test]
    async fn stop_halts_delivery() {
        let provider = ReplayProvider::new(
            vec![sample(0.0, 0.0), sample(0.0, 0.001), sample(0.0, 0.002)],
            Duration::from_millis(30),
        );

        let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = provider
            .watch(Box::new(move |result| {
                if let Ok(s) = result {
                    sink.lock().unwrap().push(s.position.lng);
                }
            }))
            .unwrap();

        // Let the first sample through, then stop before the rest arrive
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let delivered = seen.lock().unwrap().len();
        assert!(delivered < 3, "expected delivery to stop, saw {}", delivered);
    }

    #[tokio::test]
    async fn unsupported_provider() {
        let provider = ReplayProvider::unsupported();
        assert!(!provider.supported());
        assert_eq!(
            provider.current_position().await,
            Err(GeolocationErrorKind::NotSupported)
        );
        assert!(provider.watch(Box::new(|_| {})).is_err());
    }

    #[test]
    fn one_shot_returns_first_sample() {
        tokio_test::block_on(async {
            let provider = ReplayProvider::new(vec![sample(14.5995, 120.9842)], Duration::ZERO);
            let fix = provider.current_position().await.unwrap();
            assert_eq!(fix.position.lat, 14.5995);

            let empty = ReplayProvider::new(vec![], Duration::ZERO);
            assert_eq!(
                empty.current_position().await,
                Err(GeolocationErrorKind::PositionUnavailable)
            );
        });
    }
}
