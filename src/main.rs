use gohunt::config::Config;
use gohunt::geoloc::{GeolocationProvider, ReplayProvider};
use gohunt::models::Coordinates;
use gohunt::realtime::{MemoryFeed, RedisFeed, SpawnFeed};
use gohunt::GameClient;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line probe: logs in (or resumes a session), fetches the spawn
/// set around a fixed coordinate, binds the region channel, and walks a
/// scripted path so the movement-refetch loop is exercised end to end.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gohunt=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;

    tracing::info!("Starting GoHunt spawn probe");

    // Probe start coordinates (defaults to central Paris)
    let lat: f64 = std::env::var("PROBE_LAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(48.8566);
    let lng: f64 = std::env::var("PROBE_LNG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2.3522);
    let start = Coordinates::new(lat, lng)?;

    // Realtime feed: try redis, fall back to the in-process broker
    let feed: Arc<dyn SpawnFeed> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Connecting realtime transport...");
            match RedisFeed::connect(url).await {
                Ok(feed) => Arc::new(feed),
                Err(e) => {
                    tracing::warn!(
                        "Failed to connect realtime transport: {}. Falling back to in-process feed.",
                        e
                    );
                    Arc::new(MemoryFeed::new())
                }
            }
        }
        None => {
            tracing::info!("REDIS_URL not configured. Using in-process feed.");
            Arc::new(MemoryFeed::new())
        }
    };

    // Scripted walk drifting north in ~22m steps, enough to cross the
    // refetch threshold every few samples
    let path: Vec<(f64, f64)> = (0..20).map(|i| (lat + i as f64 * 0.0002, lng)).collect();
    let provider: Arc<dyn GeolocationProvider> =
        Arc::new(ReplayProvider::from_path(&path, Duration::from_secs(3)));

    let client = GameClient::new(&config, provider, feed);

    // Resume a stored session, or log in with probe credentials when given
    if client.auth.restore().await?.is_none() {
        match (
            std::env::var("PROBE_USERNAME"),
            std::env::var("PROBE_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => {
                let user = client.auth.login(&username, &password).await?;
                tracing::info!("Probe running as {}", user.full_name);
            }
            _ => tracing::info!("No stored session or probe credentials; running unauthenticated"),
        }
    }

    client.tracker.on_location_update(|update| {
        tracing::debug!(
            "Position {:.6}, {:.6}",
            update.position.lat,
            update.position.lng
        );
    });

    client.spawns.fetch_nearby(start.lat, start.lng).await?;
    client.tracker.mark_fetched(Some(start));
    client.tracker.start_tracking()?;

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let spawns = client.spawns.spawns();
                let capturable = spawns.iter().filter(|s| s.capturable).count();
                match client.spawns.current_region() {
                    Some(region) => tracing::info!(
                        "Tracking {} spawns ({} capturable) on {}",
                        spawns.len(),
                        capturable,
                        region.channel()
                    ),
                    None => tracing::info!(
                        "Tracking {} spawns ({} capturable), no live channel",
                        spawns.len(),
                        capturable
                    ),
                }
            }
        }
    }

    tracing::info!("Shutting down");
    client.teardown();

    Ok(())
}
