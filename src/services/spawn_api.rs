use crate::error::{ClientError, Result};
use crate::models::{DistantSpawnsResponse, NearbySpawnsResponse, ViewportBounds};
use crate::services::api::ApiClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The spawn endpoints as the synchronizer sees them. A trait so tests (or
/// an alternate backend) can stand in for the HTTP implementation.
#[async_trait]
pub trait SpawnApi: Send + Sync {
    /// `GET /nearby/spawns?lat&lng`
    async fn fetch_nearby(&self, lat: f64, lng: f64) -> Result<NearbySpawnsResponse>;

    /// `GET /viewport/spawns?ne_lat&ne_lng&sw_lat&sw_lng&user_lat&user_lng`
    async fn fetch_viewport(
        &self,
        bounds: &ViewportBounds,
        user_lat: f64,
        user_lng: f64,
    ) -> Result<DistantSpawnsResponse>;

    /// `POST /spawn/{cycle_id}/capture` with the viewer's coordinates.
    async fn capture(&self, cycle_id: i64, lat: f64, lng: f64) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct CaptureRequest {
    lat: f64,
    lng: f64,
}

/// Successful captures return an envelope whose `data` shape belongs to the
/// UI layer; the synchronizer only cares that the call went through.
#[derive(Debug, Deserialize)]
struct CaptureResponse {
    #[allow(dead_code)]
    data: serde_json::Value,
}

pub struct HttpSpawnApi {
    api: ApiClient,
}

impl HttpSpawnApi {
    pub fn new(api: ApiClient) -> Self {
        HttpSpawnApi { api }
    }
}

#[async_trait]
impl SpawnApi for HttpSpawnApi {
    async fn fetch_nearby(&self, lat: f64, lng: f64) -> Result<NearbySpawnsResponse> {
        self.api
            .get_json(
                "/nearby/spawns",
                &[("lat", lat.to_string()), ("lng", lng.to_string())],
            )
            .await
    }

    async fn fetch_viewport(
        &self,
        bounds: &ViewportBounds,
        user_lat: f64,
        user_lng: f64,
    ) -> Result<DistantSpawnsResponse> {
        self.api
            .get_json(
                "/viewport/spawns",
                &[
                    ("ne_lat", bounds.ne_lat.to_string()),
                    ("ne_lng", bounds.ne_lng.to_string()),
                    ("sw_lat", bounds.sw_lat.to_string()),
                    ("sw_lng", bounds.sw_lng.to_string()),
                    ("user_lat", user_lat.to_string()),
                    ("user_lng", user_lng.to_string()),
                ],
            )
            .await
    }

    async fn capture(&self, cycle_id: i64, lat: f64, lng: f64) -> Result<()> {
        let path = format!("/spawn/{}/capture", cycle_id);
        let body = CaptureRequest { lat, lng };

        match self.api.post_json::<CaptureResponse, _>(&path, &body).await {
            Ok(_) => Ok(()),
            // 401 already invalidated the session in the API client; keep
            // its classification so callers see an auth failure, not a
            // capture refusal.
            Err(e) if e.is_unauthorized() => Err(e),
            Err(ClientError::Api { message, .. }) => Err(ClientError::Capture(message)),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_request_serializes_coordinates() {
        let body = CaptureRequest {
            lat: 14.5995,
            lng: 120.9842,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"lat": 14.5995, "lng": 120.9842}));
    }

    #[test]
    fn capture_response_accepts_any_data_shape() {
        let parsed: CaptureResponse =
            serde_json::from_str(r#"{"data": {"captured": true, "xp": 120}}"#).unwrap();
        assert!(parsed.data.is_object());

        let parsed: CaptureResponse = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert!(parsed.data.is_null());
    }
}
