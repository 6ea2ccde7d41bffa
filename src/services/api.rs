use crate::error::{ClientError, Result};
use crate::services::auth::Session;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Authenticated REST client. Attaches the bearer token and the app header
/// pair to every request, maps HTTP failures into the error taxonomy, and
/// invalidates the shared session on any 401, no matter which call
/// noticed it.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    app_key: Option<String>,
    app_secret: Option<String>,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        app_key: Option<String>,
        app_secret: Option<String>,
        session: Arc<Session>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            client: Client::new(),
            base_url,
            app_key,
            app_secret,
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request.header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.app_key {
            request = request.header("X-App-Key", key);
        }
        if let Some(secret) = &self.app_secret {
            request = request.header("X-App-Secret", secret);
        }
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        request
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request = self.decorate(self.client.get(self.url(path)).query(query));
        self.execute(path, request).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.decorate(self.client.post(self.url(path)).json(body));
        self.execute(path, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("{}: {}", path, e)))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("401 on {}, invalidating session", path);
            self.session.invalidate();
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body);
            tracing::warn!(status = %status, "API HTTP error on {}: {}", path, message);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Parse(format!("{} response: {}", path, e)))
    }
}

/// Pull the human-readable reason out of a structured error body, falling
/// back to a generic message when the body has no usable field.
fn extract_error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| "Unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let session = Arc::new(Session::new("test-session.json"));
        let client = ApiClient::new("https://api.example.com/v1/", None, None, session);
        assert_eq!(
            client.url("/nearby/spawns"),
            "https://api.example.com/v1/nearby/spawns"
        );
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"message": "Spawn is too far away"}"#),
            "Spawn is too far away"
        );
        assert_eq!(
            extract_error_message(r#"{"error": "expired cycle"}"#),
            "expired cycle"
        );
        // message wins over error when both are present
        assert_eq!(
            extract_error_message(r#"{"message": "a", "error": "b"}"#),
            "a"
        );
        assert_eq!(extract_error_message("<html>502</html>"), "Unknown error");
        assert_eq!(extract_error_message(""), "Unknown error");
        assert_eq!(extract_error_message(r#"{"code": 42}"#), "Unknown error");
    }
}
