use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    GatewayError,
    model::{HistoryRecord, WeatherResult},
};

use super::WeatherGateway;

const WEATHER: &str = "weather";
const HISTORY: &str = "history";

/// Gateway speaking to the backend's `/weather/` and `/history/` endpoints.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    http: Client,
}

/// Body of a successful weather lookup; the backend also echoes the saved
/// record, which the client has no use for.
#[derive(Debug, Deserialize)]
struct WeatherEnvelope {
    #[serde(default)]
    data: Option<WeatherResult>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    /// Build with an optional per-request timeout. `None` waits indefinitely.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self::with_client(base_url, http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/", self.base_url, path)
    }

    async fn get_body(
        &self,
        operation: &'static str,
        query: &[(&str, &str)],
    ) -> Result<String, GatewayError> {
        let url = self.endpoint(operation);
        debug!(%url, ?query, "gateway request");

        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| GatewayError::Transport { operation, source })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| GatewayError::Transport { operation, source })?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                operation,
                status,
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl WeatherGateway for HttpGateway {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherResult, GatewayError> {
        let body = self.get_body(WEATHER, &[("city", city)]).await?;

        let envelope: WeatherEnvelope =
            serde_json::from_str(&body).map_err(|e| GatewayError::Malformed {
                operation: WEATHER,
                reason: e.to_string(),
            })?;

        envelope.data.ok_or_else(|| GatewayError::Malformed {
            operation: WEATHER,
            reason: "response has no `data` member".to_string(),
        })
    }

    async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, GatewayError> {
        let limit = limit.to_string();
        let body = self.get_body(HISTORY, &[("limit", limit.as_str())]).await?;

        serde_json::from_str(&body).map_err(|e| GatewayError::Malformed {
            operation: HISTORY,
            reason: e.to_string(),
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoryId;
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        routing::get,
    };
    use serde_json::{Value, json};
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });
        format!("http://{addr}/api/v1")
    }

    async fn echo_weather(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        let city = q.get("city").cloned().unwrap_or_default();
        Json(json!({
            "data": { "name": city, "main": { "temp": 18.4 } },
            "saved_record": { "id": 1 }
        }))
    }

    #[tokio::test]
    async fn fetch_weather_returns_data_member() {
        let app = Router::new().route("/api/v1/weather/", get(echo_weather));
        let gateway = HttpGateway::new(serve(app).await);

        let weather = gateway.fetch_weather("New York").await.expect("weather");
        assert_eq!(weather.city_name(), Some("New York"));
        assert_eq!(weather.temperature_c(), Some(18.4));
    }

    #[tokio::test]
    async fn fetch_weather_maps_non_success_status() {
        let app = Router::new().route(
            "/api/v1/weather/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        );
        let gateway = HttpGateway::new(serve(app).await);

        let err = gateway.fetch_weather("Atlantis").await.unwrap_err();
        match &err {
            GatewayError::Status { status, body, .. } => {
                assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert_eq!(err.operation(), "weather");
    }

    #[tokio::test]
    async fn fetch_weather_without_data_is_malformed() {
        let app = Router::new().route(
            "/api/v1/weather/",
            get(|| async { Json(json!({ "data": null })) }),
        );
        let gateway = HttpGateway::new(serve(app).await);

        let err = gateway.fetch_weather("Paris").await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed { .. }));
    }

    #[tokio::test]
    async fn fetch_history_sends_limit_and_parses_records() {
        let app = Router::new().route(
            "/api/v1/history/",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
                let records: Vec<Value> = (0..limit)
                    .map(|i| {
                        json!({
                            "id": i,
                            "city": format!("City{i}"),
                            "searched_at": "2024-01-01T10:00:00Z",
                            "humidity": 50
                        })
                    })
                    .collect();
                Json(Value::Array(records))
            }),
        );
        let gateway = HttpGateway::new(format!("{}/", serve(app).await));

        let records = gateway.fetch_history(3).await.expect("history");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, HistoryId::Number(0));
        assert_eq!(records[2].city, "City2");
        assert_eq!(records[1].temperature, None);
    }

    #[tokio::test]
    async fn fetch_history_rejects_non_array_body() {
        let app = Router::new().route(
            "/api/v1/history/",
            get(|| async { "<html>not json</html>" }),
        );
        let gateway = HttpGateway::new(serve(app).await);

        let err = gateway.fetch_history(10).await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed { operation: "history", .. }));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let gateway = HttpGateway::new(format!("http://{addr}/api/v1"));
        let err = gateway.fetch_history(10).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport { .. }));
    }

    #[test]
    fn truncate_body_caps_long_bodies() {
        let long = "x".repeat(250);
        let out = truncate_body(&long);
        assert_eq!(out.len(), 203);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn with_timeout_builds_client() {
        let gateway = HttpGateway::with_timeout(
            "http://localhost:8000/api/v1",
            Some(std::time::Duration::from_secs(5)),
        )
        .expect("client should build");
        assert_eq!(gateway.base_url(), "http://localhost:8000/api/v1");
    }

    #[test]
    fn base_url_trailing_slash_is_normalised() {
        let gateway = HttpGateway::new("http://localhost:8000/api/v1/");
        assert_eq!(gateway.endpoint("weather"), "http://localhost:8000/api/v1/weather/");
    }
}
