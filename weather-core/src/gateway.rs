use crate::{
    Config, GatewayError,
    model::{HistoryRecord, WeatherResult},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod http;

pub use http::HttpGateway;

/// History size requested when the caller has no preference.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Backend contract: current weather for a city and the recent-search history.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherResult, GatewayError>;

    /// Most-recent-first, as ordered by the backend.
    async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, GatewayError>;
}

#[async_trait]
impl<G: WeatherGateway + ?Sized> WeatherGateway for Arc<G> {
    async fn fetch_weather(&self, city: &str) -> Result<WeatherResult, GatewayError> {
        (**self).fetch_weather(city).await
    }

    async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, GatewayError> {
        (**self).fetch_history(limit).await
    }
}

/// Build the HTTP gateway described by `config`.
pub fn gateway_from_config(config: &Config) -> anyhow::Result<HttpGateway> {
    let base_url = config.resolve_base_url()?;
    HttpGateway::with_timeout(base_url.as_str(), config.request_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_from_config_uses_dev_backend_on_preview_port() {
        let cfg = Config {
            origin: Some("http://localhost:4173".into()),
            ..Config::default()
        };

        let gateway = gateway_from_config(&cfg).expect("gateway should build");
        assert_eq!(gateway.base_url(), "http://localhost:8000/api/v1");
    }

    #[test]
    fn gateway_from_config_errors_without_origin_for_relative_base() {
        let err = gateway_from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("relative"));
    }
}
