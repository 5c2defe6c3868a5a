//! Core library for the `weather` lookup client.
//!
//! This crate defines:
//! - Configuration and backend address resolution
//! - The gateway contract to the weather/history backend, plus an HTTP implementation
//! - Shaping of raw history records into display-ready entries
//! - The search orchestrator that keeps the displayed result and history in sync
//!
//! It is used by `weather-cli`, but any front-end can drive a [`SearchOrchestrator`]
//! and observe its [`SearchState`].

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod transform;

pub use config::Config;
pub use error::GatewayError;
pub use gateway::{DEFAULT_HISTORY_LIMIT, HttpGateway, WeatherGateway, gateway_from_config};
pub use model::{HistoryEntry, HistoryId, HistoryRecord, RawTimestamp, SearchState, WeatherResult};
pub use orchestrator::{HistoryRefresh, OverlapPolicy, SearchOrchestrator, SearchOutcome};
