use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Snapshot returned by the gateway for one city at query time.
///
/// The shape belongs to the backend, so it is kept as raw JSON and only read
/// through the accessors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherResult(Value);

impl WeatherResult {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn city_name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn country(&self) -> Option<&str> {
        self.0
            .pointer("/sys/country")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn description(&self) -> Option<&str> {
        self.0.pointer("/weather/0/description").and_then(Value::as_str)
    }

    pub fn icon(&self) -> Option<&str> {
        self.0.pointer("/weather/0/icon").and_then(Value::as_str)
    }

    pub fn temperature_c(&self) -> Option<f64> {
        self.0.pointer("/main/temp").and_then(Value::as_f64)
    }

    pub fn feels_like_c(&self) -> Option<f64> {
        self.0.pointer("/main/feels_like").and_then(Value::as_f64)
    }

    pub fn humidity_pct(&self) -> Option<f64> {
        self.0.pointer("/main/humidity").and_then(Value::as_f64)
    }

    pub fn pressure_hpa(&self) -> Option<f64> {
        self.0.pointer("/main/pressure").and_then(Value::as_f64)
    }

    pub fn wind_speed_mps(&self) -> Option<f64> {
        self.0.pointer("/wind/speed").and_then(Value::as_f64)
    }

    /// Visibility in kilometres (the gateway reports metres).
    pub fn visibility_km(&self) -> Option<f64> {
        self.0
            .get("visibility")
            .and_then(Value::as_f64)
            .map(|m| m / 1000.0)
    }
}

/// Opaque identifier of a history record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryId::Number(n) => write!(f, "{n}"),
            HistoryId::Text(s) => f.write_str(s),
        }
    }
}

/// `searched_at` as sent by the gateway: a string or a bare epoch number,
/// possibly fractional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(f64),
    Text(String),
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

/// One history record exactly as the gateway returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub city: String,
    pub searched_at: RawTimestamp,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Display-ready history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub city: String,
    pub queried_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Client-visible state owned by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub weather: Option<WeatherResult>,
    pub history: Vec<HistoryEntry>,
    pub busy: bool,
}
