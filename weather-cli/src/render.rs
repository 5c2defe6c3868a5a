use std::fmt::Write;

use tokio::{sync::watch, task::JoinHandle};
use weather_core::{HistoryEntry, SearchState, WeatherResult};

const EMPTY_HISTORY: &str = "No search history yet";

/// Round half up, the way the web front-end displays temperatures.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn weather_card(weather: &WeatherResult) -> String {
    let mut out = String::new();

    let name = weather.city_name().unwrap_or("Unknown location");
    let header = match weather.country() {
        Some(country) => format!("{name} ({country})"),
        None => name.to_string(),
    };
    writeln!(out, "{header}").ok();

    if let Some(description) = weather.description() {
        writeln!(out, "  {description}").ok();
    }
    if let Some(temp) = weather.temperature_c() {
        writeln!(out, "  {}°C", round_half_up(temp)).ok();
    }
    if let Some(feels_like) = weather.feels_like_c() {
        writeln!(out, "  Feels like {}°C", round_half_up(feels_like)).ok();
    }

    let metrics: Vec<String> = [
        weather.humidity_pct().map(|h| format!("Humidity: {h}%")),
        weather.pressure_hpa().map(|p| format!("Pressure: {p} hPa")),
        weather.wind_speed_mps().map(|w| format!("Wind: {w} m/s")),
        weather.visibility_km().map(|v| format!("Visibility: {v} km")),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !metrics.is_empty() {
        writeln!(out, "  {}", metrics.join("   ")).ok();
    }

    out
}

pub fn history_list(entries: &[HistoryEntry]) -> String {
    let mut out = String::from("Search History\n");

    if entries.is_empty() {
        writeln!(out, "  {EMPTY_HISTORY}").ok();
        return out;
    }

    for entry in entries {
        let mut line = format!("  📍 {}", entry.city);
        if let Some(temp) = entry.temperature {
            write!(line, "  {}°C", round_half_up(temp)).ok();
        }
        if let Some(description) = &entry.description {
            write!(line, "  {description}").ok();
        }
        write!(line, "  {}", entry.queried_at).ok();
        writeln!(out, "{line}").ok();
    }

    out
}

pub fn state(state: &SearchState) -> String {
    let mut out = String::new();
    if let Some(weather) = &state.weather {
        out.push_str(&weather_card(weather));
        out.push('\n');
    }
    out.push_str(&history_list(&state.history));
    out
}

/// Print a loading line on stderr whenever the orchestrator turns busy.
pub fn spawn_busy_indicator(mut rx: watch::Receiver<SearchState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut was_busy = rx.borrow_and_update().busy;
        while rx.changed().await.is_ok() {
            let busy = rx.borrow_and_update().busy;
            if busy && !was_busy {
                eprintln!("Loading...");
            }
            was_busy = busy;
        }
    })
}
