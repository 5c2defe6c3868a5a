//! Reshaping of gateway history records into display-ready entries.
//!
//! Everything here is pure: the only input besides the record is the time zone
//! the timestamp is rendered in.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt::Display;

use crate::model::{HistoryEntry, HistoryRecord, RawTimestamp};

/// en-US style layout, e.g. `1/1/2024, 10:00:00 AM`.
const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Epoch magnitudes at or above this are milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Map one record, rendering the timestamp in the local system zone.
pub fn to_history_entry(record: &HistoryRecord) -> HistoryEntry {
    to_history_entry_in(record, &Local)
}

pub fn to_history_entry_in<Tz>(record: &HistoryRecord, tz: &Tz) -> HistoryEntry
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    HistoryEntry {
        id: record.id.clone(),
        city: record.city.clone(),
        queried_at: format_queried_at(&record.searched_at, tz),
        temperature: record.temperature,
        description: record.description.clone(),
    }
}

/// Map a whole history response, preserving the gateway's order.
pub fn to_history_list(records: &[HistoryRecord]) -> Vec<HistoryEntry> {
    to_history_list_in(records, &Local)
}

pub fn to_history_list_in<Tz>(records: &[HistoryRecord], tz: &Tz) -> Vec<HistoryEntry>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    records.iter().map(|r| to_history_entry_in(r, tz)).collect()
}

/// Render `raw` as a human-readable string in `tz`.
///
/// Input that cannot be read as a point in time is returned verbatim.
pub fn format_queried_at<Tz>(raw: &RawTimestamp, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match parse_timestamp(raw, tz) {
        Some(instant) => instant
            .with_timezone(tz)
            .format(DISPLAY_FORMAT)
            .to_string(),
        None => match raw {
            RawTimestamp::Epoch(n) => n.to_string(),
            RawTimestamp::Text(s) => s.clone(),
        },
    }
}

fn parse_timestamp<Tz: TimeZone>(raw: &RawTimestamp, tz: &Tz) -> Option<DateTime<Utc>> {
    let text = match raw {
        RawTimestamp::Epoch(n) => return from_epoch(*n),
        RawTimestamp::Text(s) => s.trim(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    // Date-times without an offset are wall-clock times in the target zone.
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    // Bare dates are midnight UTC.
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    text.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }

    let seconds = if value.abs() >= MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };

    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    // `as` saturates out-of-range values, which chrono then rejects.
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoryId;
    use chrono::FixedOffset;

    fn record(searched_at: &str) -> HistoryRecord {
        HistoryRecord {
            id: HistoryId::Number(1),
            city: "Paris".into(),
            searched_at: searched_at.into(),
            temperature: Some(18.4),
            description: Some("clear sky".into()),
        }
    }

    #[test]
    fn formats_rfc3339_in_requested_zone() {
        let ts = RawTimestamp::from("2024-01-01T10:00:00Z");
        assert_eq!(format_queried_at(&ts, &Utc), "1/1/2024, 10:00:00 AM");

        let cet = FixedOffset::east_opt(3600).expect("valid offset");
        assert_eq!(format_queried_at(&ts, &cet), "1/1/2024, 11:00:00 AM");
    }

    #[test]
    fn formats_fractional_seconds_and_afternoon() {
        let ts = RawTimestamp::from("2024-03-15T14:05:09.123456+00:00");
        assert_eq!(format_queried_at(&ts, &Utc), "3/15/2024, 2:05:09 PM");
    }

    #[test]
    fn naive_datetime_is_read_in_target_zone() {
        let plus_two = FixedOffset::east_opt(2 * 3600).expect("valid offset");
        let ts = RawTimestamp::from("2024-06-01 08:30:00");
        assert_eq!(format_queried_at(&ts, &plus_two), "6/1/2024, 8:30:00 AM");
    }

    #[test]
    fn epoch_seconds_and_millis() {
        assert_eq!(
            format_queried_at(&RawTimestamp::Epoch(1_704_103_200.0), &Utc),
            "1/1/2024, 10:00:00 AM"
        );
        assert_eq!(
            format_queried_at(&RawTimestamp::Epoch(1_704_103_200_000.0), &Utc),
            "1/1/2024, 10:00:00 AM"
        );
        assert_eq!(
            format_queried_at(&RawTimestamp::from("1704103200"), &Utc),
            "1/1/2024, 10:00:00 AM"
        );
    }

    #[test]
    fn fractional_epoch_is_formatted() {
        assert_eq!(
            format_queried_at(&RawTimestamp::Epoch(1_704_103_200.5), &Utc),
            "1/1/2024, 10:00:00 AM"
        );
        assert_eq!(
            format_queried_at(&RawTimestamp::from("1704103200.5"), &Utc),
            "1/1/2024, 10:00:00 AM"
        );
    }

    #[test]
    fn out_of_range_epochs_pass_through() {
        let min = RawTimestamp::from("-9223372036854775808");
        assert_eq!(format_queried_at(&min, &Utc), "-9223372036854775808");

        let huge = RawTimestamp::Epoch(i64::MIN as f64);
        assert_eq!(format_queried_at(&huge, &Utc), (i64::MIN as f64).to_string());

        let nan = RawTimestamp::from("NaN");
        assert_eq!(format_queried_at(&nan, &Utc), "NaN");
    }

    #[test]
    fn unparseable_timestamp_passes_through() {
        let ts = RawTimestamp::from("yesterday-ish");
        assert_eq!(format_queried_at(&ts, &Utc), "yesterday-ish");
    }

    #[test]
    fn entry_keeps_fields_and_absent_optionals() {
        let mut rec = record("2024-01-01T10:00:00Z");
        let entry = to_history_entry_in(&rec, &Utc);
        assert_eq!(entry.id, HistoryId::Number(1));
        assert_eq!(entry.city, "Paris");
        assert_eq!(entry.queried_at, "1/1/2024, 10:00:00 AM");
        assert_eq!(entry.temperature, Some(18.4));
        assert_eq!(entry.description.as_deref(), Some("clear sky"));

        rec.temperature = None;
        rec.description = None;
        let entry = to_history_entry_in(&rec, &Utc);
        assert_eq!(entry.temperature, None);
        assert_eq!(entry.description, None);
    }

    #[test]
    fn transform_is_repeatable() {
        let rec = record("2024-01-01T10:00:00Z");
        assert_eq!(to_history_entry_in(&rec, &Utc), to_history_entry_in(&rec, &Utc));
    }

    #[test]
    fn list_preserves_gateway_order() {
        let mut newer = record("2024-01-02T10:00:00Z");
        newer.id = HistoryId::Number(2);
        newer.city = "Berlin".into();
        let older = record("2024-01-01T10:00:00Z");

        let list = to_history_list_in(&[newer, older], &Utc);
        let cities: Vec<_> = list.iter().map(|e| e.city.as_str()).collect();
        assert_eq!(cities, ["Berlin", "Paris"]);
    }
}
