//! Parses the time expressions CloudWatch tools accept from the model:
//! ISO 8601 timestamps, `"<n><unit> ago"` relative expressions, the
//! literals `"now"`/`"yesterday"`, and bare epoch-millisecond strings.
//!
//! Every parse failure becomes `Error::InvalidRequest` rather than a
//! panic, since these strings originate from model output and are never
//! trusted.

use chrono::{DateTime, Duration, TimeZone, Utc};
use cwa_domain::error::{Error, Result};

const DEFAULT_RANGE_MINUTES: i64 = 60;

/// Parse `"now"`, `"yesterday"`, or `"<n><unit> ago"` (`m`/`h`/`d`/`w`).
pub fn parse_relative_time(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    if trimmed.eq_ignore_ascii_case("yesterday") {
        return Ok(Utc::now() - Duration::days(1));
    }

    let lower = trimmed.to_ascii_lowercase();
    let without_ago = lower
        .strip_suffix("ago")
        .map(str::trim_end)
        .ok_or_else(|| invalid_relative(input))?;

    if without_ago.is_empty() {
        return Err(invalid_relative(input));
    }

    let unit = without_ago
        .chars()
        .last()
        .ok_or_else(|| invalid_relative(input))?;
    let amount_str = &without_ago[..without_ago.len() - unit.len_utf8()];
    let amount: i64 = amount_str
        .trim()
        .parse()
        .map_err(|_| invalid_relative(input))?;

    let delta = match unit {
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        'd' => Duration::days(amount),
        'w' => Duration::weeks(amount),
        _ => return Err(invalid_relative(input)),
    };

    Ok(Utc::now() - delta)
}

fn invalid_relative(input: &str) -> Error {
    Error::InvalidRequest(format!(
        "Invalid relative time format: '{input}' (expected 'now', 'yesterday', or '<n><m|h|d|w> ago')"
    ))
}

/// Parse an ISO 8601 timestamp, accepting `Z`, an explicit offset, a
/// space in place of `T`, and an optional fractional-seconds component.
pub fn parse_iso8601(input: &str) -> Result<DateTime<Utc>> {
    let normalized = input.trim().replacen(' ', "T", 1);

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }

    // `DateTime::parse_from_rfc3339` rejects a bare date-time with no
    // offset (the space-separated test case has none), so fall back to
    // parsing as naive and assume UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(Error::InvalidRequest(format!(
        "Invalid ISO 8601 timestamp: '{input}'"
    )))
}

/// Parse a bare epoch-millisecond value, as an integer or a numeric string.
pub fn parse_epoch_milliseconds(input: &str) -> Result<DateTime<Utc>> {
    let ms: i64 = input
        .trim()
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("Invalid epoch milliseconds: '{input}'")))?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::InvalidRequest(format!("Epoch milliseconds out of range: '{input}'")))
}

/// Parse any of the supported time string forms.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower == "now" || lower == "yesterday" || lower.ends_with("ago") {
        return parse_relative_time(trimmed);
    }
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return parse_epoch_milliseconds(trimmed);
    }
    parse_iso8601(trimmed)
}

/// Convert a UTC instant to CloudWatch's epoch-millisecond convention.
pub fn to_cloudwatch_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Resolve the `(start_ms, end_ms)` window for a tool call.
///
/// - Both provided: parsed as-is; `start` after `end` is an error.
/// - Only `start`: `end` defaults to now.
/// - Only `end`: `start` defaults to `default_range_minutes` before `end`.
/// - Neither: the last `default_range_minutes` up to now.
pub fn calculate_time_range(
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<(i64, i64)> {
    calculate_time_range_with_default(start_time, end_time, DEFAULT_RANGE_MINUTES)
}

pub fn calculate_time_range_with_default(
    start_time: Option<&str>,
    end_time: Option<&str>,
    default_range_minutes: i64,
) -> Result<(i64, i64)> {
    let default_span_ms = default_range_minutes * 60 * 1000;

    let (start_ms, end_ms) = match (start_time, end_time) {
        (Some(s), Some(e)) => {
            let start = to_cloudwatch_timestamp(parse_time(s)?);
            let end = to_cloudwatch_timestamp(parse_time(e)?);
            (start, end)
        }
        (Some(s), None) => {
            let start = to_cloudwatch_timestamp(parse_time(s)?);
            let end = to_cloudwatch_timestamp(Utc::now());
            (start, end)
        }
        (None, Some(e)) => {
            let end = to_cloudwatch_timestamp(parse_time(e)?);
            (end - default_span_ms, end)
        }
        (None, None) => {
            let end = to_cloudwatch_timestamp(Utc::now());
            (end - default_span_ms, end)
        }
    };

    if start_ms > end_ms {
        return Err(Error::InvalidRequest(format!(
            "Start time {start_ms} cannot be after end time {end_ms}"
        )));
    }

    Ok((start_ms, end_ms))
}

/// Format an epoch-millisecond timestamp for display.
pub fn format_timestamp(ms: i64, format_str: Option<&str>) -> String {
    let dt = Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);
    let fmt = format_str.unwrap_or("%Y-%m-%d %H:%M:%S UTC");
    dt.format(fmt).to_string()
}

/// Render a human-readable "N units ago" string relative to now.
pub fn time_ago(ms: i64) -> String {
    let then = Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);
    let seconds = (Utc::now() - then).num_seconds().max(0);

    let (value, unit) = if seconds < 60 {
        (seconds, "second")
    } else if seconds < 3600 {
        (seconds / 60, "minute")
    } else if seconds < 86_400 {
        (seconds / 3600, "hour")
    } else {
        (seconds / 86_400, "day")
    };

    if value == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_now() {
        let result = parse_relative_time("now").unwrap();
        assert!((Utc::now() - result).num_seconds().abs() < 2);
    }

    #[test]
    fn parses_yesterday() {
        let result = parse_relative_time("yesterday").unwrap();
        let expected = Utc::now() - Duration::days(1);
        assert!((expected - result).num_seconds().abs() < 2);
    }

    #[test]
    fn parses_minutes_hours_days_weeks_ago() {
        assert!((Utc::now() - Duration::minutes(30) - parse_relative_time("30m ago").unwrap())
            .num_seconds()
            .abs()
            < 2);
        assert!((Utc::now() - Duration::hours(2) - parse_relative_time("2h ago").unwrap())
            .num_seconds()
            .abs()
            < 2);
        assert!((Utc::now() - Duration::days(3) - parse_relative_time("3d ago").unwrap())
            .num_seconds()
            .abs()
            < 2);
        assert!((Utc::now() - Duration::weeks(1) - parse_relative_time("1w ago").unwrap())
            .num_seconds()
            .abs()
            < 2);
    }

    #[test]
    fn parses_relative_time_with_whitespace() {
        let result = parse_relative_time("  5m  ago  ").unwrap();
        let expected = Utc::now() - Duration::minutes(5);
        assert!((expected - result).num_seconds().abs() < 2);
    }

    #[test]
    fn rejects_invalid_relative_formats() {
        assert!(parse_relative_time("5 minutes ago").is_err());
        assert!(parse_relative_time("tomorrow").is_err());
        assert!(parse_relative_time("ago").is_err());
    }

    #[test]
    fn parses_iso8601_variants() {
        let a = parse_iso8601("2024-01-15T10:30:00Z").unwrap();
        assert_eq!((a.year(), a.month(), a.day(), a.hour(), a.minute()), (2024, 1, 15, 10, 30));

        let b = parse_iso8601("2024-01-15T10:30:00+00:00").unwrap();
        assert_eq!(to_cloudwatch_timestamp(a), to_cloudwatch_timestamp(b));

        let c = parse_iso8601("2024-01-15T10:30:00.123Z").unwrap();
        assert_eq!(c.timestamp_subsec_millis(), 123);

        let d = parse_iso8601("2024-01-15 10:30:00").unwrap();
        assert_eq!(d.hour(), 10);
    }

    use chrono::{Datelike, Timelike};

    #[test]
    fn rejects_invalid_iso8601() {
        assert!(parse_iso8601("not-a-date").is_err());
    }

    #[test]
    fn parses_epoch_milliseconds_int_and_string() {
        let ms = 1_705_312_800_000;
        let dt = parse_epoch_milliseconds("1705312800000").unwrap();
        assert_eq!(to_cloudwatch_timestamp(dt), ms);
    }

    #[test]
    fn rejects_invalid_epoch_milliseconds() {
        assert!(parse_epoch_milliseconds("not-a-number").is_err());
    }

    #[test]
    fn calculate_time_range_with_both_provided() {
        let (start, end) =
            calculate_time_range(Some("2024-01-15T10:00:00Z"), Some("2024-01-15T11:00:00Z")).unwrap();
        assert_eq!(start, 1_705_312_800_000);
        assert_eq!(end, 1_705_316_400_000);
    }

    #[test]
    fn calculate_time_range_only_start_defaults_end_to_now() {
        let (start, end) = calculate_time_range(Some("1h ago"), None).unwrap();
        let expected_start = to_cloudwatch_timestamp(Utc::now() - Duration::hours(1));
        assert!((start - expected_start).abs() < 2000);
        assert!((end - to_cloudwatch_timestamp(Utc::now())).abs() < 2000);
    }

    #[test]
    fn calculate_time_range_only_end_defaults_start_to_an_hour_before() {
        let (start, end) = calculate_time_range(None, Some("2024-01-15T11:00:00Z")).unwrap();
        assert_eq!(end, 1_705_316_400_000);
        assert_eq!(start, end - 60 * 60 * 1000);
    }

    #[test]
    fn calculate_time_range_defaults_to_last_hour() {
        let (start, end) = calculate_time_range(None, None).unwrap();
        assert!((end - start - 60 * 60 * 1000).abs() < 2000);
    }

    #[test]
    fn calculate_time_range_rejects_start_after_end() {
        let err =
            calculate_time_range(Some("2024-01-15T11:00:00Z"), Some("2024-01-15T10:00:00Z")).unwrap_err();
        assert!(err.to_string().contains("cannot be after"));
    }

    #[test]
    fn formats_timestamp() {
        assert_eq!(format_timestamp(1_705_312_800_000, None), "2024-01-15 10:00:00 UTC");
        assert_eq!(
            format_timestamp(1_705_312_800_000, Some("%Y-%m-%d %H:%M")),
            "2024-01-15 10:00"
        );
    }

    #[test]
    fn time_ago_singular_forms() {
        let one_second = to_cloudwatch_timestamp(Utc::now() - Duration::seconds(1));
        assert_eq!(time_ago(one_second), "1 second ago");
        let one_minute = to_cloudwatch_timestamp(Utc::now() - Duration::minutes(1));
        assert_eq!(time_ago(one_minute), "1 minute ago");
    }
}
