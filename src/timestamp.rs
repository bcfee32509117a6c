use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_TEXT_TS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").unwrap());

/// Parses the timestamp shapes charger firmware tends to emit. Naive values are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    parse_ts_string(s).or_else(|| parse_ts_number_string(s))
}

fn parse_ts_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let zoned = [
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
    ];
    for f in zoned.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for f in naive.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

fn parse_ts_number_string(s: &str) -> Option<DateTime<Utc>> {
    if !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n = s.parse::<i64>().ok()?;
    match s.len() {
        10 => DateTime::<Utc>::from_timestamp(n, 0),
        13 => DateTime::<Utc>::from_timestamp(n / 1000, ((n % 1000) * 1_000_000) as u32),
        16 => DateTime::<Utc>::from_timestamp(n / 1_000_000, ((n % 1_000_000) * 1_000) as u32),
        _ => None,
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn normalize_timestamp(s: &str) -> Option<String> {
    parse_timestamp(s).map(|dt| to_iso(&dt))
}

pub fn is_valid_timestamp(s: &str) -> bool {
    parse_timestamp(s).is_some()
}

/// First `YYYY-MM-DD HH:MM:SS` looking substring of a text line.
pub fn find_timestamp_in_text(line: &str) -> Option<&str> {
    RE_TEXT_TS.find(line).map(|m| m.as_str())
}
