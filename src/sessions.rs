use crate::fields::{parse_float_prefix, value_text};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("CSV file is empty or has no data rows")]
    Empty,
    #[error("No valid session data found in {0}")]
    NoValidSessions(&'static str),
    #[error("Unsupported file format. Please upload CSV or JSON.")]
    UnsupportedFormat,
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One completed charging session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub site_id: String,
    pub charger_id: String,
    pub connector_id: String,
    #[serde(rename = "energy_kWh")]
    pub energy_kwh: f64,
    pub session_duration_min: f64,
    #[serde(rename = "tariffINR")]
    pub tariff_inr: f64,
    #[serde(rename = "revenueINR")]
    pub revenue_inr: f64,
    pub start_time: String,
    pub stop_time: String,
}

impl SessionData {
    fn is_identified(&self) -> bool {
        !self.site_id.is_empty() && !self.charger_id.is_empty() && !self.connector_id.is_empty()
    }
}

// Lowercased CSV header aliases, checked in order.
const CSV_SITE: &[&str] = &["siteid", "site_id"];
const CSV_CHARGER: &[&str] = &["chargerid", "charger_id"];
const CSV_CONNECTOR: &[&str] = &["connectorid", "connector_id"];
const CSV_ENERGY: &[&str] = &["energy_kwh", "energy"];
const CSV_DURATION: &[&str] = &["sessiondurationmin", "session_duration_min", "duration"];
const CSV_TARIFF: &[&str] = &["tariffinr", "tariff_inr", "tariff"];
const CSV_REVENUE: &[&str] = &["revenueinr", "revenue_inr", "revenue"];
const CSV_START: &[&str] = &["starttime", "start_time"];
const CSV_STOP: &[&str] = &["stoptime", "stop_time"];

// JSON keys, checked in order.
const JSON_SITE: &[&str] = &["siteId", "site_id"];
const JSON_CHARGER: &[&str] = &["chargerId", "charger_id"];
const JSON_CONNECTOR: &[&str] = &["connectorId", "connector_id"];
const JSON_ENERGY: &[&str] = &["energy_kWh", "energy"];
const JSON_DURATION: &[&str] = &["sessionDurationMin", "session_duration_min", "duration"];
const JSON_TARIFF: &[&str] = &["tariffINR", "tariff_inr", "tariff"];
const JSON_REVENUE: &[&str] = &["revenueINR", "revenue_inr", "revenue"];
const JSON_START: &[&str] = &["startTime", "start_time"];
const JSON_STOP: &[&str] = &["stopTime", "stop_time"];

/// First alias with a non-empty value.
fn first_of<'a, F>(lookup: F, aliases: &[&str]) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    aliases
        .iter()
        .filter_map(|a| lookup(a))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn number(text: String) -> f64 {
    parse_float_prefix(&text).unwrap_or(0.0)
}

fn build_session<'a, F>(lookup: F, keys: &SessionKeys) -> SessionData
where
    F: Fn(&str) -> Option<&'a str> + Copy,
{
    SessionData {
        site_id: first_of(lookup, keys.site),
        charger_id: first_of(lookup, keys.charger),
        connector_id: first_of(lookup, keys.connector),
        energy_kwh: number(first_of(lookup, keys.energy)),
        session_duration_min: number(first_of(lookup, keys.duration)),
        tariff_inr: number(first_of(lookup, keys.tariff)),
        revenue_inr: number(first_of(lookup, keys.revenue)),
        start_time: first_of(lookup, keys.start),
        stop_time: first_of(lookup, keys.stop),
    }
}

struct SessionKeys {
    site: &'static [&'static str],
    charger: &'static [&'static str],
    connector: &'static [&'static str],
    energy: &'static [&'static str],
    duration: &'static [&'static str],
    tariff: &'static [&'static str],
    revenue: &'static [&'static str],
    start: &'static [&'static str],
    stop: &'static [&'static str],
}

const CSV_KEYS: SessionKeys = SessionKeys {
    site: CSV_SITE,
    charger: CSV_CHARGER,
    connector: CSV_CONNECTOR,
    energy: CSV_ENERGY,
    duration: CSV_DURATION,
    tariff: CSV_TARIFF,
    revenue: CSV_REVENUE,
    start: CSV_START,
    stop: CSV_STOP,
};

const JSON_KEYS: SessionKeys = SessionKeys {
    site: JSON_SITE,
    charger: JSON_CHARGER,
    connector: JSON_CONNECTOR,
    energy: JSON_ENERGY,
    duration: JSON_DURATION,
    tariff: JSON_TARIFF,
    revenue: JSON_REVENUE,
    start: JSON_START,
    stop: JSON_STOP,
};

/// Plain comma split; quoted cells are not supported.
pub fn parse_session_csv(content: &str) -> Result<Vec<SessionData>, SessionError> {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() < 2 {
        return Err(SessionError::Empty);
    }

    let headers: Vec<String> = lines[0].split(',').map(|h| h.trim().to_lowercase()).collect();
    let mut sessions = Vec::new();

    for (i, line) in lines.iter().enumerate().skip(1) {
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        if values.len() != headers.len() {
            tracing::debug!(row = i, "skipping session row with mismatched column count");
            continue;
        }
        let lookup = |key: &str| {
            headers
                .iter()
                .position(|h| h == key)
                .map(|idx| values[idx])
        };
        let session = build_session(lookup, &CSV_KEYS);
        if session.is_identified() {
            sessions.push(session);
        }
    }

    if sessions.is_empty() {
        return Err(SessionError::NoValidSessions("CSV"));
    }
    Ok(sessions)
}

/// Accepts an array of objects or a single object.
pub fn parse_session_json(content: &str) -> Result<Vec<SessionData>, SessionError> {
    let data: Value = serde_json::from_str(content)?;
    let items = match data {
        Value::Array(items) => items,
        other => vec![other],
    };

    let sessions: Vec<SessionData> = items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let texts: Vec<(&str, String)> = obj
                .iter()
                .map(|(k, v)| (k.as_str(), value_text(v)))
                .collect();
            let lookup = |key: &str| {
                texts
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.as_str())
            };
            Some(build_session(lookup, &JSON_KEYS))
        })
        .filter(SessionData::is_identified)
        .collect();

    if sessions.is_empty() {
        return Err(SessionError::NoValidSessions("JSON"));
    }
    Ok(sessions)
}

/// Dispatches on the file extension.
pub fn parse_session_content(content: &str, filename: &str) -> Result<Vec<SessionData>, SessionError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    let sessions = match extension.as_deref() {
        Some("csv") => parse_session_csv(content)?,
        Some("json") => parse_session_json(content)?,
        _ => return Err(SessionError::UnsupportedFormat),
    };
    tracing::info!(filename, sessions = sessions.len(), "parsed charging sessions");
    Ok(sessions)
}

pub fn parse_session_file(path: impl AsRef<Path>) -> Result<Vec<SessionData>, SessionError> {
    let path = path.as_ref();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let content = fs::read_to_string(path)?;
    parse_session_content(&content, &filename)
}
