use crate::fields::{clean_csv_cell, parse_float_prefix, value_text, NormalizedLogEntry, RawFields};
use crate::optimizer::FaultCluster;
use crate::timestamp::find_timestamp_in_text;
use crate::vendor::LogFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Format-agnostic fault record consumed by the optimizer and classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charger_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocpp_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_error: Option<String>,
    /// Original line, or the serialized object for structured input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<String>,
    /// Set when the optimizer folded repeated events into this entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<FaultCluster>,
}

impl LogEntry {
    fn has_fault_signal(&self) -> bool {
        self.error_code.is_some() || self.vendor_error.is_some() || self.transaction_stop_reason.is_some()
    }
}

impl From<&NormalizedLogEntry> for LogEntry {
    fn from(n: &NormalizedLogEntry) -> Self {
        let charger_id = n.raw_data.as_ref().and_then(|raw| {
            raw.iter()
                .find(|(k, _)| is_charger_key(&k.to_lowercase()))
                .map(|(_, v)| value_text(v))
                .filter(|s| !s.is_empty())
        });
        LogEntry {
            error_code: Some(n.error_code.clone()),
            timestamp: Some(n.timestamp.clone()),
            charger_id,
            connector_id: Some(n.connector_id.clone()),
            meter_value: n.meter_value,
            temperature: n.temperature,
            voltage: n.voltage,
            current: n.current,
            ocpp_status: Some(n.status.clone()),
            transaction_stop_reason: None,
            vendor_error: Some(n.vendor_error_string.clone()).filter(|s| !s.is_empty()),
            raw_data: n
                .raw_data
                .as_ref()
                .and_then(|raw| serde_json::to_string(raw).ok()),
            cluster: None,
        }
    }
}

/// One raw record plus the 1-based line (or array index) it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub line_number: usize,
    pub fields: RawFields,
}

static RE_TXT_TS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[?(\d{4}-\d{2}-\d{2}[T\s]\d{2}:\d{2}:\d{2})").unwrap());
static RE_SEVERITY_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(ERROR|FAULT|ALARM|WARNING|CRITICAL)[:|\s]+([A-Z0-9_]+)").unwrap()
});
static RE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:error|code|err)[\s:=]+([A-Z0-9_-]+)").unwrap());
static RE_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:connector|conn)[\s:=]+(\d+)").unwrap());
static RE_TEMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:temperature|temp)[\s:=]+(-?[\d.]+)").unwrap());
static RE_VOLTAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:voltage|volt)[\s:=]+([\d.]+)").unwrap());
static RE_CURRENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:current|amp)[\s:=]+([\d.]+)").unwrap());
static RE_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:ocpp|status)[\s:=]+([A-Za-z]+)").unwrap());
static RE_REASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:reason|stop)[\s:=]+([A-Za-z\s]+)").unwrap());

fn capture<'a>(re: &Regex, line: &'a str, group: usize) -> Option<&'a str> {
    re.captures(line).and_then(|c| c.get(group)).map(|m| m.as_str())
}

/// Splits content into raw records for the field mapper.
pub fn parse_records(content: &str, format: LogFormat) -> Result<Vec<ParsedRecord>, ParseError> {
    match format {
        LogFormat::Csv => Ok(parse_csv_records(content)),
        LogFormat::Json => parse_json_records(content),
        LogFormat::Txt | LogFormat::Ocpp => Ok(parse_text_records(content)),
        LogFormat::Mixed => Ok(parse_mixed_records(content)),
    }
}

/// Rows whose column count differs from the header are skipped.
pub fn parse_csv_records(content: &str) -> Vec<ParsedRecord> {
    let mut lines = content
        .split('\n')
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header_line)) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_line.split(',').map(clean_csv_cell).collect();

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in lines {
        let values: Vec<String> = line.split(',').map(clean_csv_cell).collect();
        if values.len() != headers.len() {
            skipped += 1;
            continue;
        }
        let fields: RawFields = headers
            .iter()
            .cloned()
            .zip(values.into_iter().map(Value::String))
            .collect();
        out.push(ParsedRecord { line_number: idx + 1, fields });
    }
    if skipped > 0 {
        tracing::debug!(skipped, "dropped CSV rows with mismatched column count");
    }
    out
}

/// Array of objects or a single object. A document that does not parse is an error.
pub fn parse_json_records(content: &str) -> Result<Vec<ParsedRecord>, ParseError> {
    let records = match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::Object(fields) => Some(ParsedRecord { line_number: i + 1, fields }),
                _ => None,
            })
            .collect(),
        Value::Object(fields) => vec![ParsedRecord { line_number: 1, fields }],
        _ => Vec::new(),
    };
    Ok(records)
}

pub fn parse_text_records(content: &str) -> Vec<ParsedRecord> {
    content
        .split('\n')
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .filter_map(|(i, line)| {
            parse_text_line(line).map(|fields| ParsedRecord { line_number: i + 1, fields })
        })
        .collect()
}

/// One JSON object per line where possible, text extraction otherwise.
pub fn parse_mixed_records(content: &str) -> Vec<ParsedRecord> {
    content
        .split('\n')
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .filter_map(|(i, line)| {
            let fields = match serde_json::from_str::<Value>(line.trim()) {
                Ok(Value::Object(obj)) => Some(obj),
                _ => parse_text_line(line),
            };
            fields.map(|fields| ParsedRecord { line_number: i + 1, fields })
        })
        .collect()
}

/// Lines without a timestamp or a severity marker carry nothing to classify.
pub fn parse_text_line(line: &str) -> Option<RawFields> {
    let ts = capture(&RE_TXT_TS, line, 1);
    let marker = RE_SEVERITY_MARKER.captures(line);
    if ts.is_none() && marker.is_none() {
        return None;
    }

    let mut fields = RawFields::new();
    let mut put = |key: &str, value: &str| {
        fields.insert(key.to_string(), Value::String(value.to_string()));
    };

    if let Some(ts) = ts {
        put("timestamp", ts);
    }
    let code = marker
        .as_ref()
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
        .or_else(|| capture(&RE_CODE, line, 1));
    if let Some(code) = code {
        put("errorCode", code);
    }
    if let Some(conn) = capture(&RE_CONNECTOR, line, 1) {
        put("connectorId", conn);
    }
    let status = capture(&RE_STATUS, line, 1)
        .or_else(|| marker.as_ref().and_then(|c| c.get(1)).map(|m| m.as_str()));
    if let Some(status) = status {
        put("status", status);
    }
    if let Some(t) = capture(&RE_TEMP, line, 1) {
        put("temperature", t);
    }
    if let Some(v) = capture(&RE_VOLTAGE, line, 1) {
        put("voltage", v);
    }
    if let Some(a) = capture(&RE_CURRENT, line, 1) {
        put("current", a);
    }
    put("message", line.trim_end_matches('\r'));
    Some(fields)
}

fn is_charger_key(key_lower: &str) -> bool {
    key_lower.contains("charger")
        && (key_lower.contains("id") || key_lower.contains("name") || key_lower.contains("serial"))
}

/// Assigns a value to the first `LogEntry` slot whose keyword appears in the key.
fn assign_by_key(entry: &mut LogEntry, key: &str, value: String) {
    let k = key.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| k.contains(n));
    if has(&["error", "code"]) {
        entry.error_code = Some(value);
    } else if has(&["time", "date"]) {
        entry.timestamp = Some(value);
    } else if has(&["connector"]) {
        entry.connector_id = Some(value);
    } else if is_charger_key(&k) {
        entry.charger_id = Some(value);
    } else if has(&["meter", "value"]) {
        entry.meter_value = parse_float_prefix(&value);
    } else if has(&["temp"]) {
        entry.temperature = parse_float_prefix(&value);
    } else if has(&["voltage"]) {
        entry.voltage = parse_float_prefix(&value);
    } else if has(&["current"]) {
        entry.current = parse_float_prefix(&value);
    } else if has(&["ocpp", "status"]) {
        entry.ocpp_status = Some(value);
    } else if has(&["stop", "reason"]) {
        entry.transaction_stop_reason = Some(value);
    } else if has(&["vendor"]) {
        entry.vendor_error = Some(value);
    }
}

/// Keyword-driven CSV parse straight into `LogEntry`, bypassing field mapping.
pub fn parse_csv_entries(content: &str) -> Vec<LogEntry> {
    let mut lines = content.trim().split('\n');
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_line.split(',').map(|h| h.trim().to_string()).collect();

    lines
        .filter_map(|line| {
            let mut entry = LogEntry {
                raw_data: Some(line.to_string()),
                ..LogEntry::default()
            };
            for (header, value) in headers.iter().zip(line.split(',').map(str::trim)) {
                if !value.is_empty() {
                    assign_by_key(&mut entry, header, value.to_string());
                }
            }
            entry.has_fault_signal().then_some(entry)
        })
        .collect()
}

pub fn parse_json_entries(content: &str) -> Result<Vec<LogEntry>, ParseError> {
    let to_entry = |obj: &RawFields| {
        let mut entry = LogEntry {
            raw_data: serde_json::to_string(obj).ok(),
            ..LogEntry::default()
        };
        for (key, value) in obj {
            assign_by_key(&mut entry, key, value_text(value));
        }
        entry
    };

    let entries = match serde_json::from_str::<Value>(content)? {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(to_entry)
            .filter(LogEntry::has_fault_signal)
            .collect(),
        Value::Object(obj) => Some(to_entry(&obj))
            .filter(LogEntry::has_fault_signal)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    };
    Ok(entries)
}

pub fn parse_txt_entries(content: &str) -> Vec<LogEntry> {
    content
        .trim()
        .split('\n')
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let lower = line.to_lowercase();
            let entry = LogEntry {
                timestamp: find_timestamp_in_text(line).map(str::to_string),
                error_code: capture(&RE_CODE, line, 1).map(str::to_string),
                connector_id: capture(&RE_CONNECTOR, line, 1).map(str::to_string),
                temperature: capture(&RE_TEMP, line, 1).and_then(parse_float_prefix),
                voltage: capture(&RE_VOLTAGE, line, 1).and_then(parse_float_prefix),
                current: capture(&RE_CURRENT, line, 1).and_then(parse_float_prefix),
                ocpp_status: capture(&RE_STATUS, line, 1).map(str::to_string),
                transaction_stop_reason: capture(&RE_REASON, line, 1)
                    .map(|r| r.trim().to_string()),
                vendor_error: ["error", "fault", "fail"]
                    .iter()
                    .any(|k| lower.contains(k))
                    .then(|| line.to_string()),
                raw_data: Some(line.to_string()),
                ..LogEntry::default()
            };
            entry.has_fault_signal().then_some(entry)
        })
        .collect()
}

/// Dispatches on the file extension; unknown extensions are read as text.
pub fn parse_log_entries(content: &str, filename: &str) -> Result<Vec<LogEntry>, ParseError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Ok(parse_csv_entries(content)),
        Some("json") => parse_json_entries(content),
        _ => Ok(parse_txt_entries(content)),
    }
}
