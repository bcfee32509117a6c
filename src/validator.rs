use crate::fields::{
    normalize_connector_id, normalize_error_code, parse_float_prefix, parse_int_prefix,
    FieldValue, NormalizedLogEntry, PartialEntry,
};
use crate::timestamp::{normalize_timestamp, to_iso};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const MAX_BATCH_WARNINGS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryValidation {
    pub entry: NormalizedLogEntry,
    /// True when any field had to be repaired or reformatted.
    pub fixed: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub fixed_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchValidation {
    pub entries: Vec<EntryValidation>,
    pub result: ValidationResult,
}

pub fn validate_and_fix_log_entry(partial: PartialEntry) -> EntryValidation {
    validate_and_fix_log_entry_at(partial, Utc::now())
}

/// Fills every missing field with its default and range-checks the readings.
/// Out-of-range values are reported but kept.
pub fn validate_and_fix_log_entry_at(partial: PartialEntry, now: DateTime<Utc>) -> EntryValidation {
    let mut warnings = Vec::new();
    let mut fixed = false;

    let timestamp = match non_empty(partial.timestamp) {
        None => {
            warnings.push("Missing timestamp - set to current time".to_string());
            fixed = true;
            to_iso(&now)
        }
        Some(ts) => match normalize_timestamp(&ts) {
            Some(normalized) => {
                fixed |= normalized != ts;
                normalized
            }
            None => {
                warnings.push("Invalid timestamp format - fixed to current time".to_string());
                fixed = true;
                to_iso(&now)
            }
        },
    };

    let connector_id = match non_empty(partial.connector_id) {
        None => {
            warnings.push("Missing connector ID - set to 0".to_string());
            fixed = true;
            "0".to_string()
        }
        Some(c) => {
            let normalized = normalize_connector_id(&c);
            fixed |= normalized != c;
            normalized
        }
    };

    let error_code = match non_empty(partial.error_code) {
        None => {
            warnings.push("Missing error code - set to UNKNOWN".to_string());
            fixed = true;
            "UNKNOWN".to_string()
        }
        Some(code) => {
            let normalized = normalize_error_code(&code);
            fixed |= normalized != code;
            normalized
        }
    };

    let status = non_empty(partial.status).unwrap_or_else(|| {
        fixed = true;
        "Unknown".to_string()
    });

    let voltage = numeric(partial.voltage, &mut fixed);
    if let Some(v) = voltage.filter(|v| !(0.0..=1000.0).contains(v)) {
        warnings.push(format!("Invalid voltage value: {v}V"));
    }
    let current = numeric(partial.current, &mut fixed);
    if let Some(a) = current.filter(|a| !(0.0..=500.0).contains(a)) {
        warnings.push(format!("Invalid current value: {a}A"));
    }
    let temperature = numeric(partial.temperature, &mut fixed);
    if let Some(t) = temperature.filter(|t| !(-50.0..=150.0).contains(t)) {
        warnings.push(format!("Invalid temperature value: {t}°C"));
    }
    let meter_value = numeric(partial.meter_value, &mut fixed);
    if let Some(m) = meter_value.filter(|m| *m < 0.0) {
        warnings.push(format!("Invalid meter value: {m}"));
    }

    let restart_count = match partial.restart_count {
        None => 0,
        Some(FieldValue::Number(n)) if n.is_finite() && n >= 0.0 => n as u32,
        Some(FieldValue::Number(_)) => {
            fixed = true;
            0
        }
        Some(FieldValue::Text(s)) => {
            fixed = true;
            parse_int_prefix(&s)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0)
        }
    };

    EntryValidation {
        entry: NormalizedLogEntry {
            timestamp,
            error_code,
            connector_id,
            status,
            voltage,
            current,
            meter_value,
            temperature,
            vendor_error_string: partial.vendor_error_string.unwrap_or_default(),
            restart_count,
            raw_data: partial.raw_data,
        },
        fixed,
        warnings,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn numeric(value: Option<FieldValue>, fixed: &mut bool) -> Option<f64> {
    match value? {
        FieldValue::Number(n) => Some(n),
        FieldValue::Text(s) => {
            *fixed = true;
            parse_float_prefix(&s)
        }
    }
}

pub fn validate_log_batch(entries: Vec<PartialEntry>) -> BatchValidation {
    validate_log_batch_at(entries, Utc::now())
}

/// Validates every entry and condenses the warnings into at most
/// `MAX_BATCH_WARNINGS` distinct `Line N: ...` lines.
pub fn validate_log_batch_at(entries: Vec<PartialEntry>, now: DateTime<Utc>) -> BatchValidation {
    let validated: Vec<EntryValidation> = entries
        .into_iter()
        .map(|e| validate_and_fix_log_entry_at(e, now))
        .collect();

    let fixed_count = validated.iter().filter(|v| v.fixed).count();
    let warnings = validated
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.warnings.is_empty())
        .map(|(i, v)| format!("Line {}: {}", i + 1, v.warnings.join(", ")))
        .unique()
        .take(MAX_BATCH_WARNINGS)
        .collect();

    let errors: Vec<String> = Vec::new();
    BatchValidation {
        entries: validated,
        result: ValidationResult {
            is_valid: errors.is_empty(),
            fixed_count,
            warnings,
            errors,
        },
    }
}

/// Counts structurally suspicious lines. Reporting only; nothing is dropped.
pub fn detect_corrupted_lines(content: &str) -> usize {
    content
        .split('\n')
        .filter(|line| {
            line.trim().is_empty()
                || line.chars().count() < 10
                || line.matches('{').count() != line.matches('}').count()
                || line.matches('[').count() != line.matches(']').count()
        })
        .count()
}

pub fn is_valid_connector_id(connector_id: &str) -> bool {
    parse_int_prefix(connector_id).is_some_and(|n| (0..=100).contains(&n))
}
