use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Raw key/value record as produced by the format parsers.
pub type RawFields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Timestamp,
    ErrorCode,
    ConnectorId,
    Status,
    Voltage,
    Current,
    MeterValue,
    Temperature,
    VendorErrorString,
    RestartCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Float,
    Integer,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::Timestamp,
        CanonicalField::ErrorCode,
        CanonicalField::ConnectorId,
        CanonicalField::Status,
        CanonicalField::Voltage,
        CanonicalField::Current,
        CanonicalField::MeterValue,
        CanonicalField::Temperature,
        CanonicalField::VendorErrorString,
        CanonicalField::RestartCount,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Timestamp => "timestamp",
            CanonicalField::ErrorCode => "errorCode",
            CanonicalField::ConnectorId => "connectorId",
            CanonicalField::Status => "status",
            CanonicalField::Voltage => "voltage",
            CanonicalField::Current => "current",
            CanonicalField::MeterValue => "meterValue",
            CanonicalField::Temperature => "temperature",
            CanonicalField::VendorErrorString => "vendorErrorString",
            CanonicalField::RestartCount => "restartCount",
        }
    }

    /// Vendor spellings accepted for this field, in resolution order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            CanonicalField::Timestamp => &[
                "timestamp", "time", "datetime", "event_time", "log_time", "ts", "date_time",
                "eventTimestamp", "logTimestamp",
            ],
            CanonicalField::ErrorCode => &[
                "errorCode", "error_code", "err_code", "fault_code", "alarm_code", "errCode",
                "faultCode", "alarmCode", "error", "fault", "deltaErrorCode", "abbErrorCode",
                "exicomError",
            ],
            CanonicalField::ConnectorId => &[
                "connectorId", "connector_id", "evse_id", "evseId", "connector", "port", "outlet",
                "EVSE_ID", "ConnectorId", "deltaConnectorId", "exiConnectorId",
            ],
            CanonicalField::Status => &[
                "status", "state", "charger_status", "connector_status", "evse_status",
                "chargerStatus", "connectorStatus", "currentState",
            ],
            CanonicalField::Voltage => &[
                "voltage", "volt", "v", "volt_r", "volt_s", "volt_t", "Volt_R", "Volt_S",
                "Volt_T", "voltageL1", "voltageL2", "voltageL3",
            ],
            CanonicalField::Current => &[
                "current", "amp", "a", "current_r", "current_s", "current_t", "Current_R",
                "Current_S", "Current_T", "currentL1", "currentL2", "currentL3",
            ],
            CanonicalField::MeterValue => &[
                "meterValue", "meter_value", "energy", "kwh", "energy_delivered", "meterReading",
                "energyDelivered", "totalEnergy",
            ],
            CanonicalField::Temperature => &[
                "temperature", "temp", "temp_c", "Temp_C", "temperatureC", "tempCelsius",
                "internalTemp",
            ],
            CanonicalField::VendorErrorString => &[
                "error_message", "error_msg", "message", "description", "error_description",
                "fault_description", "errorMessage", "errorDescription", "faultDescription",
            ],
            CanonicalField::RestartCount => &[
                "restart_count", "restartCount", "reboot_count", "reset_count", "restarts",
                "reboots",
            ],
        }
    }

    pub fn transform(self) -> Option<Transform> {
        match self {
            CanonicalField::Voltage
            | CanonicalField::Current
            | CanonicalField::MeterValue
            | CanonicalField::Temperature => Some(Transform::Float),
            CanonicalField::RestartCount => Some(Transform::Integer),
            _ => None,
        }
    }

    /// Resolves a raw header or key to the canonical field it feeds, if any.
    pub fn for_header(header: &str) -> Option<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .find(|f| f.aliases().iter().any(|a| a.eq_ignore_ascii_case(header)))
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Transform {
    /// Unparseable input maps to zero.
    pub fn apply(self, raw: &str) -> f64 {
        match self {
            Transform::Float => parse_float_prefix(raw).unwrap_or(0.0),
            Transform::Integer => parse_int_prefix(raw).map(|n| n as f64).unwrap_or(0.0),
        }
    }
}

/// A mapped value before validation: numeric once transformed, otherwise the vendor text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// Output of the field mapper. Anything `None` is filled in by the validator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialEntry {
    pub timestamp: Option<String>,
    pub error_code: Option<String>,
    pub connector_id: Option<String>,
    pub status: Option<String>,
    pub voltage: Option<FieldValue>,
    pub current: Option<FieldValue>,
    pub meter_value: Option<FieldValue>,
    pub temperature: Option<FieldValue>,
    pub vendor_error_string: Option<String>,
    pub restart_count: Option<FieldValue>,
    pub raw_data: Option<RawFields>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLogEntry {
    pub timestamp: String,
    pub error_code: String,
    pub connector_id: String,
    pub status: String,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub meter_value: Option<f64>,
    pub temperature: Option<f64>,
    pub vendor_error_string: String,
    pub restart_count: u32,
    pub raw_data: Option<RawFields>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMapping {
    pub header: String,
    /// `None` when no alias matched.
    pub field: Option<CanonicalField>,
}

pub fn map_fields_to_standard(raw: &RawFields) -> PartialEntry {
    let mut entry = PartialEntry {
        raw_data: Some(raw.clone()),
        ..PartialEntry::default()
    };

    for field in CanonicalField::ALL {
        let Some(value) = find_alias_value(raw, field) else {
            continue;
        };
        match field {
            CanonicalField::Timestamp => entry.timestamp = Some(value_text(value)),
            CanonicalField::ErrorCode => entry.error_code = Some(value_text(value)),
            CanonicalField::ConnectorId => entry.connector_id = Some(value_text(value)),
            CanonicalField::Status => entry.status = Some(value_text(value)),
            CanonicalField::VendorErrorString => {
                entry.vendor_error_string = Some(value_text(value))
            }
            CanonicalField::Voltage => entry.voltage = numeric_value(field, value),
            CanonicalField::Current => entry.current = numeric_value(field, value),
            CanonicalField::MeterValue => entry.meter_value = numeric_value(field, value),
            CanonicalField::Temperature => entry.temperature = numeric_value(field, value),
            CanonicalField::RestartCount => entry.restart_count = numeric_value(field, value),
        }
    }

    entry
}

/// First non-null value whose key matches one of the field's aliases, ignoring case.
pub fn find_alias_value(raw: &RawFields, field: CanonicalField) -> Option<&Value> {
    field.aliases().iter().find_map(|alias| {
        raw.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(alias))
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    })
}

/// Blank cells count as absent; other text goes through the field's transform.
fn numeric_value(field: CanonicalField, value: &Value) -> Option<FieldValue> {
    let mapped = match (value, field.transform()) {
        (Value::Number(n), _) => n
            .as_f64()
            .map(FieldValue::Number)
            .unwrap_or_else(|| FieldValue::Text(n.to_string())),
        (Value::String(s), _) if s.trim().is_empty() => return None,
        (Value::String(s), Some(t)) => FieldValue::Number(t.apply(s)),
        (other, _) => FieldValue::Text(value_text(other)),
    };
    Some(mapped)
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn build_field_mapping_report(headers: &[String]) -> Vec<HeaderMapping> {
    headers
        .iter()
        .map(|h| HeaderMapping {
            header: h.clone(),
            field: CanonicalField::for_header(h),
        })
        .collect()
}

pub fn extract_headers_from_csv(content: &str) -> Vec<String> {
    let first = content.split('\n').next().unwrap_or_default().trim();
    if first.is_empty() {
        return Vec::new();
    }
    first.split(',').map(clean_csv_cell).collect()
}

pub(crate) fn clean_csv_cell(cell: &str) -> String {
    cell.trim().replace(['"', '\''], "")
}

pub fn extract_keys_from_json(content: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => match items.first() {
            Some(Value::Object(obj)) => obj.keys().cloned().collect(),
            _ => Vec::new(),
        },
        Ok(Value::Object(obj)) => obj.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

pub fn normalize_connector_id(raw: &str) -> String {
    let cleaned = raw.trim();
    if let Some(m) = RE_DIGITS.find(cleaned) {
        return m.as_str().to_string();
    }
    if cleaned.is_empty() {
        "0".to_string()
    } else {
        cleaned.to_string()
    }
}

const ERROR_CODE_CATEGORIES: &[(&[&str], &str)] = &[
    (&["OVERCURRENT"], "OVERCURRENT"),
    (&["OVERVOLTAGE"], "OVERVOLTAGE"),
    (&["UNDERVOLTAGE", "LOW_VOLTAGE"], "LOW_VOLTAGE"),
    (&["OVERHEAT", "TEMPERATURE"], "OVERHEATING"),
    (&["BMS", "COMMUNICATION"], "BMS_MISMATCH"),
    (&["OCPP", "NETWORK"], "OCPP_DISCONNECT"),
    (&["POWER", "MODULE"], "POWER_MODULE"),
    (&["EMERGENCY", "ESTOP"], "EMERGENCY_STOP"),
    (&["CONTACTOR", "RELAY"], "CONTACTOR_STUCK"),
    (&["RESTART", "REBOOT"], "SOFT_RESTART"),
    (&["VEHICLE", "EV_"], "VEHICLE_ABORT"),
];

/// Uppercases a vendor code and folds known families onto a category name.
pub fn normalize_error_code(raw: &str) -> String {
    let cleaned = raw.trim().to_uppercase();
    if cleaned.is_empty() {
        return "UNKNOWN".to_string();
    }
    ERROR_CODE_CATEGORIES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| cleaned.contains(n)))
        .map(|(_, category)| category.to_string())
        .unwrap_or(cleaned)
}

static RE_FLOAT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());
static RE_INT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[+-]?\d+").unwrap());

/// Leading numeric prefix of a string, so `"230.5V"` reads as 230.5.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    RE_FLOAT_PREFIX
        .find(s)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
}

pub fn parse_int_prefix(s: &str) -> Option<i64> {
    RE_INT_PREFIX
        .find(s)
        .and_then(|m| m.as_str().trim().parse::<i64>().ok())
}
