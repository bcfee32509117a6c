use crate::fields::{
    build_field_mapping_report, extract_headers_from_csv, extract_keys_from_json, HeaderMapping,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorName {
    Delta,
    #[serde(rename = "ABB")]
    Abb,
    Exicom,
    Servotech,
    Fortum,
    Statiq,
    #[serde(rename = "Tata Power")]
    TataPower,
    #[serde(rename = "Charge+Zone")]
    ChargeZone,
    #[serde(rename = "OCPP 1.6J")]
    Ocpp16J,
    #[serde(rename = "Custom OEM")]
    CustomOem,
    Unknown,
}

impl VendorName {
    pub fn as_str(self) -> &'static str {
        match self {
            VendorName::Delta => "Delta",
            VendorName::Abb => "ABB",
            VendorName::Exicom => "Exicom",
            VendorName::Servotech => "Servotech",
            VendorName::Fortum => "Fortum",
            VendorName::Statiq => "Statiq",
            VendorName::TataPower => "Tata Power",
            VendorName::ChargeZone => "Charge+Zone",
            VendorName::Ocpp16J => "OCPP 1.6J",
            VendorName::CustomOem => "Custom OEM",
            VendorName::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for VendorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogFormat {
    Csv,
    Json,
    Txt,
    Ocpp,
    #[serde(rename = "Mixed")]
    Mixed,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Csv => "CSV",
            LogFormat::Json => "JSON",
            LogFormat::Txt => "TXT",
            LogFormat::Ocpp => "OCPP",
            LogFormat::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VendorSignature {
    pub vendor: VendorName,
    pub patterns: &'static [&'static str],
    pub header_patterns: &'static [&'static str],
    pub json_key_patterns: &'static [&'static str],
}

/// Checked in order; the first signature to reach `MIN_SIGNATURE_CONFIDENCE` wins.
pub static VENDOR_SIGNATURES: [VendorSignature; 9] = [
    VendorSignature {
        vendor: VendorName::Delta,
        patterns: &["DELTA:OCPP", "DELTA_CP", "Delta Electronics", "DeltaCharger"],
        header_patterns: &["delta_error", "delta_event", "delta_status"],
        json_key_patterns: &["deltaErrorCode", "deltaConnectorId"],
    },
    VendorSignature {
        vendor: VendorName::Abb,
        patterns: &["ABB_ERR_", "ABB Terra", "ABB_CP", "ABBCharger"],
        header_patterns: &["abb_fault", "abb_alarm", "terra_log"],
        json_key_patterns: &["abbErrorCode", "terraStatus"],
    },
    VendorSignature {
        vendor: VendorName::Exicom,
        patterns: &["EXICOM-CP", "EXICOM_LOG", "Exicom Power", "EXI_"],
        header_patterns: &["exi_error", "exicom_event", "exi_status"],
        json_key_patterns: &["exicomError", "exiConnectorId"],
    },
    VendorSignature {
        vendor: VendorName::Servotech,
        patterns: &["SERVOTECH", "SRV_CP", "SERVO_LOG", "SRV_ERR"],
        header_patterns: &["srv_error", "servotech_log", "srv_event"],
        json_key_patterns: &["servotechError", "srvStatus"],
    },
    VendorSignature {
        vendor: VendorName::Fortum,
        patterns: &["FORTUM", "FRT_CP", "Fortum Charge", "FRT_LOG"],
        header_patterns: &["fortum_error", "frt_event", "fortum_status"],
        json_key_patterns: &["fortumError", "fortumConnector"],
    },
    VendorSignature {
        vendor: VendorName::Statiq,
        patterns: &["STQ_EVT", "STATIQ", "STQ_CP", "Statiq Log"],
        header_patterns: &["stq_error", "statiq_event", "stq_status"],
        json_key_patterns: &["statiqError", "stqConnectorId"],
    },
    VendorSignature {
        vendor: VendorName::TataPower,
        patterns: &["TATA_POWER", "TP_CP", "TataPower", "TP_LOG"],
        header_patterns: &["tp_error", "tata_event", "tatapower_log"],
        json_key_patterns: &["tataPowerError", "tpConnectorId"],
    },
    VendorSignature {
        vendor: VendorName::ChargeZone,
        patterns: &["CHARGEZONE LOG BLOCK", "CZ_CP", "ChargeZone", "CZ_ERR"],
        header_patterns: &["cz_error", "chargezone_event", "cz_status"],
        json_key_patterns: &["chargeZoneError", "czConnectorId"],
    },
    VendorSignature {
        vendor: VendorName::Ocpp16J,
        patterns: &[
            "BootNotification",
            "MeterValues",
            "StatusNotification",
            "StartTransaction",
            "StopTransaction",
            "Heartbeat",
        ],
        header_patterns: &["connectorId", "idTag", "meterValue", "timestamp"],
        json_key_patterns: &["connectorId", "idTag", "transactionId", "meterValue"],
    },
];

pub const OCPP_EVENT_PATTERNS: [&str; 10] = [
    "BootNotification",
    "MeterValues",
    "StatusNotification",
    "Heartbeat",
    "StartTransaction",
    "StopTransaction",
    "Authorize",
    "DataTransfer",
    "DiagnosticsStatusNotification",
    "FirmwareStatusNotification",
];

pub const MIN_SIGNATURE_CONFIDENCE: f64 = 0.3;
pub const OCPP_FALLBACK_CONFIDENCE: f64 = 0.7;
pub const GENERIC_FALLBACK_CONFIDENCE: f64 = 0.5;
const SAMPLE_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VendorMatch {
    pub vendor: VendorName,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub vendor: VendorName,
    pub format: LogFormat,
    pub confidence: f64,
    pub field_mappings: Vec<HeaderMapping>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

fn sample(content: &str) -> &str {
    match content.char_indices().nth(SAMPLE_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

pub fn detect_vendor_from_content(content: &str) -> Option<VendorMatch> {
    let lower = content.to_lowercase();
    let head = sample(content);

    VENDOR_SIGNATURES.iter().find_map(|sig| {
        let mut score = sig
            .patterns
            .iter()
            .filter(|p| head.contains(**p) || lower.contains(&p.to_lowercase()))
            .count() as f64;
        score += 0.5
            * sig
                .header_patterns
                .iter()
                .filter(|p| lower.contains(&p.to_lowercase()))
                .count() as f64;
        score += 0.5
            * sig
                .json_key_patterns
                .iter()
                .filter(|p| head.contains(**p))
                .count() as f64;

        let confidence = score / sig.patterns.len() as f64;
        (confidence >= MIN_SIGNATURE_CONFIDENCE).then(|| VendorMatch {
            vendor: sig.vendor,
            confidence: confidence.min(1.0),
        })
    })
}

/// True when at least two distinct OCPP message names appear.
pub fn detect_ocpp_events(content: &str) -> bool {
    OCPP_EVENT_PATTERNS
        .iter()
        .filter(|p| content.contains(**p))
        .count()
        >= 2
}

pub fn detect_log_format(content: &str, filename: &str) -> LogFormat {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => return LogFormat::Json,
        Some("csv") => return LogFormat::Csv,
        Some("txt") | Some("log") => {
            return if detect_ocpp_events(content) {
                LogFormat::Ocpp
            } else {
                LogFormat::Txt
            };
        }
        _ => {}
    }

    let trimmed = content.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(_) => LogFormat::Json,
            Err(_) => LogFormat::Mixed,
        };
    }

    let first_line = trimmed.split('\n').next().unwrap_or_default();
    if first_line.split(',').count() > 3 {
        return LogFormat::Csv;
    }

    if detect_ocpp_events(content) {
        LogFormat::Ocpp
    } else {
        LogFormat::Txt
    }
}

/// Never fails: weak evidence degrades to a low-confidence generic answer.
pub fn detect_vendor_and_format(content: &str, filename: &str) -> DetectionResult {
    let format = detect_log_format(content, filename);

    let VendorMatch { vendor, confidence } =
        detect_vendor_from_content(content).unwrap_or_else(|| {
            if detect_ocpp_events(content) {
                VendorMatch {
                    vendor: VendorName::Ocpp16J,
                    confidence: OCPP_FALLBACK_CONFIDENCE,
                }
            } else {
                VendorMatch {
                    vendor: VendorName::CustomOem,
                    confidence: GENERIC_FALLBACK_CONFIDENCE,
                }
            }
        });

    let headers = match format {
        LogFormat::Csv => extract_headers_from_csv(content),
        LogFormat::Json => extract_keys_from_json(content),
        _ => Vec::new(),
    };
    let field_mappings = build_field_mapping_report(&headers);

    let mut warnings = Vec::new();
    if confidence < 0.7 {
        warnings.push("Low confidence vendor detection - using generic mapping".to_string());
    }
    let unmapped: Vec<&str> = field_mappings
        .iter()
        .filter(|m| m.field.is_none())
        .map(|m| m.header.as_str())
        .collect();
    if !unmapped.is_empty() {
        warnings.push(format!(
            "{} fields could not be mapped: {}",
            unmapped.len(),
            unmapped.iter().take(3).copied().collect::<Vec<_>>().join(", ")
        ));
    }

    DetectionResult {
        vendor,
        format,
        confidence,
        field_mappings,
        warnings,
    }
}

pub fn vendor_display_name(vendor: VendorName, format: LogFormat) -> String {
    match vendor {
        VendorName::Ocpp16J => format!("{vendor} Standard"),
        _ => format!("{vendor} ({format} Format)"),
    }
}

pub fn confidence_level(confidence: f64) -> ConfidenceLevel {
    if confidence >= 0.8 {
        ConfidenceLevel::High
    } else if confidence >= 0.5 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

pub fn detection_summary(detection: &DetectionResult) -> String {
    let level = confidence_level(detection.confidence);
    let mapped = detection
        .field_mappings
        .iter()
        .filter(|m| m.field.is_some())
        .count();

    let mut summary = format!(
        "Vendor detected: {}\nConfidence: {:?} ({:.0}%)\nFormat: {}\nFields mapped: {}/{}\n",
        vendor_display_name(detection.vendor, detection.format),
        level,
        detection.confidence * 100.0,
        detection.format,
        mapped,
        detection.field_mappings.len(),
    );
    if !detection.warnings.is_empty() {
        summary.push_str("\nWarnings:\n");
        let lines: Vec<String> = detection.warnings.iter().map(|w| format!("- {w}")).collect();
        summary.push_str(&lines.join("\n"));
    }
    summary
}
