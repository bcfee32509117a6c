use crate::parser::LogEntry;
use crate::timestamp::to_iso;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultType {
    Overcurrent,
    Overvoltage,
    #[serde(rename = "Low grid voltage")]
    LowGridVoltage,
    Overheating,
    #[serde(rename = "BMS communication mismatch")]
    BmsMismatch,
    #[serde(rename = "OCPP network disconnect")]
    OcppDisconnect,
    #[serde(rename = "Power module failure")]
    PowerModuleFailure,
    #[serde(rename = "Vehicle-side abort")]
    VehicleAbort,
    #[serde(rename = "Emergency stop")]
    EmergencyStop,
    #[serde(rename = "Contactor stuck")]
    ContactorStuck,
    #[serde(rename = "Repeated soft restarts")]
    RepeatedRestarts,
}

impl FaultType {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultType::Overcurrent => "Overcurrent",
            FaultType::Overvoltage => "Overvoltage",
            FaultType::LowGridVoltage => "Low grid voltage",
            FaultType::Overheating => "Overheating",
            FaultType::BmsMismatch => "BMS communication mismatch",
            FaultType::OcppDisconnect => "OCPP network disconnect",
            FaultType::PowerModuleFailure => "Power module failure",
            FaultType::VehicleAbort => "Vehicle-side abort",
            FaultType::EmergencyStop => "Emergency stop",
            FaultType::ContactorStuck => "Contactor stuck",
            FaultType::RepeatedRestarts => "Repeated soft restarts",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultAnalysis {
    pub id: String,
    pub fault_type: FaultType,
    pub timestamp: String,
    pub connector_id: String,
    pub description: String,
    pub root_cause: String,
    pub impact: String,
    pub severity: Severity,
    pub resolution: String,
    /// Estimated hours out of service.
    pub downtime: f64,
    pub log_entry: LogEntry,
}

/// One piece of evidence a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Substring of the lowercased code / vendor error / stop reason text.
    Keyword(&'static str),
    CurrentAbove(f64),
    VoltageAbove(f64),
    VoltageBelow(f64),
    TemperatureAbove(f64),
    /// Substring of the lowercased OCPP status.
    StatusContains(&'static str),
}

impl Signal {
    fn matches(&self, haystack: &str, entry: &LogEntry) -> bool {
        match *self {
            Signal::Keyword(k) => haystack.contains(k),
            Signal::CurrentAbove(limit) => entry.current.is_some_and(|a| a > limit),
            Signal::VoltageAbove(limit) => entry.voltage.is_some_and(|v| v > limit),
            Signal::VoltageBelow(limit) => entry.voltage.is_some_and(|v| v < limit),
            Signal::TemperatureAbove(limit) => entry.temperature.is_some_and(|t| t > limit),
            Signal::StatusContains(k) => entry
                .ocpp_status
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(k)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FaultRule {
    pub fault_type: FaultType,
    pub signals: &'static [Signal],
    pub description: &'static str,
    pub root_cause: &'static str,
    pub impact: &'static str,
    pub severity: Severity,
    pub resolution: &'static str,
    pub estimated_downtime: f64,
}

impl FaultRule {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        let haystack = fault_text(entry);
        self.signals.iter().any(|s| s.matches(&haystack, entry))
    }
}

use Signal::*;

/// Evaluated top to bottom; the first rule with any matching signal decides the fault type.
pub static FAULT_RULES: [FaultRule; 11] = [
    FaultRule {
        fault_type: FaultType::Overcurrent,
        signals: &[
            Keyword("overcurrent"),
            Keyword("over current"),
            Keyword("current limit"),
            CurrentAbove(80.0),
        ],
        description: "Current exceeded safe operating limits during charging session",
        root_cause: "Vehicle battery management system requesting excessive current, or faulty current sensor providing incorrect readings",
        impact: "Charging session terminated to prevent equipment damage and ensure safety",
        severity: Severity::High,
        resolution: "Electrician required to inspect current sensors and wiring. Check vehicle BMS compatibility.",
        estimated_downtime: 4.0,
    },
    FaultRule {
        fault_type: FaultType::Overvoltage,
        signals: &[
            Keyword("overvoltage"),
            Keyword("over voltage"),
            Keyword("voltage high"),
            VoltageAbove(500.0),
        ],
        description: "Voltage levels exceeded maximum threshold during operation",
        root_cause: "Grid voltage fluctuation or internal voltage regulator malfunction",
        impact: "Immediate shutdown to protect sensitive electronic components",
        severity: Severity::High,
        resolution: "Vendor support needed. Check grid voltage stability and internal voltage regulation circuits.",
        estimated_downtime: 6.0,
    },
    FaultRule {
        fault_type: FaultType::LowGridVoltage,
        signals: &[
            Keyword("low voltage"),
            Keyword("under voltage"),
            Keyword("voltage drop"),
            Keyword("grid voltage"),
            VoltageBelow(200.0),
        ],
        description: "Input grid voltage dropped below minimum operating threshold",
        root_cause: "Utility grid instability, transformer issues, or high load on local distribution",
        impact: "Charging paused until voltage stabilizes, affecting customer experience",
        severity: Severity::Medium,
        resolution: "Monitor grid voltage. Contact utility provider if persistent. Consider voltage stabilizer installation.",
        estimated_downtime: 2.0,
    },
    FaultRule {
        fault_type: FaultType::Overheating,
        signals: &[
            Keyword("overheat"),
            Keyword("over heat"),
            Keyword("temperature"),
            Keyword("thermal"),
            TemperatureAbove(70.0),
        ],
        description: "Internal temperature exceeded safe operating limits",
        root_cause: "Inadequate cooling, blocked ventilation, ambient temperature too high, or continuous high-power operation",
        impact: "Thermal protection activated, charging stopped to prevent component damage",
        severity: Severity::High,
        resolution: "Check cooling fans and ventilation. Clean air filters. Ensure adequate spacing around charger.",
        estimated_downtime: 3.0,
    },
    FaultRule {
        fault_type: FaultType::BmsMismatch,
        signals: &[
            Keyword("bms"),
            Keyword("battery management"),
            Keyword("communication"),
            Keyword("protocol"),
            Keyword("handshake"),
        ],
        description: "Failed to establish or maintain communication with vehicle Battery Management System",
        root_cause: "Incompatible communication protocol, damaged charging cable, or vehicle BMS software issue",
        impact: "Charging cannot start or stops mid-session due to lack of battery status information",
        severity: Severity::Medium,
        resolution: "Check charging cable for damage. Update charger firmware. Test with different vehicles to isolate issue.",
        estimated_downtime: 2.0,
    },
    FaultRule {
        fault_type: FaultType::OcppDisconnect,
        signals: &[
            Keyword("ocpp"),
            Keyword("network"),
            Keyword("disconnect"),
            Keyword("offline"),
            Keyword("connection lost"),
            StatusContains("offline"),
        ],
        description: "Lost connection to central management system via OCPP protocol",
        root_cause: "Internet connectivity issue, router malfunction, or backend server downtime",
        impact: "Charger operates in offline mode, unable to authorize transactions or report status",
        severity: Severity::Medium,
        resolution: "Check internet connection and router. Verify backend server status. Simple local reset may resolve.",
        estimated_downtime: 1.0,
    },
    FaultRule {
        fault_type: FaultType::PowerModuleFailure,
        signals: &[
            Keyword("power module"),
            Keyword("converter"),
            Keyword("hardware fail"),
            Keyword("module fail"),
        ],
        description: "Internal power conversion module stopped functioning",
        root_cause: "Component failure in AC-DC converter, damaged power electronics, or control board malfunction",
        impact: "Charger completely non-operational until hardware repair",
        severity: Severity::High,
        resolution: "Vendor support needed immediately. Requires hardware replacement and technical expertise.",
        estimated_downtime: 24.0,
    },
    FaultRule {
        fault_type: FaultType::VehicleAbort,
        signals: &[
            Keyword("evdisconnected"),
            Keyword("ev disconnect"),
            Keyword("user stop"),
            Keyword("vehicle abort"),
            Keyword("remote stop"),
        ],
        description: "Charging session terminated by vehicle or user action",
        root_cause: "User manually stopped charging, vehicle reached target charge level, or vehicle BMS initiated stop",
        impact: "Normal operation - no equipment issue",
        severity: Severity::Low,
        resolution: "No action required. This is normal user behavior or vehicle-initiated stop.",
        estimated_downtime: 0.0,
    },
    FaultRule {
        fault_type: FaultType::EmergencyStop,
        signals: &[Keyword("emergency"), Keyword("e-stop"), Keyword("estop")],
        description: "Emergency stop button was activated",
        root_cause: "User pressed emergency stop button due to safety concern or accidental activation",
        impact: "Immediate power cutoff to all charging operations",
        severity: Severity::High,
        resolution: "Inspect site for safety issues. Reset emergency stop button. Electrician may be required for inspection.",
        estimated_downtime: 1.0,
    },
    FaultRule {
        fault_type: FaultType::ContactorStuck,
        signals: &[Keyword("contactor"), Keyword("relay stuck"), Keyword("relay fail")],
        description: "Main power contactor failed to open or close properly",
        root_cause: "Mechanical wear, contactor coil failure, or welded contacts due to arc damage",
        impact: "Unable to safely control power delivery to vehicle",
        severity: Severity::High,
        resolution: "Vendor support needed. Contactor replacement required by qualified technician.",
        estimated_downtime: 8.0,
    },
    FaultRule {
        fault_type: FaultType::RepeatedRestarts,
        signals: &[
            Keyword("restart"),
            Keyword("reboot"),
            Keyword("watchdog"),
            Keyword("reset"),
        ],
        description: "Charger experiencing multiple automatic restart cycles",
        root_cause: "Software bug, intermittent hardware fault, or unstable power supply causing watchdog resets",
        impact: "Unreliable operation, frequent service interruptions",
        severity: Severity::Medium,
        resolution: "Update firmware to latest version. If persists, vendor support needed for diagnostics.",
        estimated_downtime: 4.0,
    },
];

/// Lowercased code, vendor error and stop reason. Underscores read as spaces so
/// canonical codes such as `POWER_MODULE` hit the same keywords as prose.
pub fn fault_text(entry: &LogEntry) -> String {
    let parts = [
        entry.error_code.as_deref().unwrap_or_default(),
        entry.vendor_error.as_deref().unwrap_or_default(),
        entry.transaction_stop_reason.as_deref().unwrap_or_default(),
    ];
    parts.join(" ").to_lowercase().replace('_', " ")
}

pub fn match_rule(entry: &LogEntry) -> Option<&'static FaultRule> {
    let haystack = fault_text(entry);
    FAULT_RULES
        .iter()
        .find(|rule| rule.signals.iter().any(|s| s.matches(&haystack, entry)))
}

pub fn classify_fault(entry: &LogEntry) -> Option<FaultAnalysis> {
    let rule = match_rule(entry)?;
    Some(FaultAnalysis {
        id: format!("fault-{}", Uuid::new_v4()),
        fault_type: rule.fault_type,
        timestamp: entry
            .timestamp
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| to_iso(&Utc::now())),
        connector_id: entry
            .connector_id
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        description: rule.description.to_string(),
        root_cause: rule.root_cause.to_string(),
        impact: rule.impact.to_string(),
        severity: rule.severity,
        resolution: rule.resolution.to_string(),
        downtime: rule.estimated_downtime,
        log_entry: entry.clone(),
    })
}

/// Entries no rule recognises are dropped.
pub fn classify_faults(entries: &[LogEntry]) -> Vec<FaultAnalysis> {
    let faults: Vec<FaultAnalysis> = entries.iter().filter_map(classify_fault).collect();
    tracing::debug!(
        entries = entries.len(),
        faults = faults.len(),
        unclassified = entries.len() - faults.len(),
        "classified log entries"
    );
    faults
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

pub fn severity_counts(faults: &[FaultAnalysis]) -> SeverityCounts {
    faults.iter().fold(
        SeverityCounts {
            total: faults.len(),
            ..SeverityCounts::default()
        },
        |mut acc, f| {
            match f.severity {
                Severity::High => acc.high += 1,
                Severity::Medium => acc.medium += 1,
                Severity::Low => acc.low += 1,
            }
            acc
        },
    )
}
