use chargescope::classifier::{
    classify_fault, classify_faults, fault_text, match_rule, severity_counts, FaultType, Severity, FAULT_RULES,
};
use chargescope::parser::LogEntry;
use proptest::prelude::*;

fn coded(code: &str) -> LogEntry {
    LogEntry {
        error_code: Some(code.to_string()),
        timestamp: Some("2025-01-10T08:00:00.000Z".to_string()),
        connector_id: Some("1".to_string()),
        ..LogEntry::default()
    }
}

#[test]
fn canonical_codes_classify() {
    let cases = [
        ("OVERCURRENT", FaultType::Overcurrent),
        ("OVERVOLTAGE", FaultType::Overvoltage),
        ("LOW_VOLTAGE", FaultType::LowGridVoltage),
        ("OVERHEATING", FaultType::Overheating),
        ("BMS_MISMATCH", FaultType::BmsMismatch),
        ("OCPP_DISCONNECT", FaultType::OcppDisconnect),
        ("POWER_MODULE", FaultType::PowerModuleFailure),
        ("VEHICLE_ABORT", FaultType::VehicleAbort),
        ("EMERGENCY_STOP", FaultType::EmergencyStop),
        ("CONTACTOR_STUCK", FaultType::ContactorStuck),
        ("SOFT_RESTART", FaultType::RepeatedRestarts),
    ];
    for (code, expected) in cases {
        let fault = classify_fault(&coded(code)).unwrap_or_else(|| panic!("{code} should classify"));
        assert_eq!(fault.fault_type, expected, "{code}");
    }
}

#[test]
fn first_matching_rule_wins() {
    let entry = coded("overheat after overcurrent");
    assert_eq!(match_rule(&entry).map(|r| r.fault_type), Some(FaultType::Overcurrent));
}

#[test]
fn vendor_error_and_stop_reason_are_searched() {
    let mut entry = LogEntry::default();
    entry.vendor_error = Some("Thermal derating engaged".to_string());
    assert_eq!(classify_fault(&entry).unwrap().fault_type, FaultType::Overheating);

    let mut entry = LogEntry::default();
    entry.transaction_stop_reason = Some("Remote_Stop".to_string());
    assert_eq!(classify_fault(&entry).unwrap().fault_type, FaultType::VehicleAbort);
    assert_eq!(fault_text(&entry), "  remote stop");

    // "disconnect" is an OCPP keyword and that rule is checked first
    entry.transaction_stop_reason = Some("EVDisconnected".to_string());
    assert_eq!(classify_fault(&entry).unwrap().fault_type, FaultType::OcppDisconnect);
}

#[test]
fn readings_alone_can_classify() {
    let at = |current: Option<f64>, voltage: Option<f64>, temperature: Option<f64>| LogEntry {
        current,
        voltage,
        temperature,
        ..LogEntry::default()
    };
    assert_eq!(classify_fault(&at(Some(80.1), None, None)).unwrap().fault_type, FaultType::Overcurrent);
    assert!(classify_fault(&at(Some(80.0), None, None)).is_none());
    assert_eq!(classify_fault(&at(None, Some(501.0), None)).unwrap().fault_type, FaultType::Overvoltage);
    assert_eq!(classify_fault(&at(None, Some(199.0), None)).unwrap().fault_type, FaultType::LowGridVoltage);
    assert!(classify_fault(&at(None, Some(230.0), None)).is_none());
    assert_eq!(classify_fault(&at(None, Some(0.0), None)).unwrap().fault_type, FaultType::LowGridVoltage);
    assert_eq!(classify_fault(&at(None, None, Some(70.5))).unwrap().fault_type, FaultType::Overheating);
    assert!(classify_fault(&at(None, None, Some(70.0))).is_none());
}

#[test]
fn offline_status_means_disconnect() {
    let entry = LogEntry {
        ocpp_status: Some("Offline".to_string()),
        ..LogEntry::default()
    };
    assert_eq!(classify_fault(&entry).unwrap().fault_type, FaultType::OcppDisconnect);
}

#[test]
fn fault_record_carries_rule_text_and_entry() {
    let entry = coded("POWER_MODULE");
    let fault = classify_fault(&entry).unwrap();
    assert!(fault.id.starts_with("fault-"));
    assert_eq!(fault.timestamp, "2025-01-10T08:00:00.000Z");
    assert_eq!(fault.connector_id, "1");
    assert_eq!(fault.severity, Severity::High);
    assert_eq!(fault.downtime, 24.0);
    assert_eq!(
        fault.description,
        "Internal power conversion module stopped functioning"
    );
    assert_eq!(fault.log_entry, entry);

    let other = classify_fault(&entry).unwrap();
    assert_ne!(fault.id, other.id);
}

#[test]
fn missing_connector_reads_unknown() {
    let mut entry = coded("OVERCURRENT");
    entry.connector_id = None;
    assert_eq!(classify_fault(&entry).unwrap().connector_id, "Unknown");
}

#[test]
fn unrecognised_entries_are_dropped() {
    let entries = vec![coded("OVERCURRENT"), coded("UNKNOWN"), coded("EMERGENCY_STOP")];
    let faults = classify_faults(&entries);
    assert_eq!(faults.len(), 2);

    let counts = severity_counts(&faults);
    assert_eq!(counts.total, 2);
    assert_eq!(counts.high, 2);
    assert_eq!(counts.medium + counts.low, 0);
}

#[test]
fn rule_table_is_in_priority_order() {
    let order: Vec<FaultType> = FAULT_RULES.iter().map(|r| r.fault_type).collect();
    assert_eq!(order.first(), Some(&FaultType::Overcurrent));
    assert_eq!(order.last(), Some(&FaultType::RepeatedRestarts));
    assert_eq!(order.len(), 11);
}

#[test]
fn fault_types_serialize_with_display_names() {
    assert_eq!(serde_json::to_string(&FaultType::LowGridVoltage).unwrap(), "\"Low grid voltage\"");
    assert_eq!(FaultType::VehicleAbort.to_string(), "Vehicle-side abort");
}

proptest! {
    #[test]
    fn current_above_limit_is_always_overcurrent(amps in 80.0001f64..10_000.0, volts in 200.0f64..=500.0) {
        let entry = LogEntry { current: Some(amps), voltage: Some(volts), ..LogEntry::default() };
        prop_assert_eq!(classify_fault(&entry).map(|f| f.fault_type), Some(FaultType::Overcurrent));
    }

    #[test]
    fn in_range_readings_without_text_are_not_faults(
        amps in 0.0f64..=80.0,
        volts in 200.0f64..=500.0,
        temp in -20.0f64..=70.0,
    ) {
        let entry = LogEntry {
            current: Some(amps),
            voltage: Some(volts),
            temperature: Some(temp),
            ..LogEntry::default()
        };
        prop_assert!(classify_fault(&entry).is_none());
    }
}
