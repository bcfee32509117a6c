use chargescope::classifier::{classify_fault, FaultAnalysis};
use chargescope::cost::{calculate_cost_analysis_at, CostParameters};
use chargescope::export::{faults_to_csv, report_summary, CSV_HEADERS};
use chargescope::parser::LogEntry;
use chrono::{TimeZone, Utc};

fn fault(code: &str, current: Option<f64>, temperature: Option<f64>) -> FaultAnalysis {
    let entry = LogEntry {
        error_code: Some(code.to_string()),
        timestamp: Some("2025-01-10T08:00:00.000Z".to_string()),
        connector_id: Some("2".to_string()),
        current,
        temperature,
        ..LogEntry::default()
    };
    classify_fault(&entry).expect("classifiable code")
}

#[test]
fn header_row_lists_every_column() {
    let csv = faults_to_csv(&[], &CostParameters::default());
    assert_eq!(csv, CSV_HEADERS.join(","));
    assert!(csv.starts_with("Fault ID,Fault Type,Timestamp,Connector ID,Severity,"));
    assert!(csv.ends_with("Error Code,Temperature,Voltage,Current"));
}

#[test]
fn fault_rows_are_fully_quoted() {
    let f = fault("OVERCURRENT", Some(85.5), None);
    let csv = faults_to_csv(&[f.clone()], &CostParameters::default());
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(lines.len(), 2);

    let row = lines[1];
    assert!(row.starts_with(&format!("\"{}\",\"Overcurrent\",\"2025-01-10T08:00:00.000Z\",\"2\",\"High\",", f.id)));
    assert!(row.ends_with(",\"4\",\"280.00\",\"OVERCURRENT\",\"\",\"\",\"85.5\""));
}

#[test]
fn embedded_quotes_are_doubled() {
    let f = fault("OC \"late\"", Some(90.0), Some(41.0));
    let csv = faults_to_csv(&[f], &CostParameters::default());
    assert!(csv.contains(",\"OC \"\"late\"\"\",\"41\",\"\",\"90\""));
}

#[test]
fn text_report_summarises_counts_and_costs() {
    let faults = vec![
        fault("OVERCURRENT", None, None),
        fault("OVERCURRENT", None, None),
        fault("BMS_MISMATCH", None, None),
        fault("VEHICLE_ABORT", None, None),
    ];
    let params = CostParameters::default();
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let cost = calculate_cost_analysis_at(&faults, &params, &now);
    let report = report_summary(&faults, &cost, &params);

    assert!(report.starts_with("Fault Diagnosis Report\n"));
    assert!(report.contains("Total Faults Detected: 4\n"));
    assert!(report.contains("High Severity: 2\nMedium Severity: 1\nLow Severity: 1\n"));
    assert!(report.contains("Revenue Lost Today: ₹700.00\n"));
    assert!(report.contains("Avg Session Value: ₹120.00\n"));
    assert!(report.contains("Avg Sessions/Day: 14\n"));
    assert!(report.contains("Top 3 Costliest Faults\n"));
    assert!(report.contains("1. Overcurrent - 2 occurrence(s), ₹560.00\n"));
    assert!(report.contains("3. Vehicle-side abort - 1 occurrence(s), ₹0.00\n"));
}

#[test]
fn empty_report_skips_the_ranking() {
    let params = CostParameters::default();
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let cost = calculate_cost_analysis_at(&[], &params, &now);
    let report = report_summary(&[], &cost, &params);
    assert!(report.contains("Total Faults Detected: 0"));
    assert!(!report.contains("Costliest"));
}
