use chargescope::classifier::{classify_fault, FaultAnalysis, FaultType};
use chargescope::cost::{
    calculate_cost_analysis_at, calculate_revenue_loss, format_currency, CostError, CostParameters,
};
use chargescope::parser::LogEntry;
use chrono::{TimeZone, Utc};

fn fault(code: &str, ts: &str) -> FaultAnalysis {
    let entry = LogEntry {
        error_code: Some(code.to_string()),
        timestamp: Some(ts.to_string()),
        connector_id: Some("1".to_string()),
        ..LogEntry::default()
    };
    classify_fault(&entry).expect("classifiable code")
}

#[test]
fn default_parameters_price_an_hour_at_seventy() {
    let params = CostParameters::default();
    assert_eq!(params.daily_revenue(), 1680.0);
    assert_eq!(params.hourly_revenue(), 70.0);
    assert_eq!(calculate_revenue_loss(4.0, &params), 280.0);
    assert_eq!(calculate_revenue_loss(0.0, &params), 0.0);
}

#[test]
fn parameters_must_be_positive_and_finite() {
    assert!(CostParameters::new(150.0, 10.0).is_ok());
    assert_eq!(
        CostParameters::new(0.0, 10.0),
        Err(CostError::NonPositive {
            field: "avgSessionValue",
            value: 0.0
        })
    );
    assert!(matches!(
        CostParameters::new(100.0, -1.0),
        Err(CostError::NonPositive {
            field: "avgSessionsPerDay",
            ..
        })
    ));
    assert!(CostParameters::new(f64::NAN, 10.0).is_err());
    assert!(CostParameters::new(100.0, f64::INFINITY).is_err());
}

#[test]
fn today_and_month_follow_the_calendar() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let faults = vec![
        fault("OVERCURRENT", "2025-01-10T08:00:00.000Z"),
        fault("OVERCURRENT", "2025-01-03T08:00:00.000Z"),
        fault("POWER_MODULE", "2024-12-31T23:00:00.000Z"),
        fault("OVERHEATING", "not a time"),
    ];
    let analysis = calculate_cost_analysis_at(&faults, &CostParameters::default(), &now);
    assert_eq!(analysis.revenue_today, 280.0);
    assert_eq!(analysis.revenue_this_month, 560.0);

    let top = &analysis.top_costliest_faults;
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].fault_type, FaultType::PowerModuleFailure);
    assert_eq!(top[0].total_cost, 1680.0);
    assert_eq!(top[1].fault_type, FaultType::Overcurrent);
    assert_eq!(top[1].occurrences, 2);
    assert_eq!(top[1].total_cost, 560.0);
    assert_eq!(top[2].fault_type, FaultType::Overheating);
    assert_eq!(top[2].total_cost, 210.0);
}

#[test]
fn only_five_costliest_types_are_kept() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let ts = "2025-01-10T08:00:00.000Z";
    let faults: Vec<FaultAnalysis> = [
        "OVERCURRENT",
        "OVERVOLTAGE",
        "LOW_VOLTAGE",
        "OVERHEATING",
        "POWER_MODULE",
        "CONTACTOR_STUCK",
        "VEHICLE_ABORT",
    ]
    .iter()
    .map(|code| fault(code, ts))
    .collect();
    let analysis = calculate_cost_analysis_at(&faults, &CostParameters::default(), &now);
    let kinds: Vec<FaultType> = analysis.top_costliest_faults.iter().map(|c| c.fault_type).collect();
    assert_eq!(
        kinds,
        vec![
            FaultType::PowerModuleFailure,
            FaultType::ContactorStuck,
            FaultType::Overvoltage,
            FaultType::Overcurrent,
            FaultType::Overheating,
        ]
    );
}

#[test]
fn no_faults_cost_nothing() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let analysis = calculate_cost_analysis_at(&[], &CostParameters::default(), &now);
    assert_eq!(analysis.revenue_today, 0.0);
    assert_eq!(analysis.revenue_this_month, 0.0);
    assert!(analysis.top_costliest_faults.is_empty());
}

#[test]
fn currency_uses_rupee_sign_and_two_decimals() {
    assert_eq!(format_currency(280.0), "₹280.00");
    assert_eq!(format_currency(12.5), "₹12.50");
}
