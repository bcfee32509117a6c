use chargescope::classifier::FaultType;
use chargescope::cost::CostParameters;
use chargescope::pipeline::{AnalyzerConfig, LogAnalyzer, OptimizeMode, PipelineError};
use chargescope::reader::ProcessingStage;
use chargescope::vendor::LogFormat;
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;

const CSV: &str = "timestamp,error_code,connector_id,voltage,current,temperature
2025-01-10 08:00:00,OVERCURRENT,1,230,85,40
2025-01-10 09:00:00,OVERHEATING,2,230,20,75
2025-01-10 10:00:00,INFO,1,230,10,30
";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
}

#[test]
fn csv_log_is_analyzed_end_to_end() {
    let analyzer = LogAnalyzer::default();
    let mut rng = StdRng::seed_from_u64(3);
    let analysis = analyzer.analyze_content_with(CSV, "site.csv", now(), &mut rng).unwrap();

    assert_eq!(analysis.filename, "site.csv");
    assert_eq!(analysis.detection.format, LogFormat::Csv);
    assert_eq!(analysis.detection.entries_processed, 3);
    assert_eq!(analysis.validation.total_entries, 3);
    assert!(analysis.optimization.is_none());

    let kinds: Vec<FaultType> = analysis.faults.iter().map(|f| f.fault_type).collect();
    assert_eq!(kinds, vec![FaultType::Overcurrent, FaultType::Overheating]);
    assert_eq!(analysis.faults[0].timestamp, "2025-01-10T08:00:00.000Z");
    assert_eq!(analysis.severity.total, 2);
    assert_eq!(analysis.severity.high, 2);

    assert_eq!(analysis.cost.revenue_today, 490.0);
    assert_eq!(analysis.cost.revenue_this_month, 490.0);
    assert_eq!(analysis.cost.top_costliest_faults[0].fault_type, FaultType::Overcurrent);

    assert!(analysis.alerts.is_empty());
    assert_eq!(analysis.charger_health.len(), 2);
    assert_eq!(analysis.health.len(), 2);
    assert_eq!(analysis.summary.total_chargers, 2);
    assert_eq!(analysis.summary.at_risk_chargers, 0);
}

#[test]
fn repricing_updates_cost_views() {
    let analyzer = LogAnalyzer::default();
    let mut rng = StdRng::seed_from_u64(3);
    let mut analysis = analyzer.analyze_content_with(CSV, "site.csv", now(), &mut rng).unwrap();

    let params = CostParameters::new(240.0, 14.0).unwrap();
    analysis.reprice_with(params, now(), &mut rng).unwrap();
    assert_eq!(analysis.cost_params, params);
    assert_eq!(analysis.cost.revenue_today, 980.0);
    let total_loss: f64 = analysis.health.iter().map(|h| h.estimated_loss).sum();
    assert_eq!(total_loss, 980.0);

    let bad = CostParameters {
        avg_session_value: -5.0,
        avg_sessions_per_day: 14.0,
    };
    assert!(analysis.reprice_with(bad, now(), &mut rng).is_err());
    assert_eq!(analysis.cost_params, params);
}

#[test]
fn optimizer_runs_when_forced() {
    let config = AnalyzerConfig {
        optimize: OptimizeMode::Always,
        ..AnalyzerConfig::default()
    };
    let analyzer = LogAnalyzer::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let analysis = analyzer.analyze_content_with(CSV, "site.csv", now(), &mut rng).unwrap();
    let stats = analysis.optimization.expect("optimizer stats");
    assert_eq!(stats.total_lines, 3);
    assert_eq!(analysis.faults.len(), 2);
}

#[test]
fn content_without_entries_is_rejected() {
    let analyzer = LogAnalyzer::default();
    let mut rng = StdRng::seed_from_u64(3);
    let err = analyzer
        .analyze_content_with("just chatter\nmore chatter\n", "cp.log", now(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoValidData { .. }));
    assert_eq!(
        err.to_string(),
        "No valid log entries were found in cp.log. Please upload a different file."
    );
}

#[test]
fn entries_without_faults_are_rejected() {
    let analyzer = LogAnalyzer::default();
    let mut rng = StdRng::seed_from_u64(3);
    let content = "timestamp,error_code,connector_id\n2025-01-10 10:00:00,INFO,1\n";
    let err = analyzer
        .analyze_content_with(content, "quiet.csv", now(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoFaultsDetected { ref filename } if filename == "quiet.csv"));
}

#[test]
fn malformed_json_surfaces_as_parse_error() {
    let analyzer = LogAnalyzer::default();
    let mut rng = StdRng::seed_from_u64(3);
    let err = analyzer
        .analyze_content_with("[{\"errorCode\":", "faults.json", now(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
}

#[test]
fn invalid_cost_config_is_refused() {
    let config = AnalyzerConfig {
        cost: CostParameters {
            avg_session_value: 0.0,
            avg_sessions_per_day: 14.0,
        },
        ..AnalyzerConfig::default()
    };
    assert!(matches!(LogAnalyzer::new(config), Err(PipelineError::Cost(_))));
}

#[test]
fn config_deserializes_with_defaults() {
    let config: AnalyzerConfig = serde_json::from_str(r#"{"optimize":"never"}"#).unwrap();
    assert_eq!(config.optimize, OptimizeMode::Never);
    assert_eq!(config.cost, CostParameters::default());
    assert_eq!(config.optimize_threshold_bytes, 5 * 1024 * 1024);

    let config: AnalyzerConfig =
        serde_json::from_str(r#"{"cost":{"avgSessionValue":200.0,"avgSessionsPerDay":10.0}}"#).unwrap();
    assert_eq!(config.cost.daily_revenue(), 2000.0);
    assert_eq!(config.optimize, OptimizeMode::Auto);
}

#[test]
fn file_analysis_reports_progress_to_completion() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(CSV.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = AnalyzerConfig {
        chunk_size_bytes: 32,
        ..AnalyzerConfig::default()
    };
    let analyzer = LogAnalyzer::new(config).unwrap();
    let mut stages = Vec::new();
    let analysis = analyzer
        .analyze_file(file.path(), |p| stages.push(p.stage))
        .unwrap();

    assert_eq!(analysis.faults.len(), 2);
    assert_eq!(stages.first(), Some(&ProcessingStage::Preparing));
    assert_eq!(stages.last(), Some(&ProcessingStage::Complete));
    assert!(stages.contains(&ProcessingStage::Reading));
    assert!(stages.contains(&ProcessingStage::Processing));
    assert!(stages.contains(&ProcessingStage::Classifying));
    assert!(!stages.contains(&ProcessingStage::Optimizing));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = LogAnalyzer::default()
        .analyze_file(dir.path().join("gone.csv"), |_| {})
        .unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}

#[test]
fn single_overcurrent_row_yields_one_fault() {
    let content = "timestamp,errorCode,connectorId\n2024-01-01T10:00:00,OVERCURRENT,1\n";
    let mut rng = StdRng::seed_from_u64(9);
    let analysis = LogAnalyzer::default()
        .analyze_content_with(content, "one.csv", now(), &mut rng)
        .unwrap();
    assert_eq!(analysis.faults.len(), 1);
    let fault = &analysis.faults[0];
    assert_eq!(fault.fault_type, FaultType::Overcurrent);
    assert_eq!(fault.downtime, 4.0);
    assert_eq!(fault.connector_id, "1");
    assert_eq!(analysis.cost.revenue_today, 0.0);
}
