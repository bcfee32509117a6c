use chargescope::optimizer::{optimize_logs_at, LogOptimizer};
use chargescope::parser::LogEntry;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
}

fn entry(ts: Option<&str>, code: Option<&str>, connector: Option<&str>, raw: &str) -> LogEntry {
    LogEntry {
        timestamp: ts.map(str::to_string),
        error_code: code.map(str::to_string),
        connector_id: connector.map(str::to_string),
        raw_data: Some(raw.to_string()),
        ..LogEntry::default()
    }
}

#[test]
fn noise_lines_are_dropped() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), None, Some("1"), "Heartbeat"),
        entry(Some("2025-01-10 08:00:01"), None, Some("1"), "BootNotification sent"),
        entry(Some("2025-01-10 08:00:02"), None, Some("1"), "# comment"),
        entry(Some("2025-01-10 08:00:03"), None, Some("1"), "   "),
        entry(Some("2025-01-10 08:00:04"), None, Some("1"), "vendor X spam"),
        entry(Some("2025-01-10 08:00:05"), None, Some("1"), "OK OK OK"),
        entry(Some("2025-01-10 08:00:06"), Some("OVERCURRENT"), Some("1"), "real fault"),
    ];
    let out = optimize_logs_at(entries, now());
    assert_eq!(out.entries.len(), 1);
    assert_eq!(out.stats.total_lines, 7);
    assert_eq!(out.stats.noise_removed, 6);
    assert_eq!(out.stats.cleaned_lines, 1);
    assert_eq!(out.stats.size_reduction_percent, 86);
}

#[test]
fn same_instant_in_different_formats_is_a_duplicate() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), Some("OVERCURRENT"), Some("1"), "first"),
        entry(Some("2025-01-10T08:00:00Z"), Some("OVERCURRENT"), Some("1"), "second"),
        entry(Some("2025-01-10T08:00:00Z"), Some("OVERCURRENT"), Some("2"), "other connector"),
    ];
    let out = optimize_logs_at(entries, now());
    assert_eq!(out.stats.duplicates_removed, 1);
    assert_eq!(out.entries.len(), 2);
    assert_eq!(out.entries[0].raw_data.as_deref(), Some("first"));
    assert_eq!(out.entries[0].timestamp.as_deref(), Some("2025-01-10T08:00:00.000Z"));
}

#[test]
fn repeated_status_per_connector_is_collapsed() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), None, Some("1"), "Connector 1 Charging"),
        entry(Some("2025-01-10 08:01:00"), None, Some("1"), "Connector 1 Charging"),
        entry(Some("2025-01-10 08:02:00"), None, Some("2"), "Connector 1 Charging"),
        entry(Some("2025-01-10 08:03:00"), None, Some("1"), "Connector 1 Available"),
        entry(Some("2025-01-10 08:04:00"), None, Some("1"), "Connector 1 Charging"),
    ];
    let out = optimize_logs_at(entries, now());
    assert_eq!(out.stats.duplicates_removed, 1);
    assert_eq!(out.entries.len(), 4);
}

#[test]
fn three_repeats_fold_into_one_cluster() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), Some("OVERCURRENT"), Some("1"), "OC #0"),
        entry(Some("2025-01-10 08:00:30"), Some("OVERVOLTAGE"), Some("1"), "OV"),
        entry(Some("2025-01-10 08:01:00"), Some("OVERCURRENT"), Some("1"), "OC #1"),
        entry(Some("2025-01-10 08:02:00"), Some("OVERCURRENT"), Some("1"), "OC #2"),
    ];
    let out = optimize_logs_at(entries, now());
    assert_eq!(out.stats.fault_clusters_detected, 1);
    assert_eq!(out.stats.cleaned_lines, 4);
    assert_eq!(out.entries.len(), 2);

    let merged = &out.entries[0];
    assert_eq!(
        merged.raw_data.as_deref(),
        Some("OC #0 [Occurred 3 times between 08:00:00 - 08:02:00]")
    );
    let cluster = merged.cluster.as_ref().expect("cluster summary");
    assert_eq!(cluster.occurrences, 3);
    assert_eq!(cluster.first_seen, "2025-01-10T08:00:00.000Z");
    assert_eq!(cluster.last_seen, "2025-01-10T08:02:00.000Z");
    assert_eq!(out.entries[1].error_code.as_deref(), Some("OVERVOLTAGE"));
}

#[test]
fn info_and_uncoded_entries_never_cluster() {
    let entries: Vec<LogEntry> = (0..4)
        .map(|i| {
            let ts = format!("2025-01-10 08:0{i}:00");
            entry(Some(ts.as_str()), Some("INFO"), Some("1"), &format!("info {i}"))
        })
        .collect();
    let out = optimize_logs_at(entries, now());
    assert_eq!(out.stats.fault_clusters_detected, 0);
    assert_eq!(out.entries.len(), 4);
}

#[test]
fn missing_connector_and_timestamp_are_filled() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), Some("A"), None, "fault on connector: 5"),
        entry(Some("2025-01-10 08:01:00"), Some("B"), None, "fault"),
        entry(None, Some("C"), Some("Unknown"), "no clock"),
    ];
    let out = optimize_logs_at(entries, now());
    let connectors: Vec<&str> = out.entries.iter().filter_map(|e| e.connector_id.as_deref()).collect();
    assert_eq!(connectors, vec!["Connector-5", "Connector-2", "Connector-3"]);
    assert_eq!(out.entries[2].timestamp.as_deref(), Some("2025-01-10T12:00:00.000Z"));
}

#[test]
fn state_carries_until_reset() {
    let batch = vec![entry(Some("2025-01-10 08:00:00"), Some("OVERCURRENT"), Some("1"), "x")];
    let mut optimizer = LogOptimizer::new();
    assert_eq!(optimizer.optimize_at(batch.clone(), now()).entries.len(), 1);
    assert_eq!(optimizer.optimize_at(batch.clone(), now()).entries.len(), 0);
    assert_eq!(optimizer.stats().duplicates_removed, 1);
    optimizer.reset();
    assert_eq!(optimizer.optimize_at(batch, now()).entries.len(), 1);
}

#[test]
fn filled_connector_takes_part_in_deduplication() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), Some("OVERCURRENT"), None, "a"),
        entry(Some("2025-01-10 08:00:00"), Some("OVERCURRENT"), Some("Connector-1"), "b"),
    ];
    let once = optimize_logs_at(entries, now());
    assert_eq!(once.stats.duplicates_removed, 1);
    assert_eq!(once.entries.len(), 1);
    assert_eq!(once.entries[0].connector_id.as_deref(), Some("Connector-1"));

    let twice = optimize_logs_at(once.entries.clone(), now());
    assert_eq!(twice.stats.duplicates_removed, 0);
    assert_eq!(twice.entries, once.entries);
}

#[test]
fn filled_connector_takes_part_in_status_history() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), None, None, "Available"),
        entry(Some("2025-01-10 08:01:00"), None, Some("2"), "Charging"),
        entry(Some("2025-01-10 08:02:00"), None, Some("3"), "Charging"),
        entry(Some("2025-01-10 08:03:00"), None, Some("2"), "Available"),
        entry(Some("2025-01-10 08:04:00"), None, None, "Available"),
    ];
    let once = optimize_logs_at(entries, now());
    assert_eq!(once.stats.duplicates_removed, 1);
    assert_eq!(once.entries.len(), 4);

    let twice = optimize_logs_at(once.entries.clone(), now());
    assert_eq!(twice.stats.duplicates_removed, 0);
    assert_eq!(twice.entries, once.entries);
}

#[test]
fn coded_faults_stay_out_of_the_status_history() {
    let entries = vec![
        entry(Some("2025-01-10 08:00:00"), Some("OVERCURRENT"), Some("1"), "OC Available"),
        entry(Some("2025-01-10 08:01:00"), None, Some("1"), "Charging"),
        entry(Some("2025-01-10 08:02:00"), Some("OVERCURRENT"), Some("1"), "OC Preparing"),
        entry(Some("2025-01-10 08:03:00"), None, Some("1"), "Charging"),
        entry(Some("2025-01-10 08:04:00"), Some("OVERCURRENT"), Some("1"), "OC Available"),
    ];
    let once = optimize_logs_at(entries, now());
    assert_eq!(once.stats.duplicates_removed, 1);
    assert_eq!(once.stats.fault_clusters_detected, 1);
    assert_eq!(once.entries.len(), 2);

    let twice = optimize_logs_at(once.entries.clone(), now());
    assert_eq!(twice.stats.duplicates_removed, 0);
    assert_eq!(twice.entries, once.entries);
}

#[test]
fn unreadable_timestamps_compare_by_text() {
    let entries = vec![
        entry(Some("garbage"), Some("OVERCURRENT"), Some("1"), "first"),
        entry(Some("yesterday"), Some("OVERCURRENT"), Some("1"), "second"),
        entry(Some("garbage"), Some("OVERCURRENT"), Some("1"), "third"),
    ];
    let out = optimize_logs_at(entries, now());
    assert_eq!(out.stats.duplicates_removed, 1);
    assert_eq!(out.entries.len(), 2);
    assert!(out
        .entries
        .iter()
        .all(|e| e.timestamp.as_deref() == Some("2025-01-10T12:00:00.000Z")));
}


#[test]
fn empty_input_is_fine() {
    let out = optimize_logs_at(Vec::new(), now());
    assert!(out.entries.is_empty());
    assert_eq!(out.stats.total_lines, 0);
    assert_eq!(out.stats.size_reduction_percent, 0);
}

// (minute, code, connector, kind, status) where kind 0 = event, 1 = status, 2 = noise
type Shape = (Option<u32>, Option<&'static str>, Option<u8>, u8, &'static str);

fn shape_strategy() -> impl Strategy<Value = Shape> {
    (
        proptest::option::of(0u32..5),
        proptest::option::of(prop::sample::select(vec!["OVERCURRENT", "OVERVOLTAGE", "INFO", ""])),
        proptest::option::of(1u8..4),
        0u8..3,
        prop::sample::select(vec!["Available", "Charging", "Preparing"]),
    )
}

fn build(shapes: &[Shape]) -> Vec<LogEntry> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, (minute, code, connector, kind, status))| {
            let raw = match kind {
                0 => format!("event #{i}"),
                1 => format!("StatusNotification {status}"),
                _ => format!("Heartbeat #{i}"),
            };
            LogEntry {
                timestamp: minute.map(|m| format!("2025-01-10 08:{m:02}:00")),
                error_code: code.map(str::to_string),
                connector_id: connector.map(|c| c.to_string()),
                raw_data: Some(raw),
                ..LogEntry::default()
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn every_input_line_is_accounted_for(shapes in prop::collection::vec(shape_strategy(), 0..40)) {
        let entries = build(&shapes);
        let total = entries.len();
        let out = optimize_logs_at(entries, now());
        let s = &out.stats;
        prop_assert_eq!(s.total_lines, total);
        prop_assert_eq!(s.cleaned_lines + s.duplicates_removed + s.noise_removed, total);
        prop_assert!(out.entries.len() <= s.cleaned_lines);
        prop_assert!(s.size_reduction_percent <= 100);
    }

    #[test]
    fn optimizing_twice_changes_nothing(shapes in prop::collection::vec(shape_strategy(), 0..40)) {
        let once = optimize_logs_at(build(&shapes), now());
        let twice = optimize_logs_at(once.entries.clone(), now());
        prop_assert_eq!(twice.stats.fault_clusters_detected, 0);
        prop_assert_eq!(twice.stats.duplicates_removed, 0);
        prop_assert_eq!(twice.stats.noise_removed, 0);
        prop_assert_eq!(twice.entries, once.entries);
    }
}
