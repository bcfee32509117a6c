use crate::classifier::{severity_counts, FaultAnalysis};
use crate::cost::{calculate_revenue_loss, format_currency, CostAnalysis, CostParameters};
use std::fmt::Write;

pub const CSV_HEADERS: [&str; 15] = [
    "Fault ID",
    "Fault Type",
    "Timestamp",
    "Connector ID",
    "Severity",
    "Description",
    "Root Cause",
    "Impact",
    "Resolution",
    "Downtime (hours)",
    "Revenue Loss (INR)",
    "Error Code",
    "Temperature",
    "Voltage",
    "Current",
];

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fault_row(fault: &FaultAnalysis, params: &CostParameters) -> String {
    let entry = &fault.log_entry;
    let cells = [
        fault.id.clone(),
        fault.fault_type.to_string(),
        fault.timestamp.clone(),
        fault.connector_id.clone(),
        fault.severity.to_string(),
        fault.description.clone(),
        fault.root_cause.clone(),
        fault.impact.clone(),
        fault.resolution.clone(),
        fault.downtime.to_string(),
        format!("{:.2}", calculate_revenue_loss(fault.downtime, params)),
        entry.error_code.clone().unwrap_or_default(),
        optional(entry.temperature),
        optional(entry.voltage),
        optional(entry.current),
    ];
    cells.iter().map(|c| quote(c)).collect::<Vec<_>>().join(",")
}

/// Header row, then one row per fault with every cell quoted.
pub fn faults_to_csv(faults: &[FaultAnalysis], params: &CostParameters) -> String {
    std::iter::once(CSV_HEADERS.join(","))
        .chain(faults.iter().map(|f| fault_row(f, params)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain-text diagnosis report for terminals and e-mail bodies.
pub fn report_summary(faults: &[FaultAnalysis], cost: &CostAnalysis, params: &CostParameters) -> String {
    let counts = severity_counts(faults);
    let mut out = String::new();

    let _ = writeln!(out, "Fault Diagnosis Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "Total Faults Detected: {}", counts.total);
    let _ = writeln!(out, "High Severity: {}", counts.high);
    let _ = writeln!(out, "Medium Severity: {}", counts.medium);
    let _ = writeln!(out, "Low Severity: {}", counts.low);
    let _ = writeln!(out);
    let _ = writeln!(out, "Revenue Impact");
    let _ = writeln!(out, "Revenue Lost Today: {}", format_currency(cost.revenue_today));
    let _ = writeln!(out, "Revenue Lost This Month: {}", format_currency(cost.revenue_this_month));
    let _ = writeln!(out, "Avg Session Value: {}", format_currency(params.avg_session_value));
    let _ = writeln!(out, "Avg Sessions/Day: {}", params.avg_sessions_per_day);

    if !cost.top_costliest_faults.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Top {} Costliest Faults", cost.top_costliest_faults.len());
        for (i, f) in cost.top_costliest_faults.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} - {} occurrence(s), {}",
                i + 1,
                f.fault_type,
                f.occurrences,
                format_currency(f.total_cost)
            );
        }
    }
    out
}
