use crate::classifier::{FaultAnalysis, FaultType, Severity};
use crate::cost::{calculate_revenue_loss, CostParameters};
use crate::predictive::RiskLevel;
use crate::timestamp::{parse_timestamp, to_iso};
use ahash::AHashMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};

const HIGH_PENALTY: i64 = 15;
const MEDIUM_PENALTY: i64 = 8;
const LOW_PENALTY: i64 = 3;
const RECURRING_MIN: usize = 3;

/// Severity-weighted health for one connector, independent of the windowed detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub charger_id: String,
    pub health_score: u32,
    pub risk_level: RiskLevel,
    pub patterns: Vec<String>,
    pub fault_count: usize,
    pub last_fault_date: String,
    pub estimated_loss: f64,
}

pub fn calculate_health_data(faults: &[FaultAnalysis]) -> Vec<HealthData> {
    calculate_health_data_with(faults, &CostParameters::default())
}

/// Groups by connector id and scores each group; worst score first.
pub fn calculate_health_data_with(faults: &[FaultAnalysis], params: &CostParameters) -> Vec<HealthData> {
    let mut index: AHashMap<&str, usize> = AHashMap::new();
    let mut groups: Vec<(&str, Vec<&FaultAnalysis>)> = Vec::new();
    for fault in faults {
        let key = if fault.connector_id.is_empty() {
            "Unknown"
        } else {
            fault.connector_id.as_str()
        };
        match index.get(key) {
            Some(&g) => groups[g].1.push(fault),
            None => {
                index.insert(key, groups.len());
                groups.push((key, vec![fault]));
            }
        }
    }

    let mut out: Vec<HealthData> = groups
        .into_iter()
        .map(|(charger_id, list)| score_group(charger_id, &list, params))
        .collect();
    out.sort_by_key(|h| h.health_score);
    out
}

fn any_of(faults: &[&FaultAnalysis], types: &[FaultType]) -> bool {
    faults.iter().any(|f| types.contains(&f.fault_type))
}

fn score_group(charger_id: &str, faults: &[&FaultAnalysis], params: &CostParameters) -> HealthData {
    let count_of = |s: Severity| faults.iter().filter(|f| f.severity == s).count();
    let (high, medium, low) = (count_of(Severity::High), count_of(Severity::Medium), count_of(Severity::Low));

    let score = (100
        - HIGH_PENALTY * high as i64
        - MEDIUM_PENALTY * medium as i64
        - LOW_PENALTY * low as i64)
        .clamp(0, 100) as u32;

    let risk_level = if score < 30 || high >= 3 {
        RiskLevel::Critical
    } else if score < 50 || high >= 2 {
        RiskLevel::High
    } else if score < 70 || medium >= 3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut type_counts: Vec<(FaultType, usize)> = Vec::new();
    for f in faults {
        match type_counts.iter_mut().find(|(t, _)| *t == f.fault_type) {
            Some((_, n)) => *n += 1,
            None => type_counts.push((f.fault_type, 1)),
        }
    }
    let mut patterns: Vec<String> = type_counts
        .iter()
        .filter(|(_, n)| *n >= RECURRING_MIN)
        .map(|(t, n)| format!("Recurring {t} ({n}x)"))
        .collect();

    if any_of(faults, &[FaultType::Overheating]) {
        patterns.push("Temperature issues detected".to_string());
    }
    if any_of(faults, &[FaultType::OcppDisconnect]) {
        patterns.push("Network connectivity problems".to_string());
    }
    if any_of(
        faults,
        &[
            FaultType::Overvoltage,
            FaultType::LowGridVoltage,
            FaultType::PowerModuleFailure,
        ],
    ) {
        patterns.push("Power supply instability".to_string());
    }
    if patterns.is_empty() {
        patterns.push("No significant patterns detected".to_string());
    }

    let last_fault_date = faults
        .iter()
        .filter_map(|f| parse_timestamp(&f.timestamp).map(|at| (at, &f.timestamp)))
        .max_by_key(|(at, _)| *at)
        .map(|(_, ts)| ts.clone())
        .unwrap_or_else(|| to_iso(&Utc::now()));

    let downtime: f64 = faults.iter().map(|f| f.downtime).sum();

    HealthData {
        charger_id: charger_id.to_string(),
        health_score: score,
        risk_level,
        patterns,
        fault_count: faults.len(),
        last_fault_date,
        estimated_loss: calculate_revenue_loss(downtime, params).round(),
    }
}
