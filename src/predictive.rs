use crate::classifier::{FaultAnalysis, FaultType};
use crate::cost::CostParameters;
use crate::timestamp::{parse_timestamp, to_iso};
use ahash::AHashMap;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Overheating,
    #[serde(rename = "OCPP Disconnect")]
    OcppDisconnect,
    #[serde(rename = "Voltage Fluctuation")]
    VoltageFluctuation,
    #[serde(rename = "Repeated Restarts")]
    RepeatedRestarts,
    #[serde(rename = "Vehicle Aborts")]
    VehicleAborts,
    #[serde(rename = "Power Module Issues")]
    PowerModuleIssues,
}

impl PatternKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::Overheating => "Overheating",
            PatternKind::OcppDisconnect => "OCPP Disconnect",
            PatternKind::VoltageFluctuation => "Voltage Fluctuation",
            PatternKind::RepeatedRestarts => "Repeated Restarts",
            PatternKind::VehicleAborts => "Vehicle Aborts",
            PatternKind::PowerModuleIssues => "Power Module Issues",
        }
    }

    pub fn rule(self) -> &'static PatternRule {
        let idx = match self {
            PatternKind::Overheating => 0,
            PatternKind::OcppDisconnect => 1,
            PatternKind::VoltageFluctuation => 2,
            PatternKind::RepeatedRestarts => 3,
            PatternKind::VehicleAborts => 4,
            PatternKind::PowerModuleIssues => 5,
        };
        &PATTERN_RULES[idx]
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    AtLeast,
    MoreThan,
}

/// A trailing-window counter over one charger's faults.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    pub kind: PatternKind,
    pub fault_types: &'static [FaultType],
    /// Lowercase substrings of the source error code that also count.
    pub code_keywords: &'static [&'static str],
    pub window_hours: i64,
    pub window_label: &'static str,
    pub threshold: usize,
    pub breach: Breach,
    pub critical_at: Option<usize>,
    pub high_at: Option<usize>,
    pub weight: f64,
    pub cap: f64,
}

pub static PATTERN_RULES: [PatternRule; 6] = [
    PatternRule {
        kind: PatternKind::Overheating,
        fault_types: &[FaultType::Overheating],
        code_keywords: &["temp", "overheat"],
        window_hours: 7 * 24,
        window_label: "7 days",
        threshold: 3,
        breach: Breach::AtLeast,
        critical_at: Some(8),
        high_at: Some(5),
        weight: 10.0,
        cap: 30.0,
    },
    PatternRule {
        kind: PatternKind::OcppDisconnect,
        fault_types: &[FaultType::OcppDisconnect],
        code_keywords: &["ocpp", "network"],
        window_hours: 24,
        window_label: "24 hours",
        threshold: 6,
        breach: Breach::MoreThan,
        critical_at: Some(16),
        high_at: Some(11),
        weight: 8.0,
        cap: 25.0,
    },
    PatternRule {
        kind: PatternKind::VoltageFluctuation,
        fault_types: &[FaultType::Overvoltage, FaultType::LowGridVoltage],
        code_keywords: &["voltage", "volt"],
        window_hours: 7 * 24,
        window_label: "7 days",
        threshold: 5,
        breach: Breach::AtLeast,
        critical_at: None,
        high_at: Some(7),
        weight: 6.0,
        cap: 20.0,
    },
    PatternRule {
        kind: PatternKind::RepeatedRestarts,
        fault_types: &[FaultType::RepeatedRestarts],
        code_keywords: &["restart", "reboot"],
        window_hours: 24,
        window_label: "24 hours",
        threshold: 4,
        breach: Breach::MoreThan,
        critical_at: Some(11),
        high_at: Some(7),
        weight: 7.0,
        cap: 20.0,
    },
    PatternRule {
        kind: PatternKind::VehicleAborts,
        fault_types: &[FaultType::VehicleAbort],
        code_keywords: &["abort", "evdisconnect"],
        window_hours: 7 * 24,
        window_label: "7 days",
        threshold: 5,
        breach: Breach::AtLeast,
        critical_at: Some(8),
        high_at: Some(5),
        weight: 5.0,
        cap: 15.0,
    },
    PatternRule {
        kind: PatternKind::PowerModuleIssues,
        fault_types: &[FaultType::PowerModuleFailure, FaultType::Overcurrent],
        code_keywords: &["power", "current"],
        window_hours: 7 * 24,
        window_label: "7 days",
        threshold: 3,
        breach: Breach::AtLeast,
        critical_at: Some(5),
        high_at: None,
        weight: 12.0,
        cap: 35.0,
    },
];

impl PatternRule {
    fn counts(&self, fault: &FaultAnalysis) -> bool {
        if self.fault_types.contains(&fault.fault_type) {
            return true;
        }
        fault.log_entry.error_code.as_deref().is_some_and(|code| {
            let code = code.to_lowercase();
            self.code_keywords.iter().any(|k| code.contains(k))
        })
    }

    fn breached(&self, count: usize) -> bool {
        match self.breach {
            Breach::AtLeast => count >= self.threshold,
            Breach::MoreThan => count > self.threshold,
        }
    }

    /// Faults with unreadable timestamps fall outside every window.
    pub fn evaluate(&self, faults: &[&FaultAnalysis], now: DateTime<Utc>) -> PatternDetection {
        let cutoff = now - Duration::hours(self.window_hours);
        let count = faults
            .iter()
            .filter(|f| parse_timestamp(&f.timestamp).is_some_and(|at| at >= cutoff))
            .filter(|f| self.counts(f))
            .count();
        PatternDetection {
            pattern_type: self.kind,
            count,
            threshold: self.threshold,
            time_window: self.window_label.to_string(),
            detected: self.breached(count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDetection {
    pub pattern_type: PatternKind,
    pub count: usize,
    pub threshold: usize,
    pub time_window: String,
    pub detected: bool,
}

/// Ordered by urgency. Alerts are never `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictiveAlert {
    pub charger_id: String,
    pub connector_id: Option<String>,
    pub risk_level: RiskLevel,
    pub health_score: u32,
    pub patterns: Vec<PatternDetection>,
    pub explanation: String,
    pub recommended_action: String,
    pub estimated_revenue_loss: f64,
    pub days_until_failure: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerHealth {
    pub charger_id: String,
    pub connector_id: Option<String>,
    pub health_score: u32,
    pub risk_level: RiskLevel,
    pub total_faults: usize,
    pub critical_patterns: usize,
    pub last_fault_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictiveSummary {
    pub total_chargers: usize,
    pub at_risk_chargers: usize,
    pub critical_alerts: usize,
    pub high_risk_alerts: usize,
    pub medium_risk_alerts: usize,
    pub healthy_chargers: usize,
    pub total_estimated_loss: f64,
    pub average_health_score: u32,
    /// Alerts expected to fail within a week.
    pub due_within_week: usize,
}

#[derive(Debug, Clone)]
pub struct ChargerFaults<'a> {
    pub charger_id: String,
    pub connector_id: Option<String>,
    pub faults: Vec<&'a FaultAnalysis>,
}

fn charger_key(fault: &FaultAnalysis) -> (String, Option<String>) {
    let connector = Some(fault.connector_id.clone()).filter(|c| !c.is_empty());
    let charger = fault
        .log_entry
        .charger_id
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| connector.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    (charger, connector)
}

/// Groups by (charger, connector) in first-seen order. Without a charger id
/// the connector id stands in for it.
pub fn group_faults_by_charger(faults: &[FaultAnalysis]) -> Vec<ChargerFaults<'_>> {
    let mut index: AHashMap<(String, Option<String>), usize> = AHashMap::new();
    let mut groups: Vec<ChargerFaults<'_>> = Vec::new();
    for fault in faults {
        let key = charger_key(fault);
        match index.get(&key) {
            Some(&g) => groups[g].faults.push(fault),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(ChargerFaults {
                    charger_id: key.0,
                    connector_id: key.1,
                    faults: vec![fault],
                });
            }
        }
    }
    groups
}

pub fn detect_patterns_at(faults: &[&FaultAnalysis], now: DateTime<Utc>) -> Vec<PatternDetection> {
    PATTERN_RULES.iter().map(|r| r.evaluate(faults, now)).collect()
}

fn detected(patterns: &[PatternDetection]) -> impl Iterator<Item = &PatternDetection> {
    patterns.iter().filter(|p| p.detected)
}

/// Critical beats high beats medium. With nothing detected this is `Medium`;
/// callers that need a healthy answer check detection first.
pub fn calculate_risk_level(patterns: &[PatternDetection]) -> RiskLevel {
    let hits: Vec<&PatternDetection> = detected(patterns).collect();
    if hits.is_empty() {
        return RiskLevel::Medium;
    }
    let reaches = |cutoff: fn(&PatternRule) -> Option<usize>| {
        hits.iter()
            .any(|p| cutoff(p.pattern_type.rule()).is_some_and(|c| p.count >= c))
    };
    if reaches(|r| r.critical_at) || hits.len() >= 3 {
        RiskLevel::Critical
    } else if reaches(|r| r.high_at) || hits.len() >= 2 {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

pub fn calculate_health_score(patterns: &[PatternDetection], total_faults: usize) -> u32 {
    let mut score = 100.0;
    for p in detected(patterns) {
        let rule = p.pattern_type.rule();
        let severity = p.count as f64 / p.threshold as f64;
        score -= (severity * rule.weight).min(rule.cap);
    }
    score -= (total_faults as f64 * 0.5).min(20.0);
    score.round().max(0.0) as u32
}

/// Worded after the first detected pattern in detector order.
pub fn generate_explanation(patterns: &[PatternDetection], charger_id: &str, connector_id: Option<&str>) -> String {
    let hits: Vec<&PatternDetection> = detected(patterns).collect();
    let Some(primary) = hits.first() else {
        return format!("Charger {charger_id} is operating normally.");
    };

    let location = match connector_id {
        Some(c) => format!("Connector {c}"),
        None => format!("Charger {charger_id}"),
    };
    let (count, window) = (primary.count, &primary.time_window);
    let mut text = match primary.pattern_type {
        PatternKind::Overheating => format!(
            "{location} has {count} overheating events in the past {window}. This indicates a likely cooling fan failure or blocked ventilation. The charger may shut down to prevent damage."
        ),
        PatternKind::OcppDisconnect => format!(
            "{location} has {count} OCPP network disconnections in the past {window}. This suggests unstable network connectivity or backend server issues. Sessions may fail to start or complete."
        ),
        PatternKind::VoltageFluctuation => format!(
            "{location} has {count} voltage-related faults in the past {window}. This indicates grid instability or faulty voltage regulation. May cause charging interruptions."
        ),
        PatternKind::RepeatedRestarts => format!(
            "{location} has {count} restart events in the past {window}. This suggests firmware issues or hardware instability. Charger reliability is compromised."
        ),
        PatternKind::VehicleAborts => format!(
            "{location} has {count} vehicle-aborted sessions in the past {window}. This may indicate BMS communication issues or incompatibility with certain vehicle models."
        ),
        PatternKind::PowerModuleIssues => format!(
            "{location} has {count} power module faults in the past {window}. This indicates potential hardware failure in the power delivery system. Immediate inspection required."
        ),
    };
    if hits.len() > 1 {
        text.push_str(&format!(
            " Additionally, {} other fault pattern(s) detected, indicating multiple system issues.",
            hits.len() - 1
        ));
    }
    text
}

pub fn generate_recommended_action(patterns: &[PatternDetection], risk: RiskLevel) -> String {
    let hits: Vec<&PatternDetection> = detected(patterns).collect();
    let Some(primary) = hits.first() else {
        return "Continue regular monitoring.".to_string();
    };
    if hits.len() >= 3 {
        return "URGENT: Multiple critical issues detected. Comprehensive system inspection required immediately. Consider taking charger offline until serviced.".to_string();
    }

    use PatternKind::*;
    use RiskLevel::{Critical, High, Low, Medium};
    let action = match (primary.pattern_type, risk) {
        (_, Low) => "Continue regular monitoring.",
        (Overheating, Medium) => "Schedule maintenance within 7 days. Check cooling fans and clean air vents.",
        (Overheating, High) => "Schedule maintenance within 3 days. Inspect cooling system and thermal sensors.",
        (Overheating, Critical) => "URGENT: Service within 24 hours. Cooling system failure imminent. Consider taking charger offline.",
        (OcppDisconnect, Medium) => "Check network connectivity and OCPP backend status within 5 days.",
        (OcppDisconnect, High) => "Inspect network equipment and backend configuration within 2 days.",
        (OcppDisconnect, Critical) => "URGENT: Network infrastructure failing. Check immediately to prevent revenue loss.",
        (VoltageFluctuation, Medium) => "Monitor grid voltage. Contact utility provider if issues persist.",
        (VoltageFluctuation, High) => "Inspect voltage regulation equipment within 3 days. May need grid upgrade.",
        (VoltageFluctuation, Critical) => "URGENT: Severe grid instability. Contact electrician and utility provider immediately.",
        (RepeatedRestarts, Medium) => "Check firmware version and update if available. Monitor for 3 days.",
        (RepeatedRestarts, High) => "Inspect hardware components and update firmware within 2 days.",
        (RepeatedRestarts, Critical) => "URGENT: Hardware failure likely. Contact vendor for immediate support.",
        (VehicleAborts, Medium) => "Monitor vehicle compatibility. Update firmware if available.",
        (VehicleAborts, High) => "Check BMS communication settings. May need protocol updates.",
        (VehicleAborts, Critical) => "URGENT: Major compatibility issues. Contact vendor for protocol fix.",
        (PowerModuleIssues, Medium) => "Schedule power module inspection within 5 days.",
        (PowerModuleIssues, High) => "Inspect power delivery system within 2 days. Check for loose connections.",
        (PowerModuleIssues, Critical) => "URGENT: Power module failure imminent. Take charger offline and service immediately.",
    };
    action.to_string()
}

/// Days until expected failure, drawn from a band that narrows with risk.
pub fn estimate_days_until_failure<R: Rng + ?Sized>(
    patterns: &[PatternDetection],
    risk: RiskLevel,
    rng: &mut R,
) -> u32 {
    if detected(patterns).next().is_none() {
        return 90;
    }
    match risk {
        RiskLevel::Critical => rng.gen_range(1..=3),
        RiskLevel::High => rng.gen_range(3..=9),
        RiskLevel::Medium | RiskLevel::Low => rng.gen_range(7..=20),
    }
}

/// Three to seven days of lost sessions after failure, plus 30% of the
/// sessions degraded before it.
pub fn estimate_revenue_loss<R: Rng + ?Sized>(
    days_until_failure: u32,
    params: &CostParameters,
    rng: &mut R,
) -> f64 {
    let downtime_days: u32 = rng.gen_range(3..=7);
    let outage = downtime_days as f64 * params.daily_revenue();
    let degradation = days_until_failure as f64 * params.daily_revenue() * 0.3;
    (outage + degradation).round()
}

pub fn detect_predictive_alerts(faults: &[FaultAnalysis], params: &CostParameters) -> Vec<PredictiveAlert> {
    detect_predictive_alerts_with(faults, params, Utc::now(), &mut rand::thread_rng())
}

/// One alert per charger group with at least one detected pattern, most urgent first.
pub fn detect_predictive_alerts_with<R: Rng + ?Sized>(
    faults: &[FaultAnalysis],
    params: &CostParameters,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<PredictiveAlert> {
    let mut alerts: Vec<PredictiveAlert> = group_faults_by_charger(faults)
        .into_iter()
        .filter_map(|group| {
            let patterns = detect_patterns_at(&group.faults, now);
            detected(&patterns).next()?;

            let risk_level = calculate_risk_level(&patterns);
            let health_score = calculate_health_score(&patterns, group.faults.len());
            let days_until_failure = estimate_days_until_failure(&patterns, risk_level, rng);
            let estimated_revenue_loss = estimate_revenue_loss(days_until_failure, params, rng);
            Some(PredictiveAlert {
                explanation: generate_explanation(
                    &patterns,
                    &group.charger_id,
                    group.connector_id.as_deref(),
                ),
                recommended_action: generate_recommended_action(&patterns, risk_level),
                charger_id: group.charger_id,
                connector_id: group.connector_id,
                risk_level,
                health_score,
                patterns,
                estimated_revenue_loss,
                days_until_failure,
            })
        })
        .collect();

    alerts.sort_by_key(|a| (Reverse(a.risk_level), a.health_score));
    tracing::info!(alerts = alerts.len(), "predictive alerts computed");
    alerts
}

pub fn calculate_charger_health(faults: &[FaultAnalysis]) -> Vec<ChargerHealth> {
    calculate_charger_health_at(faults, Utc::now())
}

/// One record per charger group, including groups with nothing detected.
pub fn calculate_charger_health_at(faults: &[FaultAnalysis], now: DateTime<Utc>) -> Vec<ChargerHealth> {
    group_faults_by_charger(faults)
        .into_iter()
        .map(|group| {
            let patterns = detect_patterns_at(&group.faults, now);
            let critical_patterns = detected(&patterns).count();
            let risk_level = if critical_patterns == 0 {
                RiskLevel::Low
            } else {
                calculate_risk_level(&patterns)
            };
            let last_fault_date = group
                .faults
                .iter()
                .filter_map(|f| parse_timestamp(&f.timestamp).map(|at| (at, &f.timestamp)))
                .max_by_key(|(at, _)| *at)
                .map(|(_, ts)| ts.clone())
                .unwrap_or_else(|| to_iso(&now));
            ChargerHealth {
                health_score: calculate_health_score(&patterns, group.faults.len()),
                total_faults: group.faults.len(),
                charger_id: group.charger_id,
                connector_id: group.connector_id,
                risk_level,
                critical_patterns,
                last_fault_date,
            }
        })
        .collect()
}

pub fn calculate_predictive_summary(alerts: &[PredictiveAlert], health: &[ChargerHealth]) -> PredictiveSummary {
    let count = |level: RiskLevel| alerts.iter().filter(|a| a.risk_level == level).count();
    let average_health_score = if health.is_empty() {
        100
    } else {
        let sum: u32 = health.iter().map(|h| h.health_score).sum();
        (sum as f64 / health.len() as f64).round() as u32
    };
    PredictiveSummary {
        total_chargers: health.len(),
        at_risk_chargers: alerts.len(),
        critical_alerts: count(RiskLevel::Critical),
        high_risk_alerts: count(RiskLevel::High),
        medium_risk_alerts: count(RiskLevel::Medium),
        healthy_chargers: health.iter().filter(|h| h.risk_level == RiskLevel::Low).count(),
        total_estimated_loss: alerts.iter().map(|a| a.estimated_revenue_loss).sum(),
        average_health_score,
        due_within_week: alerts.iter().filter(|a| a.days_until_failure <= 7).count(),
    }
}
