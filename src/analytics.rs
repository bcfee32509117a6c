use crate::sessions::SessionData;
use crate::timestamp::{parse_timestamp, to_iso};
use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connector availability per month, assuming 30 days.
pub const MINUTES_IN_MONTH: f64 = 30.0 * 24.0 * 60.0;
const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMetrics {
    pub site_id: String,
    pub total_revenue: f64,
    pub total_energy: f64,
    pub avg_session_revenue: f64,
    pub avg_session_duration: f64,
    pub utilization_percent: f64,
    pub sessions_per_day: f64,
    pub peak_hour: u32,
    pub total_sessions: usize,
    pub charger_count: usize,
    pub connector_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Performance {
    Good,
    Low,
    Dead,
    Underutilized,
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Performance::Good => "good",
            Performance::Low => "low",
            Performance::Dead => "dead",
            Performance::Underutilized => "underutilized",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerMetrics {
    pub site_id: String,
    pub charger_id: String,
    pub total_revenue: f64,
    pub total_energy: f64,
    pub total_sessions: usize,
    pub avg_session_revenue: f64,
    pub avg_session_duration: f64,
    pub utilization_percent: f64,
    pub sessions_per_day: f64,
    pub performance: Performance,
    pub connector_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorMetrics {
    pub site_id: String,
    pub charger_id: String,
    pub connector_id: String,
    pub total_revenue: f64,
    pub total_energy: f64,
    pub total_sessions: usize,
    pub avg_session_revenue: f64,
    pub utilization_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_sites: usize,
    pub total_chargers: usize,
    pub total_revenue: f64,
    pub total_energy: f64,
    pub total_sessions: usize,
    pub avg_utilization: f64,
    pub dead_chargers: usize,
    pub underutilized_chargers: usize,
    pub date_range: DateRange,
}

/// Groups in first-seen order.
fn group_by<'a, K, F>(sessions: &'a [SessionData], key: F) -> Vec<(K, Vec<&'a SessionData>)>
where
    K: std::hash::Hash + Eq + Clone,
    F: Fn(&'a SessionData) -> K,
{
    let mut index: AHashMap<K, usize> = AHashMap::new();
    let mut groups: Vec<(K, Vec<&SessionData>)> = Vec::new();
    for s in sessions {
        let k = key(s);
        match index.get(&k) {
            Some(&g) => groups[g].1.push(s),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![s]));
            }
        }
    }
    groups
}

struct Totals {
    revenue: f64,
    energy: f64,
    duration: f64,
    sessions: usize,
}

impl Totals {
    fn of(sessions: &[&SessionData]) -> Self {
        Totals {
            revenue: sessions.iter().map(|s| s.revenue_inr).sum(),
            energy: sessions.iter().map(|s| s.energy_kwh).sum(),
            duration: sessions.iter().map(|s| s.session_duration_min).sum(),
            sessions: sessions.len(),
        }
    }

    fn per_session(&self, value: f64) -> f64 {
        value / self.sessions as f64
    }

    fn utilization(&self, connectors: usize) -> f64 {
        self.duration / (connectors as f64 * MINUTES_IN_MONTH) * 100.0
    }
}

/// Earliest start and latest stop. Unreadable times are ignored; with none
/// readable the range runs from `now` back to the epoch.
fn date_range<'a, I>(sessions: I, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>)
where
    I: IntoIterator<Item = &'a SessionData>,
{
    let mut start = now;
    let mut end = Utc.timestamp_opt(0, 0).single().unwrap_or(now);
    for s in sessions {
        if let Some(at) = parse_timestamp(&s.start_time) {
            start = start.min(at);
        }
        if let Some(at) = parse_timestamp(&s.stop_time) {
            end = end.max(at);
        }
    }
    (start, end)
}

fn days_in_range(sessions: &[&SessionData], now: DateTime<Utc>) -> f64 {
    let (start, end) = date_range(sessions.iter().copied(), now);
    let days = ((end - start).num_milliseconds() as f64 / MS_PER_DAY).ceil();
    days.max(1.0)
}

/// Hour of day (UTC) with the most session starts; ties go to the earlier hour.
pub fn find_peak_hour(sessions: &[&SessionData]) -> u32 {
    let mut counts = [0usize; 24];
    for s in sessions {
        if let Some(at) = parse_timestamp(&s.start_time) {
            counts[at.hour() as usize] += 1;
        }
    }
    let mut peak = 0;
    let mut max = 0;
    for (hour, &count) in counts.iter().enumerate() {
        if count > max {
            max = count;
            peak = hour as u32;
        }
    }
    peak
}

pub fn classify_charger_performance(sessions_per_day: f64, utilization_percent: f64) -> Performance {
    if sessions_per_day <= 1.0 {
        Performance::Dead
    } else if utilization_percent < 10.0 {
        Performance::Underutilized
    } else if sessions_per_day >= 5.0 && utilization_percent >= 30.0 {
        Performance::Good
    } else {
        Performance::Low
    }
}

fn sort_by_revenue<T>(metrics: &mut [T], revenue: impl Fn(&T) -> f64) {
    metrics.sort_by(|a, b| revenue(b).total_cmp(&revenue(a)));
}

pub fn calculate_site_metrics(sessions: &[SessionData]) -> Vec<SiteMetrics> {
    calculate_site_metrics_at(sessions, Utc::now())
}

pub fn calculate_site_metrics_at(sessions: &[SessionData], now: DateTime<Utc>) -> Vec<SiteMetrics> {
    let mut metrics: Vec<SiteMetrics> = group_by(sessions, |s| s.site_id.as_str())
        .into_iter()
        .map(|(site_id, group)| {
            let totals = Totals::of(&group);
            let chargers: AHashSet<&str> = group.iter().map(|s| s.charger_id.as_str()).collect();
            let connectors: AHashSet<(&str, &str)> = group
                .iter()
                .map(|s| (s.charger_id.as_str(), s.connector_id.as_str()))
                .collect();
            SiteMetrics {
                site_id: site_id.to_string(),
                total_revenue: totals.revenue,
                total_energy: totals.energy,
                avg_session_revenue: totals.per_session(totals.revenue),
                avg_session_duration: totals.per_session(totals.duration),
                utilization_percent: totals.utilization(connectors.len()).min(100.0),
                sessions_per_day: totals.sessions as f64 / days_in_range(&group, now),
                peak_hour: find_peak_hour(&group),
                total_sessions: totals.sessions,
                charger_count: chargers.len(),
                connector_count: connectors.len(),
            }
        })
        .collect();
    sort_by_revenue(&mut metrics, |m| m.total_revenue);
    metrics
}

pub fn calculate_charger_metrics(sessions: &[SessionData]) -> Vec<ChargerMetrics> {
    calculate_charger_metrics_at(sessions, Utc::now())
}

pub fn calculate_charger_metrics_at(sessions: &[SessionData], now: DateTime<Utc>) -> Vec<ChargerMetrics> {
    let mut metrics: Vec<ChargerMetrics> =
        group_by(sessions, |s| (s.site_id.as_str(), s.charger_id.as_str()))
            .into_iter()
            .map(|((site_id, charger_id), group)| {
                let totals = Totals::of(&group);
                let connectors: AHashSet<&str> =
                    group.iter().map(|s| s.connector_id.as_str()).collect();
                let utilization = totals.utilization(connectors.len());
                let sessions_per_day = totals.sessions as f64 / days_in_range(&group, now);
                ChargerMetrics {
                    site_id: site_id.to_string(),
                    charger_id: charger_id.to_string(),
                    total_revenue: totals.revenue,
                    total_energy: totals.energy,
                    total_sessions: totals.sessions,
                    avg_session_revenue: totals.per_session(totals.revenue),
                    avg_session_duration: totals.per_session(totals.duration),
                    utilization_percent: utilization.min(100.0),
                    sessions_per_day,
                    performance: classify_charger_performance(sessions_per_day, utilization),
                    connector_count: connectors.len(),
                }
            })
            .collect();
    sort_by_revenue(&mut metrics, |m| m.total_revenue);
    metrics
}

/// Each connector is measured against a single connector-month.
pub fn calculate_connector_metrics(sessions: &[SessionData]) -> Vec<ConnectorMetrics> {
    group_by(sessions, |s| {
        (
            s.site_id.as_str(),
            s.charger_id.as_str(),
            s.connector_id.as_str(),
        )
    })
    .into_iter()
    .map(|((site_id, charger_id, connector_id), group)| {
        let totals = Totals::of(&group);
        ConnectorMetrics {
            site_id: site_id.to_string(),
            charger_id: charger_id.to_string(),
            connector_id: connector_id.to_string(),
            total_revenue: totals.revenue,
            total_energy: totals.energy,
            total_sessions: totals.sessions,
            avg_session_revenue: totals.per_session(totals.revenue),
            utilization_percent: totals.utilization(1).min(100.0),
        }
    })
    .collect()
}

pub fn calculate_analytics_summary(
    sessions: &[SessionData],
    sites: &[SiteMetrics],
    chargers: &[ChargerMetrics],
) -> AnalyticsSummary {
    calculate_analytics_summary_at(sessions, sites, chargers, Utc::now())
}

pub fn calculate_analytics_summary_at(
    sessions: &[SessionData],
    sites: &[SiteMetrics],
    chargers: &[ChargerMetrics],
    now: DateTime<Utc>,
) -> AnalyticsSummary {
    let avg_utilization = if chargers.is_empty() {
        0.0
    } else {
        chargers.iter().map(|c| c.utilization_percent).sum::<f64>() / chargers.len() as f64
    };
    let count = |p: Performance| chargers.iter().filter(|c| c.performance == p).count();
    let (start, end) = date_range(sessions, now);

    AnalyticsSummary {
        total_sites: sites.len(),
        total_chargers: chargers.len(),
        total_revenue: sessions.iter().map(|s| s.revenue_inr).sum(),
        total_energy: sessions.iter().map(|s| s.energy_kwh).sum(),
        total_sessions: sessions.len(),
        avg_utilization,
        dead_chargers: count(Performance::Dead),
        underutilized_chargers: count(Performance::Underutilized),
        date_range: DateRange {
            start: to_iso(&start),
            end: to_iso(&end),
        },
    }
}
