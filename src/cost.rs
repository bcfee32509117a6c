use crate::classifier::{FaultAnalysis, FaultType};
use crate::timestamp::parse_timestamp;
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SESSION_VALUE: f64 = 120.0;
pub const DEFAULT_SESSIONS_PER_DAY: f64 = 14.0;
const TOP_FAULTS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CostError {
    #[error("{field} must be a finite number greater than zero (got {value})")]
    NonPositive { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostParameters {
    pub avg_session_value: f64,
    pub avg_sessions_per_day: f64,
}

impl Default for CostParameters {
    fn default() -> Self {
        CostParameters {
            avg_session_value: DEFAULT_SESSION_VALUE,
            avg_sessions_per_day: DEFAULT_SESSIONS_PER_DAY,
        }
    }
}

impl CostParameters {
    pub fn new(avg_session_value: f64, avg_sessions_per_day: f64) -> Result<Self, CostError> {
        let params = CostParameters {
            avg_session_value,
            avg_sessions_per_day,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), CostError> {
        for (field, value) in [
            ("avgSessionValue", self.avg_session_value),
            ("avgSessionsPerDay", self.avg_sessions_per_day),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CostError::NonPositive { field, value });
            }
        }
        Ok(())
    }

    pub fn daily_revenue(&self) -> f64 {
        self.avg_session_value * self.avg_sessions_per_day
    }

    pub fn hourly_revenue(&self) -> f64 {
        self.daily_revenue() / 24.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostlyFault {
    pub fault_type: FaultType,
    pub total_cost: f64,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnalysis {
    pub revenue_today: f64,
    pub revenue_this_month: f64,
    pub top_costliest_faults: Vec<CostlyFault>,
}

pub fn calculate_revenue_loss(downtime_hours: f64, params: &CostParameters) -> f64 {
    params.hourly_revenue() * downtime_hours
}

pub fn calculate_cost_analysis(faults: &[FaultAnalysis], params: &CostParameters) -> CostAnalysis {
    calculate_cost_analysis_at(faults, params, &Local::now())
}

fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>, date: Option<NaiveDate>) -> DateTime<Tz> {
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|ndt| now.timezone().from_local_datetime(&ndt).earliest())
        .unwrap_or_else(|| now.clone())
}

/// Today and this month are calendar periods in `now`'s time zone. Faults with
/// unreadable timestamps only count toward the per-type totals.
pub fn calculate_cost_analysis_at<Tz: TimeZone>(
    faults: &[FaultAnalysis],
    params: &CostParameters,
    now: &DateTime<Tz>,
) -> CostAnalysis {
    let local = now.date_naive();
    let today_start = local_midnight(now, Some(local)).with_timezone(&Utc);
    let month_start = local_midnight(now, NaiveDate::from_ymd_opt(local.year(), local.month(), 1))
        .with_timezone(&Utc);

    let mut analysis = CostAnalysis::default();
    let mut by_type: Vec<CostlyFault> = Vec::new();

    for fault in faults {
        let loss = calculate_revenue_loss(fault.downtime, params);
        if let Some(at) = parse_timestamp(&fault.timestamp) {
            if at >= today_start {
                analysis.revenue_today += loss;
            }
            if at >= month_start {
                analysis.revenue_this_month += loss;
            }
        }

        match by_type.iter_mut().find(|c| c.fault_type == fault.fault_type) {
            Some(c) => {
                c.total_cost += loss;
                c.occurrences += 1;
            }
            None => by_type.push(CostlyFault {
                fault_type: fault.fault_type,
                total_cost: loss,
                occurrences: 1,
            }),
        }
    }

    // stable: equal totals keep first-occurrence order
    by_type.sort_by(|a, b| b.total_cost.total_cmp(&a.total_cost));
    by_type.truncate(TOP_FAULTS);
    analysis.top_costliest_faults = by_type;
    analysis
}

pub fn format_currency(amount: f64) -> String {
    format!("₹{amount:.2}")
}
