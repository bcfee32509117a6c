use crate::analytics::{ChargerMetrics, Performance, SiteMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    IncreaseTariff,
    RelocateCharger,
    AddCharger,
    CheckGrid,
    MaintenanceNeeded,
    OptimizePricing,
}

/// Declared high to low so the derived order sorts urgent items first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub severity: Priority,
    pub site_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charger_id: Option<String>,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub action: String,
}

/// Rounds to whole rupees and groups digits the Indian way: 12,34,567.
pub fn format_inr(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let sign = if rounded < 0 { "-" } else { "" };
    if digits.len() <= 3 {
        return format!("{sign}{digits}");
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{sign}{},{tail}", groups.join(","))
}

struct Builder {
    next_id: usize,
    out: Vec<Recommendation>,
}

impl Builder {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        kind: RecommendationType,
        severity: Priority,
        site_id: &str,
        charger_id: Option<&str>,
        title: &str,
        description: String,
        impact: String,
        action: String,
    ) {
        self.out.push(Recommendation {
            id: format!("rec-{}", self.next_id),
            kind,
            severity,
            site_id: site_id.to_string(),
            charger_id: charger_id.map(str::to_string),
            title: title.to_string(),
            description,
            impact,
            action,
        });
        self.next_id += 1;
    }
}

fn site_rules(b: &mut Builder, site: &SiteMetrics) {
    let id = site.site_id.as_str();

    if site.utilization_percent > 80.0 {
        b.push(
            RecommendationType::AddCharger,
            Priority::High,
            id,
            None,
            "High Demand - Add More Chargers",
            format!(
                "Site {id} has {:.1}% utilization, indicating high demand.",
                site.utilization_percent
            ),
            format!(
                "Potential revenue increase of ₹{} per month",
                format_inr(site.total_revenue * 0.3)
            ),
            "Install 1-2 additional charging points to capture unmet demand and reduce wait times.".to_string(),
        );
    }

    if site.utilization_percent < 15.0 && site.sessions_per_day < 3.0 {
        b.push(
            RecommendationType::RelocateCharger,
            Priority::Medium,
            id,
            None,
            "Low Footfall - Consider Relocation",
            format!(
                "Site {id} has only {:.1} sessions/day with {:.1}% utilization.",
                site.sessions_per_day, site.utilization_percent
            ),
            format!(
                "Currently losing potential revenue of ₹{} per month",
                format_inr(site.total_revenue * 2.0)
            ),
            "Evaluate site location. Consider moving chargers to higher-traffic areas or improving visibility/signage.".to_string(),
        );
    }

    if site.avg_session_revenue < 100.0 && site.utilization_percent > 40.0 {
        let increase = ((120.0 - site.avg_session_revenue) / 10.0).round() as i64 * 10;
        b.push(
            RecommendationType::IncreaseTariff,
            Priority::Medium,
            id,
            None,
            "Optimize Pricing Strategy",
            format!(
                "Site {id} has average session revenue of ₹{:.0}, below market average.",
                site.avg_session_revenue
            ),
            format!(
                "Potential additional revenue of ₹{} per month",
                format_inr((site.total_sessions as i64 * increase) as f64)
            ),
            format!(
                "Increase tariff by ₹{increase} to match local demand. Current utilization suggests customers will accept higher pricing."
            ),
        );
    }
}

fn charger_rules(b: &mut Builder, charger: &ChargerMetrics) {
    let site = charger.site_id.as_str();
    let id = charger.charger_id.as_str();

    match charger.performance {
        Performance::Dead => b.push(
            RecommendationType::MaintenanceNeeded,
            Priority::High,
            site,
            Some(id),
            "Dead Charger - Immediate Action Required",
            format!(
                "Charger {id} at {site} has only {:.1} sessions/day.",
                charger.sessions_per_day
            ),
            format!(
                "Revenue loss of ₹{} per month",
                format_inr(charger.total_revenue * 10.0)
            ),
            "Check for hardware faults, connectivity issues, or app listing problems. This charger may be offline or malfunctioning.".to_string(),
        ),
        Performance::Underutilized => b.push(
            RecommendationType::OptimizePricing,
            Priority::Medium,
            site,
            Some(id),
            "Underutilized Charger",
            format!(
                "Charger {id} has {:.1}% utilization with {:.1} sessions/day.",
                charger.utilization_percent, charger.sessions_per_day
            ),
            format!(
                "Potential revenue increase of ₹{} per month",
                format_inr(charger.total_revenue * 3.0)
            ),
            "Review pricing, improve visibility on charging apps, or consider promotional offers to increase usage.".to_string(),
        ),
        Performance::Good | Performance::Low => {}
    }

    if charger.total_sessions > 10 {
        let per_session = charger.total_energy / charger.total_sessions as f64;
        if per_session < 5.0 {
            b.push(
                RecommendationType::CheckGrid,
                Priority::High,
                site,
                Some(id),
                "Low Energy Output - Grid Issue Suspected",
                format!("Charger {id} delivers only {per_session:.1} kWh per session on average."),
                "Customer dissatisfaction and potential revenue loss from incomplete charging sessions".to_string(),
                "Check grid voltage and power supply. May indicate under-voltage issue or power module degradation.".to_string(),
            );
        }
    }
}

/// Site rules run before charger rules; the result is stably sorted high first.
pub fn generate_recommendations(sites: &[SiteMetrics], chargers: &[ChargerMetrics]) -> Vec<Recommendation> {
    let mut b = Builder {
        next_id: 1,
        out: Vec::new(),
    };
    for site in sites {
        site_rules(&mut b, site);
    }
    for charger in chargers {
        charger_rules(&mut b, charger);
    }

    let mut recs = b.out;
    recs.sort_by_key(|r| r.severity);
    tracing::debug!(count = recs.len(), "generated recommendations");
    recs
}
