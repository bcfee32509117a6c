use crate::parser::LogEntry;
use crate::timestamp::{parse_timestamp, to_iso};
use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Instant;

static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)heartbeat",
        r"(?i)bootnotification",
        r"(?i)ok\s+ok\s+ok",
        r"(?i)vendor.*spam",
        r"^[\s\t]*$",
        r"^#",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RE_CONNECTOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)connector[:\s]+(\d+)").unwrap());

const STATUS_KEYWORDS: [&str; 6] = [
    "Available",
    "Preparing",
    "Charging",
    "SuspendedEV",
    "SuspendedEVSE",
    "Finishing",
];

/// Minimum group size that gets folded into a single entry.
pub const CLUSTER_MIN_SIZE: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationStats {
    pub total_lines: usize,
    pub cleaned_lines: usize,
    pub duplicates_removed: usize,
    pub noise_removed: usize,
    pub fault_clusters_detected: usize,
    pub size_reduction_percent: u32,
    pub processing_time_ms: u64,
}

/// Summary of the events folded into one entry. Only the span survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultCluster {
    pub occurrences: usize,
    pub first_seen: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedLogResult {
    pub entries: Vec<LogEntry>,
    pub stats: OptimizationStats,
}

/// Readable timestamps compare by instant; unreadable ones by their text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Stamp {
    Parsed(String),
    Unreadable(Option<String>),
}

type DedupKey = (Stamp, Option<String>, String);

/// Dedup and status state accumulate across `optimize` calls until `reset`.
/// Use one optimizer per file.
#[derive(Debug, Default)]
pub struct LogOptimizer {
    seen: AHashSet<DedupKey>,
    last_status_by_connector: AHashMap<String, String>,
    stats: OptimizationStats,
}

impl LogOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
        self.last_status_by_connector.clear();
    }

    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }

    pub fn optimize(&mut self, entries: Vec<LogEntry>) -> OptimizedLogResult {
        self.optimize_at(entries, Utc::now())
    }

    /// Entries with unparseable timestamps are stamped with `now`.
    pub fn optimize_at(&mut self, entries: Vec<LogEntry>, now: DateTime<Utc>) -> OptimizedLogResult {
        let started = Instant::now();
        self.stats = OptimizationStats::default();

        let survivors: Vec<LogEntry> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(idx, entry)| self.process_entry(entry, idx, now))
            .collect();
        let entries = self.cluster(survivors);

        self.stats.processing_time_ms = started.elapsed().as_millis() as u64;
        if self.stats.total_lines > 0 {
            let removed = (self.stats.total_lines - self.stats.cleaned_lines) as f64;
            self.stats.size_reduction_percent =
                (removed / self.stats.total_lines as f64 * 100.0).round() as u32;
        }

        tracing::info!(
            total = self.stats.total_lines,
            cleaned = self.stats.cleaned_lines,
            duplicates = self.stats.duplicates_removed,
            noise = self.stats.noise_removed,
            clusters = self.stats.fault_clusters_detected,
            "optimized log entries"
        );

        OptimizedLogResult {
            entries,
            stats: self.stats.clone(),
        }
    }

    fn process_entry(&mut self, mut entry: LogEntry, idx: usize, now: DateTime<Utc>) -> Option<LogEntry> {
        self.stats.total_lines += 1;

        if entry.raw_data.as_deref().is_some_and(is_noise) {
            self.stats.noise_removed += 1;
            return None;
        }

        let parsed = entry
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .map(|dt| to_iso(&dt));
        let connector = autofill_connector_id(&entry, idx);

        let stamp = match &parsed {
            Some(iso) => Stamp::Parsed(iso.clone()),
            None => Stamp::Unreadable(entry.timestamp.clone()),
        };
        let key = (stamp, entry.error_code.clone(), connector.clone());
        if !self.seen.insert(key) {
            self.stats.duplicates_removed += 1;
            return None;
        }

        if self.is_duplicate_status(&entry, &connector) {
            self.stats.duplicates_removed += 1;
            return None;
        }

        entry.connector_id = Some(connector);
        entry.timestamp = Some(parsed.unwrap_or_else(|| to_iso(&now)));
        self.stats.cleaned_lines += 1;
        Some(entry)
    }

    /// Coded entries are left to clustering and never enter the status history.
    fn is_duplicate_status(&mut self, entry: &LogEntry, connector: &str) -> bool {
        if carries_fault_code(entry) {
            return false;
        }
        let Some(raw) = entry.raw_data.as_deref() else {
            return false;
        };
        if !STATUS_KEYWORDS.iter().any(|s| raw.contains(s)) {
            return false;
        }
        if self.last_status_by_connector.get(connector).map(String::as_str) == Some(raw) {
            return true;
        }
        self.last_status_by_connector
            .insert(connector.to_string(), raw.to_string());
        false
    }

    /// Folds groups of `CLUSTER_MIN_SIZE` or more entries sharing (error code, connector)
    /// into their first member. Output keeps first-occurrence order.
    fn cluster(&mut self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        enum Slot {
            Single(LogEntry),
            Group(usize),
        }

        let mut slots = Vec::new();
        let mut groups: Vec<Vec<LogEntry>> = Vec::new();
        let mut index: AHashMap<(String, Option<String>), usize> = AHashMap::new();

        for entry in entries {
            if !carries_fault_code(&entry) {
                slots.push(Slot::Single(entry));
                continue;
            }
            let key = (entry.error_code.clone().unwrap_or_default(), entry.connector_id.clone());
            match index.get(&key) {
                Some(&g) => groups[g].push(entry),
                None => {
                    index.insert(key, groups.len());
                    slots.push(Slot::Group(groups.len()));
                    groups.push(vec![entry]);
                }
            }
        }

        let mut groups: Vec<Option<Vec<LogEntry>>> = groups.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Slot::Single(entry) => out.push(entry),
                Slot::Group(g) => {
                    let Some(members) = groups[g].take() else {
                        continue;
                    };
                    if members.len() < CLUSTER_MIN_SIZE {
                        out.extend(members);
                    } else {
                        self.stats.fault_clusters_detected += 1;
                        out.push(merge_cluster(members));
                    }
                }
            }
        }
        out
    }
}

fn carries_fault_code(entry: &LogEntry) -> bool {
    entry
        .error_code
        .as_deref()
        .is_some_and(|code| !code.is_empty() && code != "INFO")
}

fn is_noise(raw: &str) -> bool {
    NOISE_PATTERNS.iter().any(|re| re.is_match(raw))
}

fn autofill_connector_id(entry: &LogEntry, idx: usize) -> String {
    match entry.connector_id.as_deref() {
        Some(c) if !c.is_empty() && c != "Unknown" => c.to_string(),
        _ => entry
            .raw_data
            .as_deref()
            .and_then(|raw| RE_CONNECTOR.captures(raw))
            .and_then(|c| c.get(1))
            .map(|m| format!("Connector-{}", m.as_str()))
            .unwrap_or_else(|| format!("Connector-{}", idx % 4 + 1)),
    }
}

fn clock_time(iso: &str) -> String {
    parse_timestamp(iso)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| iso.to_string())
}

fn merge_cluster(members: Vec<LogEntry>) -> LogEntry {
    let occurrences = members.len();
    let stamps = members.iter().filter_map(|e| e.timestamp.clone());
    let first_seen = stamps.clone().min().unwrap_or_default();
    let last_seen = stamps.max().unwrap_or_default();

    let mut merged = members.into_iter().next().unwrap_or_default();
    let raw = merged.raw_data.take().unwrap_or_default();
    merged.raw_data = Some(format!(
        "{} [Occurred {} times between {} - {}]",
        raw,
        occurrences,
        clock_time(&first_seen),
        clock_time(&last_seen)
    ));
    merged.cluster = Some(FaultCluster {
        occurrences,
        first_seen,
        last_seen,
    });
    merged
}

pub fn optimize_logs(entries: Vec<LogEntry>) -> OptimizedLogResult {
    LogOptimizer::new().optimize(entries)
}

pub fn optimize_logs_at(entries: Vec<LogEntry>, now: DateTime<Utc>) -> OptimizedLogResult {
    LogOptimizer::new().optimize_at(entries, now)
}
