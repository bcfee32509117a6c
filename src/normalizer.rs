use crate::fields::{map_fields_to_standard, NormalizedLogEntry};
use crate::parser::{parse_records, ParseError};
use crate::timestamp::parse_timestamp;
use crate::validator::{detect_corrupted_lines, validate_log_batch_at, ValidationResult};
use crate::vendor::{detect_vendor_and_format, DetectionResult, LogFormat, VendorName};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

const MAX_SUMMARY_WARNINGS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionBanner {
    pub vendor: VendorName,
    pub format: LogFormat,
    pub confidence: f64,
    pub entries_processed: usize,
    pub entries_fixed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub fixed_entries: usize,
    pub corrupted_lines: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationResult {
    pub entries: Vec<NormalizedLogEntry>,
    pub detection: DetectionResult,
    pub banner: DetectionBanner,
    pub validation_summary: ValidationSummary,
    /// Per-line warnings, `Line N: ...`.
    pub batch: ValidationResult,
}

pub fn normalize_log_content(content: &str, filename: &str) -> Result<NormalizationResult, ParseError> {
    normalize_log_content_at(content, filename, Utc::now())
}

/// detect -> parse -> map -> validate, with `now` standing in for missing timestamps.
pub fn normalize_log_content_at(
    content: &str,
    filename: &str,
    now: DateTime<Utc>,
) -> Result<NormalizationResult, ParseError> {
    let detection = detect_vendor_and_format(content, filename);
    if detection.confidence < 0.7 {
        tracing::warn!(
            vendor = %detection.vendor,
            confidence = detection.confidence,
            "low confidence vendor detection"
        );
    }

    let records = parse_records(content, detection.format)?;
    let total_entries = records.len();
    let partials = records
        .iter()
        .map(|r| map_fields_to_standard(&r.fields))
        .collect();
    let batch = validate_log_batch_at(partials, now);

    let summary_warnings = batch
        .entries
        .iter()
        .flat_map(|v| v.warnings.iter().cloned())
        .unique()
        .take(MAX_SUMMARY_WARNINGS)
        .collect();
    let fixed = batch.result.fixed_count;
    let entries: Vec<NormalizedLogEntry> = batch.entries.into_iter().map(|v| v.entry).collect();

    tracing::info!(
        filename,
        vendor = %detection.vendor,
        format = %detection.format,
        entries = entries.len(),
        fixed,
        "normalized log content"
    );

    Ok(NormalizationResult {
        banner: DetectionBanner {
            vendor: detection.vendor,
            format: detection.format,
            confidence: detection.confidence,
            entries_processed: entries.len(),
            entries_fixed: fixed,
        },
        validation_summary: ValidationSummary {
            total_entries,
            valid_entries: entries.len() - fixed,
            fixed_entries: fixed,
            corrupted_lines: detect_corrupted_lines(content),
            warnings: summary_warnings,
        },
        entries,
        detection,
        batch: batch.result,
    })
}

/// Concatenates both sets and orders them by timestamp; unparseable timestamps sort first.
pub fn merge_normalized_entries(
    existing: Vec<NormalizedLogEntry>,
    new_entries: Vec<NormalizedLogEntry>,
) -> Vec<NormalizedLogEntry> {
    let mut merged: Vec<NormalizedLogEntry> = existing.into_iter().chain(new_entries).collect();
    merged.sort_by_key(|e| parse_timestamp(&e.timestamp));
    merged
}
