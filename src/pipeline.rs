use crate::classifier::{classify_faults, severity_counts, FaultAnalysis, SeverityCounts};
use crate::cost::{calculate_cost_analysis, calculate_cost_analysis_at, CostAnalysis, CostError, CostParameters};
use crate::health::{calculate_health_data_with, HealthData};
use crate::normalizer::{normalize_log_content_at, DetectionBanner, ValidationSummary};
use crate::optimizer::{optimize_logs_at, OptimizationStats};
use crate::parser::{LogEntry, ParseError};
use crate::predictive::{
    calculate_charger_health_at, calculate_predictive_summary, detect_predictive_alerts_with, ChargerHealth,
    PredictiveAlert, PredictiveSummary,
};
use crate::reader::{ChunkProgress, ChunkReader, ProcessingStage, DEFAULT_CHUNK_SIZE};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_OPTIMIZE_THRESHOLD: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid cost parameters: {0}")]
    Cost(#[from] CostError),
    #[error("No valid log entries were found in {filename}. Please upload a different file.")]
    NoValidData { filename: String },
    #[error("No faults could be classified from the log entries in {filename}.")]
    NoFaultsDetected { filename: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeMode {
    /// Only content larger than `optimize_threshold_bytes`.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    pub cost: CostParameters,
    pub optimize: OptimizeMode,
    pub optimize_threshold_bytes: usize,
    pub chunk_size_bytes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            cost: CostParameters::default(),
            optimize: OptimizeMode::Auto,
            optimize_threshold_bytes: DEFAULT_OPTIMIZE_THRESHOLD,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl AnalyzerConfig {
    fn should_optimize(&self, content_len: usize) -> bool {
        match self.optimize {
            OptimizeMode::Auto => content_len > self.optimize_threshold_bytes,
            OptimizeMode::Always => true,
            OptimizeMode::Never => false,
        }
    }
}

/// Everything derived from one log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAnalysis {
    pub filename: String,
    pub detection: DetectionBanner,
    pub validation: ValidationSummary,
    /// Present when the optimizer ran.
    pub optimization: Option<OptimizationStats>,
    pub faults: Vec<FaultAnalysis>,
    pub severity: SeverityCounts,
    pub cost_params: CostParameters,
    pub cost: CostAnalysis,
    pub alerts: Vec<PredictiveAlert>,
    pub charger_health: Vec<ChargerHealth>,
    pub health: Vec<HealthData>,
    pub summary: PredictiveSummary,
}

impl LogAnalysis {
    /// Recomputes every cost-dependent view with new parameters.
    pub fn reprice(&mut self, params: CostParameters) -> Result<(), CostError> {
        params.validate()?;
        let now = Utc::now();
        self.apply_pricing(params, now, &mut rand::thread_rng());
        self.cost = calculate_cost_analysis(&self.faults, &params);
        Ok(())
    }

    /// As `reprice`, with "today" and "this month" taken as UTC calendar periods of `now`.
    pub fn reprice_with<R: Rng + ?Sized>(
        &mut self,
        params: CostParameters,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), CostError> {
        params.validate()?;
        self.apply_pricing(params, now, rng);
        self.cost = calculate_cost_analysis_at(&self.faults, &params, &now);
        Ok(())
    }

    fn apply_pricing<R: Rng + ?Sized>(&mut self, params: CostParameters, now: DateTime<Utc>, rng: &mut R) {
        self.cost_params = params;
        self.alerts = detect_predictive_alerts_with(&self.faults, &params, now, rng);
        self.charger_health = calculate_charger_health_at(&self.faults, now);
        self.health = calculate_health_data_with(&self.faults, &params);
        self.summary = calculate_predictive_summary(&self.alerts, &self.charger_health);
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogAnalyzer {
    config: AnalyzerConfig,
}

impl LogAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, PipelineError> {
        config.cost.validate()?;
        Ok(LogAnalyzer { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze_content(&self, content: &str, filename: &str) -> Result<LogAnalysis, PipelineError> {
        let now = Utc::now();
        let mut analysis = self.run(content, filename, now, &mut rand::thread_rng(), |_| {})?;
        analysis.cost = calculate_cost_analysis(&analysis.faults, &analysis.cost_params);
        Ok(analysis)
    }

    pub fn analyze_content_with<R: Rng + ?Sized>(
        &self,
        content: &str,
        filename: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<LogAnalysis, PipelineError> {
        self.run(content, filename, now, rng, |_| {})
    }

    /// Reads `path` in chunks, then analyzes it. Every chunk and every later
    /// stage is reported through `on_progress`.
    pub fn analyze_file<P>(&self, path: impl AsRef<Path>, mut on_progress: P) -> Result<LogAnalysis, PipelineError>
    where
        P: FnMut(&ChunkProgress),
    {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let mut reader = ChunkReader::open(path)?.with_chunk_size(self.config.chunk_size_bytes);
        let lines = reader.read_in_chunks(&mut on_progress)?;
        let content = lines.join("\n");
        let (chunks, bytes) = (reader.total_chunks(), reader.total_bytes());

        let now = Utc::now();
        let mut analysis = self.run(&content, &filename, now, &mut rand::thread_rng(), |stage| {
            on_progress(&reader.progress(stage, chunks, bytes))
        })?;
        analysis.cost = calculate_cost_analysis(&analysis.faults, &analysis.cost_params);
        on_progress(&reader.progress(ProcessingStage::Complete, chunks, bytes));
        Ok(analysis)
    }

    fn run<R, S>(
        &self,
        content: &str,
        filename: &str,
        now: DateTime<Utc>,
        rng: &mut R,
        mut on_stage: S,
    ) -> Result<LogAnalysis, PipelineError>
    where
        R: Rng + ?Sized,
        S: FnMut(ProcessingStage),
    {
        on_stage(ProcessingStage::Processing);
        let normalized = normalize_log_content_at(content, filename, now)?;
        if normalized.entries.is_empty() {
            tracing::warn!(filename, "no valid log entries");
            return Err(PipelineError::NoValidData {
                filename: filename.to_string(),
            });
        }

        let mut entries: Vec<LogEntry> = normalized.entries.iter().map(LogEntry::from).collect();
        let mut optimization = None;
        if self.config.should_optimize(content.len()) {
            on_stage(ProcessingStage::Optimizing);
            let optimized = optimize_logs_at(entries, now);
            entries = optimized.entries;
            optimization = Some(optimized.stats);
        }

        on_stage(ProcessingStage::Classifying);
        let faults = classify_faults(&entries);
        if faults.is_empty() {
            tracing::warn!(filename, entries = entries.len(), "no faults classified");
            return Err(PipelineError::NoFaultsDetected {
                filename: filename.to_string(),
            });
        }
        tracing::info!(filename, faults = faults.len(), "classified faults");

        let mut analysis = LogAnalysis {
            filename: filename.to_string(),
            detection: normalized.banner,
            validation: normalized.validation_summary,
            optimization,
            severity: severity_counts(&faults),
            faults,
            cost_params: self.config.cost,
            cost: CostAnalysis::default(),
            alerts: Vec::new(),
            charger_health: Vec::new(),
            health: Vec::new(),
            summary: PredictiveSummary::default(),
        };
        analysis.reprice_with(self.config.cost, now, rng)?;
        Ok(analysis)
    }
}
