//! Batch orchestration: resolve platforms once, then load, join, summarize
//! and export every dataset in configured order.
//!
//! A failing dataset or platform never stops the run; the failure is kept in
//! the [`RunReport`] next to the successful results. A dataset assigned to
//! the wrong platform is not detected here and only shows up as a low
//! retention rate.

use crate::annotate::join;
use crate::data::loader::{LoaderConfig, TableLoader};
use crate::data::platform::ColumnResolver;
use crate::data::ProbeGeneMap;
use crate::error::AnnotationError;
use crate::export::{self, FailureRow};
use crate::stats::{summarize, AnnotationSummaryRow, OverallStatistics, PlatformStatistics};
use crate::utils::{ensure_dir, format_duration, validation};
use crate::verify::{verify_exports, QualityReport, VerifyConfig};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Retention rate (percent) below which a dataset is reported as suspicious
pub const LOW_RETENTION_WARNING: f64 = 50.0;

/// One platform annotation file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub id: String,
    pub path: PathBuf,
    /// Explicit probe column, tried before the built-in aliases
    #[serde(default)]
    pub probe_column: Option<String>,
    /// Explicit gene symbol column, tried before the built-in candidates
    #[serde(default)]
    pub symbol_column: Option<String>,
}

/// One expression dataset and its platform assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub platforms: Vec<PlatformConfig>,
    pub datasets: Vec<DatasetConfig>,
    /// Comment prefixes of the input tables
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

impl PipelineConfig {
    /// Load a JSON configuration; relative paths are taken from the file's directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let mut config: PipelineConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        rebase(&mut self.output_dir);
        self.platforms.iter_mut().for_each(|p| rebase(&mut p.path));
        self.datasets.iter_mut().for_each(|d| rebase(&mut d.path));
    }

    /// Check identifiers, loader and verification settings
    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            anyhow::bail!("Configuration lists no datasets");
        }
        let dataset_ids = || self.datasets.iter().map(|d| d.id.as_str());
        validation::unique_ids(dataset_ids(), "dataset")?;
        validation::file_stems(dataset_ids(), "dataset")?;
        validation::unique_ids(self.platforms.iter().map(|p| p.id.as_str()), "platform")?;

        if !self.loader.is_valid() {
            anyhow::bail!("loader comment prefixes must be ASCII characters");
        }
        validation::ordered_bounds(
            self.verify.min_value,
            self.verify.max_value,
            "verify value range",
        )?;
        validation::positive(self.verify.top_n, "verify.top_n")?;
        Ok(())
    }
}

/// What happened to one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatasetOutcome {
    Annotated {
        summary: AnnotationSummaryRow,
        export: PathBuf,
    },
    Failed {
        error: String,
    },
}

/// Per-dataset result in configured order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetResult {
    pub dataset: String,
    pub platform: Option<String>,
    pub outcome: DatasetOutcome,
}

/// Results of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Vec<DatasetResult>,
    /// Present when at least one dataset was annotated
    pub overall: Option<OverallStatistics>,
    pub platforms: Vec<PlatformStatistics>,
}

impl RunReport {
    /// Summary rows of the annotated datasets, in run order
    pub fn summaries(&self) -> Vec<AnnotationSummaryRow> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                DatasetOutcome::Annotated { summary, .. } => Some(summary.clone()),
                DatasetOutcome::Failed { .. } => None,
            })
            .collect()
    }

    /// Failed datasets with their reasons
    pub fn failures(&self) -> Vec<FailureRow> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                DatasetOutcome::Failed { error } => Some(FailureRow {
                    dataset: r.dataset.clone(),
                    error: error.clone(),
                }),
                DatasetOutcome::Annotated { .. } => None,
            })
            .collect()
    }

    /// Written annotated tables as (dataset, path)
    pub fn exports(&self) -> Vec<(String, PathBuf)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                DatasetOutcome::Annotated { export, .. } => {
                    Some((r.dataset.clone(), export.clone()))
                }
                DatasetOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

/// Annotation pipeline over a [`PipelineConfig`]
pub struct Pipeline {
    config: PipelineConfig,
    loader: TableLoader,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            loader: TableLoader::with_config(config.loader.clone()),
            config,
            show_progress: false,
        }
    }

    /// Show a progress bar over datasets
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run every dataset and write the summary tables.
    ///
    /// Outputs of an earlier run that this run does not rewrite are removed,
    /// so the output directory only describes this run. Only failures that
    /// affect the whole run (output directory, summary tables) are returned
    /// as errors.
    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        ensure_dir(&self.config.output_dir)?;

        info!(
            "Annotating {} datasets across {} platforms",
            self.config.datasets.len(),
            self.config.platforms.len()
        );

        let maps = self.resolve_platforms();

        let pb = if self.show_progress {
            ProgressBar::new(self.config.datasets.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );

        let mut report = RunReport::default();
        for dataset in &self.config.datasets {
            pb.set_message(dataset.id.clone());

            let outcome = match self.process_dataset(dataset, &maps) {
                Ok((summary, export)) => {
                    info!(
                        "{}: kept {} of {} probes ({:.2}%), {} unique genes",
                        dataset.id,
                        summary.annotated_probes,
                        summary.total_probes,
                        summary.retention_rate,
                        summary.unique_genes
                    );
                    DatasetOutcome::Annotated { summary, export }
                }
                Err(e) => {
                    error!("{}: skipped: {:#}", dataset.id, e);
                    let stale = export::annotated_path(&self.config.output_dir, &dataset.id);
                    export::remove_stale(stale)?;
                    DatasetOutcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            };

            report.results.push(DatasetResult {
                dataset: dataset.id.clone(),
                platform: dataset.platform.clone(),
                outcome,
            });
            pb.inc(1);
        }
        pb.finish_with_message("done");

        self.finalize(&mut report)?;

        info!(
            "Annotated {} of {} datasets in {}",
            report.summaries().len(),
            report.results.len(),
            format_duration(start.elapsed().as_secs_f64())
        );
        Ok(report)
    }

    /// Re-read the written exports and save the quality report next to them
    pub fn verify(&self, report: &RunReport) -> Result<QualityReport> {
        let quality = verify_exports(&report.exports(), &self.config.verify);
        export::write_quality_report(
            self.config.output_dir.join(export::QUALITY_REPORT_FILE),
            &quality,
        )?;
        Ok(quality)
    }

    /// Load and resolve each platform once; failures are kept per platform
    fn resolve_platforms(&self) -> BTreeMap<String, std::result::Result<ProbeGeneMap, String>> {
        self.config
            .platforms
            .iter()
            .map(|platform| {
                let resolved = self
                    .loader
                    .load_platform(&platform.path)
                    .and_then(|table| {
                        ColumnResolver::new()
                            .with_probe_column(platform.probe_column.clone())
                            .with_symbol_column(platform.symbol_column.clone())
                            .resolve(&platform.id, &table)
                    })
                    .map_err(|e| {
                        error!("Platform {} unavailable: {}", platform.id, e);
                        e.to_string()
                    });
                (platform.id.clone(), resolved)
            })
            .collect()
    }

    fn process_dataset(
        &self,
        dataset: &DatasetConfig,
        maps: &BTreeMap<String, std::result::Result<ProbeGeneMap, String>>,
    ) -> Result<(AnnotationSummaryRow, PathBuf)> {
        let platform = dataset
            .platform
            .as_deref()
            .ok_or_else(|| AnnotationError::MissingAssignment {
                dataset: dataset.id.clone(),
                detail: "no platform assigned".to_string(),
            })?;

        let map = match maps.get(platform) {
            Some(Ok(map)) => map,
            Some(Err(reason)) => anyhow::bail!("platform {} unavailable: {}", platform, reason),
            None => {
                return Err(AnnotationError::MissingAssignment {
                    dataset: dataset.id.clone(),
                    detail: format!("assigned platform {} is not configured", platform),
                }
                .into())
            }
        };

        debug!("{}: using platform {}", dataset.id, platform);

        let matrix = self
            .loader
            .load_expression(&dataset.path)
            .with_context(|| format!("Failed to load {:?}", dataset.path))?;
        let annotated = join(&matrix, map);
        let summary = summarize(&dataset.id, platform, &matrix, &annotated)?;

        if summary.retention_rate < LOW_RETENTION_WARNING {
            warn!(
                "{}: retention rate {:.2}% is low; check that platform {} is the right assignment",
                dataset.id, summary.retention_rate, platform
            );
        }

        let export = export::write_annotated(&self.config.output_dir, &dataset.id, &annotated)?;
        Ok((summary, export))
    }

    /// Cross-dataset statistics, written once every dataset is done
    fn finalize(&self, report: &mut RunReport) -> Result<()> {
        let dir = &self.config.output_dir;
        let summaries = report.summaries();

        if summaries.is_empty() {
            warn!("No dataset was annotated; summary tables not written");
            for file in [export::SUMMARY_FILE, export::OVERALL_FILE, export::PLATFORM_FILE] {
                export::remove_stale(dir.join(file))?;
            }
        } else {
            let overall = OverallStatistics::from_rows(&summaries)?;
            let platforms = PlatformStatistics::from_rows(&summaries);

            export::write_table(dir.join(export::SUMMARY_FILE), &summaries)?;
            export::write_table(dir.join(export::OVERALL_FILE), std::slice::from_ref(&overall))?;
            export::write_table(dir.join(export::PLATFORM_FILE), &platforms)?;

            overall.log();
            report.overall = Some(overall);
            report.platforms = platforms;
        }

        let failures = report.failures();
        if failures.is_empty() {
            export::remove_stale(dir.join(export::FAILURES_FILE))?;
        } else {
            warn!("{} datasets failed", failures.len());
            export::write_table(dir.join(export::FAILURES_FILE), &failures)?;
        }

        Ok(())
    }
}
