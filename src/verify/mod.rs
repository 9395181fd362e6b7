//! Quality checks over persisted annotated tables.
//!
//! Exports are re-read from disk rather than taken from memory, so problems
//! introduced while writing them show up here. Nothing in this module writes
//! to the exports, and a failed check is reported, never raised.

use crate::data::loader::parse_value;
use crate::data::{is_missing, GENE_SYMBOL_HEADER, PROBE_ID_HEADER};
use crate::error::{AnnotationError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bounds and sizes used by the checks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Lowest expected expression value
    pub min_value: f64,
    /// Highest expected expression value
    pub max_value: f64,
    /// Number of most represented genes to report
    pub top_n: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        // log2 intensity scale
        Self {
            min_value: 0.0,
            max_value: 20.0,
            top_n: 10,
        }
    }
}

/// Outcome of a single pass/fail check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    pub count: usize,
}

impl CheckResult {
    /// Passes when nothing was counted
    fn zero_tolerance(count: usize) -> Self {
        Self {
            passed: count == 0,
            count,
        }
    }
}

/// Number of probes carrying one gene symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneCount {
    pub gene: String,
    pub probes: usize,
}

/// Outlying cells listed per dataset; the count keeps going past this
pub const MAX_LISTED_OUTLIERS: usize = 100;

/// Expression value outside the expected range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub probe: String,
    pub sample: String,
    pub value: f64,
}

/// Value range check. Outliers are flagged for review and do not fail the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeCheck {
    pub outliers: usize,
    /// First outlying cells in file order
    pub flagged: Vec<Outlier>,
    pub lower: f64,
    pub upper: f64,
    pub observed_min: Option<f64>,
    pub observed_max: Option<f64>,
}

/// Quality signals for one exported dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetQuality {
    pub dataset: String,
    pub path: PathBuf,
    pub rows: usize,
    pub samples: usize,
    /// Empty, NA or non-numeric expression cells
    pub missing_values: CheckResult,
    /// Rows with an empty gene symbol
    pub empty_symbols: CheckResult,
    /// Rows repeating an earlier Probe_ID
    pub duplicate_probes: CheckResult,
    pub duplicate_probe_ids: Vec<String>,
    /// Genes covered by more than one probe
    pub multi_probe_genes: Vec<GeneCount>,
    pub value_range: RangeCheck,
    pub top_genes: Vec<GeneCount>,
}

impl DatasetQuality {
    /// Whether every pass/fail check passed; outliers are not one of them
    pub fn passed(&self) -> bool {
        self.missing_values.passed && self.empty_symbols.passed && self.duplicate_probes.passed
    }
}

/// Export that could not be read at all
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadableExport {
    pub dataset: String,
    pub path: PathBuf,
    pub error: String,
}

/// Quality results for a set of exports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub datasets: Vec<DatasetQuality>,
    pub unreadable: Vec<UnreadableExport>,
}

impl QualityReport {
    /// Number of datasets passing every check
    pub fn passed_count(&self) -> usize {
        self.datasets.iter().filter(|d| d.passed()).count()
    }

    /// Log summary
    pub fn log(&self) {
        info!("=== Quality Report ===");
        for d in &self.datasets {
            info!(
                "{}: {} ({} rows, {} missing, {} duplicate probes, {} multi-probe genes)",
                d.dataset,
                if d.passed() { "PASS" } else { "FAIL" },
                d.rows,
                d.missing_values.count,
                d.duplicate_probes.count,
                d.multi_probe_genes.len()
            );
            if d.value_range.outliers > 0 {
                warn!(
                    "{}: {} values outside [{}, {}] flagged",
                    d.dataset, d.value_range.outliers, d.value_range.lower, d.value_range.upper
                );
            }
        }
        for u in &self.unreadable {
            warn!("{}: unreadable export {:?}: {}", u.dataset, u.path, u.error);
        }
        info!(
            "{} of {} datasets passed all checks",
            self.passed_count(),
            self.datasets.len() + self.unreadable.len()
        );
    }
}

/// Verify every export, recording unreadable ones instead of stopping
pub fn verify_exports(exports: &[(String, PathBuf)], config: &VerifyConfig) -> QualityReport {
    let mut report = QualityReport::default();

    for (dataset, path) in exports {
        match verify_export(dataset, path, config) {
            Ok(quality) => report.datasets.push(quality),
            Err(e) => {
                warn!("Could not verify {}: {}", dataset, e);
                report.unreadable.push(UnreadableExport {
                    dataset: dataset.clone(),
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// Re-read one annotated export and run every check on it
pub fn verify_export<P: AsRef<Path>>(
    dataset: &str,
    path: P,
    config: &VerifyConfig,
) -> Result<DatasetQuality> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    if header.get(0) != Some(PROBE_ID_HEADER) || header.get(1) != Some(GENE_SYMBOL_HEADER) {
        return Err(AnnotationError::MalformedMatrix {
            row: 1,
            column: 1,
            reason: format!(
                "expected {} and {} as leading columns, found {:?}",
                PROBE_ID_HEADER,
                GENE_SYMBOL_HEADER,
                header.iter().take(2).collect::<Vec<_>>()
            ),
        });
    }
    let samples = header.len() - 2;

    let mut rows = 0usize;
    let mut missing = 0usize;
    let mut empty_symbols = 0usize;
    let mut outliers = 0usize;
    let mut flagged: Vec<Outlier> = Vec::new();
    let mut observed_min: Option<f64> = None;
    let mut observed_max: Option<f64> = None;
    let mut seen_probes: HashSet<String> = HashSet::new();
    let mut duplicate_rows = 0usize;
    let mut duplicate_ids: HashSet<String> = HashSet::new();
    let mut gene_counts: HashMap<String, usize> = HashMap::new();

    for result in reader.records() {
        let record = result?;
        rows += 1;

        let probe = record.get(0).unwrap_or("").trim();
        if !seen_probes.insert(probe.to_string()) {
            duplicate_rows += 1;
            duplicate_ids.insert(probe.to_string());
        }

        let symbol = record.get(1).unwrap_or("");
        if is_missing(symbol) {
            empty_symbols += 1;
        } else {
            *gene_counts.entry(symbol.trim().to_string()).or_default() += 1;
        }

        for col in 0..samples {
            match record.get(col + 2).and_then(parse_value).flatten() {
                Some(value) => {
                    if value < config.min_value || value > config.max_value {
                        outliers += 1;
                        if flagged.len() < MAX_LISTED_OUTLIERS {
                            flagged.push(Outlier {
                                probe: probe.to_string(),
                                sample: header.get(col + 2).unwrap_or("").to_string(),
                                value,
                            });
                        }
                    }
                    observed_min = Some(observed_min.map_or(value, |m| m.min(value)));
                    observed_max = Some(observed_max.map_or(value, |m| m.max(value)));
                }
                None => missing += 1,
            }
        }
    }

    let mut ranked: Vec<GeneCount> = gene_counts
        .into_iter()
        .map(|(gene, probes)| GeneCount { gene, probes })
        .collect();
    ranked.sort_by(|a, b| b.probes.cmp(&a.probes).then_with(|| a.gene.cmp(&b.gene)));

    let multi_probe_genes: Vec<GeneCount> =
        ranked.iter().filter(|g| g.probes > 1).cloned().collect();
    let top_genes: Vec<GeneCount> = ranked.into_iter().take(config.top_n).collect();

    let mut duplicate_probe_ids: Vec<String> = duplicate_ids.into_iter().collect();
    duplicate_probe_ids.sort();

    Ok(DatasetQuality {
        dataset: dataset.to_string(),
        path: path.to_path_buf(),
        rows,
        samples,
        missing_values: CheckResult::zero_tolerance(missing),
        empty_symbols: CheckResult::zero_tolerance(empty_symbols),
        duplicate_probes: CheckResult::zero_tolerance(duplicate_rows),
        duplicate_probe_ids,
        multi_probe_genes,
        value_range: RangeCheck {
            outliers,
            flagged,
            lower: config.min_value,
            upper: config.max_value,
            observed_min,
            observed_max,
        },
        top_genes,
    })
}
