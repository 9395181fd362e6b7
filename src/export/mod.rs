//! Flat tabular exports of annotation results.

use crate::data::AnnotatedMatrix;
use crate::utils::ensure_dir;
use crate::verify::QualityReport;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix of per-dataset annotated tables
pub const ANNOTATED_SUFFIX: &str = "_annotated.tsv";
pub const SUMMARY_FILE: &str = "annotation_summary.tsv";
pub const OVERALL_FILE: &str = "overall_statistics.tsv";
pub const PLATFORM_FILE: &str = "platform_statistics.tsv";
pub const FAILURES_FILE: &str = "failed_datasets.tsv";
pub const QUALITY_REPORT_FILE: &str = "quality_report.json";

/// Marker written for missing expression values
const MISSING_MARKER: &str = "NA";

/// A dataset that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRow {
    #[serde(rename = "Dataset")]
    pub dataset: String,
    #[serde(rename = "Error")]
    pub error: String,
}

/// Path of the annotated table for `dataset` inside `dir`
pub fn annotated_path<P: AsRef<Path>>(dir: P, dataset: &str) -> PathBuf {
    dir.as_ref().join(format!("{}{}", dataset, ANNOTATED_SUFFIX))
}

/// Write `<dataset>_annotated.tsv`: Probe_ID, Gene_Symbol, then samples
pub fn write_annotated<P: AsRef<Path>>(
    dir: P,
    dataset: &str,
    annotated: &AnnotatedMatrix,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    ensure_dir(dir)?;
    let path = annotated_path(dir, dataset);

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    writer.write_record(annotated.header())?;
    for row in &annotated.rows {
        let mut record = Vec::with_capacity(row.values.len() + 2);
        record.push(row.probe_id.clone());
        record.push(row.gene_symbol.clone());
        record.extend(row.values.iter().map(|v| match v {
            Some(value) => value.to_string(),
            None => MISSING_MARKER.to_string(),
        }));
        writer.write_record(&record)?;
    }
    writer.flush().with_context(|| format!("Failed to write {:?}", path))?;

    debug!("Written {} annotated rows to {:?}", annotated.n_rows(), path);
    Ok(path)
}

/// Write serializable rows as a tab-separated table with a header
pub fn write_table<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to serialize row into {:?}", path))?;
    }
    writer.flush().with_context(|| format!("Failed to write {:?}", path))?;

    info!("Written {} rows to {:?}", rows.len(), path);
    Ok(())
}

/// Delete an output left by an earlier run; returns whether a file was removed
pub fn remove_stale<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale output {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove stale output {:?}", path)),
    }
}

/// Write the quality report as pretty JSON
pub fn write_quality_report<P: AsRef<Path>>(path: P, report: &QualityReport) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize quality report")?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;

    info!("Quality report saved to {:?}", path);
    Ok(())
}

/// Find `<dataset>_annotated.tsv` files in `dir`, sorted by dataset
pub fn discover_exports<P: AsRef<Path>>(dir: P) -> Result<Vec<(String, PathBuf)>> {
    let dir = dir.as_ref();
    let mut exports = Vec::new();

    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;
    for entry in entries {
        let path = entry?.path();
        let dataset = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(ANNOTATED_SUFFIX))
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        if let (Some(dataset), true) = (dataset, path.is_file()) {
            exports.push((dataset, path));
        }
    }

    exports.sort();
    Ok(exports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnnotatedRow;
    use crate::stats::AnnotationSummaryRow;
    use tempfile::TempDir;

    fn annotated() -> AnnotatedMatrix {
        AnnotatedMatrix {
            sample_ids: vec!["GSM1".to_string(), "GSM2".to_string()],
            rows: vec![
                AnnotatedRow {
                    probe_id: "P1".to_string(),
                    gene_symbol: "TP53".to_string(),
                    values: vec![Some(1.5), None],
                },
                AnnotatedRow {
                    probe_id: "P7".to_string(),
                    gene_symbol: "MYC".to_string(),
                    values: vec![Some(-2.0), Some(3.0)],
                },
            ],
        }
    }

    #[test]
    fn test_write_annotated() {
        let dir = TempDir::new().unwrap();
        let path = write_annotated(dir.path().join("out"), "GSE1", &annotated()).unwrap();

        assert!(path.ends_with("GSE1_annotated.tsv"));
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Probe_ID\tGene_Symbol\tGSM1\tGSM2\nP1\tTP53\t1.5\tNA\nP7\tMYC\t-2\t3\n"
        );
    }

    #[test]
    fn test_write_summary_table_headers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let rows = vec![AnnotationSummaryRow {
            dataset: "GSE1".to_string(),
            platform: "GPL1".to_string(),
            total_probes: 3,
            annotated_probes: 1,
            removed_probes: 2,
            retention_rate: 33.33,
            unique_genes: 1,
            samples: 2,
        }];

        write_table(&path, &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some(
                "Dataset\tPlatform\tTotal_Probes\tAnnotated_Probes\tRemoved_Probes\t\
                 Retention_Rate\tUnique_Genes\tSamples"
            )
        );
        assert_eq!(lines.next(), Some("GSE1\tGPL1\t3\t1\t2\t33.33\t1\t2"));
    }

    #[test]
    fn test_discover_exports() {
        let dir = TempDir::new().unwrap();
        write_annotated(dir.path(), "GSE2", &annotated()).unwrap();
        write_annotated(dir.path(), "GSE1", &annotated()).unwrap();
        fs::write(dir.path().join(SUMMARY_FILE), "x").unwrap();

        let exports = discover_exports(dir.path()).unwrap();
        let names: Vec<_> = exports.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(names, vec!["GSE1", "GSE2"]);
    }

    #[test]
    fn test_remove_stale() {
        let dir = TempDir::new().unwrap();
        let path = write_annotated(dir.path(), "GSE1", &annotated()).unwrap();

        assert!(remove_stale(&path).unwrap());
        assert!(!path.exists());
        assert!(!remove_stale(&path).unwrap());
    }

    #[test]
    fn test_write_quality_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(QUALITY_REPORT_FILE);

        write_quality_report(&path, &QualityReport::default()).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        let parsed: QualityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, QualityReport::default());
    }
}
