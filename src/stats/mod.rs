use crate::data::{AnnotatedMatrix, ExpressionMatrix};
use crate::error::{AnnotationError, Result};
use crate::utils::format_number;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Annotation outcome for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSummaryRow {
    #[serde(rename = "Dataset")]
    pub dataset: String,
    #[serde(rename = "Platform")]
    pub platform: String,
    /// Rows in the expression matrix
    #[serde(rename = "Total_Probes")]
    pub total_probes: usize,
    /// Rows kept after annotation
    #[serde(rename = "Annotated_Probes")]
    pub annotated_probes: usize,
    #[serde(rename = "Removed_Probes")]
    pub removed_probes: usize,
    /// Percentage of probes kept, two decimals
    #[serde(rename = "Retention_Rate")]
    pub retention_rate: f64,
    #[serde(rename = "Unique_Genes")]
    pub unique_genes: usize,
    #[serde(rename = "Samples")]
    pub samples: usize,
}

/// Summarize one dataset's join result
pub fn summarize(
    dataset: &str,
    platform: &str,
    matrix: &ExpressionMatrix,
    annotated: &AnnotatedMatrix,
) -> Result<AnnotationSummaryRow> {
    let total_probes = matrix.n_probes();
    let annotated_probes = annotated.n_rows();

    if total_probes == 0 {
        return Err(AnnotationError::DivisionByZero {
            what: format!("retention rate of dataset {} (no probes)", dataset),
        });
    }

    Ok(AnnotationSummaryRow {
        dataset: dataset.to_string(),
        platform: platform.to_string(),
        total_probes,
        annotated_probes,
        removed_probes: total_probes.saturating_sub(annotated_probes),
        retention_rate: round2(annotated_probes as f64 / total_probes as f64 * 100.0),
        unique_genes: annotated.unique_genes(),
        samples: matrix.n_samples(),
    })
}

/// Statistics across every summarized dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStatistics {
    #[serde(rename = "Datasets")]
    pub datasets: usize,
    #[serde(rename = "Total_Probes")]
    pub total_probes: usize,
    #[serde(rename = "Annotated_Probes")]
    pub annotated_probes: usize,
    #[serde(rename = "Removed_Probes")]
    pub removed_probes: usize,
    #[serde(rename = "Mean_Retention_Rate")]
    pub mean_retention_rate: f64,
    #[serde(rename = "Total_Samples")]
    pub total_samples: usize,
}

impl OverallStatistics {
    /// Reduce summary rows; fails on an empty collection
    pub fn from_rows(rows: &[AnnotationSummaryRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(AnnotationError::DivisionByZero {
                what: "mean retention rate (no datasets)".to_string(),
            });
        }

        let totals = Totals::from_rows(rows.iter());
        Ok(Self {
            datasets: rows.len(),
            total_probes: totals.total_probes,
            annotated_probes: totals.annotated_probes,
            removed_probes: totals.removed_probes,
            mean_retention_rate: totals.mean_retention_rate(rows.len()),
            total_samples: totals.samples,
        })
    }

    /// Log summary
    pub fn log(&self) {
        info!("=== Annotation Summary ===");
        info!("Datasets: {}", self.datasets);
        info!("Total probes: {}", format_number(self.total_probes));
        info!("Annotated probes: {}", format_number(self.annotated_probes));
        info!("Removed probes: {}", format_number(self.removed_probes));
        info!("Mean retention rate: {:.2}%", self.mean_retention_rate);
        info!("Total samples: {}", format_number(self.total_samples));
    }
}

/// Statistics for the datasets of one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStatistics {
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Datasets")]
    pub datasets: usize,
    #[serde(rename = "Total_Probes")]
    pub total_probes: usize,
    #[serde(rename = "Annotated_Probes")]
    pub annotated_probes: usize,
    #[serde(rename = "Removed_Probes")]
    pub removed_probes: usize,
    #[serde(rename = "Mean_Retention_Rate")]
    pub mean_retention_rate: f64,
    #[serde(rename = "Total_Samples")]
    pub total_samples: usize,
}

impl PlatformStatistics {
    /// Group summary rows by platform, ordered by platform ID
    pub fn from_rows(rows: &[AnnotationSummaryRow]) -> Vec<Self> {
        let mut groups: BTreeMap<&str, Vec<&AnnotationSummaryRow>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.platform.as_str()).or_default().push(row);
        }

        groups
            .into_iter()
            .map(|(platform, group)| {
                let totals = Totals::from_rows(group.iter().copied());
                Self {
                    platform: platform.to_string(),
                    datasets: group.len(),
                    total_probes: totals.total_probes,
                    annotated_probes: totals.annotated_probes,
                    removed_probes: totals.removed_probes,
                    mean_retention_rate: totals.mean_retention_rate(group.len()),
                    total_samples: totals.samples,
                }
            })
            .collect()
    }
}

#[derive(Default)]
struct Totals {
    total_probes: usize,
    annotated_probes: usize,
    removed_probes: usize,
    samples: usize,
    retention_sum: f64,
}

impl Totals {
    fn from_rows<'a>(rows: impl Iterator<Item = &'a AnnotationSummaryRow>) -> Self {
        rows.fold(Self::default(), |mut acc, row| {
            acc.total_probes += row.total_probes;
            acc.annotated_probes += row.annotated_probes;
            acc.removed_probes += row.removed_probes;
            acc.samples += row.samples;
            acc.retention_sum += row.retention_rate;
            acc
        })
    }

    // callers guarantee n > 0
    fn mean_retention_rate(&self, n: usize) -> f64 {
        round2(self.retention_sum / n as f64)
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::join;
    use crate::data::{ExpressionRow, ProbeGeneMap};

    fn matrix(probes: &[&str], n_samples: usize) -> ExpressionMatrix {
        ExpressionMatrix::new(
            (0..n_samples).map(|i| format!("S{}", i + 1)).collect(),
            probes
                .iter()
                .map(|p| ExpressionRow {
                    probe_id: p.to_string(),
                    values: vec![Some(1.0); n_samples],
                })
                .collect(),
        )
        .unwrap()
    }

    fn summary(
        dataset: &str,
        platform: &str,
        total: usize,
        annotated: usize,
        rate: f64,
        samples: usize,
    ) -> AnnotationSummaryRow {
        AnnotationSummaryRow {
            dataset: dataset.to_string(),
            platform: platform.to_string(),
            total_probes: total,
            annotated_probes: annotated,
            removed_probes: total - annotated,
            retention_rate: rate,
            unique_genes: annotated,
            samples,
        }
    }

    #[test]
    fn test_summarize_reference_scenario() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "TP53"), ("P2", "")]);
        let m = matrix(&["P1", "P2", "P3"], 2);
        let annotated = join(&m, &map);

        let row = summarize("GSE1", "GPL1", &m, &annotated).unwrap();

        assert_eq!(row.total_probes, 3);
        assert_eq!(row.annotated_probes, 1);
        assert_eq!(row.removed_probes, 2);
        assert_eq!(row.retention_rate, 33.33);
        assert_eq!(row.unique_genes, 1);
        assert_eq!(row.samples, 2);
    }

    #[test]
    fn test_partition_and_bounds() {
        let map =
            ProbeGeneMap::from_pairs("GPL1", [("A", "G1"), ("B", "G1"), ("C", ""), ("D", "G2")]);
        let m = matrix(&["A", "B", "C", "D", "E", "A"], 3);
        let annotated = join(&m, &map);

        let row = summarize("GSE2", "GPL1", &m, &annotated).unwrap();
        let excluded = m.n_probes() - annotated.n_rows();

        assert_eq!(row.removed_probes, excluded);
        assert_eq!(row.removed_probes + row.annotated_probes, row.total_probes);
        assert!(row.retention_rate >= 0.0 && row.retention_rate <= 100.0);
        assert!(row.unique_genes <= row.annotated_probes);
        assert_eq!(row.annotated_probes, 4);
        assert_eq!(row.unique_genes, 2);
    }

    #[test]
    fn test_summarize_empty_matrix_fails() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "A")]);
        let m = matrix(&[], 2);
        let annotated = join(&m, &map);

        let err = summarize("GSE0", "GPL1", &m, &annotated).unwrap_err();
        assert!(matches!(err, AnnotationError::DivisionByZero { .. }));
    }

    #[test]
    fn test_full_and_zero_retention() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "A")]);

        let m = matrix(&["P1"], 1);
        let row = summarize("D1", "GPL1", &m, &join(&m, &map)).unwrap();
        assert_eq!(row.retention_rate, 100.0);

        let m = matrix(&["X"], 1);
        let row = summarize("D2", "GPL1", &m, &join(&m, &map)).unwrap();
        assert_eq!(row.retention_rate, 0.0);
        assert_eq!(row.unique_genes, 0);
    }

    #[test]
    fn test_overall_statistics() {
        let rows = vec![
            summary("D1", "GPL1", 100, 80, 80.0, 4),
            summary("D2", "GPL2", 50, 25, 50.0, 2),
            summary("D3", "GPL1", 10, 7, 70.0, 3),
        ];

        let overall = OverallStatistics::from_rows(&rows).unwrap();
        assert_eq!(overall.datasets, 3);
        assert_eq!(overall.total_probes, 160);
        assert_eq!(overall.annotated_probes, 112);
        assert_eq!(overall.removed_probes, 48);
        assert_eq!(overall.mean_retention_rate, 66.67);
        assert_eq!(overall.total_samples, 9);

        let mut reversed = rows.clone();
        reversed.reverse();
        assert_eq!(OverallStatistics::from_rows(&reversed).unwrap(), overall);
    }

    #[test]
    fn test_overall_statistics_empty_fails() {
        assert!(matches!(
            OverallStatistics::from_rows(&[]),
            Err(AnnotationError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_platform_statistics() {
        let rows = vec![
            summary("D1", "GPL2", 50, 25, 50.0, 2),
            summary("D2", "GPL1", 100, 80, 80.0, 4),
            summary("D3", "GPL1", 10, 7, 70.0, 3),
        ];

        let stats = PlatformStatistics::from_rows(&rows);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].platform, "GPL1");
        assert_eq!(stats[0].datasets, 2);
        assert_eq!(stats[0].total_probes, 110);
        assert_eq!(stats[0].annotated_probes, 87);
        assert_eq!(stats[0].mean_retention_rate, 75.0);
        assert_eq!(stats[0].total_samples, 7);
        assert_eq!(stats[1].platform, "GPL2");
        assert_eq!(stats[1].removed_probes, 25);

        assert!(PlatformStatistics::from_rows(&[]).is_empty());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.3333), 33.33);
        assert_eq!(round2(66.666), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }
}
