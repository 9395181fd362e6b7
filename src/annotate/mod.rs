//! Join of expression matrices against a resolved probe → gene map.

use crate::data::{AnnotatedMatrix, AnnotatedRow, ExpressionMatrix, ProbeGeneMap};
use tracing::debug;

/// Keep the rows of `matrix` whose probe maps to a non-empty symbol.
///
/// Row order follows `matrix`; duplicated probes are kept as separate rows.
/// Neither input is modified.
pub fn join(matrix: &ExpressionMatrix, map: &ProbeGeneMap) -> AnnotatedMatrix {
    let rows: Vec<AnnotatedRow> = matrix
        .rows()
        .iter()
        .filter_map(|row| {
            let symbol = map.get(&row.probe_id)?.trim();
            if symbol.is_empty() {
                return None;
            }
            Some(AnnotatedRow {
                probe_id: row.probe_id.clone(),
                gene_symbol: symbol.to_string(),
                values: row.values.clone(),
            })
        })
        .collect();

    debug!(
        "Joined against platform {}: kept {} of {} probes",
        map.platform(),
        rows.len(),
        matrix.n_probes()
    );

    AnnotatedMatrix {
        sample_ids: matrix.sample_ids().to_vec(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ExpressionRow;

    fn matrix(rows: &[(&str, [f64; 2])]) -> ExpressionMatrix {
        ExpressionMatrix::new(
            vec!["S1".to_string(), "S2".to_string()],
            rows.iter()
                .map(|(probe, values)| ExpressionRow {
                    probe_id: probe.to_string(),
                    values: values.iter().copied().map(Some).collect(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_join_reference_scenario() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "TP53"), ("P2", "")]);
        let m = matrix(&[("P1", [1.0, 2.0]), ("P2", [3.0, 4.0]), ("P3", [5.0, 6.0])]);

        let annotated = join(&m, &map);

        assert_eq!(annotated.sample_ids, vec!["S1", "S2"]);
        assert_eq!(
            annotated.rows,
            vec![AnnotatedRow {
                probe_id: "P1".to_string(),
                gene_symbol: "TP53".to_string(),
                values: vec![Some(1.0), Some(2.0)],
            }]
        );
    }

    #[test]
    fn test_join_preserves_order() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P3", "C"), ("P1", "A"), ("P5", "E")]);
        let m = matrix(&[
            ("P5", [0.0, 0.0]),
            ("P4", [0.0, 0.0]),
            ("P1", [0.0, 0.0]),
            ("P3", [0.0, 0.0]),
        ]);

        let probes: Vec<_> = join(&m, &map).rows.into_iter().map(|r| r.probe_id).collect();
        assert_eq!(probes, vec!["P5", "P1", "P3"]);

        // retained rows form a subsequence of the source order
        let source: Vec<_> = m.rows().iter().map(|r| r.probe_id.clone()).collect();
        let mut cursor = source.iter();
        assert!(probes.iter().all(|p| cursor.any(|s| s == p)));
    }

    #[test]
    fn test_join_is_idempotent() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "A"), ("P2", "B")]);
        let m = matrix(&[("P1", [1.0, 2.0]), ("P2", [3.0, 4.0]), ("P9", [0.0, 0.0])]);

        assert_eq!(join(&m, &map), join(&m, &map));
    }

    #[test]
    fn test_join_keeps_duplicate_probes() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "TP53")]);
        let m = matrix(&[("P1", [1.0, 2.0]), ("P1", [3.0, 4.0])]);

        let annotated = join(&m, &map);
        assert_eq!(annotated.n_rows(), 2);
        assert_eq!(annotated.unique_genes(), 1);
        assert_eq!(annotated.rows[1].values, vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_shared_map_is_isolated_between_datasets() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "TP53"), ("P2", "EGFR")]);
        let first = matrix(&[("P1", [1.0, 2.0]), ("P2", [3.0, 4.0])]);
        let second = matrix(&[("P2", [5.0, 6.0]), ("P1", [7.0, 8.0])]);

        let mut a = join(&first, &map);
        let b = join(&second, &map);
        let b_before = b.clone();

        a.rows[0].gene_symbol.push_str("_EDITED");
        a.rows[0].values[0] = None;
        a.rows.pop();

        assert_eq!(map.get("P1"), Some("TP53"));
        assert_eq!(map.get("P2"), Some("EGFR"));
        assert_eq!(b, b_before);
        assert_eq!(join(&first, &map).n_rows(), 2);
    }

    #[test]
    fn test_join_empty_matrix() {
        let map = ProbeGeneMap::from_pairs("GPL1", [("P1", "A")]);
        let annotated = join(&matrix(&[]), &map);
        assert_eq!(annotated.n_rows(), 0);
        assert_eq!(annotated.n_samples(), 2);
    }
}
