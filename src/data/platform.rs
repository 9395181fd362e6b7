//! Resolution of platform annotation schemas into a probe → gene lookup.
//!
//! Platform vendors name their columns differently, so the probe and symbol
//! columns are located once per platform through an ordered alias table and
//! rows are then read by index.

use crate::data::{
    normalize_symbol, PlatformTable, ProbeGeneMap, GENE_SYMBOL_CANDIDATES, PROBE_ID_ALIASES,
};
use crate::error::{AnnotationError, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Column indices resolved for one platform table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub probe: usize,
    pub symbol: usize,
}

/// Ordered alias table used to locate the probe and symbol columns
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    probe_aliases: Vec<String>,
    symbol_candidates: Vec<String>,
    probe_override: Option<String>,
    symbol_override: Option<String>,
}

impl ColumnResolver {
    /// Resolver with the built-in alias lists
    pub fn new() -> Self {
        Self {
            probe_aliases: PROBE_ID_ALIASES.iter().map(|s| s.to_string()).collect(),
            symbol_candidates: GENE_SYMBOL_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            probe_override: None,
            symbol_override: None,
        }
    }

    /// Use an explicit probe column before trying the aliases
    pub fn with_probe_column(mut self, column: Option<String>) -> Self {
        self.probe_override = column;
        self
    }

    /// Use an explicit symbol column before trying the candidates
    pub fn with_symbol_column(mut self, column: Option<String>) -> Self {
        self.symbol_override = column;
        self
    }

    /// Locate probe and symbol columns in `columns`
    pub fn resolve_columns(&self, platform: &str, columns: &[String]) -> Result<ResolvedColumns> {
        let schema_error = || AnnotationError::SchemaResolution {
            platform: platform.to_string(),
            columns: columns.to_vec(),
        };

        if columns.is_empty() {
            return Err(schema_error());
        }

        let probe = match &self.probe_override {
            Some(name) => find_exact(columns, std::slice::from_ref(name)).ok_or_else(schema_error)?,
            // The primary key of every platform file is its first column
            None => find_exact(columns, &self.probe_aliases).unwrap_or(0),
        };

        let symbol = match &self.symbol_override {
            Some(name) => find_exact(columns, std::slice::from_ref(name)),
            None => find_exact(columns, &self.symbol_candidates)
                .or_else(|| find_near(columns, &self.symbol_candidates)),
        }
        .ok_or_else(schema_error)?;

        debug!(
            "Platform {}: probe column '{}', symbol column '{}'",
            platform, columns[probe], columns[symbol]
        );

        Ok(ResolvedColumns { probe, symbol })
    }

    /// Build the probe → gene map for one platform table.
    ///
    /// Duplicate probe IDs keep the last row's symbol. Rows with a blank probe
    /// ID are skipped.
    pub fn resolve(&self, platform: &str, table: &PlatformTable) -> Result<ProbeGeneMap> {
        let columns = self.resolve_columns(platform, &table.columns)?;

        let mut symbols: HashMap<String, String> = HashMap::with_capacity(table.n_rows());
        let mut overwritten = 0usize;
        let mut skipped = 0usize;

        for row in &table.rows {
            let probe = row.get(columns.probe).map(|c| c.trim()).unwrap_or("");
            if probe.is_empty() {
                skipped += 1;
                continue;
            }

            let cell = row.get(columns.symbol).map(String::as_str).unwrap_or("");
            let symbol = normalize_symbol(cell);
            if symbols.insert(probe.to_string(), symbol).is_some() {
                overwritten += 1;
            }
        }

        if overwritten > 0 {
            debug!("Platform {}: {} duplicate probe rows overwritten", platform, overwritten);
        }
        if skipped > 0 {
            warn!("Platform {}: skipped {} rows without a probe ID", platform, skipped);
        }

        let map = ProbeGeneMap::new(
            platform.to_string(),
            table.columns[columns.probe].clone(),
            table.columns[columns.symbol].clone(),
            symbols,
        );

        info!(
            "Platform {}: {} probes, {} with gene symbols",
            platform,
            map.len(),
            map.annotated_len()
        );
        Ok(map)
    }
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a platform table with the built-in aliases
pub fn resolve(platform: &str, table: &PlatformTable) -> Result<ProbeGeneMap> {
    ColumnResolver::new().resolve(platform, table)
}

/// First candidate (in candidate order) with a case-insensitive exact match
fn find_exact(columns: &[String], candidates: &[String]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(candidate.trim()))
    })
}

/// First candidate matching once separators and case are ignored
fn find_near(columns: &[String], candidates: &[String]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        let key = squash(candidate);
        columns.iter().position(|c| squash(c) == key)
    })
}

fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> PlatformTable {
        PlatformTable::new(
            columns.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_resolve_basic() {
        let t = table(&["ID", "Gene Symbol"], &[&["P1", "TP53"], &["P2", ""]]);
        let map = resolve("GPL1", &t).unwrap();

        assert_eq!(map.get("P1"), Some("TP53"));
        assert_eq!(map.get("P2"), Some(""));
        assert_eq!(map.probe_column(), "ID");
        assert_eq!(map.symbol_column(), "Gene Symbol");
    }

    #[test]
    fn test_missing_symbol_column_fails() {
        let t = table(
            &["ID", "ENTREZ_GENE_ID", "Description"],
            &[&["P1", "7157", "tumor protein"]],
        );
        let err = resolve("GPL2", &t).unwrap_err();

        match err {
            AnnotationError::SchemaResolution { platform, columns } => {
                assert_eq!(platform, "GPL2");
                assert_eq!(columns.len(), 3);
            }
            other => panic!("Expected SchemaResolution, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_table_fails() {
        assert!(matches!(
            resolve("GPL0", &PlatformTable::default()),
            Err(AnnotationError::SchemaResolution { .. })
        ));
    }

    #[test]
    fn test_candidate_order_beats_table_order() {
        let t = table(&["ID", "Symbol", "Gene Symbol"], &[&["P1", "WRONG", "RIGHT"]]);
        let map = resolve("GPL3", &t).unwrap();

        assert_eq!(map.symbol_column(), "Gene Symbol");
        assert_eq!(map.get("P1"), Some("RIGHT"));
    }

    #[test]
    fn test_case_insensitive_and_near_match() {
        let t = table(&["ID", "gene_symbol"], &[&["P1", "EGFR"]]);
        assert_eq!(resolve("GPL4", &t).unwrap().get("P1"), Some("EGFR"));

        let t = table(&["ID", "Gene.Symbol"], &[&["P1", "MYC"]]);
        assert_eq!(resolve("GPL5", &t).unwrap().get("P1"), Some("MYC"));
    }

    #[test]
    fn test_probe_column_falls_back_to_first() {
        let t = table(&["SPOT", "Symbol"], &[&["A1", "KRAS"]]);
        let map = resolve("GPL6", &t).unwrap();

        assert_eq!(map.probe_column(), "SPOT");
        assert_eq!(map.get("A1"), Some("KRAS"));
    }

    #[test]
    fn test_probe_alias_found_anywhere() {
        let t = table(&["SEQ", "ID_REF", "Symbol"], &[&["ACGT", "P9", "BRCA1"]]);
        let map = resolve("GPL7", &t).unwrap();

        assert_eq!(map.get("P9"), Some("BRCA1"));
        assert_eq!(map.get("ACGT"), None);
    }

    #[test]
    fn test_duplicate_platform_probe_last_row_wins() {
        let t = table(&["ID", "Symbol"], &[&["P1", "FIRST"], &["P2", "X"], &["P1", "LAST"]]);
        let map = resolve("GPL8", &t).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("P1"), Some("LAST"));
    }

    #[test]
    fn test_blank_and_na_symbols_become_empty() {
        let t = table(
            &["ID", "Symbol"],
            &[&["P1", "  "], &["P2", "NA"], &["P3"], &["P4", " ACTB "]],
        );
        let map = resolve("GPL9", &t).unwrap();

        assert_eq!(map.get("P1"), Some(""));
        assert_eq!(map.get("P2"), Some(""));
        assert_eq!(map.get("P3"), Some(""));
        assert_eq!(map.get("P4"), Some("ACTB"));
        assert_eq!(map.annotated_len(), 1);
    }

    #[test]
    fn test_rows_without_probe_are_skipped() {
        let t = table(&["ID", "Symbol"], &[&["", "GAPDH"], &["P1", "ACTB"]]);
        let map = resolve("GPL10", &t).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_column_overrides() {
        let t = table(&["Probe", "Name", "ILMN_Gene"], &[&["X1", "ignored", "STAT3"]]);
        let map = ColumnResolver::new()
            .with_probe_column(Some("Probe".to_string()))
            .with_symbol_column(Some("ILMN_Gene".to_string()))
            .resolve("GPL11", &t)
            .unwrap();

        assert_eq!(map.get("X1"), Some("STAT3"));

        let err = ColumnResolver::new()
            .with_symbol_column(Some("Missing".to_string()))
            .resolve("GPL11", &t)
            .unwrap_err();
        assert!(matches!(err, AnnotationError::SchemaResolution { .. }));
    }
}
