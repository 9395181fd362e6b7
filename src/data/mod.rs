pub mod loader;
pub mod platform;

use crate::error::{AnnotationError, Result};
use std::collections::{HashMap, HashSet};

/// Cell values treated as "no value" in both platform and expression tables
pub const MISSING_TOKENS: &[&str] = &["NA", "NaN"];

/// Probe identifier column names, in order of preference
pub const PROBE_ID_ALIASES: &[&str] = &["ID", "ID_REF", "Probe_ID", "ProbeID", "Probe Set ID"];

/// Gene symbol column names, in order of preference
pub const GENE_SYMBOL_CANDIDATES: &[&str] =
    &["Gene Symbol", "Symbol", "Gene_Symbol", "GENE_SYMBOL"];

/// Header of the probe column in annotated exports
pub const PROBE_ID_HEADER: &str = "Probe_ID";

/// Header of the gene symbol column in annotated exports
pub const GENE_SYMBOL_HEADER: &str = "Gene_Symbol";

/// Check whether a trimmed cell denotes a missing value
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_TOKENS.iter().any(|t| cell.eq_ignore_ascii_case(t))
}

/// Raw platform annotation table, schema unknown until resolved
#[derive(Debug, Clone, Default)]
pub struct PlatformTable {
    /// Column names in file order
    pub columns: Vec<String>,
    /// Rows of raw cells; may be shorter than `columns`
    pub rows: Vec<Vec<String>>,
}

impl PlatformTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Canonical probe → gene symbol lookup for one platform.
///
/// Immutable once built; an empty symbol means the probe is unannotated.
#[derive(Debug, Clone)]
pub struct ProbeGeneMap {
    platform: String,
    probe_column: String,
    symbol_column: String,
    symbols: HashMap<String, String>,
}

impl ProbeGeneMap {
    pub(crate) fn new(
        platform: String,
        probe_column: String,
        symbol_column: String,
        symbols: HashMap<String, String>,
    ) -> Self {
        Self {
            platform,
            probe_column,
            symbol_column,
            symbols,
        }
    }

    /// Build a map directly from (probe, symbol) pairs; later pairs overwrite earlier ones
    pub fn from_pairs<I, P, S>(platform: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<String>,
        S: AsRef<str>,
    {
        let symbols = pairs
            .into_iter()
            .map(|(probe, symbol)| (probe.into(), normalize_symbol(symbol.as_ref())))
            .collect();

        Self::new(
            platform.to_string(),
            PROBE_ID_HEADER.to_string(),
            GENE_SYMBOL_HEADER.to_string(),
            symbols,
        )
    }

    /// Platform identifier this map was built for
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Name of the column probe IDs were read from
    pub fn probe_column(&self) -> &str {
        &self.probe_column
    }

    /// Name of the column gene symbols were read from
    pub fn symbol_column(&self) -> &str {
        &self.symbol_column
    }

    /// Mapped symbol for a probe; `Some("")` for a known but unannotated probe
    pub fn get(&self, probe_id: &str) -> Option<&str> {
        self.symbols.get(probe_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Number of probes carrying a non-empty symbol
    pub fn annotated_len(&self) -> usize {
        self.symbols.values().filter(|s| !s.is_empty()).count()
    }
}

/// Trim a symbol cell, mapping missing markers to the empty string
pub(crate) fn normalize_symbol(cell: &str) -> String {
    if is_missing(cell) {
        String::new()
    } else {
        cell.trim().to_string()
    }
}

/// One probe row of an expression matrix; `None` marks a missing value
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRow {
    pub probe_id: String,
    pub values: Vec<Option<f64>>,
}

/// Probe × sample expression matrix in file order.
///
/// Probe IDs are not required to be unique: duplicated probes are kept as
/// separate rows.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    sample_ids: Vec<String>,
    rows: Vec<ExpressionRow>,
}

impl ExpressionMatrix {
    /// Create a matrix, checking that every row has one value per sample
    pub fn new(sample_ids: Vec<String>, rows: Vec<ExpressionRow>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.values.len() != sample_ids.len() {
                return Err(AnnotationError::MalformedMatrix {
                    row: idx + 1,
                    column: row.values.len().min(sample_ids.len()) + 2,
                    reason: format!(
                        "probe {} has {} values, expected {}",
                        row.probe_id,
                        row.values.len(),
                        sample_ids.len()
                    ),
                });
            }
        }

        Ok(Self { sample_ids, rows })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn rows(&self) -> &[ExpressionRow] {
        &self.rows
    }

    pub fn n_probes(&self) -> usize {
        self.rows.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of rows whose probe ID already appeared earlier in the matrix
    pub fn duplicate_probe_count(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows
            .iter()
            .filter(|row| !seen.insert(row.probe_id.as_str()))
            .count()
    }

    /// Number of missing cells across the matrix
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.values.iter().filter(|v| v.is_none()).count())
            .sum()
    }
}

/// One retained row: probe, its non-empty symbol, and values in sample order
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRow {
    pub probe_id: String,
    pub gene_symbol: String,
    pub values: Vec<Option<f64>>,
}

/// Expression rows that survived annotation filtering
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotatedMatrix {
    /// Sample IDs, same order as the source matrix
    pub sample_ids: Vec<String>,
    /// Retained rows in source order
    pub rows: Vec<AnnotatedRow>,
}

impl AnnotatedMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Count of distinct gene symbols
    pub fn unique_genes(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.gene_symbol.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Export header: Probe_ID, Gene_Symbol, then samples
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.sample_ids.len() + 2);
        header.push(PROBE_ID_HEADER.to_string());
        header.push(GENE_SYMBOL_HEADER.to_string());
        header.extend(self.sample_ids.iter().cloned());
        header
    }
}
