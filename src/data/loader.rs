use crate::data::{is_missing, ExpressionMatrix, ExpressionRow, PlatformTable};
use crate::error::{AnnotationError, Result};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path; anything unrecognised is read as tab-delimited
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase());
        let stem = path.file_stem().and_then(|s| s.to_str()).map(|s| s.to_lowercase());

        match (ext.as_deref(), stem.as_deref()) {
            (Some("gz"), Some(stem)) if stem.ends_with(".csv") => FileFormat::GzippedCsv,
            (Some("gz"), _) => FileFormat::GzippedTsv,
            (Some("csv"), _) => FileFormat::Csv,
            _ => FileFormat::Tsv,
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }
}

/// Table loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Comment prefix skipped in platform tables (GEO preamble lines)
    pub platform_comment: Option<char>,
    /// Comment prefix skipped in expression tables (series matrix metadata lines)
    pub expression_comment: Option<char>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            platform_comment: Some('#'),
            expression_comment: Some('!'),
        }
    }
}

impl LoaderConfig {
    /// Comment prefixes must be single ASCII characters
    pub fn is_valid(&self) -> bool {
        [self.platform_comment, self.expression_comment]
            .iter()
            .flatten()
            .all(char::is_ascii)
    }
}

fn comment_byte(prefix: Option<char>) -> Option<u8> {
    prefix.filter(char::is_ascii).map(|c| c as u8)
}

/// Loader for platform annotation tables and expression matrices
pub struct TableLoader {
    config: LoaderConfig,
}

impl TableLoader {
    /// Create new loader with default config
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Create new loader with custom config
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load a raw platform annotation table
    pub fn load_platform<P: AsRef<Path>>(&self, path: P) -> Result<PlatformTable> {
        let path = path.as_ref();
        info!("Loading platform table from {:?}", path);

        let format = FileFormat::from_path(path);
        debug!("Detected file format: {:?}", format);

        let table = self.parse_platform(open(path, format)?, format)?;
        info!(
            "Loaded platform table with {} rows and {} columns",
            table.n_rows(),
            table.columns.len()
        );
        Ok(table)
    }

    /// Load a probe × sample expression matrix
    pub fn load_expression<P: AsRef<Path>>(&self, path: P) -> Result<ExpressionMatrix> {
        let path = path.as_ref();
        info!("Loading expression matrix from {:?}", path);

        let format = FileFormat::from_path(path);
        debug!("Detected file format: {:?}", format);

        let matrix = self.parse_expression(open(path, format)?, format)?;
        info!(
            "Loaded expression matrix: {} probes x {} samples",
            matrix.n_probes(),
            matrix.n_samples()
        );

        debug!("{} missing expression cells", matrix.missing_count());

        let duplicates = matrix.duplicate_probe_count();
        if duplicates > 0 {
            warn!("{} duplicate probe rows kept as separate entries", duplicates);
        }
        Ok(matrix)
    }

    /// Parse a platform table from reader
    pub fn parse_platform<R: Read>(&self, reader: R, format: FileFormat) -> Result<PlatformTable> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(false)
            .flexible(true)
            .comment(comment_byte(self.config.platform_comment))
            .from_reader(reader);

        let mut records = csv_reader.records();
        let columns = match next_non_blank(&mut records)? {
            Some(header) => header.iter().map(|c| c.trim().to_string()).collect(),
            None => {
                warn!("Platform table is empty");
                return Ok(PlatformTable::default());
            }
        };

        let mut rows = Vec::new();
        while let Some(record) = next_non_blank(&mut records)? {
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(PlatformTable::new(columns, rows))
    }

    /// Parse an expression matrix from reader
    pub fn parse_expression<R: Read>(
        &self,
        reader: R,
        format: FileFormat,
    ) -> Result<ExpressionMatrix> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(false)
            .flexible(true)
            .comment(comment_byte(self.config.expression_comment))
            .from_reader(reader);

        let mut records = csv_reader.records();
        let header: Vec<String> = match next_non_blank(&mut records)? {
            Some(header) => header.iter().map(|c| c.trim().to_string()).collect(),
            None => {
                return Err(AnnotationError::MalformedMatrix {
                    row: 1,
                    column: 1,
                    reason: "missing header row".to_string(),
                })
            }
        };

        let mut rows = Vec::new();
        let mut width: Option<usize> = None;

        while let Some(record) = next_non_blank(&mut records)? {
            let line = line_of(&record, rows.len() + 2);
            let expected = *width.get_or_insert(record.len());
            if record.len() != expected {
                return Err(AnnotationError::MalformedMatrix {
                    row: line,
                    column: record.len().min(expected) + 1,
                    reason: format!("expected {} fields, found {}", expected, record.len()),
                });
            }

            let probe_id = record.get(0).unwrap_or("").trim().to_string();
            if probe_id.is_empty() {
                return Err(AnnotationError::MalformedMatrix {
                    row: line,
                    column: 1,
                    reason: "empty probe identifier".to_string(),
                });
            }

            let values = record
                .iter()
                .enumerate()
                .skip(1)
                .map(|(col, cell)| {
                    parse_value(cell).ok_or_else(|| AnnotationError::MalformedMatrix {
                        row: line,
                        column: col + 1,
                        reason: format!("cannot parse '{}' as an expression value", cell.trim()),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            rows.push(ExpressionRow { probe_id, values });
        }

        let sample_ids = sample_ids_from_header(header, width)?;
        ExpressionMatrix::new(sample_ids, rows)
    }
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one expression cell: `Some(None)` for a missing marker, `None` if unparseable
pub(crate) fn parse_value(cell: &str) -> Option<Option<f64>> {
    if is_missing(cell) {
        return Some(None);
    }
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
}

fn open(path: &Path, format: FileFormat) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if format.is_gzipped() {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn next_non_blank<R: Read>(
    records: &mut csv::StringRecordsIter<'_, R>,
) -> Result<Option<StringRecord>> {
    for result in records.by_ref() {
        let record = result?;
        if record.iter().any(|c| !c.trim().is_empty()) {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

fn line_of(record: &StringRecord, fallback: usize) -> usize {
    record
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(fallback)
}

/// Sample IDs are the header minus its first cell, unless the header is one
/// cell short of the data rows (row-name style), in which case all of it
fn sample_ids_from_header(header: Vec<String>, width: Option<usize>) -> Result<Vec<String>> {
    let width = width.unwrap_or(header.len());
    if header.len() == width {
        Ok(header.into_iter().skip(1).collect())
    } else if header.len() + 1 == width {
        Ok(header)
    } else {
        Err(AnnotationError::MalformedMatrix {
            row: 1,
            column: header.len().min(width) + 1,
            reason: format!(
                "header has {} fields but data rows have {}",
                header.len(),
                width
            ),
        })
    }
}
