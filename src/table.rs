use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::{
    reader::{open_path_stream, Compression, ReaderError, ReaderResult},
    site::SiteCall,
};

/// Probability above which a site counts as modified.
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Header columns a probability table must carry. Any other column is ignored.
pub const REQUIRED_COLUMNS: [&str; 3] =
    ["transcript_id", "transcript_position", "probability_modified"];

/// Options for reading a probability table.
///
/// # Example
///
/// ```
/// use exonsite::table::TableOptions;
///
/// let options = TableOptions::new().delimiter(b'\t');
/// assert_eq!(options.resolved_delimiter(None), b'\t');
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions {
    delimiter: Option<u8>,
    compression: Compression,
}

impl TableOptions {
    /// Creates options with defaults: delimiter from the file extension,
    /// compression from the file extension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the field delimiter.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Sets the compression format of the input.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Returns the delimiter to use for `path`.
    ///
    /// Comma unless the path ends in `.tsv` or `.tab` (before any
    /// compression extension) or a delimiter was set explicitly.
    pub fn resolved_delimiter(&self, path: Option<&Path>) -> u8 {
        if let Some(delimiter) = self.delimiter {
            return delimiter;
        }
        let Some(path) = path else {
            return b',';
        };

        let mut path = path.to_path_buf();
        if Compression::from_extension(&path) != Compression::None {
            path.set_extension("");
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("tsv") | Some("tab") => b'\t',
            _ => b',',
        }
    }
}

/// One validated row of a probability table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    /// Transcript identifier.
    pub transcript_id: String,
    /// 1-based position inside the spliced transcript.
    pub transcript_position: u64,
    /// Modification probability, within `[0, 1]`.
    pub probability_modified: f64,
}

impl ProbabilityRow {
    /// Returns the row as a modification call.
    pub fn to_call(&self) -> SiteCall {
        SiteCall::new(self.transcript_id.clone(), self.transcript_position)
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    transcript_id: Option<String>,
    transcript_position: Option<String>,
    probability_modified: Option<String>,
}

/// A probability table held in memory, in file order.
///
/// # Example
///
/// ```rust,no_run
/// use exonsite::ProbabilityTable;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let table = ProbabilityTable::from_path("data.site_proba.csv")?;
///     for call in table.methylated_sites(0.9) {
///         println!("{}\t{}", call.transcript_id, call.position);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityTable {
    rows: Vec<ProbabilityRow>,
}

impl ProbabilityTable {
    /// Reads a table from a path with default options.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::from_path_with(path, TableOptions::default())
    }

    /// Reads a table from a path.
    pub fn from_path_with<P: AsRef<Path>>(path: P, options: TableOptions) -> ReaderResult<Self> {
        let path = path.as_ref();
        let stream = open_path_stream(path, options.compression)?;
        let delimiter = options.resolved_delimiter(Some(path));
        let table = Self::parse(stream, delimiter)?;
        log::info!(
            "read {} probability rows from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Reads a table from any `Read` implementation. The delimiter defaults
    /// to a comma.
    pub fn from_reader<R: Read>(reader: R, options: TableOptions) -> ReaderResult<Self> {
        Self::parse(reader, options.resolved_delimiter(None))
    }

    /// Wraps already validated rows.
    pub fn from_rows(rows: Vec<ProbabilityRow>) -> Self {
        Self { rows }
    }

    fn parse<R: Read>(reader: R, delimiter: u8) -> ReaderResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|header| header == **column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ReaderError::MissingColumns { columns: missing });
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let line = record
                .position()
                .map_or(rows.len() + 2, |position| position.line() as usize);
            let raw: RawRow = record.deserialize(Some(&headers))?;
            rows.push(validate(raw, line)?);
        }

        Ok(Self { rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row, in file order.
    pub fn rows(&self) -> &[ProbabilityRow] {
        &self.rows
    }

    /// Returns the calls whose probability is strictly greater than
    /// `threshold`, in file order.
    pub fn methylated_sites(&self, threshold: f64) -> Vec<SiteCall> {
        self.rows
            .iter()
            .filter(|row| row.probability_modified > threshold)
            .map(ProbabilityRow::to_call)
            .collect()
    }
}

fn validate(raw: RawRow, line: usize) -> ReaderResult<ProbabilityRow> {
    let transcript_id = required(raw.transcript_id, "transcript_id", line)?;

    let position = required(raw.transcript_position, "transcript_position", line)?;
    let transcript_position = position.parse::<u64>().map_err(|_| {
        ReaderError::invalid_field(
            line,
            "transcript_position",
            format!("ERROR: could not parse '{position}' as integer"),
        )
    })?;

    let probability = required(raw.probability_modified, "probability_modified", line)?;
    let probability_modified = probability
        .parse::<f64>()
        .ok()
        .filter(|value| (0.0..=1.0).contains(value))
        .ok_or_else(|| {
            ReaderError::invalid_field(
                line,
                "probability_modified",
                format!("ERROR: '{probability}' is not a probability in [0, 1]"),
            )
        })?;

    Ok(ProbabilityRow {
        transcript_id,
        transcript_position,
        probability_modified,
    })
}

fn required(value: Option<String>, field: &'static str, line: usize) -> ReaderResult<String> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ReaderError::invalid_field(line, field, "ERROR: empty value".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "transcript_id,transcript_position,n_reads,probability_modified,kmer,mod_ratio
AT1G01020.4,426,30,0.966,GGACT,0.5
AT1G01020.4,860,25,0.966,AGACA,0.4
AT1G01010.1,3,21,0.066,TGACC,0.0
AT1G01010.1,9,40,0.066,GAACT,0.0
";

    #[test]
    fn keeps_rows_strictly_above_threshold() {
        let table = ProbabilityTable::from_reader(TABLE.as_bytes(), TableOptions::new()).unwrap();
        assert_eq!(table.len(), 4);
        let calls = table.methylated_sites(DEFAULT_THRESHOLD);
        assert_eq!(
            calls,
            vec![
                SiteCall::new("AT1G01020.4", 426),
                SiteCall::new("AT1G01020.4", 860)
            ]
        );
        assert!(table.methylated_sites(0.966).is_empty());
    }

    #[test]
    fn reports_every_missing_column() {
        let err = ProbabilityTable::from_reader(
            "transcript_id,score\nA.1,1\n".as_bytes(),
            TableOptions::new(),
        )
        .unwrap_err();
        match err {
            ReaderError::MissingColumns { columns } => assert_eq!(
                columns,
                vec!["transcript_position", "probability_modified"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let data = "transcript_id,transcript_position,probability_modified\nA.1,1,0.5\nA.1,2,1.5\n";
        let err = ProbabilityTable::from_reader(data.as_bytes(), TableOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::InvalidField {
                line: 3,
                field: "probability_modified",
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_and_non_integer_fields() {
        let empty = "transcript_id,transcript_position,probability_modified\n,1,0.5\n";
        assert!(matches!(
            ProbabilityTable::from_reader(empty.as_bytes(), TableOptions::new()),
            Err(ReaderError::InvalidField {
                field: "transcript_id",
                ..
            })
        ));

        let float = "transcript_id,transcript_position,probability_modified\nA.1,1.5,0.5\n";
        assert!(matches!(
            ProbabilityTable::from_reader(float.as_bytes(), TableOptions::new()),
            Err(ReaderError::InvalidField {
                field: "transcript_position",
                ..
            })
        ));
    }

    #[test]
    fn delimiter_follows_extension() {
        let options = TableOptions::new();
        assert_eq!(options.resolved_delimiter(Some(Path::new("a.csv"))), b',');
        assert_eq!(options.resolved_delimiter(Some(Path::new("a.tsv"))), b'\t');
        assert_eq!(options.resolved_delimiter(Some(Path::new("a.tab.gz"))), b'\t');
        assert_eq!(
            TableOptions::new()
                .delimiter(b';')
                .resolved_delimiter(Some(Path::new("a.tsv"))),
            b';'
        );
    }
}
