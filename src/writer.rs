use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::write::GzEncoder;
#[cfg(feature = "gzip")]
use flate2::Compression as GzCompression;

use crate::{
    site::{AnnotatedSite, ExonAssignment, GeneExonCount},
    summary::{CategoryCounts, TranscriptRatio, TranscriptSummary},
};

/// Shorthand for results of writing output tables.
pub type WriterResult<T> = Result<T, WriterError>;

/// Failure to emit an output table.
#[derive(Debug)]
pub enum WriterError {
    /// The sink rejected a write.
    Io(io::Error),
    /// The output needs a cargo feature that is not compiled in.
    Unsupported(String),
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::Io(err) => write!(f, "could not write output: {err}"),
            WriterError::Unsupported(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for WriterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriterError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WriterError {
    fn from(err: io::Error) -> Self {
        WriterError::Io(err)
    }
}

/// Annotated-site table, one row per modification call.
#[derive(Debug, Clone, Copy)]
pub struct SiteTable;

/// Per-transcript site category counts, closed by an `Overall` row.
#[derive(Debug, Clone, Copy)]
pub struct SummaryTable;

/// Per-transcript modification ratios of one condition.
#[derive(Debug, Clone, Copy)]
pub struct RatioTable;

/// A generic writer for emitting records as tab-separated tables.
///
/// # Example
///
/// ```
/// use exonsite::{AnnotatedSite, ExonAssignment, GeneExonCount, SiteTable, Writer};
///
/// let site = AnnotatedSite {
///     transcript_id: "AT1G01020.4".into(),
///     position: 426,
///     exon: ExonAssignment::Exon(4),
///     total_exons_in_transcript: Some(7),
///     total_exons_in_gene: GeneExonCount::Known(8),
///     is_last_exon: false,
/// };
///
/// let mut buf = Vec::new();
/// Writer::<SiteTable>::from_records(&[site], &mut buf).unwrap();
/// let text = String::from_utf8(buf).unwrap();
/// assert!(text.ends_with("AT1G01020.4\t426\t4\t7\t8\tfalse\n"));
/// ```
pub struct Writer<F> {
    _marker: PhantomData<F>,
}

impl<F> Writer<F>
where
    F: TargetFormat,
{
    /// Writes a single record, without header.
    pub fn from_record<W: Write>(record: &F::Record, writer: &mut W) -> WriterResult<()> {
        F::write_record(record, writer)
    }

    /// Writes the header, every record and the closing rows of the format.
    pub fn from_records<W: Write>(records: &[F::Record], writer: &mut W) -> WriterResult<()> {
        write_header(F::HEADER, writer)?;
        for record in records {
            F::write_record(record, writer)?;
        }
        F::write_footer(records, writer)
    }

    /// Creates `path` and writes the full table to it. A `.gz` path is
    /// gzip-compressed, which needs the `gzip` feature.
    pub fn to_path<P: AsRef<Path>>(path: P, records: &[F::Record]) -> WriterResult<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;

        #[cfg(feature = "gzip")]
        let sink: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzEncoder::new(file, GzCompression::fast()))
        } else {
            Box::new(file)
        };

        #[cfg(not(feature = "gzip"))]
        let sink: Box<dyn Write> = {
            if path.extension().is_some_and(|ext| ext == "gz") {
                return Err(WriterError::Unsupported(
                    "enable the `gzip` feature to write gzip outputs".into(),
                ));
            }
            Box::new(file)
        };

        let mut writer = BufWriter::with_capacity(64 * 1024, sink);
        Self::from_records(records, &mut writer)?;
        writer.flush()?;
        log::info!("wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}

/// Derives one distinct name per input, used for output files and
/// condition labels.
///
/// A file stem no other input shares is used as is. Shared stems are prefixed
/// with their parent directory name, and names still equal after that get a
/// `_<n>` suffix in input order.
///
/// # Example
///
/// ```
/// use exonsite::unique_stems;
///
/// let names = unique_stems(&["vir_1/data.site_proba.csv", "vir_2/data.site_proba.csv"]);
/// assert_eq!(names, ["vir_1_data.site_proba", "vir_2_data.site_proba"]);
/// assert_eq!(unique_stems(&["wt.csv", "ko.tsv"]), ["wt", "ko"]);
/// ```
pub fn unique_stems<P: AsRef<Path>>(inputs: &[P]) -> Vec<String> {
    let stems: Vec<String> = inputs
        .iter()
        .map(|path| file_stem(path.as_ref()))
        .collect();

    let mut names = Vec::with_capacity(stems.len());
    for (path, stem) in inputs.iter().zip(&stems) {
        let shared = stems.iter().filter(|other| *other == stem).count() > 1;
        let name = match parent_name(path.as_ref()) {
            Some(parent) if shared => format!("{parent}_{stem}"),
            _ => stem.clone(),
        };
        names.push(name);
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *counts.entry(name.clone()).or_default() += 1;
    }
    let mut used: HashSet<String> = counts
        .iter()
        .filter(|(_, count)| **count == 1)
        .map(|(name, _)| name.clone())
        .collect();
    for name in names.iter_mut() {
        if counts[name.as_str()] == 1 {
            continue;
        }
        let mut n = 1;
        while used.contains(&format!("{name}_{n}")) {
            n += 1;
        }
        *name = format!("{name}_{n}");
        used.insert(name.clone());
    }
    names
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sites".to_string())
}

fn parent_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

/// Trait implemented by all supported output tables.
pub trait TargetFormat {
    /// The record type written as one row.
    type Record;

    /// Column names, in order.
    const HEADER: &'static [&'static str];

    /// Writes a single record as one tab-separated row.
    fn write_record<W: Write>(record: &Self::Record, writer: &mut W) -> WriterResult<()>;

    /// Writes rows that close the table. Nothing by default.
    fn write_footer<W: Write>(_records: &[Self::Record], _writer: &mut W) -> WriterResult<()> {
        Ok(())
    }
}

impl TargetFormat for SiteTable {
    type Record = AnnotatedSite;

    const HEADER: &'static [&'static str] = &[
        "transcript_id",
        "position",
        "exon_number",
        "total_exons_in_transcript",
        "total_exons_in_gene",
        "is_last_exon",
    ];

    /// Writes an annotated site; UTR sites carry the `UTR` and `unknown` sentinels.
    fn write_record<W: Write>(record: &AnnotatedSite, writer: &mut W) -> WriterResult<()> {
        writer.write_all(record.transcript_id.as_bytes())?;
        writer.write_all(b"\t")?;
        write_u64(writer, record.position)?;
        writer.write_all(b"\t")?;
        match record.exon {
            ExonAssignment::Exon(number) => write_u64(writer, number as u64)?,
            ExonAssignment::Utr => writer.write_all(b"UTR")?,
        }
        writer.write_all(b"\t")?;
        match record.total_exons_in_transcript {
            Some(count) => write_u64(writer, count as u64)?,
            None => writer.write_all(b"unknown")?,
        }
        writer.write_all(b"\t")?;
        match record.total_exons_in_gene {
            GeneExonCount::Known(count) => write_u64(writer, count as u64)?,
            GeneExonCount::Unknown => writer.write_all(b"unknown")?,
        }
        writer.write_all(b"\t")?;
        write_bool(writer, record.is_last_exon)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl TargetFormat for SummaryTable {
    type Record = TranscriptSummary;

    const HEADER: &'static [&'static str] = &[
        "transcript_id",
        "total_sites",
        "non_last_exon_sites",
        "last_exon_sites",
        "utr_sites",
    ];

    fn write_record<W: Write>(record: &TranscriptSummary, writer: &mut W) -> WriterResult<()> {
        write_counts(writer, &record.transcript_id, &record.counts)
    }

    /// Appends the `Overall` row with the column totals.
    fn write_footer<W: Write>(records: &[TranscriptSummary], writer: &mut W) -> WriterResult<()> {
        let mut total = CategoryCounts::default();
        for record in records {
            total += record.counts;
        }
        write_counts(writer, "Overall", &total)
    }
}

impl TargetFormat for RatioTable {
    type Record = TranscriptRatio;

    const HEADER: &'static [&'static str] = &[
        "transcript_id",
        "non_modified",
        "modified",
        "total_sites",
        "mod_ratio",
        "condition",
    ];

    fn write_record<W: Write>(record: &TranscriptRatio, writer: &mut W) -> WriterResult<()> {
        writer.write_all(record.transcript_id.as_bytes())?;
        writer.write_all(b"\t")?;
        write_u64(writer, record.non_modified as u64)?;
        writer.write_all(b"\t")?;
        write_u64(writer, record.modified as u64)?;
        writer.write_all(b"\t")?;
        write_u64(writer, record.total_sites() as u64)?;
        write!(writer, "\t{}\t", record.mod_ratio())?;
        writer.write_all(record.condition.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn write_header<W: Write>(columns: &[&str], writer: &mut W) -> WriterResult<()> {
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            writer.write_all(b"\t")?;
        }
        writer.write_all(column.as_bytes())?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn write_counts<W: Write>(
    writer: &mut W,
    label: &str,
    counts: &CategoryCounts,
) -> WriterResult<()> {
    writer.write_all(label.as_bytes())?;
    for value in [
        counts.total_sites,
        counts.non_last_exon_sites,
        counts.last_exon_sites,
        counts.utr_sites,
    ] {
        writer.write_all(b"\t")?;
        write_u64(writer, value as u64)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn write_bool<W: Write>(writer: &mut W, value: bool) -> io::Result<()> {
    let text: &[u8] = if value { b"true" } else { b"false" };
    writer.write_all(text)
}

fn write_u64<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    let mut buf = [0u8; 20];
    let mut idx = buf.len();
    if value == 0 {
        return writer.write_all(b"0");
    }
    while value > 0 {
        idx -= 1;
        buf[idx] = b'0' + (value % 10) as u8;
        value /= 10;
    }
    writer.write_all(&buf[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_u64_matches_display() {
        for value in [0u64, 7, 10, 426, u64::MAX] {
            let mut buf = Vec::new();
            write_u64(&mut buf, value).unwrap();
            assert_eq!(buf, value.to_string().into_bytes());
        }
    }

    #[test]
    fn same_path_twice_gets_numbered_names() {
        let names = unique_stems(&["run/data.csv", "run/data.csv", "data_1.csv"]);
        assert_eq!(names, ["run_data_1", "run_data_2", "data_1"]);

        let names = unique_stems(&["data.csv", "data.tsv"]);
        assert_eq!(names, ["data_1", "data_2"]);
    }

    #[test]
    fn header_is_tab_joined() {
        let mut buf = Vec::new();
        write_header(SummaryTable::HEADER, &mut buf).unwrap();
        assert_eq!(
            buf,
            b"transcript_id\ttotal_sites\tnon_last_exon_sites\tlast_exon_sites\tutr_sites\n"
        );
    }
}
