use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

#[cfg(feature = "bz2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "gzip")]
use flate2::read::MultiGzDecoder;
#[cfg(feature = "mmap")]
use memchr::memchr;
#[cfg(feature = "mmap")]
use memmap2::MmapOptions;
#[cfg(feature = "zstd")]
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::gxf::{Feature, FeatureStore};

/// Shorthand for results of reading gene models and probability tables.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// An error that can occur when reading a gene-model file or a probability table.
#[derive(Debug)]
pub enum ReaderError {
    /// An I/O error.
    Io(io::Error),
    /// Mapping the file into memory failed.
    #[cfg(feature = "mmap")]
    Mmap(io::Error),
    /// A column held a value that could not be interpreted.
    InvalidField {
        /// 1-based line of the offending record.
        line: usize,
        /// Column name.
        field: &'static str,
        /// What was wrong with the value.
        message: String,
    },
    /// A record had fewer columns than the format requires.
    UnexpectedFieldCount {
        /// 1-based line of the offending record.
        line: usize,
        /// Minimum number of columns.
        expected: usize,
        /// Columns found on the line.
        actual: usize,
    },
    /// A feature interval is not 1-based or ends before it starts.
    InvalidInterval {
        /// Requested start.
        start: u64,
        /// Requested end.
        end: u64,
    },
    /// A delimited table lacks required header columns.
    MissingColumns {
        /// Every required column absent from the header, in declaration order.
        columns: Vec<String>,
    },
    /// An error raised by the delimited-table parser.
    Csv(csv::Error),
    /// The reader configuration cannot be honoured.
    Builder(String),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Io(err) => write!(f, "could not read input: {err}"),
            #[cfg(feature = "mmap")]
            ReaderError::Mmap(err) => write!(f, "could not map input: {err}"),
            ReaderError::InvalidField {
                line,
                field,
                message,
            } => write!(f, "line {line}, column {field}: {message}"),
            ReaderError::UnexpectedFieldCount {
                line,
                expected,
                actual,
            } => write!(f, "line {line}: expected {expected} columns, found {actual}"),
            ReaderError::InvalidInterval { start, end } => {
                write!(f, "invalid interval {start}-{end}: coordinates are 1-based and inclusive")
            }
            ReaderError::MissingColumns { columns } => {
                write!(f, "missing required column(s): {}", columns.join(", "))
            }
            ReaderError::Csv(err) => write!(f, "table error: {err}"),
            ReaderError::Builder(msg) => write!(f, "reader configuration: {msg}"),
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReaderError::Io(err) => Some(err),
            #[cfg(feature = "mmap")]
            ReaderError::Mmap(err) => Some(err),
            ReaderError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ReaderError {
    fn from(err: io::Error) -> Self {
        ReaderError::Io(err)
    }
}

impl From<csv::Error> for ReaderError {
    fn from(err: csv::Error) -> Self {
        ReaderError::Csv(err)
    }
}

impl ReaderError {
    /// Builds an `InvalidField` error.
    pub(crate) fn invalid_field(line: usize, field: &'static str, message: String) -> ReaderError {
        ReaderError::InvalidField {
            line,
            field,
            message,
        }
    }

    /// Builds an `UnexpectedFieldCount` error.
    pub(crate) fn unexpected_field_count(
        line: usize,
        expected: usize,
        actual: usize,
    ) -> ReaderError {
        ReaderError::UnexpectedFieldCount {
            line,
            expected,
            actual,
        }
    }
}

/// How a gene-model file is pulled into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Stream through a buffered reader (default).
    Default,
    /// Map the whole file and scan it in place. Needs the `mmap` feature and
    /// an uncompressed file on disk.
    Mmap,
}

/// Compression codec of an input.
///
/// Each codec needs its cargo feature (`gzip`, `zstd`, `bz2`); requesting a
/// codec that was not compiled in is reported as a builder error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Pick the codec from the file extension (default).
    #[default]
    Auto,
    /// Plain text.
    None,
    /// gzip / bgzip.
    Gzip,
    /// Zstandard.
    Zstd,
    /// bzip2.
    Bzip2,
}

impl Compression {
    /// Maps `.gz`, `.zst`/`.zstd` and `.bz2`/`.bzip2` to their codec; anything
    /// else is plain text.
    pub fn from_extension(path: &Path) -> Compression {
        match path.extension().and_then(|ext| ext.to_str()).unwrap_or("") {
            "gz" => Compression::Gzip,
            "zst" | "zstd" => Compression::Zstd,
            "bz2" | "bzip2" => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// Opens a path as a (possibly decompressing) stream.
pub(crate) fn open_path_stream(
    path: &Path,
    compression: Compression,
) -> ReaderResult<Box<dyn Read + Send>> {
    let compression = match compression {
        Compression::Auto => Compression::from_extension(path),
        other => other,
    };
    let file = File::open(path)?;

    match compression {
        Compression::None | Compression::Auto => Ok(Box::new(file)),
        Compression::Gzip => {
            #[cfg(feature = "gzip")]
            {
                Ok(Box::new(MultiGzDecoder::new(file)))
            }
            #[cfg(not(feature = "gzip"))]
            {
                drop(file);
                Err(ReaderError::Builder(
                    "ERROR: reading gzip input needs the `gzip` feature".into(),
                ))
            }
        }
        Compression::Zstd => {
            #[cfg(feature = "zstd")]
            {
                Ok(Box::new(ZstdDecoder::new(file)?))
            }
            #[cfg(not(feature = "zstd"))]
            {
                drop(file);
                Err(ReaderError::Builder(
                    "ERROR: reading zstd input needs the `zstd` feature".into(),
                ))
            }
        }
        Compression::Bzip2 => {
            #[cfg(feature = "bz2")]
            {
                Ok(Box::new(BzDecoder::new(file)))
            }
            #[cfg(not(feature = "bz2"))]
            {
                drop(file);
                Err(ReaderError::Builder(
                    "ERROR: reading bzip2 input needs the `bz2` feature".into(),
                ))
            }
        }
    }
}

/// Configures and opens a `Reader`.
///
/// # Example
///
/// ```rust,no_run
/// use exonsite::{Reader, ReaderMode};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let reader = Reader::builder()
///         .from_path("tests/data/test.gtf")
///         .mode(ReaderMode::Default)
///         .buffer_capacity(128 * 1024)
///         .build()?;
///
///     for feature in reader {
///         let feature = feature?;
///         println!("{} {}-{}", feature.feature_type(), feature.start(), feature.end());
///     }
///
///     Ok(())
/// }
/// ```
pub struct ReaderBuilder {
    source: Option<ReaderSource>,
    mode: ReaderMode,
    buffer_capacity: usize,
    compression: Compression,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            source: None,
            mode: ReaderMode::Default,
            buffer_capacity: 64 * 1024,
            compression: Compression::default(),
        }
    }
}

impl ReaderBuilder {
    /// Reads from a filesystem path.
    pub fn from_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(ReaderSource::Path(path.as_ref().into()));
        self
    }

    /// Reads from an arbitrary reader.
    pub fn from_reader<T>(mut self, reader: T) -> Self
    where
        T: Read + Send + 'static,
    {
        self.source = Some(ReaderSource::Reader(Box::new(reader)));
        self
    }

    /// Sets the reading mode.
    pub fn mode(mut self, mode: ReaderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Capacity of the line buffer in bytes (64 KiB by default, at least 8 KiB).
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(8 * 1024);
        self
    }

    /// Overrides codec detection.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Builds the `Reader`.
    pub fn build(mut self) -> ReaderResult<Reader> {
        let source = self.source.take().ok_or_else(|| {
            ReaderError::Builder("ERROR: call from_path or from_reader before build".into())
        })?;

        match source {
            ReaderSource::Path(path) => match self.mode {
                ReaderMode::Default => {
                    let stream = open_path_stream(&path, self.compression)?;
                    Ok(Reader::from_stream(stream, self.buffer_capacity))
                }
                ReaderMode::Mmap => {
                    #[cfg(feature = "mmap")]
                    {
                        Reader::from_mmap(path)
                    }
                    #[cfg(not(feature = "mmap"))]
                    {
                        drop(path);
                        Err(ReaderError::Builder(
                            "ERROR: mmap mode needs the `mmap` feature".into(),
                        ))
                    }
                }
            },
            ReaderSource::Reader(reader) => match self.mode {
                ReaderMode::Default => Ok(Reader::from_stream(reader, self.buffer_capacity)),
                ReaderMode::Mmap => Err(ReaderError::Builder(
                    "ERROR: mmap mode cannot read from a stream".into(),
                )),
            },
        }
    }
}

/// Reader source
enum ReaderSource {
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
}

/// Inner reader source
enum InnerSource {
    Buffered(BufReader<Box<dyn Read + Send>>),
    #[cfg(feature = "mmap")]
    Mmap(MmapInner),
}

/// Inner mmap reader source
#[cfg(feature = "mmap")]
struct MmapInner {
    data: memmap2::Mmap,
    cursor: usize,
}

/// A streaming reader of gene-model (GTF/GFF) records.
///
/// Lines are decoded permissively: invalid UTF-8 sequences are replaced
/// instead of aborting the parse. Comment lines (`#`) and blank lines are
/// skipped, and reading stops at a GFF3 `##FASTA` section.
///
/// # Example
///
/// ```rust,no_run
/// use exonsite::Reader;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Reader::from_path("tests/data/test.gtf")?.into_store()?;
///     println!("{} exon records", store.exons().count());
///     Ok(())
/// }
/// ```
pub struct Reader {
    inner: InnerSource,
    buffer: Vec<u8>,
    line_number: usize,
    finished: bool,
}

impl Reader {
    /// Starts a `ReaderBuilder`.
    pub fn builder() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Creates a new `Reader` from a path, detecting compression from the
    /// file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        Self::builder().from_path(path).build()
    }

    /// Creates a new `Reader` from any `Read` implementation.
    pub fn from_reader<T>(reader: T) -> ReaderResult<Self>
    where
        T: Read + Send + 'static,
    {
        Self::builder().from_reader(reader).build()
    }

    /// Creates a new `Reader` backed by a memory-mapped file.
    #[cfg(feature = "mmap")]
    pub fn from_mmap<P: AsRef<Path>>(path: P) -> ReaderResult<Self> {
        let path = path.as_ref();
        if !matches!(Compression::from_extension(path), Compression::None) {
            return Err(ReaderError::Builder(
                "ERROR: compressed files cannot be memory-mapped".into(),
            ));
        }

        let file = File::open(path)?;
        let map = unsafe { MmapOptions::new().map(&file) }.map_err(ReaderError::Mmap)?;

        Ok(Self {
            inner: InnerSource::Mmap(MmapInner {
                data: map,
                cursor: 0,
            }),
            buffer: Vec::with_capacity(1024),
            line_number: 0,
            finished: false,
        })
    }

    pub(crate) fn from_stream(stream: Box<dyn Read + Send>, capacity: usize) -> Self {
        Self {
            inner: InnerSource::Buffered(BufReader::with_capacity(capacity, stream)),
            buffer: Vec::with_capacity(1024),
            line_number: 0,
            finished: false,
        }
    }

    /// Returns the number of the last line read (1-based).
    pub fn current_line(&self) -> usize {
        self.line_number
    }

    /// Returns an iterator over the features of the file.
    pub fn features(&mut self) -> Features<'_> {
        Features { reader: self }
    }

    /// Reads every remaining feature into a `FeatureStore`.
    ///
    /// The first malformed record aborts the read; no partial store is
    /// returned.
    pub fn into_store(mut self) -> ReaderResult<FeatureStore> {
        let mut store = FeatureStore::new();
        while let Some(feature) = self.next_feature() {
            store.push(feature?);
        }
        log::debug!(
            "read {} features from {} lines",
            store.len(),
            self.line_number
        );
        Ok(store)
    }

    fn next_feature(&mut self) -> Option<ReaderResult<Feature>> {
        if self.finished {
            return None;
        }

        loop {
            match self.fill_buffer() {
                Ok(true) => {
                    self.line_number += 1;
                    let line = String::from_utf8_lossy(&self.buffer);
                    if line.starts_with("##FASTA") {
                        self.finished = true;
                        return None;
                    }
                    if is_comment_or_blank(&line) {
                        continue;
                    }
                    return Some(Feature::parse(&line, self.line_number));
                }
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }

    /// Fills the buffer with the next raw line, without its line terminator.
    fn fill_buffer(&mut self) -> ReaderResult<bool> {
        self.buffer.clear();
        match &mut self.inner {
            InnerSource::Buffered(reader) => {
                if reader.read_until(b'\n', &mut self.buffer)? == 0 {
                    return Ok(false);
                }
            }
            #[cfg(feature = "mmap")]
            InnerSource::Mmap(inner) => {
                if inner.cursor >= inner.data.len() {
                    return Ok(false);
                }
                let data = &inner.data[inner.cursor..];
                let advance = memchr(b'\n', data).map_or(data.len(), |idx| idx + 1);
                self.buffer.extend_from_slice(&data[..advance]);
                inner.cursor += advance;
            }
        }
        trim_line(&mut self.buffer);
        Ok(true)
    }
}

impl Iterator for Reader {
    type Item = ReaderResult<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_feature()
    }
}

/// An iterator over the features in a `Reader`.
///
/// This struct is created by the `features` method on `Reader`.
pub struct Features<'a> {
    reader: &'a mut Reader,
}

impl<'a> Iterator for Features<'a> {
    type Item = ReaderResult<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_feature()
    }
}

/// Removes the trailing line terminator (`\n` or `\r\n`).
fn trim_line(buffer: &mut Vec<u8>) {
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
    }
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}
