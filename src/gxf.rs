use std::fmt;

use memchr::{memchr, memchr3, memmem};

use crate::{
    reader::{ReaderError, ReaderResult},
    strand::Strand,
};

/// Number of tab-separated columns in a GTF/GFF record.
pub const GXF_FIELD_COUNT: usize = 9;

/// A single record of a gene-model (GTF/GFF) file.
///
/// Coordinates are kept exactly as written: 1-based and inclusive, with
/// `1 <= start <= end` guaranteed by every constructor. Only the columns the
/// coordinate builder needs are interpreted; score and frame are carried
/// through as raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    seqname: String,
    source: String,
    feature_type: String,
    start: u64,
    end: u64,
    score: String,
    strand: Strand,
    frame: String,
    attribute: String,
}

impl Feature {
    /// Creates a feature from its interpreted columns. Source, score and
    /// frame are set to `.`.
    ///
    /// # Example
    ///
    /// ```
    /// use exonsite::{Feature, Strand};
    ///
    /// let exon = Feature::new("1", "exon", 3631, 3913, Strand::Forward, "Parent=AT1G01010.1")
    ///     .unwrap();
    /// assert_eq!(exon.len(), 283);
    /// assert!(Feature::new("1", "exon", 10, 5, Strand::Forward, "").is_err());
    /// ```
    pub fn new<S, T, A>(
        seqname: S,
        feature_type: T,
        start: u64,
        end: u64,
        strand: Strand,
        attribute: A,
    ) -> ReaderResult<Self>
    where
        S: Into<String>,
        T: Into<String>,
        A: Into<String>,
    {
        if start == 0 || end < start {
            return Err(ReaderError::InvalidInterval { start, end });
        }

        Ok(Self {
            seqname: seqname.into(),
            source: ".".into(),
            feature_type: feature_type.into(),
            start,
            end,
            score: ".".into(),
            strand,
            frame: ".".into(),
            attribute: attribute.into(),
        })
    }

    /// Parses a single line of a GXF file into a `Feature`.
    ///
    /// # Arguments
    ///
    /// * `line` - The raw line from the GXF file, without its terminator.
    /// * `line_number` - The 1-based line number for error reporting.
    ///
    /// # Returns
    ///
    /// A `ReaderResult` containing the parsed `Feature`, or a `ReaderError`
    /// if the line has too few columns or non-integer coordinates.
    pub fn parse(line: &str, line_number: usize) -> ReaderResult<Self> {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < GXF_FIELD_COUNT {
            return Err(ReaderError::unexpected_field_count(
                line_number,
                GXF_FIELD_COUNT,
                fields.len(),
            ));
        }

        let start = parse_coordinate(fields[3], "start", line_number)?;
        let end = parse_coordinate(fields[4], "end", line_number)?;
        if end < start {
            return Err(ReaderError::invalid_field(
                line_number,
                "coordinates",
                format!("ERROR: end ({end}) must not be smaller than start ({start})"),
            ));
        }

        Ok(Self {
            seqname: fields[0].to_string(),
            source: fields[1].to_string(),
            feature_type: fields[2].to_string(),
            start,
            end,
            score: fields[5].to_string(),
            strand: Strand::from_field(fields[6]),
            frame: fields[7].to_string(),
            // attribute values may legally contain tabs in sloppy files
            attribute: fields[8..].join("\t"),
        })
    }

    /// Sequence (chromosome or scaffold) name.
    pub fn seqname(&self) -> &str {
        &self.seqname
    }

    /// Annotation source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Feature type (`gene`, `mRNA`, `exon`, `CDS`, ...).
    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    /// 1-based start position.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// 1-based inclusive end position.
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Raw score column.
    pub fn score(&self) -> &str {
        &self.score
    }

    /// Strand of the feature.
    #[inline]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Raw frame/phase column.
    pub fn frame(&self) -> &str {
        &self.frame
    }

    /// Raw attribute column.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Returns true if this record is an exon.
    #[inline]
    pub fn is_exon(&self) -> bool {
        self.feature_type.eq_ignore_ascii_case("exon")
    }

    /// Returns the number of nucleotides covered by the feature.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a feature covers at least one nucleotide.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Parses the attribute column.
    pub fn attributes(&self) -> Attributes {
        parse_attributes(&self.attribute)
    }
}

fn parse_coordinate(raw: &str, field: &'static str, line: usize) -> ReaderResult<u64> {
    let value = raw.trim().parse::<u64>().map_err(|_| {
        ReaderError::invalid_field(
            line,
            field,
            format!("ERROR: could not parse '{}' as integer", raw),
        )
    })?;
    if value == 0 {
        return Err(ReaderError::invalid_field(
            line,
            field,
            "ERROR: coordinates are 1-based, got 0".into(),
        ));
    }
    Ok(value)
}

/// Parsed `key`/`value` pairs of an attribute column, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pairs: Vec<(String, String)>,
}

impl Attributes {
    /// Returns the first value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of `key` if it is present and non-empty.
    pub fn parent(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Returns the explicit exon ordinal, if any.
    ///
    /// GFF3 files from Araport/TAIR encode it in the `ID` (`AT1G01010.1:exon:3`);
    /// GTF files carry an `exon_number` attribute. Zero is not an ordinal.
    pub fn exon_ordinal(&self) -> Option<u32> {
        self.get("ID")
            .and_then(ordinal_from_id)
            .or_else(|| {
                self.get("exon_number")
                    .and_then(|value| value.trim().parse::<u32>().ok())
            })
            .filter(|ordinal| *ordinal > 0)
    }

    /// Number of parsed pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no attribute was parsed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over the pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Finds the first `exon:<digits>` in an `ID` value.
fn ordinal_from_id(value: &str) -> Option<u32> {
    const TAG: &[u8] = b"exon:";
    for at in memmem::find_iter(value.as_bytes(), TAG) {
        let digits = &value[at + TAG.len()..];
        let end = digits
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(digits.len());
        if end > 0 {
            if let Ok(ordinal) = digits[..end].parse::<u32>() {
                return Some(ordinal);
            }
        }
    }
    None
}

/// Attribute parser accepting both GFF (`key=value`) and GTF (`key "value"`)
/// items in a `;`-separated list.
///
/// Quoted values may contain `;`. Items without a value are kept with an
/// empty value. Values are not percent-decoded.
///
/// # Examples
///
/// ```
/// use exonsite::gxf::parse_attributes;
///
/// let gff = parse_attributes("ID=AT1G01010.1:exon:1;Parent=AT1G01010.1");
/// assert_eq!(gff.get("Parent"), Some("AT1G01010.1"));
///
/// let gtf = parse_attributes("gene_id \"AT1G01010\"; Parent \"AT1G01010.1\";");
/// assert_eq!(gtf.get("Parent"), Some("AT1G01010.1"));
/// ```
pub fn parse_attributes(raw: &str) -> Attributes {
    let line = raw.as_bytes();
    let len = line.len();
    let mut pairs = Vec::with_capacity(8);
    let mut pos = 0usize;

    while pos < len {
        while pos < len && line[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        if line[pos] == b';' {
            pos += 1;
            continue;
        }

        let key_start = pos;
        let key_end = match memchr3(b'=', b' ', b';', &line[pos..]) {
            Some(offset) => pos + offset,
            None => {
                // flag attribute closing the column
                pairs.push((raw[key_start..].trim_end().to_string(), String::new()));
                break;
            }
        };
        let key = raw[key_start..key_end].to_string();
        if line[key_end] == b';' {
            pairs.push((key, String::new()));
            pos = key_end + 1;
            continue;
        }

        pos = key_end + 1;
        while pos < len && (line[pos] == b' ' || line[pos] == b'=') {
            pos += 1;
        }

        let value = if pos < len && line[pos] == b'"' {
            pos += 1;
            let value = match memchr(b'"', &line[pos..]) {
                Some(close) => {
                    let value = &raw[pos..pos + close];
                    pos += close + 1;
                    value
                }
                None => {
                    let value = &raw[pos..];
                    pos = len;
                    value
                }
            };
            pos = memchr(b';', &line[pos..]).map_or(len, |semi| pos + semi + 1);
            value
        } else {
            let value_end = memchr(b';', &line[pos..]).map_or(len, |semi| pos + semi);
            let value = raw[pos.min(len)..value_end].trim();
            pos = value_end + 1;
            value
        };

        pairs.push((key, value.to_string()));
    }

    Attributes { pairs }
}

/// Immutable collection of parsed gene-model records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureStore {
    features: Vec<Feature>,
}

impl FeatureStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already parsed features.
    pub fn from_features(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub(crate) fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the store holds no record.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates over every record in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Iterates over the `exon` records in file order.
    pub fn exons(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|feature| feature.is_exon())
    }

    /// Returns the records as a slice.
    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }
}

impl FromIterator<Feature> for FeatureStore {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FeatureStore {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.seqname,
            self.source,
            self.feature_type,
            self.start,
            self.end,
            self.score,
            self.strand,
            self.frame,
            self.attribute
        )
    }
}
