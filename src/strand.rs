use std::fmt;

/// Represents the strand of a genomic feature.
///
/// This enum is used to indicate the orientation of a feature on a reference sequence.
///
/// # Example
///
/// ```
/// use exonsite::strand::Strand;
///
/// let strand = Strand::from_field("-");
/// assert_eq!(strand, Strand::Reverse);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Positive strand (`+`).
    Forward,
    /// Negative strand (`-`).
    Reverse,
    /// Anything else (`.`, `?`, empty, ...).
    Unknown,
}

impl Strand {
    /// Reads the strand column of a gene-model record.
    ///
    /// Gene-model files in the wild carry `.`, `?` or junk in this column for
    /// non-stranded features, so anything other than `+`/`-` maps to
    /// `Strand::Unknown` instead of failing.
    pub fn from_field(raw: &str) -> Self {
        match raw.trim() {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    /// Returns true if transcript coordinates run against the genome.
    #[inline]
    pub fn is_reverse(&self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => f.write_str("+"),
            Strand::Reverse => f.write_str("-"),
            Strand::Unknown => f.write_str("."),
        }
    }
}
