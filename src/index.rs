use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::{
    builder::{BuildWarning, CoordinateOptions, TranscriptCoordinateBuilder},
    gxf::FeatureStore,
    strand::Strand,
};

/// Derives the gene identifier of a transcript: everything before the first `.`.
///
/// # Example
///
/// ```
/// use exonsite::index::gene_id;
///
/// assert_eq!(gene_id("AT1G01020.4"), "AT1G01020");
/// assert_eq!(gene_id("ENST0001"), "ENST0001");
/// ```
pub fn gene_id(transcript_id: &str) -> &str {
    transcript_id
        .split_once('.')
        .map_or(transcript_id, |(gene, _)| gene)
}

/// One exon laid out in transcript coordinates.
///
/// `start..=end` is the 1-based transcript-relative range covered by the
/// exon; `genomic_start..=genomic_end` is the source feature interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExonSpan {
    /// Exon number, stable for the lifetime of the index.
    pub number: u32,
    /// First transcript position of the exon.
    pub start: u64,
    /// Last transcript position of the exon.
    pub end: u64,
    /// 1-based genomic start of the source feature.
    pub genomic_start: u64,
    /// 1-based inclusive genomic end of the source feature.
    pub genomic_end: u64,
    /// True if transcript positions run from `genomic_end` down to `genomic_start`.
    pub reverse: bool,
}

impl ExonSpan {
    /// Number of nucleotides in the exon.
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: exons cover at least one nucleotide.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `position` falls inside the exon.
    #[inline]
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }

    /// The transcript positions covered by this exon, in increasing order.
    #[inline]
    pub fn positions(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }

    /// Maps a transcript position inside this exon to its genomic coordinate.
    pub fn genomic_position(&self, position: u64) -> Option<u64> {
        if !self.contains(position) {
            return None;
        }
        let offset = position - self.start;
        if self.reverse {
            Some(self.genomic_end - offset)
        } else {
            Some(self.genomic_start + offset)
        }
    }
}

/// The coordinate space of a single transcript.
///
/// Exons are stored in transcript order, so their ranges are contiguous and
/// increasing: the first starts at 1 and each next one starts right after
/// the previous end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLayout {
    pub(crate) id: String,
    pub(crate) gene_id: String,
    pub(crate) strand: Strand,
    pub(crate) exons: Vec<ExonSpan>,
    pub(crate) last_exon: u32,
}

impl TranscriptLayout {
    /// Returns the transcript identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the derived gene identifier.
    #[inline]
    pub fn gene_id(&self) -> &str {
        &self.gene_id
    }

    /// Returns the strand recorded for the transcript.
    #[inline]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Returns the exons in transcript order.
    #[inline]
    pub fn exons(&self) -> &[ExonSpan] {
        &self.exons
    }

    /// Returns the exon with the given number.
    pub fn exon(&self, number: u32) -> Option<&ExonSpan> {
        self.exons.iter().find(|exon| exon.number == number)
    }

    /// Number of exons recorded for the transcript.
    #[inline]
    pub fn exon_count(&self) -> usize {
        self.exons.len()
    }

    /// The highest exon number of the transcript.
    #[inline]
    pub fn last_exon(&self) -> u32 {
        self.last_exon
    }

    /// Total covered length, i.e. the highest valid transcript position.
    pub fn len(&self) -> u64 {
        self.exons.last().map_or(0, |exon| exon.end)
    }

    /// Returns true if the transcript covers no position.
    pub fn is_empty(&self) -> bool {
        self.exons.is_empty()
    }

    /// Finds the exon containing `position` with a binary search over the
    /// exon boundaries.
    pub fn locate(&self, position: u64) -> Option<&ExonSpan> {
        let idx = self.exons.partition_point(|exon| exon.end < position);
        self.exons.get(idx).filter(|exon| exon.contains(position))
    }

    #[cfg(test)]
    fn locate_linear(&self, position: u64) -> Option<&ExonSpan> {
        self.exons.iter().find(|exon| exon.contains(position))
    }
}

/// Result of a successful exon lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExonHit {
    /// Number of the exon containing the position.
    pub exon: u32,
    /// Number of exons of the transcript.
    pub total_exons: usize,
}

/// Read-only index of transcript coordinate spaces built from a gene model.
///
/// Built once per gene-model file with `TranscriptIndex::build` (or a
/// `TranscriptCoordinateBuilder`) and shared immutably afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use exonsite::{CoordinateOptions, Reader, TranscriptIndex};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Reader::from_path("tests/data/test.gtf")?.into_store()?;
///     let index = TranscriptIndex::build(&store, &CoordinateOptions::default());
///
///     match index.locate("AT1G01020.4", 426) {
///         Some(hit) => println!("exon {} of {}", hit.exon, hit.total_exons),
///         None if index.contains("AT1G01020.4") => println!("UTR"),
///         None => println!("unknown transcript"),
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TranscriptIndex {
    pub(crate) transcripts: HashMap<String, TranscriptLayout>,
    pub(crate) gene_exon_counts: HashMap<String, usize>,
    pub(crate) warnings: Vec<BuildWarning>,
}

impl TranscriptIndex {
    /// Builds an index from the `exon` records of a feature store.
    pub fn build(store: &FeatureStore, options: &CoordinateOptions<'_>) -> Self {
        TranscriptCoordinateBuilder::new(options.clone()).build(store)
    }

    /// Number of indexed transcripts.
    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    /// Returns true if no transcript was indexed.
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    /// Returns true if the transcript is indexed.
    ///
    /// `locate` answers `None` both for unknown transcripts and for positions
    /// outside every exon; this is the second step callers use to tell UTR
    /// positions from unknown transcripts.
    pub fn contains(&self, transcript_id: &str) -> bool {
        self.transcripts.contains_key(transcript_id)
    }

    /// Returns the layout of a transcript.
    pub fn transcript(&self, transcript_id: &str) -> Option<&TranscriptLayout> {
        self.transcripts.get(transcript_id)
    }

    /// Iterates over every transcript layout, in no particular order.
    pub fn transcripts(&self) -> impl Iterator<Item = &TranscriptLayout> {
        self.transcripts.values()
    }

    /// Number of exons recorded for a transcript.
    pub fn exon_count(&self, transcript_id: &str) -> Option<usize> {
        self.transcript(transcript_id)
            .map(TranscriptLayout::exon_count)
    }

    /// Number of distinct exon numbers observed across the transcripts of a gene.
    pub fn gene_exon_count(&self, gene_id: &str) -> Option<usize> {
        self.gene_exon_counts.get(gene_id).copied()
    }

    /// The highest exon number of a transcript.
    pub fn last_exon(&self, transcript_id: &str) -> Option<u32> {
        self.transcript(transcript_id)
            .map(TranscriptLayout::last_exon)
    }

    /// Locates the exon containing a 1-based transcript position.
    pub fn locate(&self, transcript_id: &str, position: u64) -> Option<ExonHit> {
        let transcript = self.transcript(transcript_id)?;
        transcript.locate(position).map(|exon| ExonHit {
            exon: exon.number,
            total_exons: transcript.exon_count(),
        })
    }

    /// Maps a transcript position back to its genomic coordinate.
    pub fn genomic_position(&self, transcript_id: &str, position: u64) -> Option<u64> {
        self.transcript(transcript_id)?
            .locate(position)?
            .genomic_position(position)
    }

    /// Problems found while building the index.
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }
}
