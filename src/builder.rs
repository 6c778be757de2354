use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info, warn};

use crate::{
    gxf::Feature,
    index::{gene_id, ExonSpan, TranscriptIndex, TranscriptLayout},
    strand::Strand,
};

/// Attribute naming the parent transcript of an exon.
pub const DEFAULT_PARENT_ATTRIBUTE: &str = "Parent";

/// How exons are numbered inside a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExonNumbering {
    /// Use the explicit ordinal from the attributes (`ID=...:exon:N` or
    /// `exon_number`); exons without one take the smallest number no other
    /// exon of the transcript claims.
    #[default]
    Ordinal,
    /// Use the explicit ordinal; exons without one are skipped.
    StrictOrdinal,
    /// Number exons 1, 2, 3... in the order they appear in the file.
    Encounter,
}

/// Configuration options for laying out transcript coordinates.
///
/// # Example
///
/// ```
/// use exonsite::builder::{CoordinateOptions, ExonNumbering};
///
/// let options = CoordinateOptions::new()
///     .parent_attribute("transcript_id")
///     .numbering(ExonNumbering::Encounter)
///     .strand_aware(false);
/// assert_eq!(options.resolved_parent(), "transcript_id");
/// ```
#[derive(Clone, Debug)]
pub struct CoordinateOptions<'a> {
    parent_attribute: Option<Cow<'a, str>>,
    numbering: ExonNumbering,
    strand_aware: bool,
}

impl<'a> Default for CoordinateOptions<'a> {
    fn default() -> Self {
        Self {
            parent_attribute: None,
            numbering: ExonNumbering::default(),
            strand_aware: true,
        }
    }
}

impl<'a> CoordinateOptions<'a> {
    /// Creates a new options builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the attribute holding the parent transcript id.
    ///
    /// By default `Parent` is used.
    pub fn parent_attribute<P>(mut self, attribute: P) -> Self
    where
        P: Into<Cow<'a, str>>,
    {
        self.parent_attribute = Some(attribute.into());
        self
    }

    /// Sets the exon numbering policy.
    pub fn numbering(mut self, numbering: ExonNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    /// Chooses how strand affects the layout.
    ///
    /// When enabled (the default), exons are laid out 5' to 3': ascending
    /// genomic order on `+`, descending on `-`, where positions inside each
    /// exon also run from its genomic end. When disabled, exons are laid out
    /// in file order and always enumerated in ascending genomic order.
    pub fn strand_aware(mut self, enabled: bool) -> Self {
        self.strand_aware = enabled;
        self
    }

    /// Returns the parent attribute name.
    pub fn resolved_parent(&self) -> &str {
        self.parent_attribute
            .as_deref()
            .unwrap_or(DEFAULT_PARENT_ATTRIBUTE)
    }

    /// Returns the numbering policy.
    pub fn numbering_policy(&self) -> ExonNumbering {
        self.numbering
    }

    /// Returns true if the layout follows transcript strand.
    pub fn is_strand_aware(&self) -> bool {
        self.strand_aware
    }

    /// Converts the options into owned values.
    pub fn into_owned(self) -> CoordinateOptions<'static> {
        CoordinateOptions {
            parent_attribute: self
                .parent_attribute
                .map(|attribute| Cow::Owned(attribute.into_owned())),
            numbering: self.numbering,
            strand_aware: self.strand_aware,
        }
    }
}

/// A problem found while building an index. None of them abort the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// A second exon claimed a number already taken in the transcript; the
    /// first exon was kept and the second dropped.
    DuplicateExon {
        /// Transcript identifier.
        transcript: String,
        /// Repeated exon number.
        exon: u32,
    },
    /// Exons of one transcript disagree on strand; the first strand was kept.
    MixedStrand {
        /// Transcript identifier.
        transcript: String,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::DuplicateExon { transcript, exon } => write!(
                f,
                "duplicate exon {exon} in {transcript}; keeping the first occurrence"
            ),
            BuildWarning::MixedStrand { transcript } => write!(
                f,
                "exons of {transcript} span multiple strands; keeping the first strand"
            ),
        }
    }
}

/// Converts gene-model features into a `TranscriptIndex`.
///
/// Features are grouped in a single pass; every transcript then keeps a
/// running position counter seeded at 1 that is never reset, so the exons of
/// a transcript tile `1..=N` without gaps or overlaps.
#[derive(Debug, Clone, Default)]
pub struct TranscriptCoordinateBuilder<'a> {
    options: CoordinateOptions<'a>,
}

impl<'a> TranscriptCoordinateBuilder<'a> {
    /// Creates a builder with the given options.
    pub fn new(options: CoordinateOptions<'a>) -> Self {
        Self { options }
    }

    /// Builds the index from a sequence of features.
    ///
    /// Non-exon features and exons without a parent transcript are skipped.
    /// Explicit ordinals are claimed first; under `Ordinal`, exons without
    /// one then take the smallest number still free in their transcript.
    pub fn build<'f, I>(&self, features: I) -> TranscriptIndex
    where
        I: IntoIterator<Item = &'f Feature>,
    {
        let parent_key = self.options.resolved_parent();
        let numbering = self.options.numbering;
        let strand_aware = self.options.strand_aware;
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut pending: Vec<(String, TranscriptBuilder)> = Vec::new();
        let mut warnings = Vec::new();
        let mut skipped = 0usize;

        let exons = features.into_iter().filter(|feature| feature.is_exon());
        for feature in exons {
            let attributes = feature.attributes();
            let Some(transcript_id) = attributes.parent(parent_key) else {
                debug!("no '{parent_key}' on exon: {}", feature.attribute());
                skipped += 1;
                continue;
            };

            let ordinal = attributes.exon_ordinal();
            if numbering == ExonNumbering::StrictOrdinal && ordinal.is_none() {
                debug!("skipping exon of {transcript_id} without an ordinal");
                skipped += 1;
                continue;
            }

            let slot = match slots.get(transcript_id) {
                Some(&slot) => slot,
                None => {
                    let builder = TranscriptBuilder::new(feature.strand());
                    slots.insert(transcript_id.to_string(), pending.len());
                    pending.push((transcript_id.to_string(), builder));
                    pending.len() - 1
                }
            };
            let entry = &mut pending[slot].1;

            if entry.strand != feature.strand() && !entry.mixed_strand {
                entry.mixed_strand = true;
                let warning = BuildWarning::MixedStrand {
                    transcript: transcript_id.to_string(),
                };
                warn!("{warning}");
                warnings.push(warning);
            }

            let ordinal = match numbering {
                ExonNumbering::Encounter => Some(entry.exons.len() as u32 + 1),
                ExonNumbering::Ordinal | ExonNumbering::StrictOrdinal => ordinal,
            };
            entry.exons.push(PendingExon {
                ordinal,
                start: feature.start(),
                end: feature.end(),
            });
        }

        let mut transcripts = HashMap::with_capacity(pending.len());
        let mut gene_exons: HashMap<String, HashSet<u32>> = HashMap::new();
        for (id, builder) in pending {
            let layout = builder.into_layout(id, strand_aware, &mut warnings);
            gene_exons
                .entry(layout.gene_id.clone())
                .or_default()
                .extend(layout.exons.iter().map(|exon| exon.number));
            transcripts.insert(layout.id.clone(), layout);
        }

        let gene_exon_counts: HashMap<String, usize> = gene_exons
            .into_iter()
            .map(|(gene, numbers)| (gene, numbers.len()))
            .collect();

        info!(
            "indexed {} transcripts from {} genes ({} exon records skipped, {} warnings)",
            transcripts.len(),
            gene_exon_counts.len(),
            skipped,
            warnings.len()
        );

        TranscriptIndex {
            transcripts,
            gene_exon_counts,
            warnings,
        }
    }
}

/// An exon waiting for its transcript to be laid out.
#[derive(Debug, Clone, Copy)]
struct PendingExon {
    ordinal: Option<u32>,
    start: u64,
    end: u64,
}

/// A helper struct to collect the exons of one transcript.
#[derive(Debug, Clone)]
struct TranscriptBuilder {
    strand: Strand,
    mixed_strand: bool,
    exons: Vec<PendingExon>,
}

impl TranscriptBuilder {
    fn new(strand: Strand) -> Self {
        Self {
            strand,
            mixed_strand: false,
            exons: Vec::new(),
        }
    }

    /// Gives every exon its final number, in file order.
    ///
    /// Explicit ordinals are claimed first and a repeated one is dropped.
    /// Exons without an ordinal then take the smallest unclaimed number.
    fn number_exons(&self, id: &str, warnings: &mut Vec<BuildWarning>) -> Vec<Option<u32>> {
        let mut claimed = HashSet::with_capacity(self.exons.len());
        let mut numbers: Vec<Option<u32>> = Vec::with_capacity(self.exons.len());
        for exon in &self.exons {
            match exon.ordinal {
                Some(ordinal) if !claimed.insert(ordinal) => {
                    let warning = BuildWarning::DuplicateExon {
                        transcript: id.to_string(),
                        exon: ordinal,
                    };
                    warn!("{warning}");
                    warnings.push(warning);
                    numbers.push(None);
                }
                ordinal => numbers.push(ordinal),
            }
        }

        let mut next = 1u32;
        for (exon, number) in self.exons.iter().zip(numbers.iter_mut()) {
            if exon.ordinal.is_none() {
                while claimed.contains(&next) {
                    next += 1;
                }
                claimed.insert(next);
                *number = Some(next);
            }
        }
        numbers
    }

    /// Consumes the builder and assigns transcript positions to its exons.
    fn into_layout(
        self,
        id: String,
        strand_aware: bool,
        warnings: &mut Vec<BuildWarning>,
    ) -> TranscriptLayout {
        let numbers = self.number_exons(&id, warnings);
        let mut kept: Vec<(u32, PendingExon)> = numbers
            .into_iter()
            .zip(self.exons)
            .filter_map(|(number, exon)| number.map(|number| (number, exon)))
            .collect();

        let reverse = strand_aware && self.strand.is_reverse();
        if strand_aware {
            // stable: equal starts keep file order
            if reverse {
                kept.sort_by(|a, b| b.1.start.cmp(&a.1.start));
            } else {
                kept.sort_by_key(|(_, exon)| exon.start);
            }
        }

        let mut counter = 0u64;
        let mut last_exon = 0u32;
        let mut exons = Vec::with_capacity(kept.len());
        for (number, exon) in kept {
            let start = counter + 1;
            // Feature guarantees start <= end
            counter += exon.end - exon.start + 1;
            last_exon = last_exon.max(number);
            exons.push(ExonSpan {
                number,
                start,
                end: counter,
                genomic_start: exon.start,
                genomic_end: exon.end,
                reverse,
            });
        }

        TranscriptLayout {
            gene_id: gene_id(&id).to_string(),
            id,
            strand: self.strand,
            exons,
            last_exon,
        }
    }
}
