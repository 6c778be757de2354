use std::fmt;

use crate::index::{gene_id, TranscriptIndex};

/// A modification call: a transcript and a 1-based transcript-relative position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteCall {
    /// Transcript identifier, as written in the probability table.
    pub transcript_id: String,
    /// 1-based position inside the transcript.
    pub position: u64,
}

impl SiteCall {
    /// Creates a new call.
    pub fn new<S: Into<String>>(transcript_id: S, position: u64) -> Self {
        Self {
            transcript_id: transcript_id.into(),
            position,
        }
    }
}

/// Where a site landed inside its transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExonAssignment {
    /// The site falls in the exon with this number.
    Exon(u32),
    /// The site is outside every indexed exon, or the transcript is unknown.
    Utr,
}

impl ExonAssignment {
    /// Returns the exon number, if any.
    pub fn exon(&self) -> Option<u32> {
        match self {
            ExonAssignment::Exon(number) => Some(*number),
            ExonAssignment::Utr => None,
        }
    }
}

impl fmt::Display for ExonAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExonAssignment::Exon(number) => write!(f, "{number}"),
            ExonAssignment::Utr => f.write_str("UTR"),
        }
    }
}

/// Distinct exon count of the gene a site belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneExonCount {
    /// Distinct exon numbers across the transcripts of the gene.
    Known(usize),
    /// The site is a UTR site or its gene is not indexed.
    Unknown,
}

impl fmt::Display for GeneExonCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneExonCount::Known(count) => write!(f, "{count}"),
            GeneExonCount::Unknown => f.write_str("unknown"),
        }
    }
}

/// Broad category of an annotated site, used by the summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteCategory {
    /// Inside an exon other than the last.
    NonLastExon,
    /// Inside the last exon.
    LastExon,
    /// Outside every exon.
    Utr,
}

/// A modification call together with its exon annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSite {
    /// Transcript identifier.
    pub transcript_id: String,
    /// 1-based transcript-relative position.
    pub position: u64,
    /// Exon containing the site, or `Utr`.
    pub exon: ExonAssignment,
    /// Exon count of the transcript; `None` if the transcript is not indexed.
    pub total_exons_in_transcript: Option<usize>,
    /// Distinct exon count of the gene; always `Unknown` for UTR sites.
    pub total_exons_in_gene: GeneExonCount,
    /// True if the site lies in the highest-numbered exon of the transcript.
    pub is_last_exon: bool,
}

impl AnnotatedSite {
    /// Returns the category of the site.
    pub fn category(&self) -> SiteCategory {
        match self.exon {
            ExonAssignment::Utr => SiteCategory::Utr,
            ExonAssignment::Exon(_) if self.is_last_exon => SiteCategory::LastExon,
            ExonAssignment::Exon(_) => SiteCategory::NonLastExon,
        }
    }
}

/// Annotates a single call against the index.
pub fn classify_one(index: &TranscriptIndex, call: &SiteCall) -> AnnotatedSite {
    let transcript_id = call.transcript_id.clone();
    let position = call.position;

    match index.locate(&call.transcript_id, call.position) {
        Some(hit) => {
            let total_exons_in_gene = index
                .gene_exon_count(gene_id(&call.transcript_id))
                .map_or(GeneExonCount::Unknown, GeneExonCount::Known);
            let is_last_exon = index.last_exon(&call.transcript_id) == Some(hit.exon);
            AnnotatedSite {
                transcript_id,
                position,
                exon: ExonAssignment::Exon(hit.exon),
                total_exons_in_transcript: Some(hit.total_exons),
                total_exons_in_gene,
                is_last_exon,
            }
        }
        None => AnnotatedSite {
            transcript_id,
            position,
            exon: ExonAssignment::Utr,
            total_exons_in_transcript: index.exon_count(&call.transcript_id),
            total_exons_in_gene: GeneExonCount::Unknown,
            is_last_exon: false,
        },
    }
}

/// Annotates every call, preserving input order.
///
/// # Example
///
/// ```rust,no_run
/// use exonsite::{classify, CoordinateOptions, Reader, SiteCall, TranscriptIndex};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Reader::from_path("tests/data/test.gtf")?.into_store()?;
///     let index = TranscriptIndex::build(&store, &CoordinateOptions::default());
///
///     let calls = vec![SiteCall::new("AT1G01020.4", 426)];
///     for site in classify(&index, &calls) {
///         println!("{} {} {}", site.transcript_id, site.position, site.exon);
///     }
///     Ok(())
/// }
/// ```
pub fn classify<'a, I>(index: &TranscriptIndex, calls: I) -> Vec<AnnotatedSite>
where
    I: IntoIterator<Item = &'a SiteCall>,
{
    calls
        .into_iter()
        .map(|call| classify_one(index, call))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TranscriptCoordinateBuilder;
    use crate::gxf::Feature;

    fn index() -> TranscriptIndex {
        let lines = [
            "1\tt\texon\t1\t10\t.\t+\t.\tID=g.1:exon:1;Parent=g.1",
            "1\tt\texon\t21\t30\t.\t+\t.\tID=g.1:exon:2;Parent=g.1",
            "1\tt\texon\t41\t50\t.\t+\t.\tID=g.2:exon:3;Parent=g.2",
        ];
        let features: Vec<Feature> = lines
            .iter()
            .map(|line| Feature::parse(line, 1).unwrap())
            .collect();
        TranscriptCoordinateBuilder::default().build(&features)
    }

    #[test]
    fn exon_sites_carry_counts() {
        let site = classify_one(&index(), &SiteCall::new("g.1", 12));
        assert_eq!(site.exon, ExonAssignment::Exon(2));
        assert_eq!(site.total_exons_in_transcript, Some(2));
        assert_eq!(site.total_exons_in_gene, GeneExonCount::Known(3));
        assert!(site.is_last_exon);
        assert_eq!(site.category(), SiteCategory::LastExon);
    }

    #[test]
    fn uncovered_positions_are_utr() {
        let index = index();
        let site = classify_one(&index, &SiteCall::new("g.1", 21));
        assert_eq!(site.exon, ExonAssignment::Utr);
        assert_eq!(site.total_exons_in_transcript, Some(2));
        assert_eq!(site.total_exons_in_gene, GeneExonCount::Unknown);
        assert!(!site.is_last_exon);

        let unknown = classify_one(&index, &SiteCall::new("x.1", 1));
        assert_eq!(unknown.total_exons_in_transcript, None);
        assert_eq!(unknown.category(), SiteCategory::Utr);
    }

    #[test]
    fn sentinels_render_as_text() {
        assert_eq!(ExonAssignment::Utr.to_string(), "UTR");
        assert_eq!(ExonAssignment::Exon(4).to_string(), "4");
        assert_eq!(GeneExonCount::Unknown.to_string(), "unknown");
    }
}
