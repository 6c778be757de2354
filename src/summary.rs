use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{
    reader::{open_path_stream, Compression, ReaderResult},
    site::{AnnotatedSite, SiteCategory},
    table::ProbabilityRow,
};

/// Site counts by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    /// Every counted site.
    pub total_sites: usize,
    /// Sites inside an exon that is not the last one.
    pub non_last_exon_sites: usize,
    /// Sites inside the last exon.
    pub last_exon_sites: usize,
    /// Sites outside every exon, including those of unknown transcripts.
    pub utr_sites: usize,
}

impl CategoryCounts {
    /// Counts the categories of a set of sites.
    pub fn from_sites<'a, I>(sites: I) -> Self
    where
        I: IntoIterator<Item = &'a AnnotatedSite>,
    {
        let mut counts = Self::default();
        for site in sites {
            counts.add(site.category());
        }
        counts
    }

    fn add(&mut self, category: SiteCategory) {
        self.total_sites += 1;
        match category {
            SiteCategory::NonLastExon => self.non_last_exon_sites += 1,
            SiteCategory::LastExon => self.last_exon_sites += 1,
            SiteCategory::Utr => self.utr_sites += 1,
        }
    }
}

impl std::ops::AddAssign for CategoryCounts {
    fn add_assign(&mut self, other: Self) {
        self.total_sites += other.total_sites;
        self.non_last_exon_sites += other.non_last_exon_sites;
        self.last_exon_sites += other.last_exon_sites;
        self.utr_sites += other.utr_sites;
    }
}

/// Category counts of the sites of one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSummary {
    /// Transcript identifier.
    pub transcript_id: String,
    /// Category counts of its sites.
    pub counts: CategoryCounts,
}

/// Groups annotated sites per transcript, sorted by transcript id.
///
/// The overall totals are `CategoryCounts::from_sites` over the same input.
pub fn summarize_sites<'a, I>(sites: I) -> Vec<TranscriptSummary>
where
    I: IntoIterator<Item = &'a AnnotatedSite>,
{
    let mut grouped: BTreeMap<&str, CategoryCounts> = BTreeMap::new();
    for site in sites {
        grouped
            .entry(site.transcript_id.as_str())
            .or_default()
            .add(site.category());
    }

    grouped
        .into_iter()
        .map(|(transcript_id, counts)| TranscriptSummary {
            transcript_id: transcript_id.to_string(),
            counts,
        })
        .collect()
}

/// Modified and non-modified site counts of one transcript in one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRatio {
    /// Transcript identifier.
    pub transcript_id: String,
    /// Sites at or above the threshold.
    pub modified: usize,
    /// Sites below the threshold.
    pub non_modified: usize,
    /// Label of the input table.
    pub condition: String,
}

impl TranscriptRatio {
    /// Total number of sites.
    pub fn total_sites(&self) -> usize {
        self.modified + self.non_modified
    }

    /// Fraction of modified sites. Never NaN: a ratio is only built from at
    /// least one site.
    pub fn mod_ratio(&self) -> f64 {
        match self.total_sites() {
            0 => 0.0,
            total => self.modified as f64 / total as f64,
        }
    }
}

/// Computes per-transcript modification ratios of a probability table.
///
/// A site counts as modified when its probability is at least `threshold`.
/// Results are sorted by transcript id.
pub fn modification_ratios<'a, I>(
    rows: I,
    threshold: f64,
    condition: &str,
) -> Vec<TranscriptRatio>
where
    I: IntoIterator<Item = &'a ProbabilityRow>,
{
    let mut grouped: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = grouped
            .entry(row.transcript_id.as_str())
            .or_default();
        if row.probability_modified >= threshold {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    grouped
        .into_iter()
        .map(|(transcript_id, (modified, non_modified))| TranscriptRatio {
            transcript_id: transcript_id.to_string(),
            modified,
            non_modified,
            condition: condition.to_string(),
        })
        .collect()
}

/// Returns the transcripts present in every condition.
///
/// An empty set of conditions has no common transcript.
pub fn common_transcripts(conditions: &[Vec<TranscriptRatio>]) -> HashSet<String> {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return HashSet::new();
    };

    let mut common: HashSet<String> = first
        .iter()
        .map(|ratio| ratio.transcript_id.clone())
        .collect();
    for condition in iter {
        let present: HashSet<&str> = condition
            .iter()
            .map(|ratio| ratio.transcript_id.as_str())
            .collect();
        common.retain(|id| present.contains(id.as_str()));
    }
    common
}

/// Drops, in every condition, the transcripts missing from any other condition.
pub fn retain_common(conditions: &mut [Vec<TranscriptRatio>]) -> usize {
    let common = common_transcripts(conditions);
    for condition in conditions.iter_mut() {
        condition.retain(|ratio| common.contains(&ratio.transcript_id));
    }
    log::info!("{} transcripts are common to all conditions", common.len());
    common.len()
}

/// Keeps, in every condition, only the transcripts of an allow-list.
pub fn retain_listed(conditions: &mut [Vec<TranscriptRatio>], listed: &HashSet<String>) -> usize {
    let mut kept = HashSet::new();
    for condition in conditions.iter_mut() {
        condition.retain(|ratio| listed.contains(&ratio.transcript_id));
        kept.extend(condition.iter().map(|ratio| ratio.transcript_id.clone()));
    }
    log::info!(
        "{} of {} listed transcripts have sites",
        kept.len(),
        listed.len()
    );
    kept.len()
}

/// Reads a transcript allow-list, one identifier per line.
///
/// Blank lines and `#` comments are ignored. A bare gene id (no `.`) stands
/// for its first isoform and becomes `<gene>.1`. Compressed lists are read
/// like gene models.
pub fn read_transcript_list<P: AsRef<Path>>(path: P) -> ReaderResult<HashSet<String>> {
    let stream = open_path_stream(path.as_ref(), Compression::Auto)?;
    transcript_list_from_reader(BufReader::new(stream))
}

/// Reads a transcript allow-list from any buffered source.
///
/// # Example
///
/// ```
/// use exonsite::summary::transcript_list_from_reader;
///
/// let ids = transcript_list_from_reader("AT1G01010\nAT1G01020.4\n\n".as_bytes()).unwrap();
/// assert!(ids.contains("AT1G01010.1"));
/// assert!(ids.contains("AT1G01020.4"));
/// ```
pub fn transcript_list_from_reader<R: BufRead>(reader: R) -> ReaderResult<HashSet<String>> {
    let mut ids = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        if id.contains('.') {
            ids.insert(id.to_string());
        } else {
            ids.insert(format!("{id}.1"));
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{ExonAssignment, GeneExonCount};

    fn site(id: &str, exon: ExonAssignment, is_last_exon: bool) -> AnnotatedSite {
        AnnotatedSite {
            transcript_id: id.into(),
            position: 1,
            exon,
            total_exons_in_transcript: Some(3),
            total_exons_in_gene: GeneExonCount::Known(3),
            is_last_exon,
        }
    }

    fn row(id: &str, probability: f64) -> ProbabilityRow {
        ProbabilityRow {
            transcript_id: id.into(),
            transcript_position: 1,
            probability_modified: probability,
        }
    }

    #[test]
    fn summaries_are_sorted_and_add_up() {
        let sites = vec![
            site("b.1", ExonAssignment::Exon(3), true),
            site("a.1", ExonAssignment::Exon(1), false),
            site("a.1", ExonAssignment::Utr, false),
            site("b.1", ExonAssignment::Exon(2), false),
        ];
        let summaries = summarize_sites(&sites);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].transcript_id, "a.1");
        assert_eq!(summaries[0].counts.utr_sites, 1);
        assert_eq!(summaries[1].counts.last_exon_sites, 1);

        let mut total = CategoryCounts::default();
        for summary in &summaries {
            total += summary.counts;
        }
        assert_eq!(total, CategoryCounts::from_sites(&sites));
        assert_eq!(total.total_sites, 4);
        assert_eq!(total.non_last_exon_sites, 2);
    }

    #[test]
    fn ratio_threshold_is_inclusive() {
        let rows = vec![row("a.1", 0.9), row("a.1", 0.2), row("b.1", 0.95)];
        let ratios = modification_ratios(&rows, 0.9, "WT");
        assert_eq!(ratios[0].modified, 1);
        assert_eq!(ratios[0].non_modified, 1);
        assert!((ratios[0].mod_ratio() - 0.5).abs() < 1e-12);
        assert_eq!(ratios[1].total_sites(), 1);
        assert_eq!(ratios[1].condition, "WT");
    }

    #[test]
    fn keeps_only_common_transcripts() {
        let mut conditions = vec![
            modification_ratios(&[row("a.1", 0.95), row("b.1", 0.1)], 0.9, "WT"),
            modification_ratios(&[row("b.1", 0.95), row("c.1", 0.1)], 0.9, "KO"),
        ];
        assert_eq!(retain_common(&mut conditions), 1);
        assert_eq!(conditions[0].len(), 1);
        assert_eq!(conditions[1][0].transcript_id, "b.1");
        assert!(common_transcripts(&[]).is_empty());
    }

    #[test]
    fn allow_list_completes_bare_gene_ids() {
        let list = "# targets\nAT1G01100\n  AT1G01020.4 \n\nAT1G01100.2\n";
        let ids = transcript_list_from_reader(list.as_bytes()).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("AT1G01100.1"));
        assert!(ids.contains("AT1G01100.2"));
        assert!(ids.contains("AT1G01020.4"));
    }

    #[test]
    fn retain_listed_filters_every_condition() {
        let mut conditions = vec![
            modification_ratios(&[row("a.1", 0.95), row("b.1", 0.1)], 0.9, "WT"),
            modification_ratios(&[row("b.1", 0.95), row("c.1", 0.1)], 0.9, "KO"),
        ];
        let listed = HashSet::from(["a.1", "c.1", "z.1"].map(String::from));
        assert_eq!(retain_listed(&mut conditions, &listed), 2);
        assert_eq!(conditions[0][0].transcript_id, "a.1");
        assert_eq!(conditions[1][0].transcript_id, "c.1");

        // nothing left in common once filtered
        assert_eq!(retain_common(&mut conditions), 0);
        assert!(conditions.iter().all(Vec::is_empty));
    }
}
