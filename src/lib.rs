//! # exonsite
//!
//! A Rust library for placing RNA modification sites (m6A calls) on the exon
//! structure of their transcripts.
//!
//! ## Overview
//!
//! Modification callers report sites as a transcript identifier plus a
//! 1-based position inside the spliced transcript. This library turns a
//! gene-model file (GFF3/GTF) into per-transcript coordinate spaces and
//! answers, for every site, which exon contains it, whether that exon is the
//! last one of the transcript, or whether the site falls outside every exon
//! (`UTR`).
//!
//! ## Features
//!
//! - **Streaming gene-model reader:** buffered or memory-mapped, with
//!   transparent gzip/zstd/bzip2 decompression and line-numbered errors
//! - **Configurable coordinate builder:** parent attribute, exon numbering
//!   policy and strand handling are options, not separate code paths
//! - **Logarithmic lookups:** exon location is a binary search over the exon
//!   boundaries of a transcript
//! - **Probability tables:** CSV/TSV readers with column validation
//! - **Summaries:** per-transcript category counts and modification ratios
//!   across conditions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exonsite::{
//!     classify, CoordinateOptions, ProbabilityTable, Reader, SiteTable, TranscriptIndex, Writer,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Reader::from_path("annotation.gff3")?.into_store()?;
//!     let index = TranscriptIndex::build(&store, &CoordinateOptions::default());
//!
//!     let table = ProbabilityTable::from_path("data.site_proba.csv")?;
//!     let calls = table.methylated_sites(0.9);
//!     let sites = classify(&index, &calls);
//!
//!     Writer::<SiteTable>::to_path("data.site_proba_exon_annotated.tab", &sites)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuring the Coordinate Layout
//!
//! ```rust,no_run
//! use exonsite::{CoordinateOptions, ExonNumbering, Reader, TranscriptIndex};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Reader::from_path("annotation.gtf.gz")?.into_store()?;
//!     let options = CoordinateOptions::new()
//!         .parent_attribute("transcript_id")
//!         .numbering(ExonNumbering::StrictOrdinal)
//!         .strand_aware(true);
//!     let index = TranscriptIndex::build(&store, &options);
//!
//!     for warning in index.warnings() {
//!         eprintln!("{warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Telling UTR Sites from Unknown Transcripts
//!
//! `TranscriptIndex::locate` returns `None` both for positions outside every
//! exon and for transcripts that are not in the index. Use
//! `TranscriptIndex::contains` to tell them apart:
//!
//! ```rust,no_run
//! use exonsite::TranscriptIndex;
//!
//! fn describe(index: &TranscriptIndex, id: &str, position: u64) -> String {
//!     match index.locate(id, position) {
//!         Some(hit) => format!("exon {} of {}", hit.exon, hit.total_exons),
//!         None if index.contains(id) => "UTR".into(),
//!         None => "unknown transcript".into(),
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli`: Build the `exonsite` binary (adds `clap` and `simple_logger`)
//! - `gzip` / `compression`: Read and write gzip files (adds `flate2`)
//! - `zstd`: Read zstd files (adds `zstd`)
//! - `bz2`: Read bzip2 files (adds `bzip2`)
//! - `mmap`: Enable memory-mapped file support (adds `memmap2`)
//!
//! ## Thread Safety
//!
//! `TranscriptIndex` is immutable once built and can be shared across
//! threads. `Reader` is `Send` but not `Sync`.

#![cfg_attr(doc, warn(missing_docs))]

pub mod builder;
pub mod gxf;
pub mod index;
pub mod reader;
pub mod site;
pub mod strand;
pub mod summary;
pub mod table;
pub mod writer;

pub use builder::{BuildWarning, CoordinateOptions, ExonNumbering, TranscriptCoordinateBuilder};
pub use gxf::{Attributes, Feature, FeatureStore};
pub use index::{ExonHit, ExonSpan, TranscriptIndex, TranscriptLayout};
pub use reader::{Compression, Reader, ReaderBuilder, ReaderError, ReaderMode, ReaderResult};
pub use site::{
    classify, classify_one, AnnotatedSite, ExonAssignment, GeneExonCount, SiteCall, SiteCategory,
};
pub use strand::Strand;
pub use summary::{
    common_transcripts, modification_ratios, read_transcript_list, retain_common, retain_listed,
    summarize_sites, CategoryCounts, TranscriptRatio, TranscriptSummary,
};
pub use table::{ProbabilityRow, ProbabilityTable, TableOptions, DEFAULT_THRESHOLD};
pub use writer::{
    unique_stems, RatioTable, SiteTable, SummaryTable, TargetFormat, Writer, WriterError,
    WriterResult,
};
