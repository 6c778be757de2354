use std::error::Error;
use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{ArgAction, Parser, ValueEnum};
use log::{error, info, warn, LevelFilter, Log, Metadata, Record};
use simple_logger::SimpleLogger;

use exonsite::{
    classify, modification_ratios, read_transcript_list, retain_common, retain_listed,
    summarize_sites, unique_stems, CategoryCounts, CoordinateOptions, ExonNumbering,
    ProbabilityTable, RatioTable, Reader, SiteTable, SummaryTable, TranscriptIndex,
    TranscriptRatio, Writer, DEFAULT_THRESHOLD,
};

const ANNOTATED_SUFFIX: &str = "_exon_annotated.tab";
const SUMMARY_SUFFIX: &str = "_exon_summary.tab";
const RATIO_SUFFIX: &str = "_mod_ratio.tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NumberingArg {
    Ordinal,
    StrictOrdinal,
    Encounter,
}

impl From<NumberingArg> for ExonNumbering {
    fn from(arg: NumberingArg) -> Self {
        match arg {
            NumberingArg::Ordinal => ExonNumbering::Ordinal,
            NumberingArg::StrictOrdinal => ExonNumbering::StrictOrdinal,
            NumberingArg::Encounter => ExonNumbering::Encounter,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "exonsite",
    version,
    about = "Annotate m6A sites with the exon of their transcript"
)]
struct Args {
    #[arg(
        short = 'g',
        long = "gtf",
        required = true,
        value_name = "PATH",
        help = "Path to the gene-model file (GFF3/GTF, optionally compressed)"
    )]
    gtf: PathBuf,

    #[arg(
        short = 'm',
        long = "m6a",
        required = true,
        value_name = "PATHS",
        num_args = 1..,
        help = "Paths to probability tables (e.g. data.site_proba.csv), separated by spaces"
    )]
    m6a: Vec<PathBuf>,

    #[arg(
        short = 't',
        long = "threshold",
        value_name = "FLOAT",
        default_value_t = DEFAULT_THRESHOLD,
        help = "Probability above which a site is modified"
    )]
    threshold: f64,

    #[arg(
        short = 'o',
        long = "out",
        value_name = "PATH",
        help = "Output file (one table) or directory (several tables)"
    )]
    out: Option<PathBuf>,

    #[arg(
        long = "logfile",
        value_name = "PATH",
        default_value = "pipeline.log",
        help = "File receiving a copy of the log"
    )]
    logfile: PathBuf,

    #[arg(
        long = "parent-attribute",
        value_name = "KEY",
        default_value = "Parent",
        help = "Attribute holding the parent transcript of an exon"
    )]
    parent_attribute: String,

    #[arg(
        long = "numbering",
        value_enum,
        value_name = "POLICY",
        default_value_t = NumberingArg::Ordinal,
        help = "How exons are numbered inside a transcript"
    )]
    numbering: NumberingArg,

    #[arg(
        long = "strand-aware",
        help = "Lay exons out 5' to 3' following the transcript strand",
        value_name = "FLAG",
        default_missing_value("true"),
        default_value("true"),
        num_args(0..=1),
        require_equals(true),
        action = ArgAction::Set,
    )]
    strand_aware: bool,

    #[arg(
        long = "summary",
        help = "Flag to write per-transcript exon/UTR site counts",
        value_name = "FLAG",
        default_missing_value("true"),
        default_value("false"),
        num_args(0..=1),
        require_equals(true),
        action = ArgAction::Set,
    )]
    summary: bool,

    #[arg(
        long = "ratio",
        help = "Flag to write modification ratios of transcripts common to all inputs",
        value_name = "FLAG",
        default_missing_value("true"),
        default_value("false"),
        num_args(0..=1),
        require_equals(true),
        action = ArgAction::Set,
    )]
    ratio: bool,

    #[arg(
        long = "gene-list",
        value_name = "PATH",
        help = "Restrict modification ratios to these transcripts (one id per line)"
    )]
    gene_list: Option<PathBuf>,
}

impl Args {
    fn check(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "ERROR: threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        if !self.gtf.is_file() {
            return Err(format!("ERROR: {} does not exist", self.gtf.display()));
        }
        for path in &self.m6a {
            if !path.is_file() {
                return Err(format!("ERROR: {} does not exist", path.display()));
            }
        }
        if let Some(list) = &self.gene_list {
            if !list.is_file() {
                return Err(format!("ERROR: {} does not exist", list.display()));
            }
        }
        if self.parent_attribute.trim().is_empty() {
            return Err("ERROR: --parent-attribute must not be empty".into());
        }
        Ok(())
    }
}

/// Writes every record to stderr and, as `LEVEL: message`, to a log file.
struct TeeLogger {
    console: SimpleLogger,
    file: Mutex<LineWriter<File>>,
}

impl TeeLogger {
    fn init(path: &Path, level: LevelFilter) -> Result<(), Box<dyn Error>> {
        let file = File::create(path)?;
        let logger = TeeLogger {
            console: SimpleLogger::new().with_level(level),
            file: Mutex::new(LineWriter::new(file)),
        };
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.console.log(record);
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}: {}", record.level(), record.args());
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn main() {
    let start = std::time::Instant::now();
    let args: Args = Args::parse();

    if let Err(e) = TeeLogger::init(&args.logfile, LevelFilter::Info) {
        eprintln!(
            "ERROR: could not set up logging to {}: {e}",
            args.logfile.display()
        );
        std::process::exit(1);
    }

    let command: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    info!("{}", command.join(" "));
    args.check().unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    run(&args).unwrap_or_else(|e| {
        error!("{}", e);
        log::logger().flush();
        std::process::exit(1);
    });

    let elapsed = start.elapsed();
    info!("Elapsed time: {:?}", elapsed);
    log::logger().flush();
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    info!("reading gene model from {}", args.gtf.display());
    let store = Reader::from_path(&args.gtf)?.into_store()?;
    let options = CoordinateOptions::new()
        .parent_attribute(args.parent_attribute.as_str())
        .numbering(args.numbering.into())
        .strand_aware(args.strand_aware);
    let index = TranscriptIndex::build(&store, &options);
    if index.is_empty() {
        warn!(
            "no transcript was indexed from {}; every site will be reported as UTR",
            args.gtf.display()
        );
    }

    let out_dir = prepare_output(args)?;
    let out_dir = out_dir.as_deref();
    let names = unique_stems(&args.m6a);
    let mut ratios: Vec<(PathBuf, Vec<TranscriptRatio>)> = Vec::new();

    for (input, name) in args.m6a.iter().zip(&names) {
        info!("processing {}", input.display());
        let table = ProbabilityTable::from_path(input)?;
        let calls = table.methylated_sites(args.threshold);
        info!(
            "{} of {} sites pass the {} threshold",
            calls.len(),
            table.len(),
            args.threshold
        );

        let sites = classify(&index, &calls);
        let counts = CategoryCounts::from_sites(&sites);
        info!(
            "sites in non-last exons: {}, in last exons: {}, in UTRs: {}",
            counts.non_last_exon_sites, counts.last_exon_sites, counts.utr_sites
        );

        let annotated = match (&args.out, args.m6a.len()) {
            (Some(out), 1) => out.clone(),
            _ => derived_path(out_dir, input, name, ANNOTATED_SUFFIX),
        };
        Writer::<SiteTable>::to_path(&annotated, &sites)?;

        if args.summary {
            let summaries = summarize_sites(&sites);
            let path = derived_path(out_dir, input, name, SUMMARY_SUFFIX);
            Writer::<SummaryTable>::to_path(&path, &summaries)?;
        }

        if args.ratio {
            ratios.push((
                derived_path(out_dir, input, name, RATIO_SUFFIX),
                modification_ratios(table.rows(), args.threshold, name),
            ));
        }
    }

    if args.gene_list.is_some() && !args.ratio {
        warn!("--gene-list only applies to modification ratios; pass --ratio to use it");
    }

    if args.ratio {
        let (paths, mut conditions): (Vec<PathBuf>, Vec<Vec<TranscriptRatio>>) =
            ratios.into_iter().unzip();
        if let Some(list) = &args.gene_list {
            let listed = read_transcript_list(list)?;
            info!("read {} transcripts from {}", listed.len(), list.display());
            retain_listed(&mut conditions, &listed);
        }
        retain_common(&mut conditions);
        for (path, condition) in paths.iter().zip(&conditions) {
            Writer::<RatioTable>::to_path(path, condition)?;
        }
    }

    Ok(())
}

/// Resolves the directory receiving derived tables, creating it if needed.
///
/// `None` means "next to each input".
fn prepare_output(args: &Args) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let Some(out) = &args.out else {
        return Ok(None);
    };

    let dir = if args.m6a.len() == 1 {
        out.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
    } else {
        Some(out.clone())
    };
    if let Some(dir) = &dir {
        fs::create_dir_all(dir)?;
    }
    Ok(dir.or_else(|| Some(PathBuf::from("."))))
}

fn derived_path(out_dir: Option<&Path>, input: &Path, name: &str, suffix: &str) -> PathBuf {
    let file_name = format!("{name}{suffix}");
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}
