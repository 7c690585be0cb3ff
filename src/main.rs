use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::time::{Duration, Instant};

use sfxmap::align::{AlignMode, Aligner, MultiHitOpt, ScoringParams};
use sfxmap::index::{bwt, sa, IndexMeta, SuffixIndex};
use sfxmap::io::{self, report, RecordSource, SeqRecord};
use sfxmap::mapping::{LocatorKind, MapOpt, ReadMapper};
use sfxmap::util::alphabet::Alphabet;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "sfxmap", author, version, about = "Suffix-tree read mapper with affine-gap alignment", arg_required_else_help = true)]
struct Cli {
    /// 日志级别：1=error 2=warn 3=info 4=debug 5=trace
    #[arg(short = 'v', long = "verbosity", global = true, default_value_t = 3)]
    verbosity: u8,
    #[command(subcommand)]
    command: Commands,
}

/// 打分参数：命令行默认值，可被参数文件覆盖
#[derive(Args, Debug)]
struct ScoringArgs {
    #[arg(long = "match", default_value_t = 2, allow_hyphen_values = true)]
    match_score: i32,
    #[arg(long = "mismatch", default_value_t = -1, allow_hyphen_values = true)]
    mismatch_penalty: i32,
    #[arg(long = "gap-open", default_value_t = -2, allow_hyphen_values = true)]
    gap_open: i32,
    #[arg(long = "gap-ext", default_value_t = -1, allow_hyphen_values = true)]
    gap_extend: i32,
    /// 参数文件（match / mismatch / h / g）
    #[arg(short = 'p', long = "params")]
    params: Option<String>,
}

impl ScoringArgs {
    fn resolve(&self) -> Result<ScoringParams> {
        let base = ScoringParams {
            match_score: self.match_score,
            mismatch_penalty: self.mismatch_penalty,
            gap_open_penalty: self.gap_open,
            gap_extend_penalty: self.gap_extend,
        };
        match &self.params {
            Some(path) => io::params::read_params(path, base),
            None => Ok(base),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and prepare the suffix tree index of a reference
    Index {
        /// Reference FASTA file (first record is indexed)
        reference: String,
        /// Alphabet file; DNA (ACGT) if omitted
        #[arg(short = 'a', long = "alphabet")]
        alphabet: Option<String>,
        /// Output prefix for index files
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Minimum exact match length for candidate anchors
        #[arg(long = "min-match", default_value_t = 25)]
        min_match: usize,
        /// Check the leaf array against an independently built suffix array
        #[arg(long)]
        verify: bool,
        /// Also write the BWT of the reference to <output>.bwt
        #[arg(long)]
        bwt: bool,
    },
    /// Map reads (FASTA or FASTQ) against a prepared index
    Map {
        /// Path to index (.sfx)
        #[arg(short = 'i', long = "index")]
        index: String,
        /// Reads file
        reads: String,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        out: Option<String>,
        #[command(flatten)]
        scoring: ScoringArgs,
        /// Minimum identity percentage
        #[arg(long = "identity", default_value_t = 90.0)]
        identity: f64,
        /// Minimum query coverage percentage
        #[arg(long = "coverage", default_value_t = 80.0)]
        coverage: f64,
        /// Re-prepare the index with another minimum match length
        #[arg(long = "min-match")]
        min_match: Option<usize>,
        /// Locate candidates without suffix links
        #[arg(long = "brute-force")]
        brute_force: bool,
        /// Align at most this many anchors per read
        #[arg(long = "max-anchors")]
        max_anchors: Option<usize>,
        /// Per-read alignment time limit in milliseconds
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
    },
    /// Align the first two records of a FASTA file and print a report
    Align {
        /// FASTA file with at least two records
        fasta: String,
        /// Alignment mode: local | global
        #[arg(short, long, default_value = "local")]
        mode: String,
        #[command(flatten)]
        scoring: ScoringArgs,
        /// Alphabet file; symbols outside it are dropped from both sequences
        #[arg(short = 'a', long = "alphabet")]
        alphabet: Option<String>,
        /// Report up to this many non-overlapping local alignments
        #[arg(long = "hits", default_value_t = 1)]
        hits: usize,
        /// Stop collecting hits once this percentage of the shorter sequence is covered
        #[arg(long = "coverage-ceiling", default_value_t = 90.0)]
        coverage_ceiling: f64,
        /// Dump the DP table (small inputs only)
        #[arg(long = "show-table")]
        show_table: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Index { reference, alphabet, output, min_match, verify, bwt } => {
            run_index(&reference, alphabet.as_deref(), &output, min_match, verify, bwt)
        }
        Commands::Map {
            index,
            reads,
            out,
            scoring,
            identity,
            coverage,
            min_match,
            brute_force,
            max_anchors,
            timeout_ms,
            threads,
        } => {
            let opt = MapOpt {
                min_identity: identity,
                min_coverage: coverage,
                locator: if brute_force { LocatorKind::BruteForce } else { LocatorKind::Linked },
                timeout: timeout_ms.map(Duration::from_millis),
                max_anchors,
            };
            run_map(&index, &reads, out.as_deref(), scoring.resolve()?, opt, min_match, threads)
        }
        Commands::Align { fasta, mode, scoring, alphabet, hits, coverage_ceiling, show_table } => {
            let mode: AlignMode = mode.parse()?;
            let opt = MultiHitOpt { max_hits: hits, coverage_ceiling };
            run_align(&fasta, mode, scoring.resolve()?, alphabet.as_deref(), opt, show_table)
        }
    }
}

fn load_alphabet(path: Option<&str>) -> Result<Alphabet> {
    match path {
        Some(p) => Alphabet::from_file(p),
        None => Ok(Alphabet::dna()),
    }
}

fn run_index(
    reference: &str,
    alphabet: Option<&str>,
    output: &str,
    min_match: usize,
    verify: bool,
    write_bwt: bool,
) -> Result<()> {
    let alphabet = load_alphabet(alphabet)?;
    let mut records = io::open_records(reference)?;
    let rec = records
        .next_record()?
        .ok_or_else(|| anyhow!("reference file '{}' contains no sequences", reference))?;
    if records.next_record()?.is_some() {
        log::warn!("reference file '{}' has more than one record; only '{}' is indexed", reference, rec.name);
    }

    let (genome, dropped) = alphabet.filter(&rec.seq);
    if dropped > 0 {
        log::warn!("dropped {} symbols outside the alphabet from '{}'", dropped, rec.name);
    }
    if genome.is_empty() {
        bail!("reference '{}' has no symbols from the alphabet", rec.name);
    }
    log::info!("reference: {} ({} bp)", rec.name, genome.len());

    let t0 = Instant::now();
    let mut idx = SuffixIndex::build(&rec.name, &genome, &alphabet, min_match)
        .map_err(|e| anyhow!("cannot build index for '{}': {}", rec.name, e))?;
    let tree = &idx.tree;
    log::info!(
        "suffix tree: {} nodes ({} internal, {} leaves) in {:.2?}",
        tree.num_nodes(),
        tree.num_internal(),
        tree.num_leaves(),
        t0.elapsed()
    );
    let repeat = tree.longest_repeat();
    log::info!("longest repeat: {} bp", repeat.len());
    log::debug!("longest repeat: {}", String::from_utf8_lossy(repeat));

    if verify {
        match sa::first_mismatch(idx.tree.text(), &idx.leaves) {
            None => log::info!("leaf array matches the suffix array ({} suffixes)", idx.leaves.len()),
            Some(at) => bail!("leaf array differs from the suffix array at rank {}", at),
        }
    }

    if write_bwt {
        let path = format!("{}.bwt", output);
        let data = bwt::bwt_from_leaves(idx.tree.text(), &idx.leaves);
        std::fs::write(&path, data).map_err(|e| anyhow!("cannot write BWT to '{}': {}", path, e))?;
        log::info!("BWT saved: {}", path);
    }

    idx.set_meta(IndexMeta {
        reference_file: Some(reference.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let out_path = format!("{}.sfx", output);
    idx.save_to_file(&out_path)
        .map_err(|e| anyhow!("cannot write index to '{}': {}", out_path, e))?;
    log::info!("index saved: {}", out_path);
    Ok(())
}

fn run_map(
    index_path: &str,
    reads_path: &str,
    out_path: Option<&str>,
    params: ScoringParams,
    opt: MapOpt,
    min_match: Option<usize>,
    threads: usize,
) -> Result<()> {
    let mut idx = SuffixIndex::load_from_file(index_path)
        .map_err(|e| anyhow!("cannot load index '{}': {}", index_path, e))?;
    if let Some(m) = min_match {
        idx.reprepare(m);
    }
    log::info!(
        "index: {} ({} bp, min match {})",
        idx.name,
        idx.tree.genome_len(),
        idx.min_match_len
    );

    let threads = threads.max(1);
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        log::warn!("failed to configure thread pool: {}", e);
    }

    let records: Vec<SeqRecord> = io::open_records(reads_path)?.read_all()?;
    log::info!("reads: {} from {}", records.len(), reads_path);

    let mapper = ReadMapper::new(&idx, params, opt)?;
    let t0 = Instant::now();
    let (outcomes, stats) = mapper.map_batch(&records).map_err(|e| anyhow!("mapping failed: {}", e))?;
    log::info!("mapped {} reads in {:.2?}", stats.queries, t0.elapsed());

    let mut out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).map_err(|e| anyhow!("cannot create output '{}': {}", p, e))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    report::write_hits(&mut out, &outcomes)?;
    out.flush()?;

    eprintln!("{}", stats);
    Ok(())
}

fn run_align(
    fasta: &str,
    mode: AlignMode,
    params: ScoringParams,
    alphabet: Option<&str>,
    opt: MultiHitOpt,
    show_table: bool,
) -> Result<()> {
    let records = io::open_records(fasta)?.read_all()?;
    if records.len() < 2 {
        bail!("'{}' must contain at least two sequences, found {}", fasta, records.len());
    }
    let alphabet = alphabet.map(Alphabet::from_file).transpose()?;
    let clean = |rec: &SeqRecord| match &alphabet {
        Some(a) => a.filter(&rec.seq).0,
        None => rec.seq.clone(),
    };
    let (a, b) = (clean(&records[0]), clean(&records[1]));
    let (name_a, name_b) = (records[0].name.as_str(), records[1].name.as_str());

    let mut aligner = Aligner::new(params);
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    if opt.max_hits > 1 {
        if mode != AlignMode::Local {
            bail!("multiple hits require local mode");
        }
        let hits = aligner.align_disjoint(&a, &b, opt)?;
        log::info!("{} non-overlapping alignments", hits.len());
        for (k, aln) in hits.iter().enumerate() {
            writeln!(out, "## hit {}", k + 1)?;
            report::write_alignment(&mut out, name_a, name_b, aln, &params)?;
            writeln!(out)?;
        }
    } else {
        let aln = aligner.align(&a, &b, mode)?;
        if show_table {
            report::write_table(&mut out, &a, &b, aligner.table())?;
            writeln!(out)?;
        }
        report::write_alignment(&mut out, name_a, name_b, &aln, &params)?;
    }
    out.flush()?;
    Ok(())
}
