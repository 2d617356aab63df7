use clap::{Parser, Subcommand};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use hashalign::aligner::stats::AlignerStats;
use hashalign::aligner::{AlignerConfig, SeedBudget};
use hashalign::batch::align_batch;
use hashalign::defaults;
use hashalign::fasta::{load_reference, AltMarkingPolicy};
use hashalign::index::KmerHashIndex;
use hashalign::io::fastq::FastqReader;
use hashalign::io::sam::SamWriter;
use hashalign::scoring::affine_gap::{AffineGapParams, AffineGapScorer};

#[derive(Parser)]
#[command(name = "hashalign")]
#[command(about = "hashalign - hash-index seed-and-extend DNA read aligner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align reads against a reference genome
    Align {
        /// Reference FASTA (.fa, .fa.gz)
        #[arg(value_name = "REF.FA")]
        reference: PathBuf,

        /// Input FASTQ file (.fq, .fq.gz)
        #[arg(value_name = "READS.FQ")]
        reads: PathBuf,

        // ===== Seeding =====
        /// Seed length used for the index
        #[arg(short = 's', long, value_name = "INT", default_value_t = defaults::SEED_LENGTH)]
        seed_len: usize,

        /// Skip seeds with more than INT hits
        #[arg(short = 'n', long, value_name = "INT", default_value_t = defaults::MAX_HITS_TO_CONSIDER)]
        max_hits: usize,

        /// Absolute seed budget per read (0 = coverage-based)
        #[arg(short = 'x', long, value_name = "INT", default_value_t = 0)]
        max_seeds: usize,

        /// Seed budget as a multiple of readLen/seedLen (used when -x is 0)
        #[arg(long, value_name = "FLOAT", default_value_t = defaults::SEED_COVERAGE)]
        seed_coverage: f64,

        // ===== Scoring =====
        /// Maximum reported edit distance
        #[arg(short = 'd', long, value_name = "INT", default_value_t = defaults::MAX_K)]
        max_edit_distance: u32,

        /// Extra edit distance explored beyond the best score
        #[arg(short = 'e', long, value_name = "INT", default_value_t = defaults::EXTRA_SEARCH_DEPTH)]
        extra_search_depth: u32,

        /// Score with Landau-Vishkin only (skip the affine-gap pass)
        #[arg(long)]
        no_affine_gap: bool,

        // ===== ALT handling =====
        /// Treat ALT contigs like the primary assembly
        #[arg(long)]
        no_alt_awareness: bool,

        /// Emit the best ALT alignment alongside a non-ALT primary
        #[arg(long)]
        emit_alt_alignments: bool,

        /// Contig names to mark as ALT (repeatable)
        #[arg(long = "alt-name", value_name = "NAME")]
        alt_names: Vec<String>,

        /// Contig names never marked ALT (repeatable)
        #[arg(long = "non-alt-name", value_name = "NAME")]
        non_alt_names: Vec<String>,

        /// Contigs at most this long are automatically ALT
        #[arg(long, value_name = "INT", default_value_t = 0)]
        max_auto_alt_size: u64,

        /// Prefer a non-ALT alignment within INT of the best score
        #[arg(long, value_name = "INT", default_value_t = defaults::MAX_SCORE_GAP_TO_PREFER_NON_ALT)]
        max_alt_score_gap: i32,

        // ===== Secondary alignments =====
        /// Report secondaries within INT of the best score (negative = off)
        #[arg(long, value_name = "INT", default_value_t = -1)]
        secondary_max_edit: i32,

        /// Most secondary alignments to report per read
        #[arg(long, value_name = "INT", default_value_t = defaults::MAX_SECONDARY_RESULTS)]
        max_secondary: usize,

        /// Secondary alignments allowed per contig (negative = unlimited)
        #[arg(long, value_name = "INT", default_value_t = -1)]
        max_secondary_per_contig: i32,

        // ===== Input/Output =====
        /// Output SAM file (default: stdout)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Number of threads (default: all available cores)
        #[arg(short = 't', long, value_name = "INT")]
        threads: Option<usize>,

        /// Reads per batch
        #[arg(long, value_name = "INT", default_value_t = 100_000)]
        batch_size: usize,

        /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(short = 'v', long, value_name = "INT", default_value_t = defaults::VERBOSITY)]
        verbosity: i32,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Align {
            reference,
            reads,
            seed_len,
            max_hits,
            max_seeds,
            seed_coverage,
            max_edit_distance,
            extra_search_depth,
            no_affine_gap,
            no_alt_awareness,
            emit_alt_alignments,
            alt_names,
            non_alt_names,
            max_auto_alt_size,
            max_alt_score_gap,
            secondary_max_edit,
            max_secondary,
            max_secondary_per_contig,
            output,
            threads,
            batch_size,
            verbosity,
        } => {
            let log_level = match verbosity {
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

            let num_threads = threads.unwrap_or_else(num_cpus::get).max(1);
            if let Err(e) = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
            {
                log::warn!("thread pool already configured: {}", e);
            }
            log::info!(
                "using {} thread{}",
                num_threads,
                if num_threads == 1 { "" } else { "s" }
            );

            let policy = AltMarkingPolicy {
                opt_in_names: alt_names,
                opt_out_names: non_alt_names,
                max_size_for_automatic_alt: max_auto_alt_size,
            };

            let start = Instant::now();
            let genome = match load_reference(&reference, &policy) {
                Ok(genome) => genome,
                Err(e) => {
                    log::error!("failed to load reference: {}", e);
                    std::process::exit(1);
                }
            };
            log::info!("reference loaded in {:.1}s", start.elapsed().as_secs_f64());

            let start = Instant::now();
            let index = match KmerHashIndex::build(&genome, seed_len) {
                Ok(index) => index,
                Err(e) => {
                    log::error!("failed to build index: {}", e);
                    std::process::exit(1);
                }
            };
            log::info!("index built in {:.1}s", start.elapsed().as_secs_f64());

            let config = AlignerConfig {
                max_hits_to_consider: max_hits,
                max_k: max_edit_distance,
                seed_budget: if max_seeds > 0 {
                    SeedBudget::MaxSeeds(max_seeds)
                } else {
                    SeedBudget::Coverage(seed_coverage)
                },
                extra_search_depth,
                use_affine_gap: !no_affine_gap,
                alt_awareness: !no_alt_awareness,
                emit_alt_alignments,
                max_score_gap_to_prefer_non_alt_alignment: max_alt_score_gap,
                max_secondary_alignments_per_contig: max_secondary_per_contig,
                max_secondary_results: max_secondary.max(1),
                max_edit_distance_for_secondary_results: secondary_max_edit,
                ..AlignerConfig::default()
            };

            let mut fastq = match FastqReader::new(&reads) {
                Ok(reader) => reader,
                Err(e) => {
                    log::error!("failed to open reads: {}", e);
                    std::process::exit(1);
                }
            };

            let mut out: BufWriter<Box<dyn Write>> = match output {
                Some(path) => match std::fs::File::create(&path) {
                    Ok(file) => BufWriter::new(Box::new(file)),
                    Err(e) => {
                        log::error!("failed to create {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                None => BufWriter::new(Box::new(std::io::stdout())),
            };

            let slack = (config.max_k + config.extra_search_depth + 1) as usize;
            let mut sam = SamWriter::new(
                AffineGapScorer::new(AffineGapParams::default(), config.max_read_size, slack),
                slack,
            );
            let command_line: String = std::env::args().collect::<Vec<_>>().join(" ");
            if let Err(e) = sam.write_header(&mut out, &genome, &command_line) {
                log::error!("failed to write header: {}", e);
                std::process::exit(1);
            }

            let align_start = Instant::now();
            let mut totals = AlignerStats::default();
            let mut mapped = 0u64;
            loop {
                let batch = match fastq.read_batch(batch_size) {
                    Ok(batch) => batch,
                    Err(e) => {
                        log::error!("failed to read FASTQ batch: {}", e);
                        std::process::exit(1);
                    }
                };
                if batch.is_empty() {
                    break;
                }
                let n = batch.len();
                let (aligned, stats) = match align_batch(&genome, &index, &config, batch.reads) {
                    Ok(result) => result,
                    Err(e) => {
                        log::error!("alignment failed: {}", e);
                        std::process::exit(1);
                    }
                };
                totals.merge(&stats);

                for item in &aligned {
                    if item.primary.is_mapped() {
                        mapped += 1;
                    }
                    let record = sam.write_record(
                        &mut out,
                        &genome,
                        &item.read,
                        &item.primary,
                        false,
                    );
                    let alt = item.first_alt.as_ref().map_or(Ok(()), |alt| {
                        sam.write_record(&mut out, &genome, &item.read, alt, true)
                    });
                    let secondaries = item.secondary.iter().try_for_each(|s| {
                        sam.write_record(&mut out, &genome, &item.read, s, true)
                    });
                    if let Err(e) = record.and(alt).and(secondaries) {
                        log::error!("failed to write SAM record: {}", e);
                        std::process::exit(1);
                    }
                }
                log::debug!("batch of {} reads aligned", n);
            }

            if let Err(e) = out.flush() {
                log::error!("failed to flush output: {}", e);
                std::process::exit(1);
            }

            let elapsed = align_start.elapsed().as_secs_f64();
            totals.log_summary();
            log::info!(
                "{} of {} reads mapped ({:.1}%) in {:.1}s",
                mapped,
                totals.total_reads,
                100.0 * mapped as f64 / totals.total_reads.max(1) as f64,
                elapsed
            );
        }
    }
}
