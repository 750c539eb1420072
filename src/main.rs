use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use gyeet::gfa::read_gfa;
use gyeet::index::{build, GraphIndex};
use gyeet::map_opt::MapOpt;
use gyeet::mapper;

#[derive(Parser)]
#[command(name = "gyeet")]
#[command(about = "Indexed sequence-to-graph mapper for variation graphs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a k-mer index from a variation graph
    Index {
        /// Input GFA file (compacted graph, optionally gzipped)
        #[arg(short = 'g', long, value_name = "FILE")]
        gfa: PathBuf,

        /// Prefix for the index file set
        #[arg(short = 'o', long, value_name = "PREFIX")]
        out: PathBuf,

        /// K-mer length
        #[arg(short = 'k', long, value_name = "INT", default_value = "15")]
        kmer_length: usize,

        /// Maximum number of branching decisions along one walk
        #[arg(short = 'e', long, value_name = "INT", default_value = "8")]
        max_furcations: u64,

        /// Do not seed walks from nodes with degree greater than INT
        #[arg(short = 'D', long, value_name = "INT", default_value = "8")]
        max_degree: usize,

        /// Number of threads (default: all cores)
        #[arg(short = 't', long, value_name = "INT")]
        threads: Option<usize>,

        /// Verbosity: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
        verbosity: i32,
    },

    /// Map sequences to an indexed graph, writing GAF records
    Map {
        /// Load the index from this prefix
        #[arg(short = 'i', long, value_name = "PREFIX")]
        index: PathBuf,

        /// Input FASTA/FASTQ file, optionally gzipped; repeatable
        #[arg(short = 'f', long = "input-file", value_name = "FILE")]
        input_files: Vec<PathBuf>,

        /// Map one sequence given on the command line
        #[arg(short = 's', long = "one-sequence", value_name = "SEQ")]
        one_sequence: Option<String>,

        /// Maximum gap length in chaining
        #[arg(short = 'g', long, value_name = "INT", default_value = "1000")]
        max_gap: u64,

        /// Maximum allowed mismatch rate
        #[arg(short = 'r', long, value_name = "FLOAT", default_value = "0.2")]
        max_mismatch_rate: f64,

        /// Maximum allowed query overlap between chains in superchains
        #[arg(short = 'c', long, value_name = "FLOAT", default_value = "0.75")]
        chain_overlap_max: f64,

        /// Minimum number of anchors in a chain
        #[arg(short = 'a', long, value_name = "INT", default_value = "3")]
        chain_min_n_anchors: usize,

        /// Align the best N superchains
        #[arg(short = 'n', long, value_name = "INT", default_value = "1")]
        align_best_n: usize,

        /// Write chains for each read
        #[arg(short = 'C', long)]
        write_chains: bool,

        /// Write superchains for each read
        #[arg(short = 'S', long)]
        write_superchains: bool,

        /// Chain only, skip base-level alignment
        #[arg(short = 'X', long)]
        dont_align: bool,

        /// Output file (default: stdout)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Number of threads (default: all cores)
        #[arg(short = 't', long, value_name = "INT")]
        threads: Option<usize>,

        /// Verbosity: 1=error, 2=warning, 3=message, 4+=debugging
        #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
        verbosity: i32,
    },
}

fn init_logger(verbosity: i32) {
    let level = match verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn init_threads(threads: Option<usize>) -> usize {
    let requested = threads.unwrap_or_else(num_cpus::get).max(1);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(requested)
        .build_global()
    {
        log::warn!("thread pool already configured: {}", e);
    }
    requested
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            gfa,
            out,
            kmer_length,
            max_furcations,
            max_degree,
            threads,
            verbosity,
        } => {
            init_logger(verbosity);
            let n_threads = init_threads(threads);
            log::info!(
                "building index for {} with {} threads",
                gfa.display(),
                n_threads
            );

            let graph = match read_gfa(&gfa) {
                Ok(g) => g,
                Err(e) => {
                    log::error!("{}: {}", gfa.display(), e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = build(&graph, kmer_length, max_furcations, max_degree, &out) {
                log::error!("index build failed: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Map {
            index,
            input_files,
            one_sequence,
            max_gap,
            max_mismatch_rate,
            chain_overlap_max,
            chain_min_n_anchors,
            align_best_n,
            write_chains,
            write_superchains,
            dont_align,
            output,
            threads,
            verbosity,
        } => {
            init_logger(verbosity);
            let n_threads = init_threads(threads);

            if input_files.is_empty() && one_sequence.is_none() {
                log::error!("nothing to map: give -f or -s");
                std::process::exit(1);
            }

            let idx = match GraphIndex::load(&index) {
                Ok(idx) => idx,
                Err(e) => {
                    log::error!("loading index failed: {}", e);
                    std::process::exit(1);
                }
            };

            let mut opt = MapOpt::default();
            opt.max_gap = max_gap;
            opt.max_mismatch_rate = max_mismatch_rate;
            opt.chain_overlap_max = chain_overlap_max;
            opt.chain_min_n_anchors = chain_min_n_anchors;
            opt.align_best_n = align_best_n;
            opt.write_chains = write_chains;
            opt.write_superchains = write_superchains;
            opt.dont_align = dont_align;
            opt.n_threads = n_threads;

            let mut writer: Box<dyn Write> = match output {
                Some(path) => match File::create(&path) {
                    Ok(file) => Box::new(BufWriter::new(file)),
                    Err(e) => {
                        log::error!("{}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                None => Box::new(BufWriter::new(io::stdout())),
            };

            if !input_files.is_empty() {
                let inputs: Vec<String> = input_files
                    .iter()
                    .map(|p| p.to_string_lossy().to_string())
                    .collect();
                if let Err(e) = mapper::map_reads(&inputs, &idx, &opt, &mut writer) {
                    log::error!("mapping failed: {}", e);
                    std::process::exit(1);
                }
            }
            if let Some(seq) = one_sequence {
                if let Err(e) = mapper::map_sequence(&idx, "unknown", &seq, &opt, &mut writer) {
                    log::error!("mapping failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
