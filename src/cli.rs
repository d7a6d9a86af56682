use crate::constants::{CLI_HEADINGS, DEFAULT_MAX_MISMATCH, DEFAULT_MIN_OVERLAP};
use crate::types::MergeOptions;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "asvmerge",
    about = "asvmerge - reconcile forward/reverse denoised amplicon clusters of paired-end reads into merged consensus sequences",
    version,
    author,
    disable_help_subcommand = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level
    #[arg(short, long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge forward/reverse denoised cluster pairs per sample
    #[command(name = "merge")]
    Merge(MergeArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct MergeArgs {
    /// Input sample file (JSON) or a directory of sample files
    #[arg(required = true, value_name = "SAMPLES")]
    pub input: String,

    /// Output directory for results (created if it does not exist)
    #[arg(short, long, default_value = "asvmerge-out")]
    pub output_dir: String,

    /// Number of threads to use for parallel processing
    #[arg(short, long, default_value = "8")]
    pub threads: usize,

    /// Minimum number of matching overlap positions required to accept a merged pair
    #[arg(long, default_value_t = DEFAULT_MIN_OVERLAP, help_heading = CLI_HEADINGS[0])]
    pub min_overlap: usize,

    /// Maximum tolerated mismatches plus indels in the overlap
    #[arg(long, default_value_t = DEFAULT_MAX_MISMATCH, help_heading = CLI_HEADINGS[0])]
    pub max_mismatch: usize,

    /// Skip alignment and join the pair with a 10-N spacer
    #[arg(long, help_heading = CLI_HEADINGS[0])]
    pub just_concatenate: bool,

    /// Trim single-stranded overhangs off the consensus
    #[arg(long, help_heading = CLI_HEADINGS[0])]
    pub trim_overhang: bool,

    /// Keep rejected pairings in the output tables
    #[arg(long, help_heading = CLI_HEADINGS[1])]
    pub return_rejects: bool,

    /// Metadata columns to copy from the parent cluster records (repeatable)
    #[arg(long, value_name = "COL", help_heading = CLI_HEADINGS[1])]
    pub propagate_col: Vec<String>,

    /// Report per-sample merge summaries at info level
    #[arg(long)]
    pub verbose: bool,

    /// Print help in markdown format
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

impl MergeArgs {
    pub fn to_options(&self) -> MergeOptions {
        MergeOptions {
            min_overlap: self.min_overlap,
            max_mismatch: self.max_mismatch,
            return_rejects: self.return_rejects,
            propagate_col: self.propagate_col.clone(),
            just_concatenate: self.just_concatenate,
            trim_overhang: self.trim_overhang,
            verbose: self.verbose,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl Cli {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.log_level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}
