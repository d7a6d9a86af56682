use asvmerge::cli;
use asvmerge::cli::Commands;
use asvmerge::constants::*;
use asvmerge::input::MergeInput;
use asvmerge::merge;
use asvmerge::report;
use asvmerge::utils::log_memory_usage;
use clap::Parser;
use flexi_logger::style;
use flexi_logger::{DeferredNow, Duplicate, FileSpec, Record};
use std::path::{Path, PathBuf};
use std::time::Instant;

fn main() {
    let total_start_time = Instant::now();
    let args = cli::Cli::parse();
    let Commands::Merge(merge_args) = &args.command;

    let output_dir = initialize_setup(&args, merge_args);

    let input = MergeInput::from_path(Path::new(&merge_args.input));
    let samples = match input.resolve() {
        Ok(samples) => samples,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    if samples.is_empty() {
        log::warn!("No sample files found in {}. Nothing to do.", merge_args.input);
        return;
    }
    log_memory_usage(true, &format!("Loaded {} sample(s)", samples.len()));

    let options = merge_args.to_options();
    let mut any_failed = false;
    for sample in &samples {
        match merge::merge_sample(sample, &options) {
            Ok(table) => {
                let out_path = output_dir.join(format!("{}{}", sample.name, MERGE_TSV_SUFFIX));
                if let Err(e) = report::write_merge_tsv(&table, &out_path) {
                    log::error!("Could not write {}: {}", out_path.display(), e);
                    any_failed = true;
                    continue;
                }
                log::info!(
                    "Sample {}: wrote {} merged pairing(s) to {}",
                    sample.name,
                    table.rows.len(),
                    out_path.display()
                );
            }
            Err(e) => {
                // A faulted sample produces no rows; other samples proceed.
                log::error!("{}", e);
                any_failed = true;
            }
        }
    }

    log::info!(
        "Done. Total time elapsed: {:?}",
        total_start_time.elapsed()
    );
    if any_failed {
        std::process::exit(1);
    }
}

fn my_own_format_colored(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let mut paintlevel = record.level();
    if paintlevel == log::Level::Info {
        paintlevel = log::Level::Debug;
    }
    write!(
        w,
        "({}) {} [{}] {}",
        now.format(TS_DASHES_BLANK_COLONS_DOT_BLANK),
        style(paintlevel).paint(record.level().to_string()),
        record.module_path().unwrap_or(""),
        &record.args()
    )
}

fn my_own_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "({}) {} [{}] {}",
        now.format(TS_DASHES_BLANK_COLONS_DOT_BLANK),
        record.level(),
        record.module_path().unwrap_or(""),
        &record.args()
    )
}

fn initialize_setup(args: &cli::Cli, merge_args: &cli::MergeArgs) -> PathBuf {
    if merge_args.markdown_help {
        clap_markdown::print_help_markdown::<cli::Cli>();
        std::process::exit(0);
    }

    if !Path::new(&merge_args.input).exists() {
        eprintln!(
            "ERROR [asvmerge] Input path {} does not exist. Exiting.",
            merge_args.input
        );
        std::process::exit(1);
    }

    let output_dir = Path::new(merge_args.output_dir.as_str());
    if !output_dir.exists() {
        std::fs::create_dir_all(output_dir).expect("Could not create output directory. Exiting.");
    } else if !output_dir.is_dir() {
        eprintln!(
            "ERROR [asvmerge] Output directory specified by `-o` exists and is not a directory."
        );
        std::process::exit(1);
    }

    // Initialize logger with CLI-specified level
    let filespec = FileSpec::default()
        .directory(output_dir)
        .basename("asvmerge");
    flexi_logger::Logger::try_with_str(args.log_level_filter().to_string())
        .expect("Something went wrong with logging")
        .log_to_file(filespec)
        .duplicate_to_stderr(Duplicate::Info)
        .format(my_own_format_colored)
        .format_for_files(my_own_format)
        .start()
        .expect("Something went wrong with creating log file");

    let cli_args: Vec<String> = std::env::args().collect();
    log::info!("COMMAND: {}", cli_args.join(" "));
    log::info!("VERSION: {}", env!("CARGO_PKG_VERSION"));

    rayon::ThreadPoolBuilder::new()
        .num_threads(merge_args.threads)
        .build_global()
        .unwrap();

    output_dir.to_path_buf()
}
