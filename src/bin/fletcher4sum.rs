use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use fletcher4::{
    fletcher::format_checksum,
    table::{self, ChecksumRecord, DEFAULT_READ_SIZE},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fletcher4sum",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    /// Files to checksum, `-` or nothing reads stdin
    files: Vec<PathBuf>,

    /// Print a JSON checksum table instead of one line per file
    #[arg(long)]
    json: bool,

    /// Verify the files listed in a JSON checksum table
    #[arg(long, value_name = "TABLE", conflicts_with_all = ["files", "json"])]
    check: Option<PathBuf>,

    /// Bytes requested per read
    #[arg(long, default_value_t = DEFAULT_READ_SIZE)]
    read_size: usize,

    /// Worker threads, defaults to the number of cpus
    #[arg(long)]
    jobs: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let jobs = cli.jobs.unwrap_or_else(num_cpus::get).max(1);
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
        warn!("Failed to size the thread pool to {jobs} threads: {e}");
    }

    if let Some(table_path) = &cli.check {
        return check(table_path, cli.read_size);
    }

    let stdin_path = PathBuf::from("-");
    let args = if cli.files.is_empty() { vec![stdin_path.clone()] } else { cli.files.clone() };
    let mut records = Vec::new();
    let mut failed = false;

    // Files are hashed in parallel up front, stdin where `-` shows up so the output keeps argument order.
    // Like sha256sum, a repeated `-` sees an already drained stdin.
    let files: Vec<PathBuf> = args.iter().filter(|path| **path != stdin_path).cloned().collect();
    let mut file_results = table::checksum_files(&files, cli.read_size).into_iter().map(|(_, res)| res);
    let mut stdin = io::stdin().lock();

    for path in args {
        let res = if path == stdin_path {
            table::checksum_reader(&mut stdin, cli.read_size)
        } else if let Some(res) = file_results.next() {
            res
        } else {
            continue;
        };

        match res {
            Ok(checksum) => records.push(ChecksumRecord { path, checksum }),
            Err(e) => {
                error!("Failed to checksum {}: {e}", path.display());
                failed = true;
            }
        }
    }

    let mut out = io::stdout().lock();
    let res = if cli.json {
        serde_json::to_writer_pretty(&mut out, &records)
            .map_err(io::Error::from)
            .and_then(|_| writeln!(out))
    } else {
        records
            .iter()
            .try_for_each(|record| writeln!(out, "{}  {}", format_checksum(&record.checksum), record.path.display()))
    };
    if let Err(e) = res {
        error!("Failed to write output: {e}");
        failed = true;
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn check(table_path: &Path, read_size: usize) -> ExitCode {
    let records = match table::load_table(table_path) {
        Ok(records) => records,
        Err(e) => {
            error!("Failed to load checksum table {}: {e}", table_path.display());
            return ExitCode::FAILURE;
        }
    };

    let mismatches = table::verify_table(&records, read_size);
    let mut mismatches_iter = mismatches.iter().peekable();
    for (index, record) in records.iter().enumerate() {
        match mismatches_iter.next_if(|m| m.index == index) {
            None => println!("{}: OK", record.path.display()),
            Some(m) => {
                match &m.actual {
                    Ok(actual) => warn!(
                        "Invalid checksum for {}, expected: {} got: {}",
                        m.path.display(),
                        format_checksum(&m.expected),
                        format_checksum(actual)
                    ),
                    Err(e) => warn!("Couldn't read {}: {e}", m.path.display()),
                }
                println!("{}: FAILED", record.path.display());
            }
        }
    }

    info!("{} of {} files failed verification", mismatches.len(), records.len());
    if mismatches.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
