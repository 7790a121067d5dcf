use chrono::Utc;
use clap::Parser;
use meshcore_keygen::{
    create_progress_bar, default_file_name, display_success, format_difficulty, format_number,
    format_speed, prefix_difficulty, search, spawn_search, update_progress, validate_hex_prefix,
    CancelToken, KeyDeriver, KeyFile, SearchConfig, SearchEvent, SearchOutcome, SearchResult,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Target that no upper-case hex string can start with
const NEVER_MATCHES: &str = "G";

const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "meshcore-keygen")]
#[command(about = "Generate MeshCore-compatible Ed25519 keypairs with a chosen public key prefix", long_about = None)]
struct Cli {
    /// Node ID prefix (hex characters, case-insensitive)
    /// Example: 'A7' finds public keys starting with 'A7...'
    #[arg(value_name = "PREFIX", required_unless_present = "benchmark")]
    prefix: Option<String>,

    /// Stop searching after this many seconds
    #[arg(short = 't', long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write the key file to this path
    #[arg(short = 'o', long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write the key file to meshcore_<prefix>_<timestamp>.json
    #[arg(short = 's', long)]
    save: bool,

    /// Print complete keys instead of a condensed view
    #[arg(long)]
    full: bool,

    /// Measure key generation speed for SECS seconds (default: 10)
    #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "10")]
    benchmark: Option<u64>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(secs) = cli.benchmark {
        return run_benchmark(Duration::from_secs(secs));
    }

    let raw_prefix = cli.prefix.as_deref().unwrap_or_default().trim().to_string();
    let prefix = match validate_hex_prefix(&raw_prefix) {
        Ok(prefix) => prefix,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Example: {} A7", env!("CARGO_PKG_NAME"));
            return ExitCode::FAILURE;
        }
    };

    let difficulty = prefix_difficulty(&prefix);
    println!("\nSearching for public keys like: {}...", prefix);
    println!("Difficulty: 1 in {}", format_difficulty(difficulty));
    if let Some(secs) = cli.timeout {
        println!("Timeout: {}s", secs);
    }
    println!("\nPress Ctrl+C to stop\n");

    let handle = match spawn_search(&prefix, SearchConfig::default()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = handle.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }
    // Disarmed when dropped at the end of main
    let _timer = cli
        .timeout
        .map(|secs| handle.cancel_token().cancel_after(Duration::from_secs(secs)));

    // Drain worker events until the search ends
    let pb = create_progress_bar(&format!("{}...", prefix));
    while let Ok(event) = handle.events().recv() {
        match event {
            SearchEvent::Progress(progress) => update_progress(&pb, &progress, difficulty),
            SearchEvent::Found(_) | SearchEvent::Cancelled { .. } | SearchEvent::Failed(_) => break,
        }
    }
    pb.finish_and_clear();

    match handle.join() {
        Ok(SearchOutcome::Found(result)) => {
            display_success(&result, &prefix, difficulty, cli.full);
            if cli.save || cli.output.is_some() {
                if let Err(code) = save_key_file(&result, &raw_prefix, cli.output) {
                    return code;
                }
            }
            println!("\nWARNING: Keep your private key secure! Anyone with it can impersonate your node.");
            ExitCode::SUCCESS
        }
        Ok(SearchOutcome::Cancelled { attempts }) => {
            println!("Search stopped after {} attempts.", format_number(attempts));
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn save_key_file(
    result: &SearchResult,
    raw_prefix: &str,
    output: Option<PathBuf>,
) -> Result<(), ExitCode> {
    let now = Utc::now();
    let path = output.unwrap_or_else(|| PathBuf::from(default_file_name(raw_prefix, now)));
    let file = KeyFile::new(result, raw_prefix, now);

    match file.write_to(&path) {
        Ok(()) => {
            println!("\nKey file written to {}", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("Error writing {}: {}", path.display(), e);
            Err(ExitCode::FAILURE)
        }
    }
}

fn run_benchmark(duration: Duration) -> ExitCode {
    println!("\nRunning {}-second benchmark...\n", duration.as_secs());

    let mut deriver = match KeyDeriver::from_os_rng() {
        Ok(deriver) => deriver,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancelToken::new();
    let _timer = cancel.cancel_after(duration);

    let pb = create_progress_bar("benchmark");
    let outcome = search(
        &mut deriver,
        NEVER_MATCHES,
        &SearchConfig::default(),
        &cancel,
        |progress| {
            pb.set_message(format!(
                "[Benchmark] Keys: {} | Speed: {}",
                format_number(progress.attempts),
                format_speed(progress.rate as f64)
            ))
        },
    );
    pb.finish_and_clear();

    match outcome {
        Ok(SearchOutcome::Cancelled { attempts }) => {
            let secs = duration.as_secs_f64().max(f64::EPSILON);
            println!("Benchmark Results:");
            println!("  Total keys:  {}", format_number(attempts));
            println!("  Avg speed:   {}", format_speed(attempts as f64 / secs));
            ExitCode::SUCCESS
        }
        Ok(SearchOutcome::Found(_)) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
