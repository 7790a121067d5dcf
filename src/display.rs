use crate::difficulty::{estimate_time, format_difficulty, format_duration};
use crate::search::{Progress, SearchResult};
use crate::stats::{format_number, format_speed, luck_factor};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create spinner shown while a search runs
pub fn create_progress_bar(pattern_desc: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(format!("Searching for: {}", pattern_desc));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Update progress bar from a worker progress event
pub fn update_progress(pb: &ProgressBar, progress: &Progress, difficulty: u64) {
    pb.set_message(progress_message(progress, difficulty));
}

fn progress_message(progress: &Progress, difficulty: u64) -> String {
    let progress_pct = (progress.attempts as f64 / difficulty.max(1) as f64 * 100.0).min(99.9);

    let eta = if progress.rate > 0 {
        let remaining = difficulty.saturating_sub(progress.attempts);
        format_duration(estimate_time(remaining, progress.rate))
    } else {
        "calculating...".to_string()
    };

    format!(
        "Attempts: {} | Speed: {} | Progress: {:.1}% | ETA: {}",
        format_number(progress.attempts),
        format_speed(progress.rate as f64),
        progress_pct,
        eta
    )
}

/// Shorten a long hex key to its first and last 8 characters
pub fn condense_key(key: &str) -> String {
    if key.len() <= 19 {
        return key.to_string();
    }
    format!("{}...{}", &key[..8], &key[key.len() - 8..])
}

/// Display success summary for a found key
pub fn display_success(result: &SearchResult, prefix: &str, difficulty: u64, show_full: bool) {
    let luck = luck_factor(difficulty, result.attempts);
    let (public_key, private_key) = if show_full {
        (result.public_key_hex.clone(), result.private_key_hex.clone())
    } else {
        (
            condense_key(&result.public_key_hex),
            condense_key(&result.private_key_hex),
        )
    };

    println!("\n✓ Found key with prefix {}!", prefix.to_uppercase());
    println!("========================");
    println!("Public Key:   {}", public_key);
    println!("Private Key:  {}", private_key);
    println!();
    println!("Statistics:");
    println!("  Keys generated:   {}", format_number(result.attempts));
    println!("  Time elapsed:     {:.2}s", result.elapsed_seconds);
    if result.elapsed_seconds > 0.0 {
        println!(
            "  Average speed:    {}",
            format_speed(result.attempts as f64 / result.elapsed_seconds)
        );
    }
    println!("  Difficulty:       1 in {}", format_difficulty(difficulty));

    if luck > 1.2 {
        println!("  Luck factor:      {:.2}x (found faster than expected!)", luck);
    } else if luck < 0.8 {
        println!("  Luck factor:      {:.2}x (took longer than expected)", luck);
    } else {
        println!("  Luck factor:      {:.2}x (about average)", luck);
    }

    if !show_full {
        println!("\nRun with --full to print complete keys, or --save to write them to a file.");
    }
}
