use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one search, shared between the worker and the UI
pub struct SearchStats {
    attempts: AtomicU64,
    failures: AtomicU64,
    start_time: Instant,
}

impl SearchStats {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count one completed derivation and return the new total
    #[inline]
    pub fn record_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one derivation that failed and was skipped
    pub fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current attempt count
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Get number of skipped (failed) derivations
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Calculate current speed (keys/sec)
    pub fn speed(&self) -> f64 {
        let attempts = self.attempts() as f64;
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            attempts / elapsed
        } else {
            0.0
        }
    }

    /// Attempts per second, floored
    pub fn rate(&self) -> u64 {
        self.speed().floor() as u64
    }
}

impl Default for SearchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate luck factor (how lucky was the find?)
/// < 1.0 = unlucky (took longer than expected)
/// > 1.0 = lucky (found faster than expected)
pub fn luck_factor(expected_attempts: u64, attempts: u64) -> f64 {
    if expected_attempts == 0 || attempts == 0 {
        return 1.0;
    }
    expected_attempts as f64 / attempts as f64
}

/// Format a number with comma separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format speed in human-readable form
pub fn format_speed(speed: f64) -> String {
    if speed >= 1_000_000.0 {
        format!("{:.2}M keys/sec", speed / 1_000_000.0)
    } else if speed >= 1_000.0 {
        format!("{:.2}K keys/sec", speed / 1_000.0)
    } else {
        format!("{:.0} keys/sec", speed)
    }
}
