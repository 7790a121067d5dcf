use crate::error::{KeygenError, Result};
use crate::keypair::KeyDeriver;
use crate::stats::SearchStats;
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Longest meaningful prefix: the full public key hex
pub const MAX_PREFIX_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Emit a progress event every this many attempts
    pub progress_interval: u64,
    /// Failed derivations in a row before the source is declared dead
    pub max_consecutive_failures: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            max_consecutive_failures: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub public_key_hex: String,
    pub private_key_hex: String,
    pub attempts: u64,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub attempts: u64,
    pub rate: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(SearchResult),
    Cancelled { attempts: u64 },
}

/// Messages sent from the search worker to whoever drives the display
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Progress(Progress),
    Found(SearchResult),
    Cancelled { attempts: u64 },
    /// Fatal error mid-search; no result follows
    Failed(String),
}

/// Idle -> Searching -> {Found, Cancelled} -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchState {
    Idle = 0,
    Searching = 1,
    Found = 2,
    Cancelled = 3,
}

impl SearchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SearchState::Searching,
            2 => SearchState::Found,
            3 => SearchState::Cancelled,
            _ => SearchState::Idle,
        }
    }
}

/// Cooperative cancellation flag shared between caller and worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancel once `timeout` has passed, from a background timer thread.
    ///
    /// Dropping or disarming the returned timer stops the thread at once
    /// without cancelling, so it never outlives the search it guards.
    pub fn cancel_after(&self, timeout: Duration) -> CancelTimer {
        let token = self.clone();
        let (disarm_tx, disarm_rx) = mpsc::channel::<()>();
        let thread = std::thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarm_rx.recv_timeout(timeout) {
                debug!(?timeout, "search timed out");
                token.cancel();
            }
        });
        CancelTimer {
            disarm: Some(disarm_tx),
            thread: Some(thread),
        }
    }
}

/// Pending timeout started by [`CancelToken::cancel_after`]
#[must_use = "dropping the timer disarms it"]
pub struct CancelTimer {
    disarm: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CancelTimer {
    /// Stop the timer without cancelling and wait for its thread to exit
    pub fn disarm(mut self) {
        self.disarm.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Whether the timer thread has exited, fired or disarmed
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for CancelTimer {
    fn drop(&mut self) {
        self.disarm.take();
    }
}

/// Upper-case a target prefix for comparison against key hex
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().to_uppercase()
}

/// Validate user input before handing it to the engine
pub fn validate_hex_prefix(prefix: &str) -> Result<String> {
    let prefix = normalize_prefix(prefix);
    if prefix.is_empty() {
        return Err(KeygenError::InvalidPrefix(
            "Prefix cannot be empty".to_string(),
        ));
    }
    if let Some(ch) = prefix.chars().find(|ch| !ch.is_ascii_hexdigit()) {
        return Err(KeygenError::InvalidPrefix(format!(
            "Invalid character '{}'. Use only hex characters (0-9, A-F)",
            ch
        )));
    }
    // All ASCII from here, so the byte length is the character count
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(KeygenError::InvalidPrefix(format!(
            "Prefix is {} characters; a public key has only {}",
            prefix.len(),
            MAX_PREFIX_LEN
        )));
    }
    Ok(prefix)
}

/// Search for a keypair whose public key hex starts with `target_prefix`.
///
/// Blocks until a match is found or `cancel` fires. Each attempt draws a
/// fresh seed; nothing carries over between attempts. An empty prefix
/// matches on the first attempt.
pub fn search<R, F>(
    deriver: &mut KeyDeriver<R>,
    target_prefix: &str,
    config: &SearchConfig,
    cancel: &CancelToken,
    on_progress: F,
) -> Result<SearchOutcome>
where
    R: RngCore + CryptoRng,
    F: FnMut(Progress),
{
    let stats = SearchStats::new();
    search_with_stats(deriver, target_prefix, config, cancel, &stats, on_progress)
}

/// Same as [`search`] but reports into caller-owned counters
pub fn search_with_stats<R, F>(
    deriver: &mut KeyDeriver<R>,
    target_prefix: &str,
    config: &SearchConfig,
    cancel: &CancelToken,
    stats: &SearchStats,
    mut on_progress: F,
) -> Result<SearchOutcome>
where
    R: RngCore + CryptoRng,
    F: FnMut(Progress),
{
    let target = normalize_prefix(target_prefix);
    let interval = config.progress_interval.max(1);
    let mut consecutive_failures: u32 = 0;

    debug!(prefix = %target, "starting prefix search");

    loop {
        if cancel.is_cancelled() {
            let attempts = stats.attempts();
            debug!(attempts, "search cancelled");
            return Ok(SearchOutcome::Cancelled { attempts });
        }

        let pair = match deriver.derive() {
            Ok(pair) => {
                consecutive_failures = 0;
                pair
            }
            Err(e) => {
                let failures = stats.record_failure();
                consecutive_failures += 1;
                warn!(error = %e, failures, "skipping failed key derivation");
                if consecutive_failures >= config.max_consecutive_failures {
                    error!(consecutive_failures, "random source stopped producing seeds");
                    return Err(KeygenError::RandomnessUnavailable(format!(
                        "{} consecutive derivation failures, last: {}",
                        consecutive_failures, e
                    )));
                }
                continue;
            }
        };

        let attempts = stats.record_attempt();
        let public_key_hex = pair.public_key_hex();

        // Check pattern match
        if public_key_hex.starts_with(&target) {
            let elapsed_seconds = stats.elapsed().as_secs_f64();
            info!(attempts, elapsed_seconds, public_key = %public_key_hex, "found matching key");
            return Ok(SearchOutcome::Found(SearchResult {
                public_key_hex,
                private_key_hex: pair.private_key_hex(),
                attempts,
                elapsed_seconds,
            }));
        }

        if attempts % interval == 0 {
            on_progress(Progress {
                attempts,
                rate: stats.rate(),
            });
        }
    }
}

/// A search running on its own worker thread
pub struct SearchHandle {
    events: Receiver<SearchEvent>,
    cancel: CancelToken,
    state: Arc<AtomicU8>,
    stats: Arc<SearchStats>,
    worker: JoinHandle<Result<SearchOutcome>>,
}

impl SearchHandle {
    /// Progress, result and cancellation events in the order they happened
    pub fn events(&self) -> &Receiver<SearchEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Live counters, readable while the worker runs
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker to stop and return its outcome
    pub fn join(self) -> Result<SearchOutcome> {
        self.worker
            .join()
            .map_err(|_| KeygenError::Worker("search thread panicked".to_string()))?
    }
}

/// Start a search on a worker thread using the OS random source.
///
/// A random source that fails at startup is reported here, before any
/// attempt is made.
pub fn spawn_search(prefix: &str, config: SearchConfig) -> Result<SearchHandle> {
    let deriver = KeyDeriver::from_os_rng()?;
    spawn_search_with(deriver, prefix, config)
}

/// Start a search on a worker thread with a caller-supplied deriver
pub fn spawn_search_with<R>(
    mut deriver: KeyDeriver<R>,
    prefix: &str,
    config: SearchConfig,
) -> Result<SearchHandle>
where
    R: RngCore + CryptoRng + Send + 'static,
{
    let (tx, rx): (Sender<SearchEvent>, Receiver<SearchEvent>) = mpsc::channel();
    let cancel = CancelToken::new();
    let state = Arc::new(AtomicU8::new(SearchState::Idle as u8));
    let stats = Arc::new(SearchStats::new());
    let target = prefix.to_string();

    let worker = {
        let worker_cancel = cancel.clone();
        let worker_state = Arc::clone(&state);
        let worker_stats = Arc::clone(&stats);

        state.store(SearchState::Searching as u8, Ordering::SeqCst);
        std::thread::Builder::new()
            .name("keygen-search".to_string())
            .spawn(move || {
                // Progress is advisory; a closed receiver is not an error
                let progress_tx = tx.clone();
                let outcome = search_with_stats(
                    &mut deriver,
                    &target,
                    &config,
                    &worker_cancel,
                    &worker_stats,
                    |progress| {
                        let _ = progress_tx.send(SearchEvent::Progress(progress));
                    },
                );

                let (next_state, event) = match &outcome {
                    Ok(SearchOutcome::Found(result)) => {
                        (SearchState::Found, SearchEvent::Found(result.clone()))
                    }
                    Ok(SearchOutcome::Cancelled { attempts }) => (
                        SearchState::Cancelled,
                        SearchEvent::Cancelled {
                            attempts: *attempts,
                        },
                    ),
                    Err(e) => (SearchState::Idle, SearchEvent::Failed(e.to_string())),
                };
                worker_state.store(next_state as u8, Ordering::SeqCst);
                let _ = tx.send(event);
                outcome
            })
            .map_err(|e| {
                state.store(SearchState::Idle as u8, Ordering::SeqCst);
                KeygenError::Worker(e.to_string())
            })?
    };

    Ok(SearchHandle {
        events: rx,
        cancel,
        state,
        stats,
        worker,
    })
}
