//! Search engine tests against controlled random sources:
//! - failing and flaky seed sources
//! - cancellation and timeouts on the worker thread
//! - independent concurrent searches

use meshcore_keygen::{
    derive_from_seed, search, search_with_stats, spawn_search, spawn_search_with, CancelToken,
    KeyDeriver, KeygenError, SearchConfig, SearchEvent, SearchOutcome, SearchState, SearchStats,
    SEED_LEN,
};
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use std::time::Duration;

/// 'G' never appears in hex output
const UNMATCHABLE: &str = "G";

/// Source that never produces bytes
struct DeadRng;

impl RngCore for DeadRng {
    fn next_u32(&mut self) -> u32 {
        0
    }
    fn next_u64(&mut self) -> u64 {
        0
    }
    fn fill_bytes(&mut self, _dest: &mut [u8]) {}
    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new("entropy source offline".to_string()))
    }
}

impl CryptoRng for DeadRng {}

/// Wraps a seeded generator and fails every `fail_every`-th draw after
/// the first. Failed draws do not advance the inner generator. With
/// `fail_every == 0`, every draw after the first fails.
struct FlakyRng {
    inner: StdRng,
    calls: u64,
    fail_every: u64,
}

impl FlakyRng {
    fn new(seed: u64, fail_every: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            calls: 0,
            fail_every,
        }
    }

    fn should_fail(&self) -> bool {
        self.calls > 1 && (self.fail_every == 0 || self.calls % self.fail_every == 0)
    }
}

impl RngCore for FlakyRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.calls += 1;
        if self.should_fail() {
            return Err(rand::Error::new(format!("injected failure #{}", self.calls)));
        }
        self.inner.try_fill_bytes(dest)
    }
}

impl CryptoRng for FlakyRng {}

/// Fills the n-th draw with the byte `n`
struct CountingRng {
    draws: u8,
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }
    fn next_u64(&mut self) -> u64 {
        0
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.wrapping_add(1);
        dest.fill(self.draws);
    }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for CountingRng {}

fn seeded(seed: u64) -> KeyDeriver<StdRng> {
    KeyDeriver::new(StdRng::seed_from_u64(seed)).unwrap()
}

fn nth_public_hex(seed: u64, position: usize) -> String {
    let mut deriver = seeded(seed);
    let mut hex = String::new();
    for _ in 0..position {
        hex = deriver.derive().unwrap().public_key_hex();
    }
    hex
}

#[test]
fn test_dead_source_is_fatal_at_startup() {
    let err = KeyDeriver::new(DeadRng).err().unwrap();
    assert!(matches!(err, KeygenError::RandomnessUnavailable(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_transient_failures_are_skipped() {
    let target = nth_public_hex(11, 10);
    let mut deriver = KeyDeriver::new(FlakyRng::new(11, 3)).unwrap();
    let stats = SearchStats::new();

    let outcome = search_with_stats(
        &mut deriver,
        &target,
        &SearchConfig::default(),
        &CancelToken::new(),
        &stats,
        |_| {},
    )
    .unwrap();

    match outcome {
        SearchOutcome::Found(result) => {
            assert_eq!(result.attempts, 10);
            assert_eq!(result.public_key_hex, target);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    // The startup draw is attempt 1; draws 3, 6, 9 and 12 failed before
    // the tenth success on draw 14
    assert_eq!(stats.failures(), 4);
}

#[test]
fn test_attempts_match_position_in_fixed_seed_sequence() {
    for position in 1..=3u8 {
        let target = derive_from_seed(&[position; SEED_LEN]).public_key_hex();
        let mut deriver = KeyDeriver::new(CountingRng { draws: 0 }).unwrap();

        let outcome = search(
            &mut deriver,
            &target,
            &SearchConfig::default(),
            &CancelToken::new(),
            |_| {},
        )
        .unwrap();

        match outcome {
            SearchOutcome::Found(result) => {
                assert_eq!(result.attempts, u64::from(position));
                assert_eq!(result.public_key_hex, target);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}

#[test]
fn test_progress_fires_on_success_count_around_failures() {
    // Draws 50, 100, 150 and 200 fail; the 100th success is draw 102 and
    // the 200th is draw 204
    let mut deriver = KeyDeriver::new(FlakyRng::new(14, 50)).unwrap();
    let stats = SearchStats::new();
    let cancel = CancelToken::new();
    let mut seen = Vec::new();

    let outcome = search_with_stats(
        &mut deriver,
        UNMATCHABLE,
        &SearchConfig::default(),
        &cancel,
        &stats,
        |progress| {
            seen.push(progress.attempts);
            if progress.attempts == 200 {
                cancel.cancel();
            }
        },
    )
    .unwrap();

    assert_eq!(seen, vec![100, 200]);
    assert_eq!(outcome, SearchOutcome::Cancelled { attempts: 200 });
    assert_eq!(stats.attempts(), 200);
    assert_eq!(stats.failures(), 4);
}

#[test]
fn test_source_dying_mid_search_aborts() {
    let mut deriver = KeyDeriver::new(FlakyRng::new(12, 0)).unwrap();
    let config = SearchConfig {
        max_consecutive_failures: 5,
        ..SearchConfig::default()
    };

    let err = search(&mut deriver, UNMATCHABLE, &config, &CancelToken::new(), |_| {})
        .err()
        .unwrap();
    assert!(matches!(err, KeygenError::RandomnessUnavailable(_)));
}

#[test]
fn test_worker_reports_fatal_failure() {
    let deriver = KeyDeriver::new(FlakyRng::new(13, 0)).unwrap();
    let config = SearchConfig {
        max_consecutive_failures: 3,
        ..SearchConfig::default()
    };
    let handle = spawn_search_with(deriver, UNMATCHABLE, config).unwrap();

    let events: Vec<SearchEvent> = handle.events().iter().take(1).collect();
    assert!(matches!(events[0], SearchEvent::Failed(_)));
    assert!(handle.join().is_err());
}

#[test]
fn test_worker_cancellation() {
    let handle = spawn_search_with(seeded(21), UNMATCHABLE, SearchConfig::default()).unwrap();
    assert_eq!(handle.state(), SearchState::Searching);

    let mut progress = Vec::new();
    let mut cancelled_at = None;
    for event in handle.events().iter() {
        match event {
            SearchEvent::Progress(p) => {
                progress.push(p.attempts);
                if progress.len() == 3 {
                    handle.cancel();
                }
            }
            SearchEvent::Cancelled { attempts } => {
                cancelled_at = Some(attempts);
                break;
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    let cancelled_at = cancelled_at.expect("cancel event");
    assert!(progress.len() >= 3);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert!(progress.iter().all(|a| a % 100 == 0));
    assert!(cancelled_at >= *progress.last().unwrap());

    assert_eq!(handle.state(), SearchState::Cancelled);
    assert_eq!(
        handle.join().unwrap(),
        SearchOutcome::Cancelled {
            attempts: cancelled_at
        }
    );
}

#[test]
fn test_timeout_layered_on_cancel_token() {
    let handle = spawn_search_with(seeded(22), UNMATCHABLE, SearchConfig::default()).unwrap();
    let timer = handle.cancel_token().cancel_after(Duration::from_millis(50));

    match handle.join().unwrap() {
        SearchOutcome::Cancelled { attempts } => assert!(attempts > 0),
        other => panic!("unexpected outcome: {:?}", other),
    }
    timer.disarm();
}

#[test]
fn test_found_search_sends_single_result() {
    let target = nth_public_hex(23, 4);
    let handle = spawn_search_with(seeded(23), &target, SearchConfig::default()).unwrap();
    let outcome = handle.join();

    assert!(matches!(outcome, Ok(SearchOutcome::Found(ref r)) if r.attempts == 4));
}

#[test]
fn test_event_channel_after_found() {
    let target = nth_public_hex(24, 2);
    let handle = spawn_search_with(seeded(24), &target, SearchConfig::default()).unwrap();

    let events: Vec<SearchEvent> = handle.events().iter().collect();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SearchEvent::Found(ref r) if r.public_key_hex == target));
    assert_eq!(handle.state(), SearchState::Found);
}

#[test]
fn test_concurrent_searches_are_independent() {
    let target_a = nth_public_hex(31, 5);
    let target_b = nth_public_hex(32, 9);

    let a = spawn_search_with(seeded(31), &target_a, SearchConfig::default()).unwrap();
    let b = spawn_search_with(seeded(32), &target_b, SearchConfig::default()).unwrap();

    let result_a = match a.join().unwrap() {
        SearchOutcome::Found(r) => r,
        other => panic!("unexpected outcome: {:?}", other),
    };
    let result_b = match b.join().unwrap() {
        SearchOutcome::Found(r) => r,
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(result_a.attempts, 5);
    assert_eq!(result_b.attempts, 9);
    assert_eq!(result_a.public_key_hex, target_a);
    assert_eq!(result_b.public_key_hex, target_b);
}

#[test]
fn test_os_random_search_single_hex_char() {
    let handle = spawn_search("a", SearchConfig::default()).unwrap();
    match handle.join().unwrap() {
        SearchOutcome::Found(result) => {
            assert!(result.public_key_hex.starts_with('A'));
            assert_eq!(result.private_key_hex.len(), 128);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}
