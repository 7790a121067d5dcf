//! Vanity Ed25519 keypair generator for MeshCore nodes
//!
//! This library derives keypairs in the firmware's expanded private-key
//! format and searches for public keys whose hex form starts with a
//! chosen node-ID prefix.

pub mod error;
pub mod keypair;
pub mod search;
pub mod difficulty;
pub mod stats;
pub mod keyfile;
pub mod display;

pub use error::{KeygenError, Result};

pub use keypair::{
    derive_from_seed,
    clamp_scalar,
    is_clamped,
    to_upper_hex,
    KeyDeriver, KeyPair,
    SEED_LEN, PUBLIC_KEY_LEN, PRIVATE_KEY_LEN,
};

pub use search::{
    search, search_with_stats, spawn_search, spawn_search_with,
    normalize_prefix, validate_hex_prefix,
    CancelTimer, CancelToken, Progress, SearchConfig, SearchEvent, SearchHandle,
    SearchOutcome, SearchResult, SearchState, MAX_PREFIX_LEN,
};

pub use difficulty::{
    prefix_difficulty, format_difficulty, format_duration, estimate_time,
};

pub use stats::{
    SearchStats, format_number, format_speed, luck_factor,
};

pub use keyfile::{KeyFile, default_file_name};

pub use display::{
    create_progress_bar, update_progress, display_success, condense_key,
};
