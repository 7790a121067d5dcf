//! Key file written when the user saves a generated keypair.
//!
//! Layout matches the JSON the web tool offers for download:
//! `public_key`, `private_key`, `generated_at`, `prefix`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::keypair::KeyPair;
use crate::search::SearchResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    pub public_key: String,
    pub private_key: String,
    pub generated_at: String,
    pub prefix: String,
}

impl KeyFile {
    /// Build the artifact for a search result. `prefix` is kept as supplied.
    pub fn new(result: &SearchResult, prefix: &str, now: DateTime<Utc>) -> Self {
        Self {
            public_key: result.public_key_hex.clone(),
            private_key: result.private_key_hex.clone(),
            generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            prefix: prefix.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the file, readable by the owner only on Unix
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and verify the stored keypair
    pub fn key_pair(&self) -> Result<KeyPair> {
        let pair = KeyPair::from_hex(&self.public_key, &self.private_key)?;
        pair.verify()?;
        Ok(pair)
    }
}

/// `meshcore_<prefix>_<YYYY-MM-DDTHH-MM-SS>.json`
pub fn default_file_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("meshcore_{}_{}.json", prefix, now.format("%Y-%m-%dT%H-%M-%S"))
}
