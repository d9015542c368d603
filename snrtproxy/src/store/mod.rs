use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Channel id → current best upstream manifest URL.
pub type TokenMap = HashMap<String, String>;

/**
    Durable store of captured manifest URLs, one JSON file.

    The on-disk format is a flat object mapping channel id to the URL
    string, or null for "no known good token". A missing or corrupt file
    reads as an empty mapping so the relay degrades to configured defaults
    instead of crashing.
*/
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current mapping, skipping null and empty entries.
    pub fn load(&self) -> TokenMap {
        match self.read_raw() {
            Ok(raw) => raw
                .into_iter()
                .filter_map(|(channel, url)| {
                    let url = url?;
                    if url.trim().is_empty() {
                        None
                    } else {
                        Some((channel, url))
                    }
                })
                .collect(),
            Err(e) => {
                eprintln!(
                    "[store] Error loading {}: {}, using defaults",
                    self.path.display(),
                    e
                );
                TokenMap::new()
            }
        }
    }

    /// Merge an extraction batch into the store.
    ///
    /// Only channels present with a non-empty URL overwrite their prior
    /// value; channels absent from the batch, or present without a URL,
    /// keep whatever was stored before. A partial extraction failure
    /// therefore never erases a working channel.
    pub fn merge(&self, batch: &HashMap<String, Option<String>>) -> Result<()> {
        let mut existing = self.read_raw().unwrap_or_default();

        for (channel, url) in batch {
            if let Some(url) = url
                && !url.trim().is_empty()
            {
                existing.insert(channel.clone(), Some(url.clone()));
            }
        }

        let json = serde_json::to_string_pretty(&existing)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }

    /// Modification time of the store file, if it exists.
    pub fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Seconds since the last write, if the store exists.
    pub fn age_secs(&self) -> Option<i64> {
        let elapsed = self.last_modified()?.elapsed().ok()?;
        Some(elapsed.as_secs() as i64)
    }

    fn read_raw(&self) -> Result<HashMap<String, Option<String>>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let raw = serde_json::from_str(&content)
            .with_context(|| format!("Malformed token store {}", self.path.display()))?;

        Ok(raw)
    }
}
