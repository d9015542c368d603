use anyhow::{Result, anyhow};
use include_dir::{Dir, include_dir};
use serde::{Deserialize, Serialize};

use super::types::Channel;

/// Embedded channel definition directory.
static CHANNELS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/channels");

/// One provider group: shared upstream/capture settings plus its channels.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelSet {
    pub provider: Provider,
    pub channels: Vec<Channel>,
}

/// Provider-wide settings shared by every channel in a set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Provider {
    /// Group title used in the aggregate playlist.
    pub group: String,
    /// Header triple the provider requires on manifest fetches.
    pub referer: String,
    pub origin: String,
    pub user_agent: String,
    /// Regex matching the genuine stream-manifest URL family emitted by
    /// the player.
    pub stream_url: String,
    /// Regex matching the token-metadata URL family, which carries no
    /// usable manifest and is ignored during capture.
    #[serde(default)]
    pub metadata_url: Option<String>,
    /// Path markers of DVR-capable / variant-selectable manifests,
    /// preferred during selection.
    #[serde(default)]
    pub preferred_paths: Vec<String>,
}

impl Provider {
    /// The fixed header triple sent with token-backed upstream fetches.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Referer".to_string(), self.referer.clone()),
            ("Origin".to_string(), self.origin.clone()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ]
    }
}

/// Load every channel set embedded under `channels/`.
pub fn load_all() -> Result<Vec<ChannelSet>> {
    let mut sets = Vec::new();

    for file in CHANNELS_DIR.files() {
        let path = file.path();
        if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            let content = file
                .contents_utf8()
                .ok_or_else(|| anyhow!("Failed to read {:?} as UTF-8", path))?;

            let set: ChannelSet = serde_yaml::from_str(content)
                .map_err(|e| anyhow!("Failed to parse {:?}: {}", path, e))?;

            sets.push(set);
        }
    }

    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::types::ChannelPolicy;

    #[test]
    fn test_load_all_sets() {
        let sets = load_all().expect("Failed to load channel sets");
        assert!(!sets.is_empty(), "No channel sets found");

        for set in &sets {
            assert!(!set.provider.group.is_empty());
            assert!(!set.channels.is_empty());
            regex::Regex::new(&set.provider.stream_url).expect("Invalid stream_url regex");
            if let Some(ref metadata) = set.provider.metadata_url {
                regex::Regex::new(metadata).expect("Invalid metadata_url regex");
            }
        }
    }

    #[test]
    fn test_snrt_set_policies() {
        let sets = load_all().expect("Failed to load channel sets");
        let snrt = sets
            .iter()
            .find(|s| s.provider.group == "SNRT Morocco")
            .expect("SNRT set missing");

        let aoula = snrt
            .channels
            .iter()
            .find(|c| c.id == "al-aoula")
            .expect("al-aoula missing");
        assert!(aoula.is_token_backed());

        let deux_m = snrt
            .channels
            .iter()
            .find(|c| c.id == "2m")
            .expect("2m missing");
        match &deux_m.policy {
            ChannelPolicy::Static { base_url, .. } => {
                assert!(base_url.ends_with('/'));
            }
            other => panic!("2m should be static, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_headers_triple() {
        let sets = load_all().expect("Failed to load channel sets");
        let headers = sets[0].provider.auth_headers();
        let names: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["Referer", "Origin", "User-Agent"]);
    }
}
