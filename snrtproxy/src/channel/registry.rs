use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::store::{TokenMap, TokenStore};

use super::config::ChannelSet;
use super::types::{ChannelPolicy, ResolvedChannel, ResolvedUpstream};

/**
    Immutable view of every channel with its upstream resolved.

    Built wholesale and swapped atomically; request handlers take one
    snapshot up front and never observe a partially-updated mapping.
*/
pub struct RegistrySnapshot {
    pub generation: u64,
    order: Vec<String>,
    channels: HashMap<String, ResolvedChannel>,
}

impl RegistrySnapshot {
    pub fn get(&self, id: &str) -> Option<&ResolvedChannel> {
        self.channels.get(id)
    }

    /// Channels in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedChannel> {
        self.order.iter().filter_map(|id| self.channels.get(id))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Resolve every configured channel against a token map.
///
/// Token-backed channels take the stored URL when one is present and
/// non-empty, falling back to the built-in default. Static channels are
/// never touched by store data.
pub fn build_snapshot(sets: &[ChannelSet], tokens: &TokenMap, generation: u64) -> RegistrySnapshot {
    let mut order = Vec::new();
    let mut channels = HashMap::new();

    for set in sets {
        let auth_headers = set.provider.auth_headers();

        for channel in &set.channels {
            let upstream = match &channel.policy {
                ChannelPolicy::Token { default_url, .. } => {
                    let stored = tokens
                        .get(&channel.id)
                        .filter(|url| !url.trim().is_empty());
                    ResolvedUpstream::Token {
                        url: stored.cloned().unwrap_or_else(|| default_url.clone()),
                        headers: auth_headers.clone(),
                        from_store: stored.is_some(),
                    }
                }
                ChannelPolicy::Static {
                    master_url,
                    base_url,
                    headers,
                } => ResolvedUpstream::Static {
                    master_url: master_url.clone(),
                    base_url: base_url.clone(),
                    headers: headers
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                },
            };

            order.push(channel.id.clone());
            channels.insert(
                channel.id.clone(),
                ResolvedChannel {
                    id: channel.id.clone(),
                    name: channel.name.clone(),
                    group: set.provider.group.clone(),
                    upstream,
                },
            );
        }
    }

    RegistrySnapshot {
        generation,
        order,
        channels,
    }
}

/**
    Registry of client-facing channels, hot-swappable from the token store.

    The only shared mutable state on the serving path. Readers clone the
    current `Arc<RegistrySnapshot>` once per request; `rebuild()` swaps the
    reference wholesale, so in-flight requests keep their old generation
    intact.
*/
pub struct ChannelRegistry {
    sets: Vec<ChannelSet>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    generation: AtomicU64,
}

impl ChannelRegistry {
    pub fn new(sets: Vec<ChannelSet>, tokens: &TokenMap) -> Self {
        let snapshot = Arc::new(build_snapshot(&sets, tokens, 0));
        Self {
            sets,
            snapshot: RwLock::new(snapshot),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot; cheap to clone, taken once per request.
    pub fn current(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    /// Rebuild from the store's current contents and swap wholesale.
    pub fn rebuild(&self, store: &TokenStore) -> Arc<RegistrySnapshot> {
        let tokens = store.load();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let next = Arc::new(build_snapshot(&self.sets, &tokens, generation));
        *self.snapshot.write().unwrap() = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::channel::config::Provider;
    use crate::channel::types::Channel;

    fn test_set() -> ChannelSet {
        ChannelSet {
            provider: Provider {
                group: "Test".to_string(),
                referer: "https://player.example/".to_string(),
                origin: "https://example.com".to_string(),
                user_agent: "test-agent".to_string(),
                stream_url: r"cdn\.example/.*\.m3u8".to_string(),
                metadata_url: None,
                preferred_paths: Vec::new(),
            },
            channels: vec![
                Channel {
                    id: "a".to_string(),
                    name: "Channel A".to_string(),
                    policy: ChannelPolicy::Token {
                        player_url: "https://player.example/a".to_string(),
                        default_url: "https://cdn.example/a/playlist_dvr.m3u8".to_string(),
                    },
                },
                Channel {
                    id: "s".to_string(),
                    name: "Static S".to_string(),
                    policy: ChannelPolicy::Static {
                        master_url: "https://cdn.other/s/master.m3u8".to_string(),
                        base_url: "https://cdn.other/s/".to_string(),
                        headers: HashMap::new(),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_store_url_overrides_default() {
        let tokens =
            TokenMap::from([("a".to_string(), "https://cdn.example/a/p.m3u8?token=T".to_string())]);
        let snapshot = build_snapshot(&[test_set()], &tokens, 0);

        match &snapshot.get("a").unwrap().upstream {
            ResolvedUpstream::Token {
                url, from_store, ..
            } => {
                assert_eq!(url, "https://cdn.example/a/p.m3u8?token=T");
                assert!(from_store);
            }
            other => panic!("unexpected upstream: {:?}", other),
        }
    }

    #[test]
    fn test_empty_store_falls_back_to_default() {
        let snapshot = build_snapshot(&[test_set()], &TokenMap::new(), 0);

        match &snapshot.get("a").unwrap().upstream {
            ResolvedUpstream::Token {
                url, from_store, ..
            } => {
                assert_eq!(url, "https://cdn.example/a/playlist_dvr.m3u8");
                assert!(!from_store);
            }
            other => panic!("unexpected upstream: {:?}", other),
        }
    }

    #[test]
    fn test_static_channels_ignore_store_data() {
        let tokens = TokenMap::from([("s".to_string(), "https://evil/override.m3u8".to_string())]);
        let snapshot = build_snapshot(&[test_set()], &tokens, 0);

        match &snapshot.get("s").unwrap().upstream {
            ResolvedUpstream::Static { master_url, .. } => {
                assert_eq!(master_url, "https://cdn.other/s/master.m3u8");
            }
            other => panic!("unexpected upstream: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_preserves_config_order() {
        let snapshot = build_snapshot(&[test_set()], &TokenMap::new(), 0);
        let ids: Vec<&str> = snapshot.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "s"]);
    }

    #[test]
    fn test_rebuild_swaps_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        let registry = ChannelRegistry::new(vec![test_set()], &store.load());

        // A reader holding the old snapshot keeps a self-consistent view
        // across the swap.
        let before = registry.current();
        assert_eq!(before.generation, 0);

        store
            .merge(&HashMap::from([(
                "a".to_string(),
                Some("https://cdn.example/a/p.m3u8?token=T2".to_string()),
            )]))
            .unwrap();
        let after = registry.rebuild(&store);

        assert_eq!(after.generation, 1);
        match &after.get("a").unwrap().upstream {
            ResolvedUpstream::Token { url, .. } => {
                assert_eq!(url, "https://cdn.example/a/p.m3u8?token=T2");
            }
            other => panic!("unexpected upstream: {:?}", other),
        }

        // Old generation is untouched.
        match &before.get("a").unwrap().upstream {
            ResolvedUpstream::Token { url, .. } => {
                assert_eq!(url, "https://cdn.example/a/playlist_dvr.m3u8");
            }
            other => panic!("unexpected upstream: {:?}", other),
        }

        assert_eq!(registry.current().generation, 1);
    }
}
