use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A configured channel, before token resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub policy: ChannelPolicy,
}

/// How a channel's upstream URL is obtained.
///
/// Every client-facing channel id maps to exactly one policy for the
/// lifetime of the process; policy is configuration, never derived at
/// runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelPolicy {
    /// The upstream URL rotates with captured tokens. Falls back to a
    /// built-in default (expected stale, but keeps the channel addressable)
    /// when the store has nothing better.
    Token {
        player_url: String,
        default_url: String,
    },
    /// Fixed upstream with a static header set; the relay proxies every
    /// nested manifest and media segment itself.
    Static {
        master_url: String,
        base_url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl Channel {
    pub fn is_token_backed(&self) -> bool {
        matches!(self.policy, ChannelPolicy::Token { .. })
    }
}

/// A channel entry in a registry snapshot, with its upstream resolved.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub id: String,
    pub name: String,
    pub group: String,
    pub upstream: ResolvedUpstream,
}

/// The concrete upstream a request handler talks to.
#[derive(Debug, Clone)]
pub enum ResolvedUpstream {
    /// Current tokenized manifest URL plus the provider's header triple.
    Token {
        url: String,
        headers: Vec<(String, String)>,
        from_store: bool,
    },
    /// Fixed master/base URLs plus the channel's static header set.
    Static {
        master_url: String,
        base_url: String,
        headers: Vec<(String, String)>,
    },
}
