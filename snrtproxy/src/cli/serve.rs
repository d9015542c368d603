use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::{signal, sync::watch};

use crate::channel::{self, ChannelRegistry, ResolvedUpstream};
use crate::store::TokenStore;
use crate::util;

#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// HTTP server port
    #[arg(short, long, default_value = "9000")]
    pub port: u16,

    /// Token store file written by the extract command
    #[arg(short, long, default_value = "snrt_streams.json")]
    pub token_file: String,

    /// Seconds between token store freshness checks
    #[arg(long, default_value = "300")]
    pub reload_interval: u64,
}

impl Default for ServeCommand {
    fn default() -> Self {
        Self {
            port: 9000,
            token_file: "snrt_streams.json".to_string(),
            reload_interval: 300,
        }
    }
}

impl ServeCommand {
    pub async fn run(self) -> Result<()> {
        // Shutdown signal
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        println!("Loading channels...");
        let sets = channel::config::load_all()?;
        if sets.is_empty() {
            eprintln!("No channel definitions found in channels/");
            return Ok(());
        }

        let store = Arc::new(TokenStore::new(&self.token_file));
        let tokens = store.load();
        match store.age_secs() {
            Some(age) => println!(
                "Loaded {} tokens from {} (age: {})",
                tokens.len(),
                self.token_file,
                util::time::format_age(age)
            ),
            None => {
                println!("No token file found, using default URLs (will likely be blocked)")
            }
        }

        let registry = Arc::new(ChannelRegistry::new(sets, &tokens));
        for entry in registry.current().iter() {
            let origin = match &entry.upstream {
                ResolvedUpstream::Token {
                    from_store: true, ..
                } => "tokenized",
                ResolvedUpstream::Token { .. } => "default",
                ResolvedUpstream::Static { .. } => "static",
            };
            println!("Channel: {} ({}, {})", entry.name, entry.id, origin);
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));

        println!();
        println!("HTTP relay listening on http://localhost:{}", self.port);
        println!("  Playlist: http://localhost:{}/playlist.m3u", self.port);
        println!("  Reload:   http://localhost:{}/reload", self.port);
        println!();

        let server_handle = {
            let registry = Arc::clone(&registry);
            let store = Arc::clone(&store);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = crate::server::run_server(addr, registry, store, shutdown_rx).await
                {
                    eprintln!("[server] Error: {}", e);
                }
            })
        };

        let watcher_handle = {
            let registry = Arc::clone(&registry);
            let store = Arc::clone(&store);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(channel::watcher::run_reload_watcher(
                registry,
                store,
                Duration::from_secs(self.reload_interval),
                shutdown_rx,
            ))
        };

        // Wait for Ctrl+C
        signal::ctrl_c().await?;
        println!("\nShutting down...");
        let _ = shutdown_tx.send(true);

        let _ = server_handle.await;
        let _ = watcher_handle.await;

        println!("Done.");
        Ok(())
    }
}
