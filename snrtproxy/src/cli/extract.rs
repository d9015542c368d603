use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::channel::{self, ChannelPolicy};
use crate::extract::chrome::ChromeCapture;
use crate::extract::{CaptureBudget, CaptureSession, Confidence, UrlFilter, extractor};
use crate::store::TokenStore;
use crate::util;

#[derive(Parser, Debug)]
pub struct ExtractCommand {
    /// Token store file to merge results into
    #[arg(short, long, default_value = "snrt_streams.json")]
    pub token_file: String,

    /// Run the capture browser with a visible window
    #[arg(long)]
    pub headed: bool,

    /// Minimum remaining token validity in seconds; staler captures are
    /// only used as a last resort
    #[arg(long, default_value = "1800")]
    pub min_validity: u64,

    /// Only extract the given channel ids (default: all token-backed)
    #[arg(short, long)]
    pub channel: Vec<String>,
}

impl ExtractCommand {
    pub async fn run(self) -> Result<()> {
        let sets = channel::config::load_all()?;
        let headless = !self.headed;
        let min_validity = Duration::from_secs(self.min_validity);
        let budget = CaptureBudget::default();

        // All channel sessions run in parallel: tokens live for minutes,
        // and a sequential pass would hand the later channels tokens that
        // are already half spent.
        let mut handles = Vec::new();

        for set in &sets {
            let filter = Arc::new(UrlFilter::from_provider(&set.provider)?);
            let preferred = Arc::new(set.provider.preferred_paths.clone());

            for ch in &set.channels {
                let ChannelPolicy::Token { player_url, .. } = &ch.policy else {
                    continue;
                };
                if !self.channel.is_empty() && !self.channel.contains(&ch.id) {
                    continue;
                }

                let id = ch.id.clone();
                let player_url = player_url.clone();
                let filter = Arc::clone(&filter);
                let preferred = Arc::clone(&preferred);

                handles.push(tokio::spawn(async move {
                    println!("[extract] Extracting {}...", id);

                    let mut session = match ChromeCapture::launch(headless).await {
                        Ok(session) => session,
                        Err(e) => {
                            eprintln!("[extract] {}: failed to launch browser: {}", id, e);
                            return (id, None);
                        }
                    };

                    let candidates =
                        match extractor::run_capture(&mut session, &player_url, &filter, &budget)
                            .await
                        {
                            Ok(candidates) => candidates,
                            Err(e) => {
                                eprintln!("[extract] {}: capture failed: {}", id, e);
                                Vec::new()
                            }
                        };
                    let _ = session.close().await;

                    let selection = extractor::select_best(
                        &candidates,
                        &preferred,
                        util::time::now(),
                        min_validity,
                    );
                    match &selection {
                        Some(s) if s.confidence == Confidence::Degraded => println!(
                            "[extract] {}: only stale captures, keeping most recent anyway",
                            id
                        ),
                        Some(s) => match s.expires_at {
                            Some(expiry) => {
                                println!("[extract] {}: ok (expires at {})", id, expiry)
                            }
                            None => println!("[extract] {}: ok", id),
                        },
                        None => println!("[extract] {}: no stream URLs observed", id),
                    }

                    (id, selection.map(|s| s.url))
                }));
            }
        }

        if handles.is_empty() {
            println!("No token-backed channels matched");
            return Ok(());
        }

        let mut batch: HashMap<String, Option<String>> = HashMap::new();
        for handle in handles {
            if let Ok((id, url)) = handle.await {
                batch.insert(id, url);
            }
        }

        let extracted = batch.values().filter(|url| url.is_some()).count();
        println!();
        println!("{}/{} channels extracted", extracted, batch.len());

        let store = TokenStore::new(&self.token_file);
        store.merge(&batch)?;
        println!("Merged results into {}", self.token_file);

        Ok(())
    }
}
