use anyhow::Result;
use clap::Parser;

use crate::channel::{self, ChannelPolicy};

#[derive(Parser, Debug)]
pub struct ListChannelsCommand;

impl ListChannelsCommand {
    pub async fn run(self) -> Result<()> {
        for set in channel::config::load_all()? {
            println!("{}:", set.provider.group);
            for ch in &set.channels {
                let kind = match ch.policy {
                    ChannelPolicy::Token { .. } => "token",
                    ChannelPolicy::Static { .. } => "static",
                };
                println!("  - {} ({}, {})", ch.id, ch.name, kind);
            }
        }
        Ok(())
    }
}
