use anyhow::Result;
use clap::{Parser, Subcommand};

mod extract;
mod list_channels;
mod serve;

pub use extract::ExtractCommand;
pub use list_channels::ListChannelsCommand;
pub use serve::ServeCommand;

#[derive(Parser, Debug)]
#[command(name = "snrtproxy")]
#[command(about = "Token-aware HLS relay for SNRT live channels")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP relay server (default)
    Serve(ServeCommand),
    /// Capture fresh stream tokens for token-backed channels
    Extract(ExtractCommand),
    /// List configured channels and exit
    ListChannels(ListChannelsCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let command = self
            .command
            .unwrap_or(Command::Serve(ServeCommand::default()));

        match command {
            Command::Serve(cmd) => cmd.run().await,
            Command::Extract(cmd) => cmd.run().await,
            Command::ListChannels(cmd) => cmd.run().await,
        }
    }
}
