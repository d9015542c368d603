use anyhow::Result;
use clap::Parser;

mod channel;
mod cli;
mod extract;
mod server;
mod store;
mod util;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Args::parse().run().await
}
