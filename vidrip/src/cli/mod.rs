use anyhow::Result;
use clap::{Parser, Subcommand};

mod identify;
mod options;
mod probe;
mod rip;

pub use identify::IdentifyCommand;
pub use options::ConfigArgs;
pub use probe::ProbeCommand;
pub use rip::RipCommand;

#[derive(Parser, Debug)]
#[command(name = "vidrip")]
#[command(about = "Download, decrypt and remux titles from Telia and Go3")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire a title and write `<title>-final.mp4`
    Rip(RipCommand),
    /// Show the stream and track selection for a title without downloading
    Probe(ProbeCommand),
    /// Print the service, content id and title parsed from a URL
    Identify(IdentifyCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Rip(cmd) => cmd.run().await,
            Command::Probe(cmd) => cmd.run().await,
            Command::Identify(cmd) => cmd.run(),
        }
    }
}
