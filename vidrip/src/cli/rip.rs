use anyhow::{Result, bail};
use clap::Parser;
use tokio::signal;
use tracing::info;

use crate::drm::LicenseClient;
use crate::media::{ExternalTools, Outcome, Pipeline};
use crate::service::HttpCatalog;

use super::ConfigArgs;

#[derive(Parser, Debug)]
pub struct RipCommand {
    /// Content page URL
    #[arg(env = "URL")]
    pub url: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl RipCommand {
    pub async fn run(self) -> Result<()> {
        let config = self.config.into_config()?;
        config.validate()?;

        info!(
            output_dir = %config.output_dir.display(),
            backend = ?config.license.backend,
            "starting"
        );

        let catalog = HttpCatalog::new(config.sessions.clone(), config.http_timeout)?;
        let keys = LicenseClient::from_config(&config.license, config.http_timeout)?;
        let tools = ExternalTools::new(config.tools.clone(), config.tool_timeout);
        let pipeline = Pipeline::new(catalog, keys, tools, config);

        // Dropping the run kills any running child process.
        let outcome = tokio::select! {
            outcome = pipeline.run(&self.url) => outcome?,
            _ = signal::ctrl_c() => bail!("Interrupted"),
        };

        match outcome {
            Outcome::AlreadyComplete(path) => println!("Already complete: {}", path.display()),
            Outcome::Completed(path) => println!("Saved {}", path.display()),
        }

        Ok(())
    }
}
