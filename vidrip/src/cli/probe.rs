use anyhow::{Context, Result};
use clap::Parser;

use crate::drm::extract_pssh;
use crate::media::{ExternalTools, MediaTools, parse_report, select_formats};
use crate::service::{Catalog, HttpCatalog, Transport, resolve_identity};

use super::ConfigArgs;

#[derive(Parser, Debug)]
pub struct ProbeCommand {
    /// Content page URL
    #[arg(env = "URL")]
    pub url: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ProbeCommand {
    pub async fn run(self) -> Result<()> {
        // No license endpoint is needed here, so the full validation is skipped.
        let config = self.config.into_config()?;

        let identity = resolve_identity(&self.url)?;
        println!(
            "Probing {} {} ({})",
            identity.service, identity.content_id, identity.title
        );
        println!();

        let catalog = HttpCatalog::new(config.sessions.clone(), config.http_timeout)?;
        let stream = catalog
            .stream_info(&identity)
            .await
            .context("Failed to discover stream")?;

        println!("=== Stream ===");
        println!("  URL:       {}", stream.url);
        println!("  Transport: {}", stream.transport);
        println!("  DRM:       {}", stream.drm_protected);

        if stream.drm_protected && stream.transport == Transport::Dash {
            let pssh = match catalog.fetch_manifest(&identity, &stream.url).await {
                Ok(manifest) => extract_pssh(&manifest)
                    .map(|pssh| pssh.map(|p| p.as_str().to_string()))
                    .unwrap_or_else(|e| Some(format!("(unreadable: {e})"))),
                Err(e) => Some(format!("(unavailable: {e})")),
            };
            println!("  PSSH:      {}", pssh.as_deref().unwrap_or("(none)"));
        }

        let tools = ExternalTools::new(config.tools.clone(), config.tool_timeout);
        let report = tools
            .list_formats(&stream.url)
            .await
            .context("Format probe failed")?;
        let candidates = parse_report(&report, &config.languages);

        println!();
        println!("=== Tracks ===");
        for candidate in &candidates {
            println!(
                "  {:<24} {:?} {:>6} {:?}",
                candidate.id,
                candidate.kind,
                candidate
                    .bitrate_kbps
                    .map_or("?".to_string(), |b| format!("{b}k")),
                candidate.language
            );
        }

        println!();
        println!("=== Selection ===");
        match select_formats(&candidates, config.require_audio) {
            Ok(selection) => {
                println!("  Video: {}", selection.video.id);
                println!(
                    "  Audio: {}",
                    selection.audio.as_ref().map_or("(none)", |a| a.id.as_str())
                );
            }
            Err(e) => println!("  {e}"),
        }

        Ok(())
    }
}
