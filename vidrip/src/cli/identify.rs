use anyhow::Result;
use clap::Parser;

use crate::service::resolve_identity;

#[derive(Parser, Debug)]
pub struct IdentifyCommand {
    /// Content page URL
    #[arg(env = "URL")]
    pub url: String,
}

impl IdentifyCommand {
    pub fn run(self) -> Result<()> {
        let identity = resolve_identity(&self.url)?;

        println!("service:    {}", identity.service);
        println!("content id: {}", identity.content_id);
        println!("title:      {}", identity.title);

        Ok(())
    }
}
