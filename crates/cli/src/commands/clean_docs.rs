//! Clean-docs command handler.

use super::CommandContext;
use clap::Args;
use std::path::PathBuf;
use unichat_core::AppResult;

/// Delete files in the documents directory that are not configured
#[derive(Args, Debug)]
pub struct CleanDocsCommand {
    /// Documents directory (overrides the configured one)
    #[arg(short, long)]
    pub documents_dir: Option<PathBuf>,

    /// Output removed paths as JSON
    #[arg(long)]
    pub json: bool,
}

impl CleanDocsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> AppResult<()> {
        let pipeline = ctx
            .pipeline()
            .with_documents_dir(self.documents_dir.clone());
        let removed = pipeline
            .remove_stale_documents(&ctx.config.knowledge.documents)
            .await?;

        if self.json {
            let paths: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&paths)?);
        } else if removed.is_empty() {
            println!("Nothing to remove.");
        } else {
            for path in &removed {
                println!("removed {}", path.display());
            }
        }

        Ok(())
    }
}
