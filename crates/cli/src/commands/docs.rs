//! Knowledge base commands.
//!
//! `docs list` shows what the next setup will load; `docs set` rewrites the
//! document list and persona in the config file.

use super::CommandContext;
use clap::{Args, Subcommand};
use std::path::Path;
use unichat_core::{AppError, AppResult};

/// Show or change the configured documents
#[derive(Args, Debug)]
pub struct DocsCommand {
    #[command(subcommand)]
    pub action: DocsAction,
}

#[derive(Subcommand, Debug)]
pub enum DocsAction {
    /// Show the configured documents and robot description
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the document list and/or the robot description
    Set {
        /// Filenames relative to the documents directory (none keeps the current list)
        documents: Vec<String>,

        /// New robot description
        #[arg(long)]
        robot_desc: Option<String>,

        /// Also delete files in the documents directory that are no longer listed
        #[arg(long)]
        clean: bool,
    },
}

impl DocsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> AppResult<()> {
        match &self.action {
            DocsAction::List { json } => list(ctx, *json),
            DocsAction::Set {
                documents,
                robot_desc,
                clean,
            } => set(ctx, documents, robot_desc.clone(), *clean).await,
        }
    }
}

fn list(ctx: &CommandContext, json: bool) -> AppResult<()> {
    let dir = ctx.config.documents_dir();
    let knowledge = &ctx.config.knowledge;
    let status = document_status(&dir, &knowledge.documents);

    if json {
        let documents: Vec<serde_json::Value> = status
            .iter()
            .map(|(name, present)| serde_json::json!({ "name": name, "present": present }))
            .collect();
        let output = serde_json::json!({
            "documentsDir": dir.display().to_string(),
            "documents": documents,
            "robotDesc": knowledge.robot_desc,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Documents directory: {}", dir.display());
    if status.is_empty() {
        println!("No documents configured.");
    }
    for (name, present) in &status {
        let mark = if *present { "" } else { " [missing]" };
        println!("  {}{}", name, mark);
    }
    println!("\nRobot description:\n  {}", knowledge.robot_desc);
    Ok(())
}

async fn set(
    ctx: &CommandContext,
    documents: &[String],
    robot_desc: Option<String>,
    clean: bool,
) -> AppResult<()> {
    let documents = (!documents.is_empty()).then(|| documents.to_vec());
    if documents.is_none() && robot_desc.is_none() {
        return Err(AppError::Config(
            "Nothing to change: give documents and/or --robot-desc".to_string(),
        ));
    }

    let mut config = ctx.stored_config()?;
    config.update_knowledge(documents, robot_desc)?;
    tracing::info!(
        documents = config.knowledge.documents.len(),
        "Knowledge configuration saved"
    );

    let dir = config.documents_dir();
    for (name, present) in document_status(&dir, &config.knowledge.documents) {
        if !present {
            eprintln!("Warning: {} is not in {}", name, dir.display());
        }
    }

    if clean {
        let removed = ctx
            .pipeline()
            .remove_stale_documents(&config.knowledge.documents)
            .await?;
        for path in &removed {
            println!("removed {}", path.display());
        }
    }

    println!("Saved. Running chats pick this up on /restart.");
    Ok(())
}

/// Each configured document with whether it exists in `dir`.
fn document_status(dir: &Path, documents: &[String]) -> Vec<(String, bool)> {
    documents
        .iter()
        .map(|name| (name.clone(), dir.join(name).is_file()))
        .collect()
}
