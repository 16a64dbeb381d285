//! Ask command handler.
//!
//! Sets up a pipeline, asks one question and prints the answer.

use super::CommandContext;
use clap::Args;
use std::path::PathBuf;
use unichat_core::AppResult;
use unichat_knowledge::AnswerResult;

/// Ask a single question about the documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Session identifier
    #[arg(short, long, default_value = "default")]
    pub session: String,

    /// Print the model's reasoning ahead of the answer
    #[arg(long)]
    pub show_reasoning: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Documents directory (overrides the configured one)
    #[arg(short, long)]
    pub documents_dir: Option<PathBuf>,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, ctx: &CommandContext) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = ctx.pipeline();
        pipeline.setup(self.documents_dir.clone()).await?;

        let result = pipeline.ask(&self.session, &self.question).await;
        pipeline.stop().await;
        let result = result?;

        println!("{}", self.render(&result)?);

        for source in &result.sources {
            tracing::debug!(
                "Source {} ({} @ {}): {}",
                source.chunk_id,
                source.source,
                source.start_offset,
                source.snippet
            );
        }

        Ok(())
    }

    fn render(&self, result: &AnswerResult) -> AppResult<String> {
        if self.json {
            return Ok(serde_json::to_string_pretty(result)?);
        }
        if self.show_reasoning {
            return Ok(result.display());
        }
        Ok(result.answer.clone())
    }
}
