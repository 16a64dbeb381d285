//! Unichat CLI
//!
//! Main entry point for the unichat command-line tool.
//! Answers questions about a local document set, one shot or as a chat.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, ChatCommand, CleanDocsCommand, CommandContext, DocsCommand, ModelsCommand,
};
use std::path::PathBuf;
use unichat_core::{config::AppConfig, logging};
use unichat_knowledge::FileConfigSource;

/// Unichat - conversational answers grounded in your documents
#[derive(Parser, Debug)]
#[command(name = "unichat")]
#[command(about = "Conversational answers grounded in your documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "UNICHAT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "UNICHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Language model provider (ollama, openai, deepseek, moonshot, ...)
    #[arg(long, global = true, env = "UNICHAT_LLM_PROVIDER")]
    llm_provider: Option<String>,

    /// Language model identifier
    #[arg(long, global = true, env = "UNICHAT_LLM_MODEL")]
    llm_model: Option<String>,

    /// Embedding provider (ollama, openai, zhipuai, trigram, ...)
    #[arg(long, global = true, env = "UNICHAT_EMB_PROVIDER")]
    emb_provider: Option<String>,

    /// Embedding model identifier
    #[arg(long, global = true, env = "UNICHAT_EMB_MODEL")]
    emb_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question about the documents
    Ask(AskCommand),

    /// Interactive multi-turn conversation
    Chat(ChatCommand),

    /// Delete files in the documents directory that are not configured
    CleanDocs(CleanDocsCommand),

    /// Show or change the configured documents
    Docs(DocsCommand),

    /// List providers and models, or switch the stored model selection
    Models(ModelsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from the workspace file and environment
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let mut config = config.with_overrides(
        cli.llm_provider.clone(),
        cli.llm_model.clone(),
        cli.emb_provider.clone(),
        cli.emb_model.clone(),
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.log_json |= cli.log_json;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Unichat CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Deployment: {}/{} with {}/{} embeddings",
        config.deployment.llm_provider,
        config.deployment.llm_model,
        config.deployment.emb_provider,
        config.deployment.emb_model
    );

    config.ensure_unichat_dir()?;

    // The pipeline re-reads configuration on every restart; CLI model
    // selection has to survive those reloads.
    let source = FileConfigSource::new(cli.workspace, cli.config).with_profile_overrides(
        cli.llm_provider,
        cli.llm_model,
        cli.emb_provider,
        cli.emb_model,
    );
    let ctx = CommandContext::new(config, source);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::CleanDocs(_) => "clean-docs",
        Commands::Docs(_) => "docs",
        Commands::Models(_) => "models",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&ctx).await.map_err(anyhow::Error::from),
        Commands::Chat(cmd) => cmd.execute(&ctx).await,
        Commands::CleanDocs(cmd) => cmd.execute(&ctx).await.map_err(anyhow::Error::from),
        Commands::Docs(cmd) => cmd.execute(&ctx).await.map_err(anyhow::Error::from),
        Commands::Models(cmd) => cmd.execute(&ctx).await.map_err(anyhow::Error::from),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
