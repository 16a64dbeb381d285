//! Models command handler.
//!
//! Lists the provider catalogue and, for Ollama, which offered models are
//! pulled locally. `models set` switches the stored deployment profile.

use super::CommandContext;
use clap::{Args, Subcommand};
use unichat_core::config::{AppConfig, ProviderOption};
use unichat_core::{AppResult, DeploymentProfile};
use unichat_llm::{OllamaClient, ProviderType};

/// List providers, their models and local availability
#[derive(Args, Debug)]
pub struct ModelsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub action: Option<ModelsAction>,
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// Store a new language (and optionally embedding) model selection
    Set(ModelSelection),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ModelSelection {
    /// Language model provider
    pub provider: String,

    /// Language model (default: the provider's first listed model)
    pub model: Option<String>,

    /// Embedding provider (default: keep the current one)
    #[arg(long)]
    pub embedding_provider: Option<String>,

    /// Embedding model (default: the embedding provider's first listed model)
    #[arg(long)]
    pub embedding_model: Option<String>,
}

impl ModelsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> AppResult<()> {
        match &self.action {
            Some(ModelsAction::Set(selection)) => set(ctx, selection),
            None => self.list(ctx).await,
        }
    }

    async fn list(&self, ctx: &CommandContext) -> AppResult<()> {
        let catalogue = ctx.config.provider_catalogue();
        let local = self.local_models(ctx).await;

        if self.json {
            let output = serde_json::json!({
                "active": ctx.config.deployment,
                "providers": catalogue,
                "ollamaModels": local,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let deployment = &ctx.config.deployment;
        println!(
            "Active: {}/{} with {}/{} embeddings\n",
            deployment.llm_provider, deployment.llm_model, deployment.emb_provider, deployment.emb_model
        );

        for option in &catalogue {
            print!("{}", describe(option, local.as_deref()));
        }

        if local.is_none() {
            eprintln!("Ollama is not reachable; local availability unknown.");
        }
        Ok(())
    }

    /// Models pulled into the local Ollama instance, if it answers.
    async fn local_models(&self, ctx: &CommandContext) -> Option<Vec<String>> {
        let endpoint = ctx
            .config
            .provider("ollama")
            .and_then(|entry| entry.endpoint.clone())
            .unwrap_or_else(|| ProviderType::Ollama.default_endpoint().to_string());

        match OllamaClient::with_base_url(&endpoint).list_models().await {
            Ok(models) => Some(models),
            Err(e) => {
                tracing::warn!("Could not list Ollama models: {}", e);
                None
            }
        }
    }
}

fn set(ctx: &CommandContext, selection: &ModelSelection) -> AppResult<()> {
    let mut config = ctx.stored_config()?;
    let profile = next_profile(&config, selection);
    config.update_deployment_profile(profile)?;

    let deployment = &config.deployment;
    tracing::info!(
        llm = %format!("{}/{}", deployment.llm_provider, deployment.llm_model),
        emb = %format!("{}/{}", deployment.emb_provider, deployment.emb_model),
        "Deployment profile saved"
    );
    println!(
        "Now using {}/{} with {}/{} embeddings. Running chats pick this up on /restart.",
        deployment.llm_provider, deployment.llm_model, deployment.emb_provider, deployment.emb_model
    );
    Ok(())
}

/// The profile `selection` asks for, starting from the stored one.
///
/// Missing models are taken from the provider's catalogue; an unchanged
/// embedding provider keeps its model.
fn next_profile(config: &AppConfig, selection: &ModelSelection) -> DeploymentProfile {
    let current = &config.deployment;
    let first_listed = |provider: &str, embedding: bool| -> String {
        config
            .provider(provider)
            .and_then(|entry| {
                let models = if embedding {
                    &entry.emb_models
                } else {
                    &entry.llm_models
                };
                models.first().cloned()
            })
            .unwrap_or_default()
    };

    let llm_provider = selection.provider.trim().to_lowercase();
    let llm_model = selection
        .model
        .clone()
        .unwrap_or_else(|| first_listed(&llm_provider, false));

    let (emb_provider, emb_model) = match &selection.embedding_provider {
        Some(provider) => {
            let provider = provider.trim().to_lowercase();
            let model = selection
                .embedding_model
                .clone()
                .unwrap_or_else(|| first_listed(&provider, true));
            (provider, model)
        }
        None => (
            current.emb_provider.clone(),
            selection
                .embedding_model
                .clone()
                .unwrap_or_else(|| current.emb_model.clone()),
        ),
    };

    DeploymentProfile::new(llm_provider, llm_model, emb_provider, emb_model)
}

fn describe(option: &ProviderOption, local: Option<&[String]>) -> String {
    let mark = |model: &String| -> String {
        match local {
            Some(pulled) if option.provider == "ollama" => {
                let downloaded = pulled
                    .iter()
                    .any(|name| name == model || *name == format!("{}:latest", model));
                if downloaded {
                    format!("{} [downloaded]", model)
                } else {
                    format!("{} [not pulled]", model)
                }
            }
            _ => model.clone(),
        }
    };

    let mut out = format!("{}\n", option.provider);
    if !option.intro.is_empty() {
        out.push_str(&format!("  {}\n", option.intro));
    }
    if !option.llm_models.is_empty() {
        let models: Vec<String> = option.llm_models.iter().map(mark).collect();
        out.push_str(&format!("  chat: {}\n", models.join(", ")));
    }
    if !option.emb_models.is_empty() {
        let models: Vec<String> = option.emb_models.iter().map(mark).collect();
        out.push_str(&format!("  embeddings: {}\n", models.join(", ")));
    }
    out.push('\n');
    out
}
