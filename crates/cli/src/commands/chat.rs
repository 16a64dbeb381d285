//! Interactive chat over stdin.

use super::CommandContext;
use anyhow::Context;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use unichat_knowledge::{ConversationPipeline, MessageRole};

const HELP: &str = "Commands:
  /history   show this session's messages
  /restart   reload configuration and documents (clears every conversation)
  /status    show the pipeline state
  /quit      leave the chat";

/// Interactive multi-turn conversation
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Session identifier (default: a new random id)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Print the model's reasoning ahead of each answer
    #[arg(long)]
    pub show_reasoning: bool,

    /// Documents directory (overrides the configured one)
    #[arg(short, long)]
    pub documents_dir: Option<PathBuf>,
}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Restart,
    History,
    Status,
    Help,
    Unknown(&'a str),
    Question(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/restart" => Self::Restart,
            "/history" => Self::History,
            "/status" => Self::Status,
            "/help" => Self::Help,
            command if command.starts_with('/') => Self::Unknown(command),
            question => Self::Question(question),
        }
    }
}

impl ChatCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::info!(session = %session, "Starting chat");

        let pipeline = ctx.pipeline();
        pipeline
            .setup(self.documents_dir.clone())
            .await
            .context("Failed to set up the conversation pipeline")?;

        eprintln!("Session {} ready. Type /help for commands.", session);

        let result = self.run(&pipeline, &session).await;
        pipeline.stop().await;
        result
    }

    async fn run(&self, pipeline: &ConversationPipeline, session: &str) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush().context("Failed to write prompt")?;

            let Some(line) = lines
                .next_line()
                .await
                .context("Failed to read from stdin")?
            else {
                break;
            };

            match Input::parse(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Help => eprintln!("{}", HELP),
                Input::Unknown(command) => eprintln!("Unknown command {}. Type /help.", command),
                Input::Status => println!("{}", pipeline.state().await),
                Input::History => print_history(pipeline, session),
                Input::Restart => match pipeline.restart().await {
                    Ok(()) => eprintln!("Configuration reloaded. All conversations were reset."),
                    Err(e) => eprintln!("Restart failed, keeping the previous setup: {}", e),
                },
                Input::Question(question) => match pipeline.ask(session, question).await {
                    Ok(result) if self.show_reasoning => println!("{}\n", result.display()),
                    Ok(result) => println!("{}\n", result.answer),
                    Err(e) => eprintln!("Error: {}", e),
                },
            }
        }

        Ok(())
    }
}

fn print_history(pipeline: &ConversationPipeline, session: &str) {
    let history = pipeline.session_history(session).unwrap_or_default();
    if history.is_empty() {
        eprintln!("No messages yet.");
        return;
    }
    for message in history {
        let speaker = match message.role {
            MessageRole::Human => "you",
            MessageRole::Ai => "unichat",
        };
        println!("{}: {}", speaker, message.content);
    }
}
