//! Command-line interface for vox-agent.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{run_pipeline, VoiceAgent};
use crate::config::AppConfig;
use crate::error::VoxError;

/// Voice-assistant agent host
#[derive(Parser, Debug)]
#[command(name = "vox-agent", version, about = "Tool-using voice assistant agent")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to config.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive conversation on stdin; Ctrl-C to stop
    Chat,
    /// Answer a single question
    Ask(AskArgs),
    /// List the tool catalog and provider status
    Tools,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question text
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Filter used when RUST_LOG is unset.
pub fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "vox_agent=debug,info"
    } else {
        "info"
    }
}

pub async fn run(cli: Cli) -> Result<(), VoxError> {
    let config = AppConfig::load(cli.global.config.as_deref())?;
    match cli.command {
        Commands::Chat => handle_chat(&config).await,
        Commands::Ask(args) => handle_ask(&config, &args.text.join(" ")).await,
        Commands::Tools => handle_tools(&config).await,
    }
}

async fn handle_ask(config: &AppConfig, question: &str) -> Result<(), VoxError> {
    let mut agent = VoiceAgent::start(config).await?;
    let result = agent.process(question).await;
    agent.shutdown().await;
    println!("{}", result?);
    Ok(())
}

async fn handle_tools(config: &AppConfig) -> Result<(), VoxError> {
    let mut agent = VoiceAgent::start(config).await?;

    for tool in agent.registry().all_tools() {
        println!("{:<40} {}", tool.unique_id, tool.description);
    }
    let stats = agent.registry().stats();
    println!();
    println!(
        "{} providers, {} tools, {} prompts, {} name conflicts",
        stats.total_providers, stats.total_tools, stats.total_prompts, stats.name_conflicts
    );
    for provider in &stats.providers {
        let state = if provider.connected { "connected" } else { "unavailable" };
        println!(
            "  {:<20} {:<6} {:<12} {} tools",
            provider.name, provider.transport, state, provider.tool_count
        );
    }

    agent.shutdown().await;
    Ok(())
}

async fn handle_chat(config: &AppConfig) -> Result<(), VoxError> {
    let mut agent = VoiceAgent::start(config).await?;
    let cancel = CancellationToken::new();
    let (input_tx, input_rx) = mpsc::channel::<String>(16);
    let (output_tx, mut output_rx) = mpsc::channel::<String>(16);

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let reader_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = reader_cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) => {
                    if input_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(reply) = output_rx.recv().await {
            println!("{reply}");
        }
    });

    eprintln!("Ready. Type a message, Ctrl-C to quit.");
    let processed = run_pipeline(&mut agent, input_rx, output_tx, cancel).await;
    let _ = printer.await;
    tracing::info!(processed, "chat ended");

    agent.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ask_joins_words() {
        let cli = Cli::try_parse_from(["vox-agent", "ask", "turn", "the", "lights", "on"])
            .expect("ask should parse");
        match cli.command {
            Commands::Ask(args) => assert_eq!(args.text.join(" "), "turn the lights on"),
            other => panic!("expected Ask, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["vox-agent", "tools", "--config", "/tmp/c.toml", "-v"])
            .expect("tools should parse");
        assert!(matches!(cli.command, Commands::Tools));
        assert_eq!(cli.global.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(cli.global.verbose);
    }

    #[test]
    fn ask_requires_text() {
        assert!(Cli::try_parse_from(["vox-agent", "ask"]).is_err());
    }

    #[test]
    fn verbose_raises_default_filter() {
        assert_eq!(default_log_filter(false), "info");
        assert!(default_log_filter(true).contains("debug"));
    }
}
