//! # pgview
//!
//! Runs a statement script against a workspace, or an interactive REPL.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive session on the default workspace
//! pgview
//!
//! # Run a script against workspace "social"
//! pgview --workspace social script.pgv
//!
//! # Custom configuration file
//! pgview --config ./pgview.toml
//! ```
//!
//! Logging follows `RUST_LOG` when set, otherwise `logging.level` from the
//! configuration.

use anyhow::Context;
use clap::Parser;
use pgview::config::LoggingConfig;
use pgview::repl::StatementHelper;
use pgview::{Config, WorkspaceManager};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pgview", version, about = "Views over property graphs")]
struct Args {
    /// Configuration file (defaults to pgview.toml and pgview.local.toml)
    #[arg(long)]
    config: Option<String>,

    /// Workspace to open (defaults to storage.default_workspace)
    #[arg(long)]
    workspace: Option<String>,

    /// Script of statements to run instead of the REPL
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config from {path}"))?,
        None => Config::load().context("loading config")?,
    };
    init_tracing(&config.logging);

    let workspace_name = args
        .workspace
        .clone()
        .unwrap_or_else(|| config.storage.default_workspace.clone());
    let manager = WorkspaceManager::new(config);
    let handle = manager
        .open(&workspace_name)
        .with_context(|| format!("opening workspace '{workspace_name}'"))?;

    if let Some(script) = &args.script {
        let text = std::fs::read_to_string(script)
            .with_context(|| format!("reading {}", script.display()))?;
        for outcome in handle.write().execute(&text)? {
            println!("{outcome}");
        }
        return Ok(());
    }

    let mut editor: Editor<StatementHelper, _> = Editor::new()?;
    editor.set_helper(Some(StatementHelper::new()));
    let prompt = format!("{workspace_name}> ");
    println!("pgview {} (type .quit to exit)", env!("CARGO_PKG_VERSION"));

    loop {
        match editor.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);
                if input == ".quit" || input == ".exit" {
                    break;
                }
                match handle.write().execute(input) {
                    Ok(outcomes) => {
                        for outcome in outcomes {
                            println!("{outcome}");
                        }
                    }
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG takes precedence over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if logging.format == "json" {
        Box::new(builder.json().finish())
    } else {
        Box::new(builder.compact().finish())
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
}
