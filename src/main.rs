use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

mod app;
mod client;
mod config;
mod handler;
mod logging;
mod state;
mod tui;
mod ui;

use app::App;
use client::{AnswerService, AskClient};
use config::{Config, Settings, SERVER_URL_ENV};
use state::{ChatSession, FALLBACK_MESSAGE};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "rag-chat", version)]
#[command(about = "Chat with your documents through a RAG answer service")]
struct Cli {
    /// Base URL of the answer service, e.g. http://localhost:8000
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Where to write logs
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer with its sources
    Ask {
        /// Your question
        question: String,
    },
    /// Remember the answer service URL in the config file
    SetServer {
        /// Base URL, without the /ask path
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::SetServer { url }) = &cli.command {
        let path = Config::save_server_url(url)?;
        println!("Saved server URL to {}", path.display());
        return Ok(());
    }

    let log_path = match cli.log_file.clone() {
        Some(path) => path,
        None => logging::default_log_path()?,
    };
    if let Err(e) = logging::init(&log_path) {
        eprintln!("Logging disabled: {:#}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    let server_env = std::env::var(SERVER_URL_ENV).ok();
    let settings = config.resolve(cli.server.as_deref(), server_env.as_deref());
    tracing::info!(server = %settings.server_url, "starting");

    match cli.command {
        Some(Commands::Ask { question }) => ask_once(&settings, &question).await,
        Some(Commands::Chat) | None => run_chat(&settings).await,
        Some(Commands::SetServer { .. }) => Ok(()),
    }
}

async fn run_chat(settings: &Settings) -> Result<()> {
    let client = AskClient::new(&settings.server_url, settings.request_timeout)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(settings, Arc::new(client), events.sender());

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// Runs the send action once without the terminal UI.
async fn ask_once(settings: &Settings, question: &str) -> Result<()> {
    let client = AskClient::new(&settings.server_url, settings.request_timeout)?;
    let mut session = ChatSession::new("", settings.max_input_chars);

    if !session.draft.set(question) {
        bail!(
            "Question is longer than {} characters",
            settings.max_input_chars
        );
    }
    let Some(question) = session.begin_send() else {
        bail!("Question is empty");
    };

    let outcome = client.ask(&question).await;
    session.complete(&outcome);

    match outcome {
        Ok(_) => {
            let Some(answer) = session.messages().last() else {
                return Ok(());
            };
            println!("{}", answer.content);
            if let Some(sources) = &answer.sources {
                println!("\nSources:");
                for source in sources {
                    println!("  - {}", source);
                }
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "ask request failed");
            eprintln!("{}", FALLBACK_MESSAGE);
            Err(e).with_context(|| format!("Request to {} failed", client.endpoint()))
        }
    }
}
