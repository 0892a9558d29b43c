use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gempop_core::geo::provider_from_config;
use gempop_core::{
    Config, DraftStore, Gateway, GeminiClient, MemoryDraftStore, ModeRequest, SqliteDraftStore,
};

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "gempop")]
#[command(version)]
#[command(about = "Gemini assistant for the terminal: chat, search, places, translate, summarize, rewrite")]
struct Cli {
    /// Gemini model to use (overrides config)
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key (overrides GEMINI_API_KEY and config)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one chat message and stream the reply
    Chat {
        message: String,
    },
    /// Answer a question grounded in web search
    Search {
        query: String,
    },
    /// Find places, biased to your location
    Find {
        query: String,
        /// Skip the location lookup
        #[arg(long)]
        no_location: bool,
    },
    /// Translate text
    Translate {
        text: String,
        /// Target language
        #[arg(long)]
        to: Option<String>,
    },
    /// Summarize text into bullet points
    Summarize {
        text: String,
    },
    /// Rewrite text in another tone
    Rewrite {
        text: String,
        /// professional, casual, enthusiastic or concise
        #[arg(long)]
        tone: Option<String>,
    },
}

/// Logs go to a file while the TUI owns the terminal, stderr otherwise
fn init_logging(verbose: bool, to_file: bool) {
    let filter = if verbose { "gempop=debug" } else { "gempop=info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if to_file {
        let file = dirs::data_dir()
            .map(|dir| dir.join("gempop"))
            .and_then(|dir| {
                std::fs::create_dir_all(&dir).ok()?;
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join("gempop.log"))
                    .ok()
            });

        if let Some(file) = file {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        // no data dir: stay silent rather than draw over the UI
        return;
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_client(config: &Config, api_key: Option<&str>) -> Result<GeminiClient> {
    let client = match api_key {
        Some(key) => GeminiClient::new(key, config.model())
            .with_base_url(config.api_base())
            .with_request_timeout(config.request_timeout())
            .with_stream_idle_timeout(config.stream_idle_timeout()),
        None => GeminiClient::from_config(config)?,
    };
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose, args.command.is_none());

    let mut config = Config::load()?;
    if let Some(model) = args.model {
        config.model = Some(model);
    }

    let client = build_client(&config, args.api_key.as_deref())?;

    let Some(command) = args.command else {
        return run_tui(config, Arc::new(client)).await;
    };

    match command {
        Commands::Chat { message } => cli::chat(&client, &message).await?,
        Commands::Search { query } => cli::run(&client, ModeRequest::Search { query }).await?,
        Commands::Find { query, no_location } => {
            let locator = provider_from_config(&config);
            let locator = if no_location { None } else { Some(locator.as_ref()) };
            let request = cli::find_request(&query, locator, config.geolocation_timeout()).await;
            cli::run(&client, request).await?
        }
        Commands::Translate { text, to } => {
            let language = cli::resolve_language(to.as_deref().or(config.default_language.as_deref()))?;
            let request = ModeRequest::Translate {
                text,
                language: language.to_string(),
            };
            cli::run(&client, request).await?
        }
        Commands::Summarize { text } => cli::run(&client, ModeRequest::Summarize { text }).await?,
        Commands::Rewrite { text, tone } => {
            let tone = cli::resolve_tone(tone.as_deref().or(config.default_tone.as_deref()))?;
            cli::run(&client, ModeRequest::Rewrite { text, tone }).await?
        }
    }

    Ok(())
}

fn open_drafts() -> Arc<dyn DraftStore> {
    let store = SqliteDraftStore::default_path().and_then(|path| SqliteDraftStore::open(&path));
    match store {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Drafts will not survive a restart");
            Arc::new(MemoryDraftStore::new())
        }
    }
}

async fn run_tui(config: Config, gateway: Arc<dyn Gateway>) -> Result<()> {
    let drafts = open_drafts();
    let locator = provider_from_config(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(&config, gateway, locator, drafts, events.sender());

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
