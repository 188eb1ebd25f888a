mod analyzer;
mod atomic_write;
mod config;
mod host;
mod native_messaging;
mod ollama;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use sticker_media_search::GiphyClient;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::analyzer::Analyze;
use crate::analyzer::IntentAnalyzer;
use crate::config::ConfigStore;
use crate::config::Settings;
use crate::ollama::OllamaClient;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Suggest reaction GIFs for typed messages: native-messaging host and diagnostics"
)]
struct Cli {
    /// Config file to read instead of `~/.smart-sticker/config.toml`.
    #[arg(long, global = true, env = "SMART_STICKER_CONFIG")]
    config: Option<PathBuf>,

    /// Ollama server URL; overrides `[ollama] base_url`.
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Model used for intent analysis; overrides `[ollama] model`.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Giphy API key; overrides `[giphy] api_key`.
    #[arg(
        long,
        global = true,
        env = "SMART_STICKER_GIPHY_API_KEY",
        hide_env_values = true
    )]
    giphy_api_key: Option<String>,

    /// Caller origin or manifest arguments appended by the browser when it
    /// launches a native-messaging host.
    #[arg(hide = true)]
    browser_args: Vec<String>,

    /// Window handle the browser appends on Windows.
    #[arg(long, hide = true)]
    parent_window: Option<String>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum CliCommand {
    /// Serve the browser extension over stdio (default).
    Host,

    /// Analyze one message and print the analysis as JSON.
    Analyze {
        text: String,
    },

    /// Search for images and print the candidates as JSON.
    Search {
        query: String,

        /// Number of candidates to request.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check that Ollama is reachable and the configured model is installed.
    Check,

    /// Store the Giphy API key in the config file.
    SetApiKey {
        key: String,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    if !cli.browser_args.is_empty() || cli.parent_window.is_some() {
        tracing::debug!(
            browser_args = ?cli.browser_args,
            parent_window = ?cli.parent_window,
            "launched by browser"
        );
    }

    let store = match &cli.config {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::new_default()?,
    };

    let command = cli.command.as_ref().unwrap_or(&CliCommand::Host);
    if let CliCommand::SetApiKey { key } = command {
        store.set_giphy_api_key(key)?;
        eprintln!("Saved Giphy API key to {}", store.path().display());
        return Ok(());
    }

    let settings = resolve_settings(&cli, &store)?;
    match command {
        CliCommand::Host => run_host(settings).await,
        CliCommand::Analyze { text } => {
            let analyzer = IntentAnalyzer::new(OllamaClient::new(settings.ollama)?);
            let response = analyzer.analyze(text).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        CliCommand::Search { query, limit } => {
            if settings.search.api_key.is_empty() {
                anyhow::bail!(
                    "no Giphy API key configured; run `smart-sticker set-api-key <KEY>` or set SMART_STICKER_GIPHY_API_KEY"
                );
            }
            let limit = limit.unwrap_or(settings.search.limit);
            let client = GiphyClient::new(settings.search)?;
            let candidates = client.search(query, limit).await?;
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            Ok(())
        }
        CliCommand::Check => run_check(settings).await,
        CliCommand::SetApiKey { .. } => Ok(()),
    }
}

/// Logs go to stderr: stdout carries native-messaging frames.
fn init_tracing() {
    let stderr_fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );
    let _ = tracing_subscriber::registry().with(stderr_fmt).try_init();
}

fn resolve_settings(cli: &Cli, store: &ConfigStore) -> anyhow::Result<Settings> {
    let mut settings = store
        .load()
        .with_context(|| format!("load {}", store.path().display()))?;
    if let Some(url) = &cli.ollama_url {
        settings.ollama.base_url.clone_from(url);
    }
    if let Some(model) = &cli.model {
        settings.ollama.model.clone_from(model);
    }
    if let Some(key) = &cli.giphy_api_key {
        settings.search.api_key.clone_from(key);
    }
    Ok(settings)
}

async fn run_host(settings: Settings) -> anyhow::Result<()> {
    let model = settings.ollama.model.clone();
    let analyzer: Arc<dyn Analyze> = Arc::new(IntentAnalyzer::new(OllamaClient::new(
        settings.ollama,
    )?));
    tracing::info!(%model, "native messaging host started");

    let result = host::serve(tokio::io::stdin(), tokio::io::stdout(), analyzer).await;
    tracing::info!("native messaging host stopped");
    result
}

async fn run_check(settings: Settings) -> anyhow::Result<()> {
    let base_url = settings.ollama.base_url.clone();
    let model = settings.ollama.model.clone();
    let analyzer = IntentAnalyzer::new(OllamaClient::new(settings.ollama)?);
    let check = analyzer
        .check()
        .await
        .with_context(|| format!("Ollama at {base_url} is not reachable"))?;

    println!("Ollama at {base_url} is reachable.");
    if check.installed.is_empty() {
        println!("No models installed.");
    } else {
        println!("Installed models: {}", check.installed.join(", "));
    }
    if check.has_configured_model {
        println!("Model {model} is installed.");
    } else {
        println!("Model {model} is missing; install it with `ollama pull {model}`.");
    }
    if settings.search.api_key.is_empty() {
        println!("No Giphy API key configured.");
    }
    Ok(())
}
