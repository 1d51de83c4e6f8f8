//! Warlink Console - Interactive Agent REPL
//!
//! Line-oriented console over the persistent link to the war-room backend
//! agent. Responses stream back token by token; slash commands reach the
//! HTTP collaborators (health, transcription, one-shot commands).
//!
//! # Usage
//!
//! ```bash
//! # Connect with defaults
//! warlink
//!
//! # Custom endpoint and persona
//! warlink --url ws://lab:8000/ws --profile llama
//!
//! # With config file
//! warlink --config ~/.config/warlink/warlink.toml
//!
//! # Verbose logging
//! RUST_LOG=debug warlink
//! ```
//!
//! # Commands
//!
//! Lines starting with `/` are commands; anything else goes to the agent.
//!
//! - `/health` - latest backend system stats
//! - `/run <text>` - one-shot command over HTTP instead of the link
//! - `/transcribe <path>` - transcribe an audio file and send the text
//! - `/profile <name>` - switch the persona profile
//! - `/status` - link phase and exchange flags
//! - `/history [n]` - recent transcript entries
//! - `/quit` - tear the link down and exit

mod repl;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use warlink_core::{
    default_config_path, load_config_from_path, AgentLink, BackendClient, ConfigOverrides,
    HealthMonitor, WhisperClient,
};

use repl::Console;

/// Interactive console for the war-room backend agent
#[derive(Parser, Debug)]
#[command(name = "warlink")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// WebSocket URL of the backend agent
    #[arg(long, env = "WARLINK_WS_URL", value_name = "URL")]
    url: Option<String>,

    /// Persona profile attached to outgoing messages
    #[arg(short, long, env = "WARLINK_PROFILE", value_name = "NAME")]
    profile: Option<String>,

    /// Base URL of the backend HTTP API
    #[arg(long, env = "WARLINK_BACKEND_URL", value_name = "URL")]
    backend_url: Option<String>,

    /// Base URL of the voice transcription service
    #[arg(long, env = "WARLINK_TRANSCRIBER_URL", value_name = "URL")]
    transcriber_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "WARLINK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip the background system health poller
    #[arg(long)]
    no_health: bool,

    /// Raise the default log level to debug
    #[arg(short, long)]
    verbose: bool,
}

/// Initialize logging; `RUST_LOG` wins over the flag
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "warlink_console={default_level},warlink_core={default_level}"
        ))
    });

    // Logs go to stderr so they never interleave with streamed responses
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path)?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.url {
        overrides = overrides.with_url(url);
    }
    if let Some(profile) = args.profile {
        overrides = overrides.with_profile(profile);
    }
    if let Some(url) = args.backend_url {
        overrides = overrides.with_backend_url(url);
    }
    if let Some(url) = args.transcriber_url {
        overrides = overrides.with_transcriber_url(url);
    }
    overrides.apply(&mut config);
    config.validate()?;

    info!(
        url = %config.link.url,
        profile = %config.link.profile,
        source = %config.source(),
        "Starting warlink console"
    );

    let backend = BackendClient::new(config.api.backend_url.clone(), config.api.request_timeout);
    let whisper = WhisperClient::new(
        config.api.transcriber_url.clone(),
        config.api.request_timeout,
    );

    let health = if args.no_health {
        None
    } else {
        Some(HealthMonitor::start(
            backend.clone(),
            config.api.health_poll_interval,
        ))
    };

    let profile = config.link.profile.clone();
    let link = AgentLink::connect(config.link);

    Console::new(link, backend, whisper, health, profile)
        .run()
        .await
}
