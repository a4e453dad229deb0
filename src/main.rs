//! Relaybot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use relaybot::messaging::Messaging as _;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(about = "Discord bot that answers mentions and replies with Grok")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine, the variables may come from the environment
    let dotenv_path = dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("starting relaybot");
    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let config = if let Some(config_path) = cli.config {
        relaybot::config::Config::load_from_path(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        relaybot::config::Config::load().with_context(|| "failed to load configuration")?
    };

    tracing::info!(
        instance_dir = %config.instance_dir.display(),
        model = %config.llm.model,
        image_generation = ?config.features.image_generation,
        image_uploads = ?config.features.image_uploads,
        "configuration loaded"
    );

    let model = relaybot::llm::XaiClient::new(&config.llm)
        .with_context(|| "failed to initialize Grok client")?;

    let adapter = relaybot::messaging::DiscordAdapter::new(
        &config.discord.token,
        &config.discord.activity,
        config.limits.platform_ceiling,
    );

    let mut channel = relaybot::agent::Channel::new(&config, model);

    let inbound = adapter
        .start()
        .await
        .with_context(|| "failed to start discord adapter")?;

    adapter
        .health_check()
        .await
        .with_context(|| "discord rejected the bot credentials")?;

    tracing::info!(adapter = adapter.name(), "listening for messages");

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let result = channel.run(&adapter, inbound, shutdown).await;

    if let Err(error) = adapter.shutdown().await {
        tracing::warn!(%error, "discord adapter shutdown failed");
    }

    tracing::info!(
        conversations = channel.history().conversation_count(),
        "relaybot stopped"
    );

    result.with_context(|| "discord gateway disconnected")
}
