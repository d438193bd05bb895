mod gateway;

use clap::{Parser, Subcommand};
use sagemate_channels::bluesky::BlueskyClient;
use sagemate_core::{
    config::{self, Config, Prompts},
    traits::{Provider, SocialClient},
};
use sagemate_providers::anthropic::AnthropicProvider;
use sagemate_web::HttpFetcher;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(
    name = "sagemate",
    version,
    about = "Sagemate: context-aware replies to Bluesky mentions and DMs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer pending mentions and DMs (one pass unless --continuous).
    Start {
        /// Keep polling until interrupted.
        #[arg(
            long,
            env = "SAGEMATE_CONTINUOUS",
            value_parser = clap::builder::FalseyValueParser::new()
        )]
        continuous: bool,

        /// Compose replies but never send them or mark anything read.
        #[arg(
            long,
            env = "SAGEMATE_DRY_RUN",
            value_parser = clap::builder::FalseyValueParser::new()
        )]
        dry_run: bool,

        /// Seconds between polls in continuous mode.
        #[arg(long, env = "SAGEMATE_POLL_INTERVAL")]
        interval: Option<u64>,
    },
    /// Check credentials, the Bluesky account, DM access and the model.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            continuous,
            dry_run,
            interval,
        } => {
            let mut cfg = config::load(&cli.config)?;
            if dry_run {
                cfg.dispatch.dry_run = true;
            }
            if let Some(secs) = interval {
                cfg.dispatch.poll_interval_secs = secs;
            }
            let _guard = init_logging(&cfg);

            let missing = cfg.missing_credentials();
            if !missing.is_empty() {
                anyhow::bail!(
                    "missing credentials: {}. Set them in {} or the environment.",
                    missing.join(", "),
                    cli.config
                );
            }

            config::install_bundled_prompts(&cfg.sagemate.data_dir);
            let prompts = Prompts::load(&cfg.sagemate.data_dir);

            let client = BlueskyClient::login(&cfg.bluesky)
                .await
                .map_err(|e| anyhow::anyhow!("Bluesky login failed: {e}"))?;
            info!("logged in as @{} ({})", client.handle(), client.did());

            let provider = build_provider(&cfg)?;
            provider
                .health_check()
                .await
                .map_err(|e| anyhow::anyhow!("model check failed: {e}"))?;

            let fetcher = HttpFetcher::new(&cfg.fetch)?;

            let gw = gateway::Gateway::from_config(
                &cfg,
                &prompts,
                Arc::new(client),
                provider,
                Arc::new(fetcher),
                continuous,
            );
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            let _guard = init_logging(&cfg);
            status(&cli.config, &cfg).await?;
        }
    }

    Ok(())
}

/// Build the Anthropic provider from config.
fn build_provider(cfg: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let provider =
        AnthropicProvider::from_config(cfg.anthropic.api_key.clone(), cfg.anthropic.model.clone())?;
    Ok(Arc::new(provider))
}

/// Console logging, plus a daily file under `{data_dir}/logs/` when enabled.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(cfg: &Config) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&cfg.sagemate.log_level))
    };
    let console = tracing_subscriber::fmt::layer().with_filter(filter());

    if !cfg.sagemate.log_file {
        tracing_subscriber::registry().with(console).init();
        return None;
    }

    let dir = format!("{}/logs", config::shellexpand(&cfg.sagemate.data_dir));
    let appender = tracing_appender::rolling::daily(dir, "sagemate.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter());
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Some(guard)
}

async fn status(path: &str, cfg: &Config) -> anyhow::Result<()> {
    println!("Sagemate status\n");
    println!("Config: {path}");
    println!("Data dir: {}", cfg.sagemate.data_dir);
    println!();

    println!(
        "  handle:   {}",
        if cfg.bluesky.handle.is_empty() {
            "missing".to_string()
        } else {
            format!("@{}", cfg.bluesky.handle)
        }
    );
    println!(
        "  password: {}",
        if cfg.bluesky.password.is_empty() {
            "missing".to_string()
        } else {
            format!("set ({} chars)", cfg.bluesky.password.chars().count())
        }
    );
    println!("  api key:  {}", mask_key(&cfg.anthropic.api_key));
    println!("  model:    {}", cfg.anthropic.model);
    println!();

    let missing = cfg.missing_credentials();
    if !missing.is_empty() {
        anyhow::bail!("missing credentials: {}", missing.join(", "));
    }

    let client = BlueskyClient::login(&cfg.bluesky)
        .await
        .map_err(|e| anyhow::anyhow!("Bluesky login failed: {e}"))?;
    println!("  bluesky:  logged in as @{} ({})", client.handle(), client.did());

    match client.get_profile(client.did()).await {
        Ok(profile) => println!(
            "  profile:  {} | {} followers",
            profile.display_name.as_deref().unwrap_or("(no display name)"),
            profile.followers_count
        ),
        Err(e) => println!("  profile:  unavailable ({e})"),
    }

    if cfg.bluesky.dm_enabled {
        match client.list_conversations().await {
            Ok(convos) => println!("  dms:      available ({} conversations)", convos.len()),
            Err(e) if e.is_unsupported() => println!("  dms:      unsupported ({e})"),
            Err(e) => println!("  dms:      error ({e})"),
        }
    } else {
        println!("  dms:      disabled");
    }

    let provider = build_provider(cfg)?;
    provider
        .health_check()
        .await
        .map_err(|e| anyhow::anyhow!("model check failed: {e}"))?;
    println!("  model:    reachable ({})", provider.name());

    Ok(())
}

/// Show only the start of an API key.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "missing".into();
    }
    let prefix: String = key.chars().take(7).collect();
    format!("set ({prefix}...)")
}
