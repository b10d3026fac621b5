mod gateway;

use clap::{Parser, Subcommand};
use recado_channels::telegram::TelegramChannel;
use recado_core::{config, intent::ProviderReply, traits::Provider};
use recado_memory::Store;
use recado_providers::openai::OpenAiProvider;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "recado",
    version,
    about = "Olivia — asistente de tareas sobre Telegram y Notion"
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
    /// Start the assistant.
    Start,
    /// Check provider, channel and store configuration.
    Status,
    /// Send a one-shot message and print the extracted reply or intent.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;

            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                anyhow::bail!("provider '{}' is not available", provider.name());
            }

            let mut channels: HashMap<String, Arc<dyn recado_core::traits::Channel>> =
                HashMap::new();

            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. \
                             Set it in config.toml or TELEGRAM_BOT_TOKEN env var."
                        );
                    }
                    let channel = TelegramChannel::new(tg.clone());
                    channels.insert("telegram".to_string(), Arc::new(channel));
                }
            }

            if channels.is_empty() {
                anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
            }

            if cfg.notion.api_token.is_empty() || cfg.notion.database_id.is_empty() {
                anyhow::bail!(
                    "Notion is not configured. Set notion.api_token and notion.database_id \
                     in config.toml or the NOTION_API_TOKEN / NOTION_DATABASE_ID env vars."
                );
            }

            let memory = Store::new(&cfg.memory).await?;

            println!("🟣 {} — starting...", cfg.recado.name);
            let gw = gateway::Gateway::new(Arc::from(provider), channels, memory, &cfg)?;
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("🟣 Recado — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Default provider: {}", cfg.provider.default);
            println!();

            match build_provider(&cfg) {
                Ok(provider) => println!(
                    "  {}: {}",
                    provider.name(),
                    if provider.is_available().await {
                        "available"
                    } else {
                        "not available"
                    }
                ),
                Err(e) => println!("  provider: {e}"),
            }

            if let Some(ref tg) = cfg.channel.telegram {
                println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                );
            } else {
                println!("  telegram: not configured");
            }

            println!(
                "  notion: {}",
                if !cfg.notion.api_token.is_empty() && !cfg.notion.database_id.is_empty() {
                    "configured"
                } else {
                    "not configured"
                }
            );

            match Store::new(&cfg.memory).await {
                Ok(memory) => match memory.pending_count().await {
                    Ok(n) => println!("  reminders: {n} pending"),
                    Err(e) => println!("  reminders: error ({e})"),
                },
                Err(e) => println!("  memory: error ({e})"),
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: recado ask <message>");
            }

            let prompt = message.join(" ");
            let cfg = config::load(&cli.config)?;
            let provider = build_provider(&cfg)?;

            if !provider.is_available().await {
                anyhow::bail!("provider '{}' is not available", provider.name());
            }

            match provider.extract(&prompt).await? {
                ProviderReply::Chat(text) => println!("{text}"),
                ProviderReply::Intent(intent) => println!("{intent:?}"),
            }
        }
    }

    Ok(())
}

/// Build the configured provider.
fn build_provider(cfg: &config::Config) -> anyhow::Result<Box<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "openai" => {
            let oa = cfg.provider.openai.as_ref().cloned().unwrap_or_default();
            if oa.api_key.is_empty() {
                anyhow::bail!(
                    "OpenAI API key is missing. Set it in config.toml or OPENAI_API_KEY env var."
                );
            }
            Ok(Box::new(OpenAiProvider::from_config(&oa)))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}
