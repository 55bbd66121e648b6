use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use teloxide::Bot;
use tracing::info;

use fortec_agent::{
    ChatClient, DispatchSettings, Dispatcher, ImageClient, RetryPolicy, RetryingCaller,
};
use fortec_core::config::FortecConfig;
use fortec_sessions::SessionTable;
use fortec_telegram::{AdapterContext, TelegramAdapter, TelegramOutbound};

mod supervisor;

use supervisor::{supervise, RestartPolicy};

/// Telegram relay for the Fortec AI assistant.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (default: $FORTEC_CONFIG, then ~/.fortec/fortec.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fortec_gateway=info,fortec_agent=info,fortec_telegram=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > FORTEC_CONFIG env > ~/.fortec/fortec.toml
    let config_path = cli.config.or_else(|| std::env::var("FORTEC_CONFIG").ok());
    let config = FortecConfig::load(config_path.as_deref()).context("loading configuration")?;

    let caller = RetryingCaller::new(RetryPolicy::from_config(&config.retry));
    let chat = ChatClient::new(&config.chat, caller.clone());
    let images = ImageClient::new(&config.image, caller);
    info!(model = %chat.model(), endpoint = %config.chat.endpoint, "chat upstream configured");

    let sessions = Arc::new(SessionTable::new(config.persona.system_prompt.clone()));
    let bot = Bot::new(&config.telegram.bot_token);

    let relay = Arc::new(Dispatcher::new(
        sessions,
        Arc::new(chat),
        Arc::new(images),
        Arc::new(TelegramOutbound::new(bot.clone())),
        DispatchSettings::from_config(&config),
    ));

    let adapter = TelegramAdapter::new(
        bot,
        &config.telegram,
        AdapterContext {
            relay,
            persona: config.persona.clone(),
        },
    );

    info!(mode = ?config.telegram.mode, persona = %config.persona.name, "fortec relay starting");

    let policy = RestartPolicy::from_config(&config.supervisor);
    supervise("telegram", &policy, || adapter.run())
        .await
        .context("telegram transport failed")?;

    Ok(())
}
