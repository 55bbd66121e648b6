//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` and drives the update loop, either by long polling
//! or through a webhook listener, until shutdown (Ctrl-C) or a startup failure.

use std::net::SocketAddr;
use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use fortec_agent::Dispatcher as Relay;
use fortec_core::config::{PersonaConfig, TelegramConfig, TransportMode};

use crate::commands::Command;
use crate::error::TelegramError;
use crate::handler::{handle_command, handle_message};

/// Shared state injected into every endpoint.
pub struct AdapterContext {
    pub relay: Arc<Relay>,
    pub persona: PersonaConfig,
}

pub struct TelegramAdapter {
    bot: Bot,
    config: TelegramConfig,
    ctx: Arc<AdapterContext>,
}

impl TelegramAdapter {
    /// `bot` must be the same client the relay's outbound sends through.
    pub fn new(bot: Bot, config: &TelegramConfig, ctx: AdapterContext) -> Self {
        Self {
            bot,
            config: config.clone(),
            ctx: Arc::new(ctx),
        }
    }

    /// Run the update loop. Returns `Ok(())` after a graceful shutdown and an
    /// error when the loop could not be started; safe to call again.
    pub async fn run(&self) -> Result<(), TelegramError> {
        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "failed to register bot commands");
        }

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), schema())
            .dependencies(dptree::deps![Arc::clone(&self.ctx)])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build();

        match self.config.mode {
            TransportMode::Polling => {
                info!("Telegram: starting long-polling dispatcher");
                dispatcher.dispatch().await;
            }
            TransportMode::Webhook => {
                let (addr, url) = webhook_target(&self.config)?;
                probe_bind(addr).await?;
                info!(%addr, url = %url, "Telegram: starting webhook dispatcher");
                let listener =
                    webhooks::axum(self.bot.clone(), webhooks::Options::new(addr, url)).await?;
                dispatcher
                    .dispatch_with_listener(
                        listener,
                        LoggingErrorHandler::with_custom_text("webhook listener error"),
                    )
                    .await;
            }
        }

        info!("Telegram: dispatcher stopped");
        Ok(())
    }
}

/// Commands first; everything else falls through to the text endpoint.
fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message))
}

fn webhook_target(config: &TelegramConfig) -> Result<(SocketAddr, url::Url), TelegramError> {
    let raw = config
        .webhook_url
        .as_deref()
        .ok_or(TelegramError::MissingWebhookUrl)?;
    let url = url::Url::parse(raw).map_err(|e| TelegramError::InvalidWebhookUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    let addr = config
        .webhook_bind
        .parse::<SocketAddr>()
        .map_err(|e| TelegramError::Bind {
            addr: config.webhook_bind.clone(),
            reason: e.to_string(),
        })?;
    Ok((addr, url))
}

/// The axum listener binds inside a spawned task and cannot report a bind
/// failure, so check the address is free first.
async fn probe_bind(addr: SocketAddr) -> Result<(), TelegramError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map(drop)
        .map_err(|e| TelegramError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
}
