//! Endpoints registered in the teloxide dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use fortec_core::UserId;

use crate::adapter::AdapterContext;
use crate::commands::{self, Command};
use crate::typing::TypingHandle;

/// `/start`, `/help`, `/reset`.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<AdapterContext>,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref().filter(|u| !u.is_bot) else {
        return Ok(());
    };
    let user = UserId::from(from.id.0);

    let reply = commands::respond(
        &cmd,
        &user,
        &from.first_name,
        &ctx.persona,
        ctx.relay.sessions(),
    )
    .await;

    if let Err(e) = bot.send_message(msg.chat.id, reply).await {
        warn!(user = %user, command = ?cmd, error = %e, "failed to answer command");
    }
    Ok(())
}

/// Any other message. Text is handed to the relay in its own task so the
/// dispatcher can keep serving other chats.
pub async fn handle_message(bot: Bot, msg: Message, ctx: Arc<AdapterContext>) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = relayable_text(from.is_bot, msg.text()) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message");
        return Ok(());
    };

    let user = UserId::from(from.id.0);
    let chat_id = msg.chat.id;
    let text = text.to_string();

    tokio::spawn(async move {
        let typing = TypingHandle::start(bot, chat_id);
        ctx.relay
            .handle_text(&user, &chat_id.0.to_string(), &text)
            .await;
        typing.stop();
    });

    Ok(())
}

/// Text worth relaying: sent by a human, non-empty, not an (unknown) command.
fn relayable_text(sender_is_bot: bool, text: Option<&str>) -> Option<&str> {
    if sender_is_bot {
        return None;
    }
    text.filter(|t| !t.trim().is_empty() && !t.starts_with('/'))
}
