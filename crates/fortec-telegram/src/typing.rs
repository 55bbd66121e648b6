//! Typing indicator kept alive while a message is being handled.
//!
//! Telegram clears the "typing…" status after about five seconds, so the
//! action is re-sent every four.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::debug;

const REFRESH_EVERY: Duration = Duration::from_secs(4);

/// Background typing loop for one chat. Aborted on `stop()` or drop.
pub struct TypingHandle(tokio::task::JoinHandle<()>);

impl TypingHandle {
    pub fn start(bot: Bot, chat_id: ChatId) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
                    debug!(chat_id = chat_id.0, error = %e, "typing indicator failed");
                }
                tokio::time::sleep(REFRESH_EVERY).await;
            }
        });
        TypingHandle(handle)
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TypingHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
