//! [`Outbound`] over the Telegram Bot API.
//!
//! Recipients are chat ids rendered as decimal strings.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};

use fortec_agent::{DeliveryError, MessageRef, Outbound, TextFormat};

#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbound for TelegramOutbound {
    // Legacy Markdown: model output uses `*bold*` / `_italic_` style markup,
    // which MarkdownV2 rejects unless every reserved character is escaped.
    #[allow(deprecated)]
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef, DeliveryError> {
        let chat_id = parse_chat_id(recipient)?;
        let request = self.bot.send_message(chat_id, text);
        let sent = match format {
            TextFormat::Markdown => request.parse_mode(ParseMode::Markdown).await,
            TextFormat::Plain => request.await,
        };
        sent.map(|m| MessageRef(i64::from(m.id.0)))
            .map_err(delivery_error)
    }

    async fn send_image(&self, recipient: &str, url: &str) -> Result<MessageRef, DeliveryError> {
        let chat_id = parse_chat_id(recipient)?;
        let url = url::Url::parse(url)
            .map_err(|e| DeliveryError::Transport(format!("invalid image url: {e}")))?;
        self.bot
            .send_photo(chat_id, InputFile::url(url))
            .await
            .map(|m| MessageRef(i64::from(m.id.0)))
            .map_err(delivery_error)
    }

    async fn delete_message(
        &self,
        recipient: &str,
        message: MessageRef,
    ) -> Result<(), DeliveryError> {
        let chat_id = parse_chat_id(recipient)?;
        let id = i32::try_from(message.0)
            .map_err(|_| DeliveryError::Transport(format!("message id {} out of range", message.0)))?;
        self.bot
            .delete_message(chat_id, MessageId(id))
            .await
            .map(|_| ())
            .map_err(delivery_error)
    }
}

fn parse_chat_id(recipient: &str) -> Result<ChatId, DeliveryError> {
    recipient
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| DeliveryError::Transport(format!("invalid chat id: {recipient:?}")))
}

/// Entity-parse rejections become `Format` so the caller can resend as plain text.
fn delivery_error(e: RequestError) -> DeliveryError {
    match e {
        RequestError::Api(ApiError::CantParseEntities(reason)) => DeliveryError::Format(reason),
        other => DeliveryError::Transport(other.to_string()),
    }
}
