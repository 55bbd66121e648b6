//! Outbound transport interface.
//!
//! The relay core never talks to a messaging platform directly. Channel
//! adapters (Telegram today) implement [`Outbound`] and hand it to the
//! dispatcher, which keeps this crate transport-agnostic and testable.

use async_trait::async_trait;

use crate::error::DeliveryError;

/// Markup mode for a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Markdown,
    Plain,
}

/// Transport-assigned id of a sent message, used to delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i64);

#[async_trait]
pub trait Outbound: Send + Sync {
    /// Send `text` to `recipient`. The text must already fit the transport limit.
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageRef, DeliveryError>;

    /// Send an image by URL.
    async fn send_image(&self, recipient: &str, url: &str) -> Result<MessageRef, DeliveryError>;

    async fn delete_message(&self, recipient: &str, message: MessageRef)
        -> Result<(), DeliveryError>;
}
