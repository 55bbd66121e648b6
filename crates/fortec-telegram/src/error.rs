/// Errors produced by the Telegram adapter.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("webhook mode requires telegram.webhook_url")]
    MissingWebhookUrl,

    #[error("invalid webhook url {url:?}: {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("cannot listen on {addr:?}: {reason}")]
    Bind { addr: String, reason: String },
}
