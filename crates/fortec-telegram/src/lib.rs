pub mod adapter;
pub mod commands;
pub mod error;
pub mod handler;
pub mod outbound;
pub mod typing;

pub use adapter::{AdapterContext, TelegramAdapter};
pub use commands::Command;
pub use error::TelegramError;
pub use outbound::TelegramOutbound;
