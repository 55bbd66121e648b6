//! Conversation relay core: upstream calls with retry, routing between chat
//! and image generation, and chunked delivery back to the user.

pub mod chat;
pub mod classify;
pub mod deliver;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod image;
pub mod outbound;
pub mod provider;

pub use chat::ChatClient;
pub use dispatch::{DispatchOutcome, DispatchSettings, Dispatcher};
pub use error::{DeliveryError, DispatchError, UpstreamError};
pub use http::{RetryPolicy, RetryingCaller};
pub use image::ImageClient;
pub use outbound::{MessageRef, Outbound, TextFormat};
pub use provider::{ChatProvider, ImageProvider};
