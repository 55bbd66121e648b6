pub mod config;
pub mod error;
pub mod types;

pub use config::FortecConfig;
pub use error::{FortecError, Result};
pub use types::{Role, Transcript, Turn, UserId};
