pub mod error;
pub mod history;
pub mod table;

pub use error::SessionError;
pub use history::trim;
pub use table::{SessionGuard, SessionTable};
