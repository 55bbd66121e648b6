//! Bot commands and their replies.

use teloxide::utils::command::BotCommands;
use tracing::info;

use fortec_core::config::PersonaConfig;
use fortec_core::UserId;
use fortec_sessions::SessionTable;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the conversation")]
    Start,
    #[command(description = "Show this help message")]
    Help,
    #[command(description = "Reset our conversation history")]
    Reset,
}

pub const RESET_REPLY: &str =
    "Conversation history has been reset. What would you like to talk about?";

pub fn greeting(first_name: &str, persona: &PersonaConfig) -> String {
    format!(
        "Hello {first_name}! I'm {}, your personal assistant created by {}. How can I help you today?",
        persona.name, persona.creator
    )
}

pub fn help_text(persona: &PersonaConfig) -> String {
    format!(
        "I'm {}, here to assist you with information and answers.\n\n\
         Commands:\n\
         /start - Start the conversation\n\
         /help - Show this help message\n\
         /reset - Reset our conversation history\n\n\
         Just send me a message and I'll respond! \
         Ask me to draw or create an image and I'll make one for you.",
        persona.name
    )
}

/// Apply `command` for `user` and return the reply text.
///
/// `/start` creates the session if needed but keeps existing history;
/// `/reset` replaces it with a fresh one.
pub async fn respond(
    command: &Command,
    user: &UserId,
    first_name: &str,
    persona: &PersonaConfig,
    sessions: &SessionTable,
) -> String {
    match command {
        Command::Start => {
            sessions.get_or_create(user).await;
            greeting(first_name, persona)
        }
        Command::Help => help_text(persona),
        Command::Reset => {
            sessions.reset(user).await;
            info!(user = %user, "conversation reset");
            RESET_REPLY.to_string()
        }
    }
}
