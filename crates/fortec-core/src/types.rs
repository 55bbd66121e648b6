use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the person on the other side of the chat.
///
/// Telegram hands us numeric ids; they are rendered to strings so the session
/// table does not care which transport a user came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged message in a conversation.
///
/// Serialises to the `{"role": ..., "content": ...}` shape used on the wire
/// by OpenAI-compatible chat endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation for one user.
///
/// Index 0 is always the system (persona) turn. The only constructors are
/// [`Transcript::new`] and [`Transcript::from_turns`], and `push` only
/// appends, so the invariant holds for every value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Turn>);

impl Transcript {
    /// A fresh transcript holding only the system directive.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self(vec![Turn::system(system_prompt)])
    }

    /// Rebuild a transcript from raw turns.
    ///
    /// Returns `None` when `turns` is empty or does not start with a system turn.
    pub fn from_turns(turns: Vec<Turn>) -> Option<Self> {
        match turns.first() {
            Some(first) if first.role == Role::System => Some(Self(turns)),
            _ => None,
        }
    }

    pub fn system(&self) -> &Turn {
        &self.0[0]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    /// Turns after the system directive, oldest first.
    pub fn history(&self) -> &[Turn] {
        &self.0[1..]
    }

    pub fn push(&mut self, turn: Turn) {
        self.0.push(turn);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> &Turn {
        // Never empty, so the last turn is at least the system turn.
        &self.0[self.0.len() - 1]
    }
}

impl From<Transcript> for Vec<Turn> {
    fn from(t: Transcript) -> Self {
        t.0
    }
}
