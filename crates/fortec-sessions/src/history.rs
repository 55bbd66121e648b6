//! Bounded conversation history.
//!
//! The upstream model sees the persona directive plus the most recent
//! `max_turns` turns. Older user/assistant turns are dropped from the middle.

use fortec_core::{Transcript, Turn};
use tracing::{debug, warn};

/// Return `transcript` bounded to its system turn plus the last `max_turns` turns.
///
/// Transcripts of `max_turns + 1` turns or fewer come back unchanged.
/// Trimming is best-effort: if the rebuilt turn list is somehow rejected,
/// the input is returned untouched and a warning is logged.
pub fn trim(transcript: &Transcript, max_turns: usize) -> Transcript {
    let len = transcript.len();
    if len <= max_turns + 1 {
        return transcript.clone();
    }

    let history = transcript.history();
    let recent = &history[history.len() - max_turns..];

    let mut turns: Vec<Turn> = Vec::with_capacity(max_turns + 1);
    turns.push(transcript.system().clone());
    turns.extend_from_slice(recent);

    match Transcript::from_turns(turns) {
        Some(trimmed) => {
            debug!(before = len, after = trimmed.len(), "history trimmed");
            trimmed
        }
        None => {
            warn!(len, "history trim produced an invalid transcript, keeping it untrimmed");
            transcript.clone()
        }
    }
}
