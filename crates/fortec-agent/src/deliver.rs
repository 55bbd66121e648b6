//! Chunked text delivery.
//!
//! Telegram's message limit is 4096 characters; replies are cut into
//! fixed-width pieces of at most `max_chars` characters (4000 by default) and
//! sent strictly in order. Each piece is tried with Markdown first and re-sent
//! as plain text if the transport rejects the markup.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::outbound::{MessageRef, Outbound, TextFormat};

/// Pause between consecutive chunks to stay clear of flood limits.
const CHUNK_GAP: Duration = Duration::from_millis(100);

/// Per-call delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn nothing_sent(&self) -> bool {
        self.sent == 0
    }
}

/// Split `text` into consecutive pieces of at most `max_chars` characters.
///
/// Counts Unicode scalar values, so a multi-byte character is never cut in
/// half. Empty text yields no chunks.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Send one message with Markdown, retrying once as plain text if the
/// transport rejects the markup.
pub async fn send_with_fallback(
    outbound: &dyn Outbound,
    recipient: &str,
    text: &str,
) -> Result<MessageRef, DeliveryError> {
    match outbound
        .send_text(recipient, text, TextFormat::Markdown)
        .await
    {
        Err(DeliveryError::Format(reason)) => {
            debug!(%reason, "markdown rejected, resending as plain text");
            outbound.send_text(recipient, text, TextFormat::Plain).await
        }
        other => other,
    }
}

/// Deliver `text` to `recipient`, chunked to `max_chars`.
///
/// Best-effort: a failed chunk is logged and counted, and the remaining
/// chunks are still attempted. Nothing already sent is retracted.
pub async fn deliver_text(
    outbound: &dyn Outbound,
    recipient: &str,
    text: &str,
    max_chars: usize,
) -> DeliveryReport {
    let chunks = split_chunks(text, max_chars);
    let mut report = DeliveryReport::default();

    if chunks.is_empty() {
        warn!(recipient, "refusing to deliver empty message");
        return report;
    }

    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        match send_with_fallback(outbound, recipient, chunk).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                warn!(recipient, chunk_index = i, total, error = %e, "failed to deliver chunk");
                report.failed += 1;
            }
        }

        if i + 1 < total {
            tokio::time::sleep(CHUNK_GAP).await;
        }
    }

    if total > 1 {
        debug!(recipient, sent = report.sent, failed = report.failed, "chunked delivery finished");
    }
    report
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport used by the delivery and dispatch tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Text { text: String, format: TextFormat },
        Image { url: String },
        Deleted(MessageRef),
    }

    /// Records everything sent; optionally fails selected operations.
    #[derive(Default)]
    pub struct RecordingOutbound {
        pub log: Mutex<Vec<Sent>>,
        /// Reject Markdown sends with a formatting error.
        pub reject_markdown: bool,
        /// Fail the N-th (0-based) text send attempt with a transport error.
        pub fail_text_call: Option<usize>,
        pub fail_images: bool,
        pub fail_deletes: bool,
        /// Text sends seen so far; leave at the default.
        pub text_calls: Mutex<usize>,
        /// Last handed-out message id; leave at the default.
        pub next_id: Mutex<i64>,
    }

    impl RecordingOutbound {
        pub fn sent(&self) -> Vec<Sent> {
            self.log.lock().unwrap().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Text { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn next_ref(&self) -> MessageRef {
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            MessageRef(*id)
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_text(
            &self,
            _recipient: &str,
            text: &str,
            format: TextFormat,
        ) -> Result<MessageRef, DeliveryError> {
            let call = {
                let mut calls = self.text_calls.lock().unwrap();
                let n = *calls;
                *calls += 1;
                n
            };
            if self.fail_text_call == Some(call) {
                return Err(DeliveryError::Transport("injected".into()));
            }
            if self.reject_markdown && format == TextFormat::Markdown {
                return Err(DeliveryError::Format("can't parse entities".into()));
            }
            self.log.lock().unwrap().push(Sent::Text {
                text: text.to_string(),
                format,
            });
            Ok(self.next_ref())
        }

        async fn send_image(&self, _recipient: &str, url: &str) -> Result<MessageRef, DeliveryError> {
            if self.fail_images {
                return Err(DeliveryError::Transport("photo rejected".into()));
            }
            self.log.lock().unwrap().push(Sent::Image {
                url: url.to_string(),
            });
            Ok(self.next_ref())
        }

        async fn delete_message(
            &self,
            _recipient: &str,
            message: MessageRef,
        ) -> Result<(), DeliveryError> {
            if self.fail_deletes {
                return Err(DeliveryError::Transport("message can't be deleted".into()));
            }
            self.log.lock().unwrap().push(Sent::Deleted(message));
            Ok(())
        }
    }
}
