//! Per-event orchestration: session bookkeeping, chat-vs-image routing,
//! upstream calls and delivery.
//!
//! [`Dispatcher::handle_text`] is the single failure boundary. Every error
//! (and any panic) raised while handling one inbound message ends there as a
//! log line plus a short apology to the user; nothing propagates to the
//! transport loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use fortec_core::config::FortecConfig;
use fortec_core::{Turn, UserId};
use fortec_sessions::{SessionGuard, SessionTable};

use crate::classify::{self, Route};
use crate::deliver::{self, DeliveryReport};
use crate::error::{DeliveryError, DispatchError, UpstreamError};
use crate::outbound::{Outbound, TextFormat};
use crate::provider::{ChatProvider, ImageProvider};

pub const IMAGE_PLACEHOLDER: &str = "🎨 Creating your image, this may take a few minutes...";
pub const GENERIC_APOLOGY: &str =
    "Sorry, something went wrong while handling your message. Please try again.";

/// Why an upstream call could not produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    Timeout,
    Network,
    Upstream,
    Unexpected,
}

impl From<&UpstreamError> for FailureCause {
    fn from(e: &UpstreamError) -> Self {
        match e {
            UpstreamError::Timeout { .. } => FailureCause::Timeout,
            UpstreamError::Network { .. } => FailureCause::Network,
            UpstreamError::Status { .. } => FailureCause::Upstream,
            UpstreamError::Parse(_) => FailureCause::Unexpected,
        }
    }
}

/// Which upstream the apology is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Chat,
    Image,
}

/// User-facing apology for an upstream failure. Never includes error detail.
fn apology(job: Job, cause: FailureCause) -> &'static str {
    match (job, cause) {
        (Job::Chat, FailureCause::Timeout) => {
            "Sorry, the AI service took too long to respond. Please try again in a moment."
        }
        (Job::Chat, FailureCause::Network) => {
            "Sorry, I couldn't reach the AI service right now. Please try again later."
        }
        (Job::Chat, FailureCause::Upstream) => {
            "Sorry, I encountered an error while processing your request. Please try again later."
        }
        (Job::Chat, FailureCause::Unexpected) => {
            "Sorry, I couldn't process your request. Please try again."
        }
        (Job::Image, FailureCause::Timeout) => {
            "Sorry, the image took too long to generate. Please try again with a simpler description."
        }
        (Job::Image, FailureCause::Network) => {
            "Sorry, I couldn't reach the image service right now. Please try again later."
        }
        (Job::Image, FailureCause::Upstream) => {
            "Sorry, the image service returned an error. Please try again later."
        }
        (Job::Image, FailureCause::Unexpected) => {
            "Sorry, I couldn't create that image. Please try a different description."
        }
    }
}

/// Assistant turn recorded in place of generated image bytes.
pub fn image_ack(prompt: &str, count: usize) -> String {
    if count == 1 {
        format!("[Generated 1 image for: {prompt}]")
    } else {
        format!("[Generated {count} images for: {prompt}]")
    }
}

/// Final state of one handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Chat reply generated and delivered (possibly partially, see report).
    Replied(DeliveryReport),
    /// Images generated; `delivered` of them reached the user.
    Illustrated { delivered: usize },
    /// Upstream failed after retries; a cause-specific apology was sent.
    Apologized(FailureCause),
    /// Handling failed unexpectedly; the generic apology was sent.
    Failed,
}

/// Tunables for the dispatch pipeline.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_turns: usize,
    pub max_chunk_chars: usize,
}

impl DispatchSettings {
    pub fn from_config(config: &FortecConfig) -> Self {
        Self {
            max_turns: config.history.max_turns,
            max_chunk_chars: config.delivery.max_chunk_chars,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_turns: fortec_core::config::DEFAULT_MAX_TURNS,
            max_chunk_chars: fortec_core::config::DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

/// Ties sessions, upstreams and the outbound transport together.
///
/// Shared across handler tasks via `Arc`.
pub struct Dispatcher {
    sessions: Arc<SessionTable>,
    chat: Arc<dyn ChatProvider>,
    images: Arc<dyn ImageProvider>,
    outbound: Arc<dyn Outbound>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<SessionTable>,
        chat: Arc<dyn ChatProvider>,
        images: Arc<dyn ImageProvider>,
        outbound: Arc<dyn Outbound>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            sessions,
            chat,
            images,
            outbound,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Handle one inbound text message from `user`, replying to `recipient`.
    ///
    /// Never fails: errors and panics are logged and turned into an apology.
    pub async fn handle_text(&self, user: &UserId, recipient: &str, text: &str) -> DispatchOutcome {
        let result = AssertUnwindSafe(self.process(user, recipient, text))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(DispatchError::Internal(panic_message(panic))));

        match result {
            Ok(outcome) => {
                debug!(user = %user, ?outcome, "message handled");
                outcome
            }
            Err(e) => {
                error!(user = %user, error = %e, detail = ?e, "message handling failed");
                if let Err(send_err) = self
                    .outbound
                    .send_text(recipient, GENERIC_APOLOGY, TextFormat::Plain)
                    .await
                {
                    warn!(user = %user, error = %send_err, "could not deliver apology");
                }
                DispatchOutcome::Failed
            }
        }
    }

    async fn process(
        &self,
        user: &UserId,
        recipient: &str,
        text: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        // Held for the whole exchange so events for one user apply in order.
        let mut session = self.sessions.lock(user).await;

        match classify::route(text) {
            Route::Image { prompt } => {
                info!(user = %user, "routing to image generation");
                self.respond_image(&mut session, recipient, text, &prompt).await
            }
            Route::Chat => {
                debug!(user = %user, "routing to chat completion");
                self.respond_chat(&mut session, recipient, text).await
            }
        }
    }

    async fn respond_chat(
        &self,
        session: &mut SessionGuard,
        recipient: &str,
        text: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        session.append(Turn::user(text));
        session.trim(self.settings.max_turns);

        let reply = match self.chat.complete(session.snapshot()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user = %session.user(), provider = self.chat.name(), attempts = e.attempts(), error = %e, "chat completion failed");
                return Ok(self.apologize(recipient, Job::Chat, &e).await);
            }
        };

        session.append(Turn::assistant(reply.clone()));

        let report =
            deliver::deliver_text(&*self.outbound, recipient, &reply, self.settings.max_chunk_chars)
                .await;
        if report.nothing_sent() {
            return Err(DispatchError::Delivery(DeliveryError::Transport(format!(
                "none of {} chunk(s) delivered",
                report.failed
            ))));
        }
        Ok(DispatchOutcome::Replied(report))
    }

    async fn respond_image(
        &self,
        session: &mut SessionGuard,
        recipient: &str,
        text: &str,
        prompt: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        session.append(Turn::user(text));

        let placeholder = match self
            .outbound
            .send_text(recipient, IMAGE_PLACEHOLDER, TextFormat::Plain)
            .await
        {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(user = %session.user(), error = %e, "could not send image placeholder");
                None
            }
        };

        let result = self.images.generate(prompt).await;

        if let Some(m) = placeholder {
            if let Err(e) = self.outbound.delete_message(recipient, m).await {
                warn!(user = %session.user(), error = %e, "could not remove image placeholder");
            }
        }

        let urls = match result {
            Ok(urls) => urls,
            Err(e) => {
                warn!(user = %session.user(), provider = self.images.name(), attempts = e.attempts(), error = %e, "image generation failed");
                session.trim(self.settings.max_turns);
                return Ok(self.apologize(recipient, Job::Image, &e).await);
            }
        };

        let mut delivered = 0;
        for url in &urls {
            match self.outbound.send_image(recipient, url).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    warn!(user = %session.user(), error = %e, "photo send failed, sending link instead");
                    match self
                        .outbound
                        .send_text(recipient, url, TextFormat::Plain)
                        .await
                    {
                        Ok(_) => delivered += 1,
                        Err(e) => warn!(user = %session.user(), error = %e, "could not deliver image link"),
                    }
                }
            }
        }

        session.append(Turn::assistant(image_ack(prompt, urls.len())));
        session.trim(self.settings.max_turns);

        if delivered == 0 {
            return Err(DispatchError::Delivery(DeliveryError::Transport(format!(
                "none of {} image(s) delivered",
                urls.len()
            ))));
        }
        Ok(DispatchOutcome::Illustrated { delivered })
    }

    async fn apologize(&self, recipient: &str, job: Job, err: &UpstreamError) -> DispatchOutcome {
        let cause = FailureCause::from(err);
        if let Err(e) = self
            .outbound
            .send_text(recipient, apology(job, cause), TextFormat::Plain)
            .await
        {
            warn!(error = %e, "could not deliver apology");
        }
        DispatchOutcome::Apologized(cause)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
