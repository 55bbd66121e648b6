//! Bounded restart loop for the transport.
//!
//! A failed run is retried after 5 s, 10 s, 20 s … (capped at 5 minutes) until
//! `max_restarts` is spent; the last error is then returned so the process can
//! exit non-zero and leave further restarts to the service manager.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use fortec_core::config::SupervisorConfig;

const MAX_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub base_delay: Duration,
}

impl RestartPolicy {
    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        Self {
            max_restarts: cfg.max_restarts,
            base_delay: Duration::from_secs(cfg.base_delay_secs),
        }
    }

    /// Delay before restart number `restart` (1-based).
    pub fn delay_for(&self, restart: u32) -> Duration {
        let factor = 2u32.saturating_pow(restart.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

/// Run `task` until it returns `Ok`, restarting on error per `policy`.
pub async fn supervise<F, Fut, E>(name: &str, policy: &RestartPolicy, mut task: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut restarts = 0;
    loop {
        match task().await {
            Ok(()) => {
                info!(task = name, "stopped cleanly");
                return Ok(());
            }
            Err(e) if restarts >= policy.max_restarts => {
                error!(task = name, restarts, error = %e, "giving up after repeated failures");
                return Err(e);
            }
            Err(e) => {
                restarts += 1;
                let delay = policy.delay_for(restarts);
                warn!(
                    task = name,
                    restart = restarts,
                    max = policy.max_restarts,
                    retry_after_secs = delay.as_secs(),
                    error = %e,
                    "task failed, restarting"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
