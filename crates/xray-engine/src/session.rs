use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::{AnalysisSession, ContentPart, ModelClient, Turn};
use crate::error::EngineError;
use crate::ingest::EncodedImage;

/// Lifecycle of the conversation owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NoSession,
    Active,
    Failed,
}

/// Bounded exponential backoff for the initial analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the zero-based `failed_attempt`: `base * 2^failed_attempt`.
    pub fn delay_before_retry(&self, failed_attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(failed_attempt))
    }
}

/// Status text shown while waiting to retry. `next_attempt` is one-based.
pub fn retry_status_message(next_attempt: u32, max_attempts: u32) -> String {
    format!("Model is busy. Retrying attempt {next_attempt} of {max_attempts}…")
}

/// Drives the model conversation: one multi-image opening turn with retry,
/// then text-only refinement turns on the same session.
#[derive(Clone)]
pub struct SessionEngine {
    client: Arc<dyn ModelClient>,
    retry: RetryPolicy,
}

impl SessionEngine {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self::with_retry_policy(client, RetryPolicy::default())
    }

    pub fn with_retry_policy(client: Arc<dyn ModelClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &dyn ModelClient {
        self.client.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Opens a fresh session and sends the images plus `prompt` as one turn.
    ///
    /// Transient failures are retried per the policy, calling `on_status`
    /// with the retry message before each wait. Per-attempt errors are only
    /// logged; exhaustion yields `ServiceOverloaded`.
    pub async fn start<F>(
        &self,
        images: &[EncodedImage],
        prompt: &str,
        mut on_status: F,
    ) -> Result<(String, AnalysisSession), EngineError>
    where
        F: FnMut(&str),
    {
        if images.is_empty() {
            return Err(EngineError::Validation(
                "at least one image is required to start a session".to_string(),
            ));
        }

        let mut session = self.client.create_session();
        let mut parts = images
            .iter()
            .cloned()
            .map(ContentPart::Image)
            .collect::<Vec<_>>();
        parts.push(ContentPart::Text(prompt.to_string()));
        let turn = Turn::user(parts);

        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 0..max_attempts {
            match self.client.send_turn(session.turns(), &turn).await {
                Ok(report) => {
                    info!(
                        session_id = session.id(),
                        provider = self.client.name(),
                        attempt = attempt + 1,
                        images = images.len(),
                        "analysis session started"
                    );
                    session.record_exchange(turn, &report);
                    return Ok((report, session));
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        provider = self.client.name(),
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "transient model failure"
                    );
                    if attempt + 1 >= max_attempts {
                        break;
                    }
                    on_status(&retry_status_message(attempt + 2, max_attempts));
                    let delay = self.retry.delay_before_retry(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        provider = self.client.name(),
                        attempt = attempt + 1,
                        error = %err,
                        "model request failed"
                    );
                    return Err(EngineError::Service(err));
                }
            }
        }

        Err(EngineError::ServiceOverloaded {
            attempts: max_attempts,
        })
    }

    /// Sends one text turn on an existing session. Not retried; on failure
    /// the session is left untouched and can be reused.
    pub async fn refine(
        &self,
        session: &mut AnalysisSession,
        prompt: &str,
    ) -> Result<String, EngineError> {
        if session.turns().is_empty() {
            return Err(EngineError::InvalidSession);
        }
        let turn = Turn::user_text(prompt);
        let report = self
            .client
            .send_turn(session.turns(), &turn)
            .await
            .map_err(|err| {
                warn!(session_id = session.id(), error = %err, "refinement failed");
                EngineError::Service(err)
            })?;
        session.record_exchange(turn, &report);
        debug!(
            session_id = session.id(),
            exchanges = session.exchange_count(),
            "session refined"
        );
        Ok(report)
    }
}
