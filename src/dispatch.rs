//! Bounded-retry delivery of one conversation to the chat endpoint.

use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::chat::{self, ChatRequest, ChatTransport, MISSING_ANSWER, TransportError};
use crate::conversation::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per conversation, at least one.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("status {0}")]
    Status(u16),
    #[error("timeout")]
    Timeout,
    #[error("error: {0}")]
    Transport(String),
    #[error("error: {0}")]
    Body(String),
}

impl From<TransportError> for AttemptFailure {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => AttemptFailure::Timeout,
            TransportError::Request(message) => AttemptFailure::Transport(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success { question: String, answer: String },
    Failure { reason: String },
}

/// Receives what happens during a dispatch.
pub trait DispatchJournal: Send + Sync {
    fn attempt_failed(&self, attempt: u32, attempts: u32, failure: &AttemptFailure);

    fn retry_scheduled(&self, _delay: Duration) {}

    fn malformed_answer(&self, reason: &str);

    fn answered(&self, question: &str, answer: &str);
}

impl<J: DispatchJournal + ?Sized> DispatchJournal for &J {
    fn attempt_failed(&self, attempt: u32, attempts: u32, failure: &AttemptFailure) {
        (**self).attempt_failed(attempt, attempts, failure)
    }

    fn retry_scheduled(&self, delay: Duration) {
        (**self).retry_scheduled(delay)
    }

    fn malformed_answer(&self, reason: &str) {
        (**self).malformed_answer(reason)
    }

    fn answered(&self, question: &str, answer: &str) {
        (**self).answered(question, answer)
    }
}

/// Writes dispatch events to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJournal;

impl DispatchJournal for TracingJournal {
    fn attempt_failed(&self, attempt: u32, attempts: u32, failure: &AttemptFailure) {
        match failure {
            AttemptFailure::Status(_) | AttemptFailure::Timeout => {
                warn!("Attempt {attempt}/{attempts}: {failure}")
            }
            AttemptFailure::Transport(_) | AttemptFailure::Body(_) => {
                error!("Attempt {attempt}/{attempts}: {failure}")
            }
        }
    }

    fn malformed_answer(&self, reason: &str) {
        error!("Response handling error: {reason}");
    }

    fn answered(&self, question: &str, answer: &str) {
        info!("Question: {question}");
        info!("Answer: {answer}");
        info!("{}", "=".repeat(50));
    }
}

pub struct Dispatcher<'a> {
    transport: &'a dyn ChatTransport,
    journal: &'a dyn DispatchJournal,
    policy: RetryPolicy,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        transport: &'a dyn ChatTransport,
        journal: &'a dyn DispatchJournal,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            journal,
            policy,
        }
    }

    pub async fn dispatch(&self, conversation: &Conversation) -> DispatchOutcome {
        let attempts = self.policy.attempts;
        let mut last_failure = None;

        for attempt in 1..=attempts {
            match self.attempt(conversation).await {
                Ok(answer) => {
                    let question = conversation.question.content.clone();
                    self.journal.answered(&question, &answer);
                    return DispatchOutcome::Success { question, answer };
                }
                Err(failure) => {
                    self.journal.attempt_failed(attempt, attempts, &failure);
                    last_failure = Some(failure);
                }
            }

            if attempt < attempts {
                self.journal.retry_scheduled(self.policy.delay);
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        DispatchOutcome::Failure {
            reason: last_failure
                .map(|failure| failure.to_string())
                .unwrap_or_else(|| "no attempts made".to_owned()),
        }
    }

    async fn attempt(&self, conversation: &Conversation) -> Result<String, AttemptFailure> {
        let reply = self
            .transport
            .post(&ChatRequest::from(conversation))
            .await?;

        if reply.status != 200 {
            return Err(AttemptFailure::Status(reply.status));
        }

        let body: serde_json::Value = serde_json::from_str(&reply.body)
            .map_err(|e| AttemptFailure::Body(e.to_string()))?;

        Ok(chat::extract_answer(&body).unwrap_or_else(|reason| {
            self.journal.malformed_answer(&reason);
            MISSING_ANSWER.to_owned()
        }))
    }
}
