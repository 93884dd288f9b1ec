use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the orchestration pipeline.
///
/// Only [`CopilotError::NoProviderAvailable`] escapes a flow as a user-visible
/// failure, and only from flows without a static fallback. The remaining
/// variants are recovered inside the pipeline.
#[derive(Debug, Error)]
pub enum CopilotError {
    #[error("no language-model provider available: {}", AttemptList(.attempts))]
    NoProviderAvailable { attempts: Vec<ProviderAttempt> },
    #[error("provider response could not be parsed: {0}")]
    MalformedResponse(String),
    #[error("broker answers are inconsistent: {0}")]
    InvalidAnswers(String),
}

/// Why a single provider produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Never invoked: credential missing or client could not be built.
    Skipped(String),
    Failed(String),
    #[serde(serialize_with = "serialize_secs")]
    TimedOut(Duration),
}

/// One entry in the trail of providers considered for a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    #[serde(flatten)]
    pub status: AttemptStatus,
}

impl ProviderAttempt {
    pub fn skipped(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Skipped(reason.into()),
        }
    }

    pub fn failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Failed(reason.into()),
        }
    }

    pub fn timed_out(provider: impl Into<String>, after: Duration) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::TimedOut(after),
        }
    }
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            AttemptStatus::Skipped(reason) => write!(f, "{} skipped ({})", self.provider, reason),
            AttemptStatus::Failed(reason) => write!(f, "{} failed ({})", self.provider, reason),
            AttemptStatus::TimedOut(after) => write!(
                f,
                "{} timed out after {}s",
                self.provider,
                after.as_secs_f32()
            ),
        }
    }
}

struct AttemptList<'a>(&'a [ProviderAttempt]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no providers configured");
        }
        for (idx, attempt) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{attempt}")?;
        }
        Ok(())
    }
}

fn serialize_secs<S: serde::Serializer>(after: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(after.as_secs_f64())
}
