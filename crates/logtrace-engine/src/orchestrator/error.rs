use crate::upstream::EndpointError;
use logtrace_common::sanitize::ValidationError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DebugError {
    #[error("invalid prompt: {0}")]
    InvalidPrompt(#[from] ValidationError),
    #[error("rate limit exceeded")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("insufficient credits")]
    InsufficientCredits,
    #[error("AI service failed after {attempts} attempt(s): {source}")]
    Upstream { source: EndpointError, attempts: u32 },
}

/// The one notification shown for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl DebugError {
    pub fn code(&self) -> &'static str {
        match self {
            DebugError::InvalidPrompt(_) => "INVALID_PROMPT",
            DebugError::RateLimited { .. } => "RATE_LIMITED",
            DebugError::AuthenticationRequired => "AUTH_REQUIRED",
            DebugError::InsufficientCredits => "INSUFFICIENT_CREDITS",
            DebugError::Upstream { .. } => "UPSTREAM_ERROR",
        }
    }

    pub fn notification(&self) -> Notification {
        let (title, description) = match self {
            DebugError::InvalidPrompt(e) => ("Invalid prompt", e.to_string()),
            DebugError::RateLimited { retry_after_ms } => (
                "Too many requests",
                match retry_after_ms {
                    Some(ms) => format!(
                        "Please wait {} seconds before trying again.",
                        ms.div_ceil(1000)
                    ),
                    None => "Please wait a moment before trying again.".to_string(),
                },
            ),
            DebugError::AuthenticationRequired => (
                "Sign in required",
                "Sign in or configure an API key to use AI debugging.".to_string(),
            ),
            DebugError::InsufficientCredits => (
                "Out of credits",
                "You have used today's free AI debug credits. Upgrade or try again tomorrow."
                    .to_string(),
            ),
            DebugError::Upstream { source, .. } => (
                "AI service unavailable",
                format!("The analysis could not be completed: {}", source),
            ),
        };
        Notification {
            title: title.to_string(),
            description,
        }
    }
}
