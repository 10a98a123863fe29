//! AI debugging requests.
//!
//! Gates run in a fixed order and the first failure wins: prompt
//! validation (before and after sanitizing), rate limit, authentication, credits, then the upstream call
//! with bounded retry. Only a successful call touches the event log, with
//! exactly one `llm_response` event.

pub mod entitlement;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use entitlement::{CreditUsage, DailyCreditLedger, EntitlementService};
pub use error::{DebugError, Notification};
pub use rate_limit::RateLimiter;
pub use retry::{RetryFailure, RetryPolicy, with_retry};

use crate::clock::Clock;
use crate::config::Settings;
use crate::recorder::EventRecorder;
use crate::upstream::{AiEndpoint, EndpointError};
use logtrace_common::event::{LogEvent, NewEvent};
use logtrace_common::protocol::{AiAnalysis, AiResponseEnvelope, AnalyzeRequest};
use logtrace_common::sanitize::{self, MAX_PROMPT_CHARS};
use logtrace_common::snapshot::{ElementSnapshot, Position};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const DEFAULT_SESSION_KEY: &str = "default";

/// Everything a debug request is built from, captured when the request is
/// built. The element may have changed by the time the answer arrives.
#[derive(Debug, Clone)]
pub struct DebugContext {
    pub prompt: String,
    pub element: Option<ElementSnapshot>,
    pub position: Position,
    pub events: Vec<LogEvent>,
    pub settings: Settings,
}

#[derive(Clone)]
pub struct DebugOrchestrator {
    endpoint: Rc<dyn AiEndpoint>,
    entitlements: Rc<dyn EntitlementService>,
    recorder: EventRecorder,
    clock: Rc<dyn Clock>,
    limiter: Rc<RefCell<RateLimiter>>,
    retry: RetryPolicy,
    has_api_key: bool,
}

impl DebugOrchestrator {
    pub fn new(
        endpoint: Rc<dyn AiEndpoint>,
        entitlements: Rc<dyn EntitlementService>,
        recorder: EventRecorder,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            endpoint,
            entitlements,
            recorder,
            clock,
            limiter: Rc::new(RefCell::new(RateLimiter::new(10, 60_000))),
            retry: RetryPolicy::default(),
            has_api_key: false,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Rc::new(RefCell::new(limiter));
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// A locally configured API key satisfies the authentication gate.
    pub fn with_api_key(mut self, present: bool) -> Self {
        self.has_api_key = present;
        self
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    pub fn requests_remaining(&self, session_key: &str) -> usize {
        self.limiter
            .borrow()
            .remaining(session_key, self.clock.now_ms())
    }

    pub async fn analyze(
        &self,
        prompt: &str,
        element: Option<&ElementSnapshot>,
        position: Position,
    ) -> Result<String, DebugError> {
        self.analyze_as(DEFAULT_SESSION_KEY, prompt, element, position)
            .await
    }

    pub async fn analyze_context(&self, context: &DebugContext) -> Result<String, DebugError> {
        self.analyze(&context.prompt, context.element.as_ref(), context.position)
            .await
    }

    /// Returns the sanitized response text.
    pub async fn analyze_as(
        &self,
        session_key: &str,
        prompt: &str,
        element: Option<&ElementSnapshot>,
        position: Position,
    ) -> Result<String, DebugError> {
        let result = self
            .run_gates_and_call(session_key, prompt, element, position)
            .await;
        if let Err(e) = &result {
            warn!(code = e.code(), error = %e, "AI debug request failed");
        }
        result
    }

    async fn run_gates_and_call(
        &self,
        session_key: &str,
        prompt: &str,
        element: Option<&ElementSnapshot>,
        position: Position,
    ) -> Result<String, DebugError> {
        sanitize::validate_prompt(prompt)?;
        let prompt = sanitize::sanitize_bounded(prompt.trim(), MAX_PROMPT_CHARS);
        // Stripping markup can shrink a valid prompt below the minimum.
        sanitize::validate_prompt(&prompt)?;

        self.limiter
            .borrow_mut()
            .try_acquire(session_key, self.clock.now_ms())
            .map_err(|wait| DebugError::RateLimited {
                retry_after_ms: Some(wait),
            })?;

        if !self.entitlements.is_authenticated().await && !self.has_api_key {
            return Err(DebugError::AuthenticationRequired);
        }
        if !self.entitlements.is_premium().await && !self.entitlements.consume_credit().await {
            return Err(DebugError::InsufficientCredits);
        }

        let summary = element.map(ElementSnapshot::summary);
        let request = AnalyzeRequest {
            prompt: prompt.clone(),
            element: summary.clone(),
            position,
        };
        debug!(chars = prompt.chars().count(), has_element = summary.is_some(), "calling AI endpoint");

        let endpoint = &self.endpoint;
        let request = &request;
        let analysis = with_retry(self.retry, self.clock.as_ref(), || async move {
            endpoint.analyze(request).await.and_then(accept_envelope)
        })
        .await
        .map_err(classify_failure)?;

        let response = sanitize::sanitize(&analysis.render());
        self.recorder.record(NewEvent::llm_response(
            prompt,
            response.clone(),
            summary,
            position,
        ));
        info!(chars = response.chars().count(), "AI analysis recorded");
        Ok(response)
    }
}

fn accept_envelope(envelope: AiResponseEnvelope) -> Result<AiAnalysis, EndpointError> {
    match (envelope.success, envelope.data) {
        (true, Some(data)) => Ok(data),
        (true, None) => Err(EndpointError::InvalidResponse(
            "success envelope without data".into(),
        )),
        (false, _) => Err(EndpointError::Unsuccessful(
            envelope
                .error
                .unwrap_or_else(|| "endpoint reported failure".into()),
        )),
    }
}

/// Endpoint answers that mean a gate failed upstream map onto the same
/// errors as the local gates.
fn classify_failure(failure: RetryFailure) -> DebugError {
    match failure.error {
        EndpointError::Unauthorized(_) => DebugError::AuthenticationRequired,
        EndpointError::PaymentRequired => DebugError::InsufficientCredits,
        EndpointError::RateLimited { retry_after_secs } => DebugError::RateLimited {
            retry_after_ms: retry_after_secs.map(|s| s.saturating_mul(1000)),
        },
        source => DebugError::Upstream {
            source,
            attempts: failure.attempts,
        },
    }
}
