//! Color application orchestration.
//!
//! [`ColorApplicationOrchestrator::apply`] validates a request, drives the
//! provider through [`machine::transition`] and folds every outcome into a
//! [`ColorApplicationResult`]. Nothing escapes as an error.

pub mod machine;

use std::sync::Arc;
use std::time::Duration;

use crate::ports::clock::Clock;
use crate::error::RecolorError;
use crate::ports::image_provider::{
    GenerationParams, ImageProvider, ProviderFuture, ProviderRequest,
};
use crate::prompt::recolor_instruction;
use crate::rate_limit::RateLimiter;
use crate::request::{
    ColorApplicationRequest, ColorApplicationResult, Failure, FailureKind, InputLimits,
};

use self::machine::{transition, Event, JobState, Policy};

/// Everything the orchestrator needs besides its ports.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Resolved provider model id.
    pub model: String,
    /// Sampling parameters.
    pub generation: GenerationParams,
    /// Validation limits.
    pub limits: InputLimits,
    /// Retry and polling policy.
    pub policy: Policy,
}

/// Applies paint colors to room photos through an [`ImageProvider`].
pub struct ColorApplicationOrchestrator {
    provider: Arc<dyn ImageProvider>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
    limiter: Option<RateLimiter>,
}

impl ColorApplicationOrchestrator {
    /// Create an orchestrator without caller rate limiting.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { provider, clock, settings, limiter: None }
    }

    /// Enforce a per-caller request limit in [`Self::admit`] and [`Self::apply_as`].
    #[must_use]
    pub fn with_rate_limit(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Validation limits in effect.
    #[must_use]
    pub fn limits(&self) -> InputLimits {
        self.settings.limits
    }

    /// Count a request from `caller`; false when it is over the limit.
    pub fn admit(&self, caller: &str) -> bool {
        let Some(limiter) = &self.limiter else {
            return true;
        };
        let admitted = limiter.admit(caller, self.clock.now());
        if !admitted {
            tracing::warn!(caller, "rate limit exceeded");
        }
        admitted
    }

    /// Rate-limit `caller`, then [`Self::apply`].
    pub async fn apply_as(
        &self,
        caller: &str,
        request: ColorApplicationRequest,
    ) -> ColorApplicationResult {
        if !self.admit(caller) {
            return ColorApplicationResult::failed(
                Failure::new(FailureKind::RateLimited, "Too many requests. Please wait a moment."),
                request.source_image,
            );
        }
        self.apply(request).await
    }

    /// Recolor one element of the source image.
    pub async fn apply(&self, request: ColorApplicationRequest) -> ColorApplicationResult {
        let validated = match request.validate(self.settings.limits) {
            Ok(v) => v,
            Err(detail) => {
                tracing::debug!(%detail, "rejected color application request");
                return ColorApplicationResult::failed(
                    Failure::new(FailureKind::InvalidInput, detail),
                    request.source_image,
                );
            }
        };

        let provider_request = ProviderRequest {
            model: self.settings.model.clone(),
            prompt: recolor_instruction(&validated),
            image: validated.source_image,
            params: self.settings.generation,
        };

        match self.run(&provider_request).await {
            JobState::Succeeded { image_ref } => {
                ColorApplicationResult::succeeded(image_ref, request.source_image)
            }
            JobState::Failed(failure) => {
                tracing::warn!(kind = %failure.kind, detail = %failure.detail, "color application failed");
                ColorApplicationResult::failed(failure, request.source_image)
            }
            // run() only returns terminal states
            JobState::Submitted { .. } | JobState::Polling { .. } => ColorApplicationResult::failed(
                Failure::new(FailureKind::Exhausted, "job stopped before finishing"),
                request.source_image,
            ),
        }
    }

    async fn run(&self, request: &ProviderRequest) -> JobState {
        let started = self.clock.now();
        let mut state = JobState::start();

        while !state.is_terminal() {
            let budget = self.settings.policy.max_wait.saturating_sub(self.elapsed_since(started));
            let event = match &state {
                JobState::Submitted { attempt, .. } => {
                    tracing::info!(model = %request.model, attempt, "submitting to provider");
                    self.within(budget, self.provider.submit(request)).await.map(Event::Submitted)
                }
                JobState::Polling { handle, .. } => {
                    tracing::debug!(job = %handle.id, "polling provider job");
                    self.within(budget, self.provider.poll(handle)).await.map(Event::Polled)
                }
                JobState::Succeeded { .. } | JobState::Failed(_) => break,
            };
            let Some(event) = event else {
                tracing::warn!(budget_ms = budget.as_millis(), "provider call outlived the deadline");
                state = JobState::Failed(self.settings.policy.deadline_exceeded());
                break;
            };

            let elapsed = self.elapsed_since(started);
            let step = transition(state, event, elapsed, &self.settings.policy);
            if let (JobState::Submitted { attempt, .. }, Some(wait)) = (&step.next, step.wait) {
                tracing::warn!(attempt, wait_ms = wait.as_millis(), "retrying provider call");
            }
            state = step.next;
            if let Some(wait) = step.wait {
                self.clock.sleep(wait).await;
            }
        }

        tracing::info!(
            elapsed_ms = self.elapsed_since(started).as_millis(),
            succeeded = matches!(state, JobState::Succeeded { .. }),
            "provider job finished"
        );
        state
    }

    /// Run `call` unless `budget` runs out first.
    async fn within<T>(
        &self,
        budget: Duration,
        call: ProviderFuture<'_, T>,
    ) -> Option<Result<T, RecolorError>> {
        tokio::select! {
            biased;
            result = call => Some(result),
            () = self.clock.sleep(budget) => None,
        }
    }

    fn elapsed_since(&self, started: Duration) -> Duration {
        self.clock.now().saturating_sub(started)
    }
}
