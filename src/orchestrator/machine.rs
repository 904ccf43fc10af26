//! Pure state machine for one provider job.
//!
//! [`transition`] takes the current state, the result of the call the
//! driver just made and the time elapsed since the first submit, and
//! returns the next state plus how long to wait before acting on it. It
//! performs no I/O, so every retry and polling decision is testable with
//! plain values.

use std::time::Duration;

use crate::error::{Disposition, RecolorError};
use crate::ports::image_provider::{JobHandle, JobSnapshot, JobStatus, Submission};
use crate::request::{Failure, FailureKind};

/// Retry, throttling and polling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Total submit attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before attempt `n + 1` is `backoff_step * n`.
    pub backoff_step: Duration,
    /// Fixed wait after a provider 429.
    pub throttle_backoff: Duration,
    /// How many provider 429s are absorbed per job.
    pub throttle_retries: u32,
    /// Smallest poll interval.
    pub poll_floor: Duration,
    /// Largest poll interval.
    pub poll_ceiling: Duration,
    /// Hard ceiling on elapsed time since the first submit.
    pub max_wait: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1500),
            throttle_backoff: Duration::from_millis(5000),
            throttle_retries: 1,
            poll_floor: Duration::from_millis(1000),
            poll_ceiling: Duration::from_millis(3000),
            max_wait: Duration::from_millis(120_000),
        }
    }
}

impl Policy {
    /// Interval before the next poll: `min(ceiling, floor + elapsed / 10)`.
    #[must_use]
    pub fn poll_interval(&self, elapsed: Duration) -> Duration {
        self.poll_ceiling.min(self.poll_floor + elapsed / 10)
    }

    /// Backoff before the attempt following `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Failure reported once `max_wait` has run out.
    #[must_use]
    pub fn deadline_exceeded(&self) -> Failure {
        Failure::new(
            FailureKind::Timeout,
            format!("no result within {} ms", self.max_wait.as_millis()),
        )
    }
}

/// Where a job stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// A submit is due.
    Submitted {
        /// 1-based attempt number.
        attempt: u32,
        /// Provider 429s absorbed so far.
        throttled: u32,
    },
    /// A poll of `handle` is due.
    Polling {
        /// Attempt that produced the handle.
        attempt: u32,
        /// Provider 429s absorbed so far.
        throttled: u32,
        /// The asynchronous job.
        handle: JobHandle,
    },
    /// Finished with an image.
    Succeeded {
        /// URL or data URI of the result.
        image_ref: String,
    },
    /// Finished without an image.
    Failed(Failure),
}

impl JobState {
    /// State before the first call.
    #[must_use]
    pub fn start() -> Self {
        Self::Submitted { attempt: 1, throttled: 0 }
    }

    /// True for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed(_))
    }
}

/// Result of the call the driver just made.
#[derive(Debug)]
pub enum Event {
    /// Outcome of a submit.
    Submitted(Result<Submission, RecolorError>),
    /// Outcome of a poll.
    Polled(Result<JobSnapshot, RecolorError>),
}

/// Next state and the wait before acting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// The new state.
    pub next: JobState,
    /// Sleep before the next call, if any.
    pub wait: Option<Duration>,
}

impl Transition {
    fn now(next: JobState) -> Self {
        Self { next, wait: None }
    }

    fn after(next: JobState, wait: Duration) -> Self {
        Self { next, wait: Some(wait) }
    }

    fn fail(failure: Failure) -> Self {
        Self::now(JobState::Failed(failure))
    }
}

/// Advance the job by one event.
#[must_use]
pub fn transition(state: JobState, event: Event, elapsed: Duration, policy: &Policy) -> Transition {
    let (attempt, throttled, handle) = match state {
        JobState::Submitted { attempt, throttled } => (attempt, throttled, None),
        JobState::Polling { attempt, throttled, handle } => (attempt, throttled, Some(handle)),
        terminal => return Transition::now(terminal),
    };
    let step = Step { attempt, throttled, elapsed, policy };

    let snapshot = match event {
        Event::Submitted(Ok(Submission::Pending(handle))) => return step.poll_later(handle),
        Event::Submitted(Ok(Submission::Completed(snapshot))) | Event::Polled(Ok(snapshot)) => {
            snapshot
        }
        Event::Submitted(Err(err)) | Event::Polled(Err(err)) => return step.on_error(&err, handle),
    };

    match snapshot.status {
        JobStatus::Succeeded => match snapshot.image() {
            Some(image) => Transition::now(JobState::Succeeded { image_ref: image.to_string() }),
            None => step.retry("provider reported success without an image".to_string()),
        },
        JobStatus::Failed | JobStatus::Canceled => {
            let verb = if snapshot.status == JobStatus::Failed { "failed" } else { "canceled" };
            let reason = snapshot.error.unwrap_or_else(|| "unknown".to_string());
            Transition::fail(Failure::new(
                FailureKind::ProviderFailed,
                format!("prediction {verb}: {reason}"),
            ))
        }
        JobStatus::Starting | JobStatus::Processing => match handle {
            Some(handle) => step.poll_later(handle),
            // A synchronous answer that is not finished gives us nothing to poll.
            None => step.retry("provider returned an unfinished job without a handle".to_string()),
        },
    }
}

struct Step<'a> {
    attempt: u32,
    throttled: u32,
    elapsed: Duration,
    policy: &'a Policy,
}

impl Step<'_> {
    fn poll_later(&self, handle: JobHandle) -> Transition {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Transition::fail(self.policy.deadline_exceeded());
        }
        let interval = self.policy.poll_interval(self.elapsed);
        if interval >= remaining {
            // No poll fits before the ceiling: wait it out, then give up.
            return Transition::after(JobState::Failed(self.policy.deadline_exceeded()), remaining);
        }
        Transition::after(
            JobState::Polling { attempt: self.attempt, throttled: self.throttled, handle },
            interval,
        )
    }

    fn retry(&self, last_error: String) -> Transition {
        if self.attempt >= self.policy.max_attempts {
            return Transition::fail(Failure::new(
                FailureKind::Exhausted,
                format!("gave up after {} attempts: {last_error}", self.attempt),
            ));
        }
        let backoff = self.policy.backoff(self.attempt);
        if backoff >= self.remaining() {
            return Transition::fail(self.policy.deadline_exceeded());
        }
        Transition::after(
            JobState::Submitted { attempt: self.attempt + 1, throttled: self.throttled },
            backoff,
        )
    }

    fn on_error(&self, err: &RecolorError, handle: Option<JobHandle>) -> Transition {
        match err.disposition() {
            Disposition::Transient => self.retry(err.to_string()),
            Disposition::Throttled
                if self.throttled < self.policy.throttle_retries
                    && self.policy.throttle_backoff >= self.remaining() =>
            {
                Transition::fail(self.policy.deadline_exceeded())
            }
            Disposition::Throttled if self.throttled < self.policy.throttle_retries => {
                let throttled = self.throttled + 1;
                let next = match handle {
                    Some(handle) => JobState::Polling { attempt: self.attempt, throttled, handle },
                    None => JobState::Submitted { attempt: self.attempt, throttled },
                };
                Transition::after(next, self.policy.throttle_backoff)
            }
            Disposition::Throttled | Disposition::Fatal => Transition::fail(
                Failure::new(FailureKind::ProviderFailed, err.detail()).with_status(err.status()),
            ),
        }
    }

    fn remaining(&self) -> Duration {
        self.policy.max_wait.saturating_sub(self.elapsed)
    }
}
