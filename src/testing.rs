//! Test doubles for the provider and clock ports.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::RecolorError;
use crate::ports::clock::{Clock, SleepFuture};
use crate::ports::image_provider::{
    ImageProvider, JobHandle, JobSnapshot, ProviderFuture, ProviderRequest, Submission,
};

/// Clock whose time only moves when something sleeps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Time moves when the sleep is awaited, so a sleep that loses a race costs nothing.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(async move {
            self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
            self.advance(duration);
        })
    }
}

/// Provider that answers from scripted queues and counts calls.
///
/// When a queue runs dry the last scripted answer is repeated.
#[derive(Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<Result<Submission, RecolorError>>>,
    polls: Mutex<VecDeque<Result<JobSnapshot, RecolorError>>>,
    last_submit: Mutex<Option<Submission>>,
    last_submit_status: Mutex<Option<u16>>,
    last_poll: Mutex<Option<JobSnapshot>>,
    submit_requests: Mutex<Vec<ProviderRequest>>,
    poll_count: Mutex<usize>,
    polls_hang: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submit(self, answer: Result<Submission, RecolorError>) -> Self {
        self.submits.lock().unwrap_or_else(PoisonError::into_inner).push_back(answer);
        self
    }

    pub fn on_poll(self, answer: Result<JobSnapshot, RecolorError>) -> Self {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner).push_back(answer);
        self
    }

    /// Make every poll wait forever, like a provider that stopped answering.
    pub fn with_hanging_polls(mut self) -> Self {
        self.polls_hang = true;
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submit_requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn poll_count(&self) -> usize {
        *self.poll_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests seen by `submit`, in order.
    pub fn submitted(&self) -> Vec<ProviderRequest> {
        self.submit_requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_submit(&self) -> Result<Submission, RecolorError> {
        let scripted = self.submits.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match scripted {
            Some(Ok(submission)) => {
                *self.last_submit.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(submission.clone());
                *self.last_submit_status.lock().unwrap_or_else(PoisonError::into_inner) = None;
                Ok(submission)
            }
            Some(Err(err)) => {
                *self.last_submit.lock().unwrap_or_else(PoisonError::into_inner) = None;
                *self.last_submit_status.lock().unwrap_or_else(PoisonError::into_inner) =
                    err.status();
                Err(err)
            }
            None => self.repeat_submit(),
        }
    }

    fn repeat_submit(&self) -> Result<Submission, RecolorError> {
        if let Some(s) = self.last_submit.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Ok(s);
        }
        let status = *self.last_submit_status.lock().unwrap_or_else(PoisonError::into_inner);
        Err(RecolorError::Api {
            status: status.unwrap_or(500),
            message: "scripted failure".to_string(),
        })
    }

    fn next_poll(&self) -> Result<JobSnapshot, RecolorError> {
        let scripted = self.polls.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match scripted {
            Some(Ok(snapshot)) => {
                *self.last_poll.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(err)) => Err(err),
            None => self
                .last_poll
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .ok_or_else(|| RecolorError::Replay("no scripted poll answer".to_string())),
        }
    }
}

impl ImageProvider for ScriptedProvider {
    fn submit(&self, request: &ProviderRequest) -> ProviderFuture<'_, Submission> {
        self.submit_requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        let answer = self.next_submit();
        Box::pin(async move { answer })
    }

    fn poll(&self, _handle: &JobHandle) -> ProviderFuture<'_, JobSnapshot> {
        *self.poll_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if self.polls_hang {
            return Box::pin(std::future::pending());
        }
        let answer = self.next_poll();
        Box::pin(async move { answer })
    }
}

/// HTTP error with the given status.
pub fn http_error(status: u16) -> RecolorError {
    RecolorError::Api { status, message: format!("upstream said {status}") }
}

/// A tiny but valid source image URI.
pub const SOURCE_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";
