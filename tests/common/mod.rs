//! Shared test doubles for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use breakwater::{PreparedRequest, RawResponse, Transport, TransportError, TransportErrorKind};
use http::StatusCode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forecast {
    pub city: String,
    pub high_celsius: i32,
}

pub fn oslo() -> Forecast {
    Forecast {
        city: "Oslo".to_string(),
        high_celsius: 14,
    }
}

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return this status and body.
    Respond(u16, String),
    /// Fail with this transport error kind.
    Fail(TransportErrorKind),
    /// Never complete.
    Hang,
}

impl Step {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        Step::Respond(status, serde_json::to_string(value).unwrap())
    }
}

/// Transport that replays a script, then repeats a fallback step forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    requests: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new(Vec::new(), step)
    }

    /// Fails `failures` times with `kind`, then repeats `then`.
    pub fn failing_then(failures: usize, kind: TransportErrorKind, then: Step) -> Arc<Self> {
        Self::new(vec![Step::Fail(kind); failures], then)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PreparedRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Respond(status, body) => Ok(RawResponse::new(
                StatusCode::from_u16(status).unwrap(),
                body,
            )),
            Step::Fail(kind) => Err(TransportError::new(kind, "scripted failure")),
            Step::Hang => std::future::pending::<Result<RawResponse, TransportError>>().await,
        }
    }
}
