//! Shared fixtures for unit tests: synthetic datasets and stub clients.

use crate::error::CompletionError;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::models::{Dataset, Record, Scalar};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `n` synthetic incident rows with ids `R0000`, `R0001`, ...
pub fn synthetic_dataset(n: usize) -> Dataset {
    let columns = ["id", "longitude", "latitude", "classname", "time", "address"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    let records = (0..n)
        .map(|i| {
            Record::new(vec![
                Scalar::Text(format!("R{:04}", i)),
                Scalar::Float(129.3 + i as f64 * 0.001),
                Scalar::Float(36.0 + i as f64 * 0.001),
                Scalar::Text(if i % 2 == 0 { "crack" } else { "pothole" }.to_string()),
                Scalar::infer(&format!("2023-05-{:02} {:02}:00:00", i % 28 + 1, i % 24)),
                Scalar::Text(format!("포항시 남구 {}번길", i)),
            ])
        })
        .collect();

    Dataset::new(columns, records).expect("synthetic rows match schema")
}

/// Row number of the first synthetic id found in a prompt.
pub fn first_row(prompt: &str) -> Option<usize> {
    let start = prompt.find("\"id\": \"R")? + "\"id\": \"R".len();
    prompt.get(start..start + 4)?.parse().ok()
}

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(CompletionError),
}

/// Returns scripted outcomes in call order.
#[derive(Clone, Default)]
pub struct ScriptedClient {
    steps: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(e)) => Err(e),
            None => Err(CompletionError::malformed("script exhausted")),
        }
    }
}

type Responder = dyn Fn(&CompletionRequest) -> (Duration, Result<String, CompletionError>) + Send + Sync;

/// Decides each outcome from the request itself, after an optional delay.
///
/// Records every request, how many calls had finished when it started,
/// and the peak number of concurrent calls.
#[derive(Clone)]
pub struct StubClient {
    respond: Arc<Responder>,
    requests: Arc<Mutex<Vec<(CompletionRequest, usize)>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl StubClient {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CompletionRequest) -> (Duration, Result<String, CompletionError>)
            + Send
            + Sync
            + 'static,
    {
        Self {
            respond: Arc::new(respond),
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answers every analysis with `analysis of R####` and everything else
    /// with `final summary`.
    pub fn echo() -> Self {
        Self::echo_after(Duration::ZERO)
    }

    /// Like [`StubClient::echo`], but analyses take `delay` to answer.
    pub fn echo_after(delay: Duration) -> Self {
        Self::new(move |req| match first_row(&req.prompt) {
            Some(row) => (delay, Ok(format!("analysis of R{:04}", row))),
            None => (Duration::ZERO, Ok("final summary".to_string())),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// For each request in start order, the number of calls already finished.
    pub fn finished_before_start(&self) -> Vec<usize> {
        self.requests.lock().unwrap().iter().map(|(_, n)| *n).collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Counts a call as in flight until dropped, including when the caller
/// drops the future mid-call.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> (Self, usize) {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        (Self(counter), now)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionClient for StubClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let finished = self.finished.load(Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), finished));
        let (_guard, now) = InFlight::enter(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        let (delay, outcome) = (self.respond)(request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}
