//! Shared test utilities for the `scanner` module.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::scanner::backend::{AnalyzeRequest, CommitReceipt, CommitRequest, DetectionBackend};
use crate::scanner::error::ScanError;

/// Mock detection backend with pre-programmed queues of responses.
///
/// Analyze and commit responses are returned in FIFO order from separate
/// queues. When a queue is exhausted, subsequent calls return a transport
/// error, which keeps accidental extra network calls loud in tests.
///
/// Every call records the request so tests can assert on exactly which
/// payloads were dispatched (and, just as importantly, how many). Use
/// [`request_log`](Self::request_log) to obtain a shared handle before the
/// backend is moved into a controller.
pub(crate) struct ScriptedBackend {
    analyze_responses: Arc<Mutex<VecDeque<Result<Value, ScanError>>>>,
    commit_responses: Arc<Mutex<VecDeque<Result<CommitReceipt, ScanError>>>>,
    log: RequestLog,
}

/// Shared handle to a scripted backend's recorded requests.
#[derive(Clone, Default)]
pub(crate) struct RequestLog {
    analyzes: Arc<Mutex<Vec<AnalyzeRequest>>>,
    commits: Arc<Mutex<Vec<CommitRequest>>>,
}

impl RequestLog {
    /// Number of analyze calls the backend received.
    pub(crate) fn analyze_count(&self) -> usize {
        self.analyzes.lock().unwrap().len()
    }

    /// Number of commit calls the backend received.
    pub(crate) fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }

    /// All recorded analyze requests, in dispatch order.
    pub(crate) fn analyzes(&self) -> Vec<AnalyzeRequest> {
        self.analyzes.lock().unwrap().clone()
    }

    /// All recorded commit requests, in dispatch order.
    pub(crate) fn commits(&self) -> Vec<CommitRequest> {
        self.commits.lock().unwrap().clone()
    }
}

impl ScriptedBackend {
    /// Creates a backend that answers analyze calls with `responses` in order.
    pub(crate) fn new(responses: Vec<Result<Value, ScanError>>) -> Self {
        Self {
            analyze_responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            commit_responses: Arc::new(Mutex::new(VecDeque::new())),
            log: RequestLog::default(),
        }
    }

    /// Adds commit responses, returned in order.
    pub(crate) fn with_commit_responses(
        self,
        responses: Vec<Result<CommitReceipt, ScanError>>,
    ) -> Self {
        *self.commit_responses.lock().unwrap() = VecDeque::from(responses);
        self
    }

    /// Returns a handle for inspecting recorded requests after the backend
    /// has been moved into a controller.
    pub(crate) fn request_log(&self) -> RequestLog {
        self.log.clone()
    }
}

impl DetectionBackend for ScriptedBackend {
    fn analyze<'a>(
        &'a self,
        request: &'a AnalyzeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ScanError>> + Send + 'a>> {
        let responses = self.analyze_responses.clone();
        let log = self.log.analyzes.clone();
        let request = request.clone();
        Box::pin(async move {
            log.lock().unwrap().push(request);
            responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ScanError::Transport(
                        "no more scripted analyze responses".to_string(),
                    ))
                })
        })
    }

    fn commit<'a>(
        &'a self,
        request: &'a CommitRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommitReceipt, ScanError>> + Send + 'a>> {
        let responses = self.commit_responses.clone();
        let log = self.log.commits.clone();
        let request = request.clone();
        Box::pin(async move {
            log.lock().unwrap().push(request);
            responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ScanError::Transport(
                        "no more scripted commit responses".to_string(),
                    ))
                })
        })
    }
}
