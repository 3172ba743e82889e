//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::crawler::{CrawlEvent, CrawlReporter};
use crate::error::AppError;
use crate::traits::{Cleaner, Fetcher, Mail, Notifier};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// A scripted response. Rebuilt into a fresh `Result` on every call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Page(String),
    Status(u16),
    Unreachable,
}

impl MockResponse {
    fn to_result(&self) -> Result<String, AppError> {
        match self {
            MockResponse::Page(html) => Ok(html.clone()),
            MockResponse::Status(status) => Err(AppError::HttpStatus {
                status: *status,
                reason: reason_phrase(*status).to_string(),
            }),
            MockResponse::Unreachable => {
                Err(AppError::NetworkError("Connection failed: refused".into()))
            }
        }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Mock fetcher with per-URL response queues.
///
/// Each call pops the front of the URL's queue; the last response sticks
/// and is repeated for later calls. Unknown URLs are unreachable.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_response(url, MockResponse::Page(html.to_string()))
    }

    pub fn with_response(self, url: &str, response: MockResponse) -> Self {
        self.with_responses(url, vec![response])
    }

    pub fn with_responses(self, url: &str, responses: Vec<MockResponse>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), responses);
        self
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0).to_result(),
            Some(queue) if !queue.is_empty() => queue[0].to_result(),
            _ => MockResponse::Unreachable.to_result(),
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that returns its input, or a configured error once.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner that returns an error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Mock notifier that records every mail it is asked to deliver.
#[derive(Clone, Default)]
pub struct MockNotifier {
    pub sent: Arc<Mutex<Vec<Mail>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Notifier for MockNotifier {
    async fn notify(&self, mail: &Mail) -> Result<(), AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock crawl reporter that records event labels and retry delays.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match &event {
            CrawlEvent::Crawling { .. } => "Crawling",
            CrawlEvent::NoOffers { .. } => "NoOffers",
            CrawlEvent::NewOffer { .. } => "NewOffer",
            CrawlEvent::DetailsFailed { .. } => "DetailsFailed",
            CrawlEvent::Retrying { delay, .. } => {
                self.delays.lock().unwrap().push(*delay);
                "Retrying"
            }
            CrawlEvent::GaveUp { .. } => "GaveUp",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
