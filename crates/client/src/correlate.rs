//! Response correlation.
//!
//! Matches a completed fetch back to its queue entry by the entry key of
//! the request URL and hands it to the registered [`LinkListener`]s.
//! Responses with no matching entry are ignored, so the correlator can sit
//! behind any outbound request without side effects.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use linkpeek_core::cache::entry_key;
use linkpeek_core::{Error, QueueEntry};

use crate::fetch::{FetchResponse, normalize};
use crate::queue::LinkQueue;

/// A usable response for a pending entry.
#[derive(Debug, Clone)]
pub struct HttpResponseEvent {
    pub entry: QueueEntry,
    /// URL the request was sent to.
    pub url: String,
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponseEvent {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A failed or unusable response for a pending entry.
#[derive(Debug, Clone)]
pub struct HttpErrorEvent {
    pub entry: QueueEntry,
    pub url: String,
    /// HTTP status when one was received.
    pub status: Option<u16>,
    pub message: String,
}

/// Observer for correlated responses.
///
/// Every hook defaults to a no-op. Hooks run in registration order and an
/// error from one stops dispatch to the rest.
#[async_trait]
pub trait LinkListener: Send + Sync {
    async fn on_response(&self, _event: &HttpResponseEvent) -> Result<(), Error> {
        Ok(())
    }

    async fn on_error(&self, _event: &HttpErrorEvent) -> Result<(), Error> {
        Ok(())
    }

    /// Called once the entry has left `pending`.
    async fn on_resolved(&self, _entry: &QueueEntry) -> Result<(), Error> {
        Ok(())
    }
}

/// What the correlator did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// No entry exists for the URL.
    Ignored,
    /// The entry exists but is no longer pending.
    Stale,
    /// Dispatched as an http-response event.
    Response,
    /// Dispatched as an http-error event.
    Error,
}

/// Dispatches fetch outcomes to listeners.
pub struct Correlator {
    queue: LinkQueue,
    listeners: Vec<Arc<dyn LinkListener>>,
}

impl Correlator {
    pub fn new(queue: LinkQueue) -> Self {
        Self { queue, listeners: Vec::new() }
    }

    /// Add a listener. Listeners are called in the order they were added.
    pub fn register(&mut self, listener: Arc<dyn LinkListener>) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: Arc<dyn LinkListener>) -> Self {
        self.register(listener);
        self
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Correlate the outcome of a request to `url`.
    ///
    /// `outcome` is only borrowed; callers keep the response as-is.
    /// Storage and listener errors are returned.
    pub async fn handle(&self, url: &str, outcome: &Result<FetchResponse, Error>) -> Result<Correlation, Error> {
        let Ok(normalized) = normalize(url) else {
            return Ok(Correlation::Ignored);
        };
        let id = entry_key(normalized.as_str());

        let Some(entry) = self.queue.get_by_id(&id).await? else {
            tracing::debug!(url, "no queue entry for response");
            return Ok(Correlation::Ignored);
        };

        if !entry.is_pending() {
            tracing::debug!(id = %entry.id, status = %entry.status, "entry already resolved, dropping response");
            return Ok(Correlation::Stale);
        }

        let correlation = match outcome {
            Err(e) => {
                let event = HttpErrorEvent { entry, url: url.to_string(), status: None, message: e.to_string() };
                self.dispatch_error(&event).await?;
                Correlation::Error
            }
            Ok(response) if response.bytes.is_empty() => {
                let status = response.status.as_u16();
                let event = HttpErrorEvent {
                    entry,
                    url: url.to_string(),
                    status: Some(status),
                    message: format!("empty body with status {status}"),
                };
                self.dispatch_error(&event).await?;
                Correlation::Error
            }
            Ok(response) => {
                let event = HttpResponseEvent {
                    entry,
                    url: url.to_string(),
                    status: response.status.as_u16(),
                    body: response.bytes.clone(),
                };
                for listener in &self.listeners {
                    listener.on_response(&event).await?;
                }
                Correlation::Response
            }
        };

        if let Some(resolved) = self.queue.get_by_id(&id).await?
            && resolved.is_resolved()
        {
            tracing::debug!(id = %resolved.id, status = %resolved.status, "link resolved");
            for listener in &self.listeners {
                listener.on_resolved(&resolved).await?;
            }
        }

        Ok(correlation)
    }

    async fn dispatch_error(&self, event: &HttpErrorEvent) -> Result<(), Error> {
        tracing::debug!(
            id = %event.entry.id,
            url = %event.url,
            status = ?event.status,
            error = %event.message,
            "link check failed"
        );
        for listener in &self.listeners {
            listener.on_error(event).await?;
        }
        Ok(())
    }
}
