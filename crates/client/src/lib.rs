//! Link-check pipeline for linkpeek.
//!
//! This crate provides the HTTP fetch, preview extraction, queue manager,
//! scheduler and response correlator that sit on top of the core store.

pub mod correlate;
pub mod extract;
pub mod fetch;
pub mod queue;
pub mod recorder;
pub mod scheduler;

pub use correlate::{Correlation, Correlator, HttpErrorEvent, HttpResponseEvent, LinkListener};
pub use extract::{PreviewConfig, extract_preview};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher, UrlError, normalize};
pub use queue::{LinkQueue, LinkState, QueuePage};
pub use recorder::PreviewRecorder;
pub use scheduler::{Scheduler, SchedulerState, SweepReport};
