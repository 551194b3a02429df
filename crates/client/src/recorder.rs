//! Listener that turns correlated responses into cached results.

use async_trait::async_trait;
use linkpeek_core::{EntryStatus, Error};

use crate::correlate::{HttpErrorEvent, HttpResponseEvent, LinkListener};
use crate::extract::{PreviewConfig, extract_preview};
use crate::queue::LinkQueue;

/// Records the HTTP status of each checked link and, for successful `link`
/// entries, the page preview.
#[derive(Debug, Clone)]
pub struct PreviewRecorder {
    queue: LinkQueue,
    config: PreviewConfig,
}

impl PreviewRecorder {
    pub fn new(queue: LinkQueue, config: PreviewConfig) -> Self {
        Self { queue, config }
    }
}

#[async_trait]
impl LinkListener for PreviewRecorder {
    async fn on_response(&self, event: &HttpResponseEvent) -> Result<(), Error> {
        let status = EntryStatus::from_code(event.status);
        let preview = if (200..300).contains(&event.status) && event.entry.is_link() {
            Some(extract_preview(&event.text(), &self.config))
        } else {
            None
        };

        match self.queue.resolve(&event.entry, status, preview).await? {
            Some(stored) => tracing::debug!(
                id = %stored.id,
                status = %stored.status,
                preview_keys = stored.preview.as_ref().map_or(0, |p| p.len()),
                "recorded link response"
            ),
            None => tracing::debug!(id = %event.entry.id, "entry no longer pending, dropping response"),
        }
        Ok(())
    }

    async fn on_error(&self, event: &HttpErrorEvent) -> Result<(), Error> {
        let status = event.status.map_or(EntryStatus::Error, EntryStatus::from_code);
        match self.queue.resolve(&event.entry, status, None).await? {
            Some(stored) => tracing::debug!(id = %stored.id, status = %stored.status, "recorded link failure"),
            None => tracing::debug!(id = %event.entry.id, "entry no longer pending, dropping failure"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use linkpeek_core::{CacheDb, LINK_KIND, QueueEntry};
    use std::time::Duration;

    async fn setup(kind: &str) -> (PreviewRecorder, LinkQueue, QueueEntry) {
        let queue = LinkQueue::new(CacheDb::open_in_memory().await.unwrap(), Duration::from_secs(86_400));
        queue.enqueue("https://example.com/", "https://blog.test/", kind).await.unwrap();
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        (PreviewRecorder::new(queue.clone(), PreviewConfig::default()), queue, entry)
    }

    fn response(entry: QueueEntry, status: u16, body: &'static str) -> HttpResponseEvent {
        HttpResponseEvent {
            url: entry.target_url.clone(),
            entry,
            status,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn test_success_records_status_and_preview() {
        let (recorder, queue, entry) = setup(LINK_KIND).await;
        let html = r#"<title>Hello World</title><meta property="og:site_name" content="Example">"#;
        recorder.on_response(&response(entry, 200, html)).await.unwrap();

        let stored = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Http(200));
        assert_eq!(stored.preview_value("title"), Some("Hello World"));
        assert_eq!(stored.preview_value("site_name"), Some("Example"));
        assert!(stored.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_response_after_remove_is_dropped() {
        let (recorder, queue, entry) = setup(LINK_KIND).await;
        assert!(queue.remove(&entry.id).await.unwrap());

        recorder.on_response(&response(entry, 200, "<title>Late</title>")).await.unwrap();
        assert!(queue.get_entry("https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_status_has_no_preview() {
        let (recorder, queue, entry) = setup(LINK_KIND).await;
        recorder.on_response(&response(entry, 404, "<title>Not Found</title>")).await.unwrap();

        let stored = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Http(404));
        assert!(stored.preview.is_none());
        assert!(stored.is_broken());
    }

    #[tokio::test]
    async fn test_non_link_kind_skips_extraction() {
        let (recorder, queue, entry) = setup("feed").await;
        recorder.on_response(&response(entry, 200, "<title>Feed</title>")).await.unwrap();

        let stored = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Http(200));
        assert!(stored.preview.is_none());
    }

    #[tokio::test]
    async fn test_malformed_html_gives_empty_preview() {
        let (recorder, queue, entry) = setup(LINK_KIND).await;
        recorder.on_response(&response(entry, 200, "<<<not html")).await.unwrap();

        let stored = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Http(200));
        assert_eq!(stored.preview.map(|p| p.len()), Some(0));
    }

    #[tokio::test]
    async fn test_error_without_status_records_error() {
        let (recorder, queue, entry) = setup(LINK_KIND).await;
        let event = HttpErrorEvent {
            url: entry.target_url.clone(),
            entry,
            status: None,
            message: "TRANSPORT_ERROR: connection refused".into(),
        };
        recorder.on_error(&event).await.unwrap();

        let stored = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Error);
        assert!(stored.is_broken());
    }

    #[tokio::test]
    async fn test_error_with_status_records_code() {
        let (recorder, queue, entry) = setup(LINK_KIND).await;
        let event = HttpErrorEvent {
            url: entry.target_url.clone(),
            entry,
            status: Some(502),
            message: "empty body".into(),
        };
        recorder.on_error(&event).await.unwrap();

        let stored = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(stored.status, EntryStatus::Http(502));
    }
}
