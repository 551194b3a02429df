//! Queue manager for outbound link checks.
//!
//! A pending job is simply a [`QueueEntry`] whose status is `pending`, so
//! the queue is a thin layer over [`CacheDb`] that owns URL validation,
//! the entry TTL and the single consumer read ([`LinkQueue::lookup`]).

use std::time::Duration;

use linkpeek_core::cache::entry_key;
use linkpeek_core::{CacheDb, EntryFilter, EntryStatus, Error, LINK_KIND, Preview, QueueEntry};
use serde::Serialize;

use crate::fetch::normalize;

/// Result of the consumer read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing cached yet. A check has been queued if the URL was valid.
    Unknown,
    /// An entry exists; it may still be pending.
    Known(QueueEntry),
}

impl LinkState {
    pub fn entry(&self) -> Option<&QueueEntry> {
        match self {
            LinkState::Unknown => None,
            LinkState::Known(entry) => Some(entry),
        }
    }

    /// Whether the link resolved to `error` or a 4xx/5xx status.
    pub fn is_broken(&self) -> bool {
        self.entry().is_some_and(QueueEntry::is_broken)
    }
}

/// One page of the operator-facing queue view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueuePage {
    pub entries: Vec<QueueEntry>,
    /// Matching entries across all pages.
    pub total: u64,
}

/// Link queue backed by the cache store.
#[derive(Debug, Clone)]
pub struct LinkQueue {
    db: CacheDb,
    ttl: Duration,
}

impl LinkQueue {
    /// Create a queue whose resolved entries live for `ttl`.
    pub fn new(db: CacheDb, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Queue `target_url` for a check.
    ///
    /// Invalid URLs are dropped without an error. A URL that already has an
    /// entry, pending or resolved, is left alone. Returns whether a new
    /// pending entry was created.
    pub async fn enqueue(&self, target_url: &str, source_url: &str, kind: &str) -> Result<bool, Error> {
        let url = match normalize(target_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(url = target_url, error = %e, "ignoring invalid link target");
                return Ok(false);
            }
        };

        let entry = QueueEntry::pending(url.as_str(), source_url, kind, self.db.now());
        let created = self.db.insert_pending(&entry).await?;
        if created {
            tracing::debug!(id = %entry.id, url = %entry.target_url, kind, "queued link check");
        }
        Ok(created)
    }

    /// Look up the entry for `target_url`. Invalid URLs have no entry.
    pub async fn get_entry(&self, target_url: &str) -> Result<Option<QueueEntry>, Error> {
        let Ok(url) = normalize(target_url) else {
            return Ok(None);
        };
        self.db.get_entry(&entry_key(url.as_str())).await
    }

    /// Look up an entry by its key.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<QueueEntry>, Error> {
        self.db.get_entry(id).await
    }

    /// Every pending entry, in no particular order.
    pub async fn list_pending(&self) -> Result<Vec<QueueEntry>, Error> {
        self.db.list_entries(&EntryFilter::status(EntryStatus::Pending)).await
    }

    /// Paginated listing for the operator view.
    pub async fn list(
        &self, status: Option<EntryStatus>, search: Option<&str>, offset: usize, limit: usize,
    ) -> Result<QueuePage, Error> {
        let filter = EntryFilter {
            status,
            search: search.map(str::to_string),
            offset,
            limit: Some(limit),
            ..Default::default()
        };
        let entries = self.db.list_entries(&filter).await?;
        let total = self.db.count_entries(&filter).await?;
        Ok(QueuePage { entries, total })
    }

    /// Delete one entry by key.
    pub async fn remove(&self, id: &str) -> Result<bool, Error> {
        let removed = self.db.delete_entry(id).await?;
        if removed {
            tracing::debug!(id, "removed queue entry");
        }
        Ok(removed)
    }

    /// Delete every entry matching `search`, or all entries when `None`.
    pub async fn clear(&self, search: Option<&str>) -> Result<u64, Error> {
        let deleted = self.db.delete_matching(search).await?;
        tracing::info!(deleted, search, "cleared link cache");
        Ok(deleted)
    }

    /// Drop expired entries eagerly.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        self.db.purge_expired_entries().await
    }

    /// Decide whether fresh data exists for a link, queueing a check if not.
    pub async fn lookup(&self, target_url: &str, source_url: &str) -> Result<LinkState, Error> {
        if let Some(entry) = self.get_entry(target_url).await? {
            return Ok(LinkState::Known(entry));
        }
        self.enqueue(target_url, source_url, LINK_KIND).await?;
        Ok(LinkState::Unknown)
    }

    /// Record the outcome of a check, keeping the entry for the queue TTL.
    ///
    /// Returns `None` without writing when the entry is no longer pending,
    /// for example after it was removed or cleared mid-fetch.
    pub async fn resolve(
        &self, entry: &QueueEntry, status: EntryStatus, preview: Option<Preview>,
    ) -> Result<Option<QueueEntry>, Error> {
        self.db.resolve_entry(&entry.id, status, preview.as_ref(), Some(self.ttl)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkpeek_core::cache::ManualClock;
    use std::sync::Arc;

    const SOURCE: &str = "https://blog.test/post";
    const DAY: Duration = Duration::from_secs(86_400);

    async fn queue() -> LinkQueue {
        LinkQueue::new(CacheDb::open_in_memory().await.unwrap(), DAY)
    }

    async fn queue_with_clock() -> (LinkQueue, ManualClock) {
        let clock = ManualClock::default();
        let db = CacheDb::open_in_memory().await.unwrap().with_clock(Arc::new(clock.clone()));
        (LinkQueue::new(db, DAY), clock)
    }

    #[tokio::test]
    async fn test_enqueue_twice_single_entry() {
        let queue = queue().await;
        assert!(queue.enqueue("https://example.com/page", SOURCE, LINK_KIND).await.unwrap());
        assert!(!queue.enqueue("https://example.com/page", SOURCE, LINK_KIND).await.unwrap());
        assert!(!queue.enqueue("https://EXAMPLE.com/page#frag", SOURCE, LINK_KIND).await.unwrap());

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].target_url, "https://example.com/page");
        assert_eq!(pending[0].source_url, SOURCE);
        assert!(pending[0].is_pending());
    }

    #[tokio::test]
    async fn test_enqueue_invalid_url_is_silent() {
        let queue = queue().await;
        assert!(!queue.enqueue("not-a-url", SOURCE, LINK_KIND).await.unwrap());
        assert!(!queue.enqueue("", SOURCE, LINK_KIND).await.unwrap());
        assert!(queue.get_entry("not-a-url").await.unwrap().is_none());
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_keeps_resolved_entry() {
        let queue = queue().await;
        queue.enqueue("https://example.com/", SOURCE, LINK_KIND).await.unwrap();
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        queue.resolve(&entry, EntryStatus::Http(200), None).await.unwrap();

        assert!(!queue.enqueue("https://example.com/", "https://other.test/", LINK_KIND).await.unwrap());
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Http(200));
        assert_eq!(entry.source_url, SOURCE);
    }

    #[tokio::test]
    async fn test_enqueue_custom_kind() {
        let queue = queue().await;
        queue.enqueue("https://example.com/feed.xml", SOURCE, "feed").await.unwrap();
        let entry = queue.get_entry("https://example.com/feed.xml").await.unwrap().unwrap();
        assert_eq!(entry.kind, "feed");
        assert!(!entry.is_link());
    }

    #[tokio::test]
    async fn test_lookup_enqueues_then_reports_known() {
        let queue = queue().await;
        assert_eq!(queue.lookup("https://example.com/a", SOURCE).await.unwrap(), LinkState::Unknown);

        let state = queue.lookup("https://example.com/a", SOURCE).await.unwrap();
        let entry = state.entry().unwrap();
        assert!(entry.is_pending());
        assert!(!state.is_broken());
    }

    #[tokio::test]
    async fn test_lookup_invalid_stays_unknown() {
        let queue = queue().await;
        assert_eq!(queue.lookup("javascript:alert(1)", SOURCE).await.unwrap(), LinkState::Unknown);
        assert_eq!(queue.lookup("javascript:alert(1)", SOURCE).await.unwrap(), LinkState::Unknown);
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_round_trip() {
        let queue = queue().await;
        queue.enqueue("https://example.com/", SOURCE, LINK_KIND).await.unwrap();
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();

        let mut preview = Preview::new();
        preview.insert("title".into(), "Example Domain".into());
        let written = queue.resolve(&entry, EntryStatus::Http(200), Some(preview.clone())).await.unwrap().unwrap();
        assert!(written.expires_at.is_some());

        let read = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(read.status, EntryStatus::Http(200));
        assert_eq!(read.preview, Some(preview));
        assert_eq!(read, written);
    }

    #[tokio::test]
    async fn test_resolve_after_remove_writes_nothing() {
        let queue = queue().await;
        queue.enqueue("https://example.com/", SOURCE, LINK_KIND).await.unwrap();
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert!(queue.remove(&entry.id).await.unwrap());

        let written = queue.resolve(&entry, EntryStatus::Http(200), None).await.unwrap();
        assert!(written.is_none());
        assert!(queue.get_entry("https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_twice_keeps_first_outcome() {
        let queue = queue().await;
        queue.enqueue("https://example.com/", SOURCE, LINK_KIND).await.unwrap();
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();

        assert!(queue.resolve(&entry, EntryStatus::Http(404), None).await.unwrap().is_some());
        assert!(queue.resolve(&entry, EntryStatus::Http(200), None).await.unwrap().is_none());
        let read = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert_eq!(read.status, EntryStatus::Http(404));
    }

    #[tokio::test]
    async fn test_resolved_entry_expires_after_ttl() {
        let (queue, clock) = queue_with_clock().await;
        queue.enqueue("https://example.com/", SOURCE, LINK_KIND).await.unwrap();
        let entry = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        queue.resolve(&entry, EntryStatus::Http(404), None).await.unwrap();

        clock.advance(DAY - Duration::from_secs(1));
        assert!(queue.get_entry("https://example.com/").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(queue.get_entry("https://example.com/").await.unwrap().is_none());

        assert_eq!(queue.lookup("https://example.com/", SOURCE).await.unwrap(), LinkState::Unknown);
        let requeued = queue.get_entry("https://example.com/").await.unwrap().unwrap();
        assert!(requeued.is_pending());
    }

    #[tokio::test]
    async fn test_pending_entry_never_expires() {
        let (queue, clock) = queue_with_clock().await;
        queue.enqueue("https://example.com/", SOURCE, LINK_KIND).await.unwrap();
        clock.advance(DAY * 400);
        assert_eq!(queue.list_pending().await.unwrap().len(), 1);
        assert_eq!(queue.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let queue = queue().await;
        for n in 0..5 {
            queue.enqueue(&format!("https://example.com/{n}"), SOURCE, LINK_KIND).await.unwrap();
        }
        queue.enqueue("https://other.test/", SOURCE, LINK_KIND).await.unwrap();
        let broken = queue.get_entry("https://other.test/").await.unwrap().unwrap();
        queue.resolve(&broken, EntryStatus::Http(500), None).await.unwrap();

        let page = queue.list(None, None, 0, 4).await.unwrap();
        assert_eq!(page.entries.len(), 4);
        assert_eq!(page.total, 6);

        let page = queue.list(Some(EntryStatus::Pending), Some("example.com"), 3, 10).await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.total, 5);

        let page = queue.list(None, Some("500"), 0, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].target_url, "https://other.test/");
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let queue = queue().await;
        queue.enqueue("https://example.com/a", SOURCE, LINK_KIND).await.unwrap();
        queue.enqueue("https://example.com/b", SOURCE, LINK_KIND).await.unwrap();
        queue.enqueue("https://other.test/c", SOURCE, LINK_KIND).await.unwrap();

        let a = queue.get_entry("https://example.com/a").await.unwrap().unwrap();
        assert!(queue.remove(&a.id).await.unwrap());
        assert!(!queue.remove(&a.id).await.unwrap());

        assert_eq!(queue.clear(Some("example.com")).await.unwrap(), 1);
        assert!(queue.get_entry("https://other.test/c").await.unwrap().is_some());

        assert_eq!(queue.clear(None).await.unwrap(), 1);
        assert_eq!(queue.list(None, None, 0, 10).await.unwrap().total, 0);
    }
}
