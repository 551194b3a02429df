//! queue_list tool implementation.
//!
//! Pages through queue entries, optionally filtered by status and search term.

use linkpeek_client::LinkQueue;
use linkpeek_core::{EntryStatus, Error, QueueEntry};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// Parameters for the queue_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueueListParams {
    /// Only entries with this status: "pending", "error" or an HTTP code.
    #[serde(default)]
    pub status: Option<String>,

    /// Case-insensitive substring matched against entry content.
    #[serde(default)]
    pub search: Option<String>,

    /// Entries to skip (default: 0).
    #[serde(default)]
    pub offset: Option<usize>,

    /// Page size (default: 20, max: 100).
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Output from the queue_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueListOutput {
    pub entries: Vec<QueueEntry>,

    /// Matching entries across all pages.
    pub total: u64,
}

/// Implementation of the queue_list tool.
pub async fn list_impl(queue: &LinkQueue, params: QueueListParams) -> Result<CallToolResult, McpError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<EntryStatus>)
        .transpose()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(Error::InvalidInput(format!("limit must be between 1 and {MAX_LIMIT}")).into());
    }

    let page = queue
        .list(status, params.search.as_deref(), params.offset.unwrap_or(0), limit)
        .await?;

    json_result(&QueueListOutput { entries: page.entries, total: page.total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use linkpeek_core::{CacheDb, LINK_KIND};
    use std::time::Duration;

    async fn seeded_queue() -> LinkQueue {
        let queue = LinkQueue::new(CacheDb::open_in_memory().await.unwrap(), Duration::from_secs(86_400));
        for n in 0..3 {
            queue.enqueue(&format!("https://example.com/{n}"), "https://blog.test/", LINK_KIND).await.unwrap();
        }
        queue.enqueue("https://broken.test/", "https://blog.test/", LINK_KIND).await.unwrap();
        let entry = queue.get_entry("https://broken.test/").await.unwrap().unwrap();
        queue.resolve(&entry, EntryStatus::Error, None).await.unwrap();
        queue
    }

    #[tokio::test]
    async fn test_list_defaults() {
        let queue = seeded_queue().await;
        let result = list_impl(&queue, QueueListParams::default()).await.unwrap();
        let output: QueueListOutput = parse_output(&result);
        assert_eq!(output.total, 4);
        assert_eq!(output.entries.len(), 4);
    }

    #[tokio::test]
    async fn test_list_by_status_and_page() {
        let queue = seeded_queue().await;
        let params = QueueListParams { status: Some("pending".into()), limit: Some(2), ..Default::default() };
        let output: QueueListOutput = parse_output(&list_impl(&queue, params).await.unwrap());
        assert_eq!(output.total, 3);
        assert_eq!(output.entries.len(), 2);

        let params = QueueListParams { status: Some("error".into()), ..Default::default() };
        let output: QueueListOutput = parse_output(&list_impl(&queue, params).await.unwrap());
        assert_eq!(output.total, 1);
        assert_eq!(output.entries[0].target_url, "https://broken.test/");
    }

    #[tokio::test]
    async fn test_list_search() {
        let queue = seeded_queue().await;
        let params = QueueListParams { search: Some("EXAMPLE.COM/1".into()), ..Default::default() };
        let output: QueueListOutput = parse_output(&list_impl(&queue, params).await.unwrap());
        assert_eq!(output.total, 1);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_input() {
        let queue = seeded_queue().await;
        let params = QueueListParams { status: Some("done".into()), ..Default::default() };
        assert!(list_impl(&queue, params).await.is_err());

        let params = QueueListParams { limit: Some(0), ..Default::default() };
        let err = list_impl(&queue, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
