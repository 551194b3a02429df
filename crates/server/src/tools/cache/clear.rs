//! cache_clear tool implementation.
//!
//! Deletes cached link entries matching a search term, or all of them.

use linkpeek_client::LinkQueue;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_clear tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearParams {
    /// Only delete entries whose content contains this term.
    /// Omit to invalidate the whole cache.
    #[serde(default)]
    pub search: Option<String>,
}

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(queue: &LinkQueue, params: CacheClearParams) -> Result<CallToolResult, McpError> {
    let search = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let deleted = queue.clear(search).await?;
    json_result(&CacheClearOutput { deleted })
}
