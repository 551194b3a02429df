//! queue_remove tool implementation.
//!
//! Deletes one queue entry by key.

use linkpeek_client::LinkQueue;
use linkpeek_core::{Error, cache::is_entry_key};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the queue_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueRemoveParams {
    /// Entry key, as listed by queue_list.
    pub id: String,
}

/// Output from the queue_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueRemoveOutput {
    /// Whether an entry was deleted.
    pub removed: bool,
}

/// Implementation of the queue_remove tool.
pub async fn remove_impl(queue: &LinkQueue, params: QueueRemoveParams) -> Result<CallToolResult, McpError> {
    if !is_entry_key(&params.id) {
        return Err(Error::InvalidInput(format!("not an entry key: {}", params.id)).into());
    }

    let removed = queue.remove(&params.id).await?;
    json_result(&QueueRemoveOutput { removed })
}
