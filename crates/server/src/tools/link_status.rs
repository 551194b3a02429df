//! link_status tool implementation.
//!
//! The consumer read: reports what is cached for a link and queues a check
//! when nothing is.

use linkpeek_client::{LinkQueue, LinkState};
use linkpeek_core::QueueEntry;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the link_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkStatusParams {
    /// The outbound link to check.
    pub url: String,

    /// Page the link appears on.
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Output from the link_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkStatusOutput {
    /// "unknown", "pending" or "resolved".
    pub state: String,

    /// Resolved to `error` or a 4xx/5xx status.
    pub broken: bool,

    /// The cached entry, when there is one.
    pub entry: Option<QueueEntry>,
}

impl From<LinkState> for LinkStatusOutput {
    fn from(state: LinkState) -> Self {
        let broken = state.is_broken();
        match state {
            LinkState::Unknown => Self { state: "unknown".into(), broken, entry: None },
            LinkState::Known(entry) => {
                let label = if entry.is_pending() { "pending" } else { "resolved" };
                Self { state: label.into(), broken, entry: Some(entry) }
            }
        }
    }
}

/// Implementation of the link_status tool.
pub async fn status_impl(queue: &LinkQueue, params: LinkStatusParams) -> Result<CallToolResult, McpError> {
    let source = params.source_url.as_deref().unwrap_or_default();
    let state = queue.lookup(&params.url, source).await?;
    json_result(&LinkStatusOutput::from(state))
}
