//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    CacheClearParams, LinkStatusParams, QueueListParams, QueueRemoveParams, clear_impl, list_impl, remove_impl,
    status_impl,
};

use linkpeek_client::LinkQueue;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for linkpeek.
#[derive(Clone)]
pub struct LinkPeekServer {
    tool_router: ToolRouter<Self>,
    queue: LinkQueue,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LinkPeekServer {
    /// Create a new server handler over the given queue.
    pub fn new(queue: LinkQueue) -> Self {
        Self { tool_router: Self::tool_router(), queue }
    }

    /// Look up the cached status and preview of a link.
    ///
    /// Returns "unknown" and queues a background check when nothing is cached.
    #[tool(
        description = "Get the cached HTTP status and page preview for a link. Unknown links are queued for a background check."
    )]
    async fn link_status(&self, params: Parameters<LinkStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.queue, params.0).await
    }

    /// List queue entries with optional status and search filters.
    #[tool(description = "List link queue entries. Filter by status (pending, error, or an HTTP code) and search term.")]
    async fn queue_list(&self, params: Parameters<QueueListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.queue, params.0).await
    }

    /// Delete a single queue entry.
    #[tool(description = "Delete one link queue entry by id.")]
    async fn queue_remove(&self, params: Parameters<QueueRemoveParams>) -> Result<CallToolResult, McpError> {
        remove_impl(&self.queue, params.0).await
    }

    /// Clear cached entries.
    #[tool(description = "Delete cached link entries matching a search term, or every entry when no term is given.")]
    async fn cache_clear(&self, params: Parameters<CacheClearParams>) -> Result<CallToolResult, McpError> {
        clear_impl(&self.queue, params.0).await
    }
}

impl ServerHandler for LinkPeekServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "linkpeek".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
