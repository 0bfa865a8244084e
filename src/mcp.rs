use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    compose::{Answer, Citation},
    engine::AnswerEngine,
    error,
    index::IndexStats,
    topic::ALIAS_TABLE_VERSION,
};

#[derive(Clone)]
pub struct CdpqaMcpServer {
    engine: Arc<AnswerEngine>,
    tool_router: ToolRouter<Self>,
}

impl CdpqaMcpServer {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl CdpqaMcpServer {
    /// Answer a how-to or comparison question from the indexed docs.
    #[tool(
        name = "cdp_answer",
        description = "Answer a how-to question about Segment, mParticle, Lytics or Zeotap from their documentation, or compare how two or more of them handle a feature. Returns the answer text, a status and the cited pages."
    )]
    pub async fn cdp_answer(
        &self,
        params: Parameters<AnswerParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let question = params.0.question;
        let engine = Arc::clone(&self.engine);
        let answer =
            tokio::task::spawn_blocking(move || engine.answer(&question))
                .await
                .map_err(|e| mcp_error("answer task failed", e))?;

        let structured = serde_json::to_value(AnswerResponse::from(&answer))
            .map_err(|e| mcp_error("failed to serialize answer", e))?;

        let mut result = CallToolResult::success(vec![Content::text(answer.text)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Report whether an index is loaded and what it holds.
    #[tool(
        name = "cdp_status",
        description = "Report whether the documentation index is loaded, with chunk and vocabulary counts per platform."
    )]
    pub async fn cdp_status(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let status = StatusResponse {
            ready: self.engine.ready(),
            alias_table_version: ALIAS_TABLE_VERSION,
            index: self.engine.stats(),
        };
        let summary = match &status.index {
            Some(stats) => format!(
                "Index ready: {} chunks ({} indexed), {} terms",
                stats.chunks, stats.indexed_chunks, stats.vocabulary
            ),
            None => "No index loaded. Run `cdpqa rebuild` first.".to_string(),
        };
        let structured = serde_json::to_value(&status)
            .map_err(|e| mcp_error("failed to serialize status", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for CdpqaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("cdpqa", env!("CARGO_PKG_VERSION"))
                    .with_title("cdpqa MCP"),
            )
            .with_instructions(
                "Use cdp_answer for how-to questions about Segment, mParticle, Lytics or Zeotap. Name the platform in the question; name two to get a comparison.",
            )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerParams {
    /// The question, e.g. "How do I set up a new source in Segment?".
    pub question: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResponse<'a> {
    response: &'a str,
    status: &'static str,
    citations: &'a [Citation],
}

impl<'a> From<&'a Answer> for AnswerResponse<'a> {
    fn from(answer: &'a Answer) -> Self {
        Self {
            response: &answer.text,
            status: answer.status.as_str(),
            citations: &answer.citations,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    ready: bool,
    alias_table_version: u32,
    index: Option<IndexStats>,
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(engine: AnswerEngine) -> error::Result<()> {
    let server = CdpqaMcpServer::new(Arc::new(engine));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
