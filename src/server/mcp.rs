use crate::app::dto::*;
use crate::app::engine::RootScoutEngine;
use crate::domain::isolator::ContextPacket;
use rmcp::{
    Json, ServerHandler, ServiceExt, handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters, model::*, tool, tool_handler, tool_router,
    transport::stdio,
};
use tokio::task::spawn_blocking;

#[derive(Clone)]
pub struct RootScoutMcpServer {
    engine: RootScoutEngine,
    tool_router: ToolRouter<Self>,
}

impl RootScoutMcpServer {
    pub fn new(engine: RootScoutEngine) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = self.serve(stdio()).await?;
        service.waiting().await?;
        Ok(())
    }
}

#[tool_router]
impl RootScoutMcpServer {
    #[tool(
        description = "Isolate likely root causes for an alert on a service: ranked error sinks, upstream/downstream services and recent code changes."
    )]
    async fn get_context(
        &self,
        params: Parameters<ContextRequest>,
    ) -> Result<Json<ContextPacket>, String> {
        let engine = self.engine.clone();
        let req = params.0;
        spawn_blocking(move || engine.get_context(&req.service))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(
        description = "Summarize the service dependency graph: nodes, health, versions and callees."
    )]
    async fn graph_status(&self) -> Result<Json<StatusResponse>, String> {
        let engine = self.engine.clone();
        spawn_blocking(move || engine.status())
            .await
            .map(Json)
            .map_err(|e| format!("task join error: {e}"))
    }

    #[tool(description = "Run the configured reasoner over the context for an alerting service.")]
    async fn analyze_incident(
        &self,
        params: Parameters<ContextRequest>,
    ) -> Result<Json<AnalyzeResponse>, String> {
        let engine = self.engine.clone();
        let req = params.0;
        spawn_blocking(move || engine.analyze(&req.service))
            .await
            .map_err(|e| format!("task join error: {e}"))?
            .map(Json)
            .map_err(|e| format!("{e:#}"))
    }
}

#[tool_handler]
impl ServerHandler for RootScoutMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Root-cause isolation over a live service dependency graph built from traces, logs and code changes."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
