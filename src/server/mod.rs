//! MCP surface: the four work item tools and the states resource.
//!
//! Every tool runs as `gate` then `classify`: the gate resolves the handlers the
//! tool declared in its [`ToolSpec`], and `classify` turns backend failures into
//! structured `{error, message}` payloads. Guard failures are not classified;
//! they surface as MCP errors.

pub mod classify;
pub mod gate;
pub mod params;

use std::sync::Arc;

use arc_swap::ArcSwap;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult, LoggingLevel,
    PaginatedRequestParam, ProtocolVersion, RawResource, ReadResourceRequestParam,
    ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo,
    SetLevelRequestParam,
};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::AdoError;
use crate::handlers::Handlers;
use classify::{classify, ClientLog, ClientLogger};
use gate::{
    gate, report, GuardError, ToolSpec, CREATE_WORK_ITEM, EDIT_WORK_ITEM,
    GET_VALID_WORK_ITEM_STATES, SEARCH_WORK_ITEMS, TOOL_SPECS,
};
use params::{
    CreateWorkItemParams, EditWorkItemParams, GetValidWorkItemStatesParams,
    SearchWorkItemsParams,
};

pub const STATES_RESOURCE_URI: &str = "resource://ado-work-item-states";
const STATES_RESOURCE_NAME: &str = "Azure DevOps Work Item States";

const INSTRUCTIONS: &str = "Provides tools to search, create, and edit Azure DevOps work items.";

pub const CREATE_REQUIRED_MESSAGE: &str = "work_item_type and title are required.";
pub const INVALID_ID_MESSAGE: &str = "work_item_id must be a positive integer.";

#[derive(Clone)]
pub struct AdoMcpServer {
    handlers: Arc<Handlers>,
    tool_router: ToolRouter<Self>,
    client_level: Arc<ArcSwap<LoggingLevel>>,
}

/// Routed tools that have no [`ToolSpec`], and so would never pass the gate.
fn undeclared_tools(router: &ToolRouter<AdoMcpServer>) -> Vec<String> {
    router
        .list_all()
        .into_iter()
        .filter(|tool| !TOOL_SPECS.iter().any(|spec| spec.name == tool.name))
        .map(|tool| tool.name.to_string())
        .collect()
}

impl AdoMcpServer {
    pub fn new(handlers: Arc<Handlers>) -> Self {
        let tool_router = Self::tool_router();
        debug_assert!(
            undeclared_tools(&tool_router).is_empty(),
            "tools without a ToolSpec: {:?}",
            undeclared_tools(&tool_router)
        );
        Self {
            handlers,
            tool_router,
            client_level: Arc::new(ArcSwap::from_pointee(LoggingLevel::Info)),
        }
    }

    pub fn client_level(&self) -> LoggingLevel {
        **self.client_level.load()
    }

    pub fn set_client_level(&self, level: LoggingLevel) {
        info!(?level, "Client log level changed");
        self.client_level.store(Arc::new(level));
    }

    fn client_logger(&self, context: &RequestContext<RoleServer>) -> ClientLogger {
        ClientLogger::new(context.peer.clone(), self.client_level())
    }

    fn checked(&self, spec: &ToolSpec) -> Result<gate::Gated, GuardError> {
        gate(&self.handlers, spec).map_err(report)
    }

    async fn run_search(
        &self,
        params: SearchWorkItemsParams,
        client: &dyn ClientLog,
    ) -> Result<Value, GuardError> {
        let service = self.checked(&SEARCH_WORK_ITEMS)?.work_items().map_err(report)?;
        let outcome = classify(SEARCH_WORK_ITEMS.name, client, async move {
            service.search(&params.keyword).await
        })
        .await;
        Ok(outcome.into_value())
    }

    async fn run_create(
        &self,
        params: CreateWorkItemParams,
        client: &dyn ClientLog,
    ) -> Result<Value, GuardError> {
        let service = self.checked(&CREATE_WORK_ITEM)?.work_items().map_err(report)?;
        let outcome = classify(CREATE_WORK_ITEM.name, client, async move {
            if params.work_item_type.trim().is_empty() || params.title.trim().is_empty() {
                return Err(AdoError::validation(CREATE_REQUIRED_MESSAGE));
            }
            service
                .create(
                    &params.work_item_type,
                    &params.title,
                    params.description.as_deref(),
                )
                .await
        })
        .await;
        Ok(outcome.into_value())
    }

    async fn run_edit(
        &self,
        params: EditWorkItemParams,
        client: &dyn ClientLog,
    ) -> Result<Value, GuardError> {
        let service = self.checked(&EDIT_WORK_ITEM)?.work_items().map_err(report)?;
        let outcome = classify(EDIT_WORK_ITEM.name, client, async move {
            if params.work_item_id <= 0 {
                return Err(AdoError::validation(INVALID_ID_MESSAGE));
            }
            service.update(params.work_item_id, params.update()).await
        })
        .await;
        Ok(outcome.into_value())
    }

    async fn run_states(
        &self,
        params: GetValidWorkItemStatesParams,
        client: &dyn ClientLog,
    ) -> Result<Value, GuardError> {
        let service = self
            .checked(&GET_VALID_WORK_ITEM_STATES)?
            .states()
            .map_err(report)?;
        let handlers = self.handlers.clone();
        let outcome = classify(GET_VALID_WORK_ITEM_STATES.name, client, async move {
            handlers
                .states
                .states(&service, params.work_item_type())
                .await
        })
        .await;
        Ok(outcome.into_value())
    }

    /// Body of the states resource. Failures are reported inline, never as MCP errors.
    pub async fn states_resource(&self) -> Value {
        let Some(service) = self.handlers.states.handler.service() else {
            error!("Work item states service not initialized");
            return json!({"error": "Work item states service not initialized"});
        };

        let loaded = self
            .handlers
            .states
            .states(&service, None)
            .await
            .and_then(|view| serde_json::to_value(view).map_err(|e| AdoError::Other(e.into())));
        match loaded {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(error = %e, "Failed to load work item states");
                json!({"error": format!("Failed to load work item states: {e}")})
            }
        }
    }
}

fn respond(result: Result<Value, GuardError>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(payload) => Ok(CallToolResult::success(vec![Content::text(payload.to_string())])),
        Err(err) => Err(McpError::internal_error(err.to_string(), None)),
    }
}

fn states_resource_descriptor() -> Resource {
    let mut raw = RawResource::new(STATES_RESOURCE_URI, STATES_RESOURCE_NAME);
    raw.description = Some("Valid states and transition reasons for every work item type".into());
    raw.mime_type = Some("application/json".into());
    raw.no_annotation()
}

#[tool_router]
impl AdoMcpServer {
    #[tool(
        description = "Search work items whose title contains the keyword. Returns id, title, state, type, reason, description and url, most recently changed first."
    )]
    async fn search_work_items(
        &self,
        Parameters(params): Parameters<SearchWorkItemsParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.client_logger(&context);
        respond(self.run_search(params, &client).await)
    }

    #[tool(description = "Create a work item of the given type with a title and optional description.")]
    async fn create_work_item(
        &self,
        Parameters(params): Parameters<CreateWorkItemParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.client_logger(&context);
        respond(self.run_create(params, &client).await)
    }

    #[tool(
        description = "Edit the title, description, state or reason of a work item. A state change must come with a reason valid for that state."
    )]
    async fn edit_work_item(
        &self,
        Parameters(params): Parameters<EditWorkItemParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.client_logger(&context);
        respond(self.run_edit(params, &client).await)
    }

    #[tool(
        description = "List valid states and their reasons for one work item type, or for every type when none is given."
    )]
    async fn get_valid_work_item_states(
        &self,
        Parameters(params): Parameters<GetValidWorkItemStatesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let client = self.client_logger(&context);
        respond(self.run_states(params, &client).await)
    }
}

#[tool_handler]
impl ServerHandler for AdoMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_logging()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn set_level(
        &self,
        request: SetLevelRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<(), McpError> {
        self.set_client_level(request.level);
        Ok(())
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![states_resource_descriptor()],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        if request.uri != STATES_RESOURCE_URI {
            return Err(McpError::resource_not_found(
                format!("Unknown resource: {}", request.uri),
                None,
            ));
        }
        info!(uri = %request.uri, "Reading resource");
        let body = self.states_resource().await;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(body.to_string(), request.uri)],
        })
    }
}
