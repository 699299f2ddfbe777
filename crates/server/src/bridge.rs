use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use erpbridge_core::{BridgeResult, Domain};
use erpbridge_prompts::{PromptCatalog, PromptDescriptor, RenderedPrompt};
use erpbridge_resources::{CatalogEntry, ResourceResolver, ResourceView};
use erpbridge_session::{ClientStats, RpcTransport, SessionClient, SessionConfig};
use erpbridge_tools::ToolExecutor;

/// One session, shared by the resource, tool and prompt surfaces.
pub struct Bridge {
    client: Arc<SessionClient>,
    resources: ResourceResolver,
    tools: ToolExecutor,
    prompts: PromptCatalog,
}

impl Bridge {
    pub fn new(config: SessionConfig, transport: Arc<dyn RpcTransport>) -> BridgeResult<Self> {
        let client = Arc::new(SessionClient::new(config, transport));
        Ok(Self {
            resources: ResourceResolver::new(client.clone()),
            tools: ToolExecutor::new(client.clone()),
            prompts: PromptCatalog::new()?,
            client,
        })
    }

    #[instrument(skip(self))]
    pub async fn resolve_resource(&self, uri: &str) -> BridgeResult<ResourceView> {
        self.resources.read(uri).await
    }

    pub async fn invoke_tool(&self, name: &str, parameters: JsonValue) -> BridgeResult<JsonValue> {
        self.tools.invoke(name, parameters).await
    }

    pub fn render_prompt(&self, name: &str, parameters: &JsonValue) -> BridgeResult<RenderedPrompt> {
        self.prompts.render(name, parameters)
    }

    /// Tool descriptions, optionally restricted to one domain.
    pub fn list_tools(&self, domain: Option<Domain>) -> Vec<JsonValue> {
        let described: Vec<JsonValue> = match domain {
            Some(d) => self.tools.describe(d).iter().map(|s| s.describe()).collect(),
            None => self.tools.signatures().map(|s| s.describe()).collect(),
        };
        debug!(count = described.len(), "listing tools");
        described
    }

    pub fn list_resources(&self) -> Vec<CatalogEntry> {
        self.resources.catalog()
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts.list()
    }

    pub fn stats(&self) -> ClientStats {
        self.client.stats()
    }

    pub async fn shutdown(&self) {
        self.client.logout().await;
    }
}
