use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use erpbridge_core::{BridgeError, BridgeResult, Domain};
use erpbridge_session::SessionClient;

use crate::registry;
use crate::schema::{ToolId, ToolSignature};
use crate::validate::{validate, Params};
use crate::{accounting, inventory, purchase, sales};

/// Validates tool parameters and dispatches to the domain handlers.
///
/// Cheap to clone; every clone shares one session.
#[derive(Clone)]
pub struct ToolExecutor {
    client: Arc<SessionClient>,
}

impl ToolExecutor {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }

    pub fn describe(&self, domain: Domain) -> &'static [ToolSignature] {
        registry::describe(domain)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &'static ToolSignature> {
        registry::signatures()
    }

    /// Validate only. Never touches the backend.
    pub fn validate(&self, name: &str, params: &JsonValue) -> BridgeResult<(&'static ToolSignature, Params)> {
        let signature = registry::find(name).ok_or_else(|| {
            BridgeError::validation(format!("unknown tool '{name}'"))
        })?;
        let params = validate(signature, params)?;
        Ok((signature, params))
    }

    #[instrument(skip_all, fields(tool = name))]
    pub async fn invoke(&self, name: &str, params: JsonValue) -> BridgeResult<JsonValue> {
        let (signature, params) = self.validate(name, &params).inspect_err(|e| {
            warn!(error = %e, "rejected tool parameters");
        })?;

        let started = Instant::now();
        let result = self.dispatch(signature.id, &params).await;
        match &result {
            Ok(_) => info!(
                domain = %signature.domain,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tool completed"
            ),
            Err(e) => warn!(domain = %signature.domain, kind = e.kind(), error = %e, "tool failed"),
        }
        result
    }

    async fn dispatch(&self, id: ToolId, params: &Params) -> BridgeResult<JsonValue> {
        let client = self.client.as_ref();
        match id {
            ToolId::SearchSalesOrders => sales::search_orders(client, params).await,
            ToolId::CreateSalesOrder => sales::create_order(client, params).await,
            ToolId::AnalyzeSalesPerformance => sales::analyze_performance(client, params).await,
            ToolId::SearchPurchaseOrders => purchase::search_orders(client, params).await,
            ToolId::CreatePurchaseOrder => purchase::create_order(client, params).await,
            ToolId::AnalyzeSupplierPerformance => purchase::analyze_suppliers(client, params).await,
            ToolId::CheckProductAvailability => inventory::check_availability(client, params).await,
            ToolId::CreateInventoryAdjustment => inventory::create_adjustment(client, params).await,
            ToolId::AnalyzeInventoryTurnover => inventory::analyze_turnover(client, params).await,
            ToolId::SearchJournalEntries => accounting::search_entries(client, params).await,
            ToolId::CreateJournalEntry => accounting::create_entry(client, params).await,
            ToolId::AnalyzeFinancialRatios => accounting::analyze_ratios(client, params).await,
        }
    }
}
