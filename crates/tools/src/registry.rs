//! The fixed tool set, one signature table per domain.

use erpbridge_core::Domain;

use crate::schema::{ParamSpec, ParamType, ToolId, ToolKind, ToolSignature};

const SALES_STATES: &[&str] = &["draft", "sent", "sale", "done", "cancel"];
const PURCHASE_STATES: &[&str] = &["draft", "sent", "to approve", "purchase", "done", "cancel"];
const MOVE_STATES: &[&str] = &["draft", "posted", "cancel"];
const SALES_GROUPINGS: &[&str] = &["product", "customer", "salesperson", "day", "week", "month"];
const RATIO_FAMILIES: &[&str] = &["liquidity", "profitability", "debt", "efficiency"];

const LIMIT: ParamSpec =
    ParamSpec::optional("limit", ParamType::Integer, "Maximum number of records (default 20, at most 200)").positive();
const OFFSET: ParamSpec = ParamSpec::optional("offset", ParamType::Integer, "Records to skip").non_negative();
const ORDER: ParamSpec = ParamSpec::optional("order", ParamType::String, "Sort expression, e.g. 'date_order desc'");
const FILTERS: ParamSpec =
    ParamSpec::optional("filters", ParamType::Filters, "Additional {field, operator, value} clauses");
const DATE_FROM: ParamSpec = ParamSpec::optional("date_from", ParamType::Date, "Start date (YYYY-MM-DD)");
const DATE_TO: ParamSpec = ParamSpec::optional("date_to", ParamType::Date, "End date (YYYY-MM-DD)");
const WINDOW_FROM: ParamSpec = ParamSpec::required("date_from", ParamType::Date, "Start date (YYYY-MM-DD)");
const WINDOW_TO: ParamSpec = ParamSpec::required("date_to", ParamType::Date, "End date (YYYY-MM-DD)");
const TOP_N: ParamSpec =
    ParamSpec::optional("top_n", ParamType::Integer, "Number of ranked groups to return (default 10)").positive();

const SALES_LINE: &[ParamSpec] = &[
    ParamSpec::required("product_id", ParamType::Integer, "Product id").positive(),
    ParamSpec::required("product_uom_qty", ParamType::Number, "Quantity").positive(),
    ParamSpec::optional("price_unit", ParamType::Number, "Unit price; the backend prices the line when absent")
        .non_negative(),
];

const PURCHASE_LINE: &[ParamSpec] = &[
    ParamSpec::required("product_id", ParamType::Integer, "Product id").positive(),
    ParamSpec::required("product_qty", ParamType::Number, "Quantity").positive(),
    ParamSpec::optional("price_unit", ParamType::Number, "Unit price").non_negative(),
];

const ADJUSTMENT_LINE: &[ParamSpec] = &[
    ParamSpec::required("product_id", ParamType::Integer, "Product id").positive(),
    ParamSpec::required("location_id", ParamType::Integer, "Stock location id").positive(),
    ParamSpec::required("product_qty", ParamType::Number, "Counted quantity").non_negative(),
];

const JOURNAL_LINE: &[ParamSpec] = &[
    ParamSpec::required("account_id", ParamType::Integer, "Account id").positive(),
    ParamSpec::optional("partner_id", ParamType::Integer, "Partner id").positive(),
    ParamSpec::optional("name", ParamType::String, "Line label"),
    ParamSpec::optional("debit", ParamType::Number, "Debit amount").non_negative(),
    ParamSpec::optional("credit", ParamType::Number, "Credit amount").non_negative(),
];

pub static SALES: [ToolSignature; 3] = [
    ToolSignature {
        id: ToolId::SearchSalesOrders,
        name: "search_sales_orders",
        domain: Domain::Sales,
        kind: ToolKind::Search,
        description: "Search sales orders by customer, date range, state and custom filters",
        params: &[
            ParamSpec::optional("partner_id", ParamType::Integer, "Customer id").positive(),
            DATE_FROM,
            DATE_TO,
            ParamSpec::optional("state", ParamType::Enum(SALES_STATES), "Order state"),
            FILTERS,
            LIMIT,
            OFFSET,
            ORDER,
        ],
    },
    ToolSignature {
        id: ToolId::CreateSalesOrder,
        name: "create_sales_order",
        domain: Domain::Sales,
        kind: ToolKind::Create,
        description: "Create a quotation with all its lines in a single call",
        params: &[
            ParamSpec::required("partner_id", ParamType::Integer, "Customer id").positive(),
            ParamSpec::required("order_lines", ParamType::Objects(SALES_LINE), "Order lines"),
            ParamSpec::optional("date_order", ParamType::Date, "Order date (YYYY-MM-DD)"),
        ],
    },
    ToolSignature {
        id: ToolId::AnalyzeSalesPerformance,
        name: "analyze_sales_performance",
        domain: Domain::Sales,
        kind: ToolKind::Analyze,
        description: "Revenue ranking, trend and comparison with the previous period",
        params: &[
            WINDOW_FROM,
            WINDOW_TO,
            ParamSpec::optional("group_by", ParamType::Enum(SALES_GROUPINGS), "Breakdown dimension (default product)"),
            TOP_N,
        ],
    },
];

pub static PURCHASE: [ToolSignature; 3] = [
    ToolSignature {
        id: ToolId::SearchPurchaseOrders,
        name: "search_purchase_orders",
        domain: Domain::Purchase,
        kind: ToolKind::Search,
        description: "Search purchase orders by supplier, date range, state and custom filters",
        params: &[
            ParamSpec::optional("partner_id", ParamType::Integer, "Supplier id").positive(),
            DATE_FROM,
            DATE_TO,
            ParamSpec::optional("state", ParamType::Enum(PURCHASE_STATES), "Order state"),
            FILTERS,
            LIMIT,
            OFFSET,
            ORDER,
        ],
    },
    ToolSignature {
        id: ToolId::CreatePurchaseOrder,
        name: "create_purchase_order",
        domain: Domain::Purchase,
        kind: ToolKind::Create,
        description: "Create a request for quotation with all its lines in a single call",
        params: &[
            ParamSpec::required("partner_id", ParamType::Integer, "Supplier id").positive(),
            ParamSpec::required("order_lines", ParamType::Objects(PURCHASE_LINE), "Order lines"),
            ParamSpec::optional("date_order", ParamType::Date, "Order date (YYYY-MM-DD)"),
        ],
    },
    ToolSignature {
        id: ToolId::AnalyzeSupplierPerformance,
        name: "analyze_supplier_performance",
        domain: Domain::Purchase,
        kind: ToolKind::Analyze,
        description: "Spend and delivery punctuality per supplier",
        params: &[
            WINDOW_FROM,
            WINDOW_TO,
            ParamSpec::optional("supplier_ids", ParamType::IntegerList, "Restrict to these suppliers"),
            TOP_N,
        ],
    },
];

pub static INVENTORY: [ToolSignature; 3] = [
    ToolSignature {
        id: ToolId::CheckProductAvailability,
        name: "check_product_availability",
        domain: Domain::Inventory,
        kind: ToolKind::Inspect,
        description: "On-hand, forecast, incoming and outgoing quantities per product",
        params: &[
            ParamSpec::required("product_ids", ParamType::IntegerList, "Product ids"),
            ParamSpec::optional("location_id", ParamType::Integer, "Scope quantities to this location").positive(),
        ],
    },
    ToolSignature {
        id: ToolId::CreateInventoryAdjustment,
        name: "create_inventory_adjustment",
        domain: Domain::Inventory,
        kind: ToolKind::Create,
        description: "Record counted quantities and apply them as one adjustment",
        params: &[
            ParamSpec::required("name", ParamType::String, "Adjustment reference"),
            ParamSpec::required("adjustment_lines", ParamType::Objects(ADJUSTMENT_LINE), "Counted lines"),
            ParamSpec::optional("date", ParamType::Date, "Accounting date (YYYY-MM-DD)"),
        ],
    },
    ToolSignature {
        id: ToolId::AnalyzeInventoryTurnover,
        name: "analyze_inventory_turnover",
        domain: Domain::Inventory,
        kind: ToolKind::Analyze,
        description: "Inventory turnover and days of inventory, overall and per product",
        params: &[
            WINDOW_FROM,
            WINDOW_TO,
            ParamSpec::optional("product_ids", ParamType::IntegerList, "Restrict to these products"),
            ParamSpec::optional("category_id", ParamType::Integer, "Restrict to one product category").positive(),
        ],
    },
];

pub static ACCOUNTING: [ToolSignature; 3] = [
    ToolSignature {
        id: ToolId::SearchJournalEntries,
        name: "search_journal_entries",
        domain: Domain::Accounting,
        kind: ToolKind::Search,
        description: "Search journal entries with their lines",
        params: &[
            DATE_FROM,
            DATE_TO,
            ParamSpec::optional("journal_id", ParamType::Integer, "Journal id").positive(),
            ParamSpec::optional("state", ParamType::Enum(MOVE_STATES), "Entry state"),
            FILTERS,
            LIMIT,
            OFFSET,
            ORDER,
        ],
    },
    ToolSignature {
        id: ToolId::CreateJournalEntry,
        name: "create_journal_entry",
        domain: Domain::Accounting,
        kind: ToolKind::Create,
        description: "Create a balanced draft journal entry with all its lines",
        params: &[
            ParamSpec::optional("ref", ParamType::String, "Entry reference"),
            ParamSpec::required("journal_id", ParamType::Integer, "Journal id").positive(),
            ParamSpec::optional("date", ParamType::Date, "Entry date (YYYY-MM-DD)"),
            ParamSpec::required("lines", ParamType::Objects(JOURNAL_LINE), "Entry lines; debits must equal credits"),
        ],
    },
    ToolSignature {
        id: ToolId::AnalyzeFinancialRatios,
        name: "analyze_financial_ratios",
        domain: Domain::Accounting,
        kind: ToolKind::Analyze,
        description: "Liquidity, profitability, debt and efficiency ratios from posted entries",
        params: &[
            WINDOW_FROM,
            WINDOW_TO,
            ParamSpec::optional("ratios", ParamType::EnumList(RATIO_FAMILIES), "Ratio families (default all)"),
        ],
    },
];

/// Signatures of one domain.
pub fn describe(domain: Domain) -> &'static [ToolSignature] {
    match domain {
        Domain::Sales => &SALES,
        Domain::Purchase => &PURCHASE,
        Domain::Inventory => &INVENTORY,
        Domain::Accounting => &ACCOUNTING,
    }
}

pub fn signatures() -> impl Iterator<Item = &'static ToolSignature> {
    Domain::ALL.into_iter().flat_map(|d| describe(d).iter())
}

pub fn find(name: &str) -> Option<&'static ToolSignature> {
    signatures().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn twelve_uniquely_named_tools() {
        let names: HashSet<&str> = signatures().map(|s| s.name).collect();
        assert_eq!(names.len(), 12);
        let ids: HashSet<ToolId> = signatures().map(|s| s.id).collect();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn each_domain_has_search_or_inspect_create_and_analyze() {
        for domain in Domain::ALL {
            let kinds: Vec<ToolKind> = describe(domain).iter().map(|s| s.kind).collect();
            assert!(kinds.contains(&ToolKind::Create), "{domain}");
            assert!(kinds.contains(&ToolKind::Analyze), "{domain}");
            assert!(describe(domain).iter().all(|s| s.domain == domain));
        }
    }

    #[test]
    fn analysis_tools_require_a_window() {
        for sig in signatures().filter(|s| s.kind == ToolKind::Analyze) {
            assert!(sig.param("date_from").is_some_and(|p| p.required), "{}", sig.name);
            assert!(sig.param("date_to").is_some_and(|p| p.required), "{}", sig.name);
        }
    }

    #[test]
    fn find_by_name() {
        assert_eq!(find("create_journal_entry").map(|s| s.id), Some(ToolId::CreateJournalEntry));
        assert!(find("execute_method").is_none());
    }
}
