//! Static collection tables, one per business domain.
//!
//! Resolution is a table lookup: a new addressable collection is a new
//! [`CollectionSpec`] entry, never a new code path.

use serde_json::Value as JsonValue;

use erpbridge_core::{Clause, Direction, Domain, Filter, OrderBy, Operator};

/// Value of a fixed filter clause.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BaseValue {
    Int(i64),
    Str(&'static str),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BaseClause {
    pub field: &'static str,
    pub op: Operator,
    pub value: BaseValue,
}

const fn clause(field: &'static str, op: Operator, value: BaseValue) -> BaseClause {
    BaseClause { field, op, value }
}

/// One addressable collection.
#[derive(Debug, PartialEq, Eq)]
pub struct CollectionSpec {
    /// URI segment, e.g. `orders`.
    pub segment: &'static str,
    /// Backend model name, e.g. `sale.order`.
    pub model: &'static str,
    pub description: &'static str,
    /// Default projection; always starts with `id`.
    pub fields: &'static [&'static str],
    pub base_filter: &'static [BaseClause],
    pub order: &'static [(&'static str, Direction)],
}

impl CollectionSpec {
    pub fn filter(&self) -> Filter {
        let mut filter = Filter::match_all();
        for c in self.base_filter {
            let value = match c.value {
                BaseValue::Int(n) => JsonValue::from(n),
                BaseValue::Str(s) => JsonValue::from(s),
            };
            filter.push(Clause::new(c.field, c.op, value));
        }
        filter
    }

    pub fn order_by(&self) -> Vec<OrderBy> {
        self.order
            .iter()
            .map(|(field, direction)| OrderBy {
                field: field.to_string(),
                direction: *direction,
            })
            .collect()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.to_string()).collect()
    }
}

pub struct DomainTable {
    pub domain: Domain,
    pub collections: &'static [CollectionSpec],
}

use Direction::{Asc, Desc};

static SALES: &[CollectionSpec] = &[
    CollectionSpec {
        segment: "orders",
        model: "sale.order",
        description: "Sales orders, newest first",
        fields: &[
            "id", "name", "partner_id", "date_order", "state", "amount_untaxed", "amount_tax",
            "amount_total", "user_id", "invoice_status",
        ],
        base_filter: &[],
        order: &[("date_order", Desc), ("id", Desc)],
    },
    CollectionSpec {
        segment: "order-lines",
        model: "sale.order.line",
        description: "Sales order lines",
        fields: &[
            "id", "order_id", "product_id", "name", "product_uom_qty", "price_unit", "price_subtotal",
            "qty_delivered", "qty_invoiced",
        ],
        base_filter: &[],
        order: &[("order_id", Desc), ("id", Asc)],
    },
    CollectionSpec {
        segment: "customers",
        model: "res.partner",
        description: "Partners that buy from the company",
        fields: &["id", "name", "email", "phone", "city", "country_id", "customer_rank"],
        base_filter: &[clause("customer_rank", Operator::Gt, BaseValue::Int(0))],
        order: &[("name", Asc), ("id", Asc)],
    },
];

static PURCHASE: &[CollectionSpec] = &[
    CollectionSpec {
        segment: "orders",
        model: "purchase.order",
        description: "Purchase orders, newest first",
        fields: &[
            "id", "name", "partner_id", "date_order", "date_approve", "date_planned", "state",
            "amount_untaxed", "amount_total", "user_id",
        ],
        base_filter: &[],
        order: &[("date_order", Desc), ("id", Desc)],
    },
    CollectionSpec {
        segment: "order-lines",
        model: "purchase.order.line",
        description: "Purchase order lines",
        fields: &[
            "id", "order_id", "product_id", "name", "product_qty", "price_unit", "price_subtotal",
            "qty_received", "date_planned",
        ],
        base_filter: &[],
        order: &[("order_id", Desc), ("id", Asc)],
    },
    CollectionSpec {
        segment: "suppliers",
        model: "res.partner",
        description: "Partners the company buys from",
        fields: &["id", "name", "email", "phone", "city", "country_id", "supplier_rank"],
        base_filter: &[clause("supplier_rank", Operator::Gt, BaseValue::Int(0))],
        order: &[("name", Asc), ("id", Asc)],
    },
];

static INVENTORY: &[CollectionSpec] = &[
    CollectionSpec {
        segment: "products",
        model: "product.product",
        description: "Product variants with stock figures",
        fields: &[
            "id", "name", "default_code", "categ_id", "uom_id", "list_price", "standard_price",
            "qty_available", "virtual_available",
        ],
        base_filter: &[],
        order: &[("name", Asc), ("id", Asc)],
    },
    CollectionSpec {
        segment: "locations",
        model: "stock.location",
        description: "Stock locations",
        fields: &["id", "name", "complete_name", "usage", "location_id"],
        base_filter: &[],
        order: &[("complete_name", Asc), ("id", Asc)],
    },
    CollectionSpec {
        segment: "moves",
        model: "stock.move",
        description: "Stock moves, most recent first",
        fields: &[
            "id", "reference", "product_id", "product_uom_qty", "location_id", "location_dest_id",
            "state", "date",
        ],
        base_filter: &[],
        order: &[("date", Desc), ("id", Desc)],
    },
    CollectionSpec {
        segment: "quants",
        model: "stock.quant",
        description: "On-hand quantities in internal locations",
        fields: &["id", "product_id", "location_id", "quantity", "reserved_quantity", "lot_id"],
        base_filter: &[clause("location_id.usage", Operator::Eq, BaseValue::Str("internal"))],
        order: &[("product_id", Asc), ("id", Asc)],
    },
];

static ACCOUNTING: &[CollectionSpec] = &[
    CollectionSpec {
        segment: "journal-entries",
        model: "account.move",
        description: "Journal entries, most recent first",
        fields: &[
            "id", "name", "ref", "date", "journal_id", "state", "move_type", "amount_total",
            "partner_id",
        ],
        base_filter: &[],
        order: &[("date", Desc), ("id", Desc)],
    },
    CollectionSpec {
        segment: "journal-items",
        model: "account.move.line",
        description: "Journal items of posted entries",
        fields: &[
            "id", "move_id", "date", "account_id", "partner_id", "name", "debit", "credit", "balance",
        ],
        base_filter: &[clause("parent_state", Operator::Eq, BaseValue::Str("posted"))],
        order: &[("date", Desc), ("id", Desc)],
    },
    CollectionSpec {
        segment: "accounts",
        model: "account.account",
        description: "Chart of accounts",
        fields: &["id", "code", "name", "account_type"],
        base_filter: &[],
        order: &[("code", Asc), ("id", Asc)],
    },
    CollectionSpec {
        segment: "journals",
        model: "account.journal",
        description: "Accounting journals",
        fields: &["id", "name", "code", "type"],
        base_filter: &[],
        order: &[("code", Asc), ("id", Asc)],
    },
];

pub static TABLES: [DomainTable; 4] = [
    DomainTable { domain: Domain::Sales, collections: SALES },
    DomainTable { domain: Domain::Purchase, collections: PURCHASE },
    DomainTable { domain: Domain::Inventory, collections: INVENTORY },
    DomainTable { domain: Domain::Accounting, collections: ACCOUNTING },
];

pub fn table(domain: Domain) -> &'static DomainTable {
    match domain {
        Domain::Sales => &TABLES[0],
        Domain::Purchase => &TABLES[1],
        Domain::Inventory => &TABLES[2],
        Domain::Accounting => &TABLES[3],
    }
}

pub fn lookup(domain: Domain, segment: &str) -> Option<&'static CollectionSpec> {
    table(domain).collections.iter().find(|c| c.segment == segment)
}
