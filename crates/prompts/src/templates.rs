use erpbridge_core::Domain;

use crate::catalog::PromptArgument;

pub(crate) struct Template {
    pub name: &'static str,
    pub domain: Domain,
    pub description: &'static str,
    pub arguments: &'static [PromptArgument],
    pub source: &'static str,
}

const TRAILING_PERIODS: &[&str] = &["month", "quarter", "year"];
const FISCAL_PERIODS: &[&str] = &["last_month", "last_quarter", "year_to_date", "last_year"];

const FOCUS: PromptArgument = PromptArgument {
    name: "focus",
    description: "Free-text topic to emphasise",
    required: false,
    allowed: None,
};

const SALES_ANALYSIS: &str = r#"Analyze sales for the last {{ period }} and provide insights on:
- Top selling products (top 5)
- Main customers (top 5)
- Sales trend, compared with the previous {{ period }}
- Performance by salesperson, where orders carry one
- Actionable recommendations to improve sales
{% if focus %}
Pay particular attention to: {{ focus }}
{% endif %}
Use 'analyze_sales_performance' (group_by product, customer, salesperson or a period bucket) and 'search_sales_orders' to fetch the data.
"#;

const PURCHASE_ANALYSIS: &str = r#"Analyze purchases made in the last {{ period }} and provide insights on:
- Most purchased products (top 5)
- Main suppliers by value (top 5)
- Purchase trends
- Delivery punctuality and average delay per supplier
- Recommendations for optimizing purchases or negotiating with suppliers
{% if focus %}
Pay particular attention to: {{ focus }}
{% endif %}
Use 'analyze_supplier_performance' and 'search_purchase_orders' to fetch the data.
"#;

const INVENTORY_MANAGEMENT: &str = r#"Analyze the current inventory status, looking back over the last {{ period }}, and report on:
- Products with low stock (below the configured minimum)
- Products with excess stock or without movement
- Current inventory valuation
- Inventory turnover and days of inventory for key products
- Recommendations for adjustments, replenishment or stock liquidation
{% if focus %}
Pay particular attention to: {{ focus }}
{% endif %}
Use 'check_product_availability' and 'analyze_inventory_turnover' to fetch the data.
"#;

const FINANCIAL_ANALYSIS: &str = r#"Perform a financial analysis for the {{ period | replace("_", " ") }} and provide:
- Income statement summary (revenue, expenses, profit)
- Balance sheet summary (assets, liabilities, equity)
- Key financial ratios (liquidity, profitability, debt, efficiency)
- Comparison with the previous period where possible
- Important observations or alerts
{% if focus %}
Pay particular attention to: {{ focus }}
{% endif %}
Use 'analyze_financial_ratios' and 'search_journal_entries' to fetch the data.
"#;

pub(crate) const TEMPLATES: &[Template] = &[
    Template {
        name: "sales_analysis",
        domain: Domain::Sales,
        description: "Analyzes sales for a period and provides key insights",
        arguments: &[
            PromptArgument {
                name: "period",
                description: "Trailing period to analyze",
                required: true,
                allowed: Some(TRAILING_PERIODS),
            },
            FOCUS,
        ],
        source: SALES_ANALYSIS,
    },
    Template {
        name: "purchase_analysis",
        domain: Domain::Purchase,
        description: "Analyzes purchase orders and supplier performance",
        arguments: &[
            PromptArgument {
                name: "period",
                description: "Trailing period to analyze",
                required: true,
                allowed: Some(TRAILING_PERIODS),
            },
            FOCUS,
        ],
        source: PURCHASE_ANALYSIS,
    },
    Template {
        name: "inventory_management",
        domain: Domain::Inventory,
        description: "Analyzes inventory status and provides recommendations",
        arguments: &[
            PromptArgument {
                name: "period",
                description: "Look-back period for turnover",
                required: true,
                allowed: Some(TRAILING_PERIODS),
            },
            FOCUS,
        ],
        source: INVENTORY_MANAGEMENT,
    },
    Template {
        name: "financial_analysis",
        domain: Domain::Accounting,
        description: "Performs a basic financial analysis",
        arguments: &[
            PromptArgument {
                name: "period",
                description: "Fiscal period to analyze",
                required: true,
                allowed: Some(FISCAL_PERIODS),
            },
            FOCUS,
        ],
        source: FINANCIAL_ANALYSIS,
    },
];
