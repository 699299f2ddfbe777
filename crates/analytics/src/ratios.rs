//! Financial ratios over classified ledger balances.
//!
//! Balance-sheet classes are read cumulatively up to the end of the window,
//! income-statement classes over the window only. Signs follow the natural
//! side of each class: assets and expenses are debit balances, liabilities,
//! equity and income are credit balances. Income and expense lines found in
//! the balance-sheet input are closed into equity as unallocated earnings, so
//! total assets always equal total liabilities plus equity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use erpbridge_core::DateWindow;

use crate::result::{AnalyticsError, AnalyticsResult, InputWindow, Ratio};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountClass {
    Cash,
    CurrentAsset,
    NonCurrentAsset,
    CurrentLiability,
    NonCurrentLiability,
    Equity,
    Income,
    Expense,
    /// Off-balance or unknown account types; ignored by every ratio.
    Other,
}

impl AccountClass {
    /// Map a backend `account_type` code to a class.
    pub fn from_account_type(account_type: &str) -> Self {
        match account_type {
            "asset_cash" => AccountClass::Cash,
            "asset_receivable" | "asset_current" | "asset_prepayments" => AccountClass::CurrentAsset,
            "asset_non_current" | "asset_fixed" => AccountClass::NonCurrentAsset,
            "liability_payable" | "liability_credit_card" | "liability_current" => {
                AccountClass::CurrentLiability
            }
            "liability_non_current" => AccountClass::NonCurrentLiability,
            "equity" | "equity_unaffected" => AccountClass::Equity,
            "income" | "income_other" => AccountClass::Income,
            "expense" | "expense_depreciation" | "expense_direct_cost" => AccountClass::Expense,
            _ => AccountClass::Other,
        }
    }
}

/// Debit and credit posted to accounts of one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub class: AccountClass,
    pub debit: f64,
    pub credit: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub cash: f64,
    pub current_assets: f64,
    pub total_assets: f64,
    pub current_liabilities: f64,
    pub total_liabilities: f64,
    /// Includes `unallocated_earnings`.
    pub equity: f64,
    /// Income less expense posted up to the end of the window.
    pub unallocated_earnings: f64,
    pub revenue: f64,
    pub expenses: f64,
    pub net_income: f64,
}

impl Balances {
    /// Fold balance-sheet lines (cumulative) and income-statement lines (window).
    pub fn classify(balance_sheet: &[LedgerLine], income_statement: &[LedgerLine]) -> Self {
        let mut b = Balances::default();
        for line in balance_sheet {
            let debit_side = line.debit - line.credit;
            match line.class {
                AccountClass::Cash => {
                    b.cash += debit_side;
                    b.current_assets += debit_side;
                    b.total_assets += debit_side;
                }
                AccountClass::CurrentAsset => {
                    b.current_assets += debit_side;
                    b.total_assets += debit_side;
                }
                AccountClass::NonCurrentAsset => b.total_assets += debit_side,
                AccountClass::CurrentLiability => {
                    b.current_liabilities -= debit_side;
                    b.total_liabilities -= debit_side;
                }
                AccountClass::NonCurrentLiability => b.total_liabilities -= debit_side,
                AccountClass::Equity => b.equity -= debit_side,
                AccountClass::Income | AccountClass::Expense => {
                    b.unallocated_earnings -= debit_side;
                    b.equity -= debit_side;
                }
                AccountClass::Other => {}
            }
        }
        for line in income_statement {
            match line.class {
                AccountClass::Income => b.revenue += line.credit - line.debit,
                AccountClass::Expense => b.expenses += line.debit - line.credit,
                _ => {}
            }
        }
        b.net_income = b.revenue - b.expenses;
        b
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioFamily {
    Liquidity,
    Profitability,
    Debt,
    Efficiency,
}

impl RatioFamily {
    pub const ALL: [RatioFamily; 4] = [
        RatioFamily::Liquidity,
        RatioFamily::Profitability,
        RatioFamily::Debt,
        RatioFamily::Efficiency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RatioFamily::Liquidity => "liquidity",
            RatioFamily::Profitability => "profitability",
            RatioFamily::Debt => "debt",
            RatioFamily::Efficiency => "efficiency",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AnalyticsError> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == raw)
            .ok_or_else(|| {
                AnalyticsError::InvalidInput(format!(
                    "unknown ratio family '{raw}' (expected liquidity, profitability, debt or efficiency)"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidity {
    pub current_ratio: Ratio,
    pub cash_ratio: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profitability {
    pub net_margin: Ratio,
    pub return_on_assets: Ratio,
    pub return_on_equity: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub debt_ratio: Ratio,
    pub debt_to_equity: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    pub asset_turnover: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRatios {
    pub balances: Balances,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<Liquidity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profitability: Option<Profitability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt: Option<Debt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<Efficiency>,
}

/// Compute the requested ratio families.
///
/// Any requested ratio whose denominator is zero fails the whole computation
/// with [`AnalyticsError::InsufficientData`] naming the missing input.
pub fn financial_ratios(
    window: DateWindow,
    balance_sheet: &[LedgerLine],
    income_statement: &[LedgerLine],
    families: &BTreeSet<RatioFamily>,
) -> Result<AnalyticsResult<FinancialRatios>, AnalyticsError> {
    if families.is_empty() {
        return Err(AnalyticsError::InvalidInput("no ratio family requested".into()));
    }
    let b = Balances::classify(balance_sheet, income_statement);

    let liquidity = if families.contains(&RatioFamily::Liquidity) {
        Some(Liquidity {
            current_ratio: Ratio::compute("current ratio", b.current_assets, b.current_liabilities, "current liabilities")?,
            cash_ratio: Ratio::compute("cash ratio", b.cash, b.current_liabilities, "current liabilities")?,
        })
    } else {
        None
    };
    let profitability = if families.contains(&RatioFamily::Profitability) {
        Some(Profitability {
            net_margin: Ratio::compute("net margin", b.net_income, b.revenue, "revenue")?,
            return_on_assets: Ratio::compute("return on assets", b.net_income, b.total_assets, "total assets")?,
            return_on_equity: Ratio::compute("return on equity", b.net_income, b.equity, "equity")?,
        })
    } else {
        None
    };
    let debt = if families.contains(&RatioFamily::Debt) {
        Some(Debt {
            debt_ratio: Ratio::compute("debt ratio", b.total_liabilities, b.total_assets, "total assets")?,
            debt_to_equity: Ratio::compute("debt to equity", b.total_liabilities, b.equity, "equity")?,
        })
    } else {
        None
    };
    let efficiency = if families.contains(&RatioFamily::Efficiency) {
        Some(Efficiency {
            asset_turnover: Ratio::compute("asset turnover", b.revenue, b.total_assets, "total assets")?,
        })
    } else {
        None
    };

    Ok(AnalyticsResult::new(
        InputWindow::new(window, balance_sheet.len() + income_statement.len()),
        FinancialRatios { balances: b, liquidity, profitability, debt, efficiency },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(account_type: &str, debit: f64, credit: f64) -> LedgerLine {
        LedgerLine {
            class: AccountClass::from_account_type(account_type),
            debit,
            credit,
        }
    }

    fn window() -> DateWindow {
        DateWindow::parse("2024-01-01", "2024-12-31").unwrap()
    }

    fn balance_sheet() -> Vec<LedgerLine> {
        vec![
            line("asset_cash", 2000.0, 0.0),
            line("asset_receivable", 3000.0, 1000.0),
            line("asset_fixed", 5000.0, 0.0),
            line("liability_payable", 0.0, 2000.0),
            line("liability_non_current", 0.0, 3000.0),
            line("equity", 0.0, 4000.0),
            line("off_balance", 99.0, 0.0),
        ]
    }

    fn income_statement() -> Vec<LedgerLine> {
        vec![line("income", 0.0, 10000.0), line("expense", 8000.0, 0.0)]
    }

    fn all() -> BTreeSet<RatioFamily> {
        RatioFamily::ALL.into_iter().collect()
    }

    #[test]
    fn computes_every_family() {
        let r = financial_ratios(window(), &balance_sheet(), &income_statement(), &all()).unwrap();
        let m = &r.metrics;
        assert_eq!(m.balances.current_assets, 4000.0);
        assert_eq!(m.balances.total_assets, 9000.0);
        assert_eq!(m.balances.total_liabilities, 5000.0);
        assert_eq!(m.balances.net_income, 2000.0);

        let liquidity = m.liquidity.as_ref().unwrap();
        assert_eq!(liquidity.current_ratio.value, 2.0);
        assert_eq!(liquidity.cash_ratio.value, 1.0);
        assert_eq!(m.profitability.as_ref().unwrap().net_margin.value, 0.2);
        assert_eq!(m.debt.as_ref().unwrap().debt_to_equity.value, 1.25);
        assert_eq!(r.window.record_count, 9);
    }

    #[test]
    fn zero_current_liabilities_is_insufficient_data() {
        let sheet: Vec<_> = balance_sheet()
            .into_iter()
            .filter(|l| l.class != AccountClass::CurrentLiability)
            .collect();
        let err = financial_ratios(window(), &sheet, &income_statement(), &all()).unwrap_err();
        match err {
            AnalyticsError::InsufficientData(m) => assert!(m.contains("current liabilities")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unrequested_families_are_not_computed() {
        let families = [RatioFamily::Debt].into_iter().collect();
        // No income lines at all: profitability would fail, but it was not requested.
        let r = financial_ratios(window(), &balance_sheet(), &[], &families).unwrap();
        assert!(r.metrics.debt.is_some());
        assert!(r.metrics.profitability.is_none());
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["metrics"].get("liquidity").is_none());
    }

    #[test]
    fn cumulative_earnings_close_into_equity() {
        let mut sheet = balance_sheet();
        sheet.extend(income_statement());
        sheet.push(line("income", 0.0, 500.0));
        sheet.push(line("asset_cash", 2500.0, 0.0));
        let b = Balances::classify(&sheet, &income_statement());

        assert_eq!(b.unallocated_earnings, 2500.0);
        assert_eq!(b.equity, 6500.0);
        assert_eq!(b.net_income, 2000.0);
        assert_eq!(b.total_assets, 11500.0);
        assert_eq!(b.total_assets, b.total_liabilities + b.equity);
    }

    #[test]
    fn unknown_account_types_are_ignored() {
        assert_eq!(AccountClass::from_account_type("off_balance"), AccountClass::Other);
        assert!(RatioFamily::parse("solvency").is_err());
    }
}
