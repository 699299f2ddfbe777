//! Accounting tools.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use erpbridge_analytics::{financial_ratios, AccountClass, LedgerLine, RatioFamily};
use erpbridge_core::record::{date_of, f64_of, id_of, many2one_of, str_of};
use erpbridge_core::{BridgeError, BridgeResult, Clause, Filter, Operator, Page, Projection, QuerySpec, Record};
use erpbridge_session::SessionClient;

use crate::common::{copy_present, create_command, created_summary, to_json, window};
use crate::search::{self, SearchShape};
use crate::validate::Params;

const MOVE: &str = "account.move";
const MOVE_LINE: &str = "account.move.line";

const ENTRIES: SearchShape = SearchShape {
    collection: MOVE,
    date_field: "date",
    datetime: false,
    fields: &["name", "ref", "date", "journal_id", "partner_id", "state", "move_type", "amount_total"],
    default_order: "date desc, id desc",
    shortcuts: &["journal_id", "state"],
};

/// Search entries, then attach their lines with one batched line query.
pub(crate) async fn search_entries(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let spec = ENTRIES.query(params)?;
    let (mut entries, total) = search::run(client, &spec).await?;

    let ids: Vec<i64> = entries.iter().filter_map(id_of).collect();
    if !ids.is_empty() {
        let lines_spec = QuerySpec::new(MOVE_LINE)
            .with_filter(Filter::match_all().with(Clause::new("move_id", Operator::In, json!(ids))))
            .with_projection(Projection::fields([
                "move_id",
                "account_id",
                "partner_id",
                "name",
                "debit",
                "credit",
            ]))
            .with_page(Page::unbounded());
        let lines = client.search_read(&lines_spec).await?;

        let mut by_move: BTreeMap<i64, Vec<JsonValue>> = BTreeMap::new();
        for mut line in lines {
            let Some(parent) = many2one_of(&line, "move_id") else { continue };
            line.remove("move_id");
            by_move.entry(parent.id).or_default().push(JsonValue::Object(line));
        }
        for entry in &mut entries {
            let lines = id_of(entry).and_then(|id| by_move.remove(&id)).unwrap_or_default();
            entry.insert("lines".into(), JsonValue::Array(lines));
        }
    }

    Ok(search::envelope(&spec, entries, total))
}

fn cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Reject entries that could never post: empty, two-sided lines, unbalanced.
fn check_balanced(lines: &[Params]) -> BridgeResult<()> {
    if lines.is_empty() {
        return Err(BridgeError::validation("a journal entry needs at least one line"));
    }
    let (mut debit, mut credit) = (0i64, 0i64);
    for (i, line) in lines.iter().enumerate() {
        let d = cents(line.number("debit").unwrap_or_default());
        let c = cents(line.number("credit").unwrap_or_default());
        if d > 0 && c > 0 {
            return Err(BridgeError::validation(format!(
                "lines[{i}] carries both a debit and a credit"
            )));
        }
        debit += d;
        credit += c;
    }
    if debit != credit {
        return Err(BridgeError::validation(format!(
            "entry is unbalanced: debits {:.2} != credits {:.2}",
            debit as f64 / 100.0,
            credit as f64 / 100.0
        )));
    }
    Ok(())
}

pub(crate) async fn create_entry(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let lines = params.objects("lines");
    check_balanced(&lines)?;

    let line_values: Vec<JsonValue> = lines
        .iter()
        .map(|line| {
            let mut values = Map::new();
            copy_present(line, &["account_id", "partner_id", "name"], &mut values);
            values.insert("debit".into(), json!(line.number("debit").unwrap_or_default()));
            values.insert("credit".into(), json!(line.number("credit").unwrap_or_default()));
            create_command(values)
        })
        .collect();

    let mut values = Map::new();
    values.insert("move_type".into(), json!("entry"));
    values.insert("journal_id".into(), json!(params.require_int("journal_id")?));
    copy_present(params, &["ref", "date"], &mut values);
    values.insert("line_ids".into(), JsonValue::Array(line_values));

    let id = client.create(MOVE, values).await?;
    Ok(created_summary(client, MOVE, id, &["name", "state"]).await)
}

fn families(params: &Params) -> BridgeResult<BTreeSet<RatioFamily>> {
    match params.str_list("ratios") {
        None => Ok(RatioFamily::ALL.into_iter().collect()),
        Some(names) => names
            .into_iter()
            .map(|n| RatioFamily::parse(n).map_err(BridgeError::from))
            .collect(),
    }
}

/// Ratios from posted ledger lines: cumulative up to `date_to` for the
/// balance sheet, inside the window for the income statement.
pub(crate) async fn analyze_ratios(client: &SessionClient, params: &Params) -> BridgeResult<JsonValue> {
    let window = window(params)?;
    let families = families(params)?;

    let spec = QuerySpec::new(MOVE_LINE)
        .with_filter(
            Filter::match_all()
                .with(Clause::new("parent_state", Operator::Eq, "posted"))
                .with(Clause::new("date", Operator::Le, window.to_date_str())),
        )
        .with_projection(Projection::fields(["account_id", "debit", "credit", "date"]))
        .with_page(Page::unbounded());
    let lines = client.search_read(&spec).await?;

    let account_ids: Vec<i64> = lines
        .iter()
        .filter_map(|l| many2one_of(l, "account_id").map(|a| a.id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let accounts = client
        .read("account.account", &account_ids, &Projection::fields(["account_type"]), None)
        .await?;
    let classes: BTreeMap<i64, AccountClass> = accounts
        .iter()
        .filter_map(|a: &Record| {
            Some((id_of(a)?, AccountClass::from_account_type(str_of(a, "account_type")?)))
        })
        .collect();
    debug!(lines = lines.len(), accounts = classes.len(), "fetched ledger for ratio analysis");

    let mut balance_sheet = Vec::with_capacity(lines.len());
    let mut income_statement = Vec::new();
    for line in &lines {
        let Some(account) = many2one_of(line, "account_id") else { continue };
        let ledger = LedgerLine {
            class: classes.get(&account.id).copied().unwrap_or(AccountClass::Other),
            debit: f64_of(line, "debit").unwrap_or_default(),
            credit: f64_of(line, "credit").unwrap_or_default(),
        };
        if date_of(line, "date").is_some_and(|d| window.contains(d)) {
            income_statement.push(ledger);
        }
        balance_sheet.push(ledger);
    }

    to_json(&financial_ratios(window, &balance_sheet, &income_statement, &families)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client_with, invoke};
    use erpbridge_session::ScriptedTransport;

    #[test]
    fn balance_is_checked_to_the_cent() {
        let line = |debit: f64, credit: f64| {
            let sig = crate::registry::find("create_journal_entry").unwrap();
            let raw = json!({"journal_id": 1, "lines": [{"account_id": 1, "debit": debit, "credit": credit}]});
            crate::validate::validate(sig, &raw).unwrap().objects("lines").remove(0)
        };
        assert!(check_balanced(&[line(10.004, 0.0), line(0.0, 10.0)]).is_ok());
        assert!(check_balanced(&[line(10.0, 0.0), line(0.0, 9.99)]).is_err());
        assert!(check_balanced(&[line(1.0, 1.0)]).is_err());
        assert!(check_balanced(&[]).is_err());
    }

    #[tokio::test]
    async fn unbalanced_entry_makes_no_remote_call() {
        let (client, transport) = client_with(ScriptedTransport::answering(json!(1)));
        let err = invoke(
            &client,
            "create_journal_entry",
            json!({"journal_id": 3, "lines": [
                {"account_id": 10, "debit": 100.0},
                {"account_id": 20, "credit": 90.0}
            ]}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(transport.login_count(), 0);
    }

    #[tokio::test]
    async fn balanced_entry_is_created_with_nested_lines() {
        let transport = ScriptedTransport::new(|call| {
            Ok(match call.method.as_str() {
                "create" => json!(77),
                _ => json!([{"id": 77, "name": "MISC/2024/0001", "state": "draft"}]),
            })
        });
        let (client, transport) = client_with(transport);
        let out = invoke(
            &client,
            "create_journal_entry",
            json!({"journal_id": 3, "ref": "accrual", "date": "2024-06-30", "lines": [
                {"account_id": 10, "debit": 100.0, "name": "rent"},
                {"account_id": 20, "credit": 100.0}
            ]}),
        )
        .await
        .unwrap();
        assert_eq!(out["state"], "draft");

        let values = &transport.calls_to("create")[0].args[0];
        assert_eq!(values["move_type"], "entry");
        assert_eq!(values["line_ids"].as_array().unwrap().len(), 2);
        assert_eq!(values["line_ids"][1][2], json!({"account_id": 20, "debit": 0.0, "credit": 100.0}));
    }

    #[tokio::test]
    async fn search_attaches_lines_with_one_batched_query() {
        let transport = ScriptedTransport::new(|call| {
            Ok(match (call.collection.as_str(), call.method.as_str()) {
                (_, "search_count") => json!(2),
                ("account.move", _) => json!([
                    {"id": 1, "name": "MISC/1", "date": "2024-01-02"},
                    {"id": 2, "name": "MISC/2", "date": "2024-01-03"}
                ]),
                _ => json!([
                    {"id": 10, "move_id": [1, "MISC/1"], "debit": 5.0, "credit": 0.0},
                    {"id": 11, "move_id": [1, "MISC/1"], "debit": 0.0, "credit": 5.0},
                    {"id": 12, "move_id": [2, "MISC/2"], "debit": 1.0, "credit": 0.0}
                ]),
            })
        });
        let (client, transport) = client_with(transport);
        let out = invoke(&client, "search_journal_entries", json!({"state": "posted"})).await.unwrap();
        assert_eq!(out["records"][0]["lines"].as_array().unwrap().len(), 2);
        assert_eq!(out["records"][1]["lines"][0]["id"], 12);
        let line_queries = transport
            .calls()
            .into_iter()
            .filter(|c| c.collection == "account.move.line")
            .count();
        assert_eq!(line_queries, 1);
    }

    fn ledger_transport(liabilities: f64) -> ScriptedTransport {
        ScriptedTransport::new(move |call| {
            Ok(match call.collection.as_str() {
                "account.account" => json!([
                    {"id": 1, "account_type": "asset_cash"},
                    {"id": 2, "account_type": "liability_payable"},
                    {"id": 3, "account_type": "equity"},
                    {"id": 4, "account_type": "income"}
                ]),
                _ => json!([
                    {"account_id": [1, "Bank"], "debit": 1000.0, "credit": 0.0, "date": "2023-12-01"},
                    {"account_id": [2, "Payables"], "debit": 0.0, "credit": liabilities, "date": "2023-12-01"},
                    {"account_id": [3, "Capital"], "debit": 0.0, "credit": 1000.0 - liabilities, "date": "2023-12-01"},
                    {"account_id": [1, "Bank"], "debit": 300.0, "credit": 0.0, "date": "2024-02-01"},
                    {"account_id": [4, "Sales"], "debit": 0.0, "credit": 300.0, "date": "2024-02-01"}
                ]),
            })
        })
    }

    #[tokio::test]
    async fn ratios_use_cumulative_balances_and_window_income() {
        let (client, transport) = client_with(ledger_transport(400.0));
        let out = invoke(
            &client,
            "analyze_financial_ratios",
            json!({"date_from": "2024-01-01", "date_to": "2024-12-31", "ratios": ["liquidity", "efficiency"]}),
        )
        .await
        .unwrap();
        let m = &out["metrics"];
        assert_eq!(m["balances"]["current_assets"], 1300.0);
        assert_eq!(m["balances"]["revenue"], 300.0);
        assert_eq!(m["balances"]["unallocated_earnings"], 300.0);
        assert_eq!(m["balances"]["equity"], 900.0);
        let b = &m["balances"];
        assert_eq!(
            b["total_assets"].as_f64().unwrap(),
            b["total_liabilities"].as_f64().unwrap() + b["equity"].as_f64().unwrap()
        );
        assert_eq!(m["liquidity"]["current_ratio"]["value"], 3.25);
        assert!(m.get("profitability").is_none_or(JsonValue::is_null));
        assert_eq!(transport.calls_to("read").len(), 1);
    }

    #[tokio::test]
    async fn zero_current_liabilities_is_insufficient_data() {
        let (client, _) = client_with(ledger_transport(0.0));
        let err = invoke(
            &client,
            "analyze_financial_ratios",
            json!({"date_from": "2024-01-01", "date_to": "2024-12-31", "ratios": ["liquidity"]}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "insufficient_data_error");
        assert!(err.to_string().contains("current liabilities"));
    }
}
