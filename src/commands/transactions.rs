// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{required, wait_for};
use crate::derive::{KindFilter, LineItemDraft, filter_transactions};
use crate::ledger::Ledger;
use crate::models::{DEFAULT_CATEGORIES, NewTransaction, Transaction, TransactionKind};
use crate::remote::RemoteStore;
use crate::utils::{
    fmt_quantity, fmt_vnd, image_arg, maybe_print_json, parse_date, pretty_table, today,
};
use anyhow::{Context, Result, anyhow};

pub async fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(ledger, sub).await?,
        Some(("edit", sub)) => edit(ledger, sub).await?,
        Some(("rm", sub)) => remove(ledger, sub).await?,
        Some(("list", sub)) => list(ledger, sub)?,
        _ => {}
    }
    Ok(())
}

fn opt_string(sub: &clap::ArgMatches, name: &str) -> Option<String> {
    sub.get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_kind(sub: &clap::ArgMatches) -> Result<Option<TransactionKind>> {
    sub.get_one::<String>("type")
        .map(|s| s.parse::<TransactionKind>().map_err(|e| anyhow!(e)))
        .transpose()
}

/// `Some(true)` for `--paid`, `Some(false)` for `--unpaid`, else untouched.
fn paid_flag(sub: &clap::ArgMatches) -> Option<bool> {
    if sub.get_flag("paid") {
        Some(true)
    } else if sub.get_flag("unpaid") {
        Some(false)
    } else {
        None
    }
}

/// Feed the numeric inputs through the same rules as the entry form: the
/// factors re-derive the amount, an explicit amount is typed last.
fn apply_line_item(line: &mut LineItemDraft, sub: &clap::ArgMatches) {
    if let Some(q) = sub.get_one::<String>("quantity") {
        line.set_quantity(q);
    }
    if let Some(p) = sub.get_one::<String>("unit-price") {
        line.set_unit_price(p);
    }
    if let Some(a) = sub.get_one::<String>("amount") {
        line.set_amount(a);
    }
}

async fn add<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let kind = parse_kind(sub)?.unwrap_or(TransactionKind::Expense);
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => today(),
    };
    let mut line = LineItemDraft::new();
    apply_line_item(&mut line, sub);
    let image = sub
        .get_one::<String>("image")
        .map(|v| image_arg(v))
        .transpose()?;

    let draft = NewTransaction {
        date: date.to_string(),
        amount: line.amount(),
        kind,
        category: opt_string(sub, "category").unwrap_or_else(|| DEFAULT_CATEGORIES[0].to_string()),
        description: required(sub, "description")?.trim().to_string(),
        quantity: line.quantity(),
        unit: opt_string(sub, "unit"),
        unit_price: line.unit_price(),
        image,
        supplier: opt_string(sub, "supplier"),
        is_paid: paid_flag(sub),
    };
    let (record, sync) = ledger.add_transaction(draft);
    println!(
        "Recorded {} {} on {} '{}' (id: {})",
        record.kind.label().to_lowercase(),
        fmt_vnd(record.amount),
        record.date,
        record.description,
        record.id
    );
    if wait_for(sync).await {
        println!("Saved to the spreadsheet.");
    }
    Ok(())
}

async fn edit<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let id = required(sub, "id")?;
    let mut record = ledger
        .with_state(|s| s.transaction(id).cloned())
        .with_context(|| format!("Transaction '{}' not found", id))?;

    if let Some(kind) = parse_kind(sub)? {
        record.kind = kind;
    }
    if let Some(d) = sub.get_one::<String>("date") {
        record.date = parse_date(d)?.to_string();
    }
    let mut line = LineItemDraft::from_transaction(&record);
    apply_line_item(&mut line, sub);
    record.amount = line.amount();
    record.quantity = line.quantity();
    record.unit_price = line.unit_price();
    if let Some(c) = opt_string(sub, "category") {
        record.category = c;
    }
    if let Some(d) = opt_string(sub, "description") {
        record.description = d;
    }
    if let Some(u) = opt_string(sub, "unit") {
        record.unit = Some(u);
    }
    if let Some(s) = opt_string(sub, "supplier") {
        record.supplier = Some(s);
    }
    if let Some(v) = sub.get_one::<String>("image") {
        record.image = Some(image_arg(v)?);
    }
    if let Some(p) = paid_flag(sub) {
        record.is_paid = Some(p);
    }
    if record.kind == TransactionKind::Income {
        record.is_paid = None;
    }

    let sync = ledger.update_transaction(record)?;
    println!("Updated transaction {}", id);
    if wait_for(sync).await {
        println!("Saved to the spreadsheet.");
    }
    Ok(())
}

async fn remove<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let id = required(sub, "id")?;
    let sync = ledger.delete_transaction(id)?;
    if wait_for(sync).await {
        println!("Deleted transaction {}", id);
    } else {
        println!("Transaction {} was kept: the spreadsheet did not confirm the delete", id);
    }
    Ok(())
}

/// Rows for `tx list`, after the type filter, search and limit.
pub fn query_rows<R: RemoteStore>(
    ledger: &Ledger<R>,
    sub: &clap::ArgMatches,
) -> Result<Vec<Transaction>> {
    let kind = match sub.get_one::<String>("type") {
        Some(s) => s.parse::<KindFilter>().map_err(|e| anyhow!(e))?,
        None => KindFilter::All,
    };
    let search = sub.get_one::<String>("search").map(String::as_str).unwrap_or("");
    let limit = sub.get_one::<usize>("limit").copied().unwrap_or(usize::MAX);
    Ok(ledger.with_state(|s| {
        filter_transactions(&s.transactions, kind, search)
            .into_iter()
            .take(limit)
            .cloned()
            .collect()
    }))
}

fn list<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(ledger, sub)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        return Ok(());
    }
    let rows: Vec<Vec<String>> = data
        .iter()
        .map(|t| {
            let qty = match (&t.quantity, &t.unit) {
                (Some(q), Some(u)) => format!("{} {}", fmt_quantity(q), u),
                (Some(q), None) => fmt_quantity(q),
                _ => String::new(),
            };
            let paid = match (t.is_expense(), t.is_paid) {
                (true, Some(true)) => "yes",
                (true, Some(false)) => "NO",
                _ => "",
            };
            vec![
                t.date.clone(),
                t.kind.label().to_string(),
                t.description.clone(),
                t.category.clone(),
                qty,
                fmt_vnd(t.amount),
                paid.to_string(),
                t.supplier.clone().unwrap_or_default(),
                t.id.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Date", "Type", "Description", "Category", "Qty", "Amount", "Paid", "Supplier", "Id"],
            rows,
        )
    );
    Ok(())
}
