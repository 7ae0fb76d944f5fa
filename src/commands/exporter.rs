// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::derive::sorted_by_date_desc;
use crate::ledger::Ledger;
use crate::remote::RemoteStore;
use crate::utils::fmt_quantity;
use anyhow::{Result, bail};

pub fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(ledger, sub),
        Some(("materials", sub)) => export_materials(ledger, sub),
        _ => Ok(()),
    }
}

enum Format {
    Csv,
    Json,
}

fn format_of(sub: &clap::ArgMatches) -> Result<Format> {
    let fmt = required(sub, "format")?.to_lowercase();
    match fmt.as_str() {
        "csv" => Ok(Format::Csv),
        "json" => Ok(Format::Json),
        _ => bail!("Unknown format: {} (use csv|json)", fmt),
    }
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Oldest first, the way a ledger is read on paper.
fn export_transactions<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = format_of(sub)?;
    let out = required(sub, "out")?;
    let items = ledger.with_state(|s| {
        let mut v: Vec<_> = sorted_by_date_desc(&s.transactions)
            .into_iter()
            .cloned()
            .collect();
        v.reverse();
        v
    });

    match fmt {
        Format::Csv => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "id", "date", "type", "category", "description", "quantity", "unit",
                "unit_price", "amount", "supplier", "is_paid",
            ])?;
            for t in &items {
                wtr.write_record([
                    t.id.clone(),
                    t.date.clone(),
                    t.kind.label().to_string(),
                    t.category.clone(),
                    t.description.clone(),
                    t.quantity.as_ref().map(fmt_quantity).unwrap_or_default(),
                    opt(&t.unit),
                    opt(&t.unit_price),
                    t.amount.to_string(),
                    opt(&t.supplier),
                    opt(&t.is_paid),
                ])?;
            }
            wtr.flush()?;
        }
        Format::Json => {
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
    }
    println!("Exported {} transactions to {}", items.len(), out);
    Ok(())
}

fn export_materials<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = format_of(sub)?;
    let out = required(sub, "out")?;
    let items = ledger.with_state(|s| s.materials.clone());

    match fmt {
        Format::Csv => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "id", "name", "unit", "quantity", "unit_price", "total_value", "supplier",
                "last_updated",
            ])?;
            for m in &items {
                wtr.write_record([
                    m.id.clone(),
                    m.name.clone(),
                    m.unit.clone(),
                    fmt_quantity(&m.quantity),
                    m.unit_price.to_string(),
                    m.total_value.to_string(),
                    opt(&m.supplier),
                    m.last_updated.clone(),
                ])?;
            }
            wtr.flush()?;
        }
        Format::Json => {
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
    }
    println!("Exported {} materials to {}", items.len(), out);
    Ok(())
}
