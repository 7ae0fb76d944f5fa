// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{required, wait_for};
use crate::derive::{parse_currency_input, parse_quantity_input, search_materials};
use crate::ledger::Ledger;
use crate::models::{DEFAULT_UNIT, Material, NewMaterial};
use crate::remote::RemoteStore;
use crate::utils::{fmt_quantity, fmt_vnd, image_arg, maybe_print_json, pretty_table};
use anyhow::{Context, Result};

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

async fn add<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let draft = NewMaterial {
        name: required(sub, "name")?.trim().to_string(),
        unit: opt_string(sub, "unit").unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        quantity: parse_quantity_input(required(sub, "quantity")?),
        unit_price: parse_currency_input(required(sub, "unit-price")?),
        supplier: opt_string(sub, "supplier"),
        image: sub
            .get_one::<String>("image")
            .map(|v| image_arg(v))
            .transpose()?,
    };
    let (record, sync) = ledger.add_material(draft);
    println!(
        "Added {} {} {} worth {} (id: {})",
        fmt_quantity(&record.quantity),
        record.unit,
        record.name,
        fmt_vnd(record.total_value),
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
        .with_state(|s| s.material(id).cloned())
        .with_context(|| format!("Material '{}' not found", id))?;

    if let Some(n) = opt_string(sub, "name") {
        record.name = n;
    }
    if let Some(u) = opt_string(sub, "unit") {
        record.unit = u;
    }
    if let Some(q) = sub.get_one::<String>("quantity") {
        record.quantity = parse_quantity_input(q);
    }
    if let Some(p) = sub.get_one::<String>("unit-price") {
        record.unit_price = parse_currency_input(p);
    }
    if let Some(s) = opt_string(sub, "supplier") {
        record.supplier = Some(s);
    }
    if let Some(v) = sub.get_one::<String>("image") {
        record.image = Some(image_arg(v)?);
    }

    let sync = ledger.update_material(record)?;
    let total = ledger
        .with_state(|s| s.material(id).map(|m| m.total_value))
        .unwrap_or_default();
    println!("Updated material {} (value now {})", id, fmt_vnd(total));
    if wait_for(sync).await {
        println!("Saved to the spreadsheet.");
    }
    Ok(())
}

async fn remove<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let id = required(sub, "id")?;
    let sync = ledger.delete_material(id)?;
    if wait_for(sync).await {
        println!("Deleted material {}", id);
    } else {
        println!("Material {} was kept: the spreadsheet did not confirm the delete", id);
    }
    Ok(())
}

pub fn query_rows<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Vec<Material> {
    let search = sub.get_one::<String>("search").map(String::as_str).unwrap_or("");
    ledger.with_state(|s| {
        search_materials(&s.materials, search)
            .into_iter()
            .cloned()
            .collect()
    })
}

fn list<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let data = query_rows(ledger, sub);
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        return Ok(());
    }
    let rows: Vec<Vec<String>> = data
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                format!("{} {}", fmt_quantity(&m.quantity), m.unit),
                fmt_vnd(m.unit_price),
                fmt_vnd(m.total_value),
                m.supplier.clone().unwrap_or_default(),
                m.last_updated.clone(),
                m.id.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Name", "Qty", "Unit price", "Value", "Supplier", "Updated", "Id"],
            rows,
        )
    );
    Ok(())
}
