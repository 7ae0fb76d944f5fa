// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::required;
use crate::ledger::Ledger;
use crate::models::SuggestionKind;
use crate::remote::RemoteStore;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::{Result, anyhow};

pub fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => list(ledger, sub)?,
        Some(("add", sub)) => add(ledger, sub)?,
        _ => {}
    }
    Ok(())
}

fn kind_arg(sub: &clap::ArgMatches) -> Result<SuggestionKind> {
    required(sub, "list")?
        .parse::<SuggestionKind>()
        .map_err(|e: String| anyhow!(e))
}

fn list<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let kind = kind_arg(sub)?;
    let items: Vec<String> = ledger.with_state(|s| kind.of(s).iter().cloned().collect());
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &items)? {
        let rows = items.into_iter().map(|v| vec![v]).collect();
        println!("{}", pretty_table(&[kind.label()], rows));
    }
    Ok(())
}

/// Suggestions are kept in the local cache, so they come back on the next
/// run even though the store never receives them.
fn add<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let kind = kind_arg(sub)?;
    let value = required(sub, "value")?;
    if ledger.add_suggestion(kind, value) {
        println!("Added '{}' to {}", value.trim(), kind.label());
    } else {
        println!("'{}' is already in {} (or blank)", value.trim(), kind.label());
    }
    Ok(())
}
