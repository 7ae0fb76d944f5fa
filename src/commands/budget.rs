// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{required, wait_for};
use crate::derive::parse_currency_input;
use crate::ledger::Ledger;
use crate::remote::RemoteStore;
use crate::utils::fmt_vnd;
use anyhow::Result;

pub async fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("set", sub)) = m.subcommand() {
        set(ledger, sub).await?;
    }
    Ok(())
}

async fn set<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let amount = parse_currency_input(required(sub, "amount")?);
    let sync = ledger.update_budget(amount);
    println!("Initial budget set to {}", fmt_vnd(amount));
    if wait_for(sync).await {
        println!("Saved to the spreadsheet.");
    }
    Ok(())
}
