// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::resolve_endpoint;
use crate::ledger::Ledger;
use crate::remote::RemoteStore;
use anyhow::Result;

pub async fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    if let Some(("endpoint", sub)) = m.subcommand() {
        endpoint(ledger, sub).await?;
    }
    Ok(())
}

async fn endpoint<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let Some(url) = sub.get_one::<String>("url") else {
        println!("{}", resolve_endpoint(ledger.cache(), None)?);
        return Ok(());
    };
    // The new address is saved before the reload, so it sticks even when
    // the first fetch from it fails.
    match ledger.change_endpoint(url).await {
        Ok(()) => {
            let (txs, mats) = ledger.with_state(|s| (s.transactions.len(), s.materials.len()));
            println!(
                "Endpoint set to {}; loaded {} transactions and {} materials",
                url.trim(),
                txs,
                mats
            );
        }
        Err(crate::ledger::LedgerError::Remote(e)) => {
            println!("Endpoint set to {}, but loading from it failed: {}", url.trim(), e);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
