// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::{Ledger, LedgerEvent, PendingSync};
use crate::remote::RemoteStore;
use anyhow::{Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub mod background;
pub mod budget;
pub mod config;
pub mod dashboard;
pub mod exporter;
pub mod materials;
pub mod suggestions;
pub mod transactions;

pub(crate) fn required<'a>(m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing required argument '{}'", name))
}

/// Initial fetch before a command runs. Failing is not fatal: the command
/// still works on whatever is local and the user is told the data may be
/// stale.
pub async fn load<R: RemoteStore>(ledger: &Ledger<R>) -> bool {
    match ledger.refresh(false).await {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Offline: {}. Showing local data only.", e);
            false
        }
    }
}

/// Wait for a remote write. Failures are reported through the ledger's
/// alerts, so this only says whether it went through.
pub(crate) async fn wait_for(sync: PendingSync) -> bool {
    sync.settled().await.is_ok()
}

/// Print every alert raised so far.
pub fn print_alerts(events: &mut broadcast::Receiver<LedgerEvent>) {
    loop {
        match events.try_recv() {
            Ok(LedgerEvent::Alert(msg)) => eprintln!("{}", msg),
            Ok(LedgerEvent::Changed) => {}
            Err(TryRecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "event receiver lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
