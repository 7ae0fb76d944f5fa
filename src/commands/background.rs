// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use super::{required, wait_for};
use crate::ledger::Ledger;
use crate::models::DEFAULT_BACKGROUND;
use crate::remote::RemoteStore;
use crate::utils::{ellipsize, image_arg};
use anyhow::{Result, bail};

pub async fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", _)) => show(ledger),
        Some(("set", sub)) => set(ledger, sub).await?,
        _ => {}
    }
    Ok(())
}

fn show<R: RemoteStore>(ledger: &Ledger<R>) {
    let bg = ledger.background_image();
    if bg == DEFAULT_BACKGROUND {
        println!("No background image set");
    } else {
        println!("{}", ellipsize(&bg, 120));
    }
}

async fn set<R: RemoteStore>(ledger: &Ledger<R>, sub: &clap::ArgMatches) -> Result<()> {
    let user = required(sub, "user")?;
    let password = required(sub, "password")?;
    if !ledger.admin_login(user, password) {
        bail!(ledger
            .login_error()
            .unwrap_or_else(|| "Admin login failed".to_string()));
    }
    let image = image_arg(required(sub, "image")?)?;
    let sync = ledger.set_background_image(&image)?;
    println!("Background image updated on this device");
    if wait_for(sync).await {
        println!("Saved to the spreadsheet.");
    }
    ledger.admin_logout();
    Ok(())
}
