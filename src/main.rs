// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::sync::Arc;

use sitebook::cache::LocalCache;
use sitebook::ledger::Ledger;
use sitebook::remote::HttpRemote;
use sitebook::{cli, commands, config, db, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();
    logging::setup_logging(matches.get_flag("verbose"));

    let cache = LocalCache::open_default()?;
    let Some((name, sub)) = matches.subcommand() else {
        cli::build_cli().print_help()?;
        println!();
        return Ok(());
    };
    if name == "init" {
        println!("Local cache initialized at {}", db::db_path()?.display());
        return Ok(());
    }

    let one_off = matches.get_one::<String>("endpoint").map(String::as_str);
    let endpoint = config::resolve_endpoint(&cache, one_off)?;
    tracing::debug!(%endpoint, "using endpoint");
    let ledger = Ledger::new(Arc::new(HttpRemote::new(endpoint)?), cache);
    let mut events = ledger.subscribe();

    // Switching endpoints reloads from the new one itself.
    if name != "config" {
        commands::load(&ledger).await;
    }

    let result = match name {
        "dashboard" => commands::dashboard::handle(&ledger, sub),
        "tx" => commands::transactions::handle(&ledger, sub).await,
        "material" => commands::materials::handle(&ledger, sub).await,
        "budget" => commands::budget::handle(&ledger, sub).await,
        "suggest" => commands::suggestions::handle(&ledger, sub),
        "background" => commands::background::handle(&ledger, sub).await,
        "config" => commands::config::handle(&ledger, sub).await,
        "export" => commands::exporter::handle(&ledger, sub),
        _ => {
            cli::build_cli().print_help()?;
            println!();
            Ok(())
        }
    };
    commands::print_alerts(&mut events);
    result
}
