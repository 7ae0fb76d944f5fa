// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::derive::Dashboard;
use crate::ledger::{ConnectionHealth, Ledger};
use crate::remote::RemoteStore;
use crate::utils::{fmt_vnd, maybe_print_json, pretty_table};
use anyhow::Result;

const BAR_WIDTH: usize = 20;

fn share_bar(share: f64) -> String {
    let filled = (share.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn handle<R: RemoteStore>(ledger: &Ledger<R>, m: &clap::ArgMatches) -> Result<()> {
    let dash = ledger.with_state(Dashboard::compute);
    if maybe_print_json(m.get_flag("json"), m.get_flag("jsonl"), &dash)? {
        return Ok(());
    }

    if ledger.health() == ConnectionHealth::Disconnected {
        println!("(offline: figures are from local data)");
    }
    let rows = vec![
        vec!["Initial budget".to_string(), fmt_vnd(dash.budget)],
        vec!["Income".to_string(), fmt_vnd(dash.total_income)],
        vec!["Expense".to_string(), fmt_vnd(dash.total_expense)],
        vec!["Balance".to_string(), fmt_vnd(dash.balance)],
        vec!["Unpaid".to_string(), fmt_vnd(dash.total_unpaid)],
        vec!["Inventory value".to_string(), fmt_vnd(dash.inventory_value)],
    ];
    println!("{}", pretty_table(&["", "Amount"], rows));

    if !dash.expense_by_category.is_empty() {
        let rows: Vec<Vec<String>> = dash
            .expense_by_category
            .iter()
            .map(|c| {
                vec![
                    c.category.clone(),
                    fmt_vnd(c.amount),
                    format!("{:>5.1}%", c.share * 100.0),
                    share_bar(c.share),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Category", "Spent", "Share", ""], rows)
        );
    }
    Ok(())
}
