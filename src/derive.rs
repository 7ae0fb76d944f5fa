// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Derived figures: totals, balance, category breakdown, line items.
//!
//! Everything here is pure. Currency is whole units (i64); quantities may be
//! fractional. Bad numeric input becomes 0, it is never rejected.

use crate::models::{AppState, Material, Transaction, TransactionKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

fn sum_amounts(amounts: impl Iterator<Item = i64>) -> i64 {
    amounts.fold(0i64, |acc, a| acc.saturating_add(a))
}

fn sum_kind(ts: &[Transaction], kind: TransactionKind) -> i64 {
    sum_amounts(ts.iter().filter(|t| t.kind == kind).map(|t| t.amount))
}

pub fn total_income(ts: &[Transaction]) -> i64 {
    sum_kind(ts, TransactionKind::Income)
}

pub fn total_expense(ts: &[Transaction]) -> i64 {
    sum_kind(ts, TransactionKind::Expense)
}

/// Remaining money: initial budget plus income minus expense.
pub fn balance(budget: i64, ts: &[Transaction]) -> i64 {
    budget
        .saturating_add(total_income(ts))
        .saturating_sub(total_expense(ts))
}

/// Expenses explicitly marked as not yet paid.
pub fn total_unpaid(ts: &[Transaction]) -> i64 {
    sum_amounts(
        ts.iter()
            .filter(|t| t.is_expense() && t.is_paid == Some(false))
            .map(|t| t.amount),
    )
}

pub fn inventory_value(ms: &[Material]) -> i64 {
    sum_amounts(ms.iter().map(|m| m.total_value))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: i64,
    /// Fraction of total expense, 0.0 when there is none.
    pub share: f64,
}

/// Expense totals per category, in order of each category's first appearance.
pub fn expense_by_category(ts: &[Transaction]) -> Vec<CategoryTotal> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<CategoryTotal> = Vec::new();
    for t in ts.iter().filter(|t| t.is_expense()) {
        match index.get(t.category.as_str()) {
            Some(&i) => out[i].amount = out[i].amount.saturating_add(t.amount),
            None => {
                index.insert(t.category.as_str(), out.len());
                out.push(CategoryTotal {
                    category: t.category.clone(),
                    amount: t.amount,
                    share: 0.0,
                });
            }
        }
    }
    let total = sum_amounts(out.iter().map(|c| c.amount));
    if total != 0 {
        for c in &mut out {
            c.share = c.amount as f64 / total as f64;
        }
    }
    out
}

/// Round half up to whole currency units, the way `Math.round` does.
pub fn round_half_up(d: Decimal) -> i64 {
    d.checked_add(Decimal::new(5, 1))
        .unwrap_or(d)
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// `round(quantity × unit_price)`.
pub fn line_amount(quantity: Decimal, unit_price: i64) -> i64 {
    quantity
        .checked_mul(Decimal::from(unit_price))
        .map(round_half_up)
        .unwrap_or(0)
}

pub fn material_total_value(quantity: Decimal, unit_price: i64) -> i64 {
    line_amount(quantity, unit_price)
}

/// Figures shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub budget: i64,
    pub total_income: i64,
    pub total_expense: i64,
    pub balance: i64,
    pub total_unpaid: i64,
    pub inventory_value: i64,
    pub expense_by_category: Vec<CategoryTotal>,
}

impl Dashboard {
    pub fn compute(state: &AppState) -> Self {
        let ts = &state.transactions;
        Dashboard {
            budget: state.budget,
            total_income: total_income(ts),
            total_expense: total_expense(ts),
            balance: balance(state.budget, ts),
            total_unpaid: total_unpaid(ts),
            inventory_value: inventory_value(&state.materials),
            expense_by_category: expense_by_category(ts),
        }
    }
}

// ---- input coercion ----

/// Currency fields accept anything and keep only the digits, so
/// "1.500.000 ₫" reads as 1500000. No digits means 0.
pub fn parse_currency_input(s: &str) -> i64 {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<i64>().unwrap_or(0)
}

/// Quantities keep digits and the first decimal separator (`.` or `,`);
/// later separators are dropped. No digits means 0.
pub fn parse_quantity_input(s: &str) -> Decimal {
    let mut out = String::new();
    let mut seen_sep = false;
    for c in s.trim().chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if (c == '.' || c == ',') && !seen_sep {
            seen_sep = true;
            out.push('.');
        }
    }
    if !out.chars().any(|c| c.is_ascii_digit()) {
        return Decimal::ZERO;
    }
    if out.starts_with('.') {
        out.insert(0, '0');
    }
    if out.ends_with('.') {
        out.pop();
    }
    out.parse::<Decimal>().unwrap_or(Decimal::ZERO)
}

fn has_digits(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

/// Editor state for the amount / quantity / unit price trio of a
/// transaction form.
///
/// Changing either factor re-derives the amount once both are filled in.
/// Typing an amount directly overrides it until a factor changes again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItemDraft {
    quantity: Option<Decimal>,
    unit_price: Option<i64>,
    amount: i64,
}

impl LineItemDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transaction(t: &Transaction) -> Self {
        LineItemDraft {
            quantity: t.quantity,
            unit_price: t.unit_price,
            amount: t.amount,
        }
    }

    pub fn set_quantity(&mut self, input: &str) {
        self.quantity = has_digits(input).then(|| parse_quantity_input(input));
        self.rederive();
    }

    pub fn set_unit_price(&mut self, input: &str) {
        self.unit_price = has_digits(input).then(|| parse_currency_input(input));
        self.rederive();
    }

    pub fn set_amount(&mut self, input: &str) {
        self.amount = parse_currency_input(input);
    }

    fn rederive(&mut self) {
        if let (Some(q), Some(p)) = (self.quantity, self.unit_price) {
            self.amount = line_amount(q, p);
        }
    }

    pub fn quantity(&self) -> Option<Decimal> {
        self.quantity
    }

    pub fn unit_price(&self) -> Option<i64> {
        self.unit_price
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}

// ---- display ordering and filtering ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(TransactionKind),
}

impl KindFilter {
    pub fn matches(&self, kind: TransactionKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(k) => *k == kind,
        }
    }
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(KindFilter::All);
        }
        s.parse::<TransactionKind>().map(KindFilter::Only)
    }
}

/// Newest date first; records whose date cannot be read go last. Ties keep
/// their stored order.
pub fn sorted_by_date_desc(ts: &[Transaction]) -> Vec<&Transaction> {
    let mut v: Vec<&Transaction> = ts.iter().collect();
    v.sort_by(|a, b| b.calendar_date().cmp(&a.calendar_date()));
    v
}

/// Transactions of the wanted kind whose description or category contains
/// `search` (case-insensitive), newest first.
pub fn filter_transactions<'a>(
    ts: &'a [Transaction],
    kind: KindFilter,
    search: &str,
) -> Vec<&'a Transaction> {
    let needle = search.trim().to_lowercase();
    sorted_by_date_desc(ts)
        .into_iter()
        .filter(|t| kind.matches(t.kind))
        .filter(|t| {
            needle.is_empty()
                || t.description.to_lowercase().contains(&needle)
                || t.category.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn search_materials<'a>(ms: &'a [Material], search: &str) -> Vec<&'a Material> {
    let needle = search.trim().to_lowercase();
    ms.iter()
        .filter(|m| needle.is_empty() || m.name.to_lowercase().contains(&needle))
        .collect()
}
