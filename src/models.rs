// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORIES: [&str; 5] = ["Vật liệu", "Nhân công", "Máy móc", "Pháp lý", "Khác"];
pub const DEFAULT_UNIT: &str = "Cái";
pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASS: &str = "Voi123";
/// Background shown when neither the store nor the local cache has one.
/// Empty means the plain theme colour.
pub const DEFAULT_BACKGROUND: &str = "";

/// Generate an opaque record id. Ids are assigned once, at creation.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    #[serde(alias = "income")]
    Income,
    #[serde(alias = "expense")]
    Expense,
}

impl TransactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Income => "INCOME",
            TransactionKind::Expense => "EXPENSE",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "in" => Ok(TransactionKind::Income),
            "expense" | "out" => Ok(TransactionKind::Expense),
            other => Err(format!("Unknown transaction type '{}' (use income|expense)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default, deserialize_with = "lenient::text")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient::opt_decimal",
        serialize_with = "lenient::ser_opt_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_amount", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_flag", skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
}

impl Transaction {
    /// The calendar date of the record, if the stored text starts with `YYYY-MM-DD`.
    ///
    /// Spreadsheet backends sometimes hand dates back as full timestamps, so
    /// only the leading date part is considered.
    pub fn calendar_date(&self) -> Option<chrono::NaiveDate> {
        let head = self.date.get(..10).unwrap_or(&self.date);
        chrono::NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }
}

/// A transaction as entered by a view, before the ledger assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: String,
    pub amount: i64,
    pub kind: TransactionKind,
    pub category: String,
    pub description: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub unit_price: Option<i64>,
    pub image: Option<String>,
    pub supplier: Option<String>,
    pub is_paid: Option<bool>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: String) -> Transaction {
        Transaction {
            id,
            date: self.date,
            amount: self.amount,
            kind: self.kind,
            category: self.category,
            description: self.description,
            quantity: self.quantity,
            unit: self.unit,
            unit_price: self.unit_price,
            image: self.image,
            supplier: self.supplier,
            // Paid status only means something for money going out.
            is_paid: match self.kind {
                TransactionKind::Expense => self.is_paid,
                TransactionKind::Income => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub unit: String,
    #[serde(
        default,
        deserialize_with = "lenient::decimal",
        serialize_with = "lenient::ser_decimal"
    )]
    pub quantity: Decimal,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub unit_price: i64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_value: i64,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub last_updated: String,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A material as entered by a view. `total_value` and `last_updated` are
/// filled in by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMaterial {
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: i64,
    pub supplier: Option<String>,
    pub image: Option<String>,
}

/// An open-growing list of free-form names used to pre-fill pickers.
///
/// Duplicates are suppressed by exact string equality, so "Acme" and "acme"
/// are two entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionList(Vec<String>);

impl SuggestionList {
    /// Insert `value` (trimmed) unless it is blank or already present.
    /// Returns whether the list grew.
    pub fn insert(&mut self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || self.0.iter().any(|v| v == value) {
            return false;
        }
        self.0.push(value.to_string());
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for SuggestionList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = SuggestionList::default();
        for v in iter {
            list.insert(v.as_ref());
        }
        list
    }
}

/// Which of the three picker lists a suggestion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionKind {
    Suppliers,
    MaterialNames,
    Units,
}

impl SuggestionKind {
    pub const ALL: [SuggestionKind; 3] = [
        SuggestionKind::Suppliers,
        SuggestionKind::MaterialNames,
        SuggestionKind::Units,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SuggestionKind::Suppliers => "suppliers",
            SuggestionKind::MaterialNames => "materials",
            SuggestionKind::Units => "units",
        }
    }

    pub fn of<'a>(&self, state: &'a AppState) -> &'a SuggestionList {
        match self {
            SuggestionKind::Suppliers => &state.suppliers,
            SuggestionKind::MaterialNames => &state.material_names,
            SuggestionKind::Units => &state.units,
        }
    }

    pub fn of_mut<'a>(&self, state: &'a mut AppState) -> &'a mut SuggestionList {
        match self {
            SuggestionKind::Suppliers => &mut state.suppliers,
            SuggestionKind::MaterialNames => &mut state.material_names,
            SuggestionKind::Units => &mut state.units,
        }
    }
}

impl std::str::FromStr for SuggestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suppliers" | "supplier" => Ok(SuggestionKind::Suppliers),
            "materials" | "material" => Ok(SuggestionKind::MaterialNames),
            "units" | "unit" => Ok(SuggestionKind::Units),
            other => Err(format!(
                "Unknown suggestion list '{}' (use suppliers|materials|units)",
                other
            )),
        }
    }
}

/// Everything the ledger tracks for one site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub budget: i64,
    pub transactions: Vec<Transaction>,
    pub materials: Vec<Material>,
    pub suppliers: SuggestionList,
    pub material_names: SuggestionList,
    pub units: SuggestionList,
    #[serde(skip)]
    pub admin_user: String,
    #[serde(skip)]
    pub admin_pass: String,
    pub background_image: String,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            budget: 0,
            transactions: Vec::new(),
            materials: Vec::new(),
            suppliers: SuggestionList::default(),
            material_names: SuggestionList::default(),
            units: SuggestionList::default(),
            admin_user: DEFAULT_ADMIN_USER.to_string(),
            admin_pass: DEFAULT_ADMIN_PASS.to_string(),
            background_image: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

impl AppState {
    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn material(&self, id: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }
}

/// Lenient (de)serializers for values coming out of a spreadsheet.
///
/// Numbers may arrive as JSON numbers, numeric strings or garbage; garbage
/// becomes 0 instead of failing the whole payload.
pub(crate) mod lenient {
    use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
    use rust_decimal::{Decimal, RoundingStrategy};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub(crate) fn decimal_from_value(v: &Value) -> Decimal {
        match v {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Decimal::from(i)
                } else {
                    n.as_f64().and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO)
                }
            }
            Value::String(s) => s.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO),
            Value::Bool(true) => Decimal::ONE,
            _ => Decimal::ZERO,
        }
    }

    fn to_units(d: Decimal) -> i64 {
        d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0)
    }

    fn is_blank(v: &Value) -> bool {
        match v {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(to_units(decimal_from_value(&v)))
    }

    pub fn opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let v = Value::deserialize(d)?;
        if is_blank(&v) {
            return Ok(None);
        }
        Ok(Some(to_units(decimal_from_value(&v))))
    }

    pub fn decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(decimal_from_value(&v))
    }

    pub fn opt_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
        let v = Value::deserialize(d)?;
        if is_blank(&v) {
            return Ok(None);
        }
        Ok(Some(decimal_from_value(&v)))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match v {
            Value::Bool(b) => Some(b),
            Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "" => None,
                "true" | "yes" | "1" => Some(true),
                _ => Some(false),
            },
            _ => None,
        })
    }

    /// A list that may also come back as `null`. Rows that cannot be read
    /// (a blank `type` cell, a stray header row) are skipped one by one.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let rows = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .enumerate()
            .filter_map(|(i, row)| match serde_json::from_value::<T>(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(row = i, error = %e, "skipping unreadable row");
                    None
                }
            })
            .collect())
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let items = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
        Ok(items
            .into_iter()
            .filter_map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect())
    }

    pub fn ser_decimal<S: Serializer>(d: &Decimal, s: S) -> Result<S::Ok, S::Error> {
        if d.fract().is_zero() {
            if let Some(i) = d.to_i64() {
                return s.serialize_i64(i);
            }
        }
        s.serialize_f64(d.to_f64().unwrap_or(0.0))
    }

    pub fn ser_opt_decimal<S: Serializer>(d: &Option<Decimal>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => ser_decimal(d, s),
            None => s.serialize_none(),
        }
    }
}
