// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Durable key/value strings that survive restarts.
//!
//! Used for the last known background image, the endpoint override and the
//! picker suggestions added on this device. No eviction or size limit;
//! callers shrink images before storing them.

use crate::models::SuggestionKind;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const KEY_BACKGROUND_IMAGE: &str = "cached_bg_image";
pub const KEY_ENDPOINT: &str = "custom_api_url";

/// Settings key holding one suggestion list as a JSON array of strings.
pub fn suggestion_key(kind: SuggestionKind) -> &'static str {
    match kind {
        SuggestionKind::Suppliers => "saved_suppliers",
        SuggestionKind::MaterialNames => "saved_material_names",
        SuggestionKind::Units => "saved_units",
    }
}

pub struct LocalCache {
    conn: Mutex<Connection>,
}

impl LocalCache {
    /// Wrap a connection, creating the settings table if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_schema(&conn)?;
        Ok(LocalCache {
            conn: Mutex::new(conn),
        })
    }

    /// Open the cache in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::new(crate::db::open_or_init()?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a value. Empty strings and the literal "null"/"undefined" left
    /// behind by older front-ends read back as absent.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let v: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key=?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(v.filter(|s| !s.is_empty() && s != "null" && s != "undefined"))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO settings(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a list stored with [`LocalCache::set_list`]; absent reads as empty.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_list(&self, key: &str, items: &[String]) -> Result<()> {
        self.set(key, &serde_json::to_string(items)?)
    }
}
