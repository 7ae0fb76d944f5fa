// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::cache::{KEY_ENDPOINT, LocalCache};
use anyhow::Result;

/// The spreadsheet web app used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "https://script.google.com/macros/s/AKfycbzspDgLEfKLtXQLB0YqZSQHmTWdOMr8zC1S9_MIUsvfeYvfjPnvIclohyXTyaCn-24/exec";

/// Resolve the endpoint: a one-off override wins, then the persisted
/// setting, then the built-in default.
pub fn resolve_endpoint(cache: &LocalCache, one_off: Option<&str>) -> Result<String> {
    if let Some(url) = one_off.map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(url.to_string());
    }
    Ok(cache
        .get(KEY_ENDPOINT)?
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()))
}

pub fn save_endpoint(cache: &LocalCache, url: &str) -> Result<()> {
    cache.set(KEY_ENDPOINT, url.trim())
}
