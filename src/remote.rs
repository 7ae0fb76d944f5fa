// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Client for the spreadsheet-backed store.
//!
//! Every request is a `{ "action": ..., "data": ... }` envelope posted to a
//! single endpoint; every response is a JSON object carrying a `status` of
//! `"ok"` or `"error"` next to its domain fields. No retries.

use crate::models::{Material, Transaction, lenient};
use anyhow::Result;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

const UA: &str = concat!(
    "sitebook/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/sitebook)"
);

const ACCESS_HINT: &str = "access denied by the web app: set 'Who has access' to 'Anyone' in the script deployment";

/// Why a remote call failed. Views show the message; nothing branches on
/// the variant beyond that.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a usable HTTP response.
    #[error("{0}")]
    NetworkUnreachable(String),
    /// Something answered, but not with the JSON envelope (e.g. a sign-in page).
    #[error("{0}")]
    UnexpectedResponseFormat(String),
    /// The store parsed the request and declined it.
    #[error("{0}")]
    ServerRejected(String),
}

/// One logical command against the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum Command {
    GetData {},
    SaveTransaction(Transaction),
    DeleteTransaction { id: String },
    UpdateBudget { amount: i64 },
    SaveSetting { key: String, value: String },
    SaveMaterial(Material),
    DeleteMaterial { id: String },
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Command::GetData {} => "get_data",
            Command::SaveTransaction(_) => "save_transaction",
            Command::DeleteTransaction { .. } => "delete_transaction",
            Command::UpdateBudget { .. } => "update_budget",
            Command::SaveSetting { .. } => "save_setting",
            Command::SaveMaterial(_) => "save_material",
            Command::DeleteMaterial { .. } => "delete_material",
        }
    }
}

/// The full data set returned by `get_data`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    #[serde(default, deserialize_with = "lenient::list")]
    pub transactions: Vec<Transaction>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub materials: Vec<Material>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub budget: i64,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub admin_user: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub admin_pass: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub background_image: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub suppliers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub material_names: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub units: Vec<String>,
}

pub trait RemoteStore: Send + Sync + 'static {
    /// Send one command and return the decoded response envelope.
    fn send(&self, command: Command) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Point subsequent calls at a different endpoint.
    fn retarget(&self, _endpoint: &str) {}

    fn get_data(&self) -> impl Future<Output = Result<RemoteSnapshot, RemoteError>> + Send {
        async move {
            let v = self.send(Command::GetData {}).await?;
            serde_json::from_value(v).map_err(|e| {
                RemoteError::UnexpectedResponseFormat(format!("unreadable data payload: {}", e))
            })
        }
    }

    fn save_transaction(
        &self,
        t: Transaction,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        async move { self.send(Command::SaveTransaction(t)).await.map(drop) }
    }

    fn delete_transaction(&self, id: String) -> impl Future<Output = Result<(), RemoteError>> + Send {
        async move { self.send(Command::DeleteTransaction { id }).await.map(drop) }
    }

    fn update_budget(&self, amount: i64) -> impl Future<Output = Result<(), RemoteError>> + Send {
        async move { self.send(Command::UpdateBudget { amount }).await.map(drop) }
    }

    fn save_setting(
        &self,
        key: String,
        value: String,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        async move { self.send(Command::SaveSetting { key, value }).await.map(drop) }
    }

    fn save_material(&self, m: Material) -> impl Future<Output = Result<(), RemoteError>> + Send {
        async move { self.send(Command::SaveMaterial(m)).await.map(drop) }
    }

    fn delete_material(&self, id: String) -> impl Future<Output = Result<(), RemoteError>> + Send {
        async move { self.send(Command::DeleteMaterial { id }).await.map(drop) }
    }
}

/// Decode a response body into the envelope, mapping the store's own error
/// status and non-JSON answers onto [`RemoteError`].
pub fn parse_envelope(content_type: Option<&str>, body: &str) -> Result<Value, RemoteError> {
    let is_json = content_type.is_none_or(|ct| ct.contains("application/json"));
    if !is_json && (body.contains("Google Drive") || body.contains("sign in")) {
        return Err(RemoteError::UnexpectedResponseFormat(ACCESS_HINT.to_string()));
    }
    let v: Value = serde_json::from_str(body).map_err(|e| {
        RemoteError::UnexpectedResponseFormat(format!("response is not JSON: {}", e))
    })?;
    if v.get("status").and_then(Value::as_str) == Some("error") {
        let msg = v
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("the server failed to process the request");
        return Err(RemoteError::ServerRejected(msg.to_string()));
    }
    Ok(v)
}

/// HTTP transport for the store.
pub struct HttpRemote {
    http: reqwest::Client,
    endpoint: RwLock<String>,
}

impl HttpRemote {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(UA)
            .build()?;
        Ok(HttpRemote {
            http,
            endpoint: RwLock::new(endpoint.into()),
        })
    }

    pub fn endpoint(&self) -> String {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn post(http: reqwest::Client, endpoint: String, command: &Command) -> Result<Value, RemoteError> {
    let body = serde_json::to_string(command).map_err(|e| {
        RemoteError::UnexpectedResponseFormat(format!("could not encode request: {}", e))
    })?;
    // text/plain keeps script backends from demanding a CORS preflight.
    let resp = http
        .post(&endpoint)
        .header(CONTENT_TYPE, "text/plain;charset=utf-8")
        .body(body)
        .send()
        .await
        .map_err(|e| RemoteError::NetworkUnreachable(format!("connection failed: {}", e)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RemoteError::NetworkUnreachable(format!(
            "connection error (HTTP {})",
            status.as_u16()
        )));
    }
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = resp
        .text()
        .await
        .map_err(|e| RemoteError::NetworkUnreachable(format!("connection dropped: {}", e)))?;
    parse_envelope(content_type.as_deref(), &text)
}

impl RemoteStore for HttpRemote {
    fn send(&self, command: Command) -> impl Future<Output = Result<Value, RemoteError>> + Send {
        let http = self.http.clone();
        let endpoint = self.endpoint();
        async move {
            let action = command.action();
            tracing::debug!(action, %endpoint, "sending remote command");
            let result = post(http, endpoint, &command).await;
            if let Err(e) = &result {
                tracing::warn!(action, error = %e, "remote command failed");
            }
            result
        }
    }

    fn retarget(&self, endpoint: &str) {
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = endpoint.to_string();
    }
}
