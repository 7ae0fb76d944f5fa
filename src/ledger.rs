// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The state container for one site.
//!
//! Every mutation is applied to the in-memory [`AppState`] before its remote
//! call is spawned, so a read right after the call returns already sees it.
//! What happens when the remote call fails is decided by the action's
//! [`SyncPolicy`]: deletions are put back, everything else stays as the user
//! left it. Either way the connection is marked unhealthy and an alert is
//! broadcast to subscribers.

use crate::cache::{KEY_BACKGROUND_IMAGE, LocalCache, suggestion_key};
use crate::derive::material_total_value;
use crate::models::{
    AppState, DEFAULT_ADMIN_PASS, DEFAULT_ADMIN_USER, Material, NewMaterial, NewTransaction,
    SuggestionKind, SuggestionList, Transaction, new_record_id,
};
use crate::remote::{Command, RemoteError, RemoteSnapshot, RemoteStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Setting key the store uses for the background image.
pub const BACKGROUND_SETTING_KEY: &str = "background_image";

/// Remote background values this short are placeholders, not images.
const MIN_REMOTE_BACKGROUND_LEN: usize = 10;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    Connected,
    Disconnected,
}

/// What to put back if a rolled-back action fails remotely.
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    Transaction { record: Transaction, index: usize },
    Material { record: Material, index: usize },
}

impl Undo {
    /// Re-insert the removed record at its old position, unless something
    /// (e.g. a refresh) has already brought a record with that id back.
    fn apply(self, state: &mut AppState) {
        match self {
            Undo::Transaction { record, index } => {
                if state.transaction(&record.id).is_none() {
                    let at = index.min(state.transactions.len());
                    state.transactions.insert(at, record);
                }
            }
            Undo::Material { record, index } => {
                if state.material(&record.id).is_none() {
                    let at = index.min(state.materials.len());
                    state.materials.insert(at, record);
                }
            }
        }
    }
}

/// How an action reacts to its remote call failing.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPolicy {
    /// Keep the optimistic change; only health and the alert reflect the failure.
    KeepOnFailure,
    /// Undo the optimistic change.
    RollbackOnFailure(Undo),
}

impl SyncPolicy {
    pub fn rolls_back(&self) -> bool {
        matches!(self, SyncPolicy::RollbackOnFailure(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// State, health or flags changed; re-read whatever is displayed.
    Changed,
    /// A failure the user must be told about.
    Alert(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("admin login required")]
    AdminRequired,
    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),
    #[error("no transaction with id '{0}'")]
    UnknownTransaction(String),
    #[error("no material with id '{0}'")]
    UnknownMaterial(String),
    #[error("local cache error: {0}")]
    Cache(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Handle to a spawned remote call.
///
/// The call runs whether or not this is awaited; the ledger records its
/// outcome either way.
pub struct PendingSync {
    handle: JoinHandle<Result<(), RemoteError>>,
}

impl PendingSync {
    pub async fn settled(self) -> Result<(), RemoteError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(RemoteError::NetworkUnreachable(format!(
                "sync task did not finish: {}",
                e
            ))),
        }
    }
}

struct Inner {
    state: AppState,
    health: ConnectionHealth,
    last_error: Option<String>,
    admin_logged_in: bool,
    login_error: Option<String>,
    in_flight: usize,
    loading: bool,
    // Sequence stamps: every remote call gets the next number. Health only
    // moves for outcomes not older than the last one applied, and a data
    // snapshot older than one already applied is dropped.
    next_seq: u64,
    health_seq: u64,
    snapshot_seq: u64,
}

impl Inner {
    fn stamp(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn record_outcome(&mut self, seq: u64, error: Option<String>) {
        if seq < self.health_seq {
            return;
        }
        self.health_seq = seq;
        self.health = if error.is_some() {
            ConnectionHealth::Disconnected
        } else {
            ConnectionHealth::Connected
        };
        self.last_error = error;
    }
}

struct Shared {
    inner: Mutex<Inner>,
    cache: LocalCache,
    events: broadcast::Sender<LedgerEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: LedgerEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn settle(
        &self,
        seq: u64,
        action: &'static str,
        result: &Result<(), RemoteError>,
        policy: SyncPolicy,
    ) {
        let rolls_back = policy.rolls_back();
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            match result {
                Ok(()) => inner.record_outcome(seq, None),
                Err(e) => {
                    if let SyncPolicy::RollbackOnFailure(undo) = policy {
                        undo.apply(&mut inner.state);
                    }
                    inner.record_outcome(seq, Some(e.to_string()));
                }
            }
        }

        match result {
            Ok(()) => {
                tracing::debug!(action, seq, "remote command settled");
                self.emit(LedgerEvent::Changed);
            }
            Err(e) => {
                tracing::warn!(action, seq, rolled_back = rolls_back, error = %e, "sync failed");
                self.emit(LedgerEvent::Changed);
                let alert = if action == "save_setting" {
                    format!(
                        "Saved on this device, but syncing to the server failed: {}",
                        e
                    )
                } else {
                    format!("Error: {}", e)
                };
                self.emit(LedgerEvent::Alert(alert));
            }
        }
    }
}

/// The single owner of [`AppState`]. Cloning gives another handle to the
/// same state.
pub struct Ledger<R> {
    remote: Arc<R>,
    shared: Arc<Shared>,
}

impl<R> Clone for Ledger<R> {
    fn clone(&self) -> Self {
        Ledger {
            remote: Arc::clone(&self.remote),
            shared: Arc::clone(&self.shared),
        }
    }
}

fn register_supplier(state: &mut AppState, supplier: Option<&str>) {
    if let Some(s) = supplier {
        state.suppliers.insert(s);
    }
}

fn register_transaction(state: &mut AppState, t: &Transaction) {
    register_supplier(state, t.supplier.as_deref());
    if let Some(unit) = t.unit.as_deref() {
        state.units.insert(unit);
    }
}

/// Fill the picker lists from the values loaded records already use.
fn seed_suggestions(state: &mut AppState) {
    let AppState {
        transactions,
        materials,
        suppliers,
        material_names,
        units,
        ..
    } = state;
    for t in transactions.iter() {
        if let Some(s) = t.supplier.as_deref() {
            suppliers.insert(s);
        }
        if let Some(u) = t.unit.as_deref() {
            units.insert(u);
        }
    }
    for m in materials.iter() {
        material_names.insert(&m.name);
        units.insert(&m.unit);
        if let Some(s) = m.supplier.as_deref() {
            suppliers.insert(s);
        }
    }
}

type SavedSuggestions = Vec<(SuggestionKind, Vec<String>)>;

/// Suggestions added on this device, as stored in the cache.
fn saved_suggestions(cache: &LocalCache) -> SavedSuggestions {
    SuggestionKind::ALL
        .into_iter()
        .filter_map(|kind| match cache.get_list(suggestion_key(kind)) {
            Ok(items) => Some((kind, items)),
            Err(e) => {
                tracing::warn!(list = kind.label(), error = %e, "could not read saved suggestions");
                None
            }
        })
        .collect()
}

fn merge_suggestions(state: &mut AppState, saved: &SavedSuggestions) {
    for (kind, items) in saved {
        let list = kind.of_mut(state);
        for v in items {
            list.insert(v);
        }
    }
}

impl<R: RemoteStore> Ledger<R> {
    /// Start with default state, showing the cached background image and
    /// the suggestions saved on this device.
    pub fn new(remote: Arc<R>, cache: LocalCache) -> Self {
        let mut state = AppState::default();
        match cache.get(KEY_BACKGROUND_IMAGE) {
            Ok(Some(bg)) => state.background_image = bg,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "could not read cached background image"),
        }
        merge_suggestions(&mut state, &saved_suggestions(&cache));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ledger {
            remote,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    health: ConnectionHealth::Connected,
                    last_error: None,
                    admin_logged_in: false,
                    login_error: None,
                    in_flight: 0,
                    loading: false,
                    next_seq: 0,
                    health_seq: 0,
                    snapshot_seq: 0,
                }),
                cache,
                events,
            }),
        }
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn cache(&self) -> &LocalCache {
        &self.shared.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.shared.events.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> AppState {
        self.shared.lock().state.clone()
    }

    /// Read the state in place without copying it.
    pub fn with_state<T>(&self, f: impl FnOnce(&AppState) -> T) -> T {
        f(&self.shared.lock().state)
    }

    pub fn health(&self) -> ConnectionHealth {
        self.shared.lock().health
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    /// Whether any remote write is still in flight.
    pub fn is_syncing(&self) -> bool {
        self.shared.lock().in_flight > 0
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    pub fn is_admin_logged_in(&self) -> bool {
        self.shared.lock().admin_logged_in
    }

    pub fn login_error(&self) -> Option<String> {
        self.shared.lock().login_error.clone()
    }

    pub fn background_image(&self) -> String {
        self.shared.lock().state.background_image.clone()
    }

    fn dispatch(&self, command: Command, policy: SyncPolicy) -> PendingSync {
        let seq = {
            let mut inner = self.shared.lock();
            inner.in_flight += 1;
            inner.stamp()
        };
        let action = command.action();
        tracing::debug!(action, seq, "dispatching");
        let remote = Arc::clone(&self.remote);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let result = remote.send(command).await.map(drop);
            shared.settle(seq, action, &result, policy);
            result
        });
        PendingSync { handle }
    }

    // ---- transactions ----

    /// Record a new transaction at the head of the list.
    pub fn add_transaction(&self, draft: NewTransaction) -> (Transaction, PendingSync) {
        let record = draft.into_transaction(new_record_id());
        {
            let mut inner = self.shared.lock();
            register_transaction(&mut inner.state, &record);
            inner.state.transactions.insert(0, record.clone());
        }
        tracing::info!(id = %record.id, amount = record.amount, kind = record.kind.label(), "transaction added");
        self.shared.emit(LedgerEvent::Changed);
        let sync = self.dispatch(
            Command::SaveTransaction(record.clone()),
            SyncPolicy::KeepOnFailure,
        );
        (record, sync)
    }

    /// Replace every field of the transaction with the same id.
    pub fn update_transaction(&self, record: Transaction) -> Result<PendingSync, LedgerError> {
        {
            let mut inner = self.shared.lock();
            let slot = inner
                .state
                .transactions
                .iter_mut()
                .find(|t| t.id == record.id)
                .ok_or_else(|| LedgerError::UnknownTransaction(record.id.clone()))?;
            *slot = record.clone();
            register_transaction(&mut inner.state, &record);
        }
        tracing::info!(id = %record.id, amount = record.amount, "transaction updated");
        self.shared.emit(LedgerEvent::Changed);
        Ok(self.dispatch(Command::SaveTransaction(record), SyncPolicy::KeepOnFailure))
    }

    pub fn delete_transaction(&self, id: &str) -> Result<PendingSync, LedgerError> {
        let undo = {
            let mut inner = self.shared.lock();
            let index = inner
                .state
                .transactions
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| LedgerError::UnknownTransaction(id.to_string()))?;
            let record = inner.state.transactions.remove(index);
            Undo::Transaction { record, index }
        };
        tracing::info!(id, "transaction deleted");
        self.shared.emit(LedgerEvent::Changed);
        Ok(self.dispatch(
            Command::DeleteTransaction { id: id.to_string() },
            SyncPolicy::RollbackOnFailure(undo),
        ))
    }

    // ---- materials ----

    fn stamp_material(m: &mut Material) {
        m.total_value = material_total_value(m.quantity, m.unit_price);
        m.last_updated = crate::utils::today().to_string();
    }

    fn register_material(state: &mut AppState, m: &Material) {
        state.material_names.insert(&m.name);
        state.units.insert(&m.unit);
        register_supplier(state, m.supplier.as_deref());
    }

    /// Append a material; its total value and date are filled in here.
    pub fn add_material(&self, draft: NewMaterial) -> (Material, PendingSync) {
        let mut record = Material {
            id: new_record_id(),
            name: draft.name,
            unit: draft.unit,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            total_value: 0,
            supplier: draft.supplier,
            last_updated: String::new(),
            image: draft.image,
        };
        Self::stamp_material(&mut record);
        {
            let mut inner = self.shared.lock();
            Self::register_material(&mut inner.state, &record);
            inner.state.materials.push(record.clone());
        }
        tracing::info!(id = %record.id, name = %record.name, total = record.total_value, "material added");
        self.shared.emit(LedgerEvent::Changed);
        let sync = self.dispatch(
            Command::SaveMaterial(record.clone()),
            SyncPolicy::KeepOnFailure,
        );
        (record, sync)
    }

    /// Replace a material. Whatever `total_value` the caller passes is
    /// ignored and recomputed.
    pub fn update_material(&self, mut record: Material) -> Result<PendingSync, LedgerError> {
        Self::stamp_material(&mut record);
        {
            let mut inner = self.shared.lock();
            let slot = inner
                .state
                .materials
                .iter_mut()
                .find(|m| m.id == record.id)
                .ok_or_else(|| LedgerError::UnknownMaterial(record.id.clone()))?;
            *slot = record.clone();
            Self::register_material(&mut inner.state, &record);
        }
        tracing::info!(id = %record.id, total = record.total_value, "material updated");
        self.shared.emit(LedgerEvent::Changed);
        Ok(self.dispatch(Command::SaveMaterial(record), SyncPolicy::KeepOnFailure))
    }

    pub fn delete_material(&self, id: &str) -> Result<PendingSync, LedgerError> {
        let undo = {
            let mut inner = self.shared.lock();
            let index = inner
                .state
                .materials
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| LedgerError::UnknownMaterial(id.to_string()))?;
            let record = inner.state.materials.remove(index);
            Undo::Material { record, index }
        };
        tracing::info!(id, "material deleted");
        self.shared.emit(LedgerEvent::Changed);
        Ok(self.dispatch(
            Command::DeleteMaterial { id: id.to_string() },
            SyncPolicy::RollbackOnFailure(undo),
        ))
    }

    // ---- budget and settings ----

    pub fn update_budget(&self, amount: i64) -> PendingSync {
        self.shared.lock().state.budget = amount;
        tracing::info!(amount, "budget updated");
        self.shared.emit(LedgerEvent::Changed);
        self.dispatch(Command::UpdateBudget { amount }, SyncPolicy::KeepOnFailure)
    }

    /// Check credentials against the loaded admin pair. Exact,
    /// case-sensitive comparison; no attempt counting.
    pub fn admin_login(&self, user: &str, pass: &str) -> bool {
        let ok = {
            let mut inner = self.shared.lock();
            if user == inner.state.admin_user && pass == inner.state.admin_pass {
                inner.admin_logged_in = true;
                inner.login_error = None;
                true
            } else {
                inner.login_error = Some("Wrong admin ID or password".to_string());
                false
            }
        };
        if !ok {
            tracing::info!("admin login rejected");
        }
        self.shared.emit(LedgerEvent::Changed);
        ok
    }

    pub fn admin_logout(&self) {
        self.shared.lock().admin_logged_in = false;
        self.shared.emit(LedgerEvent::Changed);
    }

    /// Show and cache a new background image, then push it to the store.
    ///
    /// The local change always stands, even if the push fails.
    pub fn set_background_image(&self, value: &str) -> Result<PendingSync, LedgerError> {
        let value = value.trim();
        {
            let mut inner = self.shared.lock();
            if !inner.admin_logged_in {
                return Err(LedgerError::AdminRequired);
            }
            if value.is_empty() {
                return Err(LedgerError::EmptyValue("background image"));
            }
            inner.state.background_image = value.to_string();
        }
        if let Err(e) = self.shared.cache.set(KEY_BACKGROUND_IMAGE, value) {
            tracing::warn!(error = %e, "could not cache background image");
        }
        tracing::info!(len = value.len(), "background image set");
        self.shared.emit(LedgerEvent::Changed);
        Ok(self.dispatch(
            Command::SaveSetting {
                key: BACKGROUND_SETTING_KEY.to_string(),
                value: value.to_string(),
            },
            SyncPolicy::KeepOnFailure,
        ))
    }

    // ---- suggestion lists ----

    /// Add a value to one picker list and save it on this device. Returns
    /// whether the list grew; blanks and exact duplicates are ignored.
    pub fn add_suggestion(&self, kind: SuggestionKind, value: &str) -> bool {
        let grew = kind.of_mut(&mut self.shared.lock().state).insert(value);
        if !grew {
            return false;
        }
        self.shared.emit(LedgerEvent::Changed);
        let cache = &self.shared.cache;
        let key = suggestion_key(kind);
        let saved = cache.get_list(key).and_then(|items| {
            let mut list: SuggestionList = items.iter().collect();
            list.insert(value);
            cache.set_list(key, list.as_slice())
        });
        if let Err(e) = saved {
            tracing::warn!(list = kind.label(), error = %e, "could not save suggestion");
        }
        true
    }

    pub fn add_supplier(&self, name: &str) -> bool {
        self.add_suggestion(SuggestionKind::Suppliers, name)
    }

    pub fn add_material_name(&self, name: &str) -> bool {
        self.add_suggestion(SuggestionKind::MaterialNames, name)
    }

    pub fn add_unit(&self, name: &str) -> bool {
        self.add_suggestion(SuggestionKind::Units, name)
    }

    // ---- fetching ----

    /// Fetch everything from the store and replace local data with it.
    ///
    /// `background` refreshes never raise the loading flag.
    pub async fn refresh(&self, background: bool) -> Result<(), RemoteError> {
        let seq = {
            let mut inner = self.shared.lock();
            if !background && inner.state.transactions.is_empty() {
                inner.loading = true;
            }
            inner.last_error = None;
            inner.stamp()
        };
        self.shared.emit(LedgerEvent::Changed);

        match self.remote.get_data().await {
            Ok(snapshot) => {
                self.apply_snapshot(seq, snapshot);
                Ok(())
            }
            Err(e) => {
                {
                    let mut inner = self.shared.lock();
                    inner.loading = false;
                    inner.record_outcome(seq, Some(e.to_string()));
                }
                tracing::warn!(error = %e, "refresh failed");
                self.shared.emit(LedgerEvent::Changed);
                Err(e)
            }
        }
    }

    fn apply_snapshot(&self, seq: u64, snapshot: RemoteSnapshot) {
        let RemoteSnapshot {
            transactions,
            materials,
            budget,
            admin_user,
            admin_pass,
            background_image,
            suppliers,
            material_names,
            units,
        } = snapshot;

        let adopted_background = background_image
            .filter(|bg| bg.chars().count() > MIN_REMOTE_BACKGROUND_LEN);
        let saved = saved_suggestions(&self.shared.cache);
        {
            let mut inner = self.shared.lock();
            inner.loading = false;
            if seq < inner.snapshot_seq {
                tracing::debug!(seq, applied = inner.snapshot_seq, "dropping stale snapshot");
                return;
            }
            inner.snapshot_seq = seq;
            let state = &mut inner.state;
            state.transactions = transactions;
            state.materials = materials;
            state.budget = budget;
            state.admin_user = admin_user
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string());
            state.admin_pass = admin_pass
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_ADMIN_PASS.to_string());
            state.suppliers = suppliers.iter().collect();
            state.material_names = material_names.iter().collect();
            state.units = units.iter().collect();
            seed_suggestions(state);
            merge_suggestions(state, &saved);
            if let Some(bg) = &adopted_background {
                state.background_image = bg.clone();
            }
            tracing::info!(
                transactions = state.transactions.len(),
                materials = state.materials.len(),
                "data refreshed"
            );
            inner.record_outcome(seq, None);
        }
        if let Some(bg) = adopted_background {
            if let Err(e) = self.shared.cache.set(KEY_BACKGROUND_IMAGE, &bg) {
                tracing::warn!(error = %e, "could not cache background image");
            }
        }
        self.shared.emit(LedgerEvent::Changed);
    }

    /// Point the ledger at another store: persist the address, reset local
    /// data (the background image and saved suggestions stay) and fetch from
    /// the new endpoint.
    pub async fn change_endpoint(&self, url: &str) -> Result<(), LedgerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(LedgerError::EmptyValue("endpoint"));
        }
        crate::config::save_endpoint(&self.shared.cache, url)
            .map_err(|e| LedgerError::Cache(e.to_string()))?;
        self.remote.retarget(url);
        let saved = saved_suggestions(&self.shared.cache);
        {
            let mut inner = self.shared.lock();
            let background = std::mem::take(&mut inner.state.background_image);
            inner.state = AppState {
                background_image: background,
                ..AppState::default()
            };
            merge_suggestions(&mut inner.state, &saved);
        }
        tracing::info!(endpoint = url, "endpoint changed");
        self.shared.emit(LedgerEvent::Changed);
        self.refresh(false).await?;
        Ok(())
    }
}
