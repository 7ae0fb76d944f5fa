// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod common;

use common::{ScriptedRemote, ledger, run_pending, site_snapshot};
use rust_decimal::Decimal;
use serde_json::json;
use rusqlite::Connection;
use sitebook::cache::{KEY_BACKGROUND_IMAGE, KEY_ENDPOINT, LocalCache};
use sitebook::ledger::{ConnectionHealth, Ledger, LedgerError, LedgerEvent};
use sitebook::models::{DEFAULT_BACKGROUND, NewMaterial, NewTransaction, TransactionKind};
use sitebook::remote::Command;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::broadcast;

fn cement_purchase() -> NewTransaction {
    NewTransaction {
        date: "2024-03-10".into(),
        amount: 150000,
        kind: TransactionKind::Expense,
        category: "Vật liệu".into(),
        description: "Cement top-up".into(),
        quantity: Some(Decimal::from(10)),
        unit: Some("Bao".into()),
        unit_price: Some(15000),
        image: None,
        supplier: Some("Acme".into()),
        is_paid: Some(false),
    }
}

fn alerts(rx: &mut broadcast::Receiver<LedgerEvent>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if let LedgerEvent::Alert(msg) = ev {
            out.push(msg);
        }
    }
    out
}

#[tokio::test]
async fn refresh_replaces_state_with_snapshot() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();

    let state = ledger.snapshot();
    assert_eq!(state.budget, 500_000_000);
    assert_eq!(state.transactions.len(), 3);
    assert_eq!(state.transactions[1].amount, 12_000_000);
    assert_eq!(state.transactions[1].quantity, Some(Decimal::from(80)));
    assert_eq!(state.materials[0].total_value, 11_400_000);
    assert_eq!(state.suppliers.as_slice(), ["Hà Tiên", "Hòa Phát"]);
    assert_eq!(state.admin_user, "chief");
    assert_eq!(ledger.health(), ConnectionHealth::Connected);
    assert!(!ledger.is_loading());
}

#[tokio::test]
async fn refresh_without_admin_pair_falls_back_to_defaults() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(json!({ "status": "ok", "transactions": null, "adminUser": "" }));
    ledger.refresh(false).await.unwrap();

    let state = ledger.snapshot();
    assert!(state.transactions.is_empty());
    assert_eq!(state.admin_user, "admin");
    assert_eq!(state.admin_pass, "Voi123");
}

#[tokio::test]
async fn refresh_loads_good_rows_around_unreadable_ones() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(json!({
        "status": "ok",
        "budget": 1000,
        "transactions": [
            { "id": "t1", "date": "2024-03-01", "amount": 400, "type": "INCOME",
              "category": "Khác", "description": "Deposit" },
            { "id": "t2", "date": "2024-03-02", "amount": 50, "type": "",
              "category": "Khác", "description": "Untyped" }
        ]
    }));
    ledger.refresh(false).await.unwrap();

    let state = ledger.snapshot();
    assert_eq!(state.budget, 1000);
    assert_eq!(state.transactions.len(), 1);
    assert_eq!(state.transactions[0].id, "t1");
    assert_eq!(ledger.health(), ConnectionHealth::Connected);
}

#[tokio::test]
async fn refresh_fills_suggestions_from_records() {
    let (ledger, remote) = ledger();
    let mut snap = site_snapshot();
    for key in ["suppliers", "materialNames", "units"] {
        snap.as_object_mut().unwrap().remove(key);
    }
    snap["materials"][0]["supplier"] = json!("Hòa Phát");
    remote.set_snapshot(snap);
    ledger.refresh(false).await.unwrap();

    let state = ledger.snapshot();
    assert_eq!(state.suppliers.as_slice(), ["Hà Tiên", "Hòa Phát"]);
    assert_eq!(state.units.as_slice(), ["Bao", "Cây"]);
    assert_eq!(state.material_names.as_slice(), ["Thép D10"]);
}

#[tokio::test]
async fn background_starts_at_default_without_cache() {
    let (ledger, _remote) = ledger();
    assert_eq!(ledger.background_image(), DEFAULT_BACKGROUND);
}

#[tokio::test]
async fn failed_refresh_marks_disconnected_and_keeps_state() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();

    remote.set_failing(true);
    let err = ledger.refresh(true).await.unwrap_err();
    assert!(err.to_string().contains("offline"));
    assert_eq!(ledger.health(), ConnectionHealth::Disconnected);
    assert_eq!(ledger.last_error().as_deref(), Some("connection failed: offline"));
    assert_eq!(ledger.snapshot().transactions.len(), 3);
    assert!(!ledger.is_loading());
}

#[tokio::test]
async fn loading_flag_only_for_foreground_refresh_of_empty_state() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    remote.hold();

    let l = ledger.clone();
    let bg = tokio::spawn(async move { l.refresh(true).await });
    run_pending().await;
    assert!(!ledger.is_loading());
    remote.release(0);
    bg.await.unwrap().unwrap();

    // Now there is data, so even a foreground refresh stays quiet.
    let l = ledger.clone();
    let fg = tokio::spawn(async move { l.refresh(false).await });
    run_pending().await;
    assert!(!ledger.is_loading());
    remote.release(1);
    fg.await.unwrap().unwrap();

    let (empty, remote) = common::ledger();
    remote.hold();
    let l = empty.clone();
    let first = tokio::spawn(async move { l.refresh(false).await });
    run_pending().await;
    assert!(empty.is_loading());
    remote.release(0);
    first.await.unwrap().unwrap();
    assert!(!empty.is_loading());
}

#[tokio::test]
async fn added_transaction_is_visible_before_the_store_answers() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    remote.hold();

    let (record, sync) = ledger.add_transaction(cement_purchase());
    let state = ledger.snapshot();
    assert_eq!(state.transactions[0].id, record.id);
    assert_eq!(state.transactions.len(), 4);
    run_pending().await;
    assert!(ledger.is_syncing());

    remote.release(0);
    sync.settled().await.unwrap();
    assert!(!ledger.is_syncing());
    assert_eq!(ledger.health(), ConnectionHealth::Connected);
    assert_eq!(remote.actions(), ["get_data", "save_transaction"]);
    match &remote.calls()[1] {
        Command::SaveTransaction(t) => assert_eq!(t, &record),
        other => panic!("unexpected command {:?}", other),
    }
}

#[tokio::test]
async fn added_transaction_registers_supplier_and_unit() {
    let (ledger, _remote) = ledger();
    let (_record, sync) = ledger.add_transaction(cement_purchase());
    sync.settled().await.unwrap();

    let state = ledger.snapshot();
    assert!(state.suppliers.contains("Acme"));
    assert!(state.units.contains("Bao"));
}

#[tokio::test]
async fn income_never_carries_paid_status() {
    let (ledger, _remote) = ledger();
    let mut draft = cement_purchase();
    draft.kind = TransactionKind::Income;
    let (record, sync) = ledger.add_transaction(draft);
    sync.settled().await.unwrap();
    assert_eq!(record.is_paid, None);
}

#[tokio::test]
async fn failed_create_keeps_the_record() {
    let (ledger, remote) = ledger();
    let mut events = ledger.subscribe();
    remote.set_failing(true);

    let (record, sync) = ledger.add_transaction(cement_purchase());
    assert!(sync.settled().await.is_err());

    assert_eq!(ledger.snapshot().transactions[0].id, record.id);
    assert_eq!(ledger.health(), ConnectionHealth::Disconnected);
    assert_eq!(alerts(&mut events), ["Error: connection failed: offline"]);
}

#[tokio::test]
async fn failed_update_keeps_the_edit() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    remote.set_failing(true);

    let mut t3 = ledger.snapshot().transaction("t3").cloned().unwrap();
    t3.amount = 9_000_000;
    let sync = ledger.update_transaction(t3).unwrap();
    assert!(sync.settled().await.is_err());

    let state = ledger.snapshot();
    assert_eq!(state.transaction("t3").unwrap().amount, 9_000_000);
    assert_eq!(ledger.health(), ConnectionHealth::Disconnected);
    assert!(ledger.last_error().is_some());
}

#[tokio::test]
async fn failed_delete_puts_the_record_back_in_place() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    let before = ledger.snapshot().transactions;
    let mut events = ledger.subscribe();
    remote.set_failing(true);

    let sync = ledger.delete_transaction("t2").unwrap();
    assert!(ledger.snapshot().transaction("t2").is_none());
    assert!(sync.settled().await.is_err());

    assert_eq!(ledger.snapshot().transactions, before);
    assert_eq!(ledger.health(), ConnectionHealth::Disconnected);
    assert_eq!(alerts(&mut events).len(), 1);
}

#[tokio::test]
async fn successful_delete_stays_deleted() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();

    let sync = ledger.delete_transaction("t2").unwrap();
    sync.settled().await.unwrap();
    assert!(ledger.snapshot().transaction("t2").is_none());
    assert_eq!(
        remote.calls().last(),
        Some(&Command::DeleteTransaction { id: "t2".into() })
    );
}

#[tokio::test]
async fn unknown_ids_are_rejected_without_a_remote_call() {
    let (ledger, remote) = ledger();
    assert_eq!(
        ledger.delete_transaction("nope").err(),
        Some(LedgerError::UnknownTransaction("nope".into()))
    );
    assert!(matches!(
        ledger.delete_material("nope"),
        Err(LedgerError::UnknownMaterial(_))
    ));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn materials_get_value_and_date_from_the_ledger() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();

    let (record, sync) = ledger.add_material(NewMaterial {
        name: "Cát vàng".into(),
        unit: "Khối".into(),
        quantity: Decimal::new(25, 1),
        unit_price: 1000,
        supplier: Some("Acme".into()),
        image: None,
    });
    sync.settled().await.unwrap();

    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    assert_eq!(record.total_value, 2500);
    assert_eq!(record.last_updated, today);
    let state = ledger.snapshot();
    assert_eq!(state.materials.last().unwrap().id, record.id);
    assert!(state.material_names.contains("Cát vàng"));
    assert!(state.units.contains("Khối"));

    let mut edited = record.clone();
    edited.quantity = Decimal::from(3);
    edited.total_value = 1;
    ledger.update_material(edited).unwrap().settled().await.unwrap();
    assert_eq!(ledger.snapshot().material(&record.id).unwrap().total_value, 3000);
}

#[tokio::test]
async fn failed_material_delete_rolls_back() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    remote.set_failing(true);

    let sync = ledger.delete_material("m1").unwrap();
    assert!(ledger.snapshot().materials.is_empty());
    assert!(sync.settled().await.is_err());
    assert_eq!(ledger.snapshot().materials[0].id, "m1");
}

#[tokio::test]
async fn budget_update_applies_locally_first() {
    let (ledger, remote) = ledger();
    remote.hold();
    let sync = ledger.update_budget(750_000_000);
    assert_eq!(ledger.snapshot().budget, 750_000_000);
    run_pending().await;
    remote.release(0);
    sync.settled().await.unwrap();
    assert_eq!(
        remote.calls(),
        [Command::UpdateBudget {
            amount: 750_000_000
        }]
    );
}

#[tokio::test]
async fn short_remote_background_is_ignored() {
    let cache = LocalCache::in_memory().unwrap();
    cache.set(KEY_BACKGROUND_IMAGE, "https://cdn.example/site.jpg").unwrap();
    let remote = common::ScriptedRemote::new();
    let ledger = Ledger::new(Arc::clone(&remote), cache);
    assert_eq!(ledger.background_image(), "https://cdn.example/site.jpg");

    remote.set_snapshot(json!({ "status": "ok", "backgroundImage": "x.png" }));
    ledger.refresh(false).await.unwrap();
    assert_eq!(ledger.background_image(), "https://cdn.example/site.jpg");

    let long = format!("https://cdn.example/{}.jpg", "a".repeat(30));
    remote.set_snapshot(json!({ "status": "ok", "backgroundImage": long }));
    ledger.refresh(false).await.unwrap();
    assert_eq!(ledger.background_image(), long);
    assert_eq!(
        ledger.cache().get(KEY_BACKGROUND_IMAGE).unwrap().as_deref(),
        Some(long.as_str())
    );
}

#[tokio::test]
async fn admin_login_is_exact_and_case_sensitive() {
    let (ledger, remote) = ledger();
    assert!(!ledger.admin_login("Admin", "Voi123"));
    assert!(!ledger.is_admin_logged_in());
    assert!(ledger.login_error().is_some());

    assert!(ledger.admin_login("admin", "Voi123"));
    assert!(ledger.is_admin_logged_in());
    assert!(ledger.login_error().is_none());
    ledger.admin_logout();
    assert!(!ledger.is_admin_logged_in());

    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    assert!(!ledger.admin_login("admin", "Voi123"));
    assert!(ledger.admin_login("chief", "s3cret"));
}

#[tokio::test]
async fn background_change_needs_admin() {
    let (ledger, remote) = ledger();
    assert_eq!(
        ledger.set_background_image("https://cdn.example/a.jpg").err(),
        Some(LedgerError::AdminRequired)
    );
    assert!(remote.calls().is_empty());
    assert_eq!(ledger.background_image(), "");
}

#[tokio::test]
async fn background_change_survives_a_failed_push() {
    let (ledger, remote) = ledger();
    let mut events = ledger.subscribe();
    assert!(ledger.admin_login("admin", "Voi123"));
    remote.set_failing(true);

    let sync = ledger.set_background_image("https://cdn.example/new-site.jpg").unwrap();
    assert!(sync.settled().await.is_err());

    assert_eq!(ledger.background_image(), "https://cdn.example/new-site.jpg");
    assert_eq!(
        ledger.cache().get(KEY_BACKGROUND_IMAGE).unwrap().as_deref(),
        Some("https://cdn.example/new-site.jpg")
    );
    let msgs = alerts(&mut events);
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].starts_with("Saved on this device"));
    assert_eq!(
        remote.calls(),
        [Command::SaveSetting {
            key: "background_image".into(),
            value: "https://cdn.example/new-site.jpg".into()
        }]
    );
}

#[tokio::test]
async fn suggestion_lists_dedupe_exact_strings() {
    let (ledger, remote) = ledger();
    assert!(ledger.add_supplier("Acme"));
    assert!(!ledger.add_supplier("Acme"));
    assert!(!ledger.add_supplier("  Acme "));
    assert!(ledger.add_supplier("acme"));
    assert!(!ledger.add_supplier("   "));
    assert!(ledger.add_unit("m³"));
    assert!(ledger.add_material_name("Gạch ống"));

    let state = ledger.snapshot();
    assert_eq!(state.suppliers.as_slice(), ["Acme", "acme"]);
    assert_eq!(state.units.len(), 1);
    assert_eq!(state.material_names.len(), 1);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn added_suggestions_survive_restart_and_refresh() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");
    {
        let cache = LocalCache::new(Connection::open(&path).unwrap()).unwrap();
        let ledger = Ledger::new(ScriptedRemote::new(), cache);
        assert!(ledger.add_supplier("Acme"));
        assert!(ledger.add_unit("m³"));
    }

    let remote = ScriptedRemote::new();
    let cache = LocalCache::new(Connection::open(&path).unwrap()).unwrap();
    let ledger = Ledger::new(Arc::clone(&remote), cache);
    let state = ledger.snapshot();
    assert_eq!(state.suppliers.as_slice(), ["Acme"]);
    assert_eq!(state.units.as_slice(), ["m³"]);

    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    let state = ledger.snapshot();
    assert_eq!(state.suppliers.as_slice(), ["Hà Tiên", "Hòa Phát", "Acme"]);
    assert_eq!(state.units.as_slice(), ["Bao", "Cây", "m³"]);
}

#[tokio::test]
async fn stale_snapshot_does_not_overwrite_newer_one() {
    let (ledger, remote) = ledger();
    remote.hold();
    remote.set_snapshot(json!({ "status": "ok", "budget": 1 }));
    let l = ledger.clone();
    let older = tokio::spawn(async move { l.refresh(true).await });
    run_pending().await;

    remote.set_snapshot(json!({ "status": "ok", "budget": 2 }));
    let l = ledger.clone();
    let newer = tokio::spawn(async move { l.refresh(true).await });
    run_pending().await;
    assert_eq!(remote.parked(), 2);

    remote.release(1);
    newer.await.unwrap().unwrap();
    assert_eq!(ledger.snapshot().budget, 2);

    remote.release(0);
    older.await.unwrap().unwrap();
    assert_eq!(ledger.snapshot().budget, 2);
}

#[tokio::test]
async fn late_failure_does_not_override_newer_success() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    remote.hold();

    remote.set_failing(true);
    let delete = ledger.delete_transaction("t3").unwrap();
    run_pending().await;

    remote.set_failing(false);
    let l = ledger.clone();
    let refresh = tokio::spawn(async move { l.refresh(true).await });
    run_pending().await;

    remote.release(1);
    refresh.await.unwrap().unwrap();
    assert_eq!(ledger.health(), ConnectionHealth::Connected);

    remote.release(0);
    assert!(delete.settled().await.is_err());
    // Health follows the newest outcome; the record still comes back.
    assert_eq!(ledger.health(), ConnectionHealth::Connected);
    assert_eq!(ledger.snapshot().transactions.len(), 3);
}

#[tokio::test]
async fn rollback_skips_record_a_refresh_already_restored() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    remote.hold();

    remote.set_failing(true);
    let delete = ledger.delete_transaction("t1").unwrap();
    run_pending().await;

    remote.set_failing(false);
    let l = ledger.clone();
    let refresh = tokio::spawn(async move { l.refresh(true).await });
    run_pending().await;
    remote.release(1);
    refresh.await.unwrap().unwrap();

    remote.release(0);
    assert!(delete.settled().await.is_err());
    let ids: Vec<String> = ledger
        .snapshot()
        .transactions
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, ["t1", "t2", "t3"]);
}

#[tokio::test]
async fn changing_endpoint_resets_and_reloads() {
    let (ledger, remote) = ledger();
    remote.set_snapshot(site_snapshot());
    ledger.refresh(false).await.unwrap();
    assert!(ledger.admin_login("chief", "s3cret"));
    ledger
        .set_background_image("https://cdn.example/keep-me.jpg")
        .unwrap()
        .settled()
        .await
        .unwrap();

    remote.set_snapshot(json!({ "status": "ok", "budget": 42 }));
    ledger
        .change_endpoint(" https://script.example/new/exec ")
        .await
        .unwrap();

    let state = ledger.snapshot();
    assert_eq!(state.budget, 42);
    assert!(state.transactions.is_empty());
    assert!(state.suppliers.is_empty());
    assert_eq!(state.background_image, "https://cdn.example/keep-me.jpg");
    assert_eq!(remote.endpoints(), ["https://script.example/new/exec"]);
    assert_eq!(
        ledger.cache().get(KEY_ENDPOINT).unwrap().as_deref(),
        Some("https://script.example/new/exec")
    );
}

#[tokio::test]
async fn empty_endpoint_is_rejected() {
    let (ledger, remote) = ledger();
    assert_eq!(
        ledger.change_endpoint("   ").await.err(),
        Some(LedgerError::EmptyValue("endpoint"))
    );
    assert!(remote.endpoints().is_empty());
}
