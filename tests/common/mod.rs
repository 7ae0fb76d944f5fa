// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

use serde_json::{Value, json};
use sitebook::cache::LocalCache;
use sitebook::ledger::Ledger;
use sitebook::remote::{Command, RemoteError, RemoteStore};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// In-process store: records every command and answers from a script.
///
/// While held, every call parks until the test releases it by position, so
/// a test can look at the ledger mid-flight and pick the order calls finish.
pub struct ScriptedRemote {
    calls: Mutex<Vec<Command>>,
    endpoints: Mutex<Vec<String>>,
    snapshot: Mutex<Value>,
    failing: AtomicBool,
    held: AtomicBool,
    gates: Mutex<Vec<Arc<Semaphore>>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptedRemote {
            calls: Mutex::new(Vec::new()),
            endpoints: Mutex::new(Vec::new()),
            snapshot: Mutex::new(json!({ "status": "ok" })),
            failing: AtomicBool::new(false),
            held: AtomicBool::new(false),
            gates: Mutex::new(Vec::new()),
        })
    }

    pub fn set_snapshot(&self, v: Value) {
        *self.snapshot.lock().unwrap() = v;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Let the `n`th parked call (0-based) finish.
    pub fn release(&self, n: usize) {
        self.gates.lock().unwrap()[n].add_permits(1);
    }

    pub fn release_all(&self) {
        self.held.store(false, Ordering::SeqCst);
        for gate in self.gates.lock().unwrap().iter() {
            gate.add_permits(1);
        }
    }

    pub fn parked(&self) -> usize {
        self.gates.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.calls().iter().map(Command::action).collect()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }
}

impl RemoteStore for ScriptedRemote {
    fn send(&self, command: Command) -> impl Future<Output = Result<Value, RemoteError>> + Send {
        let reply = match &command {
            Command::GetData {} => self.snapshot.lock().unwrap().clone(),
            _ => json!({ "status": "ok" }),
        };
        self.calls.lock().unwrap().push(command);
        let failing = self.failing.load(Ordering::SeqCst);
        let gate = self.held.load(Ordering::SeqCst).then(|| {
            let gate = Arc::new(Semaphore::new(0));
            self.gates.lock().unwrap().push(Arc::clone(&gate));
            gate
        });
        async move {
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            if failing {
                Err(RemoteError::NetworkUnreachable(
                    "connection failed: offline".to_string(),
                ))
            } else {
                Ok(reply)
            }
        }
    }

    fn retarget(&self, endpoint: &str) {
        self.endpoints.lock().unwrap().push(endpoint.to_string());
    }
}

/// Let spawned sync tasks run until they finish or park.
pub async fn run_pending() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn ledger() -> (Ledger<ScriptedRemote>, Arc<ScriptedRemote>) {
    let remote = ScriptedRemote::new();
    let cache = LocalCache::in_memory().unwrap();
    (Ledger::new(Arc::clone(&remote), cache), remote)
}

pub fn site_snapshot() -> Value {
    json!({
        "status": "ok",
        "budget": "500000000",
        "adminUser": "chief",
        "adminPass": "s3cret",
        "transactions": [
            {
                "id": "t1",
                "date": "2024-03-01",
                "amount": 100000000,
                "type": "INCOME",
                "category": "Khác",
                "description": "Owner deposit"
            },
            {
                "id": "t2",
                "date": "2024-03-05T00:00:00.000Z",
                "amount": "12000000",
                "type": "EXPENSE",
                "category": "Vật liệu",
                "description": "Cement",
                "quantity": "80",
                "unit": "Bao",
                "unitPrice": 150000,
                "supplier": "Hà Tiên",
                "isPaid": false
            },
            {
                "id": "t3",
                "date": "2024-03-04",
                "amount": 8000000,
                "type": "EXPENSE",
                "category": "Nhân công",
                "description": "Masons week 1",
                "isPaid": true
            }
        ],
        "materials": [
            {
                "id": "m1",
                "name": "Thép D10",
                "unit": "Cây",
                "quantity": 120,
                "unitPrice": 95000,
                "totalValue": 11400000,
                "lastUpdated": "2024-03-02"
            }
        ],
        "suppliers": ["Hà Tiên", "Hòa Phát"],
        "materialNames": ["Thép D10", "Xi măng"],
        "units": ["Bao", "Cây"]
    })
}
