// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::spec::ServerKey;
use super::state::{LifecycleState, ServerStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    InFlight(LifecycleState),
    Failed(String),
}

/// In-process record of transitions the cluster cannot show yet, plus
/// servers a rollback left behind.
#[derive(Debug, Default)]
pub struct ServerLedger {
    entries: Mutex<HashMap<ServerKey, LedgerEntry>>,
}

impl ServerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ServerKey, LedgerEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn begin(&self, key: &ServerKey, state: LifecycleState) {
        self.entries()
            .insert(key.clone(), LedgerEntry::InFlight(state));
    }

    /// Drops an in-flight entry; a Failed marker is left alone.
    pub fn finish(&self, key: &ServerKey) {
        let mut entries = self.entries();
        if matches!(entries.get(key), Some(LedgerEntry::InFlight(_))) {
            entries.remove(key);
        }
    }

    pub fn mark_failed(&self, key: &ServerKey, reason: impl Into<String>) {
        self.entries()
            .insert(key.clone(), LedgerEntry::Failed(reason.into()));
    }

    pub fn clear(&self, key: &ServerKey) {
        self.entries().remove(key);
    }

    pub fn get(&self, key: &ServerKey) -> Option<LedgerEntry> {
        self.entries().get(key).cloned()
    }

    /// Overlays the ledger onto a cluster-derived status. A Failed marker for
    /// a server whose Deployment is gone is stale and gets cleared.
    pub fn reconcile(&self, key: &ServerKey, mut status: ServerStatus) -> ServerStatus {
        let mut entries = self.entries();
        match entries.get(key).cloned() {
            Some(LedgerEntry::InFlight(state)) => {
                status.lifecycle_state = state;
            }
            Some(LedgerEntry::Failed(reason)) => {
                if status.lifecycle_state == LifecycleState::Absent {
                    entries.remove(key);
                } else {
                    status.lifecycle_state = LifecycleState::Failed;
                    status.failure = Some(reason);
                }
            }
            None => {}
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServerKey {
        ServerKey::new("mc-001", "default").unwrap()
    }

    #[test]
    fn test_in_flight_overrides_cluster_state() {
        let ledger = ServerLedger::new();
        ledger.begin(&key(), LifecycleState::Stopping);

        let mut observed = ServerStatus::absent("mc-001", "default");
        observed.lifecycle_state = LifecycleState::Running;
        let status = ledger.reconcile(&key(), observed);
        assert_eq!(status.lifecycle_state, LifecycleState::Stopping);

        ledger.finish(&key());
        assert_eq!(ledger.get(&key()), None);
    }

    #[test]
    fn test_failed_marker_survives_finish() {
        let ledger = ServerLedger::new();
        ledger.begin(&key(), LifecycleState::Deploying);
        ledger.mark_failed(&key(), "rollback failed");
        ledger.finish(&key());

        let mut observed = ServerStatus::absent("mc-001", "default");
        observed.lifecycle_state = LifecycleState::Deploying;
        let status = ledger.reconcile(&key(), observed);
        assert_eq!(status.lifecycle_state, LifecycleState::Failed);
        assert_eq!(status.failure.as_deref(), Some("rollback failed"));
    }

    #[test]
    fn test_stale_failed_marker_is_cleared() {
        let ledger = ServerLedger::new();
        ledger.mark_failed(&key(), "rollback failed");

        let status = ledger.reconcile(&key(), ServerStatus::absent("mc-001", "default"));
        assert_eq!(status.lifecycle_state, LifecycleState::Absent);
        assert_eq!(ledger.get(&key()), None);
    }
}
