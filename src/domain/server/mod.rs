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

//! Server identity, deployment spec and lifecycle state

pub mod ledger;
pub mod spec;
pub mod state;

pub use self::ledger::{LedgerEntry, ServerLedger};
pub use self::spec::{validate_dns_label, SaveLayout, ServerDeploymentSpec, ServerKey, VolumeRef};
pub use self::state::{
    connection_host, derive_state, LifecycleState, ServerStatus, WorkloadStatus,
};
