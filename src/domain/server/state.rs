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

use crate::infrastructure::constants::{AZURE_DNS_ZONE, DNS_LABEL_SUFFIX};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleState {
    Absent,
    Deploying,
    Running,
    Pausing,
    Paused,
    Resuming,
    Stopping,
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Absent => "Absent",
            LifecycleState::Deploying => "Deploying",
            LifecycleState::Running => "Running",
            LifecycleState::Pausing => "Pausing",
            LifecycleState::Paused => "Paused",
            LifecycleState::Resuming => "Resuming",
            LifecycleState::Stopping => "Stopping",
            LifecycleState::Failed => "Failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the cluster reports for one managed Deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadStatus {
    pub name: String,
    pub namespace: String,
    pub replicas_desired: i32,
    pub replicas_ready: i32,
    /// Recovered from the Deployment's labels.
    pub game_id: Option<String>,
    pub package_id: Option<String>,
    pub container_port: Option<u16>,
    /// Mount path of the save volume in the game container.
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub server_id: String,
    pub namespace: String,
    pub lifecycle_state: LifecycleState,
    pub replicas_ready: i32,
    pub replicas_desired: i32,
    pub game_id: Option<String>,
    pub package_id: Option<String>,
    pub connection_host: Option<String>,
    pub connection_port: Option<u16>,
    pub failure: Option<String>,
}

impl ServerStatus {
    pub fn absent(server_id: &str, namespace: &str) -> Self {
        Self {
            server_id: server_id.to_string(),
            namespace: namespace.to_string(),
            lifecycle_state: LifecycleState::Absent,
            replicas_ready: 0,
            replicas_desired: 0,
            game_id: None,
            package_id: None,
            connection_host: None,
            connection_port: None,
            failure: None,
        }
    }

    pub fn from_workload(workload: &WorkloadStatus, region: &str) -> Self {
        Self {
            server_id: workload.name.clone(),
            namespace: workload.namespace.clone(),
            lifecycle_state: derive_state(Some(workload)),
            replicas_ready: workload.replicas_ready,
            replicas_desired: workload.replicas_desired,
            game_id: workload.game_id.clone(),
            package_id: workload.package_id.clone(),
            connection_host: Some(connection_host(&workload.name, region)),
            connection_port: workload.container_port,
            failure: None,
        }
    }
}

/// Cluster-only view of a server's state, before in-flight transitions are
/// overlaid.
pub fn derive_state(workload: Option<&WorkloadStatus>) -> LifecycleState {
    let Some(workload) = workload else {
        return LifecycleState::Absent;
    };

    match workload.replicas_desired {
        0 if workload.replicas_ready > 0 => LifecycleState::Pausing,
        0 => LifecycleState::Paused,
        desired if workload.replicas_ready >= desired => LifecycleState::Running,
        _ => LifecycleState::Deploying,
    }
}

/// Public hostname for a server. Depends only on the id, so it survives every
/// pause/resume/stop/start cycle.
pub fn connection_host(server_id: &str, region: &str) -> String {
    format!(
        "{}{}.{}.{}",
        server_id, DNS_LABEL_SUFFIX, region, AZURE_DNS_ZONE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(desired: i32, ready: i32) -> WorkloadStatus {
        WorkloadStatus {
            name: "mc-001".to_string(),
            namespace: "default".to_string(),
            replicas_desired: desired,
            replicas_ready: ready,
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_state() {
        assert_eq!(derive_state(None), LifecycleState::Absent);
        assert_eq!(derive_state(Some(&workload(0, 0))), LifecycleState::Paused);
        assert_eq!(derive_state(Some(&workload(0, 1))), LifecycleState::Pausing);
        assert_eq!(derive_state(Some(&workload(1, 0))), LifecycleState::Deploying);
        assert_eq!(derive_state(Some(&workload(1, 1))), LifecycleState::Running);
    }

    #[test]
    fn test_connection_host() {
        assert_eq!(
            connection_host("mc-001", "eastus"),
            "mc-001-dns.eastus.cloudapp.azure.com"
        );
    }

    #[test]
    fn test_status_from_workload() {
        let mut w = workload(1, 1);
        w.game_id = Some("minecraft".to_string());
        w.container_port = Some(25565);
        let status = ServerStatus::from_workload(&w, "westeurope");
        assert_eq!(status.lifecycle_state, LifecycleState::Running);
        assert_eq!(
            status.connection_host.as_deref(),
            Some("mc-001-dns.westeurope.cloudapp.azure.com")
        );
        assert_eq!(status.connection_port, Some(25565));
    }
}
