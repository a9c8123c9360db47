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

//! In-memory doubles for the cluster, the save transport and the store.
//!
//! All three write to one shared event log so tests can assert ordering
//! (save before scale-down, delete after capture).

#![allow(dead_code)]

use async_trait::async_trait;
use gameserver_kube::domain::lifecycle::{Orchestrator, OrchestratorSettings};
use gameserver_kube::domain::server::WorkloadStatus;
use gameserver_kube::infrastructure::kubernetes::{
    workload_from_deployment, ClusterGateway, ResourceKind, SaveArchiver, SaveBundle, SaveTarget,
};
use gameserver_kube::infrastructure::storage::{MemoryStore, ObjectStore};
use gameserver_kube::shared::error::{GameServerError, Result};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REGION: &str = "eastus";
pub const NODE_RESOURCE_GROUP: &str = "MC_games_aks_eastus";

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

type ObjectKey = (String, String);

fn object_key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct FakeCluster {
    deployments: BTreeMap<ObjectKey, Deployment>,
    services: BTreeMap<ObjectKey, Service>,
}

/// Deployments become ready as soon as they are scaled up, unless
/// `never_ready` is set.
#[derive(Default)]
pub struct FakeGateway {
    cluster: Mutex<FakeCluster>,
    events: EventLog,
    pub fail_apply_service: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_scale_down: AtomicBool,
    pub never_ready: AtomicBool,
}

impl FakeGateway {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn deployment_count(&self) -> usize {
        self.cluster.lock().unwrap().deployments.len()
    }

    pub fn service_count(&self) -> usize {
        self.cluster.lock().unwrap().services.len()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.cluster
            .lock()
            .unwrap()
            .services
            .get(&object_key(namespace, name))
            .cloned()
    }

    fn ready_for(&self, replicas: i32) -> i32 {
        if self.never_ready.load(Ordering::SeqCst) {
            0
        } else {
            replicas
        }
    }
}

fn name_and_namespace(meta: &ObjectMeta) -> ObjectKey {
    object_key(
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

fn unavailable(action: &str) -> GameServerError {
    GameServerError::cluster(format!("injected failure: {}", action))
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    async fn apply_deployment(&self, deployment: &Deployment) -> Result<()> {
        let key = name_and_namespace(&deployment.metadata);
        self.events.push(format!("apply Deployment {}", key.1));

        let mut deployment = deployment.clone();
        let replicas = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        deployment.status = Some(DeploymentStatus {
            ready_replicas: Some(self.ready_for(replicas)),
            ..Default::default()
        });
        self.cluster.lock().unwrap().deployments.insert(key, deployment);
        Ok(())
    }

    async fn apply_service(&self, service: &Service) -> Result<()> {
        let key = name_and_namespace(&service.metadata);
        self.events.push(format!("apply Service {}", key.1));
        if self.fail_apply_service.load(Ordering::SeqCst) {
            return Err(unavailable("apply service"));
        }
        self.cluster.lock().unwrap().services.insert(key, service.clone());
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<()> {
        self.events.push(format!("delete {} {}", kind, name));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable("delete"));
        }
        let key = object_key(namespace, name);
        let mut cluster = self.cluster.lock().unwrap();
        match kind {
            ResourceKind::Deployment => {
                cluster.deployments.remove(&key);
            }
            ResourceKind::Service => {
                cluster.services.remove(&key);
            }
        }
        Ok(())
    }

    async fn scale(&self, name: &str, namespace: &str, replicas: i32) -> Result<()> {
        self.events.push(format!("scale {} {}", name, replicas));
        if replicas == 0 && self.fail_scale_down.load(Ordering::SeqCst) {
            return Err(unavailable("scale down"));
        }
        let ready = self.ready_for(replicas);
        let mut cluster = self.cluster.lock().unwrap();
        let deployment = cluster
            .deployments
            .get_mut(&object_key(namespace, name))
            .ok_or_else(|| GameServerError::not_found("Deployment", name, namespace))?;
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(replicas);
        }
        deployment.status = Some(DeploymentStatus {
            ready_replicas: Some(ready),
            ..Default::default()
        });
        Ok(())
    }

    async fn get_status(&self, name: &str, namespace: &str) -> Result<Option<WorkloadStatus>> {
        Ok(self
            .cluster
            .lock()
            .unwrap()
            .deployments
            .get(&object_key(namespace, name))
            .map(workload_from_deployment))
    }

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadStatus>> {
        Ok(self
            .cluster
            .lock()
            .unwrap()
            .deployments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| workload_from_deployment(d))
            .collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(vec!["default".to_string(), "kube-system".to_string()])
    }
}

/// Captures `world:<server_id>` and remembers every restored bundle.
#[derive(Default)]
pub struct FakeArchiver {
    events: EventLog,
    restored: Mutex<Vec<(String, SaveBundle)>>,
    pub fail_capture: AtomicBool,
    /// Milliseconds each restore takes.
    pub restore_delay_ms: AtomicU64,
}

impl FakeArchiver {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn restored(&self) -> Vec<(String, SaveBundle)> {
        self.restored.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaveArchiver for FakeArchiver {
    async fn capture(&self, target: &SaveTarget) -> Result<Vec<u8>> {
        self.events.push(format!("capture {}", target.server_id));
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(unavailable("capture"));
        }
        Ok(format!("world:{}", target.server_id).into_bytes())
    }

    async fn restore(&self, target: &SaveTarget, bundle: &SaveBundle) -> Result<()> {
        self.events.push(format!("restore {}", target.server_id));
        let delay = self.restore_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.restored
            .lock()
            .unwrap()
            .push((target.data_dir.clone(), bundle.clone()));
        Ok(())
    }
}

/// MemoryStore that logs writes and can refuse them.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    events: EventLog,
    pub fail_puts: AtomicBool,
}

impl RecordingStore {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_object(key).await
    }

    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(GameServerError::store("injected failure: put"));
        }
        self.events.push(format!("put {}", key));
        self.inner.put_object(key, data).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_objects(prefix).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.inner.delete_object(key).await
    }
}

pub struct Harness {
    pub events: EventLog,
    pub gateway: Arc<FakeGateway>,
    pub archiver: Arc<FakeArchiver>,
    pub store: Arc<RecordingStore>,
    pub orchestrator: Orchestrator,
}

pub fn harness() -> Harness {
    let events = EventLog::default();
    let gateway = Arc::new(FakeGateway::new(events.clone()));
    let archiver = Arc::new(FakeArchiver::new(events.clone()));
    let store = Arc::new(RecordingStore::new(events.clone()));

    let settings = OrchestratorSettings {
        node_resource_group: NODE_RESOURCE_GROUP.to_string(),
        region: REGION.to_string(),
        poll_interval: Duration::from_millis(5),
        readiness_timeout: Duration::from_millis(100),
    };
    let orchestrator = Orchestrator::new(
        gateway.clone(),
        store.clone(),
        archiver.clone(),
        settings,
    );

    Harness {
        events,
        gateway,
        archiver,
        store,
        orchestrator,
    }
}
