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

//! Sequences start, stop, pause and resume for one game server
//!
//! Each operation takes the server's lock, reads the current state from the
//! cluster, and walks the transition table. Save data always reaches the
//! store before anything is scaled down or deleted, and a failed start is
//! rolled back to nothing (or flagged for an operator when that fails too).

use super::locks::ServerLocks;
use crate::domain::catalog::{PackageCatalog, ResourcePackage};
use crate::domain::config::AppConf;
use crate::domain::server::{
    connection_host, LifecycleState, SaveLayout, ServerDeploymentSpec, ServerKey, ServerLedger,
    ServerStatus, VolumeRef, WorkloadStatus,
};
use crate::infrastructure::kubernetes::resources::{build_deployment, build_service};
use crate::infrastructure::kubernetes::{
    ClusterGateway, ResourceKind, SaveArchiver, SaveBundle, SaveTarget,
};
use crate::infrastructure::storage::ObjectStore;
use crate::shared::error::{ErrorKind, GameServerError, LifecycleError, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub game_id: String,
    pub package_id: String,
    pub server_id: String,
    pub namespace: String,
    pub volume: Option<VolumeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    pub state: LifecycleState,
    pub connection_host: String,
    pub connection_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub state: LifecycleState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub node_resource_group: String,
    pub region: String,
    pub poll_interval: Duration,
    pub readiness_timeout: Duration,
}

impl From<&AppConf> for OrchestratorSettings {
    fn from(conf: &AppConf) -> Self {
        Self {
            node_resource_group: conf.network.node_resource_group.clone(),
            region: conf.network.region.clone(),
            poll_interval: Duration::from_secs(conf.readiness.poll_interval_secs),
            readiness_timeout: Duration::from_secs(conf.readiness.timeout_secs),
        }
    }
}

/// Cheap to clone; clones share locks and the ledger.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    catalog: PackageCatalog,
    gateway: Arc<dyn ClusterGateway>,
    store: Arc<dyn ObjectStore>,
    archiver: Arc<dyn SaveArchiver>,
    settings: OrchestratorSettings,
    locks: ServerLocks,
    ledger: ServerLedger,
}

type LifecycleResult<T> = std::result::Result<T, LifecycleError>;

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ClusterGateway>,
        store: Arc<dyn ObjectStore>,
        archiver: Arc<dyn SaveArchiver>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog: PackageCatalog::new(),
                gateway,
                store,
                archiver,
                settings,
                locks: ServerLocks::new(),
                ledger: ServerLedger::new(),
            }),
        }
    }

    pub async fn start(&self, request: StartRequest) -> LifecycleResult<StartOutcome> {
        let server_id = request.server_id.clone();
        self.spawn(server_id, move |inner| async move { inner.start(request).await })
            .await
    }

    pub async fn stop(&self, server_id: &str, namespace: &str) -> LifecycleResult<TransitionOutcome> {
        let key = parse_key(server_id, namespace)?;
        self.spawn(server_id.to_string(), move |inner| async move {
            inner.stop(key).await
        })
        .await
    }

    pub async fn pause(
        &self,
        server_id: &str,
        namespace: &str,
    ) -> LifecycleResult<TransitionOutcome> {
        let key = parse_key(server_id, namespace)?;
        self.spawn(server_id.to_string(), move |inner| async move {
            inner.pause(key).await
        })
        .await
    }

    pub async fn resume(
        &self,
        server_id: &str,
        namespace: &str,
    ) -> LifecycleResult<TransitionOutcome> {
        let key = parse_key(server_id, namespace)?;
        self.spawn(server_id.to_string(), move |inner| async move {
            inner.resume(key).await
        })
        .await
    }

    pub async fn get_status(&self, server_id: &str, namespace: &str) -> LifecycleResult<ServerStatus> {
        let key = parse_key(server_id, namespace)?;
        self.inner
            .status_of(&key)
            .await
            .map_err(|e| LifecycleError::from_error(server_id, e))
    }

    pub async fn list(&self, namespace: &str) -> LifecycleResult<Vec<ServerStatus>> {
        crate::domain::server::validate_dns_label("namespace", namespace)
            .map_err(|e| LifecycleError::from_error("*", e))?;

        let workloads = self
            .inner
            .gateway
            .list_workloads(namespace)
            .await
            .map_err(|e| LifecycleError::from_error("*", e))?;

        let mut statuses = Vec::with_capacity(workloads.len());
        for workload in &workloads {
            let status = ServerStatus::from_workload(workload, &self.inner.settings.region);
            match ServerKey::new(&workload.name, &workload.namespace) {
                Ok(key) => statuses.push(self.inner.ledger.reconcile(&key, status)),
                Err(_) => statuses.push(status),
            }
        }
        statuses.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        Ok(statuses)
    }

    /// Runs the operation on its own task so a caller that goes away does not
    /// leave a half-applied server behind.
    async fn spawn<T, F, Fut>(&self, server_id: String, op: F) -> LifecycleResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Inner>) -> Fut,
        Fut: Future<Output = LifecycleResult<T>> + Send + 'static,
    {
        let task = tokio::spawn(op(self.inner.clone()));
        match task.await {
            Ok(result) => result,
            Err(e) => Err(LifecycleError::new(
                ErrorKind::Internal,
                server_id,
                format!("lifecycle task aborted: {}", e),
            )),
        }
    }
}

fn parse_key(server_id: &str, namespace: &str) -> LifecycleResult<ServerKey> {
    ServerKey::new(server_id, namespace).map_err(|e| LifecycleError::from_error(server_id, e))
}

fn conflict(key: &ServerKey, action: &str, state: LifecycleState) -> LifecycleError {
    LifecycleError::new(
        ErrorKind::ConflictError,
        &key.server_id,
        format!("cannot {} server in state {}", action, state),
    )
}

impl Inner {
    async fn status_of(&self, key: &ServerKey) -> Result<ServerStatus> {
        let observed = self
            .gateway
            .get_status(&key.server_id, &key.namespace)
            .await?;
        let status = match &observed {
            Some(workload) => ServerStatus::from_workload(workload, &self.settings.region),
            None => ServerStatus::absent(&key.server_id, &key.namespace),
        };
        Ok(self.ledger.reconcile(key, status))
    }

    async fn start(&self, request: StartRequest) -> LifecycleResult<StartOutcome> {
        let server_id = request.server_id.clone();
        let fail = |e: GameServerError| LifecycleError::from_error(&server_id, e);

        let key = ServerKey::new(&request.server_id, &request.namespace).map_err(fail)?;
        let package = self
            .catalog
            .resolve(&request.game_id, &request.package_id)
            .map_err(fail)?;
        let spec = ServerDeploymentSpec::new(&key, package, request.volume).map_err(fail)?;

        let _guard = self.locks.acquire(&key).await;
        let status = self.status_of(&key).await.map_err(fail)?;
        match status.lifecycle_state {
            LifecycleState::Running => return self.already_running(&key, &spec, &status),
            LifecycleState::Absent => {}
            state => return Err(conflict(&key, "start", state)),
        }

        info!(
            server = %key,
            game = %spec.resource_package.game_id,
            package = %spec.resource_package.package_id,
            "starting server"
        );
        self.ledger.begin(&key, LifecycleState::Deploying);
        let result = self.deploy(&key, &spec).await;
        self.ledger.finish(&key);
        result?;

        info!(server = %key, "server running");
        Ok(self.start_outcome(&spec))
    }

    /// A repeated start is a no-op only when it asks for what is deployed.
    fn already_running(
        &self,
        key: &ServerKey,
        spec: &ServerDeploymentSpec,
        status: &ServerStatus,
    ) -> LifecycleResult<StartOutcome> {
        let package = &spec.resource_package;
        let deployed_game = status.game_id.as_deref().unwrap_or("unknown");
        let deployed_package = status.package_id.as_deref().unwrap_or("unknown");
        if deployed_game != package.game_id || deployed_package != package.package_id {
            return Err(LifecycleError::new(
                ErrorKind::ConflictError,
                &key.server_id,
                format!(
                    "server is already running {}/{}, requested {}/{}",
                    deployed_game, deployed_package, package.game_id, package.package_id
                ),
            ));
        }

        info!(server = %key, "start on running server is a no-op");
        Ok(StartOutcome {
            state: LifecycleState::Running,
            connection_host: status
                .connection_host
                .clone()
                .unwrap_or_else(|| connection_host(&key.server_id, &self.settings.region)),
            connection_port: status.connection_port.unwrap_or(package.container_port),
        })
    }

    fn start_outcome(&self, spec: &ServerDeploymentSpec) -> StartOutcome {
        StartOutcome {
            state: LifecycleState::Running,
            connection_host: connection_host(&spec.server_id, &self.settings.region),
            connection_port: spec.resource_package.container_port,
        }
    }

    async fn deploy(&self, key: &ServerKey, spec: &ServerDeploymentSpec) -> LifecycleResult<()> {
        let bundle = self
            .load_bundle(spec)
            .await
            .map_err(|e| LifecycleError::from_error(&key.server_id, e))?;

        if let Err(e) = self.gateway.apply_deployment(&build_deployment(spec)).await {
            return Err(self.rollback(key, &[ResourceKind::Deployment], e).await);
        }
        info!(server = %key, "deployment applied");

        let service = build_service(spec, &self.settings.node_resource_group);
        if let Err(e) = self.gateway.apply_service(&service).await {
            return Err(self
                .rollback(key, &[ResourceKind::Service, ResourceKind::Deployment], e)
                .await);
        }
        info!(server = %key, "service applied");

        let target = save_target(key, spec.data_dir());
        let ready = async {
            self.archiver.restore(&target, &bundle).await?;
            self.wait_for_replicas(key, 1).await
        };
        if let Err(e) = ready.await {
            return Err(self
                .rollback(key, &[ResourceKind::Service, ResourceKind::Deployment], e)
                .await);
        }
        Ok(())
    }

    /// Deletes what a failed start created. When that fails too the server is
    /// marked Failed and left for an operator.
    async fn rollback(
        &self,
        key: &ServerKey,
        kinds: &[ResourceKind],
        cause: GameServerError,
    ) -> LifecycleError {
        warn!(server = %key, error = %cause, "start failed, rolling back");
        let err = LifecycleError::from_error(&key.server_id, cause);

        let mut failures = Vec::new();
        for kind in kinds {
            if let Err(e) = self
                .gateway
                .delete(*kind, &key.server_id, &key.namespace)
                .await
            {
                failures.push(format!("{}: {}", kind, e));
            }
        }

        if failures.is_empty() {
            return err;
        }

        let reason = format!("rollback failed: {}", failures.join("; "));
        error!(server = %key, %reason, "manual intervention required");
        self.ledger.mark_failed(key, &reason);
        let mut err = err.with_intervention();
        err.message = format!("{}; {}", err.message, reason);
        err
    }

    async fn pause(&self, key: ServerKey) -> LifecycleResult<TransitionOutcome> {
        let fail = |e: GameServerError| LifecycleError::from_error(&key.server_id, e);

        let _guard = self.locks.acquire(&key).await;
        let workload = self.require_workload(&key, "pause", &[LifecycleState::Running]).await?;

        info!(server = %key, "pausing server");
        self.ledger.begin(&key, LifecycleState::Pausing);
        let result = async {
            self.snapshot(&key, &workload).await?;
            self.gateway.scale(&key.server_id, &key.namespace, 0).await?;
            self.wait_for_replicas(&key, 0).await
        }
        .await;
        self.ledger.finish(&key);
        result.map_err(fail)?;

        info!(server = %key, "server paused");
        Ok(TransitionOutcome {
            state: LifecycleState::Paused,
        })
    }

    async fn resume(&self, key: ServerKey) -> LifecycleResult<TransitionOutcome> {
        let fail = |e: GameServerError| LifecycleError::from_error(&key.server_id, e);

        let _guard = self.locks.acquire(&key).await;
        let workload = self.require_workload(&key, "resume", &[LifecycleState::Paused]).await?;
        let spec = self.spec_from_workload(&key, &workload).map_err(fail)?;

        info!(server = %key, "resuming server");
        self.ledger.begin(&key, LifecycleState::Resuming);
        let result = self.bring_up(&key, &spec).await;
        self.ledger.finish(&key);
        result?;

        info!(server = %key, "server resumed");
        Ok(TransitionOutcome {
            state: LifecycleState::Running,
        })
    }

    async fn bring_up(&self, key: &ServerKey, spec: &ServerDeploymentSpec) -> LifecycleResult<()> {
        let fail = |e: GameServerError| LifecycleError::from_error(&key.server_id, e);

        // The Service survives a pause; re-applying restores it if someone
        // removed it meanwhile.
        let service = build_service(spec, &self.settings.node_resource_group);
        self.gateway.apply_service(&service).await.map_err(fail)?;
        let bundle = self.load_bundle(spec).await.map_err(fail)?;

        self.gateway
            .scale(&key.server_id, &key.namespace, 1)
            .await
            .map_err(fail)?;

        let target = save_target(key, spec.data_dir());
        let ready = async {
            self.archiver.restore(&target, &bundle).await?;
            self.wait_for_replicas(key, 1).await
        };
        let Err(cause) = ready.await else {
            return Ok(());
        };

        warn!(server = %key, error = %cause, "resume failed, scaling back to zero");
        let err = fail(cause);
        match self.gateway.scale(&key.server_id, &key.namespace, 0).await {
            Ok(()) => Err(err),
            Err(e) => {
                let reason = format!("scale back to zero failed: {}", e);
                error!(server = %key, %reason, "manual intervention required");
                self.ledger.mark_failed(key, &reason);
                Err(err.with_intervention())
            }
        }
    }

    async fn stop(&self, key: ServerKey) -> LifecycleResult<TransitionOutcome> {
        let fail = |e: GameServerError| LifecycleError::from_error(&key.server_id, e);

        let _guard = self.locks.acquire(&key).await;
        let status = self.status_of(&key).await.map_err(fail)?;
        let state = status.lifecycle_state;
        match state {
            LifecycleState::Running
            | LifecycleState::Paused
            | LifecycleState::Pausing
            | LifecycleState::Deploying
            | LifecycleState::Failed => {}
            _ => return Err(conflict(&key, "stop", state)),
        }

        info!(server = %key, from = %state, "stopping server");
        self.ledger.begin(&key, LifecycleState::Stopping);
        let result = async {
            // Paused servers were saved on pause; other states have no game
            // process to capture from.
            if state == LifecycleState::Running {
                let workload = self
                    .gateway
                    .get_status(&key.server_id, &key.namespace)
                    .await?
                    .ok_or_else(|| {
                        GameServerError::not_found("Deployment", &key.server_id, &key.namespace)
                    })?;
                self.snapshot(&key, &workload).await?;
            }
            self.gateway
                .delete(ResourceKind::Service, &key.server_id, &key.namespace)
                .await?;
            self.gateway
                .delete(ResourceKind::Deployment, &key.server_id, &key.namespace)
                .await
        }
        .await;

        match result {
            Ok(()) => {
                self.ledger.clear(&key);
                info!(server = %key, "server stopped");
                Ok(TransitionOutcome {
                    state: LifecycleState::Absent,
                })
            }
            Err(e) => {
                self.ledger.finish(&key);
                Err(fail(e))
            }
        }
    }

    /// Loads the workload and checks it is in one of `allowed`.
    async fn require_workload(
        &self,
        key: &ServerKey,
        action: &str,
        allowed: &[LifecycleState],
    ) -> LifecycleResult<WorkloadStatus> {
        let fail = |e: GameServerError| LifecycleError::from_error(&key.server_id, e);
        let workload = self
            .gateway
            .get_status(&key.server_id, &key.namespace)
            .await
            .map_err(fail)?;

        let status = match &workload {
            Some(w) => ServerStatus::from_workload(w, &self.settings.region),
            None => ServerStatus::absent(&key.server_id, &key.namespace),
        };
        let state = self.ledger.reconcile(key, status).lifecycle_state;

        match workload {
            Some(workload) if allowed.contains(&state) => Ok(workload),
            _ => Err(conflict(key, action, state)),
        }
    }

    fn spec_from_workload(
        &self,
        key: &ServerKey,
        workload: &WorkloadStatus,
    ) -> Result<ServerDeploymentSpec> {
        let (Some(game_id), Some(package_id)) = (&workload.game_id, &workload.package_id) else {
            return Err(GameServerError::validation(format!(
                "deployment '{}' carries no game/package labels",
                key
            )));
        };
        let mut package: ResourcePackage = self.catalog.resolve(game_id, package_id)?;
        if let Some(data_dir) = &workload.data_dir {
            package.data_path = data_dir.clone();
        }
        ServerDeploymentSpec::new(key, package, None)
    }

    /// Captures the world and stores it. Nothing is scaled or deleted unless
    /// this succeeds.
    async fn snapshot(&self, key: &ServerKey, workload: &WorkloadStatus) -> Result<()> {
        let data_dir = match &workload.data_dir {
            Some(dir) => dir.clone(),
            None => self.spec_from_workload(key, workload)?.data_dir().to_string(),
        };
        let target = save_target(key, &data_dir);

        let archive = self.archiver.capture(&target).await?;
        let bytes = archive.len();
        self.store
            .put_object(&SaveLayout::new(&key.server_id).world_key(), archive)
            .await?;
        info!(server = %key, bytes, "world saved");
        Ok(())
    }

    /// Saved data for the server, seeding default config on first start.
    async fn load_bundle(&self, spec: &ServerDeploymentSpec) -> Result<SaveBundle> {
        let layout = SaveLayout::new(&spec.server_id);
        let keys = self.store.list_objects(&layout.prefix()).await?;

        if keys.is_empty() {
            let mut bundle = SaveBundle::default();
            for (path, content) in &spec.resource_package.default_files {
                let data = content.as_bytes().to_vec();
                self.store
                    .put_object(&layout.config_key(path), data.clone())
                    .await?;
                bundle.files.push((path.clone(), data));
            }
            info!(
                server_id = %spec.server_id,
                files = bundle.files.len(),
                "seeded default config"
            );
            return Ok(bundle);
        }

        let world_key = layout.world_key();
        let mut bundle = SaveBundle::default();
        for key in &keys {
            if *key == world_key {
                bundle.archive = self.store.get_object(key).await?;
            } else if let Some(path) = layout.config_relative_path(key) {
                if let Some(data) = self.store.get_object(key).await? {
                    bundle.files.push((path.to_string(), data));
                }
            }
        }
        Ok(bundle)
    }

    /// Polls until the ready count reaches `target` (at least 1 when scaling
    /// up, exactly 0 when draining).
    async fn wait_for_replicas(&self, key: &ServerKey, target: i32) -> Result<()> {
        let deadline = Instant::now() + self.settings.readiness_timeout;
        loop {
            let ready = self
                .gateway
                .get_status(&key.server_id, &key.namespace)
                .await?
                .map(|w| w.replicas_ready)
                .unwrap_or(0);

            let reached = if target == 0 { ready == 0 } else { ready >= target };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(GameServerError::ReadinessTimeout(format!(
                    "{} had {} ready replicas, wanted {}, after {}s",
                    key,
                    ready,
                    target,
                    self.settings.readiness_timeout.as_secs()
                )));
            }
            sleep(self.settings.poll_interval).await;
        }
    }
}

fn save_target(key: &ServerKey, data_dir: &str) -> SaveTarget {
    SaveTarget {
        server_id: key.server_id.clone(),
        namespace: key.namespace.clone(),
        data_dir: data_dir.to_string(),
    }
}
