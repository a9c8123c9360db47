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

use super::credentials::ClientProvider;
use super::resources::managed_by_selector;
use crate::domain::server::WorkloadStatus;
use crate::infrastructure::constants::{
    FIELD_MANAGER, LABEL_GAME, LABEL_PACKAGE, VOLUME_NAME_SAVE_DATA,
};
use crate::shared::error::{GameServerError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Deployment,
    Service,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Deployment => f.write_str("Deployment"),
            ResourceKind::Service => f.write_str("Service"),
        }
    }
}

/// The cluster operations lifecycle orchestration needs. Every failure is
/// reported as `ClusterUnavailable`.
#[async_trait::async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Create or replace by name and namespace, last writer wins.
    async fn apply_deployment(&self, deployment: &Deployment) -> Result<()>;

    async fn apply_service(&self, service: &Service) -> Result<()>;

    /// A missing object counts as deleted.
    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<()>;

    async fn scale(&self, name: &str, namespace: &str, replicas: i32) -> Result<()>;

    /// `None` when the Deployment does not exist.
    async fn get_status(&self, name: &str, namespace: &str) -> Result<Option<WorkloadStatus>>;

    /// Every Deployment in the namespace managed by this tool.
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadStatus>>;

    async fn list_namespaces(&self) -> Result<Vec<String>>;
}

pub struct KubeGateway {
    clients: Arc<ClientProvider>,
}

impl KubeGateway {
    pub fn new(clients: Arc<ClientProvider>) -> Self {
        Self { clients }
    }

    async fn client(&self) -> Result<Client> {
        self.clients.client().await
    }
}

fn api_error(action: &str, kind: ResourceKind, name: &str, e: kube::Error) -> GameServerError {
    GameServerError::cluster(format!("Failed to {} {} '{}': {}", action, kind, name, e))
}

/// Reads the lifecycle-relevant fields off a managed Deployment.
pub fn workload_from_deployment(deployment: &Deployment) -> WorkloadStatus {
    let labels = deployment.metadata.labels.as_ref();
    let label = |key: &str| labels.and_then(|l| l.get(key)).cloned();

    let spec = deployment.spec.as_ref();
    let game_container = spec
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.containers.first());
    let container_port = game_container
        .and_then(|c| c.ports.as_ref())
        .and_then(|ports| ports.first())
        .and_then(|p| u16::try_from(p.container_port).ok());
    let data_dir = game_container
        .and_then(|c| c.volume_mounts.as_ref())
        .and_then(|mounts| mounts.iter().find(|m| m.name == VOLUME_NAME_SAVE_DATA))
        .map(|m| m.mount_path.clone());

    WorkloadStatus {
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        replicas_desired: spec.and_then(|s| s.replicas).unwrap_or(1),
        replicas_ready: deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        game_id: label(LABEL_GAME),
        package_id: label(LABEL_PACKAGE),
        container_port,
        data_dir,
    }
}

#[async_trait::async_trait]
impl ClusterGateway for KubeGateway {
    async fn apply_deployment(&self, deployment: &Deployment) -> Result<()> {
        let kind = ResourceKind::Deployment;
        let name = deployment
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| GameServerError::validation("Deployment name is required"))?;
        let namespace = deployment
            .metadata
            .namespace
            .as_ref()
            .ok_or_else(|| GameServerError::validation("Deployment namespace is required"))?;
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);

        match api.get(name).await {
            Ok(_) => {
                let patch_params = PatchParams::apply(FIELD_MANAGER).force();
                let patch = serde_json::to_value(deployment)?;
                api.patch(name, &patch_params, &Patch::Apply(patch))
                    .await
                    .map_err(|e| api_error("patch", kind, name, e))?;
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                api.create(&PostParams::default(), deployment)
                    .await
                    .map_err(|e| api_error("create", kind, name, e))?;
            }
            Err(e) => return Err(api_error("get", kind, name, e)),
        }
        debug!(name = %name, namespace = %namespace, "applied deployment");
        Ok(())
    }

    async fn apply_service(&self, service: &Service) -> Result<()> {
        let kind = ResourceKind::Service;
        let name = service
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| GameServerError::validation("Service name is required"))?;
        let namespace = service
            .metadata
            .namespace
            .as_ref()
            .ok_or_else(|| GameServerError::validation("Service namespace is required"))?;
        let api: Api<Service> = Api::namespaced(self.client().await?, namespace);

        match api.get(name).await {
            Ok(existing) => {
                // clusterIP is immutable once allocated.
                let mut service_to_patch = service.clone();
                if let (Some(existing_spec), Some(new_spec)) =
                    (&existing.spec, service_to_patch.spec.as_mut())
                {
                    new_spec.cluster_ip = existing_spec.cluster_ip.clone();
                    new_spec.cluster_ips = existing_spec.cluster_ips.clone();
                }

                let patch_params = PatchParams::apply(FIELD_MANAGER).force();
                let patch = serde_json::to_value(&service_to_patch)?;
                api.patch(name, &patch_params, &Patch::Apply(patch))
                    .await
                    .map_err(|e| api_error("patch", kind, name, e))?;
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                api.create(&PostParams::default(), service)
                    .await
                    .map_err(|e| api_error("create", kind, name, e))?;
            }
            Err(e) => return Err(api_error("get", kind, name, e)),
        }
        debug!(name = %name, namespace = %namespace, "applied service");
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<()> {
        let client = self.client().await?;
        let dp = DeleteParams::default();

        let result = match kind {
            ResourceKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(client, namespace);
                api.delete(name, &dp).await.map(|_| ())
            }
            ResourceKind::Service => {
                let api: Api<Service> = Api::namespaced(client, namespace);
                api.delete(name, &dp).await.map(|_| ())
            }
        };

        match result {
            Ok(()) => {
                debug!(%kind, name, namespace, "deleted");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(%kind, name, namespace, "already absent");
                Ok(())
            }
            Err(e) => Err(api_error("delete", kind, name, e)),
        }
    }

    async fn scale(&self, name: &str, namespace: &str, replicas: i32) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 404 => {
                    GameServerError::not_found("Deployment", name, namespace)
                }
                e => api_error("scale", ResourceKind::Deployment, name, e),
            })?;
        debug!(name, namespace, replicas, "scaled deployment");
        Ok(())
    }

    async fn get_status(&self, name: &str, namespace: &str) -> Result<Option<WorkloadStatus>> {
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        match api.get(name).await {
            Ok(deployment) => Ok(Some(workload_from_deployment(&deployment))),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(api_error("get", ResourceKind::Deployment, name, e)),
        }
    }

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadStatus>> {
        let api: Api<Deployment> = Api::namespaced(self.client().await?, namespace);
        let lp = ListParams::default().labels(&managed_by_selector());
        let list = api.list(&lp).await.map_err(|e| {
            GameServerError::cluster(format!(
                "Failed to list deployments in '{}': {}",
                namespace, e
            ))
        })?;
        Ok(list.items.iter().map(workload_from_deployment).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client().await?);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| GameServerError::cluster(format!("Failed to list namespaces: {}", e)))?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PackageCatalog;
    use crate::domain::server::{ServerDeploymentSpec, ServerKey};
    use crate::infrastructure::kubernetes::resources::build_deployment;
    use k8s_openapi::api::apps::v1::DeploymentStatus;

    #[test]
    fn test_workload_from_deployment_reads_labels() {
        let key = ServerKey::new("mc-001", "games").unwrap();
        let package = PackageCatalog::new().resolve("minecraft", "basic").unwrap();
        let spec = ServerDeploymentSpec::new(&key, package, None).unwrap();

        let mut deployment = build_deployment(&spec);
        deployment.status = Some(DeploymentStatus {
            ready_replicas: Some(1),
            ..Default::default()
        });

        let workload = workload_from_deployment(&deployment);
        assert_eq!(workload.name, "mc-001");
        assert_eq!(workload.namespace, "games");
        assert_eq!(workload.replicas_desired, 1);
        assert_eq!(workload.replicas_ready, 1);
        assert_eq!(workload.game_id.as_deref(), Some("minecraft"));
        assert_eq!(workload.package_id.as_deref(), Some("basic"));
        assert_eq!(workload.container_port, Some(25565));
        assert_eq!(workload.data_dir.as_deref(), Some("/data"));
    }
}
