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

use gameserver_kube::domain::catalog::PackageCatalog;
use gameserver_kube::domain::server::{ServerDeploymentSpec, ServerKey, VolumeRef};
use gameserver_kube::infrastructure::kubernetes::resources::{
    build_deployment, build_service, render_yaml,
};
use gameserver_kube::infrastructure::kubernetes::workload_from_deployment;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

fn spec(game: &str, package: &str, volume: Option<VolumeRef>) -> ServerDeploymentSpec {
    let key = ServerKey::new("mc-001", "default").unwrap();
    let package = PackageCatalog::new().resolve(game, package).unwrap();
    ServerDeploymentSpec::new(&key, package, volume).unwrap()
}

fn share() -> VolumeRef {
    VolumeRef {
        share_name: "mc-001-share".to_string(),
        mount_path: "/data".to_string(),
        secret_name: "azure-file-secret".to_string(),
    }
}

#[test]
fn test_minecraft_standard_manifests() {
    let spec = spec("minecraft", "standard", Some(share()));
    let deployment = build_deployment(&spec);
    let service = build_service(&spec, "MC_games_aks_eastus");

    let pod = deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
    let container = &pod.containers[0];
    assert_eq!(
        container.image.as_deref(),
        Some("gameregistry.azurecr.io/minecraft-server:latest")
    );
    let resources = container.resources.as_ref().unwrap();
    assert_eq!(resources.requests, resources.limits);
    let requests = resources.requests.as_ref().unwrap();
    assert_eq!(requests["cpu"].0, "2000m");
    assert_eq!(requests["memory"].0, "6144Mi");

    let volume = &pod.volumes.as_ref().unwrap()[0];
    let azure = volume.azure_file.as_ref().unwrap();
    assert_eq!(azure.share_name, "mc-001-share");
    assert_eq!(azure.secret_name, "azure-file-secret");

    let service_spec = service.spec.as_ref().unwrap();
    assert_eq!(service_spec.type_.as_deref(), Some("LoadBalancer"));
    let port = &service_spec.ports.as_ref().unwrap()[0];
    assert_eq!(port.port, 25565);
    assert_eq!(port.target_port, Some(IntOrString::Int(25565)));
    assert_eq!(
        service_spec.selector,
        deployment.spec.as_ref().unwrap().template.metadata.as_ref().unwrap().labels
    );

    let annotations = service.metadata.annotations.as_ref().unwrap();
    assert_eq!(
        annotations["service.beta.kubernetes.io/azure-dns-label-name"],
        "mc-001-dns"
    );
    assert_eq!(
        annotations["service.beta.kubernetes.io/azure-load-balancer-resource-group"],
        "MC_games_aks_eastus"
    );
}

#[test]
fn test_workload_round_trips_labels_and_data_dir() {
    let spec = spec("terraria", "standard", None);
    let workload = workload_from_deployment(&build_deployment(&spec));

    assert_eq!(workload.name, "mc-001");
    assert_eq!(workload.namespace, "default");
    assert_eq!(workload.game_id.as_deref(), Some("terraria"));
    assert_eq!(workload.package_id.as_deref(), Some("standard"));
    assert_eq!(workload.container_port, Some(7777));
    assert_eq!(
        workload.data_dir.as_deref(),
        Some("/root/.local/share/Terraria/Worlds")
    );
    assert_eq!(workload.replicas_desired, 1);
    assert_eq!(workload.replicas_ready, 0);
}

#[test]
fn test_render_yaml_is_deterministic() {
    let spec = spec("minecraft", "premium", Some(share()));

    let first = render_yaml(&spec, "MC_games_aks_eastus").unwrap();
    let second = render_yaml(&spec, "MC_games_aks_eastus").unwrap();
    assert_eq!(first, second);

    let documents: Vec<_> = first.split("---\n").collect();
    assert_eq!(documents.len(), 2);
    assert!(documents[0].contains("kind: Deployment"));
    assert!(documents[0].contains("8192Mi"));
    assert!(documents[1].contains("kind: Service"));
    assert!(documents[1].contains("mc-001-pip"));
}

#[test]
fn test_invalid_volume_is_rejected() {
    let key = ServerKey::new("mc-001", "default").unwrap();
    let package = PackageCatalog::new().resolve("minecraft", "basic").unwrap();
    let mut volume = share();
    volume.mount_path = "data".to_string();
    assert!(ServerDeploymentSpec::new(&key, package, Some(volume)).is_err());
}
