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

use super::labels::LabeledResourceBuilder;
use crate::domain::server::ServerDeploymentSpec;
use crate::infrastructure::constants::*;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    AzureFileVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, PodSpec,
    PodTemplateSpec, ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

pub struct DeploymentBuilder<'a> {
    spec: &'a ServerDeploymentSpec,
}

impl LabeledResourceBuilder for DeploymentBuilder<'_> {
    fn spec(&self) -> &ServerDeploymentSpec {
        self.spec
    }
}

impl<'a> DeploymentBuilder<'a> {
    pub fn new(spec: &'a ServerDeploymentSpec) -> Self {
        Self { spec }
    }

    pub fn build(&self) -> Deployment {
        let mut node_selector = BTreeMap::new();
        node_selector.insert(
            NODE_SELECTOR_KEY.to_string(),
            NODE_SELECTOR_VALUE.to_string(),
        );

        Deployment {
            metadata: ObjectMeta {
                name: Some(self.spec.server_id.clone()),
                namespace: Some(self.spec.namespace.clone()),
                labels: Some(self.get_labels()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(self.spec.replica_count),
                selector: LabelSelector {
                    match_labels: Some(self.get_selector_labels()),
                    ..Default::default()
                },
                // Two pods must never write the same world at once.
                strategy: Some(DeploymentStrategy {
                    type_: Some(STRATEGY_TYPE_RECREATE.to_string()),
                    ..Default::default()
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(self.get_selector_labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        init_containers: Some(vec![self.build_restore_container()]),
                        containers: vec![self.build_game_container()],
                        node_selector: Some(node_selector),
                        volumes: Some(vec![self.build_volume()]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_game_container(&self) -> Container {
        let package = &self.spec.resource_package;

        let mut quota = BTreeMap::new();
        quota.insert("cpu".to_string(), Quantity(package.cpu_quantity()));
        quota.insert("memory".to_string(), Quantity(package.memory_quantity()));

        Container {
            name: self.spec.server_id.clone(),
            image: Some(package.image_reference.clone()),
            ports: Some(vec![ContainerPort {
                container_port: i32::from(package.container_port),
                protocol: Some(PROTOCOL_TCP.to_string()),
                ..Default::default()
            }]),
            env: Some(self.build_env_vars()),
            resources: Some(ResourceRequirements {
                requests: Some(quota.clone()),
                limits: Some(quota),
                ..Default::default()
            }),
            volume_mounts: Some(vec![self.build_volume_mount()]),
            ..Default::default()
        }
    }

    fn build_env_vars(&self) -> Vec<EnvVar> {
        self.spec
            .resource_package
            .environment_variables
            .iter()
            .map(|(name, value)| EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            })
            .collect()
    }

    /// Holds the pod until save data has been written into the volume. A pod
    /// nobody restores fails here and stays in Init; the game must never boot
    /// on an empty data dir.
    fn build_restore_container(&self) -> Container {
        let script = concat!(
            "i=0; ",
            "until [ -f \"$1/$2\" ]; do ",
            "if [ \"$i\" -ge \"$3\" ]; then echo \"no restore after $3s\" >&2; exit 1; fi; ",
            "sleep 1; i=$((i+1)); done; ",
            "rm -f \"$1/$2\""
        );

        Container {
            name: INIT_CONTAINER_NAME_RESTORE.to_string(),
            image: Some(INIT_CONTAINER_IMAGE.to_string()),
            command: Some(vec!["sh".to_string(), "-c".to_string()]),
            args: Some(vec![
                script.to_string(),
                INIT_CONTAINER_NAME_RESTORE.to_string(),
                self.spec.data_dir().to_string(),
                RESTORE_MARKER_FILE.to_string(),
                RESTORE_WAIT_SECONDS.to_string(),
            ]),
            volume_mounts: Some(vec![self.build_volume_mount()]),
            ..Default::default()
        }
    }

    fn build_volume(&self) -> Volume {
        match &self.spec.volume {
            Some(volume) => Volume {
                name: VOLUME_NAME_SAVE_DATA.to_string(),
                azure_file: Some(AzureFileVolumeSource {
                    secret_name: volume.secret_name.clone(),
                    share_name: volume.share_name.clone(),
                    read_only: Some(false),
                }),
                ..Default::default()
            },
            None => Volume {
                name: VOLUME_NAME_SAVE_DATA.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        }
    }

    fn build_volume_mount(&self) -> VolumeMount {
        VolumeMount {
            name: VOLUME_NAME_SAVE_DATA.to_string(),
            mount_path: self.spec.data_dir().to_string(),
            ..Default::default()
        }
    }
}

pub fn build_deployment(spec: &ServerDeploymentSpec) -> Deployment {
    DeploymentBuilder::new(spec).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PackageCatalog;
    use crate::domain::server::{ServerKey, VolumeRef};

    fn spec(volume: Option<VolumeRef>) -> ServerDeploymentSpec {
        let key = ServerKey::new("mc-001", "default").unwrap();
        let package = PackageCatalog::new().resolve("minecraft", "standard").unwrap();
        ServerDeploymentSpec::new(&key, package, volume).unwrap()
    }

    #[test]
    fn test_game_container() {
        let deployment = build_deployment(&spec(None));
        let pod = deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert_eq!(pod.containers.len(), 1);

        let container = &pod.containers[0];
        assert_eq!(container.name, "mc-001");
        assert_eq!(
            container.image.as_deref(),
            Some("gameregistry.azurecr.io/minecraft-server:latest")
        );

        let ports = container.ports.as_ref().unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].container_port, 25565);

        let resources = container.resources.as_ref().unwrap();
        assert_eq!(resources.requests, resources.limits);
        let limits = resources.limits.as_ref().unwrap();
        assert_eq!(limits["cpu"], Quantity("2000m".to_string()));
        assert_eq!(limits["memory"], Quantity("6144Mi".to_string()));

        let env: Vec<&str> = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(env, vec!["EULA", "TYPE", "MEMORY", "MAX_PLAYERS"]);
    }

    #[test]
    fn test_pod_placement_and_strategy() {
        let deployment = build_deployment(&spec(None));
        let dspec = deployment.spec.as_ref().unwrap();
        assert_eq!(dspec.replicas, Some(1));
        assert_eq!(
            dspec.strategy.as_ref().unwrap().type_.as_deref(),
            Some("Recreate")
        );

        let pod_labels = dspec.template.metadata.as_ref().unwrap().labels.as_ref().unwrap();
        assert_eq!(dspec.selector.match_labels.as_ref(), Some(pod_labels));
        assert_eq!(pod_labels.len(), 1);
        assert_eq!(pod_labels["app"], "mc-001");

        let labels = deployment.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[LABEL_GAME], "minecraft");
        assert_eq!(labels[LABEL_PACKAGE], "standard");

        let pod = dspec.template.spec.as_ref().unwrap();
        assert_eq!(
            pod.node_selector.as_ref().unwrap()["workload"],
            "gameserver"
        );
    }

    #[test]
    fn test_scratch_volume_without_share() {
        let deployment = build_deployment(&spec(None));
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        assert!(volumes[0].empty_dir.is_some());
        assert!(volumes[0].azure_file.is_none());

        let mounts = pod.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, volumes[0].name);
        assert_eq!(mounts[0].mount_path, "/data");
    }

    #[test]
    fn test_azure_file_volume() {
        let volume = VolumeRef {
            share_name: "mc-001-share".to_string(),
            mount_path: "/data".to_string(),
            secret_name: "azure-file-secret".to_string(),
        };
        let deployment = build_deployment(&spec(Some(volume)));
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let volumes = pod.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        let share = volumes[0].azure_file.as_ref().unwrap();
        assert_eq!(share.share_name, "mc-001-share");
        assert_eq!(share.secret_name, "azure-file-secret");
    }

    #[test]
    fn test_restore_init_container_shares_volume() {
        let deployment = build_deployment(&spec(None));
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let init = pod.init_containers.unwrap();
        assert_eq!(init.len(), 1);
        assert_eq!(init[0].name, INIT_CONTAINER_NAME_RESTORE);

        let args = init[0].args.as_ref().unwrap();
        assert_eq!(args[2], "/data");
        assert_eq!(args[3], RESTORE_MARKER_FILE);
        assert_eq!(args[4], RESTORE_WAIT_SECONDS.to_string());
        assert_eq!(
            init[0].volume_mounts.as_ref().unwrap()[0].mount_path,
            "/data"
        );
    }

    #[test]
    fn test_restore_wait_fails_instead_of_booting_empty() {
        let deployment = build_deployment(&spec(None));
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let init = pod.init_containers.unwrap();
        let script = &init[0].args.as_ref().unwrap()[0];

        let (wait, release) = script.split_once("done;").unwrap();
        assert!(wait.contains("exit 1"));
        assert!(!release.contains("exit 0"));
        assert!(release.contains("rm -f"));
    }
}
