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
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// LoadBalancer Service bound to a static public IP and DNS label derived
/// from the server id.
pub struct ServiceBuilder<'a> {
    spec: &'a ServerDeploymentSpec,
    node_resource_group: &'a str,
}

impl LabeledResourceBuilder for ServiceBuilder<'_> {
    fn spec(&self) -> &ServerDeploymentSpec {
        self.spec
    }
}

impl<'a> ServiceBuilder<'a> {
    pub fn new(spec: &'a ServerDeploymentSpec, node_resource_group: &'a str) -> Self {
        Self {
            spec,
            node_resource_group,
        }
    }

    pub fn build(&self) -> Service {
        let port = i32::from(self.spec.resource_package.container_port);

        Service {
            metadata: ObjectMeta {
                name: Some(self.spec.server_id.clone()),
                namespace: Some(self.spec.namespace.clone()),
                labels: Some(self.get_labels()),
                annotations: Some(self.build_annotations()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(SERVICE_TYPE_LOAD_BALANCER.to_string()),
                selector: Some(self.get_selector_labels()),
                ports: Some(vec![ServicePort {
                    name: Some(SERVICE_PORT_NAME.to_string()),
                    port,
                    target_port: Some(IntOrString::Int(port)),
                    protocol: Some(PROTOCOL_TCP.to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn build_annotations(&self) -> BTreeMap<String, String> {
        let id = &self.spec.server_id;
        let mut annotations = BTreeMap::new();
        annotations.insert(
            ANNOTATION_LB_RESOURCE_GROUP.to_string(),
            self.node_resource_group.to_string(),
        );
        annotations.insert(
            ANNOTATION_PIP_NAME.to_string(),
            format!("{}{}", id, PIP_NAME_SUFFIX),
        );
        annotations.insert(
            ANNOTATION_DNS_LABEL.to_string(),
            format!("{}{}", id, DNS_LABEL_SUFFIX),
        );
        annotations.insert(
            ANNOTATION_IP_ALLOCATION.to_string(),
            IP_ALLOCATION_STATIC.to_string(),
        );
        annotations
    }
}

pub fn build_service(spec: &ServerDeploymentSpec, node_resource_group: &str) -> Service {
    ServiceBuilder::new(spec, node_resource_group).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PackageCatalog;
    use crate::domain::server::ServerKey;
    use crate::infrastructure::kubernetes::resources::build_deployment;

    fn spec() -> ServerDeploymentSpec {
        let key = ServerKey::new("mc-001", "default").unwrap();
        let package = PackageCatalog::new().resolve("minecraft", "standard").unwrap();
        ServerDeploymentSpec::new(&key, package, None).unwrap()
    }

    #[test]
    fn test_service_ports_and_type() {
        let service = build_service(&spec(), "MC_rg");
        assert_eq!(service.metadata.name.as_deref(), Some("mc-001"));

        let svc = service.spec.unwrap();
        assert_eq!(svc.type_.as_deref(), Some("LoadBalancer"));
        let ports = svc.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 25565);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(25565)));
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    }

    #[test]
    fn test_static_ip_annotations() {
        let service = build_service(&spec(), "MC_GameServerRG_GameServerClusterProd_eastus");
        let annotations = service.metadata.annotations.unwrap();
        assert_eq!(annotations.len(), 4);
        assert_eq!(annotations[ANNOTATION_PIP_NAME], "mc-001-pip");
        assert_eq!(annotations[ANNOTATION_DNS_LABEL], "mc-001-dns");
        assert_eq!(annotations[ANNOTATION_IP_ALLOCATION], "static");
        assert_eq!(
            annotations[ANNOTATION_LB_RESOURCE_GROUP],
            "MC_GameServerRG_GameServerClusterProd_eastus"
        );
    }

    #[test]
    fn test_selector_matches_pod_labels() {
        let spec = spec();
        let service = build_service(&spec, "MC_rg");
        let deployment = build_deployment(&spec);
        let pod_labels = deployment
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap();
        assert_eq!(service.spec.unwrap().selector.unwrap(), pod_labels);
    }
}
