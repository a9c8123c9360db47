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

//! Manifest builders for the Deployment and Service of one game server

pub mod deployment;
pub mod labels;
pub mod service;

pub use self::deployment::{build_deployment, DeploymentBuilder};
pub use self::labels::{managed_by_selector, LabeledResourceBuilder};
pub use self::service::{build_service, ServiceBuilder};

use crate::domain::server::ServerDeploymentSpec;
use crate::shared::error::Result;

/// Multi-document YAML for a dry run: Deployment, then Service.
pub fn render_yaml(spec: &ServerDeploymentSpec, node_resource_group: &str) -> Result<String> {
    let deployment = build_deployment(spec);
    let service = build_service(spec, node_resource_group);

    let mut out = serde_yaml::to_string(&deployment)?;
    out.push_str("---\n");
    out.push_str(&serde_yaml::to_string(&service)?);
    Ok(out)
}
