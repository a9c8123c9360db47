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

//! Kubernetes access: credentials, gateway, manifests and save transport

pub mod archiver;
pub mod client;
pub mod credentials;
pub mod resources;

pub use self::archiver::{PodExecArchiver, SaveArchiver, SaveBundle, SaveTarget};
pub use self::client::{workload_from_deployment, ClusterGateway, KubeGateway, ResourceKind};
pub use self::credentials::{
    AccessToken, ClientProvider, CredentialSource, ManagedIdentityTokenProvider, TokenCache,
    TokenProvider,
};
