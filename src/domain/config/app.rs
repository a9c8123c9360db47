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

//! Service configuration: TOML file overlaid with environment variables

use crate::shared::error::{GameServerError, Result};
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::str::FromStr;

pub const DEFAULT_AAD_SERVER_ID: &str = "6dae42f8-4368-4678-94ff-3960e28e3630";
pub const DEFAULT_NODE_RESOURCE_GROUP: &str = "MC_GameServerRG_GameServerClusterProd_eastus";
pub const DEFAULT_REGION: &str = "eastus";
pub const DEFAULT_STORE_ROOT: &str = "./saves";
pub const DEFAULT_FILE_SHARE_SECRET: &str = "azure-file-secret";

const PRODUCTION: &str = "production";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConf {
    pub environment: String,
    pub cluster: ClusterConf,
    pub network: NetworkConf,
    pub storage: StorageConf,
    pub readiness: ReadinessConf,
    pub logging: LoggingConf,
}

impl Default for AppConf {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            cluster: ClusterConf::default(),
            network: NetworkConf::default(),
            storage: StorageConf::default(),
            readiness: ReadinessConf::default(),
            logging: LoggingConf::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// kubeconfig file, inline content or the ambient default
    Local,
    /// managed-identity token against an explicit API server
    Managed,
}

impl FromStr for ClusterMode {
    type Err = GameServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ClusterMode::Local),
            "managed" => Ok(ClusterMode::Managed),
            _ => Err(GameServerError::config_error(format!(
                "Invalid cluster mode: {} (expected local or managed)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConf {
    /// Unset means: managed in production, local otherwise.
    pub mode: Option<ClusterMode>,
    pub kubeconfig: Option<String>,
    pub kubeconfig_content: Option<String>,
    pub context: Option<String>,
    pub api_server_url: Option<String>,
    pub ca_certificate: Option<String>,
    pub aad_server_id: String,
    pub managed_identity_client_id: Option<String>,
    pub token_refresh_margin_secs: u64,
}

impl Default for ClusterConf {
    fn default() -> Self {
        Self {
            mode: None,
            kubeconfig: None,
            kubeconfig_content: None,
            context: None,
            api_server_url: None,
            ca_certificate: None,
            aad_server_id: DEFAULT_AAD_SERVER_ID.to_string(),
            managed_identity_client_id: None,
            token_refresh_margin_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConf {
    /// Resource group holding the static public IPs (the AKS node group).
    pub node_resource_group: String,
    pub region: String,
}

impl Default for NetworkConf {
    fn default() -> Self {
        Self {
            node_resource_group: DEFAULT_NODE_RESOURCE_GROUP.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    /// Lives only as long as the process; for embedding, not for the CLI.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConf {
    pub backend: StorageBackend,
    pub root: String,
    /// Default secret for `--share-name` volumes.
    pub file_share_secret: String,
}

impl Default for StorageConf {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            root: DEFAULT_STORE_ROOT.to_string(),
            file_share_secret: DEFAULT_FILE_SHARE_SECRET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadinessConf {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ReadinessConf {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConf {
    /// Unset means: debug in development, info in production.
    pub level: Option<String>,
    /// Unset means: pretty in development, json in production.
    pub format: Option<LogFormat>,
}

impl AppConf {
    /// Load configuration from a TOML file
    pub fn from<T: AsRef<str>>(path: T) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|e| {
            GameServerError::config_error(format!(
                "Failed to read config file {}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// File (if any), then process environment, then environment-dependent
    /// defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut conf = match path {
            Some(path) => Self::from(path)?,
            None => Self::default(),
        };
        conf.apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))?;
        conf.resolve_defaults();
        Ok(conf)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = lookup("CLUSTER_MODE") {
            self.cluster.mode = Some(v.parse()?);
        }
        if let Some(v) = lookup("KUBECONFIG_PATH") {
            self.cluster.kubeconfig = Some(v);
        }
        if let Some(v) = lookup("KUBECONFIG_CONTENT") {
            self.cluster.kubeconfig_content = Some(v);
        }
        if let Some(v) = lookup("AKS_CLUSTER_URL") {
            self.cluster.api_server_url = Some(v);
        }
        if let Some(v) = lookup("AKS_CLUSTER_CA_CERT") {
            self.cluster.ca_certificate = Some(v);
        }
        if let Some(v) = lookup("AKS_SERVER_ID") {
            self.cluster.aad_server_id = v;
        }
        if let Some(v) = lookup("AZURE_CLIENT_ID") {
            self.cluster.managed_identity_client_id = Some(v);
        }
        if let Some(v) = lookup("MC_RESOURCE_GROUP") {
            self.network.node_resource_group = v;
        }
        if let Some(v) = lookup("AZURE_REGION") {
            self.network.region = v;
        }
        if let Some(v) = lookup("SAVE_STORE_ROOT") {
            self.storage.root = v;
        }
        Ok(())
    }

    pub fn resolve_defaults(&mut self) {
        let production = self.is_production();
        if self.cluster.mode.is_none() {
            self.cluster.mode = Some(if production {
                ClusterMode::Managed
            } else {
                ClusterMode::Local
            });
        }
        if self.logging.level.is_none() {
            self.logging.level = Some(if production { "info" } else { "debug" }.to_string());
        }
        if self.logging.format.is_none() {
            self.logging.format = Some(if production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            });
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION)
    }

    pub fn cluster_mode(&self) -> ClusterMode {
        self.cluster.mode.unwrap_or(if self.is_production() {
            ClusterMode::Managed
        } else {
            ClusterMode::Local
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_mode() == ClusterMode::Managed {
            let mut missing = Vec::new();
            if self.cluster.api_server_url.is_none() {
                missing.push("cluster.api_server_url (AKS_CLUSTER_URL)");
            }
            if self.cluster.ca_certificate.is_none() {
                missing.push("cluster.ca_certificate (AKS_CLUSTER_CA_CERT)");
            }
            if self.cluster.aad_server_id.is_empty() {
                missing.push("cluster.aad_server_id (AKS_SERVER_ID)");
            }
            if !missing.is_empty() {
                return Err(GameServerError::config_error(format!(
                    "managed cluster mode requires {}",
                    missing.join(", ")
                )));
            }
        }

        if self.network.node_resource_group.is_empty() || self.network.region.is_empty() {
            return Err(GameServerError::config_error(
                "network.node_resource_group and network.region must not be empty",
            ));
        }

        match self.storage.backend {
            StorageBackend::Filesystem if self.storage.root.is_empty() => {
                return Err(GameServerError::config_error(
                    "storage.root must be set for the filesystem backend",
                ));
            }
            // Each CLI invocation is a new process; a pause would lose the world.
            StorageBackend::Memory => {
                return Err(GameServerError::config_error(
                    "storage.backend = \"memory\" does not outlive the process; use \"filesystem\"",
                ));
            }
            StorageBackend::Filesystem => {}
        }

        if self.readiness.poll_interval_secs == 0 {
            return Err(GameServerError::config_error(
                "readiness.poll_interval_secs must be greater than 0",
            ));
        }
        if self.readiness.timeout_secs < self.readiness.poll_interval_secs {
            return Err(GameServerError::config_error(
                "readiness.timeout_secs must be at least poll_interval_secs",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_development_defaults() {
        let mut conf = AppConf::default();
        conf.resolve_defaults();
        assert_eq!(conf.cluster_mode(), ClusterMode::Local);
        assert_eq!(conf.logging.level.as_deref(), Some("debug"));
        assert_eq!(conf.logging.format, Some(LogFormat::Pretty));
        assert_eq!(conf.cluster.token_refresh_margin_secs, 600);
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_production_requires_cluster_settings() {
        let mut conf = AppConf::default();
        conf.apply_env(env(&[("ENVIRONMENT", "production")])).unwrap();
        conf.resolve_defaults();
        assert_eq!(conf.cluster_mode(), ClusterMode::Managed);
        assert_eq!(conf.logging.format, Some(LogFormat::Json));

        let err = conf.validate().unwrap_err();
        assert!(err.to_string().contains("AKS_CLUSTER_URL"));

        conf.apply_env(env(&[
            ("AKS_CLUSTER_URL", "https://aks.example.com:443"),
            ("AKS_CLUSTER_CA_CERT", "LS0tLS1CRUdJTg=="),
        ]))
        .unwrap();
        assert!(conf.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let toml = r#"
            environment = "staging"

            [network]
            region = "westeurope"

            [readiness]
            timeout_secs = 30
        "#;
        let mut conf: AppConf = toml::from_str(toml).unwrap();
        conf.apply_env(env(&[
            ("AZURE_REGION", "northeurope"),
            ("CLUSTER_MODE", "managed"),
        ]))
        .unwrap();
        conf.resolve_defaults();

        assert_eq!(conf.network.region, "northeurope");
        assert_eq!(conf.network.node_resource_group, DEFAULT_NODE_RESOURCE_GROUP);
        assert_eq!(conf.readiness.timeout_secs, 30);
        assert_eq!(conf.readiness.poll_interval_secs, 3);
        assert_eq!(conf.cluster_mode(), ClusterMode::Managed);
    }

    #[test]
    fn test_invalid_cluster_mode() {
        let mut conf = AppConf::default();
        assert!(conf.apply_env(env(&[("CLUSTER_MODE", "remote")])).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gameserver.toml");
        std::fs::write(
            &path,
            "[storage]\nbackend = \"memory\"\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let conf = AppConf::from(path.to_str().unwrap()).unwrap();
        assert_eq!(conf.storage.backend, StorageBackend::Memory);
        assert_eq!(conf.logging.format, Some(LogFormat::Json));
        let err = conf.validate().unwrap_err();
        assert!(err.to_string().contains("memory"));
        assert!(AppConf::from(dir.path().join("missing.toml").to_str().unwrap()).is_err());
    }

    #[test]
    fn test_readiness_bounds() {
        let mut conf = AppConf::default();
        conf.readiness.poll_interval_secs = 10;
        conf.readiness.timeout_secs = 5;
        assert!(conf.validate().is_err());
    }
}
