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

use crate::domain::catalog::ResourcePackage;
use crate::infrastructure::constants::{
    CONFIG_DIR_NAME, MAX_DNS_LABEL_LEN, STORE_ROOT_PREFIX, WORLD_ARCHIVE_NAME,
};
use crate::shared::error::{GameServerError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const DNS_LABEL_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

static DNS_LABEL_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

/// Reference to a pre-existing Azure file share mounted as the save volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRef {
    pub share_name: String,
    pub mount_path: String,
    /// Secret holding the storage account name/key for the share.
    pub secret_name: String,
}

/// Identity of one server: the Kubernetes object name within a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerKey {
    pub namespace: String,
    pub server_id: String,
}

impl ServerKey {
    /// Validates both parts as DNS-1123 labels.
    pub fn new(server_id: impl Into<String>, namespace: impl Into<String>) -> Result<Self> {
        let key = Self {
            namespace: namespace.into(),
            server_id: server_id.into(),
        };
        validate_dns_label("server_id", &key.server_id)?;
        validate_dns_label("namespace", &key.namespace)?;
        Ok(key)
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.server_id)
    }
}

/// The resolved, ready-to-apply description of one game server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDeploymentSpec {
    pub server_id: String,
    pub namespace: String,
    pub resource_package: ResourcePackage,
    pub replica_count: i32,
    pub volume: Option<VolumeRef>,
}

impl ServerDeploymentSpec {
    pub fn new(
        key: &ServerKey,
        resource_package: ResourcePackage,
        volume: Option<VolumeRef>,
    ) -> Result<Self> {
        let spec = Self {
            server_id: key.server_id.clone(),
            namespace: key.namespace.clone(),
            resource_package,
            replica_count: 1,
            volume,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_replicas(mut self, replicas: i32) -> Result<Self> {
        self.replica_count = replicas;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        validate_dns_label("server_id", &self.server_id)?;
        validate_dns_label("namespace", &self.namespace)?;

        if !(0..=1).contains(&self.replica_count) {
            return Err(GameServerError::validation(format!(
                "replica_count must be 0 or 1, got {}",
                self.replica_count
            )));
        }

        let package = &self.resource_package;
        if package.cpu_millicores == 0 || package.memory_mib == 0 {
            return Err(GameServerError::validation(format!(
                "package '{}' must have positive cpu and memory",
                package.package_id
            )));
        }
        if package.container_port == 0 {
            return Err(GameServerError::validation(format!(
                "package '{}' has no container port",
                package.package_id
            )));
        }

        if let Some(volume) = &self.volume {
            if volume.share_name.is_empty() || volume.secret_name.is_empty() {
                return Err(GameServerError::validation(
                    "volume requires both share_name and secret_name",
                ));
            }
            if !volume.mount_path.starts_with('/') {
                return Err(GameServerError::validation(format!(
                    "volume mount_path must be absolute: {}",
                    volume.mount_path
                )));
            }
        }

        Ok(())
    }

    /// Directory that holds save data inside the pod.
    pub fn data_dir(&self) -> &str {
        self.volume
            .as_ref()
            .map(|v| v.mount_path.as_str())
            .unwrap_or(&self.resource_package.data_path)
    }
}

pub fn validate_dns_label(field: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > MAX_DNS_LABEL_LEN {
        return Err(GameServerError::validation(format!(
            "{} must be 1-{} characters: '{}'",
            field, MAX_DNS_LABEL_LEN, value
        )));
    }

    let re = DNS_LABEL_RE
        .get_or_init(|| Regex::new(DNS_LABEL_PATTERN))
        .as_ref()
        .map_err(|e| GameServerError::validation(format!("invalid label pattern: {}", e)))?;
    if !re.is_match(value) {
        return Err(GameServerError::validation(format!(
            "{} must contain only lowercase letters, digits and hyphens, \
             and start and end with a letter or digit: '{}'",
            field, value
        )));
    }
    Ok(())
}

/// Object-store keys for one server's save data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveLayout<'a> {
    server_id: &'a str,
}

impl<'a> SaveLayout<'a> {
    pub fn new(server_id: &'a str) -> Self {
        Self { server_id }
    }

    /// `servers/{server_id}/`
    pub fn prefix(&self) -> String {
        format!("{}/{}/", STORE_ROOT_PREFIX, self.server_id)
    }

    pub fn world_key(&self) -> String {
        format!("{}{}", self.prefix(), WORLD_ARCHIVE_NAME)
    }

    pub fn config_prefix(&self) -> String {
        format!("{}{}/", self.prefix(), CONFIG_DIR_NAME)
    }

    pub fn config_key(&self, relative_path: &str) -> String {
        format!("{}{}", self.config_prefix(), relative_path)
    }

    /// Maps a stored config key back to its path relative to the data dir.
    pub fn config_relative_path<'k>(&self, key: &'k str) -> Option<&'k str> {
        let prefix = self.config_prefix();
        key.strip_prefix(prefix.as_str())
            .filter(|rest| !rest.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PackageCatalog;

    #[test]
    fn test_dns_label_validation() {
        for ok in ["mc-001", "a", "server1", "x-y-z", &"a".repeat(63)] {
            assert!(validate_dns_label("server_id", ok).is_ok(), "{}", ok);
        }
        for bad in [
            "",
            "-mc",
            "mc-",
            "MC-001",
            "mc_001",
            "mc.001",
            "mc 001",
            &"a".repeat(64),
        ] {
            assert!(validate_dns_label("server_id", bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_spec_rejects_extra_replicas() {
        let key = ServerKey::new("mc-001", "default").unwrap();
        let package = PackageCatalog::new().resolve("minecraft", "standard").unwrap();
        let spec = ServerDeploymentSpec::new(&key, package, None).unwrap();
        assert_eq!(spec.replica_count, 1);
        assert!(spec.clone().with_replicas(0).is_ok());
        assert!(spec.with_replicas(2).is_err());
    }

    #[test]
    fn test_data_dir_prefers_volume_mount() {
        let key = ServerKey::new("mc-001", "default").unwrap();
        let package = PackageCatalog::new().resolve("minecraft", "standard").unwrap();
        let spec = ServerDeploymentSpec::new(&key, package.clone(), None).unwrap();
        assert_eq!(spec.data_dir(), "/data");

        let volume = VolumeRef {
            share_name: "mc-001-share".to_string(),
            mount_path: "/mnt/world".to_string(),
            secret_name: "azure-file-secret".to_string(),
        };
        let spec = ServerDeploymentSpec::new(&key, package, Some(volume)).unwrap();
        assert_eq!(spec.data_dir(), "/mnt/world");
    }

    #[test]
    fn test_save_layout_keys() {
        let layout = SaveLayout::new("mc-001");
        assert_eq!(layout.prefix(), "servers/mc-001/");
        assert_eq!(layout.world_key(), "servers/mc-001/world.tar");
        assert_eq!(
            layout.config_key("server.properties"),
            "servers/mc-001/config/server.properties"
        );
        assert_eq!(
            layout.config_relative_path("servers/mc-001/config/plugins/a.yml"),
            Some("plugins/a.yml")
        );
        assert_eq!(layout.config_relative_path("servers/mc-001/world.tar"), None);
    }
}
