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

//! External save-data store

pub mod filesystem;
pub mod memory;

pub use self::filesystem::FsStore;
pub use self::memory::MemoryStore;

use crate::domain::config::{StorageBackend, StorageConf};
use crate::shared::error::{GameServerError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Key-value blob store holding world archives and config files.
///
/// Keys are `/`-separated relative paths such as `servers/mc-001/world.tar`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `None` when the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Creates or replaces the object.
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Every key starting with `prefix`, sorted.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// Store for a validated config. `Memory` is only reachable when embedding
/// the orchestrator in one long-lived process.
pub fn build_store(conf: &StorageConf) -> Arc<dyn ObjectStore> {
    match conf.backend {
        StorageBackend::Filesystem => Arc::new(FsStore::new(&conf.root)),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Rejects keys that could escape the store root or collide with directories.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(GameServerError::validation(format!(
            "Invalid object key: '{}'",
            key
        )));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(GameServerError::validation(format!(
            "Invalid object key: '{}'",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("servers/mc-001/world.tar").is_ok());
        assert!(validate_key("servers/mc-001/config/plugins/a.yml").is_ok());
        for bad in ["", "/etc/passwd", "servers/", "servers//x", "servers/../x", "./x"] {
            assert!(validate_key(bad).is_err(), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_build_store_for_embedding() {
        let conf = StorageConf {
            backend: StorageBackend::Memory,
            ..StorageConf::default()
        };
        let store = build_store(&conf);
        store
            .put_object("servers/mc-001/world.tar", b"world".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.list_objects("servers/").await.unwrap(),
            vec!["servers/mc-001/world.tar".to_string()]
        );
    }
}
