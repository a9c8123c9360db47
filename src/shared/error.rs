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

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameServerError>;

#[derive(Error, Debug)]
pub enum GameServerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cluster unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Readiness timeout: {0}")]
    ReadinessTimeout(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {resource_type} '{name}' in namespace '{namespace}'")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<kube::Error> for GameServerError {
    fn from(err: kube::Error) -> Self {
        GameServerError::ClusterUnavailable(err.to_string())
    }
}

impl GameServerError {
    pub fn validation(context: impl Into<String>) -> Self {
        Self::Validation(context.into())
    }

    pub fn cluster(context: impl Into<String>) -> Self {
        Self::ClusterUnavailable(context.into())
    }

    pub fn store(context: impl Into<String>) -> Self {
        Self::StoreUnavailable(context.into())
    }

    pub fn conflict(context: impl Into<String>) -> Self {
        Self::Conflict(context.into())
    }

    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Classifies this error for callers of the lifecycle API.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::ConfigError(_) | Self::TomlParse(_) => {
                ErrorKind::ValidationError
            }
            Self::ClusterUnavailable(_) | Self::NotFound { .. } => ErrorKind::ClusterUnavailable,
            Self::StoreUnavailable(_) | Self::Io(_) => ErrorKind::StoreUnavailable,
            Self::ReadinessTimeout(_) => ErrorKind::ReadinessTimeout,
            Self::Conflict(_) => ErrorKind::ConflictError,
            Self::Yaml(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    ClusterUnavailable,
    StoreUnavailable,
    ReadinessTimeout,
    ConflictError,
    Internal,
}

impl ErrorKind {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ClusterUnavailable | ErrorKind::StoreUnavailable | ErrorKind::ReadinessTimeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ClusterUnavailable => "ClusterUnavailable",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::ReadinessTimeout => "ReadinessTimeout",
            ErrorKind::ConflictError => "ConflictError",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by every lifecycle operation.
#[derive(Error, Debug, Clone)]
#[error("{kind} for server '{server_id}': {message}")]
pub struct LifecycleError {
    pub kind: ErrorKind,
    pub server_id: String,
    pub message: String,
    /// Set when a rollback could not complete and the cluster holds objects
    /// that an operator has to clean up.
    pub requires_intervention: bool,
}

impl LifecycleError {
    pub fn new(kind: ErrorKind, server_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            server_id: server_id.into(),
            message: message.into(),
            requires_intervention: false,
        }
    }

    pub fn from_error(server_id: impl Into<String>, err: GameServerError) -> Self {
        Self::new(err.kind(), server_id, err.to_string())
    }

    pub fn with_intervention(mut self) -> Self {
        self.requires_intervention = true;
        self.message = format!("{} (manual intervention required)", self.message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            GameServerError::validation("bad id").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            GameServerError::store("down").kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            GameServerError::conflict("paused").kind(),
            ErrorKind::ConflictError
        );
        assert_eq!(
            GameServerError::ReadinessTimeout("slow".to_string()).kind(),
            ErrorKind::ReadinessTimeout
        );
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::ClusterUnavailable.is_retryable());
        assert!(ErrorKind::StoreUnavailable.is_retryable());
        assert!(!ErrorKind::ValidationError.is_retryable());
        assert!(!ErrorKind::ConflictError.is_retryable());
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError::from_error("mc-001", GameServerError::store("bucket offline"))
            .with_intervention();
        let text = err.to_string();
        assert!(text.starts_with("StoreUnavailable for server 'mc-001'"));
        assert!(text.contains("manual intervention required"));
        assert!(err.requires_intervention);
    }
}
