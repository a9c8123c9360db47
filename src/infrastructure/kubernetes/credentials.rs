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

//! Cluster credentials: kubeconfig or a managed-identity bearer token
//!
//! The managed-identity path exchanges the workload identity for an AAD token
//! scoped to the cluster's server application, and rebuilds the kube client
//! whenever the cached token is close to expiry.

use crate::domain::config::{AppConf, ClusterMode};
use crate::shared::error::{GameServerError, Result};
use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const TOKEN_RETRY_TIMES: usize = 3;

const CONTEXT_NAME: &str = "aks";
const USER_NAME: &str = "managed-identity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchanges the workload identity for a token scoped to `resource`.
    async fn fetch_token(&self, resource: &str) -> Result<AccessToken>;
}

/// How the gateway authenticates, chosen once at startup.
#[derive(Clone)]
pub enum CredentialSource {
    Kubeconfig {
        path: Option<String>,
        content: Option<String>,
        context: Option<String>,
    },
    ManagedIdentity {
        api_server_url: String,
        /// PEM, or base64-encoded PEM.
        ca_certificate: String,
        aad_server_id: String,
        provider: Arc<dyn TokenProvider>,
        refresh_margin: Duration,
    },
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Kubeconfig { path, context, .. } => f
                .debug_struct("Kubeconfig")
                .field("path", path)
                .field("context", context)
                .finish(),
            CredentialSource::ManagedIdentity { api_server_url, .. } => f
                .debug_struct("ManagedIdentity")
                .field("api_server_url", api_server_url)
                .finish(),
        }
    }
}

impl CredentialSource {
    pub fn from_conf(conf: &AppConf) -> Result<Self> {
        let cluster = &conf.cluster;
        match conf.cluster_mode() {
            ClusterMode::Local => Ok(CredentialSource::Kubeconfig {
                path: cluster.kubeconfig.clone(),
                content: cluster.kubeconfig_content.clone(),
                context: cluster.context.clone(),
            }),
            ClusterMode::Managed => {
                let api_server_url = cluster.api_server_url.clone().ok_or_else(|| {
                    GameServerError::config_error("managed mode requires cluster.api_server_url")
                })?;
                let ca_certificate = cluster.ca_certificate.clone().ok_or_else(|| {
                    GameServerError::config_error("managed mode requires cluster.ca_certificate")
                })?;
                Ok(CredentialSource::ManagedIdentity {
                    api_server_url,
                    ca_certificate,
                    aad_server_id: cluster.aad_server_id.clone(),
                    provider: Arc::new(ManagedIdentityTokenProvider::new(
                        cluster.managed_identity_client_id.clone(),
                    )),
                    refresh_margin: Duration::seconds(
                        i64::try_from(cluster.token_refresh_margin_secs).unwrap_or(i64::MAX),
                    ),
                })
            }
        }
    }
}

/// Talks to the App Service identity endpoint when present, otherwise IMDS.
pub struct ManagedIdentityTokenProvider {
    http: reqwest::Client,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Epoch seconds, sent as a string.
    expires_on: String,
}

impl ManagedIdentityTokenProvider {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
        }
    }

    async fn request_token(&self, resource: &str) -> Result<AccessToken> {
        let identity_endpoint = std::env::var("IDENTITY_ENDPOINT").ok();
        let identity_header = std::env::var("IDENTITY_HEADER").ok();

        let mut query = vec![("resource", resource.to_string())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        let request = match (identity_endpoint, identity_header) {
            (Some(endpoint), Some(header)) => {
                query.push(("api-version", APP_SERVICE_API_VERSION.to_string()));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            _ => {
                query.push(("api-version", IMDS_API_VERSION.to_string()));
                self.http
                    .get(IMDS_TOKEN_ENDPOINT)
                    .header("Metadata", "true")
                    .query(&query)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| GameServerError::cluster(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GameServerError::cluster(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| GameServerError::cluster(format!("invalid token response: {}", e)))?;

        let expires_at = parse_expires_on(&body.expires_on)?;
        Ok(AccessToken {
            token: body.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityTokenProvider {
    async fn fetch_token(&self, resource: &str) -> Result<AccessToken> {
        let mut delays = ExponentialBuilder::default()
            .with_max_times(TOKEN_RETRY_TIMES)
            .build();

        loop {
            match self.request_token(resource).await {
                Ok(token) => return Ok(token),
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!(error = %e, ?delay, "managed identity token request failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}

fn parse_expires_on(value: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = value.trim().parse().map_err(|_| {
        GameServerError::cluster(format!("invalid token expiry: '{}'", value))
    })?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| GameServerError::cluster(format!("token expiry out of range: {}", secs)))
}

/// Holds the current token and decides when it must be replaced.
#[derive(Debug, Clone)]
pub struct TokenCache {
    margin: Duration,
    current: Option<AccessToken>,
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            current: None,
        }
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match &self.current {
            Some(token) => token.expires_at - now < self.margin,
            None => true,
        }
    }

    pub fn store(&mut self, token: AccessToken) {
        self.current = Some(token);
    }
}

/// Base64 PEM for the kubeconfig `certificate-authority-data` field.
pub fn normalize_ca_certificate(ca: &str) -> Result<String> {
    let trimmed = ca.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(BASE64.encode(trimmed.as_bytes()));
    }

    let compact: String = trimmed.split_whitespace().collect();
    let decoded = BASE64.decode(compact.as_bytes()).map_err(|e| {
        GameServerError::config_error(format!("cluster CA certificate is not PEM or base64: {}", e))
    })?;
    if !String::from_utf8_lossy(&decoded).contains("-----BEGIN") {
        return Err(GameServerError::config_error(
            "cluster CA certificate does not decode to a PEM block",
        ));
    }
    Ok(compact)
}

/// Kubeconfig with a single cluster, user and context carrying a bearer token.
pub fn token_kubeconfig(api_server_url: &str, ca_certificate: &str, token: &str) -> Result<Kubeconfig> {
    let ca_data = normalize_ca_certificate(ca_certificate)?;
    let kubeconfig = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": CONTEXT_NAME,
            "cluster": {
                "server": api_server_url,
                "certificate-authority-data": ca_data,
            }
        }],
        "users": [{
            "name": USER_NAME,
            "user": { "token": token }
        }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": { "cluster": CONTEXT_NAME, "user": USER_NAME }
        }],
        "current-context": CONTEXT_NAME,
    }))?;
    Ok(kubeconfig)
}

async fn client_from_kubeconfig(kubeconfig: Kubeconfig, context: Option<String>) -> Result<Client> {
    let options = KubeConfigOptions {
        context,
        cluster: None,
        user: None,
    };
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| GameServerError::cluster(format!("Failed to create Kubernetes config: {}", e)))?;
    Client::try_from(config)
        .map_err(|e| GameServerError::cluster(format!("Failed to create Kubernetes client: {}", e)))
}

struct ProviderState {
    client: Option<Client>,
    tokens: TokenCache,
}

/// Hands out a ready kube client, refreshing managed-identity credentials
/// before they expire. Shared by the gateway and the save archiver.
pub struct ClientProvider {
    source: CredentialSource,
    state: Mutex<ProviderState>,
}

impl ClientProvider {
    pub fn new(source: CredentialSource) -> Self {
        let margin = match &source {
            CredentialSource::ManagedIdentity { refresh_margin, .. } => *refresh_margin,
            CredentialSource::Kubeconfig { .. } => Duration::zero(),
        };
        Self {
            source,
            state: Mutex::new(ProviderState {
                client: None,
                tokens: TokenCache::new(margin),
            }),
        }
    }

    pub async fn client(&self) -> Result<Client> {
        let mut state = self.state.lock().await;

        match &self.source {
            CredentialSource::Kubeconfig {
                path,
                content,
                context,
            } => {
                if let Some(client) = &state.client {
                    return Ok(client.clone());
                }
                let kubeconfig = load_kubeconfig(path.as_deref(), content.as_deref())?;
                let client = client_from_kubeconfig(kubeconfig, context.clone()).await?;
                info!(context = ?context, "connected to cluster using kubeconfig");
                state.client = Some(client.clone());
                Ok(client)
            }
            CredentialSource::ManagedIdentity {
                api_server_url,
                ca_certificate,
                aad_server_id,
                provider,
                ..
            } => {
                if let Some(client) = &state.client {
                    if !state.tokens.needs_refresh(Utc::now()) {
                        return Ok(client.clone());
                    }
                }

                let token = provider.fetch_token(aad_server_id).await?;
                debug!(expires_at = %token.expires_at, "refreshed cluster access token");
                let kubeconfig = token_kubeconfig(api_server_url, ca_certificate, &token.token)?;
                let client = client_from_kubeconfig(kubeconfig, None).await?;
                state.tokens.store(token);
                state.client = Some(client.clone());
                Ok(client)
            }
        }
    }
}

fn load_kubeconfig(path: Option<&str>, content: Option<&str>) -> Result<Kubeconfig> {
    let loaded = match (path, content) {
        (Some(path), _) => Kubeconfig::read_from(path),
        (None, Some(content)) => Kubeconfig::from_yaml(content),
        (None, None) => Kubeconfig::read(),
    };
    loaded.map_err(|e| GameServerError::cluster(format!("Failed to load kubeconfig: {}", e)))
}
