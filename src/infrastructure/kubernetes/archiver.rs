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

//! Moves save data between a server's pod and the object store
//!
//! Capture streams a tar of the data directory out of the game container.
//! Restore writes into the shared volume while the `restore-save` init
//! container holds the pod, then drops the marker file that releases it.

use super::credentials::ClientProvider;
use crate::infrastructure::constants::{
    INIT_CONTAINER_NAME_RESTORE, LABEL_APP, RESTORE_MARKER_FILE,
};
use crate::shared::error::{GameServerError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, AttachedProcess, ListParams};
use kube::Api;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Where a server's save data lives inside its pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    pub server_id: String,
    pub namespace: String,
    pub data_dir: String,
}

/// Everything restored into a pod before the game starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveBundle {
    /// Tar of the data directory, absent for a server that never saved.
    pub archive: Option<Vec<u8>>,
    /// Config files, paths relative to the data directory, written in order.
    pub files: Vec<(String, Vec<u8>)>,
}

#[async_trait]
pub trait SaveArchiver: Send + Sync {
    /// Tar of the data directory of the running game container.
    async fn capture(&self, target: &SaveTarget) -> Result<Vec<u8>>;

    /// Writes the bundle into the pod waiting in `restore-save` and releases it.
    async fn restore(&self, target: &SaveTarget, bundle: &SaveBundle) -> Result<()>;
}

pub struct PodExecArchiver {
    clients: Arc<ClientProvider>,
    poll_interval: Duration,
    timeout: Duration,
}

impl PodExecArchiver {
    pub fn new(clients: Arc<ClientProvider>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            clients,
            poll_interval,
            timeout,
        }
    }

    async fn pods(&self, namespace: &str) -> Result<Api<Pod>> {
        Ok(Api::namespaced(self.clients.client().await?, namespace))
    }

    async fn list_server_pods(&self, api: &Api<Pod>, server_id: &str) -> Result<Vec<Pod>> {
        let lp = ListParams::default().labels(&format!("{}={}", LABEL_APP, server_id));
        let pods = api
            .list(&lp)
            .await
            .map_err(|e| GameServerError::cluster(format!("Failed to list pods: {}", e)))?;
        Ok(pods.items)
    }

    /// The pod whose game container is up.
    async fn find_running_pod(&self, api: &Api<Pod>, target: &SaveTarget) -> Result<String> {
        self.list_server_pods(api, &target.server_id)
            .await?
            .into_iter()
            .find(|pod| game_container_running(pod, &target.server_id))
            .and_then(|pod| pod.metadata.name)
            .ok_or_else(|| {
                GameServerError::cluster(format!(
                    "no running pod for server '{}' in '{}'",
                    target.server_id, target.namespace
                ))
            })
    }

    /// Polls until a pod sits in the restore init container.
    async fn wait_for_restore_pod(&self, api: &Api<Pod>, target: &SaveTarget) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let pod = self
                .list_server_pods(api, &target.server_id)
                .await?
                .into_iter()
                .find(restore_container_running)
                .and_then(|pod| pod.metadata.name);
            if let Some(name) = pod {
                return Ok(name);
            }
            if Instant::now() >= deadline {
                return Err(GameServerError::ReadinessTimeout(format!(
                    "no pod for server '{}' reached the restore step within {}s",
                    target.server_id,
                    self.timeout.as_secs()
                )));
            }
            sleep(self.poll_interval).await;
        }
    }
}

fn game_container_running(pod: &Pod, container: &str) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| {
            statuses.iter().any(|cs| {
                cs.name == container
                    && cs.state.as_ref().and_then(|s| s.running.as_ref()).is_some()
            })
        })
        .unwrap_or(false)
}

fn restore_container_running(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_none()
        && pod
            .status
            .as_ref()
            .and_then(|s| s.init_container_statuses.as_ref())
            .map(|statuses| {
                statuses.iter().any(|cs| {
                    cs.name == INIT_CONTAINER_NAME_RESTORE
                        && cs.state.as_ref().and_then(|s| s.running.as_ref()).is_some()
                })
            })
            .unwrap_or(false)
}

/// Rejects paths that would land outside the data directory.
fn checked_relative_path(path: &str) -> Result<&str> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(GameServerError::validation(format!(
            "invalid save file path: '{}'",
            path
        )));
    }
    Ok(path)
}

fn join_data_path(data_dir: &str, relative: &str) -> String {
    format!("{}/{}", data_dir.trim_end_matches('/'), relative)
}

fn exec_error(pod: &str, e: impl std::fmt::Display) -> GameServerError {
    GameServerError::cluster(format!("exec in pod '{}' failed: {}", pod, e))
}

/// Waits for the remote command and turns a non-success status into an error.
async fn finish(mut process: AttachedProcess, pod: &str, stderr: Vec<u8>) -> Result<()> {
    let status = match process.take_status() {
        Some(status) => status.await,
        None => None,
    };
    process.join().await.map_err(|e| exec_error(pod, e))?;

    match status {
        Some(s) if s.status.as_deref() != Some("Success") => Err(exec_error(
            pod,
            format!(
                "{} {}",
                s.message.unwrap_or_default(),
                String::from_utf8_lossy(&stderr).trim()
            ),
        )),
        _ => Ok(()),
    }
}

async fn exec_with_stdin(
    api: &Api<Pod>,
    pod: &str,
    container: &str,
    command: Vec<String>,
    input: &[u8],
) -> Result<()> {
    let params = AttachParams::default()
        .container(container)
        .stdin(true)
        .stdout(false)
        .stderr(true);
    let mut process = api
        .exec(pod, command, &params)
        .await
        .map_err(|e| exec_error(pod, e))?;

    let mut stdin = process
        .stdin()
        .ok_or_else(|| exec_error(pod, "stdin not attached"))?;
    stdin.write_all(input).await.map_err(|e| exec_error(pod, e))?;
    stdin.flush().await.map_err(|e| exec_error(pod, e))?;
    drop(stdin);

    let mut stderr = Vec::new();
    if let Some(mut reader) = process.stderr() {
        reader
            .read_to_end(&mut stderr)
            .await
            .map_err(|e| exec_error(pod, e))?;
    }

    finish(process, pod, stderr).await
}

/// `sh -c SCRIPT restore ARGS...` so paths travel as positional arguments.
fn shell(script: &str, args: &[&str]) -> Vec<String> {
    let mut command = vec![
        "sh".to_string(),
        "-c".to_string(),
        script.to_string(),
        "restore".to_string(),
    ];
    command.extend(args.iter().map(|a| a.to_string()));
    command
}

#[async_trait]
impl SaveArchiver for PodExecArchiver {
    async fn capture(&self, target: &SaveTarget) -> Result<Vec<u8>> {
        let api = self.pods(&target.namespace).await?;
        let pod = self.find_running_pod(&api, target).await?;

        let command = vec![
            "tar".to_string(),
            "cf".to_string(),
            "-".to_string(),
            "-C".to_string(),
            target.data_dir.clone(),
            ".".to_string(),
        ];
        let params = AttachParams::default()
            .container(target.server_id.as_str())
            .stdin(false)
            .stdout(true)
            .stderr(true);
        let mut process = api
            .exec(&pod, command, &params)
            .await
            .map_err(|e| exec_error(&pod, e))?;

        let mut stdout = process
            .stdout()
            .ok_or_else(|| exec_error(&pod, "stdout not attached"))?;
        let mut stderr_reader = process.stderr();

        let mut archive = Vec::new();
        let mut stderr = Vec::new();
        let read_out = stdout.read_to_end(&mut archive);
        let read_err = async {
            match stderr_reader.as_mut() {
                Some(reader) => reader.read_to_end(&mut stderr).await.map(|_| ()),
                None => Ok(()),
            }
        };
        let (out, err) = tokio::join!(read_out, read_err);
        out.map_err(|e| exec_error(&pod, e))?;
        err.map_err(|e| exec_error(&pod, e))?;
        drop(stdout);
        drop(stderr_reader);

        finish(process, &pod, stderr).await?;
        info!(
            server_id = %target.server_id,
            pod = %pod,
            bytes = archive.len(),
            "captured save archive"
        );
        Ok(archive)
    }

    async fn restore(&self, target: &SaveTarget, bundle: &SaveBundle) -> Result<()> {
        let api = self.pods(&target.namespace).await?;
        let pod = self.wait_for_restore_pod(&api, target).await?;
        let container = INIT_CONTAINER_NAME_RESTORE;

        if let Some(archive) = &bundle.archive {
            let len = archive.len().to_string();
            exec_with_stdin(
                &api,
                &pod,
                container,
                shell(
                    "head -c \"$2\" | tar xf - -C \"$1\"",
                    &[&target.data_dir, &len],
                ),
                archive,
            )
            .await?;
            debug!(pod = %pod, bytes = archive.len(), "extracted world archive");
        }

        // Files go after the archive so stored config wins over stale copies.
        for (path, content) in &bundle.files {
            let full_path = join_data_path(&target.data_dir, checked_relative_path(path)?);
            let len = content.len().to_string();
            exec_with_stdin(
                &api,
                &pod,
                container,
                shell(
                    "mkdir -p \"$(dirname \"$1\")\" && head -c \"$2\" > \"$1\"",
                    &[&full_path, &len],
                ),
                content,
            )
            .await?;
            debug!(pod = %pod, path = %path, "wrote config file");
        }

        let marker = join_data_path(&target.data_dir, RESTORE_MARKER_FILE);
        exec_with_stdin(
            &api,
            &pod,
            container,
            vec!["touch".to_string(), marker],
            &[],
        )
        .await?;

        info!(
            server_id = %target.server_id,
            pod = %pod,
            files = bundle.files.len(),
            archive = bundle.archive.is_some(),
            "restored save data"
        );
        Ok(())
    }
}
