// Wiring from configuration to a ready orchestrator

use super::commands::GlobalArgs;
use crate::domain::config::AppConf;
use crate::domain::lifecycle::{Orchestrator, OrchestratorSettings};
use crate::infrastructure::kubernetes::{
    ClientProvider, ClusterGateway, CredentialSource, KubeGateway, PodExecArchiver,
};
use crate::infrastructure::storage::build_store;
use crate::shared::init_logging;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Loads config from file and environment, applies command-line overrides
/// and installs the log subscriber.
pub fn load_conf(global: &GlobalArgs) -> anyhow::Result<AppConf> {
    let mut conf = AppConf::load(global.config.as_deref())?;
    init_logging(&conf.logging);
    if let Some(kubeconfig) = &global.kubeconfig {
        conf.cluster.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(context) = &global.context {
        conf.cluster.context = Some(context.clone());
    }
    conf.validate()?;
    Ok(conf)
}

/// Everything a cluster-facing command needs.
pub struct AppContext {
    pub conf: AppConf,
    pub orchestrator: Orchestrator,
    /// Seen by the connectivity self-test.
    pub namespaces: Vec<String>,
}

impl AppContext {
    /// Builds the clients and proves the cluster answers before returning.
    pub async fn connect(conf: AppConf) -> anyhow::Result<Self> {
        let source = CredentialSource::from_conf(&conf)?;
        info!(
            environment = %conf.environment,
            mode = ?conf.cluster_mode(),
            "connecting to cluster"
        );

        let clients = Arc::new(ClientProvider::new(source));
        let gateway: Arc<dyn ClusterGateway> = Arc::new(KubeGateway::new(clients.clone()));
        let namespaces = gateway.list_namespaces().await?;
        info!(namespaces = namespaces.len(), "cluster connection verified");

        let store = build_store(&conf.storage);
        let archiver = Arc::new(PodExecArchiver::new(
            clients,
            Duration::from_secs(conf.readiness.poll_interval_secs),
            Duration::from_secs(conf.readiness.timeout_secs),
        ));
        let orchestrator = Orchestrator::new(
            gateway,
            store,
            archiver,
            OrchestratorSettings::from(&conf),
        );

        Ok(Self {
            conf,
            orchestrator,
            namespaces,
        })
    }
}
