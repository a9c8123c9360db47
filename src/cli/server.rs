// Game server lifecycle commands

use super::context::{load_conf, AppContext};
use super::display::TableRenderer;
use super::GlobalArgs;
use crate::domain::catalog::PackageCatalog;
use crate::domain::lifecycle::StartRequest;
use crate::domain::server::{ServerDeploymentSpec, ServerKey, VolumeRef};
use crate::infrastructure::kubernetes::resources::render_yaml;
use clap::{Parser, ValueEnum};
use colored::Colorize;

/// Output format for status and list
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser, Debug, Clone)]
pub struct StartCommand {
    /// Game identifier from the package catalog (e.g. minecraft)
    #[arg(long)]
    pub game: String,

    /// Hardware tier for the game (e.g. standard)
    #[arg(long)]
    pub package: String,

    /// Server identifier, used as the Kubernetes object name
    #[arg(long = "server-id")]
    pub server_id: String,

    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    /// Azure file share to mount as the save volume
    #[arg(long = "share-name", requires = "mount_path")]
    pub share_name: Option<String>,

    /// Mount path of the file share inside the game container
    #[arg(long = "mount-path", requires = "share_name")]
    pub mount_path: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct StopCommand {
    #[arg(long = "server-id")]
    pub server_id: String,

    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,
}

#[derive(Parser, Debug, Clone)]
pub struct PauseCommand {
    #[arg(long = "server-id")]
    pub server_id: String,

    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ResumeCommand {
    #[arg(long = "server-id")]
    pub server_id: String,

    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    #[arg(long = "server-id")]
    pub server_id: String,

    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct PackagesCommand {
    /// Only show packages for this game
    #[arg(long)]
    pub game: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct RenderCommand {
    #[arg(long)]
    pub game: String,

    #[arg(long)]
    pub package: String,

    #[arg(long = "server-id")]
    pub server_id: String,

    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    #[arg(long = "share-name", requires = "mount_path")]
    pub share_name: Option<String>,

    #[arg(long = "mount-path", requires = "share_name")]
    pub mount_path: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CheckCommand {}

fn volume_ref(
    share_name: &Option<String>,
    mount_path: &Option<String>,
    secret_name: &str,
) -> Option<VolumeRef> {
    match (share_name, mount_path) {
        (Some(share_name), Some(mount_path)) => Some(VolumeRef {
            share_name: share_name.clone(),
            mount_path: mount_path.clone(),
            secret_name: secret_name.to_string(),
        }),
        _ => None,
    }
}

impl StartCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let ctx = AppContext::connect(load_conf(global)?).await?;
        let request = StartRequest {
            game_id: self.game.clone(),
            package_id: self.package.clone(),
            server_id: self.server_id.clone(),
            namespace: self.namespace.clone(),
            volume: volume_ref(
                &self.share_name,
                &self.mount_path,
                &ctx.conf.storage.file_share_secret,
            ),
        };

        println!(
            "Starting {} ({}/{}) in namespace '{}'...",
            self.server_id, self.game, self.package, self.namespace
        );
        let outcome = ctx.orchestrator.start(request).await?;

        println!("{} Server '{}' is {}", "✓".green(), self.server_id, outcome.state);
        println!(
            "  Connect to: {}",
            format!("{}:{}", outcome.connection_host, outcome.connection_port).cyan()
        );
        Ok(())
    }
}

impl StopCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let ctx = AppContext::connect(load_conf(global)?).await?;
        println!("Saving and stopping '{}'...", self.server_id);
        ctx.orchestrator
            .stop(&self.server_id, &self.namespace)
            .await?;
        println!("{} Server '{}' stopped", "✓".green(), self.server_id);
        Ok(())
    }
}

impl PauseCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let ctx = AppContext::connect(load_conf(global)?).await?;
        println!("Saving and pausing '{}'...", self.server_id);
        let outcome = ctx
            .orchestrator
            .pause(&self.server_id, &self.namespace)
            .await?;
        println!("{} Server '{}' is {}", "✓".green(), self.server_id, outcome.state);
        Ok(())
    }
}

impl ResumeCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let ctx = AppContext::connect(load_conf(global)?).await?;
        println!("Resuming '{}'...", self.server_id);
        let outcome = ctx
            .orchestrator
            .resume(&self.server_id, &self.namespace)
            .await?;
        println!("{} Server '{}' is {}", "✓".green(), self.server_id, outcome.state);
        Ok(())
    }
}

impl StatusCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let ctx = AppContext::connect(load_conf(global)?).await?;
        let status = ctx
            .orchestrator
            .get_status(&self.server_id, &self.namespace)
            .await?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
            OutputFormat::Table => {
                println!("{}", TableRenderer::new().render_server_status(&status))
            }
        }
        Ok(())
    }
}

impl ListCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let ctx = AppContext::connect(load_conf(global)?).await?;
        let servers = ctx.orchestrator.list(&self.namespace).await?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&servers)?),
            OutputFormat::Table => println!(
                "{}",
                TableRenderer::new().render_servers_list(&self.namespace, &servers)
            ),
        }
        Ok(())
    }
}

impl PackagesCommand {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let catalog = PackageCatalog::new();
        let packages: Vec<_> = catalog
            .packages()
            .into_iter()
            .filter(|p| self.game.as_deref().map_or(true, |g| p.game_id == g))
            .collect();

        if packages.is_empty() {
            return Err(anyhow::anyhow!(
                "No packages for game '{}' (available: {})",
                self.game.as_deref().unwrap_or_default(),
                catalog.games().join(", ")
            ));
        }

        println!("{}", TableRenderer::new().render_packages(&packages));
        Ok(())
    }
}

impl RenderCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let conf = load_conf(global)?;
        let key = ServerKey::new(&self.server_id, &self.namespace)?;
        let package = PackageCatalog::new().resolve(&self.game, &self.package)?;
        let volume = volume_ref(
            &self.share_name,
            &self.mount_path,
            &conf.storage.file_share_secret,
        );
        let spec = ServerDeploymentSpec::new(&key, package, volume)?;

        print!("{}", render_yaml(&spec, &conf.network.node_resource_group)?);
        Ok(())
    }
}

impl CheckCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let conf = load_conf(global)?;
        println!("{} Configuration valid ({})", "✓".green(), conf.environment);

        let ctx = AppContext::connect(conf).await?;
        println!(
            "{} Cluster reachable ({} namespaces, mode {:?})",
            "✓".green(),
            ctx.namespaces.len(),
            ctx.conf.cluster_mode()
        );
        Ok(())
    }
}
