// CLI command definitions

use super::server::{
    CheckCommand, ListCommand, PackagesCommand, PauseCommand, RenderCommand, ResumeCommand,
    StartCommand, StatusCommand, StopCommand,
};
use clap::{Args, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "gameserver-kube",
    version,
    about = "Game server lifecycle control for Kubernetes",
    long_about = "Starts, pauses, resumes and stops dedicated game servers on an AKS cluster, \
                  keeping save data in an object store between runs"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides applied on top of the config file and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true, env = "GAMESERVER_CONFIG")]
    pub config: Option<String>,

    /// Kubeconfig file path (local cluster mode)
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use (local cluster mode)
    #[arg(long, global = true)]
    pub context: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Deploy a game server and wait until it accepts players
    Start(StartCommand),

    /// Save a running server's data and tear it down
    Stop(StopCommand),

    /// Save a running server's data and scale it to zero
    Pause(PauseCommand),

    /// Bring a paused server back with its saved data
    Resume(ResumeCommand),

    /// Show the lifecycle state of one server
    Status(StatusCommand),

    /// List game servers in a namespace
    List(ListCommand),

    /// List deployable game packages
    Packages(PackagesCommand),

    /// Print the manifests a start would apply, without a cluster
    Render(RenderCommand),

    /// Verify configuration and cluster connectivity
    Check(CheckCommand),
}
