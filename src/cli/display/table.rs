//! Table rendering for CLI output

use super::{ColorTheme, StatusIcon};
use crate::domain::catalog::ResourcePackage;
use crate::domain::server::ServerStatus;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn address(status: &ServerStatus) -> String {
    match (&status.connection_host, status.connection_port) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.clone(),
        _ => "-".to_string(),
    }
}

impl TableRenderer {
    /// Create a new table renderer with default theme
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    pub fn render_servers_list(&self, namespace: &str, servers: &[ServerStatus]) -> String {
        if servers.is_empty() {
            return format!("No game servers found in namespace '{}'", namespace);
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("SERVER").set_alignment(CellAlignment::Left),
                Cell::new("GAME").set_alignment(CellAlignment::Left),
                Cell::new("PACKAGE").set_alignment(CellAlignment::Left),
                Cell::new("READY").set_alignment(CellAlignment::Center),
                Cell::new("STATE").set_alignment(CellAlignment::Center),
                Cell::new("ADDRESS").set_alignment(CellAlignment::Left),
            ]);

        for server in servers {
            let state = server.lifecycle_state;
            table.add_row(vec![
                Cell::new(&server.server_id),
                Cell::new(server.game_id.as_deref().unwrap_or("-")),
                Cell::new(server.package_id.as_deref().unwrap_or("-")),
                Cell::new(format!("{}/{}", server.replicas_ready, server.replicas_desired))
                    .fg(self
                        .theme
                        .get_replica_color(server.replicas_ready, server.replicas_desired)),
                Cell::new(format!("{} {}", StatusIcon::for_state(state), state))
                    .fg(self.theme.get_state_color(state)),
                Cell::new(address(server)),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Game Servers in {} {} ─╮\n",
            namespace,
            format!("[{} servers]", servers.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Legend: {} Running  {} Paused  {} In transition  {} Failed\n",
            StatusIcon::SUCCESS.green(),
            StatusIcon::PAUSED.bright_black(),
            StatusIcon::PENDING.yellow(),
            StatusIcon::ERROR.red()
        ));
        output
    }

    pub fn render_server_status(&self, status: &ServerStatus) -> String {
        let state = status.lifecycle_state;

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.add_row(vec![
            Cell::new("Server"),
            Cell::new(format!("{} | Namespace: {}", status.server_id, status.namespace)),
        ]);
        table.add_row(vec![
            Cell::new("State"),
            Cell::new(format!("{} {}", StatusIcon::for_state(state), state))
                .fg(self.theme.get_state_color(state)),
        ]);
        table.add_row(vec![
            Cell::new("Replicas"),
            Cell::new(format!("{}/{}", status.replicas_ready, status.replicas_desired)).fg(
                self.theme
                    .get_replica_color(status.replicas_ready, status.replicas_desired),
            ),
        ]);
        if let (Some(game), Some(package)) = (&status.game_id, &status.package_id) {
            table.add_row(vec![
                Cell::new("Package"),
                Cell::new(format!("{} / {}", game, package)),
            ]);
        }
        table.add_row(vec![
            Cell::new("Address"),
            Cell::new(address(status)).fg(self.theme.info),
        ]);
        if let Some(failure) = &status.failure {
            table.add_row(vec![
                Cell::new("Failure"),
                Cell::new(failure).fg(self.theme.error),
            ]);
        }

        table.to_string()
    }

    pub fn render_packages(&self, packages: &[ResourcePackage]) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("GAME"),
                Cell::new("PACKAGE"),
                Cell::new("CPU").set_alignment(CellAlignment::Right),
                Cell::new("MEMORY").set_alignment(CellAlignment::Right),
                Cell::new("PORT").set_alignment(CellAlignment::Right),
                Cell::new("IMAGE"),
            ]);

        for package in packages {
            table.add_row(vec![
                Cell::new(&package.game_id),
                Cell::new(&package.package_id).fg(self.theme.info),
                Cell::new(package.cpu_quantity()).set_alignment(CellAlignment::Right),
                Cell::new(package.memory_quantity()).set_alignment(CellAlignment::Right),
                Cell::new(package.container_port).set_alignment(CellAlignment::Right),
                Cell::new(&package.image_reference),
            ]);
        }

        table.to_string()
    }
}
