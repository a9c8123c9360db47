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

//! Compiled-in package catalog
//!
//! Every (game, package) pair the service can deploy lives in the tables
//! below. Changing a tier here changes every future deployment of that tier
//! and nothing else.

use crate::shared::error::{GameServerError, Result};
use serde::Serialize;

/// A resolved hardware tier for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePackage {
    pub game_id: String,
    pub package_id: String,
    pub cpu_millicores: u32,
    pub memory_mib: u32,
    pub image_reference: String,
    pub container_port: u16,
    /// Emitted into the container in this order.
    pub environment_variables: Vec<(String, String)>,
    /// Directory inside the game container that holds world/save data.
    pub data_path: String,
    /// Seeded into the store for servers that have never saved.
    pub default_files: Vec<(String, String)>,
}

impl ResourcePackage {
    pub fn cpu_quantity(&self) -> String {
        format!("{}m", self.cpu_millicores)
    }

    pub fn memory_quantity(&self) -> String {
        format!("{}Mi", self.memory_mib)
    }
}

struct GameDef {
    game_id: &'static str,
    image_reference: &'static str,
    container_port: u16,
    data_path: &'static str,
    base_env: &'static [(&'static str, &'static str)],
    default_files: &'static [(&'static str, &'static str)],
}

struct PackageDef {
    game_id: &'static str,
    package_id: &'static str,
    cpu_millicores: u32,
    memory_mib: u32,
    env: &'static [(&'static str, &'static str)],
}

const MINECRAFT_SERVER_PROPERTIES: &str = "\
motd=A GameServer Minecraft world
server-port=25565
max-players=20
online-mode=true
difficulty=normal
view-distance=10
";

const TERRARIA_SERVER_CONFIG: &str = "\
world=/root/.local/share/Terraria/Worlds/world.wld
autocreate=2
worldname=world
maxplayers=8
port=7777
";

const GAMES: &[GameDef] = &[
    GameDef {
        game_id: "minecraft",
        image_reference: "gameregistry.azurecr.io/minecraft-server:latest",
        container_port: 25565,
        data_path: "/data",
        base_env: &[("EULA", "TRUE"), ("TYPE", "PAPER")],
        default_files: &[
            ("eula.txt", "eula=true\n"),
            ("server.properties", MINECRAFT_SERVER_PROPERTIES),
        ],
    },
    GameDef {
        game_id: "terraria",
        image_reference: "gameregistry.azurecr.io/terraria-server:latest",
        container_port: 7777,
        data_path: "/root/.local/share/Terraria/Worlds",
        base_env: &[("WORLD_FILENAME", "world.wld")],
        default_files: &[("serverconfig.txt", TERRARIA_SERVER_CONFIG)],
    },
];

const PACKAGES: &[PackageDef] = &[
    PackageDef {
        game_id: "minecraft",
        package_id: "basic",
        cpu_millicores: 1000,
        memory_mib: 3072,
        env: &[("MEMORY", "2G"), ("MAX_PLAYERS", "10")],
    },
    PackageDef {
        game_id: "minecraft",
        package_id: "standard",
        cpu_millicores: 2000,
        memory_mib: 6144,
        env: &[("MEMORY", "5G"), ("MAX_PLAYERS", "20")],
    },
    PackageDef {
        game_id: "minecraft",
        package_id: "premium",
        cpu_millicores: 4000,
        memory_mib: 8192,
        env: &[("MEMORY", "7G"), ("MAX_PLAYERS", "50")],
    },
    PackageDef {
        game_id: "terraria",
        package_id: "standard",
        cpu_millicores: 1000,
        memory_mib: 2048,
        env: &[("MAX_PLAYERS", "8")],
    },
];

/// Read-only lookup over the compiled-in tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageCatalog;

impl PackageCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, game_id: &str, package_id: &str) -> Result<ResourcePackage> {
        let game = GAMES
            .iter()
            .find(|g| g.game_id == game_id)
            .ok_or_else(|| {
                GameServerError::validation(format!(
                    "Unknown game '{}' (available: {})",
                    game_id,
                    self.games().join(", ")
                ))
            })?;

        let package = PACKAGES
            .iter()
            .find(|p| p.game_id == game_id && p.package_id == package_id)
            .ok_or_else(|| {
                GameServerError::validation(format!(
                    "Unknown package '{}' for game '{}' (available: {})",
                    package_id,
                    game_id,
                    self.package_ids(game_id).join(", ")
                ))
            })?;

        Ok(Self::materialize(game, package))
    }

    /// Every deployable package, in table order.
    pub fn packages(&self) -> Vec<ResourcePackage> {
        PACKAGES
            .iter()
            .filter_map(|p| {
                GAMES
                    .iter()
                    .find(|g| g.game_id == p.game_id)
                    .map(|g| Self::materialize(g, p))
            })
            .collect()
    }

    pub fn games(&self) -> Vec<&'static str> {
        GAMES.iter().map(|g| g.game_id).collect()
    }

    fn package_ids(&self, game_id: &str) -> Vec<&'static str> {
        PACKAGES
            .iter()
            .filter(|p| p.game_id == game_id)
            .map(|p| p.package_id)
            .collect()
    }

    fn materialize(game: &GameDef, package: &PackageDef) -> ResourcePackage {
        let environment_variables = game
            .base_env
            .iter()
            .chain(package.env.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        ResourcePackage {
            game_id: game.game_id.to_string(),
            package_id: package.package_id.to_string(),
            cpu_millicores: package.cpu_millicores,
            memory_mib: package.memory_mib,
            image_reference: game.image_reference.to_string(),
            container_port: game.container_port,
            environment_variables,
            data_path: game.data_path.to_string(),
            default_files: game
                .default_files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::ErrorKind;

    #[test]
    fn test_resolve_minecraft_standard() {
        let package = PackageCatalog::new()
            .resolve("minecraft", "standard")
            .unwrap();
        assert_eq!(package.cpu_quantity(), "2000m");
        assert_eq!(package.memory_quantity(), "6144Mi");
        assert_eq!(
            package.image_reference,
            "gameregistry.azurecr.io/minecraft-server:latest"
        );
        assert_eq!(package.container_port, 25565);
        assert_eq!(package.environment_variables[0].0, "EULA");
    }

    #[test]
    fn test_unknown_pairs_are_validation_errors() {
        let catalog = PackageCatalog::new();
        for (game, package) in [
            ("minecraft", "gold"),
            ("valheim", "standard"),
            ("", ""),
            ("terraria", "premium"),
            ("Minecraft", "standard"),
        ] {
            let err = catalog.resolve(game, package).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError, "{}/{}", game, package);
        }
    }

    #[test]
    fn test_every_package_is_well_formed() {
        let catalog = PackageCatalog::new();
        let packages = catalog.packages();
        assert_eq!(packages.len(), PACKAGES.len());
        for package in packages {
            assert!(package.cpu_millicores > 0);
            assert!(package.memory_mib > 0);
            assert!(package.container_port > 0);
            assert!(!package.image_reference.is_empty());
            assert!(package.data_path.starts_with('/'));
            assert_eq!(
                catalog
                    .resolve(&package.game_id, &package.package_id)
                    .unwrap(),
                package
            );
        }
    }
}
