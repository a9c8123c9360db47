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

use clap::Parser;
use gameserver_kube::cli::{commands::Commands, CliArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let global = &args.global;

    match &args.command {
        Commands::Start(cmd) => cmd.execute(global).await,
        Commands::Stop(cmd) => cmd.execute(global).await,
        Commands::Pause(cmd) => cmd.execute(global).await,
        Commands::Resume(cmd) => cmd.execute(global).await,
        Commands::Status(cmd) => cmd.execute(global).await,
        Commands::List(cmd) => cmd.execute(global).await,
        Commands::Packages(cmd) => cmd.execute().await,
        Commands::Render(cmd) => cmd.execute(global).await,
        Commands::Check(cmd) => cmd.execute(global).await,
    }
}
