/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Subject access request fulfilment daemon.
//!
//! Loads the service registry, templates and store configuration, then runs
//! the pipeline worker until interrupted.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use disclose::alert::LogNotifier;
use disclose::artifact::FilesystemArtifactStore;
use disclose::client::{HttpQueryClient, StaticTokenSource};
use disclose::dal::DAL;
use disclose::database::Database;
use disclose::registry::ServiceRegistry;
use disclose::report::TemplateStore;
use disclose::worker::PipelineWorker;

use config::Settings;

const TOKEN_ENV: &str = "DISCLOSE_CLIENT_TOKEN";

#[derive(Debug, Parser)]
#[command(name = "disclose-worker", version, about)]
struct Cli {
    /// Path to the worker configuration file.
    #[arg(short, long, env = "DISCLOSE_CONFIG", default_value = "disclose.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    disclose::init_logging();

    let settings = Settings::from_toml_file(&cli.config)?;

    let database = Database::new(&settings.database.url, settings.database.pool_size);
    database
        .run_migrations()
        .await
        .context("failed to migrate the request store")?;

    let registry = Arc::new(
        ServiceRegistry::from_toml_file(&settings.registry.path)
            .context("failed to load the service registry")?,
    );
    info!(services = registry.len(), "Loaded service registry");

    let templates = TemplateStore::from_dir(&settings.templates.dir)
        .context("failed to load report templates")?;

    let token = match settings.client.token.clone() {
        Some(token) => token,
        None => std::env::var(TOKEN_ENV).with_context(|| {
            format!(
                "no client token configured and {} is not set",
                TOKEN_ENV
            )
        })?,
    };
    let client = Arc::new(HttpQueryClient::new(
        settings.client.call_timeout(),
        Arc::new(StaticTokenSource::new(token)),
    ));

    let worker = Arc::new(PipelineWorker::new(
        DAL::new(database),
        registry,
        client,
        templates,
        Arc::new(FilesystemArtifactStore::new(&settings.artifacts.dir)),
        Arc::new(LogNotifier),
        settings.worker.to_worker_config(),
    ));

    let signal_worker = worker.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down after the current cycle");
            signal_worker.shutdown();
        }
    });

    worker.run().await;
    Ok(())
}
