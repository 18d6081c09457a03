/*
 *  Copyright 2025 Taskline Contributors
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

//! taskline-server: the HTTP face of the taskline backend.
//!
//! Startup order matters: config, then logging, then pool + migrations, then
//! the router. Migrations run before the listener binds so a half-migrated
//! schema never serves traffic.

mod config;
mod line_client;
mod routes;
mod state;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskline::chat::Dispatcher;
use taskline::stripe::Reconciler;
use taskline::{Database, DAL};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use line_client::LineClient;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "taskline-server", version, about = "LINE chatbot webhook server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "TASKLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "taskline=debug,info"
    #[arg(long, env = "TASKLINE_LOG", default_value = "info")]
    log: String,
}

/// Keeps the non-blocking file writer alive for the process lifetime.
fn init_tracing(
    filter: &str,
    logging: &config::LoggingConfig,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "taskline-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if logging.json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(env_filter)
                    .with_writer(writer)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
            Some(guard)
        }
        None => {
            if logging.json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(env_filter)
                    .init();
            } else {
                tracing_subscriber::fmt().with_env_filter(env_filter).init();
            }
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = init_tracing(&cli.log, &config.logging);

    if config.line.channel_secret.trim().is_empty() {
        warn!("LINE channel secret is not configured; webhook deliveries will be rejected");
    }
    if config.stripe.webhook_secret.trim().is_empty() {
        warn!("Stripe webhook secret is not configured; payment webhooks will fail");
    }

    let database = Database::new(&config.database.url, config.database.pool_size);
    database
        .run_migrations()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("running migrations")?;
    let dal = DAL::new(database);

    let line = Arc::new(LineClient::new(config.line.channel_access_token.clone()));
    let dispatcher = Dispatcher::new(
        dal.clone(),
        line,
        config.line.member_rich_menu_id.clone(),
    );
    let reconciler = Reconciler::new(
        dal.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.tolerance_secs,
    );

    let app = routes::router(AppState {
        dal,
        dispatcher: Arc::new(dispatcher),
        reconciler,
        line_channel_secret: config.line.channel_secret.clone(),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("taskline-server listening on {}", addr);

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
