// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal process entry point. Claiming host assignments from a real
//! Shuffle Scheduler and wiring a real allocator is the outer DAG engine's
//! job (§1 Non-goals) — this binary only proves the ambient stack (config
//! loading, logging) boots standalone.

use anyhow::{Context, Result};
use shuffle_fetcher::cfg::{cli::resolve_config_path, config::FetcherConfig, logger::init_logger};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("config/logger.yaml")?;

    let cfg = resolve_config_path("config/fetcher.yaml")
        .and_then(FetcherConfig::load_from_file)
        .context("failed to resolve or load config")?;

    info!(
        local_host_port = %cfg.local_host_port,
        local_disk_fetch_enabled = cfg.local_disk_fetch_enabled,
        "shuffle fetcher configured"
    );

    Ok(())
}
