// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultline job <task>`: one background execution.
//!
//! Runs in its own process with nothing inherited but configuration and the
//! environment. The vault passphrase comes from the environment only; this
//! entry point never prompts.

use std::sync::Arc;

use tracing::{debug, error};

use vaultline_config::VaultlineConfig;
use vaultline_sync::{StorageContextLoader, SyncJobRunner};

use crate::sync::sync_services;

pub async fn run_job(config: &VaultlineConfig, task: &str) {
    let services = match sync_services(config).await {
        Ok(services) => services,
        Err(e) => {
            error!(task, error = %e, "cannot open job services");
            return;
        }
    };
    let loader = Arc::new(StorageContextLoader::new(
        config.storage.clone(),
        config.sync.clone(),
        vaultline_vault::passphrase_from_env(),
    ));

    let completion = SyncJobRunner::new(loader, services).dispatch(task).await;
    debug!(task, ?completion, "job execution finished");
}
