// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vaultline - persistent remote shells and battery-aware background vault sync.
//!
//! This is the binary entry point and composition root.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod credentials;
mod job;
mod platform;
mod serve;
#[cfg(feature = "ssh")]
mod shell;
mod status;
mod sync;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use vaultline_config::VaultlineConfig;

/// Vaultline - persistent remote shells and battery-aware background vault sync.
#[derive(Parser, Debug)]
#[command(name = "vaultline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the job daemon, connectivity polling and held sessions until signalled.
    Serve {
        /// Keep a persistent session to this `user@host[:port]` open (repeatable).
        #[cfg(feature = "ssh")]
        #[arg(long = "hold", value_name = "TARGET")]
        hold: Vec<String>,
        /// Private key used for held sessions.
        #[cfg(feature = "ssh")]
        #[arg(long, value_name = "PATH")]
        key: Option<PathBuf>,
    },
    /// Run one background job execution. Launched by the job daemon.
    #[command(hide = true)]
    Job {
        /// Platform task name.
        task: String,
    },
    /// Configure and run background sync.
    Sync {
        #[command(subcommand)]
        action: sync::SyncCommand,
    },
    /// Show sync, device and job status without unlocking the vault.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Manage remote credentials and the root key.
    Credentials {
        #[command(subcommand)]
        action: credentials::CredentialsCommand,
    },
    /// Manage the local records that sync mirrors.
    Records {
        #[command(subcommand)]
        action: credentials::RecordsCommand,
    },
    /// Open an interactive remote shell.
    #[cfg(feature = "ssh")]
    Shell {
        /// `user@host[:port]`.
        target: String,
        /// Private key file; prompts for a password when omitted.
        #[arg(long, value_name = "PATH")]
        key: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> VaultlineConfig {
    let loaded = match path {
        Some(path) => vaultline_config::load_and_validate_path(path),
        None => vaultline_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            vaultline_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    serve::init_tracing(&config.app.log_level);

    let result = match cli.command {
        #[cfg(feature = "ssh")]
        Some(Commands::Serve { hold, key }) => {
            serve::run_serve(config, cli.config, hold, key).await
        }
        #[cfg(not(feature = "ssh"))]
        Some(Commands::Serve {}) => serve::run_serve(config, cli.config).await,
        Some(Commands::Job { task }) => {
            // The platform scheduler must never retry on its own.
            job::run_job(&config, &task).await;
            Ok(())
        }
        Some(Commands::Sync { action }) => sync::run_sync(&config, action).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Credentials { action }) => {
            credentials::run_credentials(&config, action).await
        }
        Some(Commands::Records { action }) => credentials::run_records(&config, action).await,
        #[cfg(feature = "ssh")]
        Some(Commands::Shell { target, key }) => shell::run_shell(&config, &target, key).await,
        None => {
            println!("vaultline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
