// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vaultline shell` command implementation.
//!
//! Opens one non-persistent session through a local registry and bridges it
//! to the terminal: stdin is forwarded as channel input, channel output is
//! copied to stdout and stderr. Ends when stdin closes or the session drops.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::debug;

use vaultline_config::VaultlineConfig;
use vaultline_core::{AuthMethod, ConnectionCredential, VaultlineError};

use crate::platform::device_monitors;

const DEFAULT_PORT: u16 = 22;

/// Optional passphrase for an encrypted private key.
const KEY_PASSPHRASE_ENV_VAR: &str = "VAULTLINE_KEY_PASSPHRASE";

/// Secret material from which an [`AuthMethod`] is built per session.
pub enum AuthSource {
    Key {
        private_key: SecretString,
        passphrase: Option<SecretString>,
    },
    Password(SecretString),
}

impl AuthSource {
    /// Reads the private key at `key`, or prompts for a password.
    pub async fn load(key: Option<&Path>) -> Result<Self, VaultlineError> {
        match key {
            Some(path) => {
                let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                    VaultlineError::Config(format!("cannot read key {}: {e}", path.display()))
                })?;
                let passphrase = std::env::var(KEY_PASSPHRASE_ENV_VAR)
                    .ok()
                    .filter(|p| !p.is_empty())
                    .map(SecretString::from);
                Ok(Self::Key {
                    private_key: SecretString::from(contents),
                    passphrase,
                })
            }
            None => {
                let password = rpassword::prompt_password("Password: ")
                    .map_err(|e| VaultlineError::Internal(format!("cannot read password: {e}")))?;
                Ok(Self::Password(SecretString::from(password)))
            }
        }
    }

    pub fn method(&self) -> AuthMethod {
        let copy = |s: &SecretString| SecretString::from(s.expose_secret().to_string());
        match self {
            Self::Key {
                private_key,
                passphrase,
            } => AuthMethod::Key {
                private_key: copy(private_key),
                passphrase: passphrase.as_ref().map(copy),
            },
            Self::Password(password) => AuthMethod::Password(copy(password)),
        }
    }
}

/// Parses `user@host[:port]`. IPv6 literals go in brackets: `user@[::1]:22`.
pub fn parse_target(target: &str, auth: AuthMethod) -> Result<ConnectionCredential, VaultlineError> {
    let invalid = || {
        VaultlineError::Config(format!("invalid target {target:?}, expected user@host[:port]"))
    };

    let (username, endpoint) = target.rsplit_once('@').ok_or_else(invalid)?;
    if username.is_empty() || endpoint.is_empty() {
        return Err(invalid());
    }

    let (host, port) = if let Some(rest) = endpoint.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        match after.strip_prefix(':') {
            Some(port) => (host, port.parse().map_err(|_| invalid())?),
            None if after.is_empty() => (host, DEFAULT_PORT),
            None => return Err(invalid()),
        }
    } else {
        match endpoint.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (endpoint, DEFAULT_PORT),
        }
    };
    if host.is_empty() || port == 0 {
        return Err(invalid());
    }

    Ok(ConnectionCredential {
        host: host.to_string(),
        port,
        username: username.to_string(),
        auth,
    })
}

/// Runs the `vaultline shell` command.
pub async fn run_shell(
    config: &VaultlineConfig,
    target: &str,
    key: Option<PathBuf>,
) -> Result<(), VaultlineError> {
    let auth = AuthSource::load(key.as_deref()).await?;
    let credential = parse_target(target, auth.method())?;
    let (battery, _) = device_monitors(&config.device);
    let registry = crate::serve::build_registry(config, battery);

    let session = registry.connect_session(credential, false).await?;
    let mut state = session.state_changes();
    let stdout = spawn_copy(session.subscribe_output()?, Output::Stdout);
    let stderr = spawn_copy(session.subscribe_errors()?, Output::Stderr);

    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; 4096];
    loop {
        tokio::select! {
            read = stdin.read(&mut buf) => {
                let n = read.map_err(|e| VaultlineError::Internal(format!("stdin: {e}")))?;
                if n == 0 {
                    debug!("stdin closed");
                    break;
                }
                session.write_input(&buf[..n]).await?;
            }
            changed = state.changed() => {
                let current = *state.borrow_and_update();
                if changed.is_err() || !current.is_active() {
                    if let Some(error) = session.last_error() {
                        eprintln!("\r\nconnection closed: {error}");
                    }
                    break;
                }
            }
        }
    }

    registry.close_all_sessions().await;
    let _ = stdout.await;
    let _ = stderr.await;
    Ok(())
}

#[derive(Clone, Copy)]
enum Output {
    Stdout,
    Stderr,
}

fn spawn_copy(
    mut rx: broadcast::Receiver<Vec<u8>>,
    output: Output,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut out: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = match output {
            Output::Stdout => Box::new(tokio::io::stdout()),
            Output::Stderr => Box::new(tokio::io::stderr()),
        };
        loop {
            match rx.recv().await {
                Ok(chunk) => {
                    if out.write_all(&chunk).await.is_err() || out.flush().await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "terminal fell behind session output");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
