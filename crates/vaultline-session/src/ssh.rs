// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSH transport backed by libssh2.
//!
//! libssh2 is blocking, so handshakes and writes run on the blocking pool
//! and channel output is read by a dedicated thread that polls the
//! non-blocking channel.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use vaultline_core::{
    AuthMethod, ChannelOutput, OpenedShell, PtyRequest, ShellChannel, ShellConnector,
    ShellTransport, VaultlineError,
};

const READ_CHUNK: usize = 8 * 1024;
const IDLE_POLL: Duration = Duration::from_millis(10);
const OUTPUT_QUEUE: usize = 256;

/// libssh2 keep-alive interval, in seconds. Below every policy cadence, so
/// each policy tick finds a packet due. Zero would make `keepalive_send`
/// a no-op.
const KEEPALIVE_INTERVAL_SECS: u32 = 2;

/// Opens SSH sessions over TCP.
#[derive(Debug, Clone)]
pub struct Ssh2Connector {
    connect_timeout: Duration,
}

impl Ssh2Connector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ShellConnector for Ssh2Connector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn ShellTransport>, VaultlineError> {
        let target = host.to_string();
        let host = target.clone();
        let timeout = self.connect_timeout;
        let session = blocking(move || {
            let addr = (host.as_str(), port)
                .to_socket_addrs()
                .map_err(|e| connection_error(format!("cannot resolve {host}"), e))?
                .next()
                .ok_or_else(|| VaultlineError::Connection {
                    message: format!("no address for {host}"),
                    source: None,
                })?;
            let tcp = TcpStream::connect_timeout(&addr, timeout)
                .map_err(|e| connection_error(format!("cannot reach {addr}"), e))?;
            let mut session = ssh2::Session::new()
                .map_err(|e| connection_error("cannot create ssh session".to_string(), e))?;
            session.set_tcp_stream(tcp);
            session.set_timeout(timeout.as_millis().try_into().unwrap_or(u32::MAX));
            session
                .handshake()
                .map_err(|e| connection_error("ssh handshake failed".to_string(), e))?;
            enable_keepalive(&session);
            Ok(session)
        })
        .await?;

        Ok(Box::new(Ssh2Transport {
            session,
            host: target,
        }))
    }
}

/// Keep-alives are driven by the session's own timer; libssh2 only needs
/// an interval so it actually writes a packet when asked.
fn enable_keepalive(session: &ssh2::Session) {
    session.set_keepalive(false, KEEPALIVE_INTERVAL_SECS);
}

struct Ssh2Transport {
    session: ssh2::Session,
    host: String,
}

#[async_trait]
impl ShellTransport for Ssh2Transport {
    async fn authenticate(
        &mut self,
        username: &str,
        auth: &AuthMethod,
    ) -> Result<(), VaultlineError> {
        let session = self.session.clone();
        let user = username.to_string();
        let host = self.host.clone();
        let secret = match auth {
            AuthMethod::Password(password) => Secret::Password(Zeroizing::new(
                password.expose_secret().to_string(),
            )),
            AuthMethod::Key {
                private_key,
                passphrase,
            } => Secret::Key {
                private_key: Zeroizing::new(private_key.expose_secret().to_string()),
                passphrase: passphrase
                    .as_ref()
                    .map(|p| Zeroizing::new(p.expose_secret().to_string())),
            },
        };

        blocking(move || {
            let attempt = match &secret {
                Secret::Password(password) => session.userauth_password(&user, password),
                Secret::Key {
                    private_key,
                    passphrase,
                } => session.userauth_pubkey_memory(
                    &user,
                    None,
                    private_key,
                    passphrase.as_ref().map(|p| p.as_str()),
                ),
            };
            if let Err(e) = attempt {
                debug!(error = %e, "ssh userauth failed");
            }
            if session.authenticated() {
                Ok(())
            } else {
                Err(VaultlineError::AuthRejected {
                    username: user,
                    host,
                })
            }
        })
        .await
    }

    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<OpenedShell, VaultlineError> {
        let session = self.session.clone();
        let pty = pty.clone();
        let channel = blocking(move || {
            let mut channel = session
                .channel_session()
                .map_err(|e| connection_error("cannot open channel".to_string(), e))?;
            channel
                .request_pty(
                    &pty.term,
                    None,
                    Some((u32::from(pty.cols), u32::from(pty.rows), 0, 0)),
                )
                .map_err(|e| connection_error("pty request refused".to_string(), e))?;
            channel
                .shell()
                .map_err(|e| connection_error("shell request refused".to_string(), e))?;
            session.set_blocking(false);
            Ok(channel)
        })
        .await?;

        let channel = Arc::new(Mutex::new(channel));
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(OUTPUT_QUEUE);

        let reader_channel = Arc::clone(&channel);
        let reader_closed = Arc::clone(&closed);
        std::thread::Builder::new()
            .name("vaultline-ssh-reader".to_string())
            .spawn(move || read_loop(reader_channel, reader_closed, tx))
            .map_err(|e| VaultlineError::Internal(format!("cannot spawn ssh reader: {e}")))?;

        Ok(OpenedShell {
            channel: Box::new(Ssh2Channel {
                session: self.session.clone(),
                channel,
                closed,
            }),
            output: rx,
        })
    }

    async fn close(&mut self) -> Result<(), VaultlineError> {
        let session = self.session.clone();
        blocking(move || {
            session.set_blocking(true);
            if let Err(e) = session.disconnect(None, "closed by client", None) {
                debug!(error = %e, "ssh disconnect on dead transport");
            }
            Ok(())
        })
        .await
    }
}

enum Secret {
    Password(Zeroizing<String>),
    Key {
        private_key: Zeroizing<String>,
        passphrase: Option<Zeroizing<String>>,
    },
}

struct Ssh2Channel {
    session: ssh2::Session,
    channel: Arc<Mutex<ssh2::Channel>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ShellChannel for Ssh2Channel {
    async fn write(&self, data: &[u8]) -> Result<(), VaultlineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VaultlineError::ChannelClosed);
        }
        let channel = Arc::clone(&self.channel);
        let data = data.to_vec();
        blocking(move || {
            let mut written = 0;
            while written < data.len() {
                let result = lock(&channel).write(&data[written..]);
                match result {
                    Ok(0) => return Err(VaultlineError::ChannelClosed),
                    Ok(n) => written += n,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::sleep(IDLE_POLL),
                    Err(e) => return Err(connection_error("channel write failed".to_string(), e)),
                }
            }
            Ok(())
        })
        .await
    }

    async fn send_keepalive(&self) -> Result<(), VaultlineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VaultlineError::ChannelClosed);
        }
        let session = self.session.clone();
        blocking(move || match session.keepalive_send() {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ssh2::ErrorCode::Session(-37) => Ok(()),
            Err(e) => Err(connection_error("keep-alive failed".to_string(), e)),
        })
        .await
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), VaultlineError> {
        let channel = Arc::clone(&self.channel);
        blocking(move || {
            lock(&channel)
                .request_pty_size(u32::from(cols), u32::from(rows), None, None)
                .map_err(|e| connection_error("pty resize failed".to_string(), e))
        })
        .await
    }

    async fn close(&self) -> Result<(), VaultlineError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let channel = Arc::clone(&self.channel);
        blocking(move || {
            if let Err(e) = lock(&channel).close() {
                debug!(error = %e, "channel close");
            }
            Ok(())
        })
        .await
    }
}

fn read_loop(
    channel: Arc<Mutex<ssh2::Channel>>,
    closed: Arc<AtomicBool>,
    tx: mpsc::Sender<ChannelOutput>,
) {
    let mut buf = vec![0u8; READ_CHUNK];
    while !closed.load(Ordering::Acquire) {
        let mut chunks = Vec::new();
        let eof = {
            let mut guard = lock(&channel);
            match read_available(&mut *guard, &mut buf) {
                Ok(Some(bytes)) => chunks.push(ChannelOutput::Stdout(bytes)),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "ssh stdout read failed");
                    break;
                }
            }
            match read_available(&mut guard.stderr(), &mut buf) {
                Ok(Some(bytes)) => chunks.push(ChannelOutput::Stderr(bytes)),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "ssh stderr read failed");
                    break;
                }
            }
            guard.eof()
        };

        let idle = chunks.is_empty();
        for chunk in chunks {
            if tx.blocking_send(chunk).is_err() {
                return;
            }
        }
        if eof {
            break;
        }
        if idle {
            std::thread::sleep(IDLE_POLL);
        }
    }
    // Dropping `tx` tells the session the remote side is gone.
}

fn read_available(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<Option<Vec<u8>>> {
    match reader.read(buf) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(buf[..n].to_vec())),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, VaultlineError>
where
    F: FnOnce() -> Result<T, VaultlineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VaultlineError::Internal(format!("blocking ssh task failed: {e}")))?
}

fn connection_error(
    message: String,
    source: impl std::error::Error + Send + Sync + 'static,
) -> VaultlineError {
    VaultlineError::Connection {
        message,
        source: Some(Box::new(source)),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
