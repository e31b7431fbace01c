// SPDX-FileCopyrightText: 2026 Vaultline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent remote shell sessions for Vaultline.
//!
//! A [`ConnectionSession`] owns one connection (transport socket plus
//! interactive channel), a battery-aware keep-alive timer and a broadcast
//! fan-out of the channel output. The [`SessionRegistry`] is the
//! process-wide table of sessions and the sole owner of the presence
//! notification and wake-lock.
//!
//! Enable the `ssh` feature for [`Ssh2Connector`], the libssh2 transport.

pub mod fanout;
pub mod registry;
pub mod session;
#[cfg(feature = "ssh")]
pub mod ssh;

pub use fanout::OutputFanout;
pub use registry::SessionRegistry;
pub use session::{ConnectionSession, SessionDeps, SessionOptions};
#[cfg(feature = "ssh")]
pub use ssh::Ssh2Connector;
