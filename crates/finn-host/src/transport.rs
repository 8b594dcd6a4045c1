// SPDX-License-Identifier: AGPL-3.0-only

//! One-shot datagram exchange with the remote endpoint
//!
//! Every exchange owns its socket: bind → connect → send one datagram →
//! receive until the deadline → drop. Nothing survives between exchanges, so
//! a late reply to round K lands on a closed port instead of round K+1.
//!
//! Reply authenticity:
//! - the socket is connected to the peer, and the source address of each
//!   datagram is checked again on receipt
//! - the caller's `accept` predicate can reject stale replies (round id)
//! - rejected datagrams are counted and do not extend the deadline

use crate::error::{HarnessError, Result};
use bytes::Bytes;
use finn_wire::codec::MAX_DATAGRAM_LEN;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Reference reply wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Endpoint configuration, fixed for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Remote endpoint address
    pub peer: SocketAddr,
    /// Local bind address (port 0 = ephemeral)
    pub bind: SocketAddr,
    /// Reply wait bound per exchange
    pub timeout: Duration,
}

impl TransportConfig {
    /// Configuration binding an ephemeral port of the peer's address family
    pub fn new(peer: SocketAddr, timeout: Duration) -> Self {
        let ip = match peer.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        Self {
            peer,
            bind: SocketAddr::new(ip, 0),
            timeout,
        }
    }

    /// Resolve `host:port` and build a configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the host does not resolve.
    pub fn resolve(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = (host, port)
            .to_socket_addrs()
            .map_err(|e| HarnessError::configuration(format!("cannot resolve {host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| HarnessError::configuration(format!("{host}:{port} has no address")))?;
        Ok(Self::new(peer, timeout))
    }

    /// Replace the local bind address
    #[must_use]
    pub const fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Check the configuration before any socket is opened
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero timeout, an unspecified peer
    /// address, port 0, or mixed address families.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(HarnessError::configuration("timeout must be greater than zero"));
        }
        if self.peer.ip().is_unspecified() || self.peer.port() == 0 {
            return Err(HarnessError::configuration(format!(
                "peer address {} is not routable",
                self.peer
            )));
        }
        if self.peer.is_ipv4() != self.bind.is_ipv4() {
            return Err(HarnessError::configuration(format!(
                "bind {} and peer {} use different address families",
                self.bind, self.peer
            )));
        }
        Ok(())
    }
}

/// Outcome of one exchange
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Accepted reply, or `None` if the deadline passed first
    pub reply: Option<Bytes>,
    /// Local address the exchange used (released on return)
    pub local_addr: SocketAddr,
    /// Time from send to reply or deadline
    pub elapsed: Duration,
    /// Datagrams rejected as foreign or stale
    pub discarded: usize,
}

/// Datagram transport client
#[derive(Debug, Clone)]
pub struct UdpTransport {
    config: TransportConfig,
}

impl UdpTransport {
    /// Create a transport
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Transport configuration
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send one request and wait for one accepted reply
    ///
    /// Blocks at most `timeout` after the send. A timeout is `Ok` with
    /// `reply == None`; every other socket failure is a transport error.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Transport`] if bind, connect, send or receive
    /// fails for any reason other than the deadline passing.
    pub fn exchange<F>(&self, request: &[u8], mut accept: F) -> Result<Exchange>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let peer = self.config.peer;
        let socket =
            UdpSocket::bind(self.config.bind).map_err(|e| HarnessError::transport("bind", e))?;
        socket
            .connect(peer)
            .map_err(|e| HarnessError::transport("connect", e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| HarnessError::transport("bind", e))?;

        let sent = socket
            .send(request)
            .map_err(|e| HarnessError::transport("send", e))?;
        if sent != request.len() {
            return Err(HarnessError::transport(
                "send",
                std::io::Error::new(
                    ErrorKind::WriteZero,
                    format!("sent {sent} of {} bytes", request.len()),
                ),
            ));
        }
        let start = Instant::now();
        let deadline = start + self.config.timeout;
        debug!("Sent {sent} bytes {local_addr} -> {peer}");

        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let mut discarded = 0usize;
        let reply = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break None;
            }
            socket
                .set_read_timeout(Some(remaining))
                .map_err(|e| HarnessError::transport("receive", e))?;

            match socket.recv_from(&mut buf) {
                Ok((n, src)) if src != peer => {
                    warn!("Discarding {n}-byte datagram from unexpected source {src}");
                    discarded += 1;
                }
                Ok((n, _)) if !accept(&buf[..n]) => {
                    warn!("Discarding stale {n}-byte reply from {peer}");
                    discarded += 1;
                }
                Ok((n, _)) => break Some(Bytes::copy_from_slice(&buf[..n])),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break None;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(HarnessError::transport("receive", e)),
            }
        };

        let elapsed = start.elapsed();
        match &reply {
            Some(r) => debug!("Reply of {} bytes from {peer} after {elapsed:?}", r.len()),
            None => debug!("No reply from {peer} within {:?}", self.config.timeout),
        }
        debug!("Closing socket {local_addr}");

        Ok(Exchange {
            reply,
            local_addr,
            elapsed,
            discarded,
        })
    }
}
