// SPDX-License-Identifier: AGPL-3.0-only

//! Software peer: a CPU stand-in for the accelerator endpoint.
//!
//! Speaks the same datagram contract as the FPGA endpoint: decode request,
//! infer, threshold, reply with the label (echoing the round id under
//! correlated framing). This enables:
//!
//! 1. **CI without hardware**: end-to-end rounds against loopback.
//! 2. **Baseline for hardware validation**: a peer running the same model
//!    must always match; a hardware peer that does not is diverging.
//!
//! Malformed requests are logged and dropped, never answered.

use crate::engine::InferenceEngine;
use crate::error::{HarnessError, Result};
use finn_wire::codec::MAX_DATAGRAM_LEN;
use finn_wire::{ModelContract, WireFormat};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to one received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// Request answered with `label`
    Answered {
        /// Requesting address
        from: SocketAddr,
        /// Label sent back
        label: i32,
    },
    /// Request could not be decoded or evaluated; nothing was sent
    Dropped {
        /// Requesting address
        from: SocketAddr,
    },
    /// No request before the poll timeout
    Idle,
}

/// UDP endpoint answering requests with a local engine
#[derive(Debug)]
pub struct SoftwarePeer {
    socket: UdpSocket,
    contract: ModelContract,
    wire: WireFormat,
    engine: Box<dyn InferenceEngine>,
    buf: Vec<u8>,
}

impl SoftwarePeer {
    /// Bind a peer at `addr`
    ///
    /// # Errors
    ///
    /// Returns a configuration error on width disagreement, or a transport
    /// error if the socket cannot be bound.
    pub fn bind(
        addr: SocketAddr,
        contract: ModelContract,
        engine: Box<dyn InferenceEngine>,
    ) -> Result<Self> {
        contract.validate()?;
        if engine.input_width() != contract.input_width {
            return Err(HarnessError::configuration(format!(
                "peer engine expects {} inputs, contract declares {}",
                engine.input_width(),
                contract.input_width
            )));
        }
        let socket = UdpSocket::bind(addr).map_err(|e| HarnessError::transport("bind", e))?;
        let local = socket
            .local_addr()
            .map_err(|e| HarnessError::transport("bind", e))?;
        info!("Software peer listening on {local} ({} engine)", engine.engine_type());
        Ok(Self {
            socket,
            wire: contract.wire_format(),
            contract,
            engine,
            buf: vec![0u8; MAX_DATAGRAM_LEN],
        })
    }

    /// Bound address
    ///
    /// # Errors
    ///
    /// Returns a transport error if the socket address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| HarnessError::transport("bind", e))
    }

    /// Wait up to `poll` for one request and serve it. `None` or a zero
    /// duration blocks until a datagram arrives.
    ///
    /// # Errors
    ///
    /// Returns a transport error if receiving or replying fails.
    pub fn serve_once(&mut self, poll: Option<Duration>) -> Result<Served> {
        self.socket
            .set_read_timeout(poll.filter(|d| !d.is_zero()))
            .map_err(|e| HarnessError::transport("receive", e))?;

        let (n, from) = match self.socket.recv_from(&mut self.buf) {
            Ok(r) => r,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(Served::Idle);
            }
            Err(e) => return Err(HarnessError::transport("receive", e)),
        };

        let request = match self.wire.decode_request(&self.buf[..n], self.contract.input_width) {
            Ok(r) => r,
            Err(e) => {
                warn!("Dropping request from {from}: {e}");
                return Ok(Served::Dropped { from });
            }
        };
        let confidence = match self.engine.infer(&request.values) {
            Ok(c) => c,
            Err(e) => {
                warn!("Dropping request from {from}: {e}");
                return Ok(Served::Dropped { from });
            }
        };
        let label = self.contract.threshold.classify(confidence).value();
        let reply = self
            .wire
            .encode_response(request.round_id.unwrap_or_default(), label);
        self.socket
            .send_to(&reply, from)
            .map_err(|e| HarnessError::transport("send", e))?;
        debug!("Answered {from} with label {label} (confidence {confidence})");
        Ok(Served::Answered { from, label })
    }

    /// Serve until `max_requests` datagrams were handled (forever when `None`)
    ///
    /// # Errors
    ///
    /// Returns the first transport error.
    pub fn serve(&mut self, max_requests: Option<u64>) -> Result<u64> {
        let mut handled = 0u64;
        while max_requests.map_or(true, |max| handled < max) {
            match self.serve_once(None)? {
                Served::Idle => {}
                Served::Answered { .. } | Served::Dropped { .. } => handled += 1,
            }
        }
        Ok(handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::ConstantEngine;
    use finn_wire::ByteOrder;

    fn peer(confidence: f32) -> SoftwarePeer {
        SoftwarePeer::bind(
            "127.0.0.1:0".parse().unwrap(),
            ModelContract::new(2, ByteOrder::Little),
            Box::new(ConstantEngine::new(2, confidence)),
        )
        .unwrap()
    }

    #[test]
    fn answers_with_thresholded_label() {
        let mut p = peer(0.8);
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .send_to(&finn_wire::codec::encode(&[1.0, 2.0], ByteOrder::Little), p.local_addr().unwrap())
            .unwrap();
        let served = p.serve_once(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(
            served,
            Served::Answered {
                from: client.local_addr().unwrap(),
                label: 1
            }
        );
        let mut buf = [0u8; 16];
        let (n, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 0, 0, 0]);
    }

    #[test]
    fn wrong_width_is_dropped() {
        let mut p = peer(0.8);
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(&[0u8; 4], p.local_addr().unwrap()).unwrap();
        let served = p.serve_once(Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(served, Served::Dropped { .. }));
    }

    #[test]
    fn idle_when_nothing_arrives() {
        let mut p = peer(0.1);
        assert_eq!(p.serve_once(Some(Duration::from_millis(20))).unwrap(), Served::Idle);
    }

    #[test]
    fn engine_width_checked_at_bind() {
        let r = SoftwarePeer::bind(
            "127.0.0.1:0".parse().unwrap(),
            ModelContract::new(3, ByteOrder::Little),
            Box::new(ConstantEngine::new(2, 0.5)),
        );
        assert!(r.is_err());
    }
}
