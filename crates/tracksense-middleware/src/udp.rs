//! UDP transport.
//!
//! Each datagram carries exactly one frame in the 16-byte layout described in
//! [`codec`][crate::codec]. Outbound frames are fanned out to every configured
//! peer, which gives the point-to-multipoint behaviour of the bus without
//! multicast support from the host.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use tracing::{debug, warn};
use tracksense_types::{BusError, Frame};

use crate::bus::BusTransport;
use crate::codec::{WIRE_FRAME_LEN, decode_wire, encode_wire};

/// Non-blocking UDP socket bound to the node's bus address.
#[derive(Debug)]
pub struct UdpBus {
    socket: UdpSocket,
    peers: Vec<SocketAddr>,
}

impl UdpBus {
    /// Bind `bind` and switch the socket to non-blocking mode.
    pub fn open(bind: SocketAddr, peers: Vec<SocketAddr>) -> Result<Self, BusError> {
        let open_err = |source| BusError::Open {
            addr: bind.to_string(),
            source,
        };
        let socket = UdpSocket::bind(bind).map_err(open_err)?;
        socket.set_nonblocking(true).map_err(open_err)?;
        debug!(%bind, peers = peers.len(), "udp bus opened");
        Ok(Self { socket, peers })
    }

    /// Address the socket actually bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.socket.local_addr()?)
    }

    /// A second handle on the same socket, so reads and writes can live on
    /// different threads.
    pub fn try_clone(&self) -> Result<Self, BusError> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            peers: self.peers.clone(),
        })
    }
}

impl BusTransport for UdpBus {
    /// Every peer gets one attempt, even after an earlier peer failed. The
    /// first failure is returned once all peers have been tried.
    fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        let wire = encode_wire(frame);
        let mut first_err = None;
        for peer in &self.peers {
            let err = match self.socket.send_to(&wire, peer) {
                Ok(WIRE_FRAME_LEN) => continue,
                Ok(written) => BusError::ShortWrite {
                    written,
                    expected: WIRE_FRAME_LEN,
                },
                Err(e) => BusError::Io(e),
            };
            debug!(%peer, error = %err, "udp send to peer failed");
            first_err.get_or_insert(err);
        }
        first_err.map_or(Ok(()), Err)
    }

    fn try_recv(&mut self) -> Result<Option<Frame>, BusError> {
        // One spare byte so oversized datagrams are detected rather than
        // silently truncated to a valid-looking record.
        let mut buf = [0u8; WIRE_FRAME_LEN + 1];
        loop {
            let (n, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // ICMP port-unreachable from a peer that is not up yet.
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(BusError::Io(e)),
            };
            match decode_wire(&buf[..n]) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    warn!(%from, bytes = n, error = %e, "dropping malformed datagram");
                }
            }
        }
    }
}
