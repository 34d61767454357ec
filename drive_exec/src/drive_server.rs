//! # Drive Server Module
//!
//! This module abstracts over the networking side of the drive executable. Commands arrive as UDP
//! datagrams from any client on the network, and replies are sent back to the address each
//! command came from.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io,
    net::{SocketAddr, UdpSocket},
    time::Duration,
};
use comms_if::drive::Reply;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A datagram transport the drive loop recieves commands from.
pub trait DatagramTransport {
    /// Recieve a single datagram into `buf`, waiting at most the transport's recieve timeout.
    ///
    /// Returns `Ok(None)` if no datagram arrived in time.
    fn recv_datagram(
        &mut self,
        buf: &mut [u8]
    ) -> Result<Option<(usize, SocketAddr)>, TransportError>;

    /// Send a reply to the given address.
    fn send_reply(&mut self, reply: Reply, addr: SocketAddr) -> Result<(), TransportError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// UDP server accepting drive commands.
pub struct DriveServer {
    socket: UdpSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`DriveServer`]
#[derive(thiserror::Error, Debug)]
pub enum DriveServerError {
    #[error("Could not bind the command socket to {0}: {1}")]
    BindError(SocketAddr, io::Error),

    #[error("Could not set the socket option {0}: {1}")]
    SocketOptionError(&'static str, io::Error),
}

/// Socket errors seen while serving commands, split by whether the socket is still usable.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The operation failed but the socket can still be used.
    #[error("Transient socket error: {0}")]
    Transient(io::Error),

    /// The socket can't be used any more.
    #[error("Fatal socket error: {0}")]
    Fatal(io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveServer {

    /// Bind a new server to the given address.
    ///
    /// Recieves on the server wait at most `recv_timeout`, which must be non-zero.
    pub fn new(addr: SocketAddr, recv_timeout: Duration) -> Result<Self, DriveServerError> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| DriveServerError::BindError(addr, e))?;

        socket.set_read_timeout(Some(recv_timeout))
            .map_err(|e| DriveServerError::SocketOptionError("read_timeout", e))?;

        Ok(Self { socket })
    }

    /// The address the server is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for DriveServer {
    fn recv_datagram(
        &mut self,
        buf: &mut [u8]
    ) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        match self.socket.recv_from(buf) {
            Ok((len, addr)) => Ok(Some((len, addr))),
            Err(e) => match e.kind() {
                // Timeouts show up as either depending on the platform
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Ok(None),
                _ => Err(TransportError::classify(e))
            }
        }
    }

    fn send_reply(&mut self, reply: Reply, addr: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .send_to(reply.as_bytes(), addr)
            .map(|_| ())
            .map_err(TransportError::classify)
    }
}

impl TransportError {
    /// Sort an IO error from the socket into transient or fatal.
    ///
    /// Errors which mean the socket itself is unusable are fatal. Everything else, including
    /// connection reset/refused errors caused by ICMP replies to earlier sends, is transient.
    pub fn classify(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::AddrNotAvailable => TransportError::Fatal(e),
            _ => TransportError::Transient(e)
        }
    }

    /// Returns true if the socket can't be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Fatal(_))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
