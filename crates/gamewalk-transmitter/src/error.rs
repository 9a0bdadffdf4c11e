//! Error types for the UDP boundary.

use std::net::SocketAddr;

use thiserror::Error;

use crate::transmitter::TransmitterState;

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("cannot resolve {host}:{port}: {source}")]
    Resolution {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("{host}:{port} resolved to no addresses")]
    NoAddress { host: String, port: u16 },

    #[error("cannot open UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("send to {target} failed: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("transmitter is {0}, expected {1}")]
    InvalidState(TransmitterState, TransmitterState),
}

impl TransmitError {
    /// Host could not be turned into an address.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            TransmitError::Resolution { .. } | TransmitError::NoAddress { .. }
        )
    }

    /// Socket could not be created or a datagram could not be written.
    pub fn is_socket_failure(&self) -> bool {
        matches!(self, TransmitError::Socket(_) | TransmitError::Send { .. })
    }
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot bind UDP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("listener io error: {0}")]
    Io(#[from] std::io::Error),
}
