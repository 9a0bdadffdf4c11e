//! Receiving side: a UDP listener on the game host.
//!
//! Counts `STEP` datagrams, remembers who sent the last one and forwards each
//! step on a channel. What the game does with a step (key press, gamepad
//! axis) is up to the channel consumer.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ListenerError;
use crate::wire::{Datagram, decode};

/// Default receive buffer, matching the desktop listener's default.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// One accepted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedStep {
    pub from: SocketAddr,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    /// Bound, no step seen yet.
    Listening,
    /// Last step came from `peer`.
    Receiving { peer: SocketAddr },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerStatus {
    pub listening: bool,
    pub connection: ConnectionStatus,
    pub steps_received: u64,
    /// Steps counted but not forwarded because the consumer lagged.
    pub steps_dropped: u64,
    pub unknown_received: u64,
    pub last_step_at: Option<DateTime<Utc>>,
    pub port: u16,
}

pub struct StepListener {
    socket: UdpSocket,
    buffer_size: usize,
    status: Arc<Mutex<ListenerStatus>>,
}

impl StepListener {
    /// Bind on all IPv4 interfaces.
    pub async fn bind(port: u16, buffer_size: usize) -> Result<Self, ListenerError> {
        Self::bind_addr((Ipv4Addr::UNSPECIFIED, port).into(), buffer_size).await
    }

    pub async fn bind_addr(addr: SocketAddr, buffer_size: usize) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let port = socket.local_addr()?.port();

        tracing::info!(%addr, port, "step listener bound");

        Ok(Self {
            socket,
            buffer_size: buffer_size.max(STEP_MIN_BUFFER),
            status: Arc::new(Mutex::new(ListenerStatus {
                listening: false,
                connection: ConnectionStatus::Disconnected,
                steps_received: 0,
                steps_dropped: 0,
                unknown_received: 0,
                last_step_at: None,
                port,
            })),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn status(&self) -> ListenerStatus {
        self.status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Receive until cancelled. Each step is counted and forwarded on `tx`.
    ///
    /// Forwarding never waits: a full channel drops the step (counted in
    /// `steps_dropped`) and a dropped receiver does not stop the loop.
    pub async fn run(
        &self,
        tx: mpsc::Sender<ReceivedStep>,
        cancel: CancellationToken,
    ) -> Result<(), ListenerError> {
        self.update(|st| {
            st.listening = true;
            st.connection = ConnectionStatus::Listening;
        });

        let mut buf = vec![0u8; self.buffer_size];
        let result = loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((n, from)) => self.handle_datagram(&buf[..n], from, &tx),
                        Err(e) => {
                            tracing::error!("step listener receive failed: {e}");
                            break Err(ListenerError::Io(e));
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("step listener: cancellation requested, shutting down");
                    break Ok(());
                }
            }
        };

        self.update(|st| {
            st.listening = false;
            st.connection = ConnectionStatus::Disconnected;
        });
        result
    }

    fn handle_datagram(
        &self,
        bytes: &[u8],
        from: SocketAddr,
        tx: &mpsc::Sender<ReceivedStep>,
    ) {
        match decode(bytes) {
            Datagram::Step => {
                let at = Utc::now();
                let total = self.update(|st| {
                    st.steps_received += 1;
                    st.last_step_at = Some(at);
                    st.connection = ConnectionStatus::Receiving { peer: from };
                    st.steps_received
                });
                tracing::debug!(%from, total, "step received");

                match tx.try_send(ReceivedStep { from, at }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.update(|st| st.steps_dropped += 1);
                        tracing::debug!(%from, "step channel full, step not forwarded");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::trace!("step receiver dropped");
                    }
                }
            }
            Datagram::Unknown(text) => {
                self.update(|st| st.unknown_received += 1);
                tracing::debug!(%from, message = %text, "unknown datagram");
            }
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut ListenerStatus) -> R) -> R {
        let mut st = self.status.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut st)
    }
}

/// Smallest buffer that still holds a full step payload.
const STEP_MIN_BUFFER: usize = 16;
