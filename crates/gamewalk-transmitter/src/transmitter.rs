//! Event transmitter: one long-lived UDP socket, one spawned send per step.
//!
//! Lifecycle is `Uninitialized -> Starting -> Running -> Stopped`. `Stopped`
//! is terminal; a new target needs a new `Transmitter`.
//!
//! `send_event` is called from the sensor-callback thread. It only reads an
//! atomic and spawns a task onto the tokio runtime captured at `start`, so it
//! never waits on the network. Failures past that point are logged, counted
//! and dropped. Nothing is retried.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use gamewalk_core::StepEvent;
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::RwLock;

use crate::error::TransmitError;
use crate::wire::STEP_PAYLOAD;

const SETTLE_POLL: Duration = Duration::from_millis(5);

// ─── Config ──────────────────────────────────────────────────────

/// Remote endpoint. Immutable for the lifetime of a transmitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitterConfig {
    pub remote_host: String,
    pub remote_port: u16,
}

impl TransmitterConfig {
    pub fn new(remote_host: impl Into<String>, remote_port: u16) -> Self {
        Self {
            remote_host: remote_host.into(),
            remote_port,
        }
    }
}

impl fmt::Display for TransmitterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.remote_host, self.remote_port)
    }
}

// ─── State ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmitterState {
    Uninitialized,
    Starting,
    Running,
    Stopped,
}

impl TransmitterState {
    fn as_u8(self) -> u8 {
        match self {
            TransmitterState::Uninitialized => 0,
            TransmitterState::Starting => 1,
            TransmitterState::Running => 2,
            TransmitterState::Stopped => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => TransmitterState::Uninitialized,
            1 => TransmitterState::Starting,
            2 => TransmitterState::Running,
            _ => TransmitterState::Stopped,
        }
    }
}

impl fmt::Display for TransmitterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransmitterState::Uninitialized => "uninitialized",
            TransmitterState::Starting => "starting",
            TransmitterState::Running => "running",
            TransmitterState::Stopped => "stopped",
        })
    }
}

// ─── Stats ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TransmitStats {
    submitted: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of the transmitter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Steps handed to a send task.
    pub submitted: u64,
    /// Datagrams written to the socket.
    pub sent: u64,
    /// Send tasks that hit an error.
    pub failed: u64,
    /// Steps refused because the transmitter was not running.
    pub rejected: u64,
}

impl TransmitStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

// ─── Transmitter ─────────────────────────────────────────────────

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    socket: RwLock<Option<Arc<UdpSocket>>>,
    target: OnceLock<SocketAddr>,
    local: OnceLock<SocketAddr>,
    runtime: OnceLock<Handle>,
    stats: TransmitStats,
}

/// Cheap to clone; all clones drive the same socket.
#[derive(Debug, Clone)]
pub struct Transmitter {
    config: Arc<TransmitterConfig>,
    shared: Arc<Shared>,
}

impl Transmitter {
    pub fn new(config: TransmitterConfig) -> Self {
        Self {
            config: Arc::new(config),
            shared: Arc::new(Shared {
                state: AtomicU8::new(TransmitterState::Uninitialized.as_u8()),
                socket: RwLock::new(None),
                target: OnceLock::new(),
                local: OnceLock::new(),
                runtime: OnceLock::new(),
                stats: TransmitStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }

    pub fn state(&self) -> TransmitterState {
        TransmitterState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Resolved remote address, once started.
    pub fn target(&self) -> Option<SocketAddr> {
        self.shared.target.get().copied()
    }

    /// Local (ephemeral) address of the socket, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local.get().copied()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Resolve the remote host and open the socket.
    ///
    /// Must be awaited on the tokio runtime that will carry the send tasks.
    /// On failure the transmitter returns to `Uninitialized`.
    pub async fn start(&self) -> Result<SocketAddr, TransmitError> {
        self.transition(TransmitterState::Uninitialized, TransmitterState::Starting)?;

        match self.open().await {
            Ok((socket, target)) => {
                *self.shared.socket.write().await = Some(Arc::new(socket));

                // stop() may have run while we were resolving.
                if let Err(e) =
                    self.transition(TransmitterState::Starting, TransmitterState::Running)
                {
                    self.shared.socket.write().await.take();
                    return Err(e);
                }

                tracing::info!(
                    remote = %target,
                    local = ?self.local_addr(),
                    host = %self.config,
                    "transmitter running"
                );
                Ok(target)
            }
            Err(e) => {
                let _ = self.transition(TransmitterState::Starting, TransmitterState::Uninitialized);
                tracing::warn!(host = %self.config, "transmitter unavailable: {e}");
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<(UdpSocket, SocketAddr), TransmitError> {
        let target = resolve(&self.config).await?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(TransmitError::Socket)?;

        // Only a fully opened socket records its addresses: a failed start
        // leaves these empty for the retry.
        if let Ok(local) = socket.local_addr() {
            let _ = self.shared.local.set(local);
        }
        let _ = self.shared.target.set(target);
        let _ = self.shared.runtime.set(Handle::current());

        Ok((socket, target))
    }

    /// Fire-and-forget: queue one `STEP` datagram and return.
    ///
    /// Never blocks and never fails loudly; a transmitter that is not running
    /// logs and counts the step as rejected.
    pub fn send_event(&self, event: StepEvent) {
        if let Err(e) = self.submit(event) {
            tracing::warn!(source = %event.source, at_ms = event.at_ms, "step not sent: {e}");
        }
    }

    /// Like [`send_event`](Self::send_event) but reports whether the step was
    /// handed to a send task. Says nothing about the datagram itself.
    pub fn submit(&self, event: StepEvent) -> Result<(), TransmitError> {
        let state = self.state();
        let ready = match (state, self.shared.target.get(), self.shared.runtime.get()) {
            (TransmitterState::Running, Some(target), Some(runtime)) => Some((*target, runtime)),
            _ => None,
        };

        let Some((target, runtime)) = ready else {
            self.shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(TransmitError::InvalidState(state, TransmitterState::Running));
        };

        self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            shared.deliver(target, event).await;
        });
        Ok(())
    }

    /// Wait until every submitted step was either sent or dropped, at most
    /// `within`. Returns `true` if nothing is left in flight.
    pub async fn settle(&self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let stats = self.stats();
            if stats.sent + stats.failed >= stats.submitted {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }

    /// Close the socket. Idempotent; later sends are rejected.
    ///
    /// Sends already spawned keep their own handle on the socket and may
    /// still complete after this returns.
    pub async fn stop(&self) {
        let previous = TransmitterState::from_u8(
            self.shared
                .state
                .swap(TransmitterState::Stopped.as_u8(), Ordering::AcqRel),
        );
        self.shared.socket.write().await.take();

        if previous != TransmitterState::Stopped {
            let stats = self.stats();
            tracing::info!(
                host = %self.config,
                submitted = stats.submitted,
                sent = stats.sent,
                failed = stats.failed,
                rejected = stats.rejected,
                "transmitter stopped"
            );
        }
    }

    fn transition(
        &self,
        from: TransmitterState,
        to: TransmitterState,
    ) -> Result<(), TransmitError> {
        self.shared
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| TransmitError::InvalidState(TransmitterState::from_u8(actual), from))
    }
}

impl Shared {
    async fn deliver(&self, target: SocketAddr, event: StepEvent) {
        let socket = self.socket.read().await.clone();

        let result = match socket {
            Some(socket) => socket
                .send_to(STEP_PAYLOAD, target)
                .await
                .map_err(|source| TransmitError::Send { target, source }),
            // Closed between submit and now.
            None => Err(TransmitError::InvalidState(
                TransmitterState::Stopped,
                TransmitterState::Running,
            )),
        };

        match result {
            Ok(_) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(remote = %target, source = %event.source, at_ms = event.at_ms, "step sent");
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(remote = %target, source = %event.source, "step dropped: {e}");
            }
        }
    }
}

async fn resolve(config: &TransmitterConfig) -> Result<SocketAddr, TransmitError> {
    let mut addrs = tokio::net::lookup_host((config.remote_host.as_str(), config.remote_port))
        .await
        .map_err(|source| TransmitError::Resolution {
            host: config.remote_host.clone(),
            port: config.remote_port,
            source,
        })?;

    addrs.next().ok_or_else(|| TransmitError::NoAddress {
        host: config.remote_host.clone(),
        port: config.remote_port,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use gamewalk_core::SourceKind;

    use super::*;

    fn step(at_ms: u64) -> StepEvent {
        StepEvent {
            source: SourceKind::StepPulse,
            at_ms,
        }
    }

    async fn receiver() -> (UdpSocket, u16) {
        let sock = UdpSocket::bind("127.0.0.1:0").await.expect("bind receiver");
        let port = sock.local_addr().expect("local addr").port();
        (sock, port)
    }

    async fn recv_one(sock: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), sock.recv_from(&mut buf))
            .await
            .expect("datagram within 2s")
            .expect("recv ok");
        buf[..n].to_vec()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn start_then_send_delivers_step_payload() {
        let (rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));

        let target = tx.start().await.expect("start");
        assert_eq!(target.port(), port);
        assert_eq!(tx.state(), TransmitterState::Running);
        assert!(tx.local_addr().is_some());

        tx.send_event(step(0));
        assert_eq!(recv_one(&rx).await, b"STEP");

        wait_until(|| tx.stats().sent == 1).await;
        tx.stop().await;
    }

    #[tokio::test]
    async fn one_datagram_per_event() {
        let (rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));
        tx.start().await.expect("start");

        for t in 0..3 {
            tx.submit(step(t)).expect("submitted");
        }
        for _ in 0..3 {
            assert_eq!(recv_one(&rx).await, STEP_PAYLOAD.to_vec());
        }

        wait_until(|| tx.stats().sent == 3).await;
        let stats = tx.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.failed, 0);
        tx.stop().await;
    }

    #[tokio::test]
    async fn settle_waits_for_in_flight_sends() {
        let (rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));
        tx.start().await.expect("start");

        for t in 0..10 {
            tx.send_event(step(t));
        }
        assert!(tx.settle(Duration::from_secs(2)).await);
        assert_eq!(tx.stats().sent, 10);

        for _ in 0..10 {
            assert_eq!(recv_one(&rx).await, b"STEP");
        }
        tx.stop().await;
    }

    #[tokio::test]
    async fn unresolvable_host_is_resolution_failure() {
        let tx = Transmitter::new(TransmitterConfig::new("no-such-host.invalid", 9000));
        let err = tx.start().await.expect_err("must not resolve");
        assert!(err.is_resolution_failure(), "got {err}");
        assert_eq!(tx.state(), TransmitterState::Uninitialized);
        assert!(tx.target().is_none());
        assert!(tx.local_addr().is_none());

        // A retry starts from a clean slate and fails the same way.
        let again = tx.start().await.expect_err("still unresolvable");
        assert!(again.is_resolution_failure());
        assert!(tx.target().is_none());
    }

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", 9));
        let err = tx.submit(step(0)).expect_err("not running");
        assert!(matches!(
            err,
            TransmitError::InvalidState(TransmitterState::Uninitialized, TransmitterState::Running)
        ));
        tx.send_event(step(1));
        assert_eq!(tx.stats().rejected, 2);
        assert_eq!(tx.stats().submitted, 0);
    }

    #[tokio::test]
    async fn send_after_stop_does_not_crash() {
        let (_rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));
        tx.start().await.expect("start");

        let dangling = tx.clone();
        tx.stop().await;
        tx.stop().await;

        dangling.send_event(step(0));
        assert_eq!(dangling.state(), TransmitterState::Stopped);
        assert_eq!(dangling.stats().rejected, 1);
    }

    #[tokio::test]
    async fn restart_after_stop_is_refused() {
        let (_rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));
        tx.start().await.expect("start");
        tx.stop().await;

        let err = tx.start().await.expect_err("terminal");
        assert!(matches!(
            err,
            TransmitError::InvalidState(TransmitterState::Stopped, TransmitterState::Uninitialized)
        ));
    }

    #[tokio::test]
    async fn double_start_is_refused() {
        let (_rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));
        tx.start().await.expect("start");
        assert!(tx.start().await.is_err());
        assert_eq!(tx.state(), TransmitterState::Running);
        tx.stop().await;
    }

    #[tokio::test]
    async fn send_racing_close_counts_as_failure() {
        let (_rx, port) = receiver().await;
        let tx = Transmitter::new(TransmitterConfig::new("127.0.0.1", port));
        tx.start().await.expect("start");

        // Socket gone while the state still says running.
        tx.shared.socket.write().await.take();
        tx.submit(step(0)).expect("submitted");

        wait_until(|| tx.stats().failed == 1).await;
        assert_eq!(tx.stats().sent, 0);
        tx.stop().await;
    }

    #[test]
    fn config_display() {
        let cfg = TransmitterConfig::new("192.168.1.100", 9000);
        assert_eq!(cfg.to_string(), "192.168.1.100:9000");
    }

    #[test]
    fn state_round_trips_through_atomic_repr() {
        for s in [
            TransmitterState::Uninitialized,
            TransmitterState::Starting,
            TransmitterState::Running,
            TransmitterState::Stopped,
        ] {
            assert_eq!(TransmitterState::from_u8(s.as_u8()), s);
        }
    }
}
