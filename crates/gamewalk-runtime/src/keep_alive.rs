//! Keep-alive for desktop hosts: nothing to pin, so just record and log
//! how long the pipeline held it.

use std::time::Instant;

use gamewalk_core::KeepAlive;

#[derive(Debug, Default)]
pub struct LoggingKeepAlive {
    held_since: Option<Instant>,
}

impl LoggingKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeepAlive for LoggingKeepAlive {
    fn acquire(&mut self) {
        if self.held_since.is_none() {
            self.held_since = Some(Instant::now());
            tracing::info!("keep-alive acquired");
        }
    }

    fn release(&mut self) {
        if let Some(since) = self.held_since.take() {
            tracing::info!(held_ms = since.elapsed().as_millis() as u64, "keep-alive released");
        }
    }

    fn is_held(&self) -> bool {
        self.held_since.is_some()
    }
}
