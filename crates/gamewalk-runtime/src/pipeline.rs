//! Step pipeline: sensor hub -> classifier -> transmitter.
//!
//! Start order: transmitter live, keep-alive held, then sensor subscription.
//! Stop order is the reverse: unsubscribe, close the socket, release.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gamewalk_core::{KeepAlive, MotionClassifier, SelectionPolicy, SourcePlan, select_sources};
use gamewalk_transmitter::{StatsSnapshot, TransmitError, Transmitter, TransmitterConfig};
use thiserror::Error;

use crate::hub::{HubError, ReadingSink, SensorHub};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transmission unavailable: {0}")]
    TransmissionUnavailable(#[from] TransmitError),

    #[error("sensor subscription failed: {0}")]
    Subscribe(#[from] HubError),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub target: TransmitterConfig,
    pub selection: SelectionPolicy,
}

pub struct Pipeline<H: SensorHub + 'static, K: KeepAlive> {
    transmitter: Transmitter,
    /// `None` only while an unsubscribe is running on the blocking pool.
    hub: Option<H>,
    keep_alive: K,
    plan: SourcePlan,
    steps: Arc<AtomicU64>,
    stopped: bool,
}

impl<H: SensorHub + 'static, K: KeepAlive> Pipeline<H, K> {
    pub async fn start(
        config: PipelineConfig,
        mut hub: H,
        mut keep_alive: K,
    ) -> Result<Self, PipelineError> {
        let transmitter = Transmitter::new(config.target);
        transmitter.start().await?;

        keep_alive.acquire();

        let plan = select_sources(&hub.capabilities(), config.selection);
        if plan.is_empty() {
            tracing::warn!("no motion sensor available, no steps will be sent");
        } else {
            tracing::info!(sources = ?plan.kinds(), policy = ?config.selection, "subscribing to sensors");
        }

        let steps = Arc::new(AtomicU64::new(0));
        let sink = step_sink(MotionClassifier::new(plan.clone()), transmitter.clone(), Arc::clone(&steps));

        if let Err(e) = hub.subscribe(&plan, sink) {
            transmitter.stop().await;
            keep_alive.release();
            return Err(e.into());
        }

        Ok(Self {
            transmitter,
            hub: Some(hub),
            keep_alive,
            plan,
            steps,
            stopped: false,
        })
    }

    pub fn plan(&self) -> &SourcePlan {
        &self.plan
    }

    pub fn transmitter(&self) -> &Transmitter {
        &self.transmitter
    }

    /// Steps the classifier has emitted so far.
    pub fn steps_detected(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.transmitter.stats()
    }

    /// Give in-flight sends up to `within` to finish before a stop.
    pub async fn settle(&self, within: Duration) -> bool {
        self.transmitter.settle(within).await
    }

    /// Idempotent.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        // Unsubscribing joins the sensor thread: keep it off the runtime.
        if let Some(mut hub) = self.hub.take() {
            match tokio::task::spawn_blocking(move || {
                hub.unsubscribe();
                hub
            })
            .await
            {
                Ok(hub) => self.hub = Some(hub),
                Err(e) => tracing::error!("sensor unsubscribe failed: {e}"),
            }
        }
        self.transmitter.stop().await;
        self.keep_alive.release();

        tracing::info!(steps = self.steps_detected(), "pipeline stopped");
    }
}

/// The callback run on the sensor thread for every reading.
fn step_sink(
    mut classifier: MotionClassifier,
    transmitter: Transmitter,
    steps: Arc<AtomicU64>,
) -> ReadingSink {
    Box::new(move |reading| {
        if let Some(event) = classifier.on_reading(&reading) {
            steps.fetch_add(1, Ordering::Relaxed);
            transmitter.send_event(event);
        }
    })
}
