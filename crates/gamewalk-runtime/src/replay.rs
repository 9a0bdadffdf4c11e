//! Replay hub: plays recorded sensor readings from a JSON-lines file.
//!
//! One reading per line, `#` comments and blank lines ignored:
//!
//! ```text
//! {"at_ms":0,"kind":"step_count","count":1200}
//! {"at_ms":15,"kind":"step_pulse"}
//! {"at_ms":20,"kind":"acceleration","x":0.4,"y":9.7,"z":0.1}
//! ```
//!
//! Readings are delivered on a thread named `gamewalk-sensor`, either as
//! fast as possible or paced by the gaps between `at_ms` values.

use std::io::BufRead;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use gamewalk_core::{SensorCapabilities, SensorReading, SourcePlan};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::hub::{HubError, ReadingSink, SensorHub};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to parse reading on line {line_num}: {detail}")]
    Parse { line_num: usize, detail: String },

    #[error("replay io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse a JSON-lines stream of readings.
pub fn parse_readings(reader: impl BufRead) -> Result<Vec<SensorReading>, ReplayError> {
    let mut readings = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let reading = serde_json::from_str::<SensorReading>(line).map_err(|e| {
            ReplayError::Parse {
                line_num: idx + 1,
                detail: e.to_string(),
            }
        })?;
        readings.push(reading);
    }

    Ok(readings)
}

/// Load readings from a path, or from stdin when `path` is `-`.
pub fn load(path: &str) -> Result<Vec<SensorReading>, ReplayError> {
    if path == "-" {
        let stdin = std::io::stdin();
        return parse_readings(stdin.lock());
    }
    let file = std::fs::File::open(path)?;
    parse_readings(std::io::BufReader::new(file))
}

struct Worker {
    stop_tx: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct ReplayHub {
    readings: Vec<SensorReading>,
    capabilities: SensorCapabilities,
    realtime: bool,
    worker: Option<Worker>,
    exhausted: CancellationToken,
}

impl ReplayHub {
    /// Capabilities are the kinds present in `readings`.
    pub fn new(readings: Vec<SensorReading>, realtime: bool) -> Self {
        let capabilities =
            SensorCapabilities::from_kinds(readings.iter().map(|r| r.sample.source_kind()));
        Self {
            readings,
            capabilities,
            realtime,
            worker: None,
            exhausted: CancellationToken::new(),
        }
    }

    /// Pretend the device has exactly these sensors.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: SensorCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Cancelled once every reading has been delivered.
    pub fn exhausted(&self) -> CancellationToken {
        self.exhausted.clone()
    }
}

impl SensorHub for ReplayHub {
    fn capabilities(&self) -> SensorCapabilities {
        self.capabilities
    }

    fn subscribe(&mut self, plan: &SourcePlan, mut sink: ReadingSink) -> Result<(), HubError> {
        if self.worker.is_some() {
            return Err(HubError::AlreadySubscribed);
        }

        let readings = std::mem::take(&mut self.readings);
        let plan = plan.clone();
        let realtime = self.realtime;
        let exhausted = self.exhausted.clone();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("gamewalk-sensor".into())
            .spawn(move || {
                let mut prev_at: Option<u64> = None;
                let mut delivered = 0usize;

                for reading in readings {
                    let gap = match (realtime, prev_at) {
                        (true, Some(prev)) => reading.at_ms.saturating_sub(prev),
                        _ => 0,
                    };
                    match stop_rx.recv_timeout(Duration::from_millis(gap)) {
                        Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                        // Stop requested or hub dropped.
                        _ => return,
                    }
                    prev_at = Some(reading.at_ms);

                    if plan.contains(reading.sample.source_kind()) {
                        sink(reading);
                        delivered += 1;
                    }
                }

                tracing::debug!(delivered, "replay finished");
                exhausted.cancel();
            })?;

        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            tracing::error!("sensor callback thread panicked");
        }
    }
}

impl Drop for ReplayHub {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use gamewalk_core::{SelectionPolicy, SensorSample, SourceKind, select_sources};

    use super::*;

    const SAMPLE: &str = r#"
# recorded on a phone with a step counter only
{"at_ms":0,"kind":"step_count","count":100}
{"at_ms":40,"kind":"step_count","count":101}

{"at_ms":80,"kind":"acceleration","x":0.0,"y":9.8,"z":0.0}
"#;

    fn collecting_sink() -> (ReadingSink, Arc<Mutex<Vec<SensorReading>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let sink: ReadingSink = Box::new(move |r| out.lock().expect("lock").push(r));
        (sink, seen)
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let readings = parse_readings(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[1].at_ms, 40);
        assert_eq!(readings[1].sample, SensorSample::StepCount { count: 101 });
    }

    #[test]
    fn parse_error_reports_line_number() {
        let input = "{\"at_ms\":0,\"kind\":\"step_pulse\"}\n{not json}\n";
        let err = parse_readings(input.as_bytes()).expect_err("bad line");
        match err {
            ReplayError::Parse { line_num, .. } => assert_eq!(line_num, 2),
            other => panic!("expected Parse error, got: {other:?}"),
        }
    }

    #[test]
    fn capabilities_inferred_from_readings() {
        let hub = ReplayHub::new(parse_readings(SAMPLE.as_bytes()).expect("parse"), false);
        let caps = hub.capabilities();
        assert!(caps.step_count);
        assert!(caps.accelerometer);
        assert!(!caps.step_pulse);
    }

    #[test]
    fn delivers_only_subscribed_kinds_in_order() {
        let mut hub = ReplayHub::new(parse_readings(SAMPLE.as_bytes()).expect("parse"), false);
        let exhausted = hub.exhausted();
        let plan = select_sources(&hub.capabilities(), SelectionPolicy::Observed);
        assert_eq!(plan.kinds(), &[SourceKind::StepCount]);

        let (sink, seen) = collecting_sink();
        hub.subscribe(&plan, sink).expect("subscribe");

        for _ in 0..200 {
            if exhausted.is_cancelled() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(exhausted.is_cancelled());
        hub.unsubscribe();

        let seen = seen.lock().expect("lock");
        let ats: Vec<u64> = seen.iter().map(|r| r.at_ms).collect();
        assert_eq!(ats, vec![0, 40]);
    }

    #[test]
    fn second_subscribe_is_refused() {
        let mut hub = ReplayHub::new(Vec::new(), false);
        let plan = SourcePlan::default();
        let (sink, _) = collecting_sink();
        hub.subscribe(&plan, sink).expect("first");
        let (sink, _) = collecting_sink();
        assert!(matches!(
            hub.subscribe(&plan, sink),
            Err(HubError::AlreadySubscribed)
        ));
        hub.unsubscribe();
        hub.unsubscribe();
    }

    #[test]
    fn unsubscribe_interrupts_realtime_pacing() {
        let readings = vec![
            SensorReading::new(0, SensorSample::StepPulse),
            SensorReading::new(60_000, SensorSample::StepPulse),
        ];
        let mut hub = ReplayHub::new(readings, true);
        let exhausted = hub.exhausted();
        let plan = select_sources(&hub.capabilities(), SelectionPolicy::Observed);
        let (sink, seen) = collecting_sink();
        hub.subscribe(&plan, sink).expect("subscribe");

        std::thread::sleep(Duration::from_millis(50));
        let started = std::time::Instant::now();
        hub.unsubscribe();
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(!exhausted.is_cancelled());
        assert_eq!(seen.lock().expect("lock").len(), 1);
    }
}
