//! Decoder adapters
//!
//! A scan source turns a capture device into a stream of [`DecoderEvent`]s.
//! Image decoding itself is not done here; the line source reads text that a
//! hardware scanner (keyboard wedge, serial bridge) has already decoded.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::ScanOutcome;
use crate::infra::{CheckinError, Result};

use super::controller::ScanController;

/// Default spacing between delivered frames
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    Scanned(String),
    DeviceError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing_mode: FacingMode,
    /// Minimum time between two delivered frames
    pub poll_interval: Duration,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Capture device contract
#[async_trait]
pub trait ScanSource: Send {
    /// Begin delivering events. The channel closes when the device stops.
    async fn start(
        &mut self,
        constraints: CameraConstraints,
    ) -> Result<mpsc::Receiver<DecoderEvent>>;

    /// Stop delivering events
    async fn stop(&mut self);
}

/// One decoded frame per input line
pub struct LineScanSource<R> {
    reader: Option<R>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl<R> LineScanSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            stop_tx: None,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl LineScanSource<tokio::io::BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> ScanSource for LineScanSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn start(
        &mut self,
        constraints: CameraConstraints,
    ) -> Result<mpsc::Receiver<DecoderEvent>> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| CheckinError::Device("scan source already started".to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(
            facing_mode = ?constraints.facing_mode,
            poll_interval_ms = constraints.poll_interval.as_millis() as u64,
            "line scan source started"
        );
        self.task = Some(tokio::spawn(read_lines(reader, tx, stop_rx, constraints)));
        self.stop_tx = Some(stop_tx);
        Ok(rx)
    }

    async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("line scan source stopped");
    }
}

async fn read_lines<R>(
    mut reader: R,
    tx: mpsc::Sender<DecoderEvent>,
    mut stop_rx: watch::Receiver<bool>,
    constraints: CameraConstraints,
) where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let mut ticker = tokio::time::interval(constraints.poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        frame.clear();
        let read = tokio::select! {
            _ = stop_rx.changed() => break,
            read = reader.read_until(b'\n', &mut frame) => read,
        };

        let event = match read {
            Ok(0) => {
                debug!("scan input closed");
                break;
            }
            Ok(_) => match decode_frame(&frame) {
                Some(text) => DecoderEvent::Scanned(text),
                None => continue,
            },
            Err(e) => {
                warn!(error = %e, "scan input failed");
                let _ = tx.send(DecoderEvent::DeviceError(e.to_string())).await;
                break;
            }
        };

        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

/// Text of one raw frame without its line ending, `None` when blank.
///
/// Invalid UTF-8 is replaced rather than rejected so the codec reports the
/// frame as an unrecognised code and the session keeps reading.
fn decode_frame(frame: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text.to_string(),
        Err(e) => {
            debug!(error = %e, "frame is not valid UTF-8");
            String::from_utf8_lossy(frame).into_owned()
        }
    };
    let text = text.trim_end_matches(['\n', '\r']);
    if text.trim().is_empty() {
        return None;
    }
    Some(text.to_string())
}

/// Feed decoder events to the controller until the source closes.
///
/// `on_outcome` sees every processed scan and device error; dropped frames
/// are not reported. Returns the number of outcomes produced.
pub async fn run_session<F>(
    controller: &ScanController,
    mut events: mpsc::Receiver<DecoderEvent>,
    mut on_outcome: F,
) -> usize
where
    F: FnMut(&ScanOutcome),
{
    let mut produced = 0;
    while let Some(event) = events.recv().await {
        let outcome = match event {
            DecoderEvent::Scanned(text) => controller.on_scan(&text).await,
            DecoderEvent::DeviceError(cause) => Some(controller.on_device_error(&cause).await),
        };
        if let Some(outcome) = outcome {
            on_outcome(&outcome);
            produced += 1;
        }
    }
    produced
}
