//! Scan session controller
//!
//! Drives one scanning station: decoded frames go through the payload codec
//! and the redemption guard, and the outcome stays on screen for its display
//! window. A single-flight latch drops every frame that arrives while an
//! attempt is in flight or its outcome is still displayed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::auth::IdentityProvider;
use crate::domain::{DisplayWindows, ScanOutcome};
use crate::infra::CheckinError;
use crate::metrics::{metric_names, MetricsRegistry};

use super::codec::PayloadCodec;
use super::guard::RedemptionGuard;

/// Outcome currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedOutcome {
    pub outcome: ScanOutcome,
    pub message: String,
    /// Identifies the timer allowed to clear this display
    pub generation: u64,
}

/// Observable session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub camera_on: bool,
    pub latched: bool,
    pub processing: bool,
    pub display: Option<DisplayedOutcome>,
}

/// Why a frame was dropped without processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    CameraOff,
    NotSignedIn,
    Blank,
    Latched,
}

impl IgnoreReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::CameraOff => "camera_off",
            Self::NotSignedIn => "not_signed_in",
            Self::Blank => "blank",
            Self::Latched => "latched",
        }
    }
}

struct Inner {
    codec: PayloadCodec,
    guard: RedemptionGuard,
    windows: DisplayWindows,
    identity: Option<Arc<dyn IdentityProvider>>,
    metrics: Arc<MetricsRegistry>,
    latch: AtomicBool,
    camera_on: AtomicBool,
    generation: AtomicU64,
    state: watch::Sender<SessionState>,
}

/// One scanning station. Cheap to clone; clones share the latch.
#[derive(Clone)]
pub struct ScanController {
    inner: Arc<Inner>,
}

/// Configures a [`ScanController`] before it is shared
pub struct ScanControllerBuilder {
    codec: PayloadCodec,
    guard: RedemptionGuard,
    windows: DisplayWindows,
    identity: Option<Arc<dyn IdentityProvider>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ScanControllerBuilder {
    pub fn windows(mut self, windows: DisplayWindows) -> Self {
        self.windows = windows;
        self
    }

    /// Only process frames while a staff user is signed in
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> ScanController {
        let (state, _) = watch::channel(SessionState::default());
        ScanController {
            inner: Arc::new(Inner {
                codec: self.codec,
                guard: self.guard,
                windows: self.windows,
                identity: self.identity,
                metrics: self.metrics.unwrap_or_default(),
                latch: AtomicBool::new(false),
                camera_on: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                state,
            }),
        }
    }
}

impl ScanController {
    pub fn new(codec: PayloadCodec, guard: RedemptionGuard) -> Self {
        Self::builder(codec, guard).build()
    }

    pub fn builder(codec: PayloadCodec, guard: RedemptionGuard) -> ScanControllerBuilder {
        ScanControllerBuilder {
            codec,
            guard,
            windows: DisplayWindows::default(),
            identity: None,
            metrics: None,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.inner.metrics
    }

    pub fn windows(&self) -> DisplayWindows {
        self.inner.windows
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_latched(&self) -> bool {
        self.inner.latch.load(Ordering::Acquire)
    }

    pub fn camera_on(&self) -> bool {
        self.inner.camera_on.load(Ordering::Acquire)
    }

    /// Start or stop frame delivery. An attempt already in flight completes.
    pub async fn set_camera(&self, on: bool) {
        self.inner.camera_on.store(on, Ordering::Release);
        self.inner.state.send_modify(|s| s.camera_on = on);
        self.inner
            .metrics
            .set_gauge(metric_names::CAMERA_ON, u64::from(on))
            .await;
        info!(camera_on = on, "camera toggled");
    }

    pub async fn toggle_camera(&self) -> bool {
        let on = !self.camera_on();
        self.set_camera(on).await;
        on
    }

    /// Handle one decoded frame.
    ///
    /// Returns `None` when the frame was dropped without processing.
    pub async fn on_scan(&self, text: &str) -> Option<ScanOutcome> {
        if let Some(reason) = self.ignore_reason(text) {
            debug!(reason = reason.as_str(), "frame ignored");
            self.inner
                .metrics
                .inc_counter(metric_names::SCANS_IGNORED)
                .await;
            return None;
        }

        if self
            .inner
            .latch
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(reason = IgnoreReason::Latched.as_str(), "frame ignored");
            self.inner
                .metrics
                .inc_counter(metric_names::SCANS_IGNORED)
                .await;
            return None;
        }

        self.inner.state.send_modify(|s| {
            s.latched = true;
            s.processing = true;
        });

        let started = Instant::now();
        let outcome = self.process(text).await;
        self.inner
            .metrics
            .record_scan(&outcome, started.elapsed())
            .await;

        info!(outcome = outcome.kind(), "scan processed");
        self.display(outcome.clone(), true);
        Some(outcome)
    }

    /// Surface a capture-device failure. The latch is left alone.
    pub async fn on_device_error(&self, cause: &str) -> ScanOutcome {
        warn!(cause, "capture device error");
        self.inner
            .metrics
            .inc_counter(metric_names::DEVICE_ERRORS)
            .await;

        let outcome = ScanOutcome::DeviceError;
        self.display(outcome.clone(), false);
        outcome
    }

    fn ignore_reason(&self, text: &str) -> Option<IgnoreReason> {
        if !self.camera_on() {
            return Some(IgnoreReason::CameraOff);
        }
        if let Some(identity) = &self.inner.identity {
            if identity.current_user().is_none() {
                return Some(IgnoreReason::NotSignedIn);
            }
        }
        if text.trim().is_empty() {
            return Some(IgnoreReason::Blank);
        }
        if self.is_latched() {
            return Some(IgnoreReason::Latched);
        }
        None
    }

    async fn process(&self, text: &str) -> ScanOutcome {
        let payload = match self.inner.codec.decode(text) {
            Ok(payload) => payload,
            Err(e) => return outcome_for_error(e),
        };

        match self.inner.guard.redeem(&payload.record_key()).await {
            Ok(record) => ScanOutcome::Success { record },
            Err(e) => outcome_for_error(e),
        }
    }

    /// Show `outcome` and schedule its expiry. When `release` is set the same
    /// timer also releases the latch.
    fn display(&self, outcome: ScanOutcome, release: bool) {
        let window = outcome.display_window(&self.inner.windows);
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let message = outcome.message();

        self.inner.state.send_modify(|s| {
            if release {
                s.processing = false;
            }
            s.display = Some(DisplayedOutcome {
                outcome,
                message,
                generation,
            });
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;

            if release {
                inner.latch.store(false, Ordering::Release);
            }
            inner.state.send_modify(|s| {
                if release {
                    s.latched = false;
                }
                if s.display.as_ref().map(|d| d.generation) == Some(generation) {
                    s.display = None;
                }
            });
        });
    }
}

/// Map a failed decode or redemption to what staff see
pub fn outcome_for_error(err: CheckinError) -> ScanOutcome {
    match err {
        CheckinError::InvalidPayload(reason) => {
            debug!(%reason, "invalid payload");
            ScanOutcome::InvalidPayload
        }
        CheckinError::DecryptionFailed(e) => {
            debug!(error = %e, "envelope rejected");
            ScanOutcome::DecryptionFailed
        }
        CheckinError::NotFound(key) => {
            debug!(%key, "no record for scanned code");
            ScanOutcome::NotFound
        }
        CheckinError::AlreadyRedeemed { name, redeemed_at } => {
            ScanOutcome::AlreadyRedeemed { name, redeemed_at }
        }
        CheckinError::Device(_) => ScanOutcome::DeviceError,
        err if err.is_transport() => {
            warn!(error = %err, "record store unreachable");
            ScanOutcome::TransportError {
                reason: err.to_string(),
            }
        }
        err => {
            error!(error = %err, "unexpected scan failure");
            ScanOutcome::TransportError {
                reason: err.to_string(),
            }
        }
    }
}
