use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::device::runtime::{SdkGuard, SdkRuntime};
use crate::device::{CaptureParams, DeviceSession, RawCaptureEvent};
use crate::error::{CaptureError, DeviceError, RequestError};
use crate::mode::CaptureMode;

use super::assembler::{assemble, Assembly};
use super::interpreter::{CaptureEventInterpreter, Outcome};
use super::state::{
    Activity, SessionState, SessionStatus, STATUS_CLOSED, STATUS_EMULATOR, STATUS_OPENING,
    STATUS_PROCESSING, STATUS_READY,
};

/// Timing and addressing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub device_index: usize,
    pub capture_timeout: Duration,
    pub capture_retries: u32,
    pub open_timeout: Duration,
    /// Slack on top of the vendor's own timeout before the watchdog fires.
    pub watchdog_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            capture_timeout: Duration::from_secs(20),
            capture_retries: 2,
            open_timeout: Duration::from_secs(10),
            watchdog_grace: Duration::from_secs(5),
        }
    }
}

impl SessionSettings {
    /// Longest a capture may stay unresolved before it is failed locally.
    /// Saturates at `Duration::MAX` for absurd timeout/retry combinations.
    pub fn capture_deadline(&self) -> Duration {
        self.capture_timeout
            .checked_mul(self.capture_retries.saturating_add(1))
            .and_then(|d| d.checked_add(self.watchdog_grace))
            .unwrap_or(Duration::MAX)
    }
}

/// `None` when the wait is too long to be represented as an `Instant`.
fn deadline_after(wait: Duration) -> Option<Instant> {
    Instant::now().checked_add(wait)
}

/// Versions reported by an initialised device layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkInfo {
    pub sdk_version: String,
    pub algorithm_version: String,
}

/// Device-layer callbacks and worker results, delivered to the thread that
/// owns the controller.
pub enum SessionMessage {
    Opened {
        request: u64,
        result: Result<Arc<dyn DeviceSession>, DeviceError>,
    },
    Event {
        request: u64,
        event: RawCaptureEvent,
    },
    Assembled {
        request: u64,
        outcome: Result<Assembly, String>,
    },
}

struct PendingOpen {
    request: u64,
    deadline: Option<Instant>,
}

struct PendingCapture {
    request: u64,
    interpreter: CaptureEventInterpreter,
    deadline: Option<Instant>,
    assembling: bool,
    handle: Arc<dyn DeviceSession>,
    worker: Option<JoinHandle<()>>,
}

/// Orchestrates open → capture → close against an injected device layer.
///
/// Requests are fire-and-forget; their outcomes arrive as [`SessionMessage`]s
/// and are applied by [`pump`](Self::pump) or [`wait_for`](Self::wait_for).
/// Device-layer failures end up in the status line, never as panics or
/// errors to the caller.
pub struct SessionController {
    guard: Option<SdkGuard>,
    settings: SessionSettings,
    state: SessionState,
    session: Option<Arc<dyn DeviceSession>>,
    tx: Sender<SessionMessage>,
    rx: Receiver<SessionMessage>,
    next_request: u64,
    open: Option<PendingOpen>,
    capture: Option<PendingCapture>,
}

impl SessionController {
    pub fn new(runtime: SdkRuntime, settings: SessionSettings) -> Self {
        let (tx, rx) = mpsc::channel();
        let (guard, state) = match runtime {
            SdkRuntime::Ready(guard) => {
                let mut state = SessionState::new(SessionStatus::new(STATUS_READY), true);
                state.device_count = count_devices(&guard);
                (Some(guard), state)
            }
            SdkRuntime::Emulator => (
                None,
                SessionState::new(SessionStatus::new(STATUS_EMULATOR), false),
            ),
            SdkRuntime::Failed(reason) => (
                None,
                SessionState::new(
                    SessionStatus::new(CaptureError::Initialization(reason).to_string()),
                    false,
                ),
            ),
        };

        Self {
            guard,
            settings,
            state,
            session: None,
            tx,
            rx,
            next_request: 0,
            open: None,
            capture: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn sdk_info(&self) -> Option<SdkInfo> {
        self.guard.as_ref().map(|g| SdkInfo {
            sdk_version: g.layer().sdk_version(),
            algorithm_version: g.layer().algorithm_version(),
        })
    }

    /// Re-query the number of attached devices.
    pub fn refresh_device_count(&mut self) -> usize {
        if let Some(guard) = &self.guard {
            self.state.device_count = count_devices(guard);
        }
        self.state.device_count
    }

    pub fn select_mode(&mut self, mode: CaptureMode) -> Result<(), RequestError> {
        if !self.state.capture_enabled {
            return Err(RequestError::Disabled);
        }
        if self.state.is_busy() {
            return Err(RequestError::Busy);
        }
        self.state.selected_mode = mode;
        Ok(())
    }

    pub fn open_device(&mut self) -> Result<(), RequestError> {
        let Some(layer) = self
            .guard
            .as_ref()
            .filter(|_| self.state.capture_enabled)
            .map(|g| g.layer().clone())
        else {
            return Err(RequestError::Disabled);
        };
        if self.state.is_busy() {
            return Err(RequestError::Busy);
        }
        if self.session.is_some() {
            return Err(RequestError::AlreadyOpen);
        }

        let request = self.next_request_id();
        let index = self.settings.device_index;
        let tx = self.tx.clone();
        self.state.activity = Activity::Opening;
        self.set_status(STATUS_OPENING);
        info!(request, index, "opening device");

        let sent = guarded(|| {
            layer.open(
                index,
                Box::new(move |result| {
                    let _ = tx.send(SessionMessage::Opened { request, result });
                }),
            )
        });
        match sent {
            Ok(()) => {
                self.open = Some(PendingOpen {
                    request,
                    deadline: deadline_after(self.settings.open_timeout),
                });
            }
            Err(e) => {
                warn!(error = %e, "open request refused");
                self.state.activity = Activity::Idle;
                self.set_status(CaptureError::Open(e.message).to_string());
            }
        }
        Ok(())
    }

    pub fn capture(&mut self, mode: CaptureMode) -> Result<(), RequestError> {
        if !self.state.capture_enabled {
            return Err(RequestError::Disabled);
        }
        if self.state.is_busy() {
            return Err(RequestError::Busy);
        }
        let Some(handle) = self.session.clone() else {
            self.set_status(CaptureError::Request(RequestError::NotOpen.to_string()).to_string());
            return Err(RequestError::NotOpen);
        };

        let request = self.next_request_id();
        let params = CaptureParams {
            input_image_type: mode.input_image_type(),
            timeout: self.settings.capture_timeout,
            retries: self.settings.capture_retries,
        };
        self.state.selected_mode = mode;
        self.state.results.clear();
        self.state.activity = Activity::Capturing;
        self.set_status(format!("Place {} on sensor...", mode.label()));
        info!(request, mode = mode.cli_name(), ?params, "capture requested");

        let mut interpreter = CaptureEventInterpreter::new(mode.expected_fingers());
        interpreter.begin();

        let tx = self.tx.clone();
        let target = handle.clone();
        let sent = guarded(|| {
            target.multi_finger_capture(
                params,
                Box::new(move |event| {
                    let _ = tx.send(SessionMessage::Event { request, event });
                }),
            )
        });
        match sent {
            Ok(()) => {
                self.capture = Some(PendingCapture {
                    request,
                    interpreter,
                    deadline: deadline_after(self.settings.capture_deadline()),
                    assembling: false,
                    handle,
                    worker: None,
                });
            }
            Err(e) => {
                warn!(error = %e, "capture request refused");
                self.state.activity = Activity::Idle;
                self.set_status(CaptureError::Request(e.message).to_string());
            }
        }
        Ok(())
    }

    /// Release the device. The handle is dropped even if the close call fails.
    pub fn close_device(&mut self) -> Result<(), RequestError> {
        if !self.state.capture_enabled {
            return Err(RequestError::Disabled);
        }
        if self.state.is_busy() {
            return Err(RequestError::Busy);
        }
        let Some(handle) = self.session.take() else {
            return Err(RequestError::NotOpen);
        };
        close_quietly(handle.as_ref());
        self.state.device = None;
        self.state.results.clear();
        self.set_status(STATUS_CLOSED);
        info!("device closed");
        Ok(())
    }

    /// End of life: close any handle and release the device layer. Idempotent.
    ///
    /// A running assembly worker is joined first so the handle is never
    /// closed underneath it.
    pub fn teardown(&mut self) {
        if let Some(worker) = self.capture.take().and_then(|c| c.worker) {
            debug!("waiting for assembly worker");
            if worker.join().is_err() {
                warn!("assembly worker exited abnormally");
            }
        }
        if let Some(handle) = self.session.take() {
            close_quietly(handle.as_ref());
        }
        self.open = None;
        self.state.activity = Activity::Idle;
        self.state.device = None;
        self.state.results.clear();
        self.state.capture_enabled = false;
        if self.guard.take().is_some() {
            info!("session torn down");
        }
    }

    /// Apply every message that has already arrived, then check deadlines.
    /// Returns the number of messages applied.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
            handled += 1;
        }
        self.check_deadlines(Instant::now());
        handled
    }

    /// Block up to `timeout` for the next message, then drain the rest.
    /// Returns true when the status line or activity changed.
    pub fn wait_for(&mut self, timeout: Duration) -> bool {
        let before = (self.state.activity, self.state.status.clone());
        let wait = match self.next_deadline() {
            Some(deadline) => timeout.min(deadline.saturating_duration_since(Instant::now())),
            None => timeout,
        };

        match self.rx.recv_timeout(wait) {
            Ok(msg) => self.handle(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
        self.pump();
        before != (self.state.activity, self.state.status.clone())
    }

    /// Process messages until no operation is in flight or `limit` elapses.
    /// Returns true if the controller went idle.
    pub fn wait_until_idle(&mut self, limit: Duration) -> bool {
        let end = Instant::now() + limit;
        while self.state.is_busy() {
            let now = Instant::now();
            if now >= end {
                break;
            }
            self.wait_for(end - now);
        }
        !self.state.is_busy()
    }

    /// Apply one message. Stale messages for superseded requests are dropped.
    pub fn handle(&mut self, msg: SessionMessage) {
        match msg {
            SessionMessage::Opened { request, result } => self.on_opened(request, result),
            SessionMessage::Event { request, event } => self.on_event(request, event),
            SessionMessage::Assembled { request, outcome } => self.on_assembled(request, outcome),
        }
    }

    fn on_opened(&mut self, request: u64, result: Result<Arc<dyn DeviceSession>, DeviceError>) {
        if self.open.as_ref().map(|o| o.request) != Some(request) {
            debug!(request, "stale open result dropped");
            if let Ok(handle) = result {
                close_quietly(handle.as_ref());
            }
            return;
        }
        self.open = None;
        self.state.activity = Activity::Idle;

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "device open failed");
                self.set_status(CaptureError::Open(e.message).to_string());
                return;
            }
        };
        match guarded(|| handle.image_info()) {
            Ok(info) => {
                info!(
                    width = info.width,
                    height = info.height,
                    dpi = info.resolution,
                    "device opened"
                );
                self.session = Some(handle);
                self.state.device = Some(info);
                self.refresh_device_count();
                self.set_status(format!(
                    "Device Opened: {}x{} @ {}dpi",
                    info.width, info.height, info.resolution
                ));
            }
            Err(e) => {
                warn!(error = %e, "device opened but image info unavailable");
                close_quietly(handle.as_ref());
                self.set_status(CaptureError::Open(e.message).to_string());
            }
        }
    }

    fn on_event(&mut self, request: u64, event: RawCaptureEvent) {
        let Some(pending) = self
            .capture
            .as_mut()
            .filter(|c| c.request == request && !c.assembling)
        else {
            debug!(request, code = event.code, "event for inactive capture dropped");
            return;
        };

        match pending.interpreter.interpret(event.code, event.segment_count) {
            Outcome::Progress => self.set_status(STATUS_PROCESSING),
            Outcome::Success { segments } => {
                pending.assembling = true;
                let handle = pending.handle.clone();
                let tx = self.tx.clone();
                let spawned = thread::Builder::new()
                    .name("capture-assembly".to_string())
                    .spawn(move || {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            assemble(handle.as_ref(), &event, segments)
                        }))
                        .map_err(panic_message);
                        let _ = tx.send(SessionMessage::Assembled { request, outcome });
                    });
                match spawned {
                    Ok(worker) => pending.worker = Some(worker),
                    Err(e) => {
                        error!(error = %e, "could not start assembly worker");
                        self.finish_capture(Err(CaptureError::Callback(e.to_string())));
                    }
                }
            }
            Outcome::Failed(err) => self.finish_capture(Err(err)),
            Outcome::Ignored => {}
        }
    }

    fn on_assembled(&mut self, request: u64, outcome: Result<Assembly, String>) {
        if !self
            .capture
            .as_ref()
            .is_some_and(|c| c.request == request && c.assembling)
        {
            debug!(request, "stale assembly dropped");
            return;
        }
        match outcome {
            Ok(assembly) => self.finish_capture(Ok(assembly)),
            Err(reason) => {
                error!(%reason, "assembly worker panicked");
                self.finish_capture(Err(CaptureError::Callback(reason)));
            }
        }
    }

    /// The only place a capture leaves the in-flight state.
    fn finish_capture(&mut self, outcome: Result<Assembly, CaptureError>) {
        if self.capture.take().is_none() {
            return;
        }
        self.state.activity = Activity::Idle;
        match outcome {
            Ok(assembly) => {
                let n = assembly.results.len();
                self.state.results = assembly.results;
                info!(captured = n, skipped = assembly.skipped.len(), "capture complete");
                self.set_status(format!("Successfully captured {} fingerprint(s)!", n));
            }
            Err(err) => {
                warn!(%err, "capture failed");
                self.state.results.clear();
                self.set_status(err.to_string());
            }
        }
    }

    fn check_deadlines(&mut self, now: Instant) {
        if self
            .open
            .as_ref()
            .is_some_and(|o| o.deadline.is_some_and(|d| now >= d))
        {
            warn!("open request timed out");
            self.open = None;
            self.state.activity = Activity::Idle;
            self.set_status(CaptureError::Open("timed out waiting for device".into()).to_string());
        }

        let expired = match self.capture.as_mut() {
            Some(c) if !c.assembling && c.deadline.is_some_and(|d| now >= d) => {
                matches!(c.interpreter.abort(CaptureError::Timeout), Outcome::Failed(_))
            }
            _ => false,
        };
        if expired {
            warn!("capture watchdog expired");
            self.finish_capture(Err(CaptureError::Timeout));
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let open = self.open.as_ref().and_then(|o| o.deadline);
        let capture = self
            .capture
            .as_ref()
            .filter(|c| !c.assembling)
            .and_then(|c| c.deadline);
        match (open, capture) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.state.status = SessionStatus::new(text);
        debug!(status = %self.state.status.text, "status");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn count_devices(guard: &SdkGuard) -> usize {
    guarded(|| guard.layer().device_count()).unwrap_or_else(|e| {
        warn!(error = %e, "device count unavailable");
        0
    })
}

fn close_quietly(handle: &dyn DeviceSession) {
    if let Err(e) = guarded(|| handle.close()) {
        let err = CaptureError::Close(e.message);
        warn!(%err, "handle dropped anyway");
    }
}

/// Run a device-layer call, turning a panic into a `DeviceError`.
fn guarded<T>(f: impl FnOnce() -> Result<T, DeviceError>) -> Result<T, DeviceError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(DeviceError::new(panic_message(payload))))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
