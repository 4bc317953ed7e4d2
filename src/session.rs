//! Recording session state machine
//!
//! A [`RecordingSession`] wires the selected inputs into a backend pipeline,
//! manages the preview attachment, and runs the recording lifecycle:
//!
//! ```text
//! Idle --start_recording--> Recording --backend completion--> Stopped --notify--> Idle
//! Idle --start_recording (backend refuses)--> Idle
//! ```
//!
//! `Stopped` counts as idle for a new `start_recording`, so an observer that
//! redispatches the end notification can restart right away.
//!
//! State and the recording generation share one atomic word with the
//! backend's callback thread. No lock is held while calling into the backend
//! or the observer.

use crate::backend::{select_devices, CaptureBackend, RecordingDelegate};
use crate::config::RecorderConfig;
use crate::errors::{BackendError, SessionError};
use crate::types::{
    DeviceInfo, DeviceSelector, DisplayView, Orientation, PreviewAttachment, RecorderState,
    RecordingRequest,
};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Receives recording lifecycle notifications.
///
/// Callbacks run on the backend's callback thread; redispatch to your own
/// context if needed (see [`crate::events::EventForwarder`]).
pub trait RecorderObserver: Send + Sync {
    fn did_begin_recording(&self, session: &RecordingSession);

    /// `saved_path` is the output file on success. On failure it is whatever
    /// the backend reported, possibly `None`.
    fn did_end_recording(
        &self,
        session: &RecordingSession,
        saved_path: Option<&Path>,
        error: Option<&SessionError>,
    );
}

/// Lifecycle state together with the generation of the latest accepted start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    state: RecorderState,
    generation: u64,
}

impl Snapshot {
    const STATE_BITS: u32 = 8;

    fn new(state: RecorderState, generation: u64) -> Self {
        Self { state, generation }
    }

    fn pack(self) -> u64 {
        (self.generation << Self::STATE_BITS) | self.state as u64
    }

    fn unpack(word: u64) -> Self {
        Self {
            state: RecorderState::from_u8((word & 0xff) as u8),
            generation: word >> Self::STATE_BITS,
        }
    }
}

struct Lifecycle(AtomicU64);

impl Lifecycle {
    fn new() -> Self {
        Self(AtomicU64::new(Snapshot::new(RecorderState::Idle, 0).pack()))
    }

    fn load(&self) -> Snapshot {
        Snapshot::unpack(self.0.load(Ordering::SeqCst))
    }

    fn transition(&self, from: Snapshot, to: Snapshot) -> Result<(), Snapshot> {
        self.0
            .compare_exchange(from.pack(), to.pack(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(Snapshot::unpack)
    }
}

struct Inner {
    backend: Arc<dyn CaptureBackend>,
    selector: DeviceSelector,
    inputs: Mutex<Vec<DeviceInfo>>,
    pipeline_ready: AtomicBool,
    lifecycle: Lifecycle,
    /// Highest generation a finalize was requested for.
    finalize_requested: AtomicU64,
    request: Mutex<Option<RecordingRequest>>,
    observer: Mutex<Option<Weak<dyn RecorderObserver>>>,
    orientation: Mutex<Orientation>,
    auto_orientation: AtomicBool,
    preview: Mutex<PreviewAttachment>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if Snapshot::unpack(*self.lifecycle.0.get_mut()).state == RecorderState::Recording {
            log::warn!("Recording session dropped mid-recording, requesting finalize");
            self.backend.stop_recording();
        }
        if self.preview.get_mut().is_attached() {
            self.backend.detach_preview();
        }
    }
}

/// Handle to a capture session. Clones share the same session.
#[derive(Clone)]
pub struct RecordingSession {
    inner: Arc<Inner>,
}

/// Delegate handed to the backend. Holds the session weakly so a backend
/// keeping it alive never keeps the session alive.
///
/// Delegates passed to `start_recording` carry that recording's generation;
/// the pipeline delegate carries none.
struct SessionDelegate {
    session: Weak<Inner>,
    generation: Option<u64>,
}

impl SessionDelegate {
    fn session(&self) -> Option<RecordingSession> {
        self.session
            .upgrade()
            .map(|inner| RecordingSession { inner })
    }
}

impl RecordingDelegate for SessionDelegate {
    fn did_start_recording(&self, destination: &Path) {
        if let Some(session) = self.session() {
            session.handle_started(destination, self.generation);
        }
    }

    fn did_finish_recording(&self, destination: Option<PathBuf>, error: Option<BackendError>) {
        match self.session() {
            Some(session) => session.handle_finished(self.generation, destination, error),
            None => log::debug!("Recording finished after session was dropped"),
        }
    }

    fn did_lose_pipeline(&self, error: BackendError) {
        if let Some(session) = self.session() {
            session.handle_pipeline_lost(error);
        }
    }
}

impl RecordingSession {
    /// Build a session attaching the devices named by `selector`.
    pub fn create<B>(selector: DeviceSelector, backend: B) -> Result<Self, SessionError>
    where
        B: CaptureBackend + 'static,
    {
        Self::build(selector, Orientation::default(), false, Arc::new(backend))
    }

    /// Build a session from a validated configuration.
    pub fn create_with_config<B>(config: &RecorderConfig, backend: B) -> Result<Self, SessionError>
    where
        B: CaptureBackend + 'static,
    {
        config
            .validate()
            .map_err(|e| SessionError::configuration(e.to_string()))?;
        let selector = config
            .device_selector()
            .map_err(|e| SessionError::configuration(e.to_string()))?;
        Self::build(
            selector,
            config.session.orientation,
            config.session.auto_orientation,
            Arc::new(backend),
        )
    }

    fn build(
        selector: DeviceSelector,
        orientation: Orientation,
        auto_orientation: bool,
        backend: Arc<dyn CaptureBackend>,
    ) -> Result<Self, SessionError> {
        let session = RecordingSession {
            inner: Arc::new(Inner {
                backend,
                selector,
                inputs: Mutex::new(Vec::new()),
                pipeline_ready: AtomicBool::new(false),
                lifecycle: Lifecycle::new(),
                finalize_requested: AtomicU64::new(0),
                request: Mutex::new(None),
                observer: Mutex::new(None),
                orientation: Mutex::new(orientation),
                auto_orientation: AtomicBool::new(auto_orientation),
                preview: Mutex::new(PreviewAttachment::Detached),
            }),
        };

        session.rebuild_pipeline()?;
        session.inner.backend.set_orientation(orientation);

        log::info!("Recording session created with devices: {}", selector);
        Ok(session)
    }

    /// Resolve the selector again and rebuild the backend pipeline.
    ///
    /// Used after the backend reported the pipeline lost. Only valid while idle.
    pub fn rebuild_pipeline(&self) -> Result<(), SessionError> {
        let state = self.state();
        if state != RecorderState::Idle {
            return Err(SessionError::invalid_state("rebuild pipeline", state));
        }

        let available = self.inner.backend.devices();
        let inputs = select_devices(self.inner.selector, &available)?;

        self.inner
            .backend
            .build_pipeline(&inputs, self.delegate(None))
            .map_err(|e| {
                log::warn!("Backend rejected inputs {}: {}", self.inner.selector, e);
                SessionError::configuration(e.to_string())
            })?;

        log::debug!(
            "Pipeline built with inputs: {:?}",
            inputs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>()
        );
        *self.inner.inputs.lock() = inputs;
        self.inner.pipeline_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn state(&self) -> RecorderState {
        self.inner.lifecycle.load().state
    }

    pub fn devices(&self) -> DeviceSelector {
        self.inner.selector
    }

    /// Devices resolved for the current pipeline.
    pub fn inputs(&self) -> Vec<DeviceInfo> {
        self.inner.inputs.lock().clone()
    }

    pub fn is_pipeline_ready(&self) -> bool {
        self.inner.pipeline_ready.load(Ordering::SeqCst)
    }

    pub fn preview_attachment(&self) -> PreviewAttachment {
        *self.inner.preview.lock()
    }

    /// Destination of the in-flight recording, if any.
    pub fn current_destination(&self) -> Option<PathBuf> {
        self.inner
            .request
            .lock()
            .as_ref()
            .map(|request| request.destination.clone())
    }

    /// Register the observer. Only a weak reference is kept: the caller owns it.
    pub fn set_observer<O>(&self, observer: &Arc<O>)
    where
        O: RecorderObserver + 'static,
    {
        let observer: Arc<dyn RecorderObserver> = observer.clone();
        *self.inner.observer.lock() = Some(Arc::downgrade(&observer));
    }

    pub fn clear_observer(&self) {
        *self.inner.observer.lock() = None;
    }

    /// Start the live preview without embedding it into a view.
    pub fn start_preview(&self) -> Result<(), SessionError> {
        self.attach_preview(PreviewAttachment::Surface)
    }

    /// Start the live preview laid out at the full bounds of `view`.
    pub fn start_preview_in(&self, view: DisplayView) -> Result<(), SessionError> {
        self.attach_preview(PreviewAttachment::Embedded(view))
    }

    fn attach_preview(&self, target: PreviewAttachment) -> Result<(), SessionError> {
        if !self.is_pipeline_ready() {
            return Err(SessionError::NotConfigured);
        }

        let previous = std::mem::replace(&mut *self.inner.preview.lock(), target);
        if previous.is_attached() {
            log::debug!("Re-targeting preview from {:?} to {:?}", previous, target);
            self.inner.backend.detach_preview();
        }

        let frame = match target {
            PreviewAttachment::Embedded(view) => Some(view.full_bounds()),
            _ => None,
        };
        self.inner.backend.attach_preview(frame);
        Ok(())
    }

    /// Detach the preview. Does nothing when not attached.
    pub fn stop_preview(&self) {
        let previous = std::mem::take(&mut *self.inner.preview.lock());
        if previous.is_attached() {
            self.inner.backend.detach_preview();
        }
    }

    /// Begin recording to `destination`.
    ///
    /// Accepted while `Idle` or `Stopped`. The session moves to `Recording`
    /// before the backend is asked, so concurrent callers cannot both start.
    /// If the backend refuses, the session returns to `Idle` and the observer
    /// receives `did_end_recording` with the error and no path.
    pub fn start_recording(&self, destination: impl AsRef<Path>) -> Result<(), SessionError> {
        let destination = destination.as_ref();

        let mut current = self.inner.lifecycle.load();
        let started = loop {
            if current.state == RecorderState::Recording {
                log::debug!(
                    "Ignoring start_recording to {:?} while {}",
                    destination,
                    current.state
                );
                return Err(SessionError::invalid_state("start recording", current.state));
            }
            let next = Snapshot::new(RecorderState::Recording, current.generation + 1);
            match self.inner.lifecycle.transition(current, next) {
                Ok(()) => break next,
                Err(actual) => current = actual,
            }
        };
        let generation = started.generation;

        *self.inner.request.lock() = Some(RecordingRequest::new(destination, generation));

        log::info!("Starting recording {} to {:?}", generation, destination);
        if let Err(e) = self
            .inner
            .backend
            .start_recording(destination, self.delegate(Some(generation)))
        {
            log::warn!("Backend refused recording to {:?}: {}", destination, e);
            self.take_request(generation);
            if let Err(actual) = self
                .inner
                .lifecycle
                .transition(started, Snapshot::new(RecorderState::Idle, generation))
            {
                log::warn!(
                    "Refused recording {} already left Recording: {:?}",
                    generation,
                    actual
                );
            }

            let error = SessionError::RecordingFailure(e);
            self.notify_end(None, Some(&error));
            return Err(error);
        }
        Ok(())
    }

    /// Ask the backend to finalize the current recording.
    ///
    /// The state stays `Recording` until the backend's completion arrives.
    pub fn stop_recording(&self) -> Result<(), SessionError> {
        let current = self.inner.lifecycle.load();
        if current.state != RecorderState::Recording {
            log::debug!("Ignoring stop_recording while {}", current.state);
            return Err(SessionError::invalid_state("stop recording", current.state));
        }

        let requested = self
            .inner
            .finalize_requested
            .fetch_max(current.generation, Ordering::SeqCst);
        if requested >= current.generation {
            log::debug!("Finalize already requested for recording {}", current.generation);
            return Ok(());
        }

        self.request_finalize(current);
        Ok(())
    }

    /// Forward a stop to the backend if `expected` is still the live recording.
    fn request_finalize(&self, expected: Snapshot) -> bool {
        let current = self.inner.lifecycle.load();
        if current != expected {
            log::debug!(
                "Recording {} ended before its stop was forwarded",
                expected.generation
            );
            return false;
        }

        log::info!("Requesting finalize of recording {}", expected.generation);
        self.inner.backend.stop_recording();
        true
    }

    pub fn orientation(&self) -> Orientation {
        *self.inner.orientation.lock()
    }

    /// Set the orientation explicitly and apply it to the active connections.
    pub fn set_orientation(&self, orientation: Orientation) {
        *self.inner.orientation.lock() = orientation;
        self.inner.backend.set_orientation(orientation);
    }

    pub fn auto_orientation(&self) -> bool {
        self.inner.auto_orientation.load(Ordering::SeqCst)
    }

    pub fn set_auto_orientation(&self, enabled: bool) {
        self.inner.auto_orientation.store(enabled, Ordering::SeqCst);
    }

    /// Follow the device's physical orientation when auto orientation is on.
    ///
    /// Face up, face down and unknown readings keep the last good value.
    /// Returns the effective orientation.
    pub fn adapt_orientation(&self) -> Orientation {
        if !self.auto_orientation() {
            return self.orientation();
        }

        let physical = self.inner.backend.physical_orientation();
        let Some(orientation) = physical.capture_orientation() else {
            log::debug!("Ignoring physical orientation {:?}", physical);
            return self.orientation();
        };

        let previous = std::mem::replace(&mut *self.inner.orientation.lock(), orientation);
        if previous != orientation {
            log::debug!("Orientation {:?} -> {:?}", previous, orientation);
        }
        self.inner.backend.set_orientation(orientation);
        orientation
    }

    fn delegate(&self, generation: Option<u64>) -> Arc<dyn RecordingDelegate> {
        Arc::new(SessionDelegate {
            session: Arc::downgrade(&self.inner),
            generation,
        })
    }

    fn observer(&self) -> Option<Arc<dyn RecorderObserver>> {
        self.inner.observer.lock().as_ref().and_then(Weak::upgrade)
    }

    fn notify_end(&self, saved_path: Option<&Path>, error: Option<&SessionError>) {
        if let Some(observer) = self.observer() {
            observer.did_end_recording(self, saved_path, error);
        }
    }

    fn take_request(&self, generation: u64) -> Option<RecordingRequest> {
        let mut request = self.inner.request.lock();
        match request.as_ref() {
            Some(r) if r.generation == generation => request.take(),
            _ => None,
        }
    }

    fn handle_started(&self, destination: &Path, generation: Option<u64>) {
        let current = self.inner.lifecycle.load();
        let generation = generation.unwrap_or(current.generation);
        if current != Snapshot::new(RecorderState::Recording, generation) {
            log::debug!(
                "Ignoring start notification for {:?} while {}",
                destination,
                current.state
            );
            return;
        }

        log::info!("Recording began: {:?}", destination);
        if let Some(observer) = self.observer() {
            observer.did_begin_recording(self);
        }
    }

    fn handle_finished(
        &self,
        generation: Option<u64>,
        destination: Option<PathBuf>,
        error: Option<BackendError>,
    ) {
        let generation = generation.unwrap_or_else(|| self.inner.lifecycle.load().generation);
        let stopped = Snapshot::new(RecorderState::Stopped, generation);
        if let Err(actual) = self
            .inner
            .lifecycle
            .transition(Snapshot::new(RecorderState::Recording, generation), stopped)
        {
            log::warn!(
                "Ignoring completion of recording {} while {} (recording {})",
                generation,
                actual.state,
                actual.generation
            );
            return;
        }

        let request = self.take_request(generation);
        let error = error.map(SessionError::RecordingFailure);
        let saved_path = match &error {
            None => destination.or_else(|| request.map(|r| r.destination)),
            Some(e) => {
                log::warn!("Recording ended with error: {}", e);
                destination
            }
        };

        if error.is_none() {
            log::info!("Recording saved to {:?}", saved_path);
        }
        self.notify_end(saved_path.as_deref(), error.as_ref());

        if self
            .inner
            .lifecycle
            .transition(stopped, Snapshot::new(RecorderState::Idle, generation))
            .is_err()
        {
            log::debug!(
                "Session restarted during end notification of recording {}",
                generation
            );
        }
    }

    fn handle_pipeline_lost(&self, error: BackendError) {
        log::warn!("Capture pipeline lost: {}", error);
        self.inner.pipeline_ready.store(false, Ordering::SeqCst);
        *self.inner.preview.lock() = PreviewAttachment::Detached;
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("devices", &self.inner.selector)
            .field("state", &self.state())
            .field("pipeline_ready", &self.is_pipeline_ready())
            .field("orientation", &self.orientation())
            .field("auto_orientation", &self.auto_orientation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CompletionMode, FakeBackend};

    #[test]
    fn test_drop_mid_recording_requests_finalize() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session = RecordingSession::create(DeviceSelector::MIC, backend.clone()).unwrap();
        session.start_preview().unwrap();
        session.start_recording("/tmp/dropped.mov").unwrap();

        drop(session);

        assert_eq!(backend.stop_count(), 1);
        assert!(backend.is_finalize_pending());
        assert!(!backend.is_preview_attached());
        // The delegate only holds the session weakly; completing now is harmless.
        assert!(backend.complete_recording());
    }

    #[test]
    fn test_clones_share_state() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session = RecordingSession::create(DeviceSelector::FRONT_CAMERA, backend).unwrap();
        let other = session.clone();

        session.start_recording("/tmp/shared.mov").unwrap();
        assert_eq!(other.state(), RecorderState::Recording);
        assert_eq!(
            other.current_destination(),
            Some(PathBuf::from("/tmp/shared.mov"))
        );
    }

    #[test]
    fn test_rebuild_refused_while_recording() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session = RecordingSession::create(DeviceSelector::BACK_CAMERA, backend.clone()).unwrap();
        session.start_recording("/tmp/busy.mov").unwrap();

        let err = session.rebuild_pipeline().unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(backend.build_count(), 1);
    }

    #[test]
    fn test_debug_output_names_devices() {
        let session =
            RecordingSession::create(DeviceSelector::BACK_CAMERA | DeviceSelector::MIC, FakeBackend::phone())
                .unwrap();
        let debug = format!("{:?}", session);
        assert!(debug.contains("RecordingSession"));
        assert!(debug.contains("Idle"));
    }

    #[test]
    fn test_stale_stop_does_not_finalize_next_recording() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session = RecordingSession::create(DeviceSelector::MIC, backend.clone()).unwrap();

        session.start_recording("/tmp/first.m4a").unwrap();
        let first = session.inner.lifecycle.load();
        assert!(backend.complete_recording());
        session.start_recording("/tmp/second.m4a").unwrap();

        assert!(!session.request_finalize(first));
        assert_eq!(backend.stop_count(), 0);
        assert!(!backend.is_finalize_pending());
        assert_eq!(session.state(), RecorderState::Recording);

        session.stop_recording().unwrap();
        assert_eq!(backend.stop_count(), 1);
        assert!(backend.is_finalize_pending());
    }

    #[test]
    fn test_start_accepted_while_stopped() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session = RecordingSession::create(DeviceSelector::MIC, backend.clone()).unwrap();
        session.start_recording("/tmp/first.m4a").unwrap();

        // Park the session in the window between completion and the idle reset.
        let recording = session.inner.lifecycle.load();
        let stopped = Snapshot::new(RecorderState::Stopped, recording.generation);
        session.inner.lifecycle.transition(recording, stopped).unwrap();
        session.take_request(recording.generation);

        session.start_recording("/tmp/second.m4a").unwrap();
        let current = session.inner.lifecycle.load();
        assert_eq!(current.state, RecorderState::Recording);
        assert_eq!(current.generation, recording.generation + 1);
        assert_eq!(
            session.current_destination(),
            Some(PathBuf::from("/tmp/second.m4a"))
        );
    }

    #[test]
    fn test_late_completion_of_earlier_recording_is_ignored() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session = RecordingSession::create(DeviceSelector::MIC, backend.clone()).unwrap();

        session.start_recording("/tmp/first.m4a").unwrap();
        let first = session.inner.lifecycle.load().generation;
        assert!(backend.complete_recording());
        session.start_recording("/tmp/second.m4a").unwrap();

        session.delegate(Some(first)).did_finish_recording(None, None);
        assert_eq!(session.state(), RecorderState::Recording);
        assert_eq!(
            session.current_destination(),
            Some(PathBuf::from("/tmp/second.m4a"))
        );
    }

    #[test]
    fn test_snapshot_packing() {
        let snapshot = Snapshot::new(RecorderState::Stopped, 41);
        assert_eq!(Snapshot::unpack(snapshot.pack()), snapshot);
        assert_eq!(Snapshot::unpack(0), Snapshot::new(RecorderState::Idle, 0));
    }
}
