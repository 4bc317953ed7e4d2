//! Fake capture backend
//!
//! Configurable implementation of [`CaptureBackend`] that records every call
//! and lets tests decide when and how recordings complete.

use crate::backend::{CaptureBackend, RecordingDelegate};
use crate::errors::BackendError;
use crate::types::{DeviceInfo, DeviceOrientation, DevicePosition, Orientation, PreviewFrame};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

type Callback = Box<dyn FnOnce() + Send>;

/// How the fake delivers recording callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Callbacks run inline, inside `start_recording` / `stop_recording`.
    Immediate,
    /// Callbacks run in order on a dedicated worker thread.
    Threaded,
    /// `did_start_recording` runs inline; completion waits for
    /// [`FakeBackend::complete_recording`] or [`FakeBackend::fail_recording`].
    Manual,
}

struct ActiveRecording {
    destination: PathBuf,
    delegate: Arc<dyn RecordingDelegate>,
}

/// Shareable fake backend. Clones observe and control the same state.
#[derive(Clone)]
pub struct FakeBackend {
    devices: Arc<Mutex<Vec<DeviceInfo>>>,
    completion: CompletionMode,
    worker: Option<Sender<Callback>>,
    pipeline_error: Arc<Mutex<Option<BackendError>>>,
    start_error: Arc<Mutex<Option<BackendError>>>,
    async_start_error: Arc<Mutex<Option<BackendError>>>,
    finish_error: Arc<Mutex<Option<BackendError>>>,
    pipeline_delegate: Arc<Mutex<Option<Arc<dyn RecordingDelegate>>>>,
    pipeline_inputs: Arc<Mutex<Vec<DeviceInfo>>>,
    active: Arc<Mutex<Option<ActiveRecording>>>,
    finalize_pending: Arc<AtomicBool>,
    preview_attached: Arc<AtomicBool>,
    preview_frame: Arc<Mutex<Option<PreviewFrame>>>,
    physical: Arc<Mutex<DeviceOrientation>>,
    applied_orientations: Arc<Mutex<Vec<Orientation>>>,
    build_count: Arc<AtomicU32>,
    attach_count: Arc<AtomicU32>,
    detach_count: Arc<AtomicU32>,
    start_count: Arc<AtomicU32>,
    stop_count: Arc<AtomicU32>,
}

impl FakeBackend {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices: Arc::new(Mutex::new(devices)),
            completion: CompletionMode::Immediate,
            worker: None,
            pipeline_error: Arc::new(Mutex::new(None)),
            start_error: Arc::new(Mutex::new(None)),
            async_start_error: Arc::new(Mutex::new(None)),
            finish_error: Arc::new(Mutex::new(None)),
            pipeline_delegate: Arc::new(Mutex::new(None)),
            pipeline_inputs: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(Mutex::new(None)),
            finalize_pending: Arc::new(AtomicBool::new(false)),
            preview_attached: Arc::new(AtomicBool::new(false)),
            preview_frame: Arc::new(Mutex::new(None)),
            physical: Arc::new(Mutex::new(DeviceOrientation::Portrait)),
            applied_orientations: Arc::new(Mutex::new(Vec::new())),
            build_count: Arc::new(AtomicU32::new(0)),
            attach_count: Arc::new(AtomicU32::new(0)),
            detach_count: Arc::new(AtomicU32::new(0)),
            start_count: Arc::new(AtomicU32::new(0)),
            stop_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Phone-like hardware: back and front camera plus a microphone.
    pub fn phone() -> Self {
        Self::new(vec![
            DeviceInfo::camera("back-wide", "Back Camera", DevicePosition::Back),
            DeviceInfo::camera("front", "Front Camera", DevicePosition::Front),
            DeviceInfo::microphone("mic", "Built-in Microphone"),
        ])
    }

    /// Laptop-like hardware: a single front camera plus a microphone.
    pub fn laptop() -> Self {
        Self::new(vec![
            DeviceInfo::camera("facetime", "FaceTime HD Camera", DevicePosition::Front),
            DeviceInfo::microphone("mic", "Built-in Microphone"),
        ])
    }

    /// Choose how callbacks are delivered. `Threaded` starts the worker thread,
    /// which exits once every clone of this backend is dropped.
    pub fn with_completion(mut self, mode: CompletionMode) -> Self {
        self.completion = mode;
        self.worker = match mode {
            CompletionMode::Threaded => {
                let (tx, rx) = unbounded::<Callback>();
                std::thread::Builder::new()
                    .name("fake-capture-callbacks".to_string())
                    .spawn(move || {
                        for callback in rx {
                            callback();
                        }
                    })
                    .ok()
                    .map(|_| tx)
            }
            _ => None,
        };
        self
    }

    /// Reject the next pipeline builds with `error`.
    pub fn reject_pipeline(&self, error: Option<BackendError>) {
        *self.pipeline_error.lock() = error;
    }

    /// Refuse recording requests synchronously.
    pub fn fail_start(&self, error: Option<BackendError>) {
        *self.start_error.lock() = error;
    }

    /// Accept recording requests, then fail them before they begin.
    pub fn fail_start_async(&self, error: Option<BackendError>) {
        *self.async_start_error.lock() = error;
    }

    /// Fail the finalize step of recordings.
    pub fn fail_finalize(&self, error: Option<BackendError>) {
        *self.finish_error.lock() = error;
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.lock() = devices;
    }

    pub fn set_physical_orientation(&self, orientation: DeviceOrientation) {
        *self.physical.lock() = orientation;
    }

    /// Complete the in-flight recording (manual mode). Returns false if none.
    pub fn complete_recording(&self) -> bool {
        let error = self.finish_error.lock().clone();
        self.finish_active(error)
    }

    /// Fail the in-flight recording with `error`, as a runtime failure would.
    pub fn fail_recording(&self, error: BackendError) -> bool {
        self.finish_active(Some(error))
    }

    /// Simulate the pipeline dying: the session is told, and any in-flight
    /// recording ends with the same error.
    pub fn lose_pipeline(&self, error: BackendError) {
        self.preview_attached.store(false, Ordering::SeqCst);
        let delegate = self.pipeline_delegate.lock().clone();
        if let Some(delegate) = delegate {
            let reported = error.clone();
            self.deliver(move || delegate.did_lose_pipeline(reported));
        }
        self.finish_active(Some(error));
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn is_finalize_pending(&self) -> bool {
        self.finalize_pending.load(Ordering::SeqCst)
    }

    pub fn is_preview_attached(&self) -> bool {
        self.preview_attached.load(Ordering::SeqCst)
    }

    pub fn preview_frame(&self) -> Option<PreviewFrame> {
        *self.preview_frame.lock()
    }

    pub fn pipeline_inputs(&self) -> Vec<DeviceInfo> {
        self.pipeline_inputs.lock().clone()
    }

    pub fn applied_orientations(&self) -> Vec<Orientation> {
        self.applied_orientations.lock().clone()
    }

    pub fn build_count(&self) -> u32 {
        self.build_count.load(Ordering::SeqCst)
    }

    pub fn attach_count(&self) -> u32 {
        self.attach_count.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> u32 {
        self.detach_count.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::SeqCst)
    }

    fn deliver(&self, callback: impl FnOnce() + Send + 'static) {
        match &self.worker {
            Some(worker) => {
                if worker.send(Box::new(callback)).is_err() {
                    log::warn!("Fake backend worker is gone, dropping callback");
                }
            }
            None => callback(),
        }
    }

    fn finish_active(&self, error: Option<BackendError>) -> bool {
        let Some(active) = self.active.lock().take() else {
            return false;
        };
        self.finalize_pending.store(false, Ordering::SeqCst);

        // A failed finalize still leaves a partial file behind.
        let destination = Some(active.destination);
        let delegate = active.delegate;
        self.deliver(move || delegate.did_finish_recording(destination, error));
        true
    }
}

impl CaptureBackend for FakeBackend {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.lock().clone()
    }

    fn build_pipeline(
        &self,
        inputs: &[DeviceInfo],
        delegate: Arc<dyn RecordingDelegate>,
    ) -> Result<(), BackendError> {
        self.build_count.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.pipeline_error.lock().clone() {
            return Err(error);
        }

        let present = self.devices.lock();
        if let Some(missing) = inputs.iter().find(|input| !present.contains(input)) {
            return Err(BackendError::DeviceUnavailable(missing.id.clone()));
        }
        drop(present);

        *self.pipeline_inputs.lock() = inputs.to_vec();
        *self.pipeline_delegate.lock() = Some(delegate);
        Ok(())
    }

    fn attach_preview(&self, frame: Option<PreviewFrame>) {
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        *self.preview_frame.lock() = frame;
        self.preview_attached.store(true, Ordering::SeqCst);
    }

    fn detach_preview(&self) {
        self.detach_count.fetch_add(1, Ordering::SeqCst);
        *self.preview_frame.lock() = None;
        self.preview_attached.store(false, Ordering::SeqCst);
    }

    fn start_recording(
        &self,
        destination: &Path,
        delegate: Arc<dyn RecordingDelegate>,
    ) -> Result<(), BackendError> {
        self.start_count.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.start_error.lock().clone() {
            return Err(error);
        }

        {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(BackendError::Start(
                    "Recording already in progress".to_string(),
                ));
            }
            *active = Some(ActiveRecording {
                destination: destination.to_path_buf(),
                delegate: delegate.clone(),
            });
        }

        if let Some(error) = self.async_start_error.lock().clone() {
            self.active.lock().take();
            self.deliver(move || delegate.did_finish_recording(None, Some(error)));
            return Ok(());
        }

        let started = destination.to_path_buf();
        match self.completion {
            CompletionMode::Threaded => {
                self.deliver(move || delegate.did_start_recording(&started));
            }
            CompletionMode::Immediate | CompletionMode::Manual => {
                delegate.did_start_recording(&started);
            }
        }
        Ok(())
    }

    fn stop_recording(&self) {
        self.stop_count.fetch_add(1, Ordering::SeqCst);

        if self.active.lock().is_none() {
            return;
        }

        match self.completion {
            CompletionMode::Manual => self.finalize_pending.store(true, Ordering::SeqCst),
            CompletionMode::Immediate | CompletionMode::Threaded => {
                self.complete_recording();
            }
        }
    }

    fn physical_orientation(&self) -> DeviceOrientation {
        *self.physical.lock()
    }

    fn set_orientation(&self, orientation: Orientation) {
        self.applied_orientations.lock().push(orientation);
    }
}
