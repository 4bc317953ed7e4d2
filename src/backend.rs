//! Capture backend abstraction
//!
//! The platform capture framework sits behind [`CaptureBackend`]. It owns
//! device discovery, encoding, muxing and file output; the session only
//! drives it and reacts to its callbacks through [`RecordingDelegate`].

use crate::errors::{BackendError, SessionError};
use crate::types::{DeviceInfo, DeviceOrientation, DeviceSelector, Orientation, PreviewFrame};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callbacks a backend delivers on its own execution context.
pub trait RecordingDelegate: Send + Sync {
    /// The sink accepted the request and began writing.
    fn did_start_recording(&self, destination: &Path);

    /// The sink finished, successfully or not. Called exactly once per
    /// accepted `start_recording`.
    fn did_finish_recording(&self, destination: Option<PathBuf>, error: Option<BackendError>);

    /// The pipeline stopped running (device removed, media services reset).
    fn did_lose_pipeline(&self, error: BackendError);
}

/// Platform capture framework seen by a recording session.
///
/// Implementations may block on hardware I/O in any method. The session never
/// holds a lock while calling into the backend, so callbacks may be
/// delivered re-entrantly from inside these calls.
pub trait CaptureBackend: Send + Sync {
    /// Enumerate the capture devices currently present.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Build the capture pipeline with exactly these inputs, replacing any
    /// previous pipeline. Runtime failures of the pipeline are reported to
    /// `delegate` through `did_lose_pipeline`.
    fn build_pipeline(
        &self,
        inputs: &[DeviceInfo],
        delegate: Arc<dyn RecordingDelegate>,
    ) -> Result<(), BackendError>;

    /// Start streaming to the preview surface, embedded at `frame` when given.
    fn attach_preview(&self, frame: Option<PreviewFrame>);

    fn detach_preview(&self);

    /// Begin writing to `destination`.
    ///
    /// An `Err` means the request was never accepted and `delegate` will not
    /// be called for it. After `Ok`, the backend must eventually call
    /// `did_finish_recording` exactly once.
    fn start_recording(
        &self,
        destination: &Path,
        delegate: Arc<dyn RecordingDelegate>,
    ) -> Result<(), BackendError>;

    /// Ask the sink to finalize. Completion arrives through the delegate.
    fn stop_recording(&self);

    /// Current physical orientation of the device.
    fn physical_orientation(&self) -> DeviceOrientation;

    /// Rotate active preview and recording connections without interrupting them.
    fn set_orientation(&self, orientation: Orientation);
}

/// Resolve a selector to concrete devices.
///
/// For each requested flag the first enumerated device of matching kind and
/// position is taken.
pub fn select_devices(
    selector: DeviceSelector,
    available: &[DeviceInfo],
) -> Result<Vec<DeviceInfo>, SessionError> {
    if selector.is_empty() {
        return Err(SessionError::configuration("No capture devices requested"));
    }

    selector
        .flags()
        .map(|flag| {
            available
                .iter()
                .find(|device| device.matches(flag))
                .cloned()
                .ok_or_else(|| {
                    SessionError::configuration(format!("No device available for {}", flag))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DevicePosition;

    fn phone_devices() -> Vec<DeviceInfo> {
        vec![
            DeviceInfo::camera("back-wide", "Back Camera", DevicePosition::Back),
            DeviceInfo::camera("back-tele", "Back Telephoto Camera", DevicePosition::Back),
            DeviceInfo::camera("front", "Front Camera", DevicePosition::Front),
            DeviceInfo::microphone("mic", "iPhone Microphone"),
        ]
    }

    #[test]
    fn test_select_first_matching_device() {
        let selected = select_devices(
            DeviceSelector::BACK_CAMERA | DeviceSelector::MIC,
            &phone_devices(),
        )
        .unwrap();
        let ids: Vec<_> = selected.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["mic", "back-wide"]);
    }

    #[test]
    fn test_select_empty_selector_fails() {
        let err = select_devices(DeviceSelector::NONE, &phone_devices()).unwrap_err();
        assert!(matches!(err, SessionError::ConfigurationError(_)));
    }

    #[test]
    fn test_select_missing_device_fails() {
        let laptop = vec![
            DeviceInfo::camera("facetime", "FaceTime HD Camera", DevicePosition::Front),
            DeviceInfo::microphone("mic", "MacBook Microphone"),
        ];
        let err = select_devices(DeviceSelector::BACK_CAMERA, &laptop).unwrap_err();
        assert!(err.to_string().contains("back_camera"));
    }
}
