//! recsession: camera and microphone recording sessions over a pluggable
//! capture backend
//!
//! This crate provides the orchestration layer that sits above a platform
//! capture framework: which inputs to attach, the live preview attachment,
//! the idle → recording → stopped lifecycle, orientation tracking, and the
//! asynchronous completion protocol reported to an observer.
//!
//! # Features
//! - Device selection by bitmask (microphone, front camera, back camera)
//! - Optimistic, race-free start/stop with backend-driven completion
//! - Preview embedding into caller-owned display views
//! - Automatic orientation following with flat-device filtering
//! - Weakly held observers and a tokio channel adapter for async callers
//! - A fake backend for deterministic offline tests
//!
//! # Usage
//! ```rust,ignore
//! use recsession::{DeviceSelector, RecordingSession};
//!
//! let session = RecordingSession::create(
//!     DeviceSelector::BACK_CAMERA | DeviceSelector::MIC,
//!     platform_backend,
//! )?;
//! session.set_observer(&observer);
//! session.start_preview()?;
//! session.start_recording("/tmp/clip.mov")?;
//! // ...
//! session.stop_recording()?;
//! ```
pub mod backend;
pub mod config;
pub mod errors;
pub mod events;
pub mod session;
pub mod types;

// Testing utilities - fake backend for offline testing
pub mod testing;

pub use backend::{select_devices, CaptureBackend, RecordingDelegate};
pub use config::RecorderConfig;
pub use errors::{BackendError, ConfigError, SessionError};
pub use events::{EventForwarder, SessionEvent};
pub use session::{RecorderObserver, RecordingSession};
pub use types::{
    DeviceInfo, DeviceKind, DeviceOrientation, DevicePosition, DeviceSelector, DisplayView,
    Orientation, PreviewAttachment, PreviewFrame, RecorderState, RecordingRequest,
    DEVICE_BACK_CAMERA, DEVICE_FRONT_CAMERA, DEVICE_MIC,
};

/// Initialize logging for the recording session
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "recsession=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
