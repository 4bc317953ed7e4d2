//! Testing utilities
//!
//! Deterministic stand-ins for a platform capture framework and a
//! notification-recording observer, for offline tests without hardware.

pub mod fake_backend;
pub mod observer;

pub use fake_backend::{CompletionMode, FakeBackend};
pub use observer::{CollectingObserver, ObservedEvent};
