//! Session events for async consumers
//!
//! Observer callbacks arrive on the backend's thread. [`EventForwarder`]
//! turns them into [`SessionEvent`]s on a tokio channel so the caller can
//! handle them on its own runtime.

use crate::errors::SessionError;
use crate::session::{RecorderObserver, RecordingSession};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    BeganRecording,
    EndedRecording {
        saved_path: Option<PathBuf>,
        error: Option<String>,
    },
}

impl SessionEvent {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionEvent::EndedRecording { error: None, .. })
    }
}

/// Observer that forwards notifications into an unbounded channel.
///
/// The session only holds observers weakly, so keep the returned `Arc` alive
/// for as long as events should flow.
pub struct EventForwarder {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl EventForwarder {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }

    /// Create a forwarder and register it on `session`.
    pub fn attach(session: &RecordingSession) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (forwarder, receiver) = Self::channel();
        session.set_observer(&forwarder);
        (forwarder, receiver)
    }

    fn send(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Session event dropped: receiver closed");
        }
    }
}

impl RecorderObserver for EventForwarder {
    fn did_begin_recording(&self, _session: &RecordingSession) {
        self.send(SessionEvent::BeganRecording);
    }

    fn did_end_recording(
        &self,
        _session: &RecordingSession,
        saved_path: Option<&Path>,
        error: Option<&SessionError>,
    ) {
        self.send(SessionEvent::EndedRecording {
            saved_path: saved_path.map(Path::to_path_buf),
            error: error.map(|e| e.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CompletionMode, FakeBackend};
    use crate::types::DeviceSelector;

    #[tokio::test]
    async fn test_forwarder_delivers_lifecycle_from_worker_thread() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Threaded);
        let session =
            RecordingSession::create(DeviceSelector::BACK_CAMERA | DeviceSelector::MIC, backend)
                .unwrap();
        let (_forwarder, mut events) = EventForwarder::attach(&session);

        session.start_recording("/tmp/forwarded.mov").unwrap();
        assert_eq!(events.recv().await, Some(SessionEvent::BeganRecording));

        session.stop_recording().unwrap();
        let ended = events.recv().await.unwrap();
        assert!(ended.is_success());
        assert_eq!(
            ended,
            SessionEvent::EndedRecording {
                saved_path: Some(PathBuf::from("/tmp/forwarded.mov")),
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_forwarder_stops_events() {
        let backend = FakeBackend::phone();
        let session = RecordingSession::create(DeviceSelector::MIC, backend).unwrap();
        let (forwarder, mut events) = EventForwarder::attach(&session);
        drop(forwarder);

        session.start_recording("/tmp/unobserved.mov").unwrap();
        session.stop_recording().unwrap();

        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_restart_as_soon_as_end_event_arrives() {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Threaded);
        let session = RecordingSession::create(DeviceSelector::MIC, backend).unwrap();
        let (_forwarder, mut events) = EventForwarder::attach(&session);

        for round in 0..500 {
            session
                .start_recording(format!("/tmp/round-{}.m4a", round))
                .unwrap_or_else(|e| panic!("restart {} rejected: {}", round, e));
            assert_eq!(events.recv().await, Some(SessionEvent::BeganRecording));

            session.stop_recording().unwrap();
            let ended = events.recv().await.unwrap();
            assert!(ended.is_success(), "round {} ended with {:?}", round, ended);
        }
    }
}
