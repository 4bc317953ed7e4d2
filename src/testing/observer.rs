use crate::errors::SessionError;
use crate::session::{RecorderObserver, RecordingSession};
use crate::types::RecorderState;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// A notification as seen by the observer, with the session state at the
/// time of the callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Began {
        state: RecorderState,
    },
    Ended {
        saved_path: Option<PathBuf>,
        error: Option<SessionError>,
        state: RecorderState,
    },
}

/// Observer that records every notification in order.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    pub fn begin_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ObservedEvent::Began { .. }))
            .count()
    }

    pub fn end_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ObservedEvent::Ended { .. }))
            .count()
    }

    pub fn last(&self) -> Option<ObservedEvent> {
        self.events.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl RecorderObserver for CollectingObserver {
    fn did_begin_recording(&self, session: &RecordingSession) {
        self.events.lock().push(ObservedEvent::Began {
            state: session.state(),
        });
    }

    fn did_end_recording(
        &self,
        session: &RecordingSession,
        saved_path: Option<&Path>,
        error: Option<&SessionError>,
    ) {
        self.events.lock().push(ObservedEvent::Ended {
            saved_path: saved_path.map(Path::to_path_buf),
            error: error.cloned(),
            state: session.state(),
        });
    }
}
