//! Property-based tests for the recording session state machine
//!
//! Run with: cargo test --test session_props

use proptest::prelude::*;
use recsession::testing::{CollectingObserver, CompletionMode, FakeBackend, ObservedEvent};
use recsession::{
    BackendError, DeviceOrientation, DeviceSelector, Orientation, RecorderState, RecordingSession,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Start,
    Stop,
    Complete,
    Fail,
    Adapt,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Stop),
        Just(Op::Complete),
        Just(Op::Fail),
        Just(Op::Adapt),
    ]
}

fn device_orientation_strategy() -> impl Strategy<Value = DeviceOrientation> {
    prop_oneof![
        Just(DeviceOrientation::Unknown),
        Just(DeviceOrientation::Portrait),
        Just(DeviceOrientation::PortraitUpsideDown),
        Just(DeviceOrientation::LandscapeLeft),
        Just(DeviceOrientation::LandscapeRight),
        Just(DeviceOrientation::FaceUp),
        Just(DeviceOrientation::FaceDown),
    ]
}

proptest! {
    /// Any non-empty selector over phone hardware builds an idle session.
    #[test]
    fn non_empty_selector_builds_idle_session(bits in 1u8..=7) {
        let selector = DeviceSelector::from_bits(bits).unwrap();
        let session = RecordingSession::create(selector, FakeBackend::phone()).unwrap();

        prop_assert_eq!(session.state(), RecorderState::Idle);
        prop_assert_eq!(session.inputs().len(), selector.flags().count());
    }

    /// Bits outside the three device flags are refused.
    #[test]
    fn unknown_selector_bits_are_refused(bits in 8u8..=255) {
        prop_assert!(DeviceSelector::from_bits(bits).is_err());
    }

    /// With auto orientation off, no physical reading changes the orientation.
    #[test]
    fn adapt_without_auto_never_mutates(
        readings in prop::collection::vec(device_orientation_strategy(), 0..20),
    ) {
        let backend = FakeBackend::phone();
        let session = RecordingSession::create(DeviceSelector::BACK_CAMERA, backend.clone()).unwrap();

        for reading in readings {
            backend.set_physical_orientation(reading);
            prop_assert_eq!(session.adapt_orientation(), Orientation::Portrait);
            prop_assert_eq!(session.orientation(), Orientation::Portrait);
        }
        prop_assert_eq!(backend.applied_orientations(), vec![Orientation::Portrait]);
    }

    /// With auto orientation on, the orientation is the last usable reading.
    #[test]
    fn adapt_with_auto_tracks_last_usable_reading(
        readings in prop::collection::vec(device_orientation_strategy(), 0..20),
    ) {
        let backend = FakeBackend::phone();
        let session = RecordingSession::create(DeviceSelector::BACK_CAMERA, backend.clone()).unwrap();
        session.set_auto_orientation(true);

        let mut expected = Orientation::Portrait;
        for reading in readings {
            backend.set_physical_orientation(reading);
            if let Some(orientation) = reading.capture_orientation() {
                expected = orientation;
            }
            prop_assert_eq!(session.adapt_orientation(), expected);
        }
        prop_assert_eq!(session.orientation(), expected);
    }

    /// Every accepted start gets exactly one end, each end leaves the
    /// session idle, and rejected calls never reach the observer.
    #[test]
    fn every_accepted_start_ends_once(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let backend = FakeBackend::phone().with_completion(CompletionMode::Manual);
        let session =
            RecordingSession::create(DeviceSelector::BACK_CAMERA | DeviceSelector::MIC, backend.clone())
                .unwrap();
        let observer = Arc::new(CollectingObserver::new());
        session.set_observer(&observer);

        let mut accepted = 0usize;
        for (i, op) in ops.iter().enumerate() {
            let before = session.state();
            let events_before = observer.events().len();
            match op {
                Op::Start => {
                    let result = session.start_recording(format!("/tmp/prop-{}.mov", i));
                    if before == RecorderState::Idle {
                        prop_assert!(result.is_ok());
                        accepted += 1;
                    } else {
                        prop_assert!(result.unwrap_err().is_invalid_state());
                        prop_assert_eq!(observer.events().len(), events_before);
                    }
                }
                Op::Stop => {
                    let result = session.stop_recording();
                    prop_assert_eq!(result.is_ok(), before == RecorderState::Recording);
                    prop_assert_eq!(observer.events().len(), events_before);
                }
                Op::Complete => {
                    backend.complete_recording();
                }
                Op::Fail => {
                    backend.fail_recording(BackendError::Runtime("interrupted".to_string()));
                }
                Op::Adapt => {
                    session.adapt_orientation();
                    prop_assert_eq!(session.state(), before);
                }
            }
            prop_assert_ne!(session.state(), RecorderState::Stopped);
        }

        backend.complete_recording();
        prop_assert_eq!(session.state(), RecorderState::Idle);
        prop_assert_eq!(observer.begin_count(), accepted);
        prop_assert_eq!(observer.end_count(), accepted);

        for event in observer.events() {
            if let ObservedEvent::Ended { state, .. } = event {
                prop_assert_eq!(state, RecorderState::Stopped);
            }
        }
        prop_assert!(session.start_recording("/tmp/after.mov").is_ok());
    }
}
