use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

pub const DEVICE_MIC: u8 = 0x01;
pub const DEVICE_FRONT_CAMERA: u8 = 0x02;
pub const DEVICE_BACK_CAMERA: u8 = 0x04;

/// Set of capture inputs a session attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSelector(u8);

impl DeviceSelector {
    pub const NONE: DeviceSelector = DeviceSelector(0);
    pub const MIC: DeviceSelector = DeviceSelector(DEVICE_MIC);
    pub const FRONT_CAMERA: DeviceSelector = DeviceSelector(DEVICE_FRONT_CAMERA);
    pub const BACK_CAMERA: DeviceSelector = DeviceSelector(DEVICE_BACK_CAMERA);

    const ALL_BITS: u8 = DEVICE_MIC | DEVICE_FRONT_CAMERA | DEVICE_BACK_CAMERA;

    /// Build a selector from a raw bitmask, rejecting unknown bits.
    pub fn from_bits(bits: u8) -> Result<Self, SessionError> {
        if bits & !Self::ALL_BITS != 0 {
            return Err(SessionError::configuration(format!(
                "Unknown device bits: {:#04x}",
                bits & !Self::ALL_BITS
            )));
        }
        Ok(DeviceSelector(bits))
    }

    /// Parse a configuration name (`mic`, `front_camera`, `back_camera`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mic" | "microphone" => Some(Self::MIC),
            "front_camera" => Some(Self::FRONT_CAMERA),
            "back_camera" => Some(Self::BACK_CAMERA),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: DeviceSelector) -> bool {
        self.0 & other.0 == other.0
    }

    /// Individual flags in a fixed order: mic, front camera, back camera.
    pub fn flags(&self) -> impl Iterator<Item = DeviceSelector> + '_ {
        [Self::MIC, Self::FRONT_CAMERA, Self::BACK_CAMERA]
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }

    /// Kind and position a device must have to satisfy a single flag.
    pub(crate) fn requirement(flag: DeviceSelector) -> (DeviceKind, Option<DevicePosition>) {
        match flag.0 {
            DEVICE_MIC => (DeviceKind::Microphone, None),
            DEVICE_FRONT_CAMERA => (DeviceKind::Camera, Some(DevicePosition::Front)),
            _ => (DeviceKind::Camera, Some(DevicePosition::Back)),
        }
    }
}

impl BitOr for DeviceSelector {
    type Output = DeviceSelector;

    fn bitor(self, rhs: DeviceSelector) -> DeviceSelector {
        DeviceSelector(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceSelector {
    fn bitor_assign(&mut self, rhs: DeviceSelector) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .flags()
            .map(|flag| match flag.0 {
                DEVICE_MIC => "mic",
                DEVICE_FRONT_CAMERA => "front_camera",
                _ => "back_camera",
            })
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RecorderState {
    #[default]
    Idle = 0,
    Recording = 1,
    Stopped = 2,
}

impl RecorderState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RecorderState::Recording,
            2 => RecorderState::Stopped,
            _ => RecorderState::Idle,
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Recording => write!(f, "recording"),
            RecorderState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Orientation applied to preview and recording connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeRight,
    LandscapeLeft,
}

/// Physical orientation as reported by the device sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl DeviceOrientation {
    /// Capture orientation for this physical orientation.
    ///
    /// Face up, face down and unknown carry no rotation and yield `None`.
    /// The landscape cases swap: a device rotated left records landscape right.
    pub fn capture_orientation(self) -> Option<Orientation> {
        match self {
            DeviceOrientation::Portrait => Some(Orientation::Portrait),
            DeviceOrientation::PortraitUpsideDown => Some(Orientation::PortraitUpsideDown),
            DeviceOrientation::LandscapeLeft => Some(Orientation::LandscapeRight),
            DeviceOrientation::LandscapeRight => Some(Orientation::LandscapeLeft),
            DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Camera,
    Microphone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePosition {
    Front,
    Back,
    Unspecified,
}

/// A capture device as enumerated by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub position: DevicePosition,
}

impl DeviceInfo {
    pub fn camera(id: impl Into<String>, name: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: DeviceKind::Camera,
            position,
        }
    }

    pub fn microphone(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: DeviceKind::Microphone,
            position: DevicePosition::Unspecified,
        }
    }

    /// Whether this device satisfies a single selector flag.
    pub fn matches(&self, flag: DeviceSelector) -> bool {
        let (kind, position) = DeviceSelector::requirement(flag);
        self.kind == kind && position.map_or(true, |p| self.position == p)
    }
}

/// Caller-owned display area the preview can be embedded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayView {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl DisplayView {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    /// Full-bounds layout of a preview inside this view.
    pub fn full_bounds(&self) -> PreviewFrame {
        PreviewFrame {
            view: self.id,
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }
}

/// Placement of the preview surface within a display view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewFrame {
    pub view: u64,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Current preview relationship of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewAttachment {
    #[default]
    Detached,
    /// Preview surface is live but not embedded into a caller view.
    Surface,
    Embedded(DisplayView),
}

impl PreviewAttachment {
    pub fn is_attached(&self) -> bool {
        !matches!(self, PreviewAttachment::Detached)
    }
}

/// Destination of a single recording.
///
/// `generation` increases with every accepted start, so callbacks and stop
/// requests can be matched to the recording they were issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRequest {
    pub destination: PathBuf,
    pub generation: u64,
}

impl RecordingRequest {
    pub fn new(destination: impl AsRef<Path>, generation: u64) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
            generation,
        }
    }
}
