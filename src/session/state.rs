use std::sync::Arc;

use image::GrayImage;
use serde::Serialize;

use crate::device::ImageInfo;
use crate::finger::FingerPosition;
use crate::mode::CaptureMode;

/// Markers that flag a status line as an error.
const ERROR_MARKERS: [&str; 2] = ["Error", "⚠️"];

pub const STATUS_READY: &str = "SDK Ready";
pub const STATUS_EMULATOR: &str = "⚠️ Emulator detected - Connect a physical device";
pub const STATUS_OPENING: &str = "Opening device...";
pub const STATUS_PROCESSING: &str = "Processing image...";
pub const STATUS_CLOSED: &str = "Device Closed";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Error,
}

/// The single human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub text: String,
    pub severity: Severity,
}

impl SessionStatus {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let severity = if ERROR_MARKERS.iter().any(|m| text.contains(m)) {
            Severity::Error
        } else {
            Severity::Normal
        };
        Self { text, severity }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Which device-mutating operation is in flight. At most one at a time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    #[default]
    Idle,
    Opening,
    Capturing,
}

/// Quality band used when presenting a score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    Good,
    Fair,
    Poor,
}

impl QualityBand {
    pub fn of(score: u8) -> Self {
        match score {
            80..=u8::MAX => QualityBand::Good,
            50..=79 => QualityBand::Fair,
            _ => QualityBand::Poor,
        }
    }
}

/// One captured finger, ready for presentation.
#[derive(Debug, Clone)]
pub struct FingerprintResult {
    /// Decoded raster. Shared across segments of one slap.
    pub image: Arc<GrayImage>,
    /// 0–100.
    pub quality: u8,
    pub feature_data: Vec<u8>,
    pub position: FingerPosition,
}

impl FingerprintResult {
    pub fn quality_band(&self) -> QualityBand {
        QualityBand::of(self.quality)
    }
}

/// Screen state. Only the session controller mutates it, and only through
/// its open / capture / close / event transitions.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) status: SessionStatus,
    pub(crate) activity: Activity,
    pub(crate) device: Option<ImageInfo>,
    pub(crate) device_count: usize,
    pub(crate) results: Vec<FingerprintResult>,
    pub(crate) selected_mode: CaptureMode,
    pub(crate) capture_enabled: bool,
}

impl SessionState {
    pub(crate) fn new(status: SessionStatus, capture_enabled: bool) -> Self {
        Self {
            status,
            activity: Activity::Idle,
            device: None,
            device_count: 0,
            results: Vec::new(),
            selected_mode: CaptureMode::default(),
            capture_enabled,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn is_opening(&self) -> bool {
        self.activity == Activity::Opening
    }

    pub fn is_capturing(&self) -> bool {
        self.activity == Activity::Capturing
    }

    pub fn is_busy(&self) -> bool {
        self.activity != Activity::Idle
    }

    /// Geometry of the open device, `None` while no handle is held.
    pub fn device(&self) -> Option<ImageInfo> {
        self.device
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    pub fn results(&self) -> &[FingerprintResult] {
        &self.results
    }

    pub fn selected_mode(&self) -> CaptureMode {
        self.selected_mode
    }

    /// False for the whole session after emulator detection or SDK failure.
    pub fn capture_enabled(&self) -> bool {
        self.capture_enabled
    }

    pub fn can_select_mode(&self) -> bool {
        self.capture_enabled && !self.is_busy()
    }

    pub fn can_open(&self) -> bool {
        self.capture_enabled && self.device.is_none() && !self.is_busy()
    }

    pub fn can_capture(&self) -> bool {
        self.capture_enabled && self.device.is_some() && !self.is_busy()
    }

    pub fn can_close(&self) -> bool {
        self.capture_enabled && self.device.is_some() && !self.is_busy()
    }
}
