use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::finger::FingerPosition;

/// Capture profiles offered before a capture. Fixed at compile time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    #[value(name = "both-thumbs")]
    BothThumbs,
    #[value(name = "four-left")]
    #[serde(rename = "four-left")]
    FourFingersLeft,
    #[value(name = "four-right")]
    #[serde(rename = "four-right")]
    FourFingersRight,
    #[default]
    #[value(name = "single")]
    #[serde(rename = "single")]
    SingleFinger,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 4] = [
        CaptureMode::BothThumbs,
        CaptureMode::FourFingersLeft,
        CaptureMode::FourFingersRight,
        CaptureMode::SingleFinger,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CaptureMode::BothThumbs => "Both Thumbs",
            CaptureMode::FourFingersLeft => "4 Fingers Left Hand",
            CaptureMode::FourFingersRight => "4 Fingers Right Hand",
            CaptureMode::SingleFinger => "Single Finger (Right Index)",
        }
    }

    /// Sensor input-image-type code passed to the capture call.
    pub fn input_image_type(self) -> i32 {
        match self {
            CaptureMode::BothThumbs => 21,
            CaptureMode::FourFingersLeft => 22,
            CaptureMode::FourFingersRight => 23,
            CaptureMode::SingleFinger => 2,
        }
    }

    pub fn expected_fingers(self) -> u8 {
        self.finger_positions().len() as u8
    }

    /// Fingers a successful capture in this mode is expected to contain.
    pub fn finger_positions(self) -> &'static [FingerPosition] {
        use FingerPosition::*;
        match self {
            CaptureMode::BothThumbs => &[RightThumb, LeftThumb],
            CaptureMode::FourFingersLeft => &[LeftIndex, LeftMiddle, LeftRing, LeftLittle],
            CaptureMode::FourFingersRight => &[RightIndex, RightMiddle, RightRing, RightLittle],
            CaptureMode::SingleFinger => &[RightIndex],
        }
    }

    /// Name accepted on the command line.
    pub fn cli_name(self) -> &'static str {
        match self {
            CaptureMode::BothThumbs => "both-thumbs",
            CaptureMode::FourFingersLeft => "four-left",
            CaptureMode::FourFingersRight => "four-right",
            CaptureMode::SingleFinger => "single",
        }
    }

    pub fn from_cli_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.cli_name() == name)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
