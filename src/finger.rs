use std::fmt;

use serde::Serialize;

/// Anatomical finger position as reported in a segment descriptor.
/// Standard positions are 1–10; anything else maps to `Unknown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum FingerPosition {
    RightThumb,
    RightIndex,
    RightMiddle,
    RightRing,
    RightLittle,
    LeftThumb,
    LeftIndex,
    LeftMiddle,
    LeftRing,
    LeftLittle,
    Unknown,
}

impl FingerPosition {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FingerPosition::RightThumb,
            2 => FingerPosition::RightIndex,
            3 => FingerPosition::RightMiddle,
            4 => FingerPosition::RightRing,
            5 => FingerPosition::RightLittle,
            6 => FingerPosition::LeftThumb,
            7 => FingerPosition::LeftIndex,
            8 => FingerPosition::LeftMiddle,
            9 => FingerPosition::LeftRing,
            10 => FingerPosition::LeftLittle,
            _ => FingerPosition::Unknown,
        }
    }

    /// Vendor position code, `0` for `Unknown`.
    pub fn code(self) -> i32 {
        match self {
            FingerPosition::RightThumb => 1,
            FingerPosition::RightIndex => 2,
            FingerPosition::RightMiddle => 3,
            FingerPosition::RightRing => 4,
            FingerPosition::RightLittle => 5,
            FingerPosition::LeftThumb => 6,
            FingerPosition::LeftIndex => 7,
            FingerPosition::LeftMiddle => 8,
            FingerPosition::LeftRing => 9,
            FingerPosition::LeftLittle => 10,
            FingerPosition::Unknown => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FingerPosition::RightThumb => "Right Thumb",
            FingerPosition::RightIndex => "Right Index",
            FingerPosition::RightMiddle => "Right Middle",
            FingerPosition::RightRing => "Right Ring",
            FingerPosition::RightLittle => "Right Little",
            FingerPosition::LeftThumb => "Left Thumb",
            FingerPosition::LeftIndex => "Left Index",
            FingerPosition::LeftMiddle => "Left Middle",
            FingerPosition::LeftRing => "Left Ring",
            FingerPosition::LeftLittle => "Left Little",
            FingerPosition::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for FingerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
