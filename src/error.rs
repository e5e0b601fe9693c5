use thiserror::Error;

/// Vendor event codes reported on a multi-finger capture callback.
pub mod event_code {
    pub const PROGRESS: i32 = 1;
    pub const SUCCESS: i32 = 9;
    pub const TIMEOUT: i32 = 11;
    pub const NO_FINGER: i32 = -2;
    pub const LOW_QUALITY: i32 = -5;
    pub const WRONG_FINGER_COUNT: i32 = -8;
}

/// Translate a vendor capture event code into a human-readable string.
pub fn event_code_message(code: i32) -> &'static str {
    match code {
        event_code::PROGRESS => "Image being processed (PROGRESS)",
        event_code::SUCCESS => "Segments ready (SUCCESS)",
        event_code::TIMEOUT => "No capture within window (TIMEOUT)",
        event_code::NO_FINGER => "Sensor saw nothing (NO_FINGER)",
        event_code::LOW_QUALITY => "Capture rejected for quality (LOW_QUALITY)",
        event_code::WRONG_FINGER_COUNT => "Finger count mismatch (WRONG_FINGER_COUNT)",
        _ => "Unknown event code",
    }
}

/// Failure reported (or thrown) by the external device layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DeviceError {
    pub message: String,
}

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Session failures. `Display` is the status line shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Error: SDK initialization failed: {0}")]
    Initialization(String),

    #[error("Error opening: {0}")]
    Open(String),

    #[error("Error: Low quality. Try again.")]
    Quality,

    #[error("Error: Timeout. Please try again.")]
    Timeout,

    #[error("Error: No fingers detected")]
    NoFinger,

    #[error("Error: Wrong number of fingers. Expected {expected}")]
    CountMismatch { expected: u8 },

    /// Local to one segment; never fails the batch.
    #[error("Error: Could not decode segment {index}: {reason}")]
    Decode { index: usize, reason: String },

    #[error("Error closing: {0}")]
    Close(String),

    #[error("Error (callback): {0}")]
    Callback(String),

    #[error("Error: {0}")]
    Request(String),
}

/// A controller request refused because its preconditions do not hold.
/// Nothing is sent to the device layer when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("another device operation is in progress")]
    Busy,

    #[error("Device not opened")]
    NotOpen,

    #[error("device already open")]
    AlreadyOpen,

    #[error("capture is disabled for this session")]
    Disabled,
}
