//! Capability interface over the vendor device SDK.
//!
//! The session core only ever talks to these traits. A real backend wraps
//! the vendor library; [`simulated::SimulatedDevice`] stands in for it on
//! machines without the sensor and in tests.

pub mod runtime;
pub mod simulated;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::DeviceError;

/// Geometry of frames produced by an opened sensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Dots per inch.
    pub resolution: u32,
}

/// Parameter triple handed to a multi-finger capture request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CaptureParams {
    pub input_image_type: i32,
    pub timeout: Duration,
    pub retries: u32,
}

/// One detected finger in a slap frame, as described by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub finger_position: i32,
    /// Vendor template bytes; absent when extraction produced nothing.
    pub feature_data: Option<Vec<u8>>,
}

/// Everything a capture callback delivers for one event.
#[derive(Debug, Clone, Default)]
pub struct RawCaptureEvent {
    pub code: i32,
    /// Full-frame raw pixels. Only meaningful on the success code.
    pub raw_data: Vec<u8>,
    pub segments: Vec<SegmentDescriptor>,
    /// Count reported by the vendor. May exceed `segments.len()`.
    pub segment_count: i32,
}

impl RawCaptureEvent {
    pub fn with_code(code: i32) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }
}

pub type OpenListener = Box<dyn FnOnce(Result<Arc<dyn DeviceSession>, DeviceError>) + Send>;
pub type CaptureCallback = Box<dyn FnMut(RawCaptureEvent) + Send>;

/// The SDK singleton: library lifecycle and device discovery.
pub trait DeviceLayer: Send + Sync {
    fn initialize(&self) -> Result<(), DeviceError>;

    fn sdk_version(&self) -> String;

    fn algorithm_version(&self) -> String;

    fn device_count(&self) -> Result<usize, DeviceError>;

    /// Begin opening device `index`. `Err` means the request itself was
    /// refused; otherwise `listener` is invoked exactly once, on any thread.
    fn open(&self, index: usize, listener: OpenListener) -> Result<(), DeviceError>;

    fn release(&self);
}

/// An opened peripheral connection.
pub trait DeviceSession: Send + Sync {
    fn image_info(&self) -> Result<ImageInfo, DeviceError>;

    /// Begin a multi-segment capture. `callback` may be invoked several
    /// times, on any thread, until the vendor reports a terminal code.
    fn multi_finger_capture(
        &self,
        params: CaptureParams,
        callback: CaptureCallback,
    ) -> Result<(), DeviceError>;

    /// Convert a raw full frame into encoded BMP bytes.
    fn raw_to_bmp(&self, raw: &[u8], info: ImageInfo) -> Result<Vec<u8>, DeviceError>;

    /// Score an encoded BMP image, 0–100.
    fn bmp_quality(&self, bmp: &[u8]) -> Result<u8, DeviceError>;

    fn close(&self) -> Result<(), DeviceError>;
}
