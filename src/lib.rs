//! Multi-finger fingerprint capture session.
//!
//! Drives a slap scanner through a vendor device layer modelled as the
//! [`device::DeviceLayer`] / [`device::DeviceSession`] traits, and exposes an
//! explicit session state machine ([`session::SessionController`]) that
//! serialises open, capture and close.

pub mod config;
pub mod device;
pub mod error;
pub mod finger;
pub mod logging;
pub mod mode;
pub mod platform;
pub mod session;

pub use error::{CaptureError, DeviceError, RequestError};
pub use finger::FingerPosition;
pub use mode::CaptureMode;
