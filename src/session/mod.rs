//! Capture session state machine: event interpretation, result assembly and
//! the controller that owns the device handle.

pub mod assembler;
pub mod controller;
pub mod interpreter;
pub mod state;

pub use controller::{SdkInfo, SessionController, SessionMessage, SessionSettings};
pub use interpreter::{CaptureEventInterpreter, InterpreterState, Outcome};
pub use state::{Activity, FingerprintResult, QualityBand, SessionState, SessionStatus, Severity};
