use tracing::debug;

use crate::error::{event_code, event_code_message, CaptureError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InterpreterState {
    Idle,
    AwaitingEvent,
    Resolved,
}

/// What one vendor event means for the capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Still working; update the status line only.
    Progress,
    /// Terminal success with `segments` fingers to assemble.
    Success { segments: usize },
    /// Terminal failure.
    Failed(CaptureError),
    /// No effect: unknown code, empty success, or request already resolved.
    Ignored,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::Failed(_))
    }
}

/// Classifies the events of a single capture request. Honours exactly one
/// terminal transition; everything after it is ignored.
#[derive(Debug, Clone)]
pub struct CaptureEventInterpreter {
    state: InterpreterState,
    expected_fingers: u8,
}

impl CaptureEventInterpreter {
    pub fn new(expected_fingers: u8) -> Self {
        Self {
            state: InterpreterState::Idle,
            expected_fingers,
        }
    }

    pub fn state(&self) -> InterpreterState {
        self.state
    }

    /// The request has been issued; events are now expected.
    pub fn begin(&mut self) {
        if self.state == InterpreterState::Idle {
            self.state = InterpreterState::AwaitingEvent;
        }
    }

    pub fn interpret(&mut self, code: i32, segment_count: i32) -> Outcome {
        if self.state != InterpreterState::AwaitingEvent {
            debug!(code, state = ?self.state, "event outside awaiting state ignored");
            return Outcome::Ignored;
        }

        let outcome = match code {
            event_code::PROGRESS => Outcome::Progress,
            event_code::SUCCESS if segment_count > 0 => Outcome::Success {
                segments: segment_count as usize,
            },
            event_code::SUCCESS => Outcome::Ignored,
            event_code::LOW_QUALITY => Outcome::Failed(CaptureError::Quality),
            event_code::TIMEOUT => Outcome::Failed(CaptureError::Timeout),
            event_code::NO_FINGER => Outcome::Failed(CaptureError::NoFinger),
            event_code::WRONG_FINGER_COUNT => Outcome::Failed(CaptureError::CountMismatch {
                expected: self.expected_fingers,
            }),
            _ => Outcome::Ignored,
        };

        debug!(code, meaning = event_code_message(code), ?outcome, "capture event");
        if outcome.is_terminal() {
            self.state = InterpreterState::Resolved;
        }
        outcome
    }

    /// Resolve with `err` if still awaiting. Used when handling an event
    /// failed, or the request ran past its deadline.
    pub fn abort(&mut self, err: CaptureError) -> Outcome {
        if self.state != InterpreterState::AwaitingEvent {
            return Outcome::Ignored;
        }
        self.state = InterpreterState::Resolved;
        Outcome::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awaiting(expected: u8) -> CaptureEventInterpreter {
        let mut it = CaptureEventInterpreter::new(expected);
        it.begin();
        it
    }

    #[test]
    fn idle_interpreter_ignores_events() {
        let mut it = CaptureEventInterpreter::new(1);
        assert_eq!(it.interpret(event_code::SUCCESS, 1), Outcome::Ignored);
        assert_eq!(it.state(), InterpreterState::Idle);
    }

    #[test]
    fn progress_then_success() {
        let mut it = awaiting(1);
        assert_eq!(it.interpret(event_code::PROGRESS, 0), Outcome::Progress);
        assert_eq!(it.state(), InterpreterState::AwaitingEvent);
        assert_eq!(
            it.interpret(event_code::SUCCESS, 1),
            Outcome::Success { segments: 1 }
        );
        assert_eq!(it.state(), InterpreterState::Resolved);
    }

    #[test]
    fn empty_success_keeps_waiting() {
        let mut it = awaiting(2);
        assert_eq!(it.interpret(event_code::SUCCESS, 0), Outcome::Ignored);
        assert_eq!(it.state(), InterpreterState::AwaitingEvent);
        assert_eq!(
            it.interpret(event_code::SUCCESS, 2),
            Outcome::Success { segments: 2 }
        );
    }

    #[test]
    fn failure_codes_resolve() {
        let cases = [
            (event_code::LOW_QUALITY, CaptureError::Quality),
            (event_code::TIMEOUT, CaptureError::Timeout),
            (event_code::NO_FINGER, CaptureError::NoFinger),
            (
                event_code::WRONG_FINGER_COUNT,
                CaptureError::CountMismatch { expected: 4 },
            ),
        ];
        for (code, err) in cases {
            let mut it = awaiting(4);
            assert_eq!(it.interpret(code, 0), Outcome::Failed(err));
            assert_eq!(it.state(), InterpreterState::Resolved);
        }
    }

    #[test]
    fn wrong_count_message_has_expected_count() {
        let mut it = awaiting(2);
        match it.interpret(event_code::WRONG_FINGER_COUNT, 0) {
            Outcome::Failed(err) => assert!(err.to_string().contains('2')),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_first_terminal_event_counts() {
        let mut it = awaiting(1);
        assert!(it.interpret(event_code::TIMEOUT, 0).is_terminal());
        assert_eq!(it.interpret(event_code::SUCCESS, 1), Outcome::Ignored);
        assert_eq!(it.interpret(event_code::NO_FINGER, 0), Outcome::Ignored);
        assert_eq!(it.abort(CaptureError::Timeout), Outcome::Ignored);
    }

    #[test]
    fn unknown_codes_are_ignored() {
        let mut it = awaiting(1);
        assert_eq!(it.interpret(42, 0), Outcome::Ignored);
        assert_eq!(it.state(), InterpreterState::AwaitingEvent);
    }

    #[test]
    fn abort_resolves_once() {
        let mut it = awaiting(1);
        let err = CaptureError::Callback("boom".into());
        assert_eq!(it.abort(err.clone()), Outcome::Failed(err));
        assert_eq!(it.state(), InterpreterState::Resolved);
    }
}
