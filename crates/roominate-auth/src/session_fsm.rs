//! Session lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  SessionRestored / CallbackReceived
//! │    SignedOut    │ ──────────────────────────────────────┐
//! └────────┬────────┘                                       │
//!          │ SignInAttempt                                  │
//!          ▼                                                ▼
//! ┌─────────────────┐  SignInSuccess              ┌─────────────────┐
//! │    SigningIn    │ ──────────────────────────► │    SignedIn     │
//! └────────┬────────┘                             └────────┬────────┘
//!          │ SignInFailed                                  │ SignOutRequested
//!          ▼                                               ▼
//!      SignedOut  ◄──── SessionExpired ────────    ┌─────────────────┐
//!          ▲                                       │   SigningOut    │
//!          └────────── SignOutComplete ─────────── └─────────────────┘
//! ```
//!
//! There is no refreshing state: an expired session is cleared and the user
//! signs in again.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(SignedOut)

    SignedOut => {
        SignInAttempt => SigningIn,
        SessionRestored => SignedIn,
        CallbackReceived => SignedIn
    },
    SigningIn => {
        SignInSuccess => SignedIn,
        SignInFailed => SignedOut
    },
    SignedIn => {
        // Signing in as someone else replaces the session
        SignInAttempt => SigningIn,
        CallbackReceived => SignedIn,
        SessionExpired => SignedOut,
        SignOutRequested => SigningOut
    },
    SigningOut => {
        SignOutComplete => SignedOut
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Simplified session state for display and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    SignedOut,
    SigningIn,
    SignedIn,
    SigningOut,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::SignedIn)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::SignedOut => SessionState::SignedOut,
            SessionMachineState::SigningIn => SessionState::SigningIn,
            SessionMachineState::SignedIn => SessionState::SignedIn,
            SessionMachineState::SigningOut => SessionState::SigningOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_signed_out() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_sign_in_and_out() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::SignInAttempt).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SigningIn);

        machine.consume(&SessionMachineInput::SignInSuccess).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedIn);

        machine.consume(&SessionMachineInput::SignOutRequested).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SigningOut);

        machine.consume(&SessionMachineInput::SignOutComplete).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_failed_sign_in_returns_to_signed_out() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SignInAttempt).unwrap();
        machine.consume(&SessionMachineInput::SignInFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_restored_session_can_expire() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedIn);

        machine.consume(&SessionMachineInput::SessionExpired).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionMachineInput::SignInSuccess).is_err());
        assert!(machine.consume(&SessionMachineInput::SignOutRequested).is_err());
        assert!(machine.consume(&SessionMachineInput::SessionExpired).is_err());
        assert_eq!(*machine.state(), SessionMachineState::SignedOut);
    }

    #[test]
    fn test_session_state_mapping() {
        assert!(SessionState::from(&SessionMachineState::SignedIn).is_authenticated());
        assert!(!SessionState::from(&SessionMachineState::SigningOut).is_authenticated());
        assert_eq!(
            serde_json::to_string(&SessionState::SignedOut).unwrap(),
            "\"signed_out\""
        );
    }
}
