//! Per-connection session state machine.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────┐ claim accepted ┌───────┐
//! │ Anonymous │───────────────>│ Named │
//! └───────────┘                └───────┘
//!       │                          │
//!       │ disconnect               │ disconnect / idle timeout
//!       ↓                          ↓
//!  ┌────────────┐            ┌────────────┐
//!  │ Terminated │            │ Terminated │
//!  └────────────┘            └────────────┘
//! ```
//!
//! The session only tracks its own state. Name uniqueness lives in the
//! [`crate::IdentityRegistry`]; the driver checks the session first, then
//! claims in the registry, then calls [`Session::complete_claim`].

use parley_proto::MAX_NAME_LEN;

use crate::error::SessionError;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no name claimed yet
    Anonymous,
    /// Holds a registered identity
    Named,
    /// Disconnected (voluntarily or forced); terminal
    Terminated,
}

/// State for one connection.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: u64,
    state: SessionState,
    identity: Option<String>,
}

impl Session {
    /// Create a new anonymous session.
    pub fn new(session_id: u64) -> Self {
        Self { session_id, state: SessionState::Anonymous, identity: None }
    }

    /// Connection ID assigned by the relay.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Claimed identity. `None` unless Named.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Validate a claim attempt without changing state.
    ///
    /// # Errors
    ///
    /// - `SessionError::EmptyName` / `SessionError::NameTooLong` for malformed
    ///   names
    /// - `SessionError::AlreadyNamed` if this session already holds a name
    /// - `SessionError::InvalidState` if the session is terminated
    pub fn check_claim(&self, name: &str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Anonymous => {},
            SessionState::Named => {
                return Err(SessionError::AlreadyNamed(
                    self.identity.clone().unwrap_or_default(),
                ));
            },
            SessionState::Terminated => {
                return Err(SessionError::InvalidState { state: self.state, operation: "claim" });
            },
        }

        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        if name.len() > MAX_NAME_LEN {
            return Err(SessionError::NameTooLong { len: name.len(), max: MAX_NAME_LEN });
        }

        Ok(())
    }

    /// Transition Anonymous → Named after the registry accepted `name`.
    ///
    /// # Errors
    ///
    /// - Any error from [`Session::check_claim`]
    pub fn complete_claim(&mut self, name: &str) -> Result<(), SessionError> {
        self.check_claim(name)?;

        self.state = SessionState::Named;
        self.identity = Some(name.to_string());
        Ok(())
    }

    /// Identity messages from this session are attributed to. `None` unless
    /// Named, in which case messages are dropped.
    pub fn sender(&self) -> Option<&str> {
        match self.state {
            SessionState::Named => self.identity.as_deref(),
            SessionState::Anonymous | SessionState::Terminated => None,
        }
    }

    /// Transition to Terminated.
    ///
    /// Returns the identity that must be cleaned up, exactly once: the first
    /// call on a Named session yields `Some(name)`, every later call yields
    /// `None`.
    pub fn terminate(&mut self) -> Option<String> {
        let was_named = self.state == SessionState::Named;
        self.state = SessionState::Terminated;

        let identity = self.identity.take();
        if was_named { identity } else { None }
    }

    /// Whether the session has ended.
    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }
}
