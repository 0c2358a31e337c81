// Session state machine

use super::SessionError;

/// Protocol phase of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Connection accepted, nothing exchanged yet
    Accepted,

    /// Handshake in progress
    Handshaking,

    /// Handshake done, waiting for connect
    Handshaken,

    /// Connect accepted
    Connected,

    /// At least one stream was created, published or played
    Streaming,

    /// Terminal state
    Closed,
}

impl SessionState {
    /// Checks if the state machine allows going from self to `next`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Accepted, Handshaking) => true,
            (Handshaking, Handshaken) => true,
            (Handshaken, Connected) => true,
            (Connected, Streaming) => true,
            (Streaming, Streaming) => true,
            _ => false,
        }
    }

    /// Moves to the next state, if allowed
    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: *self,
                to: next,
            });
        }

        *self = next;

        Ok(())
    }

    /// True once connect was accepted (and until the session closes)
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Streaming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = SessionState::Accepted;

        for next in [
            SessionState::Handshaking,
            SessionState::Handshaken,
            SessionState::Connected,
            SessionState::Streaming,
            SessionState::Streaming,
            SessionState::Closed,
        ] {
            state.transition(next).unwrap();
        }

        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = SessionState::Handshaken;

        assert!(state.transition(SessionState::Streaming).is_err());
        assert_eq!(state, SessionState::Handshaken);

        state.transition(SessionState::Closed).unwrap();

        // Closed is terminal
        assert!(state.transition(SessionState::Closed).is_err());
        assert!(state.transition(SessionState::Handshaking).is_err());
        assert!(!state.is_connected());
    }
}
