use tracing::debug;

use crate::session::{ConnectionState, Role, Session};

/// Answers a received offer on its own, at most once per connection attempt.
#[derive(Debug, Default)]
pub struct AutoAnswer {
    answered: bool,
}

impl AutoAnswer {
    pub fn answered(&self) -> bool {
        self.answered
    }

    /// Returns `true` exactly when an answer should be created now.
    pub fn observe(&mut self, session: &Session, media_ready: bool) -> bool {
        // Back to the initial session: only a hangup gets here once a role
        // has been taken.
        if self.answered
            && session.connection_state == ConnectionState::Disconnected
            && session.role == Role::Unassigned
            && !session.has_remote()
        {
            debug!("auto-answer latch released");
            self.answered = false;
        }
        if self.answered
            || !session.has_remote()
            || session.has_local_token()
            || session.role != Role::Unassigned
            || !media_ready
        {
            return false;
        }
        self.answered = true;
        true
    }
}
