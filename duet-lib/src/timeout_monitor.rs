use std::{future::pending, time::Duration};

use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::session::ConnectionState;

/// Bounds how long a session may stay `connecting`.
#[derive(Debug)]
pub struct TimeoutMonitor {
    duration: Duration,
    last_state: ConnectionState,
    deadline: Option<Instant>,
}

impl TimeoutMonitor {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_state: ConnectionState::default(),
            deadline: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Arms on a transition into `connecting`, disarms on any other
    /// transition. Repeating the current state changes nothing.
    pub fn observe(&mut self, state: ConnectionState) {
        if state == self.last_state {
            return;
        }
        self.last_state = state;
        self.deadline = if state == ConnectionState::Connecting {
            debug!("connection timeout armed for {:?}", self.duration);
            Some(Instant::now() + self.duration)
        } else {
            None
        };
    }

    /// Completes once the deadline passes; never completes while disarmed.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    }
}
