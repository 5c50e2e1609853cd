use std::time::Duration;

use thiserror::Error;

use crate::descriptor::DescriptorError;

/// Every failure an operation reports. None is fatal; each is recoverable by
/// hanging up and starting over.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),
    #[error("Failed to initialize connection: {0:#}")]
    ConnectionInitFailure(#[source] anyhow::Error),
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(#[from] DescriptorError),
    #[error("Failed to apply remote descriptor: {0:#}")]
    ApplyFailure(#[source] anyhow::Error),
    #[error("Connection timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            SessionError::Timeout(Duration::from_secs(600)).to_string(),
            "Connection timed out after 600s"
        );
        assert_eq!(
            SessionError::from(DescriptorError::Empty).to_string(),
            "Invalid descriptor: descriptor is empty"
        );
        let err = anyhow::anyhow!("boom").context("Failed to create offer");
        assert_eq!(
            SessionError::ConnectionInitFailure(err).to_string(),
            "Failed to initialize connection: Failed to create offer: boom"
        );
    }
}
