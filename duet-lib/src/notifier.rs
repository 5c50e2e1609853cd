use tracing::info;

/// Receives every user-facing message: generated descriptors, failures,
/// timeouts.
pub trait Notifier: Send + Sync {
    fn report(&self, message: &str);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report(&self, message: &str) {
        info!("{}", message);
    }
}
