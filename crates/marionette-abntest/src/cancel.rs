//! Cooperative cancellation of experiment runs

use tokio::sync::watch;

/// Cloneable cancellation token
///
/// The executor checks it before applying each configuration and races it
/// against the stabilization sleep.
#[derive(Debug, Clone)]
pub struct ExperimentCancellation {
    sender: std::sync::Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for ExperimentCancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentCancellation {
    /// Create new token that is not cancelled
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: std::sync::Arc::new(sender),
            receiver,
        }
    }

    /// Cancel every clone of this token
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Check if cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any clone, so `wait_for` cannot fail here.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
