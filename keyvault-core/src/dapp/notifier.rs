//! Accounts-changed notifications
//!
//! Removing connections tends to come in bursts. Scheduled notifications
//! within one delay window collapse into a single event.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_NOTIFY_DELAY: Duration = Duration::from_millis(1500);

/// Emitted when the set of accounts visible to sites may have changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsChanged {
    pub sequence: u64,
}

#[derive(Debug)]
struct Inner {
    sender: broadcast::Sender<AccountsChanged>,
    pending: AtomicBool,
    sequence: AtomicU64,
}

impl Inner {
    fn emit(&self) {
        let event = AccountsChanged {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };
        // No receivers is fine
        let _ = self.sender.send(event);
        debug!(sequence = event.sequence, "accounts changed");
    }
}

#[derive(Debug, Clone)]
pub struct AccountsChangedNotifier {
    inner: Arc<Inner>,
    delay: Duration,
}

impl Default for AccountsChangedNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_DELAY)
    }
}

impl AccountsChangedNotifier {
    pub fn new(delay: Duration) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                sender,
                pending: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
            }),
            delay,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AccountsChanged> {
        self.inner.sender.subscribe()
    }

    /// Emit right away
    pub fn notify_now(&self) {
        self.inner.emit();
    }

    /// Emit once after the delay, unless an emission is already scheduled
    pub fn schedule(&self) {
        if self.inner.pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.pending.store(false, Ordering::SeqCst);
            inner.emit();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scheduled_notifications_coalesce() {
        let notifier = AccountsChangedNotifier::new(Duration::from_millis(20));
        let mut events = notifier.subscribe();

        notifier.schedule();
        notifier.schedule();
        notifier.schedule();

        let first = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert_eq!(first.sequence, 1);
        let second = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_notify_now() {
        let notifier = AccountsChangedNotifier::default();
        let mut events = notifier.subscribe();
        notifier.notify_now();
        assert_eq!(events.recv().await.unwrap().sequence, 1);
    }
}
