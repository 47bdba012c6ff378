use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per user id.
///
/// Holding the guard for a whole flow keeps two flows for the same user from
/// spending the same single-use refresh token. Entries are never evicted;
/// each is an `Arc<Mutex<()>>` keyed by user id.
#[derive(Default)]
pub struct FlowLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FlowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the user's lock.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(user_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Number of users that have taken a lock so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn same_user_waits() {
        let locks = FlowLocks::new();
        let held = locks.lock("u1").await;

        let blocked = timeout(Duration::from_millis(50), locks.lock("u1")).await;
        assert!(blocked.is_err());

        drop(held);
        let acquired = timeout(Duration::from_millis(500), locks.lock("u1")).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn different_users_do_not_contend() {
        let locks = FlowLocks::new();
        let _first = locks.lock("u1").await;

        let second = timeout(Duration::from_millis(500), locks.lock("u2")).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
