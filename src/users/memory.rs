//! In-memory user records.

use super::{User, UserStore};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// User store held in a `DashMap`. Records vanish with the process.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, User>,
    writes: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record without counting it as a write.
    pub fn insert(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Snapshot of a record.
    pub fn get(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|entry| entry.value().clone())
    }

    /// Number of `persist_user` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.get(user_id))
    }

    async fn persist_user(&self, user: &User) -> Result<()> {
        self.users.insert(user.id.clone(), user.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
