//! User record collaborator.
//!
//! The partner system owns its users; the lifecycle core only needs to read
//! one record at the start of a flow and write it back after every token or
//! connection change. Two implementations ship with the crate:
//!
//! - [`SqliteUserStore`] - SQLite file, tokens encrypted at rest with
//!   AES-256-GCM
//! - [`MemoryUserStore`] - `DashMap`, for tests and throwaway runs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod encryption;
mod memory;
mod sqlite;

pub use encryption::TokenCipher;
pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;

/// A partner-side user record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identifier issued by the partner's identity layer
    pub id: String,

    /// Shown as the connection title and tenancy name in the marketplace
    pub company_name: String,

    /// Organisation number
    pub company_id: String,

    pub email: String,

    /// Marketplace connection id, set once provisioning succeeded
    pub connection_id: Option<i64>,

    /// Marketplace access token for this user's account
    pub access_token: Option<String>,

    /// Single-use marketplace refresh token
    pub refresh_token: Option<String>,
}

/// Storage for user records.
///
/// Implementations must make `persist_user` an upsert of the whole record.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Loads a user, `Ok(None)` if no record exists.
    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<User>>;

    /// Writes the full record back.
    async fn persist_user(&self, user: &User) -> anyhow::Result<()>;
}
