//! SQLite-backed user records.
//!
//! Marketplace tokens are sealed with AES-256-GCM before they reach disk.

use super::{TokenCipher, User, UserStore};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// User store backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE users (
///     id TEXT PRIMARY KEY,
///     company_name TEXT NOT NULL,
///     company_id TEXT NOT NULL,
///     email TEXT NOT NULL,
///     connection_id INTEGER,             -- Marketplace connection (optional)
///     access_token TEXT,                 -- Encrypted (optional)
///     access_token_nonce TEXT,
///     refresh_token TEXT,                -- Encrypted (optional)
///     refresh_token_nonce TEXT,
///     created_at TEXT NOT NULL,          -- RFC 3339
///     updated_at TEXT NOT NULL           -- RFC 3339
/// );
/// ```
///
/// The connection is held behind a `Mutex`; every call is short and never
/// awaits while holding it.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

impl SqliteUserStore {
    /// Creates or opens a user store.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite file (`":memory:"` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = TokenCipher::from_base64_key(encryption_key)
            .context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                company_name TEXT NOT NULL,
                company_id TEXT NOT NULL,
                email TEXT NOT NULL,
                connection_id INTEGER,
                access_token TEXT,
                access_token_nonce TEXT,
                refresh_token TEXT,
                refresh_token_nonce TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create users table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("User store connection lock poisoned"))
    }

    /// Inserts or replaces a user record.
    pub fn store(&self, user: &User) -> Result<()> {
        let (access_token, access_token_nonce) = self
            .cipher
            .seal_optional(user.access_token.as_deref())
            .context("Failed to encrypt access token")?;
        let (refresh_token, refresh_token_nonce) = self
            .cipher
            .seal_optional(user.refresh_token.as_deref())
            .context("Failed to encrypt refresh token")?;

        let now = Utc::now().to_rfc3339();

        self.lock()?
            .execute(
                r#"
                INSERT INTO users (
                    id, company_name, company_id, email, connection_id,
                    access_token, access_token_nonce,
                    refresh_token, refresh_token_nonce,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(id) DO UPDATE SET
                    company_name = excluded.company_name,
                    company_id = excluded.company_id,
                    email = excluded.email,
                    connection_id = excluded.connection_id,
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    refresh_token = excluded.refresh_token,
                    refresh_token_nonce = excluded.refresh_token_nonce,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user.id,
                    user.company_name,
                    user.company_id,
                    user.email,
                    user.connection_id,
                    access_token,
                    access_token_nonce,
                    refresh_token,
                    refresh_token_nonce,
                    now,
                    now,
                ],
            )
            .context("Failed to store user")?;

        Ok(())
    }

    /// Loads and decrypts a user record.
    pub fn load(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                r#"
                SELECT id, company_name, company_id, email, connection_id,
                       access_token, access_token_nonce,
                       refresh_token, refresh_token_nonce
                FROM users
                WHERE id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            company_name: row.get(1)?,
                            company_id: row.get(2)?,
                            email: row.get(3)?,
                            connection_id: row.get(4)?,
                            access_token: None,
                            refresh_token: None,
                        },
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query user")?;

        let Some((mut user, access, access_nonce, refresh, refresh_nonce)) = row else {
            return Ok(None);
        };

        user.access_token = self
            .cipher
            .open_optional(access, access_nonce)
            .context("Failed to decrypt access token")?;
        user.refresh_token = self
            .cipher
            .open_optional(refresh, refresh_nonce)
            .context("Failed to decrypt refresh token")?;

        Ok(Some(user))
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.load(user_id)
    }

    async fn persist_user(&self, user: &User) -> Result<()> {
        self.store(user)
    }
}
