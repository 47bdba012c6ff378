//! Per-flow credential context.
//!
//! A [`TokenStore`] wraps one user record plus the one-time code fetched for
//! the current logical operation. It is created at the start of a flow and
//! passed by `&mut` into every client and provisioner call, so the only
//! state a request sees is the state it was handed.

use crate::error::{Error, Result};
use crate::oauth::TokenPair;
use crate::users::{User, UserStore};
use tracing::debug;

/// Credential attached to one outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    OneTimeCode(String),
    None,
}

impl Credential {
    /// Value for the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Credential::Bearer(token) => Some(format!("Bearer {}", token)),
            Credential::OneTimeCode(code) => Some(format!("OneTimeCode {}", code)),
            Credential::None => None,
        }
    }
}

/// Which credentials a request may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Access token if present and non-empty, else the one-time code.
    Default,
    /// Always the one-time code. Partner-tenant lookups need this: the code
    /// is issued to the OAuth client's own tenant, the access token to the
    /// user's.
    OneTimeCodeOnly,
    /// No `Authorization` header.
    Anonymous,
}

/// Steady states of a credential context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialState {
    NoCredential,
    OneTimeCodeOnly,
    Authenticated,
}

/// In-memory view of one user's marketplace credentials.
#[derive(Clone, Debug)]
pub struct TokenStore {
    user: User,
    one_time_code: Option<String>,
}

impl TokenStore {
    pub fn new(user: User) -> Self {
        Self {
            user,
            one_time_code: None,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn into_user(self) -> User {
        self.user
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(self.user.access_token.as_deref())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        non_empty(self.user.refresh_token.as_deref())
    }

    pub fn one_time_code(&self) -> Option<&str> {
        non_empty(self.one_time_code.as_deref())
    }

    /// The one-time code is never written to the user record.
    pub fn set_one_time_code(&mut self, code: impl Into<String>) {
        self.one_time_code = Some(code.into());
    }

    pub fn set_tokens(&mut self, tokens: &TokenPair) {
        self.user.access_token = tokens.access_token.clone();
        self.user.refresh_token = tokens.refresh_token.clone();
    }

    pub fn clear_access_token(&mut self) {
        self.user.access_token = None;
    }

    /// Drops both tokens, after the refresh endpoint refused the refresh
    /// token.
    pub fn clear_tokens(&mut self) {
        self.user.access_token = None;
        self.user.refresh_token = None;
    }

    pub fn set_connection_id(&mut self, connection_id: i64) {
        self.user.connection_id = Some(connection_id);
    }

    /// Credential to attach under `policy`.
    pub fn credential(&self, policy: AuthPolicy) -> Credential {
        let otc = || {
            self.one_time_code()
                .map(|code| Credential::OneTimeCode(code.to_string()))
                .unwrap_or(Credential::None)
        };

        match policy {
            AuthPolicy::Anonymous => Credential::None,
            AuthPolicy::OneTimeCodeOnly => otc(),
            AuthPolicy::Default => match self.access_token() {
                Some(token) => Credential::Bearer(token.to_string()),
                None => otc(),
            },
        }
    }

    pub fn state(&self) -> CredentialState {
        if self.access_token().is_some() {
            CredentialState::Authenticated
        } else if self.one_time_code().is_some() {
            CredentialState::OneTimeCodeOnly
        } else {
            CredentialState::NoCredential
        }
    }

    /// Flushes the record to the user store.
    pub async fn persist(&self, users: &dyn UserStore) -> Result<()> {
        debug!(user_id = %self.user.id, "Persisting user record");
        users.persist_user(&self.user).await.map_err(Error::Storage)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(access: Option<&str>, otc: Option<&str>) -> TokenStore {
        let mut store = TokenStore::new(User {
            id: "u1".to_string(),
            access_token: access.map(str::to_string),
            refresh_token: Some("r1".to_string()),
            ..Default::default()
        });
        if let Some(code) = otc {
            store.set_one_time_code(code);
        }
        store
    }

    #[test]
    fn access_token_takes_priority() {
        let store = store(Some("at"), Some("otc"));
        assert_eq!(
            store.credential(AuthPolicy::Default),
            Credential::Bearer("at".to_string())
        );
        assert_eq!(store.state(), CredentialState::Authenticated);
    }

    #[test]
    fn empty_access_token_falls_back_to_one_time_code() {
        let store = store(Some(""), Some("otc"));
        assert_eq!(
            store.credential(AuthPolicy::Default),
            Credential::OneTimeCode("otc".to_string())
        );
        assert_eq!(store.state(), CredentialState::OneTimeCodeOnly);
    }

    #[test]
    fn no_credential_without_tokens() {
        let store = store(None, None);
        assert_eq!(store.credential(AuthPolicy::Default), Credential::None);
        assert_eq!(store.state(), CredentialState::NoCredential);
    }

    #[test]
    fn one_time_code_only_ignores_access_token() {
        let store = store(Some("at"), Some("otc"));
        assert_eq!(
            store.credential(AuthPolicy::OneTimeCodeOnly),
            Credential::OneTimeCode("otc".to_string())
        );
        assert_eq!(store.credential(AuthPolicy::Anonymous), Credential::None);
    }

    #[test]
    fn header_values() {
        assert_eq!(
            Credential::Bearer("x".to_string()).header_value().as_deref(),
            Some("Bearer x")
        );
        assert_eq!(
            Credential::OneTimeCode("y".to_string()).header_value().as_deref(),
            Some("OneTimeCode y")
        );
        assert_eq!(Credential::None.header_value(), None);
    }

    #[test]
    fn clearing_tokens() {
        let mut store = store(Some("at"), None);
        store.clear_access_token();
        assert!(store.access_token().is_none());
        assert_eq!(store.refresh_token(), Some("r1"));

        store.clear_tokens();
        assert!(store.refresh_token().is_none());
    }
}
