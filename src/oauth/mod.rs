//! OAuth 2.0 token lifecycle against the marketplace.
//!
//! ```text
//!   NoCredential ──otc──► OneTimeCodeOnly ──client.authenticated──► Authenticated
//!        ▲                                                              │
//!        │                                                         401 observed
//!        │                                                              ▼
//!        └──────── refresh refused / no refresh token ◄──── Refreshing ─┘
//!                                                              │
//!                                                              └──► Authenticated
//! ```
//!
//! Refresh tokens are single-use. Whoever receives a new pair must persist
//! it before doing anything else.

mod exchange;

pub use exchange::{TokenPair, TokenRefresher};
