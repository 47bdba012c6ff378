//! Partner-side flows around the embedded marketplace.
//!
//! Each public method is one logical operation for one user: load the
//! record, do the remote calls in order, persist what changed. With
//! `flows.serialize_per_user` set, the whole operation runs under that
//! user's [`FlowLocks`] entry.

mod locks;


pub use locks::FlowLocks;

use crate::client::ApiClient;
use crate::config::{PartnerConfig, ZwapgridConfig};
use crate::embed::{self, IframeUrl, MarketplaceMessage};
use crate::error::{Error, Result};
use crate::oauth::TokenPair;
use crate::provision::ConnectionProvisioner;
use crate::session::TokenStore;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

/// Everything the host page needs to render the iframe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedPage {
    pub iframe_url: String,
    pub connection_id: i64,
}

/// Result of a dispatched browser message.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageOutcome {
    IntegrationCreated { systems: [String; 2] },
    /// Tokens to hand back to the iframe.
    AccessToken(TokenPair),
}

pub struct EmbedFlow {
    client: Arc<ApiClient>,
    provisioner: ConnectionProvisioner,
    config: ZwapgridConfig,
    locks: Option<FlowLocks>,
}

impl EmbedFlow {
    pub fn new(client: Arc<ApiClient>, config: &PartnerConfig) -> Self {
        Self {
            provisioner: ConnectionProvisioner::new(client.clone(), config.connection.clone()),
            client,
            config: config.zwapgrid.clone(),
            locks: config.flows.serialize_per_user.then(FlowLocks::new),
        }
    }

    async fn lock(&self, user_id: &str) -> Option<OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.lock(user_id).await),
            None => None,
        }
    }

    async fn load(&self, user_id: &str) -> Result<TokenStore> {
        let user = self
            .client
            .users()
            .get_user(user_id)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;
        Ok(TokenStore::new(user))
    }

    /// Builds the iframe URL: one-time code, connection, public key, signed
    /// id, URL. Any failure aborts before a URL exists.
    pub async fn prepare(&self, user_id: &str) -> Result<EmbedPage> {
        let _guard = self.lock(user_id).await;
        let mut tokens = self.load(user_id).await?;

        let otc = self.client.refresher().fetch_one_time_code().await?;
        tokens.set_one_time_code(otc.as_str());

        let connection_id = self.provisioner.ensure_connection(&mut tokens).await?;
        let signed_id = self
            .provisioner
            .compute_signed_connection_id(&mut tokens, connection_id, &otc)
            .await?;

        let iframe_url = IframeUrl::new(&self.config, tokens.user(), &otc, &signed_id);
        info!(user_id, connection_id, "Marketplace embed prepared");

        Ok(EmbedPage {
            iframe_url: iframe_url.to_string(),
            connection_id,
        })
    }

    /// Exchanges the code from `client.authenticated` and stores the tokens.
    pub async fn client_authenticated(&self, user_id: &str, code: &str) -> Result<TokenPair> {
        let _guard = self.lock(user_id).await;
        self.exchange_code(user_id, code).await
    }

    /// Spends the stored refresh token for a new pair.
    ///
    /// On a refused refresh the stored tokens are left as they were. With no
    /// refresh token stored, the access token is cleared and `AuthRefresh`
    /// returned.
    pub async fn refresh_access_token(&self, user_id: &str) -> Result<TokenPair> {
        let _guard = self.lock(user_id).await;
        self.refresh(user_id).await
    }

    /// Validates and dispatches a message posted by the iframe.
    ///
    /// `Ok(None)` when the message was discarded.
    pub async fn handle_message(
        &self,
        user_id: &str,
        origin: &str,
        raw: &str,
    ) -> Result<Option<MessageOutcome>> {
        let Some(message) = embed::accept(origin, &self.config.app_url, raw) else {
            return Ok(None);
        };

        let _guard = self.lock(user_id).await;
        let outcome = match message {
            MarketplaceMessage::IntegrationCreated { systems } => {
                info!(
                    user_id,
                    source = %systems[0],
                    target = %systems[1],
                    "Marketplace integration created"
                );
                MessageOutcome::IntegrationCreated { systems }
            }
            MarketplaceMessage::ClientAuthenticated { authorization_code } => {
                MessageOutcome::AccessToken(self.exchange_code(user_id, &authorization_code).await?)
            }
            MarketplaceMessage::AccessTokenMissing => {
                MessageOutcome::AccessToken(self.refresh(user_id).await?)
            }
        };
        Ok(Some(outcome))
    }

    async fn exchange_code(&self, user_id: &str, code: &str) -> Result<TokenPair> {
        let mut tokens = self.load(user_id).await?;
        let pair = self
            .client
            .refresher()
            .exchange_authorization_code(code)
            .await?;

        tokens.set_tokens(&pair);
        tokens.persist(self.client.users().as_ref()).await?;
        info!(user_id, "Marketplace account authorized");
        Ok(pair)
    }

    async fn refresh(&self, user_id: &str) -> Result<TokenPair> {
        let mut tokens = self.load(user_id).await?;

        let Some(refresh_token) = tokens.refresh_token().map(str::to_string) else {
            warn!(user_id, "No refresh token stored");
            if tokens.access_token().is_some() {
                tokens.clear_access_token();
                tokens.persist(self.client.users().as_ref()).await?;
            }
            return Err(Error::AuthRefresh("no refresh token stored".to_string()));
        };

        let pair = self.client.refresher().refresh_tokens(&refresh_token).await?;
        tokens.set_tokens(&pair);
        tokens.persist(self.client.users().as_ref()).await?;
        Ok(pair)
    }
}
