//! Authenticated marketplace client.
//!
//! Every call goes through [`ApiClient::send`]:
//!
//! 1. attach the credential the [`TokenStore`] yields for the policy
//! 2. send; anything but 401 is returned untouched
//! 3. on 401, refresh (or clear) the user's tokens and persist them
//! 4. rebuild the request and send it exactly once more, returning that
//!    response whatever it is
//!
//! There is no loop and no backoff. A second 401 is the caller's problem.

pub mod envelope;


use crate::config::ZwapgridConfig;
use crate::error::{Error, Result};
use crate::oauth::TokenRefresher;
use crate::session::{AuthPolicy, Credential, TokenStore};
use crate::users::UserStore;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("zwapgrid-partner/", env!("CARGO_PKG_VERSION"));

/// A request that can be rebuilt for the retry.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post_json<T: Serialize + ?Sized>(path: impl Into<String>, body: &T) -> Result<Self> {
        let body = serde_json::to_vec(body)
            .map_err(|e| Error::Protocol(format!("failed to encode request body: {}", e)))?;
        Ok(Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// HTTP client for the marketplace API with the single-retry policy.
pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    refresher: TokenRefresher,
    users: Arc<dyn UserStore>,
}

impl ApiClient {
    pub fn new(config: &ZwapgridConfig, users: Arc<dyn UserStore>) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            refresher: TokenRefresher::new(http.clone(), config),
            api_base: config.api_base(),
            http,
            users,
        })
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// One send with a fixed credential. No retry, no token handling.
    pub async fn attempt(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_base, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }
        if let Some(value) = credential.header_value() {
            builder = builder.header(AUTHORIZATION, value);
        }

        let response = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = %response.status(),
            "Marketplace call"
        );
        Ok(response)
    }

    /// Sends a request, refreshing credentials and retrying once on 401.
    ///
    /// # Errors
    /// * `Transport` - Either send failed to reach the API
    /// * `Storage` - The refreshed or cleared tokens could not be persisted
    pub async fn send(
        &self,
        tokens: &mut TokenStore,
        policy: AuthPolicy,
        request: &ApiRequest,
    ) -> Result<reqwest::Response> {
        let response = self.attempt(request, &tokens.credential(policy)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(
            user_id = %tokens.user().id,
            path = %request.path,
            "Marketplace rejected credentials, refreshing before retry"
        );
        self.recover_credentials(tokens).await?;

        self.attempt(request, &tokens.credential(policy)).await
    }

    /// Brings the token store out of the Expired state.
    ///
    /// With a refresh token, exchanges it and persists the new pair. If the
    /// token endpoint refuses, both tokens are dropped. Without one, only the
    /// access token is dropped. Either way the store is flushed so a
    /// consumed refresh token is never reused.
    async fn recover_credentials(&self, tokens: &mut TokenStore) -> Result<()> {
        let Some(refresh_token) = tokens.refresh_token().map(str::to_string) else {
            debug!(user_id = %tokens.user().id, "No refresh token, clearing access token");
            if tokens.access_token().is_some() {
                tokens.clear_access_token();
                tokens.persist(self.users.as_ref()).await?;
            }
            return Ok(());
        };

        match self.refresher.refresh_tokens(&refresh_token).await {
            Ok(pair) => {
                tokens.set_tokens(&pair);
                info!(user_id = %tokens.user().id, "Marketplace tokens refreshed");
            }
            Err(Error::AuthRefresh(reason)) => {
                warn!(
                    user_id = %tokens.user().id,
                    reason = %reason,
                    "Token refresh refused, dropping stored tokens"
                );
                tokens.clear_tokens();
            }
            Err(e) => return Err(e),
        }

        tokens.persist(self.users.as_ref()).await
    }

    /// GET an endpoint and unwrap its envelope.
    pub async fn get<T: DeserializeOwned>(
        &self,
        tokens: &mut TokenStore,
        policy: AuthPolicy,
        path: &str,
    ) -> Result<T> {
        let response = self.send(tokens, policy, &ApiRequest::get(path)).await?;
        envelope::decode(response).await
    }

    /// POST a JSON body and unwrap the envelope of the answer.
    pub async fn post<I: Serialize + ?Sized, O: DeserializeOwned>(
        &self,
        tokens: &mut TokenStore,
        policy: AuthPolicy,
        path: &str,
        input: &I,
    ) -> Result<O> {
        let request = ApiRequest::post_json(path, input)?;
        let response = self.send(tokens, policy, &request).await?;
        envelope::decode(response).await
    }
}
