//! Connection provisioning.
//!
//! A user's marketplace connection is created once, validated, and its id
//! stored on the user record. Later flows reuse the stored id and make no
//! remote calls here. The id is then bound to the flow's one-time code with
//! the marketplace's RSA public key.

mod connection;


pub use connection::{Connection, ConnectionCredential, CredentialSource, ValidationResult};

use crate::client::envelope::ApiError;
use crate::client::{ApiClient, ApiRequest};
use crate::crypto::{import_public_key, sign_connection_id};
use crate::error::{Error, Result};
use crate::session::{AuthPolicy, TokenStore};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CONNECTIONS_PATH: &str = "/connections";
const VALIDATE_PATH: &str = "/connections/validate";
const PUBLIC_KEY_PATH: &str = "/me/public-key";

/// Reported when the marketplace created a connection without an id.
const MISSING_ID_MESSAGE: &str = "Something went wrong";

/// `/connections/validate` answers either inside the usual envelope or with a
/// bare `{success, message}` object.
#[derive(Deserialize)]
struct ValidationReply {
    #[serde(default, alias = "Result")]
    result: Option<ValidationResult>,
    #[serde(default, alias = "Success")]
    success: Option<bool>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
    #[serde(default, alias = "Error")]
    error: Option<ApiError>,
}

impl ValidationReply {
    fn into_outcome(self, status: StatusCode) -> Result<ValidationResult> {
        if let Some(error) = self.error {
            return Err(Error::Provisioning(error.message()));
        }
        let mut outcome = match self.result {
            Some(result) => result,
            None => ValidationResult {
                success: self.success.unwrap_or(false),
                message: self.message.clone(),
                value: None,
            },
        };
        // An envelope-level `success: false` overrides the result
        if self.success == Some(false) {
            outcome.success = false;
            outcome.message = outcome.message.or(self.message);
        }

        if !outcome.success {
            return Err(Error::Provisioning(
                outcome
                    .message
                    .unwrap_or_else(|| "Connection validation failed".to_string()),
            ));
        }
        if !status.is_success() {
            return Err(Error::Provisioning(format!(
                "connection validation returned HTTP {}",
                status
            )));
        }
        Ok(outcome)
    }
}

/// Creates and validates marketplace connections.
pub struct ConnectionProvisioner<C: CredentialSource = ConnectionCredential> {
    client: Arc<ApiClient>,
    credentials: C,
}

impl<C: CredentialSource> ConnectionProvisioner<C> {
    pub fn new(client: Arc<ApiClient>, credentials: C) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Returns the user's connection id, provisioning one if needed.
    ///
    /// # Errors
    /// * `Provisioning` - Creation returned no id, or validation failed
    /// * `Format` - The validated id is not numeric
    /// * `Storage` - The id could not be persisted
    pub async fn ensure_connection(&self, tokens: &mut TokenStore) -> Result<i64> {
        if let Some(connection_id) = tokens.user().connection_id {
            debug!(user_id = %tokens.user().id, connection_id, "Connection already provisioned");
            return Ok(connection_id);
        }

        let user = tokens.user();
        let company_id = Some(user.company_id.clone()).filter(|id| !id.is_empty());
        let draft = Connection::new(
            user.company_name.clone(),
            company_id,
            &self.credentials.credential_for(user),
        )?;

        info!(user_id = %tokens.user().id, "Creating marketplace connection");
        let created: Connection = self
            .client
            .post(tokens, AuthPolicy::Default, CONNECTIONS_PATH, &draft)
            .await
            .map_err(into_provisioning)?;

        let Some(raw_id) = created.external_id().map(str::to_string) else {
            warn!(user_id = %tokens.user().id, "Marketplace created a connection without an id");
            return Err(Error::Provisioning(MISSING_ID_MESSAGE.to_string()));
        };

        self.validate(tokens, &created).await?;

        let connection_id = parse_connection_id(&raw_id)?;
        tokens.set_connection_id(connection_id);
        tokens.persist(self.client.users().as_ref()).await?;

        info!(user_id = %tokens.user().id, connection_id, "Marketplace connection provisioned");
        Ok(connection_id)
    }

    async fn validate(&self, tokens: &mut TokenStore, created: &Connection) -> Result<()> {
        let request = ApiRequest::post_json(VALIDATE_PATH, created)?;
        let response = self.client.send(tokens, AuthPolicy::Default, &request).await?;

        let status = response.status();
        let body = response.text().await?;
        let reply: ValidationReply = serde_json::from_str(&body).map_err(|e| {
            Error::Protocol(format!("unexpected validation body (HTTP {}): {}", status, e))
        })?;

        match reply.into_outcome(status) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(user_id = %tokens.user().id, error = %e, "Connection validation failed");
                Err(e)
            }
        }
    }

    /// Fetches the marketplace's RSA public key as PEM text.
    ///
    /// The key belongs to the partner's own tenant, so the request always
    /// carries the one-time code.
    pub async fn fetch_public_key(&self, tokens: &mut TokenStore) -> Result<String> {
        self.client
            .get(tokens, AuthPolicy::OneTimeCodeOnly, PUBLIC_KEY_PATH)
            .await
    }

    /// Binds `connection_id` to `correlation_token` under the marketplace's
    /// public key.
    pub async fn compute_signed_connection_id(
        &self,
        tokens: &mut TokenStore,
        connection_id: i64,
        correlation_token: &str,
    ) -> Result<String> {
        let pem = self.fetch_public_key(tokens).await?;
        let key = import_public_key(&pem)?;
        sign_connection_id(connection_id, correlation_token, &key)
    }
}

fn into_provisioning(error: Error) -> Error {
    match error {
        Error::Remote(message) => Error::Provisioning(message),
        other => other,
    }
}

fn parse_connection_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Format(raw.to_string()))
}
