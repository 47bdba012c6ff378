//! Token endpoint exchanges.
//!
//! Handles refresh-token and authorization-code grants plus one-time-code
//! issuance. All three authenticate with the partner's client credentials in
//! the body and never carry an `Authorization` header, so a 401 here cannot
//! trigger another refresh.

use crate::client::envelope;
use crate::config::ZwapgridConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const GRANT_REFRESH_TOKEN: &str = "refresh_token";
const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// Token endpoint request. Field names follow the marketplace's PascalCase
/// contract.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    grant_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OneTimeCodeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

/// Token endpoint result: `{ "response": { .. } }`
#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(default, alias = "Response")]
    response: Option<TokenPair>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OneTimeCodeResponse {
    #[serde(default, alias = "OneTimeCode")]
    one_time_code: Option<String>,
}

/// Access/refresh token pair returned by the token endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(default, alias = "AccessToken")]
    pub access_token: Option<String>,

    /// Single-use: persist it immediately, a second use yields 401.
    #[serde(default, alias = "RefreshToken")]
    pub refresh_token: Option<String>,

    /// Opaque form of the access token the iframe accepts as-is.
    #[serde(default, alias = "EncryptedAccessToken")]
    pub encrypted_access_token: Option<String>,
}

/// Client for `/oauth2/token` and `/oauth2/one-time-code`.
#[derive(Clone)]
pub struct TokenRefresher {
    http: reqwest::Client,
    token_url: String,
    one_time_code_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, config: &ZwapgridConfig) -> Self {
        let base = config.api_base();
        Self {
            http,
            token_url: format!("{}/oauth2/token", base),
            one_time_code_url: format!("{}/oauth2/one-time-code", base),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// # Errors
    /// * `AuthRefresh` - The endpoint refused the token (non-2xx, failure
    ///   envelope, or no tokens in the result)
    /// * `Transport` / `Protocol` - Network failure or unreadable body
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair> {
        info!("Refreshing marketplace access token");
        self.token_grant(TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            refresh_token: Some(refresh_token),
            code: None,
            grant_type: GRANT_REFRESH_TOKEN,
        })
        .await
    }

    /// Exchanges the authorization code the iframe reports on
    /// `client.authenticated`.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenPair> {
        info!("Exchanging marketplace authorization code");
        self.token_grant(TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            refresh_token: None,
            code: Some(code),
            grant_type: GRANT_AUTHORIZATION_CODE,
        })
        .await
    }

    async fn token_grant(&self, request: TokenRequest<'_>) -> Result<TokenPair> {
        let grant_type = request.grant_type;
        debug!(grant_type, url = %self.token_url, "Posting token grant");

        let response = self.http.post(&self.token_url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Any non-2xx is a refusal, whatever the body looks like
        if !status.is_success() {
            let reason = match envelope::parse::<serde_json::Value>(status, &body) {
                Err(Error::Remote(message)) => message,
                _ => format!("token endpoint returned HTTP {}", status),
            };
            warn!(grant_type, status = %status, "Token endpoint refused grant");
            return Err(Error::AuthRefresh(reason));
        }

        let result: TokenResponse = envelope::parse(status, &body).map_err(|e| match e {
            Error::Remote(message) => Error::AuthRefresh(message),
            other => other,
        })?;

        let tokens = result.response.ok_or_else(|| {
            Error::AuthRefresh("token endpoint returned no tokens".to_string())
        })?;

        if tokens.access_token.is_none() {
            warn!(grant_type, "Token endpoint returned no access token");
        }
        debug!(
            grant_type,
            has_refresh_token = tokens.refresh_token.is_some(),
            "Token grant successful"
        );

        Ok(tokens)
    }

    /// Fetches a one-time code for a single embedding operation.
    ///
    /// The code authenticates the partner's OAuth client in the iframe
    /// without exposing the client secret to the browser.
    pub async fn fetch_one_time_code(&self) -> Result<String> {
        debug!(url = %self.one_time_code_url, "Requesting one-time code");

        let response = self
            .http
            .post(&self.one_time_code_url)
            .json(&OneTimeCodeRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;

        let result: OneTimeCodeResponse = envelope::decode(response).await?;

        result
            .one_time_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::Protocol("one-time-code response has no code".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn refresher(server: &Server) -> TokenRefresher {
        let config = ZwapgridConfig {
            api_url: format!("{}/", server.url()),
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            ..Default::default()
        };
        TokenRefresher::new(reqwest::Client::new(), &config)
    }

    #[test]
    fn test_token_request_uses_pascal_case() {
        let request = TokenRequest {
            client_id: "id",
            client_secret: "secret",
            refresh_token: Some("rt"),
            code: None,
            grant_type: GRANT_REFRESH_TOKEN,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "ClientId": "id",
                "ClientSecret": "secret",
                "RefreshToken": "rt",
                "GrantType": "refresh_token"
            })
        );
    }

    #[test]
    fn test_token_pair_accepts_either_casing() {
        let camel: TokenPair =
            serde_json::from_str(r#"{"accessToken":"a","refreshToken":"r"}"#).unwrap();
        let pascal: TokenPair =
            serde_json::from_str(r#"{"AccessToken":"a","RefreshToken":"r"}"#).unwrap();
        assert_eq!(camel, pascal);
        assert_eq!(camel.encrypted_access_token, None);
    }

    #[tokio::test]
    async fn test_refresh_tokens_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/oauth2/token")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::PartialJson(json!({
                "ClientId": "client-1",
                "ClientSecret": "secret-1",
                "RefreshToken": "old-refresh",
                "GrantType": "refresh_token"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"result":{"response":{"accessToken":"new-access","refreshToken":"new-refresh"}},"success":true}"#,
            )
            .create_async()
            .await;

        let tokens = refresher(&server).refresh_tokens("old-refresh").await.unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("new-access"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("new-refresh"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reused_refresh_token_is_auth_refresh_failure() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/oauth2/token")
            .with_status(401)
            .with_body(r#"{"result":null,"success":false,"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let err = refresher(&server).refresh_tokens("used").await.unwrap_err();
        match err {
            Error::AuthRefresh(message) => assert_eq!(message, "invalid_grant"),
            other => panic!("unexpected error: {:?}", other),
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_without_envelope_is_auth_refresh_failure() {
        let mut server = Server::new_async().await;
        let _empty = server
            .mock("POST", "/api/v1/oauth2/token")
            .match_body(Matcher::PartialJson(json!({"RefreshToken": "empty-body"})))
            .with_status(401)
            .create_async()
            .await;
        let _html = server
            .mock("POST", "/api/v1/oauth2/token")
            .match_body(Matcher::PartialJson(json!({"RefreshToken": "html-body"})))
            .with_status(503)
            .with_body("<html>Service Unavailable</html>")
            .create_async()
            .await;

        let refresher = refresher(&server);
        match refresher.refresh_tokens("empty-body").await.unwrap_err() {
            Error::AuthRefresh(message) => assert!(message.contains("401")),
            other => panic!("unexpected error: {:?}", other),
        }
        match refresher.refresh_tokens("html-body").await.unwrap_err() {
            Error::AuthRefresh(message) => assert!(message.contains("503")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_token_result_is_auth_refresh_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/oauth2/token")
            .with_status(200)
            .with_body(r#"{"result":{"response":null},"success":true}"#)
            .create_async()
            .await;

        let err = refresher(&server).refresh_tokens("rt").await.unwrap_err();
        assert!(matches!(err, Error::AuthRefresh(_)));
    }

    #[tokio::test]
    async fn test_exchange_authorization_code() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/oauth2/token")
            .match_body(Matcher::PartialJson(json!({
                "Code": "auth-code",
                "GrantType": "authorization_code"
            })))
            .with_status(200)
            .with_body(
                r#"{"result":{"response":{"accessToken":"a","refreshToken":"r","encryptedAccessToken":"enc"}},"success":true}"#,
            )
            .create_async()
            .await;

        let tokens = refresher(&server)
            .exchange_authorization_code("auth-code")
            .await
            .unwrap();
        assert_eq!(tokens.encrypted_access_token.as_deref(), Some("enc"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_one_time_code() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/oauth2/one-time-code")
            .match_body(Matcher::Json(json!({
                "ClientId": "client-1",
                "ClientSecret": "secret-1"
            })))
            .with_status(200)
            .with_body(r#"{"result":{"oneTimeCode":"otc-42"},"success":true}"#)
            .create_async()
            .await;

        let code = refresher(&server).fetch_one_time_code().await.unwrap();
        assert_eq!(code, "otc-42");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_one_time_code_rejected_client() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/oauth2/one-time-code")
            .with_status(400)
            .with_body(r#"{"success":false,"error":{"message":"Unknown client"}}"#)
            .create_async()
            .await;

        let err = refresher(&server).fetch_one_time_code().await.unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint_is_transport_error() {
        let config = ZwapgridConfig {
            api_url: "http://127.0.0.1:9/".to_string(),
            ..Default::default()
        };
        let refresher = TokenRefresher::new(reqwest::Client::new(), &config);

        let err = refresher.refresh_tokens("rt").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
