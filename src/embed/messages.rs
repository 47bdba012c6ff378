//! Messages the marketplace iframe posts to the host page.
//!
//! Each message is `{"type": .., "data": ..}`. Messages from an origin other
//! than the iframe's own host, of an unknown type, or with malformed data are
//! dropped without an error.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const INTEGRATION_CREATED: &str = "integration.created";
pub const CLIENT_AUTHENTICATED: &str = "client.authenticated";
pub const ACCESS_TOKEN_MISSING: &str = "client.accessTokenMissing";

/// Message type the host page sends back into the iframe with a token.
pub const ACCESS_TOKEN_REPLY: &str = "accessToken";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarketplaceMessage {
    /// An integration between the two named systems was created.
    IntegrationCreated { systems: [String; 2] },
    /// The user authorized the partner; the code can be exchanged for tokens.
    ClientAuthenticated { authorization_code: String },
    /// The iframe needs a fresh access token.
    AccessTokenMissing,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatedData {
    authorization_code: String,
}

/// True when `origin` has the same host and port as `iframe_src`.
pub fn origin_matches(origin: &str, iframe_src: &str) -> bool {
    let (Ok(origin), Ok(src)) = (Url::parse(origin), Url::parse(iframe_src)) else {
        return false;
    };
    match (origin.host_str(), src.host_str()) {
        (Some(a), Some(b)) => {
            a.eq_ignore_ascii_case(b) && origin.port_or_known_default() == src.port_or_known_default()
        }
        _ => false,
    }
}

/// Parses a raw message. `None` for anything not understood.
pub fn parse_message(raw: &str) -> Option<MarketplaceMessage> {
    let message: RawMessage = serde_json::from_str(raw).ok()?;

    match message.kind.as_str() {
        INTEGRATION_CREATED => {
            let systems: [String; 2] = serde_json::from_value(message.data).ok()?;
            Some(MarketplaceMessage::IntegrationCreated { systems })
        }
        CLIENT_AUTHENTICATED => {
            let data: AuthenticatedData = serde_json::from_value(message.data).ok()?;
            if data.authorization_code.is_empty() {
                return None;
            }
            Some(MarketplaceMessage::ClientAuthenticated {
                authorization_code: data.authorization_code,
            })
        }
        ACCESS_TOKEN_MISSING => Some(MarketplaceMessage::AccessTokenMissing),
        _ => None,
    }
}

/// Origin check plus parse.
pub fn accept(origin: &str, iframe_src: &str, raw: &str) -> Option<MarketplaceMessage> {
    if !origin_matches(origin, iframe_src) {
        debug!(origin, "Discarding message from foreign origin");
        return None;
    }
    let message = parse_message(raw);
    if message.is_none() {
        debug!("Discarding unrecognized marketplace message");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "https://app.zwapgrid.com/zwapstore?otc=abc";

    #[test]
    fn same_host_matches() {
        assert!(origin_matches("https://app.zwapgrid.com", SRC));
        assert!(origin_matches("https://APP.zwapgrid.com:443", SRC));
    }

    #[test]
    fn lookalike_hosts_do_not_match() {
        assert!(!origin_matches("https://app.zwapgrid.com.evil.example", SRC));
        assert!(!origin_matches("https://evil.example", SRC));
        assert!(!origin_matches("https://app.zwapgrid.com:8443", SRC));
        assert!(!origin_matches("null", SRC));
    }

    #[test]
    fn parses_integration_created() {
        let message =
            parse_message(r#"{"type":"integration.created","data":["InvoiceOnline","Fortnox"]}"#);
        assert_eq!(
            message,
            Some(MarketplaceMessage::IntegrationCreated {
                systems: ["InvoiceOnline".to_string(), "Fortnox".to_string()]
            })
        );
    }

    #[test]
    fn integration_created_needs_exactly_two_systems() {
        assert!(parse_message(r#"{"type":"integration.created","data":["One"]}"#).is_none());
        assert!(parse_message(r#"{"type":"integration.created","data":["a","b","c"]}"#).is_none());
        assert!(parse_message(r#"{"type":"integration.created"}"#).is_none());
    }

    #[test]
    fn parses_client_authenticated() {
        let message = parse_message(
            r#"{"type":"client.authenticated","data":{"authorizationCode":"code-1"}}"#,
        );
        assert_eq!(
            message,
            Some(MarketplaceMessage::ClientAuthenticated {
                authorization_code: "code-1".to_string()
            })
        );
        assert!(parse_message(r#"{"type":"client.authenticated","data":{}}"#).is_none());
    }

    #[test]
    fn access_token_missing_ignores_data() {
        assert_eq!(
            parse_message(r#"{"type":"client.accessTokenMissing"}"#),
            Some(MarketplaceMessage::AccessTokenMissing)
        );
        assert_eq!(
            parse_message(r#"{"type":"client.accessTokenMissing","data":null}"#),
            Some(MarketplaceMessage::AccessTokenMissing)
        );
    }

    #[test]
    fn unknown_or_malformed_messages_are_dropped() {
        assert!(parse_message(r#"{"type":"integration.deleted","data":[]}"#).is_none());
        assert!(parse_message("not json").is_none());
        assert!(parse_message(r#"{"data":[]}"#).is_none());
    }

    #[test]
    fn accept_checks_origin_first() {
        let raw = r#"{"type":"client.accessTokenMissing"}"#;
        assert_eq!(
            accept("https://app.zwapgrid.com", SRC, raw),
            Some(MarketplaceMessage::AccessTokenMissing)
        );
        assert_eq!(accept("https://evil.example", SRC, raw), None);
    }
}
