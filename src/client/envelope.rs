//! Marketplace response envelope.
//!
//! Every endpoint answers `{ "result": T, "success": bool, "error": .. }`.
//! `success: false` or a present `error` is a failure even on HTTP 200.

use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Error member of the envelope: either a bare string or an object.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ApiError {
    Message(String),
    Detailed {
        #[serde(default, alias = "Message")]
        message: Option<String>,
        #[serde(default, alias = "Details")]
        details: Option<String>,
    },
}

impl ApiError {
    pub fn message(&self) -> String {
        match self {
            ApiError::Message(message) => message.clone(),
            ApiError::Detailed { message, details } => match (message, details) {
                (Some(message), Some(details)) => format!("{} ({})", message, details),
                (Some(message), None) => message.clone(),
                (None, Some(details)) => details.clone(),
                (None, None) => "unknown error".to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "Option::default", alias = "Result")]
    pub result: Option<T>,

    /// Absent counts as success; only an explicit `false` fails.
    #[serde(default, alias = "Success")]
    pub success: Option<bool>,

    #[serde(default, alias = "Error")]
    pub error: Option<ApiError>,
}

impl<T> Envelope<T> {
    /// Unwraps the result, checking failure signals in order: `error`,
    /// `success: false`, then the HTTP status.
    pub fn into_result(self, status: StatusCode) -> Result<T> {
        if let Some(error) = self.error {
            return Err(Error::Remote(error.message()));
        }
        if self.success == Some(false) {
            return Err(Error::Remote(format!(
                "request reported failure (HTTP {})",
                status
            )));
        }
        if !status.is_success() {
            return Err(Error::Remote(format!("unexpected HTTP status {}", status)));
        }

        self.result
            .ok_or_else(|| Error::Protocol("response envelope has no result".to_string()))
    }
}

/// Parses a response body as an envelope of `T`.
pub fn parse<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| {
        Error::Protocol(format!("unexpected response body (HTTP {}): {}", status, e))
    })?;
    envelope.into_result(status)
}

/// Reads and parses a response.
pub async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    debug!(status = %status, bytes = body.len(), "Decoding marketplace response");
    parse(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn success_envelope_yields_result() {
        let value: String = parse(StatusCode::OK, r#"{"result":"pem","success":true}"#).unwrap();
        assert_eq!(value, "pem");
    }

    #[test]
    fn missing_success_flag_counts_as_success() {
        let value: u32 = parse(StatusCode::OK, r#"{"result":5}"#).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn success_false_on_http_200_is_a_failure() {
        let err = parse::<Value>(StatusCode::OK, r#"{"result":null,"success":false}"#).unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[test]
    fn string_error_is_authoritative() {
        let err =
            parse::<Value>(StatusCode::OK, r#"{"result":{},"success":true,"error":"nope"}"#)
                .unwrap_err();
        match err {
            Error::Remote(message) => assert_eq!(message, "nope"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn object_error_carries_message_and_details() {
        let err = parse::<Value>(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"error":{"message":"Invalid client","details":"secret mismatch"}}"#,
        )
        .unwrap_err();
        match err {
            Error::Remote(message) => assert_eq!(message, "Invalid client (secret mismatch)"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn null_error_is_ignored() {
        let value: bool = parse(StatusCode::OK, r#"{"result":true,"error":null}"#).unwrap();
        assert!(value);
    }

    #[test]
    fn non_json_body_is_a_protocol_error() {
        let err = parse::<Value>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn error_status_without_failure_flag_is_remote() {
        let err = parse::<Value>(StatusCode::UNAUTHORIZED, r#"{"result":null}"#).unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[test]
    fn missing_result_is_a_protocol_error() {
        let err = parse::<Value>(StatusCode::OK, r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
