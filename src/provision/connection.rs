use crate::error::{Error, Result};
use crate::users::User;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Per-integration credential set handed to the marketplace so it can call
/// the partner's API on the user's behalf.
///
/// Each variant serializes to its own sub-object of the connection payload,
/// e.g. `{"invoiceOnline": {"secretKey": .., "storeId": ..}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionCredential {
    #[serde(rename = "invoiceOnline", alias = "invoice_online")]
    InvoiceOnline {
        #[serde(rename = "secretKey", alias = "secret_key")]
        secret_key: String,
        #[serde(rename = "storeId", alias = "store_id")]
        store_id: String,
    },
}

impl Default for ConnectionCredential {
    fn default() -> Self {
        ConnectionCredential::InvoiceOnline {
            secret_key: String::new(),
            store_id: String::new(),
        }
    }
}

/// Supplies the credential for a user's connection.
pub trait CredentialSource: Send + Sync {
    fn credential_for(&self, user: &User) -> ConnectionCredential;
}

/// A fixed credential shared by every user.
impl CredentialSource for ConnectionCredential {
    fn credential_for(&self, _user: &User) -> ConnectionCredential {
        self.clone()
    }
}

/// Marketplace connection record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Shown in the marketplace UI to tell connections of one type apart
    #[serde(default, alias = "Title")]
    pub title: String,

    /// Organisation number
    #[serde(
        rename = "companyId",
        alias = "CompanyId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub company_id: Option<String>,

    /// Assigned remotely; the marketplace sends it as a string or a number.
    #[serde(
        alias = "Id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_id"
    )]
    pub id: Option<String>,

    /// Type-specific credential sub-object
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Connection {
    pub fn new(
        title: impl Into<String>,
        company_id: Option<String>,
        credential: &ConnectionCredential,
    ) -> Result<Self> {
        let payload = match serde_json::to_value(credential) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(Error::Protocol(format!(
                    "connection credential must serialize to an object, got {}",
                    other
                )))
            }
            Err(e) => {
                return Err(Error::Protocol(format!(
                    "failed to encode connection credential: {}",
                    e
                )))
            }
        };

        Ok(Self {
            title: title.into(),
            company_id,
            id: None,
            payload,
        })
    }

    /// The remote id, if one was assigned.
    pub fn external_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    }))
}

/// Answer of `/connections/validate`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ValidationResult {
    #[serde(default, alias = "Success")]
    pub success: bool,

    #[serde(default, alias = "Message")]
    pub message: Option<String>,

    #[serde(default, alias = "Value")]
    pub value: Option<String>,
}
