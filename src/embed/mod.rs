//! Iframe embedding: the marketplace page URL and the browser messages the
//! page posts back.

pub mod messages;

pub use messages::{accept, origin_matches, parse_message, MarketplaceMessage};

use crate::config::ZwapgridConfig;
use crate::users::User;
use std::fmt;

/// URL of the marketplace page for one user.
///
/// Parameters are always emitted in the same order:
/// `otc, name, orgno, email, tenancyName, sourceConnectionId, source,
/// hideSource[, lang]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IframeUrl {
    base: String,
    params: Vec<(&'static str, String)>,
}

impl IframeUrl {
    pub fn new(
        config: &ZwapgridConfig,
        user: &User,
        one_time_code: &str,
        signed_connection_id: &str,
    ) -> Self {
        let mut params = vec![
            ("otc", one_time_code.to_string()),
            ("name", user.company_name.clone()),
            ("orgno", user.company_id.clone()),
            ("email", user.email.clone()),
            ("tenancyName", user.company_name.clone()),
            ("sourceConnectionId", signed_connection_id.to_string()),
            ("source", config.source_system.clone()),
            ("hideSource", config.hide_source.to_string()),
        ];
        if let Some(lang) = config.lang.as_deref().filter(|l| !l.is_empty()) {
            params.push(("lang", lang.to_string()));
        }

        Self {
            base: config.app_url.clone(),
            params,
        }
    }

    /// Unencoded parameters in emission order.
    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }
}

impl fmt::Display for IframeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        let mut separator = if self.base.contains('?') { '&' } else { '?' };
        for (name, value) in &self.params {
            write!(f, "{}{}={}", separator, name, urlencoding::encode(value))?;
            separator = '&';
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            company_name: "Åkesson & Söner AB".to_string(),
            company_id: "556677-8899".to_string(),
            email: "billing+zg@acme.example".to_string(),
            connection_id: Some(17),
            ..Default::default()
        }
    }

    fn query(url: &str) -> Vec<(String, String)> {
        let (_, query) = url.split_once('?').unwrap();
        serde_urlencoded::from_str(query).unwrap()
    }

    #[test]
    fn parameters_follow_fixed_order() {
        let config = ZwapgridConfig::default();
        let url = IframeUrl::new(&config, &user(), "otc-1", "c2lnbmVk").to_string();

        assert!(url.starts_with("https://app.zwapgrid.com/zwapstore?otc="));
        let names: Vec<String> = query(&url).into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            [
                "otc",
                "name",
                "orgno",
                "email",
                "tenancyName",
                "sourceConnectionId",
                "source",
                "hideSource"
            ]
        );
    }

    #[test]
    fn values_are_percent_encoded() {
        let config = ZwapgridConfig::default();
        let url = IframeUrl::new(&config, &user(), "otc-1", "a-b_c").to_string();

        assert!(!url.contains(' '));
        assert!(url.contains("email=billing%2Bzg%40acme.example"));

        let params = query(&url);
        assert_eq!(params[1], ("name".to_string(), "Åkesson & Söner AB".to_string()));
        assert_eq!(params[4].1, "Åkesson & Söner AB");
        assert_eq!(params[5].1, "a-b_c");
        assert_eq!(params[6].1, "InvoiceOnline");
        assert_eq!(params[7].1, "true");
    }

    #[test]
    fn lang_is_appended_last_when_configured() {
        let config = ZwapgridConfig {
            lang: Some("sv".to_string()),
            hide_source: false,
            ..Default::default()
        };
        let url = IframeUrl::new(&config, &user(), "otc-1", "sig").to_string();

        let params = query(&url);
        assert_eq!(params.len(), 9);
        assert_eq!(params[7], ("hideSource".to_string(), "false".to_string()));
        assert_eq!(params[8], ("lang".to_string(), "sv".to_string()));
    }

    #[test]
    fn existing_query_is_extended() {
        let config = ZwapgridConfig {
            app_url: "https://app.example.test/marketplace?theme=dark".to_string(),
            ..Default::default()
        };
        let url = IframeUrl::new(&config, &user(), "otc-1", "sig").to_string();
        assert!(url.starts_with("https://app.example.test/marketplace?theme=dark&otc=otc-1&name="));
    }
}
