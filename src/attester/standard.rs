// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Standard attester

use super::options::{AttesterOptions, STANDARD_ATTESTER};
use super::Attester;
use crate::browser::{LaunchOptions, ProxySettings};
use crate::error::{Error, Result};
use crate::headers::{CustomHeader, CustomHeaders};

pub const TIMESTAMP_PROOF_HEADER: &str = "Timestamp-Proof";
pub const ATTESTER_AUTHORIZATION_HEADER: &str = "Attester-Authorization";

/// Routes traffic through a forward proxy and stamps it with proof headers
#[derive(Debug, Clone)]
pub struct StandardAttester {
    options: AttesterOptions,
}

impl StandardAttester {
    pub fn new(options: AttesterOptions) -> Result<Self> {
        let attester = Self { options };
        attester.validate_attester_type()?;
        Ok(attester)
    }

    pub fn options(&self) -> &AttesterOptions {
        &self.options
    }
}

impl Attester for StandardAttester {
    fn attester_type(&self) -> &'static str {
        STANDARD_ATTESTER
    }

    fn validate_attester_type(&self) -> Result<()> {
        if self.options.attester_type != self.attester_type() {
            return Err(Error::Attester(
                "AttesterOptions are for a different type of attester".to_string(),
            ));
        }
        Ok(())
    }

    fn configure_forward_proxy(&self, launch: &mut LaunchOptions) {
        let Some(proxy) = &self.options.forward_proxy else {
            return;
        };

        let mut settings = ProxySettings::new(proxy.server());
        if let Some((username, password)) = self.options.basic_auth() {
            settings = settings.basic_auth(username, password);
        }
        tracing::debug!(server = %settings.server, "Forward proxy configured");
        launch.proxy = Some(settings);
    }

    fn add_custom_headers(&self, headers: &CustomHeaders) {
        if let Some(proof) = &self.options.timestamp_proof {
            headers.add(CustomHeader::request(TIMESTAMP_PROOF_HEADER, proof.as_str()));
        }

        if let Some(token) = self.options.bearer_token() {
            headers.add(
                CustomHeader::request(ATTESTER_AUTHORIZATION_HEADER, format!("Bearer {}", token))
                    .transient(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attester::{AttesterAuth, ForwardProxy};
    use crate::headers::HeaderScope;

    #[test]
    fn test_rejects_other_type() {
        let options = AttesterOptions {
            attester_type: "notary".to_string(),
            ..Default::default()
        };
        let err = StandardAttester::new(options).unwrap_err();
        assert!(err.to_string().contains("different type of attester"));
    }

    #[test]
    fn test_configures_basic_auth_proxy() {
        let attester = StandardAttester::new(AttesterOptions::new().forward_proxy(
            ForwardProxy::new("relay.local", 3128).with_auth(AttesterAuth::Basic {
                username: "user".into(),
                password: "pass".into(),
            }),
        ))
        .unwrap();

        let mut launch = LaunchOptions::default();
        attester.configure_forward_proxy(&mut launch);
        let proxy = launch.proxy.unwrap();
        assert_eq!(proxy.server, "relay.local:3128");
        assert_eq!(proxy.username.as_deref(), Some("user"));
    }

    #[test]
    fn test_no_proxy_leaves_launch_untouched() {
        let attester = StandardAttester::new(AttesterOptions::new()).unwrap();
        let mut launch = LaunchOptions::default();
        attester.configure_forward_proxy(&mut launch);
        assert!(launch.proxy.is_none());
    }

    #[test]
    fn test_header_injections() {
        let attester = StandardAttester::new(
            AttesterOptions::new()
                .timestamp_proof("tsp-123")
                .forward_proxy(
                    ForwardProxy::new("relay.local", 3128)
                        .with_auth(AttesterAuth::Bearer { token: "tok".into() }),
                ),
        )
        .unwrap();

        let headers = CustomHeaders::new();
        attester.add_custom_headers(&headers);

        let request = headers.get(HeaderScope::Request);
        assert_eq!(request.len(), 2);
        assert_eq!(request[0].name, TIMESTAMP_PROOF_HEADER);
        assert!(!request[0].transient);
        assert_eq!(request[1].value, "Bearer tok");
        assert!(headers.is_transient(HeaderScope::Request, "attester-authorization"));
    }
}
