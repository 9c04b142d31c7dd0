// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Attester configuration

use serde::{Deserialize, Serialize};

/// Attester type used when none is configured
pub const STANDARD_ATTESTER: &str = "standard";

/// Credentials presented to the forward proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AttesterAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

/// Trusted forward proxy all capture traffic is routed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardProxy {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AttesterAuth>,
}

impl ForwardProxy {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: AttesterAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// `host:port`
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Attester options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttesterOptions {
    #[serde(default = "default_attester_type")]
    pub attester_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_proxy: Option<ForwardProxy>,
    /// Value of the `Timestamp-Proof` request header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_proof: Option<String>,
}

fn default_attester_type() -> String {
    STANDARD_ATTESTER.to_string()
}

impl Default for AttesterOptions {
    fn default() -> Self {
        Self {
            attester_type: default_attester_type(),
            forward_proxy: None,
            timestamp_proof: None,
        }
    }
}

impl AttesterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward_proxy(mut self, proxy: ForwardProxy) -> Self {
        self.forward_proxy = Some(proxy);
        self
    }

    pub fn timestamp_proof(mut self, proof: impl Into<String>) -> Self {
        self.timestamp_proof = Some(proof.into());
        self
    }

    /// Basic credentials of the forward proxy, if any
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match self.forward_proxy.as_ref()?.auth.as_ref()? {
            AttesterAuth::Basic { username, password } => Some((username, password)),
            AttesterAuth::Bearer { .. } => None,
        }
    }

    /// Bearer token of the forward proxy, if any
    pub fn bearer_token(&self) -> Option<&str> {
        match self.forward_proxy.as_ref()?.auth.as_ref()? {
            AttesterAuth::Bearer { token } => Some(token),
            AttesterAuth::Basic { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: AttesterOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.attester_type, "standard");
        assert!(options.forward_proxy.is_none());
    }

    #[test]
    fn test_tagged_auth() {
        let json = r#"{
            "attesterType": "standard",
            "forwardProxy": {
                "host": "relay.local",
                "port": 3128,
                "auth": {"type": "bearer", "token": "abc"}
            },
            "timestampProof": "proof"
        }"#;
        let options: AttesterOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.bearer_token(), Some("abc"));
        assert_eq!(options.basic_auth(), None);
        assert_eq!(options.forward_proxy.as_ref().unwrap().server(), "relay.local:3128");

        let basic = AttesterOptions::new().forward_proxy(
            ForwardProxy::new("relay.local", 3128).with_auth(AttesterAuth::Basic {
                username: "u".into(),
                password: "p".into(),
            }),
        );
        assert_eq!(basic.basic_auth(), Some(("u", "p")));
    }
}
