// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Provenance and page metadata

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::blocklist::BlockedRequest;

/// Placeholder for values that could not be determined
pub const UNKNOWN: &str = "UNKNOWN";

/// Certificate pulled for a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub host: String,
    pub pem: String,
}

/// Conditions under which a capture was made
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceInfo {
    /// Public IP of the capturing machine
    pub capture_ip: String,
    pub user_agent: String,
    pub software: String,
    pub version: String,
    pub os_type: String,
    pub cpu_architecture: String,
    pub blocked_requests: Vec<BlockedRequest>,
    pub certificates: Vec<Certificate>,
    /// `sha256:`-prefixed hash of the yt-dlp binary, empty if unavailable
    pub yt_dlp_hash: String,
    pub crip_hash: String,
    /// Options snapshot, tool paths removed
    pub options: serde_json::Value,
}

impl Default for ProvenanceInfo {
    fn default() -> Self {
        Self {
            capture_ip: UNKNOWN.to_string(),
            user_agent: String::new(),
            software: crate::SOFTWARE.to_string(),
            version: crate::VERSION.to_string(),
            os_type: std::env::consts::OS.to_string(),
            cpu_architecture: std::env::consts::ARCH.to_string(),
            blocked_requests: Vec::new(),
            certificates: Vec::new(),
            yt_dlp_hash: String::new(),
            crip_hash: String::new(),
            options: serde_json::Value::Null,
        }
    }
}

/// Page metadata read from the live document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub favicon_url: Option<String>,
    /// Favicon bytes; never serialized
    #[serde(skip)]
    pub favicon: Option<Bytes>,
}

impl PageInfo {
    /// Build from the result of the page info script
    pub fn from_value(value: &serde_json::Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Self {
            title: field("title"),
            description: field("description"),
            url: field("url"),
            favicon_url: field("faviconUrl"),
            favicon: None,
        }
    }

    /// Favicon url, if it is fetchable over http(s)
    pub fn http_favicon_url(&self) -> Option<&str> {
        self.favicon_url
            .as_deref()
            .filter(|url| url.starts_with("http"))
    }
}
