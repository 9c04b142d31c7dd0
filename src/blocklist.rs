// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Blocklist matching
//!
//! Rules are parsed once into matchers. A rule is either a literal substring,
//! a regular expression written as `/pattern/`, or an IP address / CIDR range.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// A single parsed blocklist rule
#[derive(Debug, Clone)]
pub enum BlocklistRule {
    /// Substring containment
    Literal(String),
    /// Pattern test
    Pattern(Regex),
    /// Address equality or range containment
    Network(IpNet),
}

impl BlocklistRule {
    /// Parse a raw rule string
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        if trimmed.len() > 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            let pattern = &trimmed[1..trimmed.len() - 1];
            return Ok(BlocklistRule::Pattern(Regex::new(pattern)?));
        }

        if let Ok(net) = trimmed.parse::<IpNet>() {
            return Ok(BlocklistRule::Network(net));
        }

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            let prefix = if ip.is_ipv4() { 32 } else { 128 };
            let net = IpNet::new(ip, prefix).map_err(|e| Error::config(e.to_string()))?;
            return Ok(BlocklistRule::Network(net));
        }

        if trimmed.is_empty() {
            return Err(Error::config("Empty blocklist rule"));
        }

        Ok(BlocklistRule::Literal(trimmed.to_string()))
    }

    /// Test a candidate (url, host or ip) against this rule
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            BlocklistRule::Literal(needle) => candidate.contains(needle.as_str()),
            BlocklistRule::Pattern(re) => re.is_match(candidate),
            BlocklistRule::Network(net) => {
                candidate_ip(candidate).map_or(false, |ip| net.contains(&ip))
            }
        }
    }
}

/// Rule hit, with the rule as it was written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedRequest {
    /// What was tested
    #[serde(rename = "match")]
    pub candidate: String,
    /// Rule that matched
    pub rule: String,
}

/// Ordered set of blocklist rules
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    rules: Vec<(String, BlocklistRule)>,
}

impl Blocklist {
    /// Parse every raw rule; fails on the first invalid one
    pub fn new<S: AsRef<str>>(raw_rules: &[S]) -> Result<Self> {
        let rules = raw_rules
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                BlocklistRule::parse(raw)
                    .map(|rule| (raw.to_string(), rule))
                    .map_err(|e| Error::config(format!("Blocklist rule '{}': {}", raw, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Empty blocklist
    pub fn empty() -> Self {
        Self::default()
    }

    /// First rule matching `candidate`, as written in the configuration
    pub fn find_match(&self, candidate: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(_, rule)| rule.matches(candidate))
            .map(|(raw, _)| raw.as_str())
    }

    /// Test a request url: the full url first, then its host
    pub fn check_url(&self, url: &Url) -> Option<BlockedRequest> {
        let mut candidates = vec![url.as_str().to_string()];
        if let Some(host) = url.host_str() {
            candidates.push(host.trim_matches(|c| c == '[' || c == ']').to_string());
        }

        candidates.into_iter().find_map(|candidate| {
            self.find_match(&candidate).map(|rule| BlockedRequest {
                candidate,
                rule: rule.to_string(),
            })
        })
    }

    /// Test resolved addresses of a host
    pub fn check_addrs(&self, addrs: &[IpAddr]) -> Option<BlockedRequest> {
        addrs.iter().find_map(|ip| {
            let candidate = ip.to_string();
            self.find_match(&candidate).map(|rule| BlockedRequest {
                candidate,
                rule: rule.to_string(),
            })
        })
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Extract an IP from a bare address or from a url whose host is an address
fn candidate_ip(candidate: &str) -> Option<IpAddr> {
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Some(ip);
    }

    let url = Url::parse(candidate).ok()?;
    match url.host()? {
        url::Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        url::Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        url::Host::Domain(_) => None,
    }
}

/// Rules applied when none are configured: localhost and non-routable ranges
pub fn default_rules() -> Vec<String> {
    [
        "/https?:\\/\\/localhost/",
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.0.0.0/29",
        "192.0.0.170/31",
        "192.0.2.0/24",
        "192.168.0.0/16",
        "198.18.0.0/15",
        "198.51.100.0/24",
        "203.0.113.0/24",
        "240.0.0.0/4",
        "255.255.255.255/32",
        "::/128",
        "::1/128",
        "::ffff:0:0/96",
        "100::/64",
        "2001::/23",
        "2001:2::/48",
        "2001:db8::/32",
        "2001:10::/28",
        "fc00::/7",
        "fe80::/10",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
