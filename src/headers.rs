// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Custom header registry
//!
//! Header injections contributed by attesters. Transient headers shape live
//! traffic but are stripped from everything that gets archived.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Which side of the exchange a header applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderScope {
    Request,
    Response,
}

/// A header injection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    pub scope: HeaderScope,
    pub name: String,
    pub value: String,
    /// Applied live, never archived
    pub transient: bool,
}

impl CustomHeader {
    pub fn request(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scope: HeaderScope::Request,
            name: name.into(),
            value: value.into(),
            transient: false,
        }
    }

    pub fn response(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scope: HeaderScope::Response,
            ..Self::request(name, value)
        }
    }

    /// Mark as transient
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// Append-only list of header injections
#[derive(Debug, Default)]
pub struct CustomHeaders {
    headers: RwLock<Vec<CustomHeader>>,
}

impl CustomHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a header
    pub fn add(&self, header: CustomHeader) {
        tracing::debug!(
            name = %header.name,
            scope = ?header.scope,
            transient = header.transient,
            "Custom header registered"
        );
        self.headers.write().push(header);
    }

    /// All headers for `scope`, in insertion order
    pub fn get(&self, scope: HeaderScope) -> Vec<CustomHeader> {
        self.headers
            .read()
            .iter()
            .filter(|h| h.scope == scope)
            .cloned()
            .collect()
    }

    /// Whether `name` belongs to a transient header of `scope`
    pub fn is_transient(&self, scope: HeaderScope, name: &str) -> bool {
        self.headers
            .read()
            .iter()
            .any(|h| h.scope == scope && h.transient && h.name.eq_ignore_ascii_case(name))
    }

    /// Drop transient headers of `scope` from a header list
    pub fn strip_transient(
        &self,
        scope: HeaderScope,
        headers: Vec<(String, String)>,
    ) -> Vec<(String, String)> {
        headers
            .into_iter()
            .filter(|(name, _)| !self.is_transient(scope, name))
            .collect()
    }

    /// Apply every header of `scope`, replacing existing values
    pub fn apply(&self, scope: HeaderScope, headers: &mut Vec<(String, String)>) {
        for custom in self.get(scope) {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case(&custom.name));
            headers.push((custom.name, custom.value));
        }
    }

    pub fn len(&self) -> usize {
        self.headers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.read().is_empty()
    }
}
