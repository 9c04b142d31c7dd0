// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Attesters
//!
//! An attester routes capture traffic through a trusted forward proxy and
//! contributes headers to every proxied request.

mod options;
mod standard;

pub use options::{AttesterAuth, AttesterOptions, ForwardProxy, STANDARD_ATTESTER};
pub use standard::{StandardAttester, ATTESTER_AUTHORIZATION_HEADER, TIMESTAMP_PROOF_HEADER};

use crate::browser::LaunchOptions;
use crate::error::{Error, Result};
use crate::headers::CustomHeaders;

/// Attester capability set
pub trait Attester: Send + Sync {
    fn attester_type(&self) -> &'static str;

    /// Fails when the options were written for another attester
    fn validate_attester_type(&self) -> Result<()>;

    /// Point the browser at the forward proxy
    fn configure_forward_proxy(&self, launch: &mut LaunchOptions);

    /// Register request/response header injections
    fn add_custom_headers(&self, headers: &CustomHeaders);
}

/// Build the attester named by `options.attester_type`
pub fn load_attester(options: &AttesterOptions) -> Result<Box<dyn Attester>> {
    match options.attester_type.as_str() {
        STANDARD_ATTESTER => Ok(Box::new(StandardAttester::new(options.clone())?)),
        other => Err(Error::Attester(format!("Unknown attester type: {}", other))),
    }
}
