// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Exchange model
//!
//! An exchange is one HTTP transaction, either observed on the wire or
//! generated by the capture.

mod generated;
mod intercepted;
mod message;

pub use generated::GeneratedExchange;
pub use intercepted::ProxyExchange;
pub use message::{
    header_map, sanitize_header_value, ParsedRequest, ParsedResponse, RequestView,
    ResponseView, HTTP_VERSION,
};

/// Any exchange of a capture
#[derive(Debug, Clone)]
pub enum Exchange {
    Intercepted(ProxyExchange),
    Generated(GeneratedExchange),
}

impl Exchange {
    /// Url identifying this exchange
    pub fn url(&self) -> Option<&str> {
        match self {
            Exchange::Intercepted(ex) => ex.url().map(|u| u.as_str()),
            Exchange::Generated(ex) => Some(ex.url().as_str()),
        }
    }

    /// Request view; generated exchanges have none
    pub fn request(&self) -> Option<&RequestView> {
        match self {
            Exchange::Intercepted(ex) => ex.request(),
            Exchange::Generated(_) => None,
        }
    }

    /// Response view, if available
    pub fn response(&self) -> Option<&ResponseView> {
        match self {
            Exchange::Intercepted(ex) => ex.response(),
            Exchange::Generated(ex) => Some(ex.response()),
        }
    }

    pub fn is_entry_point(&self) -> bool {
        match self {
            Exchange::Intercepted(ex) => ex.is_entry_point(),
            Exchange::Generated(ex) => ex.is_entry_point(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Exchange::Intercepted(_) => None,
            Exchange::Generated(ex) => Some(ex.description()),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Exchange::Generated(_))
    }

    pub fn as_generated(&self) -> Option<&GeneratedExchange> {
        match self {
            Exchange::Generated(ex) => Some(ex),
            Exchange::Intercepted(_) => None,
        }
    }
}

impl From<ProxyExchange> for Exchange {
    fn from(ex: ProxyExchange) -> Self {
        Exchange::Intercepted(ex)
    }
}

impl From<GeneratedExchange> for Exchange {
    fn from(ex: GeneratedExchange) -> Self {
        Exchange::Generated(ex)
    }
}
