// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercepted exchange
//!
//! Holds the raw byte buffers and/or the parsed forms of a request/response
//! pair. Views are derived on first access and cached until a backing field
//! is written again.

use std::sync::OnceLock;

use url::Url;

use super::message::{ParsedRequest, ParsedResponse, RequestView, ResponseView};
use crate::error::{Error, Result};

/// One request/response pair observed on the wire
#[derive(Debug, Clone, Default)]
pub struct ProxyExchange {
    url: Option<Url>,
    request_raw: Vec<u8>,
    response_raw: Vec<u8>,
    request_parsed: Option<ParsedRequest>,
    response_parsed: Option<ParsedResponse>,
    is_entry_point: bool,
    request_view: OnceLock<Option<RequestView>>,
    response_view: OnceLock<Option<ResponseView>>,
}

impl ProxyExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchange anchored on a parsed request
    pub fn from_request(request: ParsedRequest) -> Result<Self> {
        let mut exchange = Self::new();
        exchange.set_request_parsed(request)?;
        Ok(exchange)
    }

    /// Exchange url, once known
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Assign the url; it cannot change afterwards
    pub fn set_url(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url)?;

        match &self.url {
            Some(existing) if existing != &parsed => Err(Error::invalid_input(format!(
                "Exchange url already set to {}",
                existing
            ))),
            Some(_) => Ok(()),
            None => {
                self.url = Some(parsed);
                self.invalidate();
                Ok(())
            }
        }
    }

    pub fn is_entry_point(&self) -> bool {
        self.is_entry_point
    }

    pub fn set_entry_point(&mut self, is_entry_point: bool) {
        self.is_entry_point = is_entry_point;
    }

    /// Store the parsed request; derives the url when not yet set
    pub fn set_request_parsed(&mut self, request: ParsedRequest) -> Result<()> {
        if self.url.is_none() {
            let url = request.absolute_url()?;
            self.url = Some(url);
        }
        self.request_parsed = Some(request);
        self.invalidate();
        Ok(())
    }

    /// Store the parsed response
    pub fn set_response_parsed(&mut self, response: ParsedResponse) {
        self.response_parsed = Some(response);
        self.response_view = OnceLock::new();
    }

    /// Append raw request bytes
    pub fn append_request_raw(&mut self, data: &[u8]) {
        self.request_raw.extend_from_slice(data);
        self.invalidate();
    }

    /// Append raw response bytes
    pub fn append_response_raw(&mut self, data: &[u8]) {
        self.response_raw.extend_from_slice(data);
        self.response_view = OnceLock::new();
    }

    pub fn request_raw(&self) -> &[u8] {
        &self.request_raw
    }

    pub fn response_raw(&self) -> &[u8] {
        &self.response_raw
    }

    /// Parsed request, from the stored form or the raw buffer
    pub fn request_parsed(&self) -> Option<ParsedRequest> {
        if let Some(request) = &self.request_parsed {
            return Some(request.clone());
        }
        if self.request_raw.is_empty() {
            return None;
        }
        ParsedRequest::from_raw(&self.request_raw).ok().flatten()
    }

    /// Parsed response, from the stored form or the raw buffer
    pub fn response_parsed(&self) -> Option<ParsedResponse> {
        if let Some(response) = &self.response_parsed {
            return Some(response.clone());
        }
        if self.response_raw.is_empty() {
            return None;
        }
        ParsedResponse::from_raw(&self.response_raw).ok().flatten()
    }

    /// Whether any response data has been attached
    pub fn has_response(&self) -> bool {
        self.response_parsed.is_some() || !self.response_raw.is_empty()
    }

    /// Status of the attached response
    pub fn response_status(&self) -> Option<u16> {
        match &self.response_parsed {
            Some(response) => Some(response.status),
            None => self.response().map(|r| r.status),
        }
    }

    /// Request view
    pub fn request(&self) -> Option<&RequestView> {
        self.request_view
            .get_or_init(|| {
                let parsed = self.request_parsed()?;
                let url = match &self.url {
                    Some(url) => url.to_string(),
                    None => parsed.absolute_url().ok()?.to_string(),
                };
                Some(RequestView::build(&url, &parsed))
            })
            .as_ref()
    }

    /// Response view; `None` until both a request and a response exist
    pub fn response(&self) -> Option<&ResponseView> {
        self.response_view
            .get_or_init(|| {
                let request = self.request()?;
                let parsed = self.response_parsed()?;
                Some(ResponseView::build(&request.url, &parsed))
            })
            .as_ref()
    }

    /// Bytes counted against the capture budget
    pub fn body_len(&self) -> usize {
        let request = self.request_parsed.as_ref().map_or(0, |r| r.body.len());
        let response = self.response_parsed.as_ref().map_or(0, |r| r.body.len());
        request + response + self.request_raw.len() + self.response_raw.len()
    }

    fn invalidate(&mut self) {
        self.request_view = OnceLock::new();
        self.response_view = OnceLock::new();
    }
}
