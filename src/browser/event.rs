// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Network event types emitted by a browser page

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::exchange::{ParsedRequest, ParsedResponse};

/// Error text reported for requests cancelled by the client
pub const ERR_ABORTED: &str = "net::ERR_ABORTED";

/// Resource type of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceType {
    /// Top-level or frame navigation
    Document,
    Script,
    Stylesheet,
    Image,
    Font,
    Media,
    /// XHR / fetch
    Fetch,
    #[default]
    Other,
}

impl ResourceType {
    /// Guess from a url's file extension
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        let ext = path.rsplit('.').next().unwrap_or("");

        match ext {
            "js" | "mjs" => ResourceType::Script,
            "css" => ResourceType::Stylesheet,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" | "avif" => {
                ResourceType::Image
            }
            "woff" | "woff2" | "ttf" | "otf" | "eot" => ResourceType::Font,
            "mp4" | "webm" | "mp3" | "ogg" | "wav" | "m4a" => ResourceType::Media,
            "html" | "htm" => ResourceType::Document,
            _ => ResourceType::Other,
        }
    }
}

/// Request information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Bytes,
    /// Resource type
    pub resource_type: ResourceType,
    /// Whether this request navigates the page
    pub is_navigation: bool,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into().to_ascii_uppercase(),
            headers: Vec::new(),
            body: Bytes::new(),
            resource_type: ResourceType::Other,
            is_navigation: false,
        }
    }

    /// Navigation request for a document
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            resource_type: ResourceType::Document,
            is_navigation: true,
            ..Self::new("GET", url)
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Convert for the exchange model
    pub fn to_parsed(&self) -> ParsedRequest {
        ParsedRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// Response information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

impl ResponseInfo {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert for the exchange model
    ///
    /// Bodies browsers never expose are replaced with a note.
    pub fn to_parsed(&self, request: &RequestInfo) -> ParsedResponse {
        let body = if self.status == 301 {
            Bytes::from(format!(
                "Redirected to {}",
                self.header_value("location").unwrap_or("")
            ))
        } else if request.method == "HEAD" || request.method == "OPTIONS" {
            Bytes::from(format!(
                "No body, as a {} request was made.",
                request.method
            ))
        } else {
            self.body.clone()
        };

        ParsedResponse {
            status: self.status,
            status_message: self.status_text.clone(),
            headers: self.headers.clone(),
            body,
        }
    }
}

/// Network event
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// Request issued
    Request(RequestInfo),
    /// Response fully received
    RequestFinished {
        request: RequestInfo,
        response: ResponseInfo,
    },
    /// Request failed before a response completed
    RequestFailed {
        request: RequestInfo,
        error_text: String,
    },
}

impl NetworkEvent {
    /// The request this event is about
    pub fn request(&self) -> &RequestInfo {
        match self {
            NetworkEvent::Request(request) => request,
            NetworkEvent::RequestFinished { request, .. } => request,
            NetworkEvent::RequestFailed { request, .. } => request,
        }
    }
}
