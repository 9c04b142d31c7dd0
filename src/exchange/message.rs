// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Parsed HTTP messages, raw wire codec and exposed views

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};

/// HTTP version written on every start line
pub const HTTP_VERSION: &str = "1.1";

const MAX_HEADERS: usize = 128;

/// Parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    /// Absolute url, or a path when only origin-form is known
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ParsedRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
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

    /// Path and query as written on the request line
    pub fn path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            },
            Err(_) => self.url.clone(),
        }
    }

    /// First header value named `name`
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Absolute url; origin-form paths are resolved against the host header
    pub fn absolute_url(&self) -> Result<Url> {
        if let Ok(url) = Url::parse(&self.url) {
            return Ok(url);
        }

        let host = self
            .header_value("host")
            .ok_or_else(|| Error::invalid_input(format!("No host for {}", self.url)))?;
        Ok(Url::parse(&format!("https://{}{}", host, self.url))?)
    }

    /// Serialize to raw bytes
    pub fn to_raw(&self) -> Vec<u8> {
        let target = Url::parse(&self.url)
            .map(|_| self.path())
            .unwrap_or_else(|_| self.url.clone());
        let start_line = format!("{} {} HTTP/{}", self.method, target, HTTP_VERSION);
        encode_message(&start_line, &self.headers, &self.body)
    }

    /// Parse raw bytes; `None` while the head is incomplete
    pub fn from_raw(raw: &[u8]) -> Result<Option<Self>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let offset = match req.parse(raw) {
            Ok(httparse::Status::Complete(offset)) => offset,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(e) => return Err(Error::other(format!("Malformed request: {}", e))),
        };

        Ok(Some(Self {
            method: req.method.unwrap_or("GET").to_string(),
            url: req.path.unwrap_or("/").to_string(),
            headers: collect_headers(req.headers),
            body: Bytes::copy_from_slice(&raw[offset..]),
        }))
    }
}

/// Parsed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub status: u16,
    pub status_message: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ParsedResponse {
    pub fn new(status: u16, status_message: impl Into<String>) -> Self {
        Self {
            status,
            status_message: status_message.into(),
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

    /// First header value named `name`
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Status line as archived
    pub fn start_line(&self) -> String {
        format!(
            "HTTP/{} {:03} {}",
            HTTP_VERSION, self.status, self.status_message
        )
    }

    /// Serialize to raw bytes
    pub fn to_raw(&self) -> Vec<u8> {
        encode_message(&self.start_line(), &self.headers, &self.body)
    }

    /// Parse raw bytes; `None` while the head is incomplete
    pub fn from_raw(raw: &[u8]) -> Result<Option<Self>> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut res = httparse::Response::new(&mut headers);

        let offset = match res.parse(raw) {
            Ok(httparse::Status::Complete(offset)) => offset,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(e) => return Err(Error::other(format!("Malformed response: {}", e))),
        };

        Ok(Some(Self {
            status: res.code.unwrap_or(0),
            status_message: res.reason.unwrap_or("").to_string(),
            headers: collect_headers(res.headers),
            body: Bytes::copy_from_slice(&raw[offset..]),
        }))
    }
}

/// Externally visible request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestView {
    pub url: String,
    pub method: String,
    pub start_line: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestView {
    pub(crate) fn build(url: &str, parsed: &ParsedRequest) -> Self {
        Self {
            url: url.to_string(),
            method: parsed.method.clone(),
            start_line: format!("{} {} HTTP/{}", parsed.method, url, HTTP_VERSION),
            headers: header_map(&parsed.headers),
            body: parsed.body.clone(),
        }
    }
}

/// Externally visible response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseView {
    pub url: String,
    pub status: u16,
    pub status_message: String,
    pub start_line: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseView {
    pub(crate) fn build(url: &str, parsed: &ParsedResponse) -> Self {
        Self {
            url: url.to_string(),
            status: parsed.status,
            status_message: parsed.status_message.clone(),
            start_line: parsed.start_line(),
            headers: header_map(&parsed.headers),
            body: parsed.body.clone(),
        }
    }

    /// Content type, if any
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Strip control characters that could break wire framing
pub fn sanitize_header_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c == '\t' || !c.is_control())
        .collect()
}

/// Build a case-insensitive map; invalid names are dropped
pub fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();

    for (name, value) in headers {
        let name = match HeaderName::from_bytes(name.trim().as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::debug!(header = %name, "Dropping invalid header name");
                continue;
            }
        };

        match HeaderValue::from_str(&sanitize_header_value(value)) {
            Ok(value) => {
                map.append(name, value);
            }
            Err(_) => tracing::debug!(header = %name, "Dropping invalid header value"),
        }
    }

    map
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn collect_headers(headers: &[httparse::Header<'_>]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect()
}

fn encode_message(start_line: &str, headers: &[(String, String)], body: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(start_line.len() + body.len() + 256);
    raw.extend_from_slice(start_line.as_bytes());
    raw.extend_from_slice(b"\r\n");
    for (name, value) in headers {
        raw.extend_from_slice(name.as_bytes());
        raw.extend_from_slice(b": ");
        raw.extend_from_slice(sanitize_header_value(value).as_bytes());
        raw.extend_from_slice(b"\r\n");
    }
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(body);
    raw
}
