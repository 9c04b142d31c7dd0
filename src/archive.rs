// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Archive writer interface
//!
//! Writers turn a finished capture into bytes. WARC and WACZ writers live
//! outside this crate; [`JsonArchiveWriter`] is a self-describing format
//! useful for inspection and tests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::HeaderMap;
use serde::Serialize;

use crate::capture::CaptureSummary;
use crate::error::Result;
use crate::exchange::Exchange;

/// What a writer receives
#[derive(Debug, Clone, Copy)]
pub struct ArchiveInput<'a> {
    /// Exchanges in capture order, generated ones last
    pub exchanges: &'a [Exchange],
    pub summary: &'a CaptureSummary,
}

/// Serializes a finished capture
pub trait ArchiveWriter: Send + Sync {
    /// Short format name, e.g. `json`
    fn format(&self) -> &'static str;

    fn write(&self, input: &ArchiveInput<'_>) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMessage {
    start_line: String,
    headers: Vec<(String, String)>,
    /// Base64
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExchange<'a> {
    url: Option<&'a str>,
    is_entry_point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    request: Option<JsonMessage>,
    response: Option<JsonMessage>,
}

#[derive(Serialize)]
struct JsonArchive<'a> {
    summary: &'a CaptureSummary,
    exchanges: Vec<JsonExchange<'a>>,
}

fn header_list(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Summary plus every exchange, bodies base64-encoded
#[derive(Debug, Clone, Default)]
pub struct JsonArchiveWriter {
    pretty: bool,
}

impl JsonArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent the output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl ArchiveWriter for JsonArchiveWriter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn write(&self, input: &ArchiveInput<'_>) -> Result<Vec<u8>> {
        let exchanges = input
            .exchanges
            .iter()
            .map(|exchange| JsonExchange {
                url: exchange.url(),
                is_entry_point: exchange.is_entry_point(),
                description: exchange.description().filter(|d| !d.is_empty()),
                request: exchange.request().map(|request| JsonMessage {
                    start_line: request.start_line.clone(),
                    headers: header_list(&request.headers),
                    body: STANDARD.encode(&request.body),
                }),
                response: exchange.response().map(|response| JsonMessage {
                    start_line: response.start_line.clone(),
                    headers: header_list(&response.headers),
                    body: STANDARD.encode(&response.body),
                }),
            })
            .collect();

        let archive = JsonArchive {
            summary: input.summary,
            exchanges,
        };

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&archive)?
        } else {
            serde_json::to_vec(&archive)?
        };
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Attachments, CaptureState};
    use crate::config::CaptureOptions;
    use crate::exchange::{GeneratedExchange, ParsedRequest, ParsedResponse, ProxyExchange};

    fn summary() -> CaptureSummary {
        CaptureSummary {
            id: uuid::Uuid::new_v4(),
            state: CaptureState::Complete,
            target_url: "https://example.com/".to_string(),
            target_url_resolved: "https://example.com/".to_string(),
            target_url_is_web_page: true,
            target_url_content_type: Some("text/html".to_string()),
            started_at: None,
            options: CaptureOptions::default(),
            exchange_urls: vec!["https://example.com/".to_string()],
            attachments: Attachments::default(),
            provenance_info: None,
            page_info: None,
        }
    }

    #[test]
    fn test_json_writer() {
        let mut page =
            ProxyExchange::from_request(ParsedRequest::new("GET", "https://example.com/")).unwrap();
        page.set_response_parsed(
            ParsedResponse::new(200, "OK")
                .header("content-type", "text/html")
                .body("<html></html>"),
        );
        let screenshot = GeneratedExchange::new(
            "file:///screenshot.png",
            vec![("content-type".to_string(), "image/png".to_string())],
            vec![1u8, 2, 3],
            true,
            "Capture Time Screenshot of https://example.com/",
        )
        .unwrap();

        let exchanges = vec![page.into(), screenshot.into()];
        let summary = summary();
        let writer = JsonArchiveWriter::new();
        assert_eq!(writer.format(), "json");

        let bytes = writer
            .write(&ArchiveInput {
                exchanges: &exchanges,
                summary: &summary,
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["summary"]["state"], "COMPLETE");
        let items = value["exchanges"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["response"]["startLine"], "HTTP/1.1 200 OK");
        assert_eq!(items[0]["response"]["body"], STANDARD.encode("<html></html>"));
        assert!(items[1]["request"].is_null());
        assert_eq!(items[1]["isEntryPoint"], true);
    }
}
