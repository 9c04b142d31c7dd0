// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Generated exchange: an artifact produced by the capture itself

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use super::message::{ParsedResponse, ResponseView};
use crate::error::{Error, Result};

/// Screenshot, snapshot, extracted media or summary page
#[derive(Debug, Clone)]
pub struct GeneratedExchange {
    url: Url,
    description: String,
    is_entry_point: bool,
    response: ResponseView,
    created_at: DateTime<Utc>,
}

impl GeneratedExchange {
    /// Build from headers and body; the url must use the `file:///` scheme
    pub fn new(
        url: &str,
        headers: Vec<(String, String)>,
        body: impl Into<Bytes>,
        is_entry_point: bool,
        description: impl Into<String>,
    ) -> Result<Self> {
        let url = Url::parse(url)?;
        if url.scheme() != "file" {
            return Err(Error::invalid_input(format!(
                "Generated exchanges must use file:/// urls, got {}",
                url
            )));
        }

        let parsed = ParsedResponse {
            status: 200,
            status_message: "OK".to_string(),
            headers,
            body: body.into(),
        };

        Ok(Self {
            response: ResponseView::build(url.as_str(), &parsed),
            url,
            description: description.into(),
            is_entry_point,
            created_at: Utc::now(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// File name, without the `file:///` prefix
    pub fn filename(&self) -> &str {
        self.url.path().trim_start_matches('/')
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_entry_point(&self) -> bool {
        self.is_entry_point
    }

    pub fn response(&self) -> &ResponseView {
        &self.response
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
