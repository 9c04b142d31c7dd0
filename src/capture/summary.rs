// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Serializable capture summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provenance::{PageInfo, ProvenanceInfo};
use super::state::CaptureState;
use crate::config::CaptureOptions;

pub const PROVENANCE_SUMMARY_FILE: &str = "provenance-summary.html";
pub const SCREENSHOT_FILE: &str = "screenshot.png";
pub const PDF_SNAPSHOT_FILE: &str = "pdf-snapshot.pdf";
pub const DOM_SNAPSHOT_FILE: &str = "dom-snapshot.html";
pub const VIDEO_SUMMARY_FILE: &str = "video-extracted-summary.html";
pub const VIDEO_METADATA_FILE: &str = "video-extracted-metadata.json";

/// Generated attachment file names, by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_extracted_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_extracted_metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video_extracted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video_extracted_subtitles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
}

impl Attachments {
    /// Classify generated exchange file names
    pub fn from_filenames<'a>(filenames: impl IntoIterator<Item = &'a str>) -> Self {
        let mut attachments = Self::default();

        for filename in filenames {
            let owned = Some(filename.to_string());
            match filename {
                PROVENANCE_SUMMARY_FILE => attachments.provenance_summary = owned,
                SCREENSHOT_FILE => attachments.screenshot = owned,
                PDF_SNAPSHOT_FILE => attachments.pdf_snapshot = owned,
                DOM_SNAPSHOT_FILE => attachments.dom_snapshot = owned,
                VIDEO_SUMMARY_FILE => attachments.video_extracted_summary = owned,
                VIDEO_METADATA_FILE => attachments.video_extracted_metadata = owned,
                name if name.ends_with(".mp4") => attachments.video_extracted.push(name.to_string()),
                name if name.ends_with(".vtt") => {
                    attachments.video_extracted_subtitles.push(name.to_string())
                }
                name if name.ends_with(".pem") => attachments.certificates.push(name.to_string()),
                _ => {}
            }
        }

        attachments
    }
}

/// Summary of a finished capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub id: Uuid,
    pub state: CaptureState,
    pub target_url: String,
    pub target_url_resolved: String,
    pub target_url_is_web_page: bool,
    pub target_url_content_type: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub options: CaptureOptions,
    pub exchange_urls: Vec<String>,
    pub attachments: Attachments,
    /// Only present when the provenance summary was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_info: Option<ProvenanceInfo>,
    pub page_info: Option<PageInfo>,
}
