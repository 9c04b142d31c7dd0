// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Step bodies producing metadata and generated attachments

use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use url::Url;

use super::html::{render_provenance_summary, render_video_summary, VideoSummary};
use super::provenance::{Certificate, PageInfo, UNKNOWN};
use super::summary::{
    DOM_SNAPSHOT_FILE, PDF_SNAPSHOT_FILE, PROVENANCE_SUMMARY_FILE, SCREENSHOT_FILE,
    VIDEO_METADATA_FILE, VIDEO_SUMMARY_FILE,
};
use super::{Capture, CaptureState};
use crate::browser::{scripts, Page, PdfOptions};
use crate::error::{Error, Result};
use crate::exchange::{ParsedRequest, ParsedResponse};
use crate::tools;

lazy_static! {
    static ref YT_DLP_VERSION: Regex = Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").unwrap();
    static ref SUBTITLE_LOCALE: Regex = Regex::new(r"^[a-z]{2}(-[A-Z]{2})?$").unwrap();
}

const TOOL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const FAVICON_TIMEOUT: Duration = Duration::from_secs(1);
const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(3);
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

const VIDEO_PREFIX: &str = "video-extracted-";
const MAX_REDIRECTS: usize = 10;

fn content_type(value: &str) -> Vec<(String, String)> {
    vec![("content-type".to_string(), value.to_string())]
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
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

/// Next hop when `response` is a redirect with a usable location
fn redirect_target(from: &Url, response: &reqwest::Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| from.join(v).ok())
}

fn file_url(name: &str) -> String {
    format!("file:///{}", name)
}

impl Capture {
    /// Client for requests made outside of the browser
    ///
    /// Goes through the attester forward proxy when there is one.
    fn out_of_band_client(&self, timeout: Duration, follow_redirects: bool) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(self.provenance.user_agent.clone())
            .timeout(timeout)
            .danger_accept_invalid_certs(self.launch.proxy.is_some());

        if !follow_redirects {
            builder = builder.redirect(Policy::none());
        }

        builder = match &self.launch.proxy {
            Some(settings) => {
                let mut proxy = Proxy::all(settings.url())?;
                if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
                    proxy = proxy.basic_auth(user, pass);
                }
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        Ok(builder.build()?)
    }

    fn tmp_path(&self) -> Result<PathBuf> {
        self.tmp_dir
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| Error::other("Capture temporary folder is not available"))
    }

    /// HEAD the target; fetch and record it directly when it is not HTML
    pub(super) async fn detect_and_capture_non_web_content(&mut self) -> Result<()> {
        let head_timeout = (self.options.capture_timeout_duration() / 10).max(MIN_TIMEOUT);
        let started = Instant::now();

        let head = match self.head_target(head_timeout).await {
            Ok(Some(response)) => response,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::trace!(error = %e, "HEAD request failed");
                tracing::warn!("Resource type detection failed - skipping");
                return Ok(());
            }
        };

        self.target_url_resolved = head.url().clone();
        let content_length = head
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let content_type = match head
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            Some(ct) => ct.to_string(),
            None => {
                tracing::info!("Requested URL is assumed to be a web page (no content-type found)");
                return Ok(());
            }
        };
        self.target_url_content_type = Some(content_type.clone());

        if content_type.starts_with("text/html") {
            tracing::info!("Requested URL is a web page");
            return Ok(());
        }

        self.target_url_is_web_page = false;
        tracing::warn!("Requested URL is not a web page (detected: {})", content_type);
        tracing::info!("Attempting to capture this resource out-of-browser");

        let remaining = self
            .options
            .capture_timeout_duration()
            .saturating_sub(started.elapsed())
            .max(MIN_TIMEOUT);

        if let Err(e) = self.fetch_out_of_band(remaining).await {
            tracing::debug!(error = %e, "Out-of-browser capture failed");
        }

        let exchanges = self.ledger.exchanges();
        match exchanges.first() {
            Some(exchange) => {
                let captured = exchange.response().map(|r| r.body.len() as u64).unwrap_or(0);
                match content_length {
                    Some(expected) if expected == captured => {
                        tracing::info!("Resource fully captured ({} bytes)", captured)
                    }
                    Some(expected) => tracing::warn!(
                        "Resource partially captured ({} of {} bytes)",
                        captured,
                        expected
                    ),
                    None => tracing::info!("Resource captured ({} bytes)", captured),
                }
                self.shared.state.transition(CaptureState::Partial);
            }
            None => tracing::warn!("Resource could not be captured"),
        }

        Ok(())
    }

    /// HEAD the target, following redirects the blocklist allows
    ///
    /// `None` when a hop is blocked; the browser then meets the block itself.
    async fn head_target(&self, timeout: Duration) -> Result<Option<reqwest::Response>> {
        let client = self.out_of_band_client(timeout, false)?;
        let mut url = self.url.clone();

        for _ in 0..=MAX_REDIRECTS {
            if let Some(blocked) = self.ledger.check_blocklist(&url).await {
                tracing::warn!(
                    "Resource type detection stopped at {} (blocklist rule {})",
                    blocked.candidate,
                    blocked.rule
                );
                return Ok(None);
            }

            let response = client.head(url.clone()).send().await?;
            match redirect_target(&url, &response) {
                Some(next) => url = next,
                None => return Ok(Some(response)),
            }
        }

        Err(Error::other("Too many redirects"))
    }

    /// GET the target outside of the browser and record the exchange
    ///
    /// Every hop of a redirect chain is checked against the blocklist. A
    /// blocked hop is recorded with its 403 answer and ends the chain.
    async fn fetch_out_of_band(&self, timeout: Duration) -> Result<()> {
        let client = self.out_of_band_client(timeout, false)?;
        let mut url = self.url.clone();

        for _ in 0..=MAX_REDIRECTS {
            let mut request = ParsedRequest::new("GET", url.as_str())
                .header("user-agent", self.provenance.user_agent.clone());
            self.shared
                .custom_headers
                .apply(crate::headers::HeaderScope::Request, &mut request.headers);

            if let Some(blocked) = self.ledger.check_blocklist(&url).await {
                let answer = self.ledger.block(blocked);
                let parsed = ParsedResponse {
                    status: answer.status,
                    status_message: answer.status_text,
                    headers: answer.headers,
                    body: answer.body,
                };
                return self.ledger.record_out_of_band(request, parsed);
            }

            let mut builder = client.get(url.clone());
            for (name, value) in &request.headers {
                if !name.eq_ignore_ascii_case(USER_AGENT.as_str()) {
                    builder = builder.header(name.as_str(), value.as_str());
                }
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = header_pairs(response.headers());
            let next = redirect_target(&url, &response);
            let body = response.bytes().await?;

            let parsed = ParsedResponse {
                status: status.as_u16(),
                status_message: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            };
            self.ledger.record_out_of_band(request, parsed)?;

            match next {
                Some(next) => url = next,
                None => return Ok(()),
            }
        }

        Err(Error::other("Too many redirects"))
    }

    /// Read title, description and favicon of the loaded page
    pub(super) async fn capture_page_info(&mut self, page: &dyn Page) -> Result<()> {
        let value = page.evaluate(scripts::PAGE_INFO).await?;
        let mut info = PageInfo::from_value(&value);

        if self.options.exclude_favicon {
            tracing::info!("Favicon capture is disabled");
            self.page_info = Some(info);
            return Ok(());
        }

        if let Some(favicon_url) = info.http_favicon_url().map(str::to_string) {
            info.favicon = self.find_intercepted_body(&favicon_url);

            if info.favicon.is_none() && self.options.headless {
                match self.fetch_favicon(&favicon_url).await {
                    Ok(body) => info.favicon = Some(body),
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not fetch favicon at url {}.", favicon_url)
                    }
                }
            }
        }

        self.page_info = Some(info);
        Ok(())
    }

    fn find_intercepted_body(&self, url: &str) -> Option<Bytes> {
        self.ledger
            .exchanges()
            .iter()
            .filter(|ex| ex.url().map(|u| u.as_str() == url).unwrap_or(false))
            .filter_map(|ex| ex.response().map(|r| r.body.clone()))
            .filter(|body| !body.is_empty())
            .last()
    }

    /// Favicon bytes, kept as metadata only
    ///
    /// Redirects are not followed.
    async fn fetch_favicon(&self, url: &str) -> Result<Bytes> {
        let url = Url::parse(url)?;
        if let Some(blocked) = self.ledger.check_blocklist(&url).await {
            let rule = blocked.rule.clone();
            self.ledger.block(blocked);
            return Err(Error::other(format!("Favicon blocked by rule {}", rule)));
        }

        let response = self
            .out_of_band_client(FAVICON_TIMEOUT, false)?
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        if response.status().is_redirection() {
            return Err(Error::other(format!("Favicon redirected ({})", response.status())));
        }
        Ok(response.bytes().await?)
    }

    pub(super) async fn take_screenshot(&mut self, page: &dyn Page) -> Result<()> {
        let body = page.screenshot().await?;
        let description = format!("Capture Time Screenshot of {}", self.url);
        self.add_generated_exchange(
            &file_url(SCREENSHOT_FILE),
            content_type("image/png"),
            body,
            true,
            &description,
        );
        Ok(())
    }

    pub(super) async fn take_dom_snapshot(&mut self, page: &dyn Page) -> Result<()> {
        let body = page.content().await?;
        let mut headers = content_type("text/html");
        headers.push(("content-disposition".to_string(), "Attachment".to_string()));
        let description = format!("Capture Time DOM Snapshot of {}", self.url);
        self.add_generated_exchange(
            &file_url(DOM_SNAPSHOT_FILE),
            headers,
            body,
            true,
            &description,
        );
        Ok(())
    }

    /// Single-page PDF sized to the document
    pub(super) async fn take_pdf_snapshot(&mut self, page: &dyn Page) -> Result<()> {
        let dimensions = page.evaluate(scripts::DOCUMENT_DIMENSIONS).await?;
        let dimension = |name: &str, fallback: u32| {
            dimensions
                .get(name)
                .and_then(|v| v.as_f64())
                .map(|v| v.ceil() as u32)
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };

        let options = PdfOptions::new(
            dimension("width", self.options.capture_window_x),
            dimension(
                "height",
                self.options.capture_window_y + scripts::PDF_HEIGHT_PADDING,
            ),
        );

        let body = page.pdf(&options).await?;
        let description = format!("Capture Time PDF Snapshot of {}", self.url);
        self.add_generated_exchange(
            &file_url(PDF_SNAPSHOT_FILE),
            content_type("application/pdf"),
            body,
            true,
            &description,
        );
        Ok(())
    }

    /// Pull in-page videos, subtitles and metadata with yt-dlp
    pub(super) async fn capture_video_as_attachment(&mut self) -> Result<()> {
        let yt_dlp = self.options.yt_dlp_path.clone();
        let tmp = self.tmp_path()?;

        if let Err(e) = tools::probe_version(&yt_dlp, &YT_DLP_VERSION, TOOL_PROBE_TIMEOUT).await {
            tracing::trace!(error = %e, "yt-dlp health check failed");
            return Err(Error::external_tool(
                "yt-dlp",
                "\"yt-dlp\" executable is not available or cannot be executed.",
            ));
        }

        let mut args = vec![
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--write-subs".to_string(),
            "--sub-langs".to_string(),
            "all".to_string(),
            "--format".to_string(),
            "mp4".to_string(),
            "--output".to_string(),
            tmp.join(format!("{}%(autonumber)d.mp4", VIDEO_PREFIX))
                .display()
                .to_string(),
            "--no-check-certificate".to_string(),
        ];
        if let Some(proxy) = self.intercepter.browser_proxy().or_else(|| self.launch.proxy.clone()) {
            args.push("--proxy".to_string());
            args.push(proxy.url());
        }
        args.push(self.url.to_string());

        let was_recording = self.ledger.is_recording();
        self.ledger.set_recording(false);
        let timeout = Duration::from_millis(self.options.capture_video_as_attachment_timeout);
        let result = tools::execute(&yt_dlp, &args, timeout).await;
        self.ledger
            .set_recording(was_recording && self.shared.state.is(CaptureState::Capture));

        let metadata_raw = result.map_err(|e| {
            tracing::trace!(error = %e, "yt-dlp failed");
            Error::external_tool("yt-dlp", format!("No video found in {}.", self.url))
        })?;

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&tmp).await?;
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        files.sort();

        let mut videos: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut video_saved = false;
        let mut subtitles_saved = false;

        for file in files.iter().filter(|f| f.starts_with(VIDEO_PREFIX)) {
            if let Some(stem) = file.strip_suffix(".mp4") {
                let body = match tokio::fs::read(tmp.join(file)).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(error = %e, "Error while creating exchange for {}.", file);
                        continue;
                    }
                };
                if self.add_generated_exchange(&file_url(file), content_type("video/mp4"), body, false, "") {
                    video_saved = true;
                    videos.entry(stem.to_string()).or_default();
                }
            } else if let Some(name) = file.strip_suffix(".vtt") {
                let mut parts = name.splitn(2, '.');
                let (stem, locale) = match (parts.next(), parts.next()) {
                    (Some(stem), Some(locale)) if SUBTITLE_LOCALE.is_match(locale) => (stem, locale),
                    _ => continue,
                };

                let body = match tokio::fs::read(tmp.join(file)).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(error = %e, "Error while creating exchange for {}.", file);
                        continue;
                    }
                };
                if self.add_generated_exchange(&file_url(file), content_type("text/vtt"), body, false, "") {
                    subtitles_saved = true;
                    videos
                        .entry(stem.to_string())
                        .or_default()
                        .push(locale.to_string());
                }
            }
        }

        let metadata: Vec<serde_json::Value> = metadata_raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable yt-dlp metadata line");
                    None
                }
            })
            .collect();

        let metadata_saved = match serde_json::to_vec_pretty(&metadata) {
            Ok(body) => self.add_generated_exchange(
                &file_url(VIDEO_METADATA_FILE),
                content_type("application/json"),
                body,
                false,
                "",
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Error while creating exchange for {}.", VIDEO_METADATA_FILE);
                false
            }
        };

        let html = render_video_summary(&VideoSummary {
            url: self.url.as_str(),
            now: Utc::now(),
            video_saved,
            metadata_saved,
            subtitles_saved,
            videos,
            metadata: &metadata,
        });
        let description = format!("Extracted Video data from: {}", self.url);
        self.add_generated_exchange(
            &file_url(VIDEO_SUMMARY_FILE),
            content_type("text/html"),
            html,
            true,
            &description,
        );

        Ok(())
    }

    /// Pull the certificate of every https host seen during the capture
    pub(super) async fn capture_certificates_as_attachment(&mut self) -> Result<()> {
        let crip = self.options.crip_path.clone();
        let step_timeout =
            Duration::from_millis(self.options.capture_certificates_as_attachment_timeout);
        let deadline = Instant::now() + step_timeout;

        if let Err(e) = tools::execute(&crip, &[] as &[&str], TOOL_PROBE_TIMEOUT).await {
            tracing::trace!(error = %e, "crip health check failed");
            return Err(Error::external_tool(
                "crip",
                "\"crip\" executable is not available or cannot be executed.",
            ));
        }

        let mut seen = HashSet::new();
        let hosts: Vec<String> = self
            .ledger
            .exchanges()
            .iter()
            .filter_map(|ex| ex.url())
            .filter(|url| url.scheme() == "https")
            .filter_map(|url| {
                let host = url.host_str()?;
                Some(match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                })
            })
            .filter(|host| seen.insert(host.clone()))
            .collect();

        let mut processed = 0u32;
        for host in hosts {
            if Instant::now() >= deadline {
                return Err(Error::timeout(
                    "certificate capture",
                    step_timeout.as_millis() as u64,
                ));
            }

            let origin = format!("https://{}", host);
            if self.shared.blocklist.find_match(&origin).is_some() {
                tracing::warn!(
                    "{} matched against blocklist - skipped trying to pull its certificate.",
                    host
                );
                continue;
            }

            let timeout = if processed > 0 {
                (step_timeout / processed).max(MIN_TIMEOUT)
            } else {
                step_timeout.max(MIN_TIMEOUT)
            };
            processed += 1;

            let pem = match tools::execute(&crip, &["print", "-u", origin.as_str(), "-f", "pem"], timeout).await {
                Ok(pem) if !pem.trim().is_empty() => pem,
                Ok(_) | Err(_) => {
                    tracing::warn!("Certificates could not be extracted for {}", host);
                    continue;
                }
            };

            self.add_generated_exchange(
                &file_url(&format!("{}.pem", host)),
                content_type("application/x-pem-file"),
                pem.clone(),
                false,
                "",
            );
            self.provenance.certificates.push(Certificate { host, pem });
        }

        Ok(())
    }

    /// Fill provenance info and render the provenance summary page
    pub(super) async fn capture_provenance_info(&mut self) -> Result<()> {
        self.provenance.capture_ip = match self.resolve_public_ip().await {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Public IP address could not be found.");
                UNKNOWN.to_string()
            }
        };

        self.provenance.yt_dlp_hash = match tools::sha256_file(&self.options.yt_dlp_path).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Could not compute SHA256 hash of yt-dlp executable");
                String::new()
            }
        };

        self.provenance.crip_hash = match tools::sha256_file(&self.options.crip_path).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(error = %e, "Could not compute SHA256 hash of crip executable");
                String::new()
            }
        };

        self.provenance.blocked_requests = self.shared.blocked_requests();
        self.provenance.options = self.options.provenance_snapshot();

        let html = render_provenance_summary(
            &self.provenance,
            self.url.as_str(),
            self.started_at.unwrap_or_else(Utc::now),
        );
        self.add_generated_exchange(
            &file_url(PROVENANCE_SUMMARY_FILE),
            content_type("text/html"),
            html,
            true,
            "Provenance Summary",
        );

        Ok(())
    }

    async fn resolve_public_ip(&self) -> Result<IpAddr> {
        let client = Client::builder().timeout(PUBLIC_IP_TIMEOUT).build()?;
        let text = client
            .get(&self.options.public_ip_resolver_endpoint)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let ip = text.trim();
        ip.parse::<IpAddr>()
            .map_err(|_| Error::other(format!("{} is not a valid IP address.", ip)))
    }
}
