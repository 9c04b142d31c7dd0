// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Capture configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blocklist::{default_rules, Blocklist};
use crate::error::{Error, Result};

/// Which intercepter variant records traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntercepterKind {
    /// Browser-level event interception, no listening socket
    #[default]
    Direct,
    /// Local forwarding proxy recording raw bytes
    Forwarding,
}

impl std::str::FromStr for IntercepterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "directintercepter" => Ok(IntercepterKind::Direct),
            "forwarding" | "attesterproxy" | "proxy" => Ok(IntercepterKind::Forwarding),
            other => Err(Error::config(format!("Unknown intercepter: {}", other))),
        }
    }
}

/// Log verbosity requested for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Silent => "scoop=off",
            LogLevel::Trace => "scoop=trace",
            LogLevel::Debug => "scoop=debug",
            LogLevel::Info => "scoop=info",
            LogLevel::Warn => "scoop=warn",
            LogLevel::Error => "scoop=error",
        }
    }
}

/// Capture options
///
/// Timeouts are in milliseconds and sizes in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureOptions {
    pub log_level: LogLevel,

    /// Full-page screenshot attachment
    pub screenshot: bool,
    /// PDF snapshot attachment
    pub pdf_snapshot: bool,
    /// Rendered DOM attachment
    pub dom_snapshot: bool,
    /// Extract in-page video with yt-dlp
    pub capture_video_as_attachment: bool,
    /// Pull TLS certificates with crip
    pub capture_certificates_as_attachment: bool,
    /// Generate a provenance summary page
    pub provenance_summary: bool,
    /// Attachments ignore size and state gating
    pub attachments_bypass_limits: bool,

    pub capture_timeout: u64,
    pub load_timeout: u64,
    pub network_idle_timeout: u64,
    pub behaviors_timeout: u64,
    pub capture_video_as_attachment_timeout: u64,
    pub capture_certificates_as_attachment_timeout: u64,

    pub capture_window_x: u32,
    pub capture_window_y: u32,

    /// Byte budget for intercepted traffic
    pub max_capture_size: u64,

    pub auto_scroll: bool,
    pub auto_play_media: bool,
    pub grab_secondary_resources: bool,
    pub run_site_specific_behaviors: bool,

    pub headless: bool,
    /// Appended to the browser user agent
    pub user_agent_suffix: String,

    /// Raw blocklist rules
    pub blocklist: Vec<String>,

    pub intercepter: IntercepterKind,
    pub proxy_host: String,
    pub proxy_port: u16,
    /// Log every proxied request
    pub proxy_verbose: bool,

    pub public_ip_resolver_endpoint: String,
    pub yt_dlp_path: PathBuf,
    pub crip_path: PathBuf,
    /// Browser behaviors script injected before load
    pub behaviors_path: Option<PathBuf>,
    /// Parent of the capture-specific temporary folder
    pub tmp_folder_path: Option<PathBuf>,
    /// Keep the favicon out of page info
    pub exclude_favicon: bool,
    /// Write an exchange CSV here during teardown
    pub debug_log_path: Option<PathBuf>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            screenshot: true,
            pdf_snapshot: true,
            dom_snapshot: false,
            capture_video_as_attachment: true,
            capture_certificates_as_attachment: true,
            provenance_summary: true,
            attachments_bypass_limits: true,
            capture_timeout: 60 * 1000,
            load_timeout: 45 * 1000,
            network_idle_timeout: 20 * 1000,
            behaviors_timeout: 20 * 1000,
            capture_video_as_attachment_timeout: 30 * 1000,
            capture_certificates_as_attachment_timeout: 10 * 1000,
            capture_window_x: 1600,
            capture_window_y: 900,
            max_capture_size: 200 * 1024 * 1024,
            auto_scroll: true,
            auto_play_media: true,
            grab_secondary_resources: true,
            run_site_specific_behaviors: true,
            headless: true,
            user_agent_suffix: String::new(),
            blocklist: default_rules(),
            intercepter: IntercepterKind::Direct,
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: 9000,
            proxy_verbose: false,
            public_ip_resolver_endpoint: "https://icanhazip.com".to_string(),
            yt_dlp_path: PathBuf::from("./executables/yt-dlp"),
            crip_path: PathBuf::from("./executables/crip"),
            behaviors_path: None,
            tmp_folder_path: None,
            exclude_favicon: false,
            debug_log_path: None,
        }
    }
}

impl CaptureOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values a capture cannot run with
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("captureTimeout", self.capture_timeout),
            ("loadTimeout", self.load_timeout),
            ("networkIdleTimeout", self.network_idle_timeout),
            ("behaviorsTimeout", self.behaviors_timeout),
            (
                "captureVideoAsAttachmentTimeout",
                self.capture_video_as_attachment_timeout,
            ),
            (
                "captureCertificatesAsAttachmentTimeout",
                self.capture_certificates_as_attachment_timeout,
            ),
        ];

        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(Error::config(format!("{} must be greater than 0", name)));
        }

        if self.max_capture_size == 0 {
            return Err(Error::config("maxCaptureSize must be greater than 0"));
        }

        if self.capture_window_x == 0 || self.capture_window_y == 0 {
            return Err(Error::config("Capture window dimensions must be greater than 0"));
        }

        if self.proxy_host.is_empty() {
            return Err(Error::config("proxyHost cannot be empty"));
        }

        Blocklist::new(&self.blocklist)?;

        Ok(())
    }

    /// Whether the browser behaviors step is needed
    pub fn runs_behaviors(&self) -> bool {
        self.grab_secondary_resources
            || self.auto_play_media
            || self.run_site_specific_behaviors
            || self.auto_scroll
    }

    pub fn capture_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.capture_timeout)
    }

    pub fn load_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.load_timeout)
    }

    pub fn network_idle_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.network_idle_timeout)
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Enable/disable screenshot
    pub fn screenshot(mut self, enabled: bool) -> Self {
        self.screenshot = enabled;
        self
    }

    /// Enable/disable PDF snapshot
    pub fn pdf_snapshot(mut self, enabled: bool) -> Self {
        self.pdf_snapshot = enabled;
        self
    }

    /// Enable/disable DOM snapshot
    pub fn dom_snapshot(mut self, enabled: bool) -> Self {
        self.dom_snapshot = enabled;
        self
    }

    /// Enable/disable video extraction
    pub fn capture_video(mut self, enabled: bool) -> Self {
        self.capture_video_as_attachment = enabled;
        self
    }

    /// Enable/disable certificate capture
    pub fn capture_certificates(mut self, enabled: bool) -> Self {
        self.capture_certificates_as_attachment = enabled;
        self
    }

    /// Enable/disable provenance summary
    pub fn provenance_summary(mut self, enabled: bool) -> Self {
        self.provenance_summary = enabled;
        self
    }

    /// Exempt attachments from limits
    pub fn attachments_bypass_limits(mut self, bypass: bool) -> Self {
        self.attachments_bypass_limits = bypass;
        self
    }

    /// Disable every optional attachment step
    pub fn without_attachments(self) -> Self {
        self.screenshot(false)
            .pdf_snapshot(false)
            .dom_snapshot(false)
            .capture_video(false)
            .capture_certificates(false)
            .provenance_summary(false)
    }

    /// Set capture deadline
    pub fn capture_timeout(mut self, ms: u64) -> Self {
        self.capture_timeout = ms;
        self
    }

    /// Set navigation timeout
    pub fn load_timeout(mut self, ms: u64) -> Self {
        self.load_timeout = ms;
        self
    }

    /// Set network idle timeout
    pub fn network_idle_timeout(mut self, ms: u64) -> Self {
        self.network_idle_timeout = ms;
        self
    }

    /// Set byte budget
    pub fn max_capture_size(mut self, bytes: u64) -> Self {
        self.max_capture_size = bytes;
        self
    }

    /// Set capture window size
    pub fn window(mut self, width: u32, height: u32) -> Self {
        self.capture_window_x = width;
        self.capture_window_y = height;
        self
    }

    /// Toggle every browser behavior at once
    pub fn behaviors(mut self, enabled: bool) -> Self {
        self.auto_scroll = enabled;
        self.auto_play_media = enabled;
        self.grab_secondary_resources = enabled;
        self.run_site_specific_behaviors = enabled;
        self
    }

    /// Replace the blocklist
    pub fn blocklist<S: Into<String>>(mut self, rules: impl IntoIterator<Item = S>) -> Self {
        self.blocklist = rules.into_iter().map(Into::into).collect();
        self
    }

    /// Select intercepter
    pub fn intercepter(mut self, kind: IntercepterKind) -> Self {
        self.intercepter = kind;
        self
    }

    /// Set forwarding proxy address
    pub fn proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy_host = host.into();
        self.proxy_port = port;
        self
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set user agent suffix
    pub fn user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = suffix.into();
        self
    }

    /// Set external tool paths
    pub fn tools(mut self, yt_dlp: impl Into<PathBuf>, crip: impl Into<PathBuf>) -> Self {
        self.yt_dlp_path = yt_dlp.into();
        self.crip_path = crip.into();
        self
    }

    /// Set temporary folder parent
    pub fn tmp_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_folder_path = Some(path.into());
        self
    }

    /// Set public IP resolver
    pub fn public_ip_resolver(mut self, endpoint: impl Into<String>) -> Self {
        self.public_ip_resolver_endpoint = endpoint.into();
        self
    }

    /// Write an exchange CSV during teardown
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log_path = Some(path.into());
        self
    }

    /// Options as recorded in provenance (tool paths removed)
    pub fn provenance_snapshot(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("ytDlpPath");
            map.remove("cripPath");
        }
        value
    }
}
