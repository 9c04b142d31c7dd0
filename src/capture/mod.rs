// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Capture controller
//!
//! A [`Capture`] drives one browser page against one target url. It runs an
//! ordered list of steps under a capture-wide deadline, keeps the state
//! machine moving forward, and merges intercepted traffic with the
//! attachments it generated itself.
//!
//! ```rust,no_run
//! use scoop::{Capture, CaptureOptions};
//!
//! #[tokio::main]
//! async fn main() -> scoop::Result<()> {
//!     let capture = Capture::capture("https://example.com", CaptureOptions::default(), None).await?;
//!     println!("{}", capture.state());
//!     Ok(())
//! }
//! ```

mod attachments;
mod html;
mod provenance;
mod shared;
mod state;
mod steps;
mod summary;

pub use html::{escape, render_provenance_summary, render_video_summary, VideoSummary};
pub use provenance::{Certificate, PageInfo, ProvenanceInfo, UNKNOWN};
pub use shared::CaptureShared;
pub use state::{CaptureState, StateCell};
pub use steps::{build_steps, CaptureStep, StepKind};
pub use summary::{Attachments, CaptureSummary};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::archive::{ArchiveInput, ArchiveWriter};
use crate::attester::{load_attester, AttesterOptions};
use crate::blocklist::Blocklist;
use crate::browser::{
    scripts, Browser, BrowserLauncher, HttpBrowserLauncher, LaunchOptions, Page, PageOptions,
    Viewport, BLANK_PAGE, DEFAULT_USER_AGENT,
};
use crate::config::{CaptureOptions, IntercepterKind};
use crate::debug_kit;
use crate::error::{Error, ErrorContext, Result};
use crate::exchange::{Exchange, GeneratedExchange};
use crate::intercepter::{create_intercepter, ExchangeLedger, Intercepter};

/// Cadence of the per-step state check
const STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for the scroll-up step
const SCROLL_UP_TIMEOUT: Duration = Duration::from_millis(2500);

/// Check that `raw` is an http(s) url outside the blocklist
///
/// Returns the normalized absolute url.
pub fn filter_url(raw: &str, blocklist: &Blocklist) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        tracing::error!("Invalid url provided: {}", e);
        Error::invalid_input(format!("Invalid URL provided: {}", raw))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        tracing::error!(scheme = url.scheme(), "Invalid protocol.");
        return Err(Error::invalid_input(format!("Invalid URL provided: {}", raw)));
    }

    if let Some(blocked) = blocklist.check_url(&url) {
        tracing::error!(
            "Blocked url provided matching blocklist rule: {}",
            blocked.rule
        );
        return Err(Error::invalid_input(format!(
            "Invalid URL provided: {} matches blocklist rule {}",
            raw, blocked.rule
        )));
    }

    Ok(url)
}

/// A single-page capture
pub struct Capture {
    id: Uuid,
    url: Url,
    options: CaptureOptions,
    launch: LaunchOptions,
    shared: Arc<CaptureShared>,
    ledger: Arc<ExchangeLedger>,
    intercepter: Box<dyn Intercepter>,
    launcher: Arc<dyn BrowserLauncher>,

    started_at: Option<DateTime<Utc>>,
    target_url_resolved: Url,
    target_url_content_type: Option<String>,
    target_url_is_web_page: bool,
    page_info: Option<PageInfo>,
    provenance: ProvenanceInfo,

    /// Attachments produced during the run
    generated: Vec<GeneratedExchange>,
    /// Final list, filled at teardown
    exchanges: Vec<Exchange>,

    tmp_dir: Option<TempDir>,
    browser: Option<Arc<dyn Browser>>,
    page: Option<Arc<dyn Page>>,
    deadline: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .field("exchanges", &self.exchanges.len())
            .finish()
    }
}

impl Capture {
    /// Prepare a capture of `url`
    ///
    /// Fails with [`Error::InvalidInput`] before allocating anything when the
    /// url is unusable.
    pub fn new(
        url: &str,
        options: CaptureOptions,
        attester: Option<AttesterOptions>,
    ) -> Result<Self> {
        options.validate()?;

        let blocklist = Blocklist::new(&options.blocklist)?;
        let url = filter_url(url, &blocklist)?;

        let shared = Arc::new(CaptureShared::new(blocklist));
        let mut launch = LaunchOptions {
            headless: options.headless,
            proxy: None,
        };

        if let Some(attester_options) = attester {
            let attester = load_attester(&attester_options)?;
            attester.configure_forward_proxy(&mut launch);
            attester.add_custom_headers(&shared.custom_headers);
            tracing::debug!(attester = attester.attester_type(), "Attester loaded");
        }

        let ledger = Arc::new(ExchangeLedger::new(
            options.max_capture_size,
            Arc::clone(&shared),
        ));
        let intercepter = create_intercepter(&options, Arc::clone(&ledger), launch.proxy.clone());

        let provenance = ProvenanceInfo {
            options: options.provenance_snapshot(),
            ..Default::default()
        };

        Ok(Self {
            id: Uuid::new_v4(),
            target_url_resolved: url.clone(),
            url,
            options,
            launch,
            shared,
            ledger,
            intercepter,
            launcher: Arc::new(HttpBrowserLauncher),
            started_at: None,
            target_url_content_type: None,
            target_url_is_web_page: true,
            page_info: None,
            provenance,
            generated: Vec::new(),
            exchanges: Vec::new(),
            tmp_dir: None,
            browser: None,
            page: None,
            deadline: None,
        })
    }

    /// Use another browser backend
    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Create and run a capture with the built-in HTTP backend
    pub async fn capture(
        url: &str,
        options: CaptureOptions,
        attester: Option<AttesterOptions>,
    ) -> Result<Self> {
        let mut capture = Self::new(url, options, attester)?;
        capture.run().await;
        Ok(capture)
    }

    /// Create and run a capture with `launcher`
    pub async fn capture_with(
        url: &str,
        options: CaptureOptions,
        attester: Option<AttesterOptions>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<Self> {
        let mut capture = Self::new(url, options, attester)?.with_launcher(launcher);
        capture.run().await;
        Ok(capture)
    }

    /// Run every step; the capture always ends in a terminal state
    pub async fn run(&mut self) {
        if self.state() != CaptureState::Init {
            tracing::warn!(state = %self.state(), "Capture already ran");
            return;
        }

        let steps = build_steps(&self.options);

        let page = match self.setup().await {
            Ok(page) => {
                tracing::info!(
                    version = crate::VERSION,
                    options = %self.provenance.options,
                    "{} was initialized",
                    crate::SOFTWARE
                );
                tracing::info!(url = %self.url, "Starting capture of {}", self.url);
                self.shared.state.transition(CaptureState::Capture);
                page
            }
            Err(e) => {
                tracing::error!(error = %e, "An error occurred during capture setup");
                self.shared.state.transition(CaptureState::Failed);
                self.shutdown().await;
                self.finalize();
                return;
            }
        };

        for step in steps.iter().filter(|s| s.kind.has_setup()) {
            if let Err(e) = self.setup_step(step.kind, &page).await {
                tracing::warn!(step = step.name(), error = %e, "Step setup failed");
            }
        }

        let total = steps.len();
        for (i, step) in steps.iter().enumerate() {
            let position = i + 1;

            if let Some(reason) = self.hard_interrupt(i, page.as_ref()) {
                tracing::error!("{}", reason);
                self.shared.state.transition(CaptureState::Failed);
                break;
            }

            let mut should_run = self.shared.state.is(CaptureState::Capture) || step.always_run;
            if !self.target_url_is_web_page && step.web_page_only {
                should_run = false;
            }

            if !should_run {
                tracing::warn!("STEP [{}/{}]: {} (skipped)", position, total, step.name());
                continue;
            }

            tracing::info!("STEP [{}/{}]: {}", position, total, step.name());

            if let Err(e) = self.race_step(*step).await {
                if self.shared.state.is(CaptureState::Partial) {
                    tracing::info!(
                        error = %e,
                        "STEP [{}/{}]: {} - ended due to max time or size reached.",
                        position,
                        total,
                        step.name()
                    );
                } else {
                    tracing::warn!(
                        error = %e,
                        "STEP [{}/{}]: {} - failed",
                        position,
                        total,
                        step.name()
                    );
                }
            }
        }

        // Pending network events may still trip the size limit
        self.shutdown().await;
        self.shared.state.transition(CaptureState::Complete);
        self.finalize();
    }

    /// Start intercepter and browser; returns the capture page
    async fn setup(&mut self) -> Result<Arc<dyn Page>> {
        self.started_at = Some(Utc::now());
        self.shared.state.transition(CaptureState::Setup);

        let base = self
            .options
            .tmp_folder_path
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        tokio::fs::create_dir_all(&base)
            .await
            .map_err(|e| Error::setup(format!("Base temporary folder {} unusable: {}", base.display(), e)))?;

        let tmp_dir = tempfile::Builder::new()
            .prefix("capture-")
            .tempdir_in(&base)
            .map_err(|e| {
                Error::setup(format!(
                    "Unable to create a capture-specific temporary folder: {}",
                    e
                ))
            })?;
        tracing::info!(path = %tmp_dir.path().display(), "Capture-specific temporary folder created");
        self.tmp_dir = Some(tmp_dir);

        self.intercepter.setup().await?;

        let user_agent = format!("{}{}", DEFAULT_USER_AGENT, self.options.user_agent_suffix);
        tracing::info!("User Agent used for capture: {}", user_agent);
        self.provenance.user_agent = user_agent.clone();

        let browser = self
            .launcher
            .launch(&self.launch)
            .await
            .map_err(|e| Error::setup(format!("Browser launch failed: {}", e)))?;
        self.browser = Some(Arc::clone(&browser));

        let viewport = Viewport::new(self.options.capture_window_x, self.options.capture_window_y);
        let page = browser
            .new_page(PageOptions {
                user_agent,
                proxy: self.intercepter.browser_proxy(),
                ignore_https_errors: self.launch.proxy.is_some()
                    || self.options.intercepter == IntercepterKind::Forwarding,
                viewport,
            })
            .await
            .map_err(|e| Error::setup(format!("Page could not be opened: {}", e)))?;
        self.page = Some(Arc::clone(&page));

        page.set_viewport(viewport).await?;

        self.deadline = Some(self.arm_deadline());
        self.intercepter.setup_page(Arc::clone(&page)).await?;

        Ok(page)
    }

    /// Timer demoting the capture to PARTIAL once `captureTimeout` elapses
    fn arm_deadline(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let ledger = Arc::clone(&self.ledger);
        let timeout = self.options.capture_timeout_duration();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::info!(
                "captureTimeout of {}ms reached. Ending further capture.",
                timeout.as_millis()
            );
            shared.state.transition(CaptureState::Partial);
            ledger.set_recording(false);
        })
    }

    /// Conditions stopping the step loop outright
    fn hard_interrupt(&self, index: usize, page: &dyn Page) -> Option<&'static str> {
        if !self.target_url_is_web_page {
            return None;
        }

        if index > 1 && page.url() == BLANK_PAGE {
            return Some("Navigation to page failed (about:blank).");
        }

        if page.is_closed() {
            return Some("Page closed before it could be captured.");
        }

        None
    }

    /// Run a step body, giving up once the capture left CAPTURE
    async fn race_step(&mut self, step: CaptureStep) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let always_run = step.always_run;

        let interrupted = async move {
            let mut ticker = tokio::time::interval(STATE_POLL_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !always_run && !shared.state.is(CaptureState::Capture) {
                    break;
                }
            }
        };

        tokio::select! {
            result = self.run_step(step.kind) => result.step_context(step.name()),
            _ = interrupted => {
                tracing::debug!(step = step.name(), "Step interrupted by state change");
                Ok(())
            }
        }
    }

    async fn setup_step(&self, kind: StepKind, page: &Arc<dyn Page>) -> Result<()> {
        match kind {
            StepKind::BrowserScripts => {
                let path = self
                    .options
                    .behaviors_path
                    .clone()
                    .ok_or_else(|| Error::step(kind.name(), "No behaviors script configured"))?;
                let script = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    Error::step(
                        kind.name(),
                        format!("Could not read behaviors script {}: {}", path.display(), e),
                    )
                })?;

                page.add_init_script(&script).await?;
                page.add_init_script(&scripts::behaviors_init(
                    self.options.grab_secondary_resources,
                    self.options.auto_play_media,
                    self.options.auto_scroll,
                    self.options.run_site_specific_behaviors,
                    self.options.behaviors_timeout,
                ))
                .await
            }
            _ => Ok(()),
        }
    }

    async fn run_step(&mut self, kind: StepKind) -> Result<()> {
        let page = self.page()?;

        match kind {
            StepKind::DetectNonWebContent => self.detect_and_capture_non_web_content().await,
            StepKind::WaitForLoad => {
                page.goto(self.url.as_str(), self.options.load_timeout_duration())
                    .await
            }
            StepKind::PageInfo => self.capture_page_info(page.as_ref()).await,
            StepKind::BrowserScripts => page.evaluate_all_frames(scripts::RUN_BEHAVIORS).await,
            StepKind::NetworkIdle => {
                page.wait_for_network_idle(self.options.network_idle_timeout_duration())
                    .await
            }
            StepKind::ScrollUp => {
                match tokio::time::timeout(SCROLL_UP_TIMEOUT, page.evaluate(scripts::SCROLL_TO_TOP))
                    .await
                {
                    Ok(result) => result.map(|_| ()),
                    Err(_) => Ok(()),
                }
            }
            StepKind::Screenshot => self.take_screenshot(page.as_ref()).await,
            StepKind::DomSnapshot => self.take_dom_snapshot(page.as_ref()).await,
            StepKind::PdfSnapshot => self.take_pdf_snapshot(page.as_ref()).await,
            StepKind::Video => self.capture_video_as_attachment().await,
            StepKind::Certificates => self.capture_certificates_as_attachment().await,
            StepKind::ProvenanceSummary => self.capture_provenance_info().await,
        }
    }

    /// Close the browser and drain the intercepter
    async fn shutdown(&mut self) {
        tracing::info!("Closing browser and intercepter");

        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }

        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "Browser did not close cleanly");
            }
        }
        self.page = None;

        if let Err(e) = self.intercepter.teardown().await {
            tracing::warn!(error = %e, "Intercepter teardown failed");
        }
    }

    /// Assemble the exchange list and clear temporary files
    fn finalize(&mut self) {
        self.provenance.blocked_requests = self.shared.blocked_requests();

        let mut exchanges: Vec<Exchange> = self
            .ledger
            .take_exchanges()
            .into_iter()
            .map(Exchange::from)
            .collect();
        exchanges.extend(self.generated.drain(..).map(Exchange::from));
        self.exchanges = exchanges;

        if let Some(path) = &self.options.debug_log_path {
            if let Err(e) = debug_kit::write_exchanges_csv(path, &self.exchanges) {
                tracing::warn!(path = %path.display(), error = %e, "Could not write exchange dump");
            }
        }

        if let Some(tmp_dir) = self.tmp_dir.take() {
            tracing::info!(path = %tmp_dir.path().display(), "Clearing capture-specific temporary folder");
            if let Err(e) = tmp_dir.close() {
                tracing::warn!(error = %e, "Temporary folder could not be removed");
            }
        }

        tracing::info!(state = %self.state(), exchanges = self.exchanges.len(), "Capture finished");
    }

    fn page(&self) -> Result<Arc<dyn Page>> {
        self.page
            .clone()
            .ok_or_else(|| Error::browser("No page available"))
    }

    /// Add an attachment produced by the capture
    ///
    /// Unless attachments bypass limits, the exchange is refused (and the
    /// capture demoted to PARTIAL) when the capture is no longer running or
    /// when the body does not fit in the remaining byte budget.
    pub fn add_generated_exchange(
        &mut self,
        url: &str,
        headers: Vec<(String, String)>,
        body: impl Into<Bytes>,
        is_entry_point: bool,
        description: &str,
    ) -> bool {
        let body = body.into();

        if !self.options.attachments_bypass_limits {
            let remaining = self
                .options
                .max_capture_size
                .saturating_sub(self.ledger.byte_length());

            if !self.shared.state.is(CaptureState::Capture) || body.len() as u64 >= remaining {
                self.shared.state.transition(CaptureState::Partial);
                tracing::warn!("Generated exchange {} could not be saved (size limit reached).", url);
                return false;
            }
        }

        match GeneratedExchange::new(url, headers, body, is_entry_point, description) {
            Ok(exchange) => {
                self.generated.push(exchange);
                true
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Generated exchange rejected");
                false
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Target url, normalized
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Url after redirects, as seen by the content type probe
    pub fn target_url_resolved(&self) -> &Url {
        &self.target_url_resolved
    }

    pub fn target_url_content_type(&self) -> Option<&str> {
        self.target_url_content_type.as_deref()
    }

    pub fn target_url_is_web_page(&self) -> bool {
        self.target_url_is_web_page
    }

    pub fn page_info(&self) -> Option<&PageInfo> {
        self.page_info.as_ref()
    }

    pub fn provenance(&self) -> &ProvenanceInfo {
        &self.provenance
    }

    /// Intercepted then generated exchanges, once the capture ran
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Requests answered with a blocklist 403
    pub fn blocked_requests(&self) -> Vec<crate::blocklist::BlockedRequest> {
        self.shared.blocked_requests()
    }

    fn ensure_exportable(&self) -> Result<()> {
        if self.state().is_exportable() {
            Ok(())
        } else {
            Err(Error::invalid_input(
                "Cannot export generated exchanges on a pending or failed capture.",
            ))
        }
    }

    /// Generated exchanges keyed by file name
    pub fn extract_generated_exchanges(&self) -> Result<BTreeMap<String, &GeneratedExchange>> {
        self.ensure_exportable()?;

        Ok(self
            .exchanges
            .iter()
            .filter_map(Exchange::as_generated)
            .map(|ex| (ex.filename().to_string(), ex))
            .collect())
    }

    /// Serializable summary of this capture
    pub fn summary(&self) -> Result<CaptureSummary> {
        let generated = self.extract_generated_exchanges()?;

        Ok(CaptureSummary {
            id: self.id,
            state: self.state(),
            target_url: self.url.to_string(),
            target_url_resolved: self.target_url_resolved.to_string(),
            target_url_is_web_page: self.target_url_is_web_page,
            target_url_content_type: self.target_url_content_type.clone(),
            started_at: self.started_at,
            options: self.options.clone(),
            exchange_urls: self
                .exchanges
                .iter()
                .filter_map(|ex| ex.url().map(str::to_string))
                .collect(),
            attachments: Attachments::from_filenames(generated.keys().map(String::as_str)),
            provenance_info: self
                .options
                .provenance_summary
                .then(|| self.provenance.clone()),
            page_info: self.page_info.clone(),
        })
    }

    /// Serialize with `writer`
    pub fn export(&self, writer: &dyn ArchiveWriter) -> Result<Vec<u8>> {
        let summary = self.summary()?;
        writer.write(&ArchiveInput {
            exchanges: &self.exchanges,
            summary: &summary,
        })
    }
}
