// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser backend capability set
//!
//! The capture drives a browser only through these traits. A backend provides
//! navigation, script evaluation, rendering and a stream of network events.

mod event;
mod http_page;
pub mod scripts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;

pub use event::{NetworkEvent, RequestInfo, ResourceType, ResponseInfo, ERR_ABORTED};
pub use http_page::{HttpBrowser, HttpBrowserLauncher, HttpPage};

/// Initial url of every page
pub const BLANK_PAGE: &str = "about:blank";

/// Base user agent, before the configured suffix
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Proxy used by the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// `host:port`
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            username: None,
            password: None,
        }
    }

    /// Set basic auth credentials
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy url with an http scheme
    pub fn url(&self) -> String {
        if self.server.contains("://") {
            self.server.clone()
        } else {
            format!("http://{}", self.server)
        }
    }
}

/// Browser launch options
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub proxy: Option<ProxySettings>,
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Page (browser context) options
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub user_agent: String,
    /// Overrides the launch proxy for this page
    pub proxy: Option<ProxySettings>,
    pub ignore_https_errors: bool,
    pub viewport: Viewport,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            ignore_https_errors: false,
            viewport: Viewport::default(),
        }
    }
}

/// PDF rendering options, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfOptions {
    pub width: u32,
    pub height: u32,
    /// Print background graphics
    pub print_background: bool,
    /// Render with screen media rules instead of print
    pub media_screen: bool,
}

impl PdfOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            print_background: true,
            media_screen: true,
        }
    }
}

/// Decision taken by a router for an outgoing request
#[derive(Debug, Clone)]
pub enum InterceptAction {
    /// Continue with the (possibly modified) request
    Continue,
    /// Fail the request with an error text
    Abort(String),
    /// Answer with this response, never reaching the network
    Fulfill(ResponseInfo),
}

/// Hook consulted before a page issues a request
#[async_trait]
pub trait RequestRouter: Send + Sync {
    async fn route(&self, request: &mut RequestInfo) -> InterceptAction;
}

/// A browser page
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for load
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Current url
    fn url(&self) -> String;

    fn is_closed(&self) -> bool;

    /// Evaluate a script in the main frame
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Evaluate a script in every frame, ignoring individual failures
    async fn evaluate_all_frames(&self, script: &str) -> Result<()> {
        self.evaluate(script).await.map(|_| ())
    }

    /// Script run before any page script on every navigation
    async fn add_init_script(&self, script: &str) -> Result<()>;

    /// Serialized DOM
    async fn content(&self) -> Result<String>;

    /// Full-page PNG screenshot
    async fn screenshot(&self) -> Result<Bytes>;

    /// PDF render
    async fn pdf(&self, options: &PdfOptions) -> Result<Bytes>;

    async fn set_viewport(&self, viewport: Viewport) -> Result<()>;

    /// Wait until no request has been in flight for a short while
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()>;

    /// Network event stream; only the first call gets it
    fn take_events(&self) -> Option<UnboundedReceiver<NetworkEvent>>;

    /// Install the request router
    fn set_router(&self, router: Arc<dyn RequestRouter>);

    async fn close(&self) -> Result<()>;
}

/// A launched browser
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self, options: PageOptions) -> Result<Arc<dyn Page>>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<()>;
}

/// Starts browsers
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn Browser>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url() {
        assert_eq!(ProxySettings::new("proxy.local:8080").url(), "http://proxy.local:8080");
        assert_eq!(
            ProxySettings::new("http://proxy.local:8080").url(),
            "http://proxy.local:8080"
        );
    }

    #[test]
    fn test_pdf_options() {
        let options = PdfOptions::new(1650, 950);
        assert!(options.print_background);
        assert!(options.media_screen);
    }
}
