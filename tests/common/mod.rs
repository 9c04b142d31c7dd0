// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scripted in-memory browser backend for pipeline tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use scoop::browser::{
    scripts, Browser, BrowserLauncher, InterceptAction, LaunchOptions, NetworkEvent, Page,
    PageOptions, PdfOptions, RequestInfo, RequestRouter, ResponseInfo, Viewport, BLANK_PAGE,
};
use scoop::{Error, Result};

/// What the scripted page serves and how it behaves
#[derive(Debug, Clone, Default)]
pub struct ScriptedSite {
    /// Canned responses by url; anything else is a 404
    pub responses: HashMap<String, ResponseInfo>,
    /// Requested after every navigation, in order
    pub subresources: Vec<String>,
    pub title: String,
    /// Network idle never arrives
    pub never_idle: bool,
    /// Navigation fails and the page stays blank
    pub fail_navigation: bool,
    /// Launching the browser fails
    pub fail_launch: bool,
}

impl ScriptedSite {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Serve `body` as html at `url`
    pub fn html(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            ResponseInfo::new(200, "OK")
                .header("content-type", "text/html; charset=utf-8")
                .body(body.to_string()),
        );
        self
    }

    pub fn subresource(mut self, url: &str, response: ResponseInfo) -> Self {
        self.subresources.push(url.to_string());
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn never_idle(mut self) -> Self {
        self.never_idle = true;
        self
    }

    pub fn fail_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn fail_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn launcher(self) -> Arc<dyn BrowserLauncher> {
        Arc::new(ScriptedLauncher { site: self })
    }
}

pub struct ScriptedLauncher {
    site: ScriptedSite,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn Browser>> {
        if self.site.fail_launch {
            return Err(Error::browser("scripted launch failure"));
        }
        Ok(Arc::new(ScriptedBrowser {
            site: self.site.clone(),
            pages: Mutex::new(Vec::new()),
        }))
    }
}

pub struct ScriptedBrowser {
    site: ScriptedSite,
    pages: Mutex<Vec<Arc<ScriptedPage>>>,
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_page(&self, _options: PageOptions) -> Result<Arc<dyn Page>> {
        let page = Arc::new(ScriptedPage::new(self.site.clone()));
        self.pages.lock().push(page.clone());
        Ok(page)
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        let pages: Vec<_> = self.pages.lock().drain(..).collect();
        for page in pages {
            page.close().await?;
        }
        Ok(())
    }
}

pub struct ScriptedPage {
    site: ScriptedSite,
    url: Mutex<String>,
    closed: AtomicBool,
    router: Mutex<Option<Arc<dyn RequestRouter>>>,
    events_tx: Mutex<Option<UnboundedSender<NetworkEvent>>>,
    events_rx: Mutex<Option<UnboundedReceiver<NetworkEvent>>>,
    init_scripts: Mutex<Vec<String>>,
}

impl ScriptedPage {
    fn new(site: ScriptedSite) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            site,
            url: Mutex::new(BLANK_PAGE.to_string()),
            closed: AtomicBool::new(false),
            router: Mutex::new(None),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            init_scripts: Mutex::new(Vec::new()),
        }
    }

    fn emit(&self, event: NetworkEvent) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    async fn load(&self, mut request: RequestInfo) {
        let router = self.router.lock().clone();
        let action = match router {
            Some(router) => router.route(&mut request).await,
            None => InterceptAction::Continue,
        };

        self.emit(NetworkEvent::Request(request.clone()));

        match action {
            InterceptAction::Fulfill(response) => {
                self.emit(NetworkEvent::RequestFinished { request, response })
            }
            InterceptAction::Abort(error_text) => {
                self.emit(NetworkEvent::RequestFailed { request, error_text })
            }
            InterceptAction::Continue => {
                let response = self
                    .site
                    .responses
                    .get(&request.url)
                    .cloned()
                    .unwrap_or_else(|| ResponseInfo::new(404, "Not Found"));
                self.emit(NetworkEvent::RequestFinished { request, response });
            }
        }
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        if self.site.fail_navigation {
            return Err(Error::browser("net::ERR_NAME_NOT_RESOLVED"));
        }

        self.load(RequestInfo::navigation(url)).await;
        *self.url.lock() = url.to_string();

        for subresource in self.site.subresources.clone() {
            self.load(RequestInfo::new("GET", subresource)).await;
        }
        Ok(())
    }

    fn url(&self) -> String {
        self.url.lock().clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        if script == scripts::PAGE_INFO {
            return Ok(json!({
                "title": self.site.title,
                "description": null,
                "url": self.url(),
                "faviconUrl": null
            }));
        }
        if script == scripts::DOCUMENT_DIMENSIONS {
            return Ok(json!({"width": 1600, "height": 2450}));
        }
        Ok(serde_json::Value::Null)
    }

    async fn add_init_script(&self, script: &str) -> Result<()> {
        self.init_scripts.lock().push(script.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(format!("<html><head><title>{}</title></head><body></body></html>", self.site.title))
    }

    async fn screenshot(&self) -> Result<Bytes> {
        Ok(Bytes::from_static(b"\x89PNG\r\n\x1a\nscripted"))
    }

    async fn pdf(&self, options: &PdfOptions) -> Result<Bytes> {
        Ok(Bytes::from(format!("%PDF-1.7 {}x{}", options.width, options.height)))
    }

    async fn set_viewport(&self, _viewport: Viewport) -> Result<()> {
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<()> {
        if self.site.never_idle {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    fn take_events(&self) -> Option<UnboundedReceiver<NetworkEvent>> {
        self.events_rx.lock().take()
    }

    fn set_router(&self, router: Arc<dyn RequestRouter>) {
        *self.router.lock() = Some(router);
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.events_tx.lock().take();
        Ok(())
    }
}
