// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP-only browser backend
//!
//! Fetches documents and their subresources with reqwest, emitting the same
//! network events a rendering browser would. There is no layout engine:
//! screenshots and PDFs are unsupported, and only the capture's own scripts
//! can be evaluated (answered from the fetched HTML).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use url::Url;

use super::event::{NetworkEvent, RequestInfo, ResourceType, ResponseInfo, ERR_ABORTED};
use super::scripts;
use super::{
    Browser, BrowserLauncher, InterceptAction, LaunchOptions, Page, PageOptions, PdfOptions,
    ProxySettings, RequestRouter, Viewport, BLANK_PAGE,
};
use crate::error::{Error, Result};

const MAX_REDIRECTS: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_WINDOW: Duration = Duration::from_millis(500);

lazy_static! {
    static ref SRC_ATTR: Regex = Regex::new(
        r#"(?is)<(?:img|script|iframe|source|video|audio|embed|track)\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#
    )
    .unwrap();
    static ref LINK_TAG: Regex = Regex::new(r#"(?is)<link\b[^>]*>"#).unwrap();
    static ref HREF_ATTR: Regex = Regex::new(r#"(?is)\shref\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref REL_ATTR: Regex = Regex::new(r#"(?is)\srel\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref TITLE: Regex = Regex::new(r#"(?is)<title[^>]*>(.*?)</title>"#).unwrap();
    static ref META_TAG: Regex = Regex::new(r#"(?is)<meta\b[^>]*>"#).unwrap();
    static ref NAME_DESCRIPTION: Regex =
        Regex::new(r#"(?is)\sname\s*=\s*["']description["']"#).unwrap();
    static ref CONTENT_ATTR: Regex =
        Regex::new(r#"(?is)\scontent\s*=\s*["']([^"']*)["']"#).unwrap();
}

/// Launcher for [`HttpBrowser`]
#[derive(Debug, Clone, Default)]
pub struct HttpBrowserLauncher;

#[async_trait]
impl BrowserLauncher for HttpBrowserLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn Browser>> {
        tracing::debug!(headless = options.headless, "Launching HTTP browser");
        Ok(Arc::new(HttpBrowser::new(options.clone())))
    }
}

/// Browser backed by an HTTP client
pub struct HttpBrowser {
    options: LaunchOptions,
    connected: AtomicBool,
    pages: Mutex<Vec<Arc<HttpPage>>>,
}

impl HttpBrowser {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            options,
            connected: AtomicBool::new(true),
            pages: Mutex::new(Vec::new()),
        }
    }

    fn build_client(&self, options: &PageOptions) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(&options.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(options.ignore_https_errors)
            .cookie_store(true);

        match options.proxy.as_ref().or(self.options.proxy.as_ref()) {
            Some(proxy) => builder = builder.proxy(reqwest_proxy(proxy)?),
            None => builder = builder.no_proxy(),
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self, options: PageOptions) -> Result<Arc<dyn Page>> {
        if !self.is_connected() {
            return Err(Error::browser("Browser has been closed"));
        }

        let client = self.build_client(&options)?;
        let page = Arc::new(HttpPage::new(client, options));
        self.pages.lock().push(page.clone());
        Ok(page)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let pages: Vec<_> = self.pages.lock().drain(..).collect();
        for page in pages {
            page.close().await?;
        }
        Ok(())
    }
}

/// Page of an [`HttpBrowser`]
pub struct HttpPage {
    client: Client,
    user_agent: String,
    url: RwLock<String>,
    document: RwLock<Option<String>>,
    viewport: RwLock<Viewport>,
    init_scripts: RwLock<Vec<String>>,
    router: RwLock<Option<Arc<dyn RequestRouter>>>,
    events_tx: Mutex<Option<UnboundedSender<NetworkEvent>>>,
    events_rx: Mutex<Option<UnboundedReceiver<NetworkEvent>>>,
    in_flight: AtomicUsize,
    idle: Notify,
    closed: AtomicBool,
}

impl HttpPage {
    pub fn new(client: Client, options: PageOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            user_agent: options.user_agent,
            url: RwLock::new(BLANK_PAGE.to_string()),
            document: RwLock::new(None),
            viewport: RwLock::new(options.viewport),
            init_scripts: RwLock::new(Vec::new()),
            router: RwLock::new(None),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn emit(&self, event: NetworkEvent) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Route, send and report one request
    async fn fetch(&self, mut request: RequestInfo) -> Result<Option<ResponseInfo>> {
        if self.is_closed() {
            return Err(Error::browser("Page has been closed"));
        }

        let router = self.router.read().clone();
        let action = match router {
            Some(router) => router.route(&mut request).await,
            None => InterceptAction::Continue,
        };

        self.emit(NetworkEvent::Request(request.clone()));

        match action {
            InterceptAction::Fulfill(response) => {
                self.emit(NetworkEvent::RequestFinished {
                    request,
                    response: response.clone(),
                });
                return Ok(Some(response));
            }
            InterceptAction::Abort(error_text) => {
                self.emit(NetworkEvent::RequestFailed {
                    request,
                    error_text,
                });
                return Ok(None);
            }
            InterceptAction::Continue => {}
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.send(&request).await;
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }

        match result {
            Ok(response) => {
                self.emit(NetworkEvent::RequestFinished {
                    request,
                    response: response.clone(),
                });
                Ok(Some(response))
            }
            Err(e) => {
                let error_text = if self.is_closed() {
                    ERR_ABORTED.to_string()
                } else {
                    format!("net::ERR_FAILED ({})", e)
                };
                self.emit(NetworkEvent::RequestFailed {
                    request,
                    error_text,
                });
                Err(e)
            }
        }
    }

    async fn send(&self, request: &RequestInfo) -> Result<ResponseInfo> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::browser(format!("Invalid method {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes().await?;

        Ok(ResponseInfo {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }

    fn request_for(&self, url: &str, resource_type: ResourceType, referer: Option<&str>) -> RequestInfo {
        let accept = match resource_type {
            ResourceType::Document => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            }
            ResourceType::Stylesheet => "text/css,*/*;q=0.1",
            ResourceType::Image => "image/avif,image/webp,image/apng,image/*,*/*;q=0.8",
            _ => "*/*",
        };

        let mut request = RequestInfo::new("GET", url)
            .header("user-agent", self.user_agent.as_str())
            .header("accept", accept);
        if let Some(referer) = referer {
            request = request.header("referer", referer);
        }
        request.resource_type = resource_type;
        request
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut current = Url::parse(url)?;

        for _ in 0..MAX_REDIRECTS {
            let mut request = self.request_for(current.as_str(), ResourceType::Document, None);
            request.is_navigation = true;

            let response = self
                .fetch(request)
                .await?
                .ok_or_else(|| Error::browser(format!("Navigation to {} was aborted", current)))?;

            if (300..400).contains(&response.status) {
                if let Some(location) = response.header_value("location") {
                    current = current.join(location)?;
                    continue;
                }
            }

            *self.url.write() = current.to_string();

            let is_html = response
                .header_value("content-type")
                .map_or(true, |ct| ct.contains("html"));
            let html = String::from_utf8_lossy(&response.body).into_owned();
            *self.document.write() = Some(html.clone());

            if is_html {
                self.load_subresources(&current, &html).await;
            }
            return Ok(());
        }

        Err(Error::browser(format!("Too many redirects from {}", url)))
    }

    async fn load_subresources(&self, base: &Url, html: &str) {
        let urls = subresource_urls(base, html);
        tracing::debug!(count = urls.len(), "Loading subresources");

        let referer = base.as_str();
        let fetches = urls.iter().map(|url| {
            let request = self.request_for(url, ResourceType::from_url(url), Some(referer));
            async move {
                if let Err(e) = self.fetch(request).await {
                    tracing::debug!(url = %url, error = %e, "Subresource failed");
                }
            }
        });
        futures::future::join_all(fetches).await;
    }

    fn page_info(&self) -> serde_json::Value {
        let url = self.url();
        let html = self.document.read().clone().unwrap_or_default();
        let base = Url::parse(&url).ok();

        let title = TITLE
            .captures(&html)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();

        let description = META_TAG
            .find_iter(&html)
            .map(|m| m.as_str())
            .find(|tag| NAME_DESCRIPTION.is_match(tag))
            .and_then(|tag| CONTENT_ATTR.captures(tag).map(|c| c[1].to_string()));

        let favicon_url = LINK_TAG
            .find_iter(&html)
            .map(|m| m.as_str())
            .find(|tag| {
                REL_ATTR
                    .captures(tag)
                    .map_or(false, |c| c[1].to_ascii_lowercase().contains("icon"))
            })
            .and_then(|tag| HREF_ATTR.captures(tag).map(|c| c[1].to_string()))
            .and_then(|href| match &base {
                Some(base) => base.join(&href).ok().map(|u| u.to_string()),
                None => Some(href),
            });

        serde_json::json!({
            "title": title,
            "description": description,
            "url": url,
            "faviconUrl": favicon_url,
        })
    }
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.navigate(url))
            .await
            .map_err(|_| Error::timeout(format!("navigation to {}", url), timeout.as_millis() as u64))?
    }

    fn url(&self) -> String {
        self.url.read().clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        if script == scripts::PAGE_INFO {
            return Ok(self.page_info());
        }

        if script == scripts::DOCUMENT_DIMENSIONS {
            let viewport = *self.viewport.read();
            return Ok(serde_json::json!({
                "width": viewport.width,
                "height": viewport.height + scripts::PDF_HEIGHT_PADDING,
            }));
        }

        if script == scripts::SCROLL_TO_TOP {
            return Ok(serde_json::Value::Null);
        }

        Err(Error::unsupported("script evaluation without a JavaScript engine"))
    }

    async fn add_init_script(&self, script: &str) -> Result<()> {
        self.init_scripts.write().push(script.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self
            .document
            .read()
            .clone()
            .unwrap_or_else(|| "<html><head></head><body></body></html>".to_string()))
    }

    async fn screenshot(&self) -> Result<Bytes> {
        Err(Error::unsupported("screenshots require a rendering backend"))
    }

    async fn pdf(&self, _options: &PdfOptions) -> Result<Bytes> {
        Err(Error::unsupported("PDF rendering requires a rendering backend"))
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        *self.viewport.write() = viewport;
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        let wait = async {
            loop {
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(IDLE_WINDOW).await;
                    if self.in_flight.load(Ordering::SeqCst) == 0 {
                        return;
                    }
                    continue;
                }

                let notified = self.idle.notified();
                if self.in_flight.load(Ordering::SeqCst) == 0 {
                    continue;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::timeout("network idle", timeout.as_millis() as u64))
    }

    fn take_events(&self) -> Option<UnboundedReceiver<NetworkEvent>> {
        self.events_rx.lock().take()
    }

    fn set_router(&self, router: Arc<dyn RequestRouter>) {
        *self.router.write() = Some(router);
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.events_tx.lock().take();
        Ok(())
    }
}

fn reqwest_proxy(proxy: &ProxySettings) -> Result<reqwest::Proxy> {
    let mut rp = reqwest::Proxy::all(proxy.url())
        .map_err(|e| Error::config(format!("Invalid proxy URL: {}", e)))?;
    if let (Some(username), Some(password)) = (&proxy.username, &proxy.password) {
        rp = rp.basic_auth(username, password);
    }
    Ok(rp)
}

/// Absolute http(s) urls of the subresources referenced by `html`
fn subresource_urls(base: &Url, html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let src = SRC_ATTR.captures_iter(html).map(|c| c[1].to_string());
    let links = LINK_TAG
        .find_iter(html)
        .filter_map(|m| HREF_ATTR.captures(m.as_str()).map(|c| c[1].to_string()));

    for reference in src.chain(links) {
        let Ok(url) = base.join(reference.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        let mut url = url;
        url.set_fragment(None);
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head>
        <title> Test page </title>
        <meta content="A page for tests" name="description">
        <link rel="shortcut icon" href="/favicon.ico">
        <link rel="stylesheet" href="/style.css">
        </head><body><img src="/logo.png"><a href="/other">x</a></body></html>"#;

    async fn page_for(server: &MockServer) -> Arc<dyn Page> {
        let browser = HttpBrowserLauncher
            .launch(&LaunchOptions::default())
            .await
            .unwrap();
        let _ = server;
        browser.new_page(PageOptions::default()).await.unwrap()
    }

    fn drain(rx: &mut UnboundedReceiver<NetworkEvent>) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_subresource_urls() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        let urls = subresource_urls(&base, PAGE);
        assert_eq!(
            urls,
            vec![
                "https://example.com/logo.png".to_string(),
                "https://example.com/favicon.ico".to_string(),
                "https://example.com/style.css".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_navigation_emits_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let page = page_for(&server).await;
        let mut rx = page.take_events().unwrap();
        assert!(page.take_events().is_none());
        assert_eq!(page.url(), BLANK_PAGE);

        page.goto(&format!("{}/", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(page.url(), format!("{}/", server.uri()));

        let events = drain(&mut rx);
        let started = events
            .iter()
            .filter(|e| matches!(e, NetworkEvent::Request(_)))
            .count();
        let finished = events
            .iter()
            .filter(|e| matches!(e, NetworkEvent::RequestFinished { .. }))
            .count();
        assert_eq!(started, 4);
        assert_eq!(finished, 4);
        assert!(events[0].request().is_navigation);

        page.wait_for_network_idle(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_redirects_are_followed_hop_by_hop() {
        let server = MockServer::start().await;
        Mock::given(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>new</p>", "text/html"))
            .mount(&server)
            .await;

        let page = page_for(&server).await;
        let mut rx = page.take_events().unwrap();
        page.goto(&format!("{}/old", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.url(), format!("{}/new", server.uri()));
        let finished: Vec<u16> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                NetworkEvent::RequestFinished { response, .. } => Some(response.status),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![301, 200]);
    }

    #[tokio::test]
    async fn test_page_info_script() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let page = page_for(&server).await;
        page.goto(&format!("{}/", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        let info = page.evaluate(scripts::PAGE_INFO).await.unwrap();
        assert_eq!(info["title"], "Test page");
        assert_eq!(info["description"], "A page for tests");
        assert_eq!(info["faviconUrl"], format!("{}/favicon.ico", server.uri()));

        assert!(page.evaluate("document.cookie").await.is_err());
        assert!(page.screenshot().await.is_err());
    }

    struct BlockScripts;

    #[async_trait]
    impl RequestRouter for BlockScripts {
        async fn route(&self, request: &mut RequestInfo) -> InterceptAction {
            if request.url.ends_with(".png") {
                InterceptAction::Fulfill(ResponseInfo::new(403, "Forbidden").body("blocked"))
            } else {
                request.headers.push(("x-injected".to_string(), "1".to_string()));
                InterceptAction::Continue
            }
        }
    }

    #[tokio::test]
    async fn test_router_fulfills_and_modifies() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .and(wiremock::matchers::header("x-injected", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let page = page_for(&server).await;
        page.set_router(Arc::new(BlockScripts));
        let mut rx = page.take_events().unwrap();
        page.goto(&format!("{}/", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();

        let blocked = drain(&mut rx).into_iter().find_map(|e| match e {
            NetworkEvent::RequestFinished { request, response } if request.url.ends_with(".png") => {
                Some(response.status)
            }
            _ => None,
        });
        assert_eq!(blocked, Some(403));
        assert_eq!(server.received_requests().await.unwrap().iter().filter(|r| r.url.path() == "/logo.png").count(), 0);
    }

    #[tokio::test]
    async fn test_close_ends_event_stream() {
        let page = HttpPage::new(Client::new(), PageOptions::default());
        let mut rx = page.take_events().unwrap();
        page.close().await.unwrap();
        assert!(page.is_closed());
        assert!(rx.recv().await.is_none());
    }
}
