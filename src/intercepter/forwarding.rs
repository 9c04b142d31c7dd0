// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Forwarding proxy intercepter
//!
//! An HTTP/1.1 proxy the browser is pointed at. Requests are forwarded
//! upstream (through the attester forward proxy when one is configured) and
//! recorded as raw bytes. `CONNECT` tunnels are terminated with a per-host
//! self-signed certificate so the requests inside go through the same path
//! as plain HTTP ones. The browser must therefore ignore certificate errors.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use reqwest::redirect::Policy;
use rustls::pki_types::PrivatePkcs8KeyDer;
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use url::Url;

use super::{ExchangeLedger, Intercepter};
use crate::browser::{Page, ProxySettings, ResponseInfo};
use crate::config::{CaptureOptions, IntercepterKind};
use crate::error::{Error, Result};
use crate::exchange::{ParsedRequest, ParsedResponse};
use crate::headers::HeaderScope;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Listening address and logging of the proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    /// 0 picks a free port
    pub port: u16,
    pub verbose: bool,
}

impl ProxyConfig {
    pub fn from_options(options: &CaptureOptions) -> Self {
        Self {
            host: options.proxy_host.clone(),
            port: options.proxy_port,
            verbose: options.proxy_verbose,
        }
    }
}

/// Intercepter running its own proxy server
pub struct ForwardingIntercepter {
    ledger: Arc<ExchangeLedger>,
    config: ProxyConfig,
    upstream: Option<ProxySettings>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ForwardingIntercepter {
    pub fn new(ledger: Arc<ExchangeLedger>, config: ProxyConfig, upstream: Option<ProxySettings>) -> Self {
        Self {
            ledger,
            config,
            upstream,
            local_addr: Mutex::new(None),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Address the proxy listens on, once set up
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

#[async_trait]
impl Intercepter for ForwardingIntercepter {
    fn kind(&self) -> IntercepterKind {
        IntercepterKind::Forwarding
    }

    fn ledger(&self) -> &Arc<ExchangeLedger> {
        &self.ledger
    }

    async fn setup(&self) -> Result<()> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                Error::setup(format!(
                    "Could not bind proxy on {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;
        let addr = listener.local_addr()?;

        let state = Arc::new(ProxyState {
            ledger: self.ledger.clone(),
            client: build_client(self.upstream.as_ref())?,
            verbose: self.config.verbose,
            site_configs: Mutex::new(HashMap::new()),
        });

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(serve(listener, state, rx));

        *self.local_addr.lock() = Some(addr);
        *self.shutdown.lock() = Some(tx);
        *self.task.lock() = Some(handle);

        tracing::info!("Forwarding proxy listening on {}", addr);
        Ok(())
    }

    /// Traffic is seen on the wire; the page's own event stream is dropped
    async fn setup_page(&self, page: Arc<dyn Page>) -> Result<()> {
        drop(page.take_events());
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(());
        }

        let handle = self.task.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        tracing::debug!("Forwarding proxy stopped");
        Ok(())
    }

    fn browser_proxy(&self) -> Option<ProxySettings> {
        self.local_addr()
            .map(|addr| ProxySettings::new(addr.to_string()))
    }
}

async fn serve(listener: TcpListener, state: Arc<ProxyState>, mut shutdown: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Proxy accept failed");
                        continue;
                    }
                };

                let state = state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(state.handle(req).await) }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        tracing::debug!("Error serving proxy connection from {}: {}", remote_addr, err);
                    }
                });
            }
        }
    }
}

struct ProxyState {
    ledger: Arc<ExchangeLedger>,
    client: reqwest::Client,
    verbose: bool,
    /// TLS server configs by tunneled host
    site_configs: Mutex<HashMap<String, Arc<ServerConfig>>>,
}

impl ProxyState {
    async fn handle(self: Arc<Self>, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let result = if req.method() == Method::CONNECT {
            self.open_tunnel(req).await
        } else {
            self.forward(req, None).await
        };
        or_bad_gateway(result)
    }

    /// Forward and record one request
    ///
    /// `tunnel` is the authority of the enclosing `CONNECT`, if any.
    async fn forward(&self, req: Request<Incoming>, tunnel: Option<&str>) -> Result<Response<Full<Bytes>>> {
        let url = match tunnel {
            Some(authority) => {
                let path = req.uri().path_and_query().map_or("/", |p| p.as_str());
                Url::parse(&format!("https://{}{}", authority, path))?
            }
            None => {
                let uri = req.uri().to_string();
                Url::parse(&uri).map_err(|_| {
                    Error::proxy(format!("Proxy requests need an absolute URI, got {}", uri))
                })?
            }
        };
        let method = req.method().as_str().to_string();

        let mut headers: Vec<(String, String)> = req
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect();
        let body = req
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::proxy(format!("Could not read request body: {}", e)))?
            .to_bytes();

        let custom_headers = &self.ledger.shared().custom_headers;
        custom_headers.apply(HeaderScope::Request, &mut headers);
        let request = ParsedRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        };

        if let Some(blocked) = self.ledger.check_blocklist(&url).await {
            let answer = self.ledger.block(blocked);
            self.record(&request, &answer);
            return Ok(to_hyper(&answer));
        }

        let mut answer = self.send_upstream(&request).await?;
        custom_headers.apply(HeaderScope::Response, &mut answer.headers);

        if self.verbose {
            tracing::info!(
                method = %request.method,
                url = %request.url,
                status = answer.status,
                "Proxied"
            );
        }

        self.record(&request, &answer);
        Ok(to_hyper(&answer))
    }

    async fn send_upstream(&self, request: &ParsedRequest) -> Result<ResponseInfo> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::proxy(format!("Invalid method {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("host") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let upstream = builder.send().await?;
        let status = upstream.status();
        let headers = upstream
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
            })
            .collect();
        let body = upstream.bytes().await?;

        Ok(ResponseInfo {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }

    /// Append the exchange, minus transient headers, to the ledger
    fn record(&self, request: &ParsedRequest, answer: &ResponseInfo) {
        let custom_headers = &self.ledger.shared().custom_headers;

        let mut archived_request = request.clone();
        archived_request.headers =
            custom_headers.strip_transient(HeaderScope::Request, archived_request.headers);
        if archived_request.header_value("host").is_none() {
            if let Ok(url) = Url::parse(&request.url) {
                if let Some(host) = url.host_str() {
                    let host = match url.port() {
                        Some(port) => format!("{}:{}", host, port),
                        None => host.to_string(),
                    };
                    archived_request.headers.insert(0, ("Host".to_string(), host));
                }
            }
        }

        let archived_response = ParsedResponse {
            status: answer.status,
            status_message: answer.status_text.clone(),
            headers: custom_headers.strip_transient(HeaderScope::Response, answer.headers.clone()),
            body: answer.body.clone(),
        };

        if let Err(e) = self.ledger.record_raw(
            &request.url,
            &archived_request.to_raw(),
            &archived_response.to_raw(),
        ) {
            tracing::warn!(url = %request.url, error = %e, "Exchange not recorded");
        }
    }

    /// Accept the `CONNECT` and serve the decrypted connection ourselves
    async fn open_tunnel(self: Arc<Self>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
        let authority = req
            .uri()
            .authority()
            .map(|a| a.to_string())
            .ok_or_else(|| Error::proxy("CONNECT without authority"))?;

        let url = Url::parse(&format!("https://{}/", authority))?;
        if let Some(blocked) = self.ledger.check_blocklist(&url).await {
            return Ok(to_hyper(&self.ledger.block(blocked)));
        }

        let host = url
            .host_str()
            .unwrap_or_default()
            .trim_matches(|c| c == '[' || c == ']')
            .to_string();
        let acceptor = TlsAcceptor::from(self.site_config(&host)?);

        tokio::spawn(async move {
            let upgraded = match hyper::upgrade::on(req).await {
                Ok(upgraded) => upgraded,
                Err(e) => {
                    tracing::debug!(authority = %authority, error = %e, "Upgrade failed");
                    return;
                }
            };

            let tls = match acceptor.accept(TokioIo::new(upgraded)).await {
                Ok(tls) => tls,
                Err(e) => {
                    tracing::debug!(authority = %authority, error = %e, "TLS handshake with client failed");
                    return;
                }
            };

            let service = service_fn(move |req| {
                let state = self.clone();
                let authority = authority.clone();
                async move {
                    Ok::<_, Infallible>(or_bad_gateway(state.forward(req, Some(&authority)).await))
                }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(tls), service)
                .await
            {
                tracing::debug!(error = %e, "Error serving tunneled connection");
            }
        });

        Ok(Response::new(Full::new(Bytes::new())))
    }

    fn site_config(&self, host: &str) -> Result<Arc<ServerConfig>> {
        if let Some(config) = self.site_configs.lock().get(host) {
            return Ok(config.clone());
        }

        let config = Arc::new(site_server_config(host)?);
        self.site_configs
            .lock()
            .insert(host.to_string(), config.clone());
        Ok(config)
    }
}

/// Server config presenting a fresh self-signed certificate for `host`
fn site_server_config(host: &str) -> Result<ServerConfig> {
    let certified = rcgen::generate_simple_self_signed(vec![host.to_string()])
        .map_err(|e| Error::proxy(format!("Could not create a certificate for {}: {}", host, e)))?;
    let key = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::proxy(format!("TLS setup failed: {}", e)))?
            .with_no_client_auth()
            .with_single_cert(vec![certified.cert.der().clone()], key.into())
            .map_err(|e| Error::proxy(format!("TLS setup failed for {}: {}", host, e)))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}

fn build_client(upstream: Option<&ProxySettings>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .no_gzip()
        .no_brotli()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(true)
        .timeout(UPSTREAM_TIMEOUT);

    builder = match upstream {
        Some(upstream) => {
            let mut proxy = reqwest::Proxy::all(upstream.url())
                .map_err(|e| Error::config(format!("Invalid forward proxy: {}", e)))?;
            if let (Some(username), Some(password)) = (&upstream.username, &upstream.password) {
                proxy = proxy.basic_auth(username, password);
            }
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    Ok(builder.build()?)
}

fn is_hop_by_hop(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("proxy-") || HOP_BY_HOP.contains(&name.as_str())
}

fn to_hyper(answer: &ResponseInfo) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(answer.status);
    for (name, value) in &answer.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(answer.body.clone()))
        .unwrap_or_else(|_| text_response(502, "Invalid upstream response".to_string()))
}

fn or_bad_gateway(result: Result<Response<Full<Bytes>>>) -> Response<Full<Bytes>> {
    result.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Proxy request failed");
        text_response(502, format!("Proxy error: {}", e))
    })
}

fn text_response(status: u16, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    if let Ok(status) = hyper::StatusCode::from_u16(status) {
        *response.status_mut() = status;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::Blocklist;
    use crate::capture::{CaptureShared, CaptureState};
    use crate::headers::CustomHeader;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn started(blocklist: &[&str]) -> ForwardingIntercepter {
        let shared = Arc::new(CaptureShared::new(Blocklist::new(blocklist).unwrap()));
        shared.state.transition(CaptureState::Setup);
        shared.state.transition(CaptureState::Capture);
        shared
            .custom_headers
            .add(CustomHeader::request("Timestamp-Proof", "proof-1"));
        shared
            .custom_headers
            .add(CustomHeader::request("Attester-Authorization", "Bearer secret").transient());

        let ledger = Arc::new(ExchangeLedger::new(1 << 20, shared));
        let config = ProxyConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            verbose: true,
        };
        let intercepter = ForwardingIntercepter::new(ledger, config, None);
        intercepter.setup().await.unwrap();
        intercepter
    }

    fn client_through(intercepter: &ForwardingIntercepter) -> reqwest::Client {
        let proxy = intercepter.browser_proxy().unwrap();
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::http(proxy.url()).unwrap())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_forwards_and_records_without_transient_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("attester-authorization", "Bearer secret"))
            .and(header("timestamp-proof", "proof-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let intercepter = started(&[]).await;
        let response = client_through(&intercepter)
            .get(format!("{}/page", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "hello");

        intercepter.teardown().await.unwrap();

        let exchanges = intercepter.ledger().exchanges();
        assert_eq!(exchanges.len(), 1);
        let request = exchanges[0].request().unwrap();
        assert_eq!(request.url, format!("{}/page", server.uri()));
        assert!(request.headers.get("timestamp-proof").is_some());
        assert!(request.headers.get("attester-authorization").is_none());
        assert_eq!(&exchanges[0].response().unwrap().body[..], b"hello");
    }

    #[tokio::test]
    async fn test_blocked_requests_never_reach_origin() {
        let intercepter = started(&["tracker.example"]).await;
        let response = client_through(&intercepter)
            .get("http://tracker.example/x")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 403);
        assert!(response.text().await.unwrap().contains("tracker.example"));

        let blocked = intercepter.ledger().shared().blocked_requests();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].rule, "tracker.example");

        intercepter.teardown().await.unwrap();
    }

    /// HTTPS origin on localhost echoing the proof header it received
    async fn https_origin() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(site_server_config("localhost").unwrap()));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let Ok(tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    let service = service_fn(|req: Request<Incoming>| async move {
                        let proof = req
                            .headers()
                            .get("timestamp-proof")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("none")
                            .to_string();
                        let bearer = req.headers().contains_key("attester-authorization");
                        let body = format!("secure {} {}", proof, bearer);
                        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(tls), service)
                        .await;
                });
            }
        });
        addr
    }

    fn tunneling_client(intercepter: &ForwardingIntercepter) -> reqwest::Client {
        let proxy = intercepter.browser_proxy().unwrap();
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy.url()).unwrap())
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_tunnel_is_decrypted_and_recorded() {
        let origin = https_origin().await;
        let url = format!("https://localhost:{}/secure", origin.port());

        let intercepter = started(&[]).await;
        let response = tunneling_client(&intercepter).get(&url).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "secure proof-1 true");

        intercepter.teardown().await.unwrap();

        let exchanges = intercepter.ledger().exchanges();
        assert_eq!(exchanges.len(), 1);
        let request = exchanges[0].request().unwrap();
        assert_eq!(request.url, url);
        assert!(request.headers.get("timestamp-proof").is_some());
        assert!(request.headers.get("attester-authorization").is_none());
        assert_eq!(&exchanges[0].response().unwrap().body[..], b"secure proof-1 true");
    }

    #[tokio::test]
    async fn test_blocked_connect_is_refused() {
        let intercepter = started(&["tracker.example"]).await;
        let result = tunneling_client(&intercepter)
            .get("https://tracker.example/x")
            .send()
            .await;
        assert!(result.is_err());

        let blocked = intercepter.ledger().shared().blocked_requests();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].rule, "tracker.example");
        assert!(intercepter.ledger().exchanges().is_empty());

        intercepter.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_page_releases_event_stream() {
        let intercepter = started(&[]).await;
        let page: Arc<dyn Page> = Arc::new(crate::browser::HttpPage::new(
            reqwest::Client::new(),
            crate::browser::PageOptions::default(),
        ));

        intercepter.setup_page(page.clone()).await.unwrap();
        assert!(page.take_events().is_none());

        intercepter.teardown().await.unwrap();
    }

    #[test]
    fn test_site_certificates_are_cached_per_host() {
        let state = ProxyState {
            ledger: Arc::new(ExchangeLedger::new(
                1024,
                Arc::new(CaptureShared::new(Blocklist::new(&[] as &[&str]).unwrap())),
            )),
            client: reqwest::Client::new(),
            verbose: false,
            site_configs: Mutex::new(HashMap::new()),
        };
        let first = state.site_config("example.com").unwrap();
        let again = state.site_config("example.com").unwrap();
        let other = state.site_config("127.0.0.1").unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop("Proxy-Authorization"));
        assert!(is_hop_by_hop("Connection"));
        assert!(!is_hop_by_hop("Accept"));
    }
}
