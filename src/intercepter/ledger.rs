// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Exchange bookkeeping shared by all intercepters
//!
//! The ledger owns the live exchange list and the running byte counter.
//! Event handlers may call into it concurrently; every mutation happens
//! under a single mutex and only appends or increments.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use crate::blocklist::BlockedRequest;
use crate::browser::{RequestInfo, ResponseInfo, ERR_ABORTED};
use crate::capture::{CaptureShared, CaptureState};
use crate::error::{Error, Result};
use crate::exchange::{ParsedRequest, ParsedResponse, ProxyExchange};
use crate::headers::HeaderScope;

/// Body of the response synthesized for aborted requests
pub const ABORTED_BODY: &str = "net::ERR_ABORTED\nThe network request was aborted by the client. Possible reasons include user navigation, JavaScript abort, or network issues.";

const DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// Method and url path, without the query
type CorrelationKey = (String, String);

#[derive(Debug, Default)]
struct LedgerInner {
    exchanges: Vec<ProxyExchange>,
    byte_length: u64,
    by_key: HashMap<CorrelationKey, Vec<usize>>,
}

impl LedgerInner {
    fn push(&mut self, exchange: ProxyExchange, key: Option<CorrelationKey>) -> usize {
        let index = self.exchanges.len();
        self.exchanges.push(exchange);
        if let Some(key) = key {
            self.by_key.entry(key).or_default().push(index);
        }
        index
    }
}

/// Live exchange list of one capture
#[derive(Debug)]
pub struct ExchangeLedger {
    inner: Mutex<LedgerInner>,
    recording: AtomicBool,
    limit_reached: AtomicBool,
    max_capture_size: u64,
    shared: Arc<CaptureShared>,
}

impl ExchangeLedger {
    pub fn new(max_capture_size: u64, shared: Arc<CaptureShared>) -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            recording: AtomicBool::new(true),
            limit_reached: AtomicBool::new(false),
            max_capture_size,
            shared,
        }
    }

    pub fn shared(&self) -> &Arc<CaptureShared> {
        &self.shared
    }

    pub fn max_capture_size(&self) -> u64 {
        self.max_capture_size
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Toggle recording; it stays off once the size limit tripped
    pub fn set_recording(&self, recording: bool) {
        let recording = recording && !self.limit_reached.load(Ordering::SeqCst);
        self.recording.store(recording, Ordering::SeqCst);
    }

    /// Bytes of intercepted bodies recorded so far
    pub fn byte_length(&self) -> u64 {
        self.inner.lock().byte_length
    }

    pub fn len(&self) -> usize {
        self.inner.lock().exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().exchanges.is_empty()
    }

    /// Snapshot of the exchange list
    pub fn exchanges(&self) -> Vec<ProxyExchange> {
        self.inner.lock().exchanges.clone()
    }

    /// Move the exchange list out of the ledger
    pub fn take_exchanges(&self) -> Vec<ProxyExchange> {
        let mut inner = self.inner.lock();
        inner.by_key.clear();
        std::mem::take(&mut inner.exchanges)
    }

    fn correlation_key(method: &str, url: &Url) -> CorrelationKey {
        (method.to_ascii_uppercase(), url.path().to_string())
    }

    fn archived_request(&self, request: &RequestInfo) -> ParsedRequest {
        let mut parsed = request.to_parsed();
        parsed.headers = self
            .shared
            .custom_headers
            .strip_transient(HeaderScope::Request, parsed.headers);
        parsed
    }

    fn archived_response(&self, mut response: ParsedResponse) -> ParsedResponse {
        response.headers = self
            .shared
            .custom_headers
            .strip_transient(HeaderScope::Response, response.headers);
        response
    }

    /// Record an outgoing request; returns its index in the list
    pub fn on_request(&self, request: &RequestInfo) -> Option<usize> {
        if !self.is_recording() {
            return None;
        }

        let parsed = self.archived_request(request);
        let body_len = parsed.body.len() as u64;
        let mut exchange = match ProxyExchange::from_request(parsed) {
            Ok(exchange) => exchange,
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "Request not recorded");
                return None;
            }
        };
        exchange.set_entry_point(request.is_navigation);

        let key = exchange
            .url()
            .map(|url| Self::correlation_key(&request.method, url));

        let index = {
            let mut inner = self.inner.lock();
            inner.byte_length += body_len;
            inner.push(exchange, key)
        };

        self.check_and_enforce_size_limit();
        Some(index)
    }

    /// Attach a completed response to its request
    pub fn on_response(&self, request: &RequestInfo, response: &ResponseInfo) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }

        let url = Url::parse(&request.url)?;
        let key = Self::correlation_key(&request.method, &url);
        let parsed = self.archived_response(response.to_parsed(request));
        let body_len = parsed.body.len() as u64;

        {
            let mut inner = self.inner.lock();
            let candidates = inner.by_key.get(&key).cloned().unwrap_or_default();

            let pending = candidates.iter().copied().find(|&i| {
                let exchange = &inner.exchanges[i];
                !exchange.has_response() && exchange.url() == Some(&url)
            });

            match pending {
                Some(index) => inner.exchanges[index].set_response_parsed(parsed),
                None => {
                    let after_redirect = candidates.iter().any(|&i| {
                        inner.exchanges[i]
                            .response_status()
                            .map_or(false, is_redirect_status)
                    });
                    if !after_redirect {
                        return Err(Error::correlation(&request.method, &request.url));
                    }

                    let mut exchange = ProxyExchange::from_request(self.archived_request(request))?;
                    exchange.set_entry_point(request.is_navigation);
                    exchange.set_response_parsed(parsed);
                    inner.byte_length += request.body.len() as u64;
                    inner.push(exchange, Some(key));
                }
            }
            inner.byte_length += body_len;
        }

        self.check_and_enforce_size_limit();
        Ok(())
    }

    /// Close out a failed request
    ///
    /// Client aborts get a synthetic `000 Aborted` response; other failures
    /// are only logged.
    pub fn on_request_failed(&self, request: &RequestInfo, error_text: &str) {
        if error_text != ERR_ABORTED {
            tracing::debug!(url = %request.url, error = %error_text, "Request failed");
            return;
        }

        let aborted = ResponseInfo::new(0, "Aborted").body(ABORTED_BODY);
        if let Err(e) = self.on_response(request, &aborted) {
            tracing::debug!(url = %request.url, error = %e, "Aborted request not recorded");
        }
    }

    /// Record a request/response pair captured as raw bytes
    pub fn record_raw(&self, url: &str, request_raw: &[u8], response_raw: &[u8]) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }

        let mut exchange = ProxyExchange::new();
        exchange.set_url(url)?;
        exchange.append_request_raw(request_raw);
        exchange.append_response_raw(response_raw);
        let body_len = exchange.body_len() as u64;

        let key = exchange.request_parsed().and_then(|request| {
            exchange
                .url()
                .map(|url| Self::correlation_key(&request.method, url))
        });

        {
            let mut inner = self.inner.lock();
            inner.byte_length += body_len;
            inner.push(exchange, key);
        }

        self.check_and_enforce_size_limit();
        Ok(())
    }

    /// Record a pair fetched outside of the browser
    pub fn record_out_of_band(&self, mut request: ParsedRequest, response: ParsedResponse) -> Result<()> {
        if !self.is_recording() {
            return Ok(());
        }

        request.headers = self
            .shared
            .custom_headers
            .strip_transient(HeaderScope::Request, request.headers);

        let method = request.method.clone();
        let body_len = (request.body.len() + response.body.len()) as u64;
        let mut exchange = ProxyExchange::from_request(request)?;
        exchange.set_entry_point(true);
        exchange.set_response_parsed(self.archived_response(response));
        let key = exchange.url().map(|url| Self::correlation_key(&method, url));

        {
            let mut inner = self.inner.lock();
            inner.byte_length += body_len;
            inner.push(exchange, key);
        }

        self.check_and_enforce_size_limit();
        Ok(())
    }

    /// Stop recording once the byte budget is spent
    ///
    /// Safe to call from concurrent callbacks; trips at most once.
    pub fn check_and_enforce_size_limit(&self) -> bool {
        if self.byte_length() < self.max_capture_size {
            return false;
        }

        self.recording.store(false, Ordering::SeqCst);
        if !self.limit_reached.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                max_capture_size = self.max_capture_size,
                "Max size reached. Ending interception"
            );
            self.shared.state.transition(CaptureState::Partial);
        }
        true
    }

    /// Blocklist hit for `url`, by url, host or resolved address
    pub async fn check_blocklist(&self, url: &Url) -> Option<BlockedRequest> {
        let blocklist = &self.shared.blocklist;
        if blocklist.is_empty() {
            return None;
        }

        if let Some(blocked) = blocklist.check_url(url) {
            return Some(blocked);
        }

        let host = url.host_str()?;
        if host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>().is_ok() {
            return None;
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs: Vec<IpAddr> =
            match tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((host, port))).await {
                Ok(Ok(addrs)) => addrs.map(|a| a.ip()).collect(),
                _ => return None,
            };
        blocklist.check_addrs(&addrs)
    }

    /// Register a block and build the 403 answer
    pub fn block(&self, blocked: BlockedRequest) -> ResponseInfo {
        tracing::warn!("Blocking {} matching rule {}", blocked.candidate, blocked.rule);

        let body = format!(
            "During capture, request for {} matched blocklist rule {} and was blocked.",
            blocked.candidate, blocked.rule
        );
        self.shared.record_blocked(blocked);

        ResponseInfo::new(403, "Forbidden")
            .header("content-type", "text/plain; charset=utf-8")
            .body(body)
    }
}

fn is_redirect_status(status: u16) -> bool {
    (300..400).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::Blocklist;
    use crate::headers::CustomHeader;

    fn ledger(max: u64) -> ExchangeLedger {
        let shared = Arc::new(CaptureShared::new(
            Blocklist::new(&["tracker.example", "10.0.0.0/8"]).unwrap(),
        ));
        shared.state.transition(CaptureState::Setup);
        shared.state.transition(CaptureState::Capture);
        ExchangeLedger::new(max, shared)
    }

    fn ok(body: &str) -> ResponseInfo {
        ResponseInfo::new(200, "OK").body(body.to_string())
    }

    #[test]
    fn test_request_response_correlation() {
        let ledger = ledger(1024);
        let a = RequestInfo::new("GET", "https://example.com/a.js");
        let b = RequestInfo::new("GET", "https://example.com/b.js");
        ledger.on_request(&a);
        ledger.on_request(&b);

        ledger.on_response(&b, &ok("b")).unwrap();
        ledger.on_response(&a, &ok("aa")).unwrap();

        let exchanges = ledger.exchanges();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(&exchanges[0].response().unwrap().body[..], b"aa");
        assert_eq!(&exchanges[1].response().unwrap().body[..], b"b");
        assert_eq!(ledger.byte_length(), 3);
    }

    #[test]
    fn test_same_url_matches_earliest_unresolved() {
        let ledger = ledger(1024);
        let request = RequestInfo::new("GET", "https://example.com/poll");
        ledger.on_request(&request);
        ledger.on_request(&request);

        ledger.on_response(&request, &ok("first")).unwrap();
        ledger.on_response(&request, &ok("second")).unwrap();

        let exchanges = ledger.exchanges();
        assert_eq!(&exchanges[0].response().unwrap().body[..], b"first");
        assert_eq!(&exchanges[1].response().unwrap().body[..], b"second");
    }

    #[test]
    fn test_redirect_hop_opens_new_exchange() {
        let ledger = ledger(1024);
        let first = RequestInfo::navigation("http://example.com/");
        ledger.on_request(&first);
        ledger
            .on_response(
                &first,
                &ResponseInfo::new(301, "Moved Permanently").header("location", "https://example.com/"),
            )
            .unwrap();

        let second = RequestInfo::navigation("https://example.com/");
        ledger.on_response(&second, &ok("<html></html>")).unwrap();

        let exchanges = ledger.exchanges();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].response_status(), Some(301));
        assert_eq!(exchanges[1].response_status(), Some(200));
        assert_eq!(exchanges[1].url().unwrap().as_str(), "https://example.com/");
    }

    #[test]
    fn test_uncorrelated_response_is_dropped() {
        let ledger = ledger(1024);
        let request = RequestInfo::new("GET", "https://example.com/orphan");
        let err = ledger.on_response(&request, &ok("x")).unwrap_err();
        assert!(matches!(err, Error::Correlation { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_aborted_request_gets_synthetic_response() {
        let ledger = ledger(1024);
        let request = RequestInfo::new("GET", "https://example.com/slow");
        ledger.on_request(&request);
        ledger.on_request_failed(&request, ERR_ABORTED);

        let exchange = &ledger.exchanges()[0];
        let response = exchange.response().unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.start_line, "HTTP/1.1 000 Aborted");
        assert!(response.body.starts_with(b"net::ERR_ABORTED\n"));
    }

    #[test]
    fn test_other_failures_leave_exchange_open() {
        let ledger = ledger(1024);
        let request = RequestInfo::new("GET", "https://example.com/x");
        ledger.on_request(&request);
        ledger.on_request_failed(&request, "net::ERR_NAME_NOT_RESOLVED");
        assert!(!ledger.exchanges()[0].has_response());
    }

    #[test]
    fn test_size_limit_stops_recording() {
        let ledger = ledger(10);
        let request = RequestInfo::new("GET", "https://example.com/big");
        ledger.on_request(&request);
        ledger.on_response(&request, &ok("0123456789")).unwrap();

        assert!(!ledger.is_recording());
        assert_eq!(ledger.shared().state(), CaptureState::Partial);

        ledger.set_recording(true);
        assert!(!ledger.is_recording());
        assert_eq!(ledger.on_request(&RequestInfo::new("GET", "https://example.com/more")), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_size_limit_under_concurrency() {
        let ledger = Arc::new(ledger(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let request = RequestInfo::new("GET", format!("https://example.com/{}/{}", t, i));
                        ledger.on_request(&request);
                        let _ = ledger.on_response(&request, &ok("0123456789"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(ledger.byte_length() >= 1000);
        assert!(!ledger.is_recording());
        assert_eq!(ledger.shared().state(), CaptureState::Partial);
    }

    #[test]
    fn test_transient_headers_not_archived() {
        let ledger = ledger(1024);
        ledger
            .shared()
            .custom_headers
            .add(CustomHeader::request("Attester-Authorization", "Bearer t").transient());

        let request = RequestInfo::new("GET", "https://example.com/")
            .header("Attester-Authorization", "Bearer t")
            .header("Accept", "*/*");
        ledger.on_request(&request);

        let view = ledger.exchanges()[0].request().cloned().unwrap();
        assert!(view.headers.get("attester-authorization").is_none());
        assert!(view.headers.get("accept").is_some());
    }

    #[test]
    fn test_recording_off_ignores_traffic() {
        let ledger = ledger(1024);
        ledger.set_recording(false);
        let request = RequestInfo::new("GET", "https://example.com/");
        assert_eq!(ledger.on_request(&request), None);
        ledger.on_response(&request, &ok("x")).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.byte_length(), 0);
    }

    #[tokio::test]
    async fn test_block_answers_403() {
        let ledger = ledger(1024);
        let url = Url::parse("https://tracker.example/x").unwrap();
        let blocked = ledger.check_blocklist(&url).await.unwrap();
        assert_eq!(blocked.rule, "tracker.example");

        let response = ledger.block(blocked);
        assert_eq!(response.status, 403);
        assert!(String::from_utf8_lossy(&response.body)
            .contains("matched blocklist rule tracker.example and was blocked"));
        assert_eq!(ledger.shared().blocked_requests().len(), 1);

        let ip = Url::parse("http://10.1.2.3/").unwrap();
        assert_eq!(ledger.check_blocklist(&ip).await.unwrap().rule, "10.0.0.0/8");
        let allowed = Url::parse("http://11.0.0.1/").unwrap();
        assert!(ledger.check_blocklist(&allowed).await.is_none());
    }

    #[test]
    fn test_record_raw() {
        let ledger = ledger(1024);
        let request = ParsedRequest::new("GET", "http://example.com/raw").header("Host", "example.com");
        let response = ParsedResponse::new(200, "OK").body("hello");
        ledger
            .record_raw("http://example.com/raw", &request.to_raw(), &response.to_raw())
            .unwrap();

        let exchange = &ledger.exchanges()[0];
        assert_eq!(exchange.url().unwrap().as_str(), "http://example.com/raw");
        assert_eq!(exchange.response_status(), Some(200));
        assert_eq!(
            ledger.byte_length(),
            (request.to_raw().len() + response.to_raw().len()) as u64
        );
    }
}
