// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Direct interception of browser network events

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use url::Url;

use super::{ExchangeLedger, Intercepter};
use crate::browser::{InterceptAction, NetworkEvent, Page, ProxySettings, RequestInfo, RequestRouter};
use crate::config::IntercepterKind;
use crate::error::Result;
use crate::headers::HeaderScope;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Router enforcing the blocklist and injecting request headers
pub struct LedgerRouter {
    ledger: Arc<ExchangeLedger>,
}

impl LedgerRouter {
    pub fn new(ledger: Arc<ExchangeLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl RequestRouter for LedgerRouter {
    async fn route(&self, request: &mut RequestInfo) -> InterceptAction {
        if let Ok(url) = Url::parse(&request.url) {
            if let Some(blocked) = self.ledger.check_blocklist(&url).await {
                return InterceptAction::Fulfill(self.ledger.block(blocked));
            }
        }

        self.ledger
            .shared()
            .custom_headers
            .apply(HeaderScope::Request, &mut request.headers);
        InterceptAction::Continue
    }
}

/// Intercepter fed by the page's own event stream
pub struct DirectIntercepter {
    ledger: Arc<ExchangeLedger>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DirectIntercepter {
    pub fn new(ledger: Arc<ExchangeLedger>) -> Self {
        Self {
            ledger,
            task: Mutex::new(None),
        }
    }

    async fn consume(ledger: Arc<ExchangeLedger>, mut events: UnboundedReceiver<NetworkEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                NetworkEvent::Request(request) => {
                    ledger.on_request(&request);
                }
                NetworkEvent::RequestFinished { request, response } => {
                    if let Err(e) = ledger.on_response(&request, &response) {
                        tracing::warn!(error = %e, "Response not recorded");
                    }
                }
                NetworkEvent::RequestFailed {
                    request,
                    error_text,
                } => ledger.on_request_failed(&request, &error_text),
            }
        }
        tracing::debug!("Network event stream closed");
    }
}

#[async_trait]
impl Intercepter for DirectIntercepter {
    fn kind(&self) -> IntercepterKind {
        IntercepterKind::Direct
    }

    fn ledger(&self) -> &Arc<ExchangeLedger> {
        &self.ledger
    }

    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn setup_page(&self, page: Arc<dyn Page>) -> Result<()> {
        page.set_router(Arc::new(LedgerRouter::new(self.ledger.clone())));

        match page.take_events() {
            Some(events) => {
                let handle = tokio::spawn(Self::consume(self.ledger.clone(), events));
                *self.task.lock() = Some(handle);
            }
            None => tracing::warn!("Page event stream already taken; traffic will not be recorded"),
        }
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        let handle = self.task.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Network events still pending at teardown");
                handle.abort();
            }
        }
        Ok(())
    }

    fn browser_proxy(&self) -> Option<ProxySettings> {
        None
    }
}
