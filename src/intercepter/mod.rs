// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Intercepters
//!
//! An intercepter sits between the browser and the network, recording every
//! exchange into the capture's [`ExchangeLedger`]. Two transports exist:
//! direct interception of browser events, and a forwarding proxy that
//! records raw bytes.

mod direct;
mod forwarding;
mod ledger;

pub use direct::{DirectIntercepter, LedgerRouter};
pub use forwarding::{ForwardingIntercepter, ProxyConfig};
pub use ledger::{ExchangeLedger, ABORTED_BODY};

use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::{Page, ProxySettings};
use crate::config::{CaptureOptions, IntercepterKind};
use crate::error::Result;

/// Intercepter capability set
#[async_trait]
pub trait Intercepter: Send + Sync {
    fn kind(&self) -> IntercepterKind;

    /// Exchange bookkeeping
    fn ledger(&self) -> &Arc<ExchangeLedger>;

    /// Start listening, if the transport needs it
    async fn setup(&self) -> Result<()>;

    /// Attach to a freshly opened page
    async fn setup_page(&self, page: Arc<dyn Page>) -> Result<()>;

    /// Stop and flush pending events
    async fn teardown(&self) -> Result<()>;

    /// Proxy the browser page must go through
    fn browser_proxy(&self) -> Option<ProxySettings>;
}

/// Build the intercepter selected by `options.intercepter`
///
/// `upstream` is the attester forward proxy, if any.
pub fn create_intercepter(
    options: &CaptureOptions,
    ledger: Arc<ExchangeLedger>,
    upstream: Option<ProxySettings>,
) -> Box<dyn Intercepter> {
    match options.intercepter {
        IntercepterKind::Direct => Box::new(DirectIntercepter::new(ledger)),
        IntercepterKind::Forwarding => Box::new(ForwardingIntercepter::new(
            ledger,
            ProxyConfig::from_options(options),
            upstream,
        )),
    }
}
