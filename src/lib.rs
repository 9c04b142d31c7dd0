// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Scoop - Single-Page Web Archiving
//!
//! Drives a browser against one url, records every HTTP exchange on the way
//! and adds attachments the capture generates itself.
//!
//! ## Features
//!
//! - Capture pipeline: ordered, interruptible steps under a global deadline
//! - State machine: INIT, SETUP, CAPTURE then COMPLETE, PARTIAL or FAILED
//! - Two intercepters: direct browser events or a forwarding HTTP proxy
//! - Byte budget: recording stops once `maxCaptureSize` is reached
//! - Blocklist: literal, regex and IP/CIDR rules answered with a 403
//! - Attesters: forward proxy routing plus `Timestamp-Proof` and transient auth headers
//! - Attachments: screenshot, DOM and PDF snapshots, yt-dlp videos, crip certificates
//! - Provenance: capture IP, software, tool hashes, blocked requests
//!
//! ## Example
//!
//! ```rust,no_run
//! use scoop::{Capture, CaptureOptions, CaptureState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = CaptureOptions::default()
//!         .capture_timeout(30_000)
//!         .capture_video(false);
//!
//!     let capture = Capture::capture("https://example.com", options, None).await?;
//!
//!     if capture.state() != CaptureState::Failed {
//!         let summary = capture.summary()?;
//!         println!("{}", serde_json::to_string_pretty(&summary)?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod attester;
pub mod blocklist;
pub mod browser;
pub mod capture;
pub mod config;
pub mod debug_kit;
pub mod error;
pub mod exchange;
pub mod headers;
pub mod intercepter;
pub mod tools;

// Re-exports for convenience

// Capture
pub use capture::{filter_url, Capture, CaptureState, CaptureSummary, Attachments};
pub use capture::{PageInfo, ProvenanceInfo, Certificate};

// Configuration
pub use config::{CaptureOptions, IntercepterKind, LogLevel};

// Attesters
pub use attester::{load_attester, Attester, AttesterAuth, AttesterOptions, ForwardProxy, StandardAttester};

// Blocklist and headers
pub use blocklist::{BlockedRequest, Blocklist, BlocklistRule};
pub use headers::{CustomHeader, CustomHeaders, HeaderScope};

// Exchanges
pub use exchange::{Exchange, GeneratedExchange, ProxyExchange, ParsedRequest, ParsedResponse};

// Intercepters
pub use intercepter::{create_intercepter, ExchangeLedger, Intercepter};

// Browser backend
pub use browser::{Browser, BrowserLauncher, HttpBrowserLauncher, Page, NetworkEvent};

// Archives
pub use archive::{ArchiveInput, ArchiveWriter, JsonArchiveWriter};

// Errors
pub use error::{Error, ErrorContext, ErrorKind, Result};

/// Software name recorded in provenance
pub const SOFTWARE: &str = "Scoop";

/// Scoop version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
