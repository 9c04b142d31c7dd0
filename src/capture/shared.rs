// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! State shared between the capture controller and the intercepter

use parking_lot::Mutex;

use super::state::{CaptureState, StateCell};
use crate::blocklist::{BlockedRequest, Blocklist};
use crate::headers::CustomHeaders;

/// Capture-wide shared state
#[derive(Debug)]
pub struct CaptureShared {
    pub state: StateCell,
    pub blocklist: Blocklist,
    pub custom_headers: CustomHeaders,
    blocked_requests: Mutex<Vec<BlockedRequest>>,
}

impl CaptureShared {
    pub fn new(blocklist: Blocklist) -> Self {
        Self {
            state: StateCell::new(),
            blocklist,
            custom_headers: CustomHeaders::new(),
            blocked_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state.get()
    }

    pub fn record_blocked(&self, blocked: BlockedRequest) {
        self.blocked_requests.lock().push(blocked);
    }

    /// Blocked requests, in blocking order
    pub fn blocked_requests(&self) -> Vec<BlockedRequest> {
        self.blocked_requests.lock().clone()
    }
}
