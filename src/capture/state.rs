// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Capture state machine

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaptureState {
    Init,
    Setup,
    Capture,
    Complete,
    Partial,
    Failed,
}

impl CaptureState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaptureState::Complete | CaptureState::Partial | CaptureState::Failed
        )
    }

    /// Whether the capture produced something worth exporting
    pub fn is_exportable(&self) -> bool {
        matches!(self, CaptureState::Complete | CaptureState::Partial)
    }

    /// Whether `self -> to` is an edge of the state machine
    pub fn can_transition_to(&self, to: CaptureState) -> bool {
        use CaptureState::*;

        matches!(
            (self, to),
            (Init, Setup)
                | (Init, Failed)
                | (Setup, Capture)
                | (Setup, Failed)
                | (Capture, Complete)
                | (Capture, Partial)
                | (Capture, Failed)
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Init => "INIT",
            CaptureState::Setup => "SETUP",
            CaptureState::Capture => "CAPTURE",
            CaptureState::Complete => "COMPLETE",
            CaptureState::Partial => "PARTIAL",
            CaptureState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Shared, forward-only capture state
#[derive(Debug)]
pub struct StateCell {
    state: Mutex<CaptureState>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CaptureState::Init),
        }
    }

    /// Snapshot of the current state
    pub fn get(&self) -> CaptureState {
        *self.state.lock()
    }

    /// Move to `to` if allowed; returns whether the state changed
    pub fn transition(&self, to: CaptureState) -> bool {
        let mut state = self.state.lock();
        if !state.can_transition_to(to) {
            tracing::trace!(from = %*state, to = %to, "State transition ignored");
            return false;
        }
        tracing::debug!(from = %*state, to = %to, "State transition");
        *state = to;
        true
    }

    pub fn is(&self, state: CaptureState) -> bool {
        self.get() == state
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
