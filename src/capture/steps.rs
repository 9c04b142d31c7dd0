// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Capture step list

use crate::config::CaptureOptions;

/// What a step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    DetectNonWebContent,
    WaitForLoad,
    PageInfo,
    BrowserScripts,
    NetworkIdle,
    ScrollUp,
    Screenshot,
    DomSnapshot,
    PdfSnapshot,
    Video,
    Certificates,
    ProvenanceSummary,
}

impl StepKind {
    /// Name used in progress logs
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::DetectNonWebContent => {
                "Out-of-browser detection and capture of non-web resource"
            }
            StepKind::WaitForLoad => "Wait for initial page load",
            StepKind::PageInfo => "Capture page info",
            StepKind::BrowserScripts => "Browser scripts",
            StepKind::NetworkIdle => "Wait for network idle",
            StepKind::ScrollUp => "Scroll-up",
            StepKind::Screenshot => "Screenshot",
            StepKind::DomSnapshot => "DOM snapshot",
            StepKind::PdfSnapshot => "PDF snapshot",
            StepKind::Video => "Out-of-browser capture of video as attachment (if any)",
            StepKind::Certificates => "Capturing certificates info",
            StepKind::ProvenanceSummary => "Provenance summary",
        }
    }

    /// Whether the step has a one-time setup phase
    pub fn has_setup(&self) -> bool {
        matches!(self, StepKind::BrowserScripts)
    }
}

/// One entry of the step list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStep {
    pub kind: StepKind,
    /// Run even once the capture left the CAPTURE state
    pub always_run: bool,
    /// Skip when the target is not an HTML page
    pub web_page_only: bool,
}

impl CaptureStep {
    fn new(kind: StepKind, always_run: bool, web_page_only: bool) -> Self {
        Self {
            kind,
            always_run,
            web_page_only,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Ordered steps for `options`
pub fn build_steps(options: &CaptureOptions) -> Vec<CaptureStep> {
    let bypass = options.attachments_bypass_limits;
    let mut steps = vec![
        CaptureStep::new(StepKind::DetectNonWebContent, true, false),
        CaptureStep::new(StepKind::WaitForLoad, false, true),
        CaptureStep::new(StepKind::PageInfo, bypass, true),
    ];

    if options.runs_behaviors() {
        steps.push(CaptureStep::new(StepKind::BrowserScripts, false, true));
    }

    steps.push(CaptureStep::new(StepKind::NetworkIdle, false, true));
    steps.push(CaptureStep::new(StepKind::ScrollUp, bypass, true));

    let optional = [
        (options.screenshot, StepKind::Screenshot, true),
        (options.dom_snapshot, StepKind::DomSnapshot, true),
        (options.pdf_snapshot, StepKind::PdfSnapshot, true),
        (options.capture_video_as_attachment, StepKind::Video, true),
        (
            options.capture_certificates_as_attachment,
            StepKind::Certificates,
            false,
        ),
        (options.provenance_summary, StepKind::ProvenanceSummary, false),
    ];

    steps.extend(
        optional
            .into_iter()
            .filter(|(enabled, _, _)| *enabled)
            .map(|(_, kind, web_page_only)| CaptureStep::new(kind, bypass, web_page_only)),
    );

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(steps: &[CaptureStep]) -> Vec<StepKind> {
        steps.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_default_steps() {
        let steps = build_steps(&CaptureOptions::default());
        assert_eq!(
            kinds(&steps),
            vec![
                StepKind::DetectNonWebContent,
                StepKind::WaitForLoad,
                StepKind::PageInfo,
                StepKind::BrowserScripts,
                StepKind::NetworkIdle,
                StepKind::ScrollUp,
                StepKind::Screenshot,
                StepKind::PdfSnapshot,
                StepKind::Video,
                StepKind::Certificates,
                StepKind::ProvenanceSummary,
            ]
        );
        assert!(steps[0].always_run);
        assert!(!steps[0].web_page_only);
        assert!(!steps[1].always_run);
    }

    #[test]
    fn test_minimal_steps() {
        let options = CaptureOptions::default()
            .without_attachments()
            .behaviors(false)
            .attachments_bypass_limits(false);
        let steps = build_steps(&options);
        assert_eq!(
            kinds(&steps),
            vec![
                StepKind::DetectNonWebContent,
                StepKind::WaitForLoad,
                StepKind::PageInfo,
                StepKind::NetworkIdle,
                StepKind::ScrollUp,
            ]
        );
        assert!(!steps[2].always_run);
    }

    #[test]
    fn test_attachment_flags() {
        let options = CaptureOptions::default().dom_snapshot(true);
        let steps = build_steps(&options);
        let certs = steps.iter().find(|s| s.kind == StepKind::Certificates).unwrap();
        assert!(certs.always_run);
        assert!(!certs.web_page_only);
        let dom = steps.iter().find(|s| s.kind == StepKind::DomSnapshot).unwrap();
        assert!(dom.web_page_only);
        assert_eq!(StepKind::BrowserScripts.has_setup(), true);
    }
}
