// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scripts evaluated in the captured page

/// Returns `{title, description, url, faviconUrl}`
pub const PAGE_INFO: &str = r#"(() => ({
  title: document.title,
  description: document.querySelector("meta[name='description']")?.content ?? null,
  url: window.location.href,
  faviconUrl: document.querySelector("link[rel*='icon']")?.href ?? null
}))()"#;

/// Returns `{width, height}` sized for a single-page PDF
pub const DOCUMENT_DIMENSIONS: &str = r#"(() => ({
  width: Math.max(document.body.scrollWidth, window.outerWidth),
  height: Math.max(document.body.scrollHeight, window.outerHeight) + 50
}))()"#;

pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0)";

pub const RUN_BEHAVIORS: &str = "self.__bx_behaviors.run()";

/// Extra height added below the document in PDF snapshots
pub const PDF_HEIGHT_PADDING: u32 = 50;

/// Init call configuring the behaviors script
pub fn behaviors_init(
    autofetch: bool,
    autoplay: bool,
    autoscroll: bool,
    site_specific: bool,
    timeout_ms: u64,
) -> String {
    format!(
        "self.__bx_behaviors.init({{\n  autofetch: {},\n  autoplay: {},\n  autoscroll: {},\n  siteSpecific: {},\n  timeout: {}\n}});",
        autofetch, autoplay, autoscroll, site_specific, timeout_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behaviors_init() {
        let script = behaviors_init(true, false, true, false, 20000);
        assert!(script.starts_with("self.__bx_behaviors.init({"));
        assert!(script.contains("autofetch: true"));
        assert!(script.contains("autoplay: false"));
        assert!(script.contains("timeout: 20000"));
    }
}
