// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTML pages generated as attachments

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::provenance::ProvenanceInfo;

/// Escape text for HTML element and attribute content
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}

fn row(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        out,
        "<tr><th>{}</th><td>{}</td></tr>",
        escape(label),
        escape(value)
    );
}

/// `provenance-summary.html`
pub fn render_provenance_summary(
    info: &ProvenanceInfo,
    url: &str,
    date: DateTime<Utc>,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>Provenance Summary</h1>");
    let _ = writeln!(
        body,
        "<p>This archive was captured from <a href=\"{0}\">{0}</a> on {1}.</p>",
        escape(url),
        escape(&date.to_rfc3339())
    );

    body.push_str("<table>\n");
    row(&mut body, "Capture IP", &info.capture_ip);
    row(&mut body, "User agent", &info.user_agent);
    row(&mut body, "Software", &format!("{} {}", info.software, info.version));
    row(&mut body, "Operating system", &info.os_type);
    row(&mut body, "CPU architecture", &info.cpu_architecture);
    if !info.yt_dlp_hash.is_empty() {
        row(&mut body, "yt-dlp", &info.yt_dlp_hash);
    }
    if !info.crip_hash.is_empty() {
        row(&mut body, "crip", &info.crip_hash);
    }
    body.push_str("</table>\n");

    if !info.blocked_requests.is_empty() {
        body.push_str("<h2>Blocked requests</h2>\n<table>\n");
        for blocked in &info.blocked_requests {
            row(&mut body, &blocked.candidate, &blocked.rule);
        }
        body.push_str("</table>\n");
    }

    if !info.certificates.is_empty() {
        body.push_str("<h2>Certificates</h2>\n<ul>\n");
        for cert in &info.certificates {
            let _ = writeln!(body, "<li>{}.pem</li>", escape(&cert.host));
        }
        body.push_str("</ul>\n");
    }

    let options = serde_json::to_string_pretty(&info.options).unwrap_or_default();
    let _ = writeln!(body, "<h2>Options</h2>\n<pre>{}</pre>", escape(&options));

    page("Provenance Summary", &body)
}

/// Inputs of `video-extracted-summary.html`
#[derive(Debug, Default)]
pub struct VideoSummary<'a> {
    pub url: &'a str,
    pub now: DateTime<Utc>,
    pub video_saved: bool,
    pub metadata_saved: bool,
    pub subtitles_saved: bool,
    /// Video file stem to subtitle locales
    pub videos: BTreeMap<String, Vec<String>>,
    pub metadata: &'a [serde_json::Value],
}

/// `video-extracted-summary.html`
pub fn render_video_summary(summary: &VideoSummary<'_>) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>Extracted video data</h1>");
    let _ = writeln!(
        body,
        "<p>Video data extracted from <a href=\"{0}\">{0}</a> on {1}.</p>",
        escape(summary.url),
        escape(&summary.now.to_rfc3339())
    );

    if summary.video_saved {
        body.push_str("<h2>Videos</h2>\n<ul>\n");
        for (index, (stem, locales)) in summary.videos.iter().enumerate() {
            let title = summary
                .metadata
                .get(index)
                .and_then(|m| m.get("title"))
                .and_then(|t| t.as_str())
                .unwrap_or(stem);

            let _ = write!(
                body,
                "<li><a href=\"file:///{}.mp4\">{}</a>",
                escape(stem),
                escape(title)
            );
            if summary.subtitles_saved && !locales.is_empty() {
                body.push_str(" (subtitles: ");
                let links: Vec<String> = locales
                    .iter()
                    .map(|locale| {
                        format!(
                            "<a href=\"file:///{}.{}.vtt\">{}</a>",
                            escape(stem),
                            escape(locale),
                            escape(locale)
                        )
                    })
                    .collect();
                body.push_str(&links.join(", "));
                body.push(')');
            }
            body.push_str("</li>\n");
        }
        body.push_str("</ul>\n");
    } else {
        body.push_str("<p>No video could be saved.</p>\n");
    }

    if summary.metadata_saved {
        body.push_str(
            "<p>Metadata: <a href=\"file:///video-extracted-metadata.json\">video-extracted-metadata.json</a></p>\n",
        );
    }

    page("Extracted video data", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::BlockedRequest;
    use crate::capture::provenance::Certificate;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_provenance_summary() {
        let info = ProvenanceInfo {
            capture_ip: "203.0.113.7".to_string(),
            blocked_requests: vec![BlockedRequest {
                candidate: "https://tracker.example/x".to_string(),
                rule: "tracker.example".to_string(),
            }],
            certificates: vec![Certificate {
                host: "example.com".to_string(),
                pem: "-----BEGIN CERTIFICATE-----".to_string(),
            }],
            ..Default::default()
        };

        let html = render_provenance_summary(&info, "https://example.com/?a=1&b=2", Utc::now());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("203.0.113.7"));
        assert!(html.contains("https://example.com/?a=1&amp;b=2"));
        assert!(html.contains("tracker.example"));
        assert!(html.contains("example.com.pem"));
    }

    #[test]
    fn test_video_summary() {
        let metadata = vec![serde_json::json!({"title": "Launch <video>"})];
        let mut videos = BTreeMap::new();
        videos.insert(
            "video-extracted-1".to_string(),
            vec!["en".to_string(), "fr-FR".to_string()],
        );

        let html = render_video_summary(&VideoSummary {
            url: "https://example.com/watch",
            now: Utc::now(),
            video_saved: true,
            metadata_saved: true,
            subtitles_saved: true,
            videos,
            metadata: &metadata,
        });

        assert!(html.contains("file:///video-extracted-1.mp4"));
        assert!(html.contains("Launch &lt;video&gt;"));
        assert!(html.contains("file:///video-extracted-1.fr-FR.vtt"));
        assert!(html.contains("video-extracted-metadata.json"));
    }
}
