// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Exchange dump for debugging captures

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::exchange::Exchange;

const HEADER: &str = "\"url\"; \"response\"; \"startLine\"; \"bodyLength\"";

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// One CSV line for `exchange`
pub fn exchange_row(exchange: &Exchange) -> String {
    let url = quote(exchange.url().unwrap_or_default());
    match exchange.response() {
        Some(response) => format!(
            "{}; \"YES\"; {}; \"{}\"",
            url,
            quote(&response.start_line),
            response.body.len()
        ),
        None => format!("{}; \"NO\"", url),
    }
}

/// Write a `;`-separated listing of `exchanges` to `path`
pub fn write_exchanges_csv(path: &Path, exchanges: &[Exchange]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", HEADER)?;
    for exchange in exchanges {
        writeln!(out, "{}", exchange_row(exchange))?;
    }
    out.flush()?;

    tracing::debug!(path = %path.display(), count = exchanges.len(), "Exchange dump written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{GeneratedExchange, ParsedRequest, ProxyExchange};

    #[test]
    fn test_write_exchanges_csv() {
        let pending =
            ProxyExchange::from_request(ParsedRequest::new("GET", "https://example.com/")).unwrap();
        let generated = GeneratedExchange::new(
            "file:///screenshot.png",
            vec![("content-type".to_string(), "image/png".to_string())],
            vec![0u8; 12],
            true,
            "",
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchanges.csv");
        write_exchanges_csv(&path, &[pending.into(), generated.into()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "\"https://example.com/\"; \"NO\"");
        assert_eq!(
            lines[2],
            "\"file:///screenshot.png\"; \"YES\"; \"HTTP/1.1 200 OK\"; \"12\""
        );
    }
}
