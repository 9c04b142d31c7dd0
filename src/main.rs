// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scoop CLI - Single-Page Web Archiving
//!
//! Runs one capture with the built-in HTTP backend and prints its summary.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use tracing_subscriber::EnvFilter;

use scoop::{Capture, CaptureOptions, CaptureState, IntercepterKind, JsonArchiveWriter};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "capture" => {
            let cli = match CaptureArgs::parse(&args[2..]) {
                Ok(cli) => cli,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    eprintln!("Usage: scoop capture <url> [OPTIONS]");
                    return ExitCode::from(1);
                }
            };

            init_logging(&cli.options);

            match run_capture(cli).await {
                Ok(CaptureState::Complete) => ExitCode::SUCCESS,
                Ok(CaptureState::Partial) => ExitCode::from(2),
                Ok(_) => ExitCode::from(1),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    ExitCode::from(1)
                }
            }
        }
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("scoop {}", scoop::VERSION);
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn init_logging(options: &CaptureOptions) {
    let directive = options
        .log_level
        .directive()
        .parse()
        .unwrap_or_else(|_| "scoop=info".parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!(
        r#"Scoop - Single-Page Web Archiving

USAGE:
    scoop <COMMAND> [OPTIONS]

COMMANDS:
    capture <url>   Capture a page and print the capture summary
    help            Show this help message
    version         Show version information

CAPTURE OPTIONS:
    --intercepter <direct|forwarding>   Traffic recording method (default: direct)
    --capture-timeout <ms>              Capture deadline (default: 60000)
    --max-size <bytes>                  Byte budget for recorded traffic
    --blocklist <rule>                  Blocklist rule, repeatable; replaces the defaults
    --no-screenshot                     Skip the screenshot
    --no-pdf                            Skip the PDF snapshot
    --dom-snapshot                      Add a DOM snapshot
    --no-video                          Skip video extraction
    --no-certs                          Skip certificate capture
    --no-provenance                     Skip the provenance summary
    --output <file>                     Write a JSON archive to <file>

EXIT CODES:
    0   capture COMPLETE
    2   capture PARTIAL
    1   capture FAILED or invalid input

EXAMPLES:
    scoop capture https://example.com
    scoop capture https://example.com --no-video --no-certs --output example.json
"#
    );
}

#[derive(Debug)]
struct CaptureArgs {
    url: String,
    options: CaptureOptions,
    output: Option<PathBuf>,
}

impl CaptureArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut url = None;
        let mut options = CaptureOptions::default();
        let mut output = None;
        let mut blocklist: Vec<String> = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} requires a value", name))
            };

            match arg.as_str() {
                "--intercepter" => {
                    options.intercepter = value(arg.as_str())?.parse::<IntercepterKind>()?;
                }
                "--capture-timeout" => {
                    options.capture_timeout = value(arg.as_str())?
                        .parse()
                        .context("--capture-timeout must be a number of milliseconds")?;
                }
                "--max-size" => {
                    options.max_capture_size = value(arg.as_str())?
                        .parse()
                        .context("--max-size must be a number of bytes")?;
                }
                "--blocklist" => blocklist.push(value(arg.as_str())?),
                "--output" => output = Some(PathBuf::from(value(arg.as_str())?)),
                "--no-screenshot" => options.screenshot = false,
                "--no-pdf" => options.pdf_snapshot = false,
                "--dom-snapshot" => options.dom_snapshot = true,
                "--no-video" => options.capture_video_as_attachment = false,
                "--no-certs" => options.capture_certificates_as_attachment = false,
                "--no-provenance" => options.provenance_summary = false,
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                positional => {
                    if url.replace(positional.to_string()).is_some() {
                        bail!("Only one url can be captured at a time");
                    }
                }
            }
        }

        if !blocklist.is_empty() {
            options.blocklist = blocklist;
        }

        Ok(Self {
            url: url.ok_or_else(|| anyhow!("Missing url"))?,
            options,
            output,
        })
    }
}

async fn run_capture(cli: CaptureArgs) -> anyhow::Result<CaptureState> {
    let capture = Capture::capture(&cli.url, cli.options, None)
        .await
        .with_context(|| format!("Capture of {} could not start", cli.url))?;

    let state = capture.state();
    if state == CaptureState::Failed {
        eprintln!("Capture of {} failed", cli.url);
        return Ok(state);
    }

    let summary = capture.summary()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = cli.output {
        let bytes = capture.export(&JsonArchiveWriter::new())?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Could not write {}", path.display()))?;
        eprintln!("Archive written to {}", path.display());
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_capture_args() {
        let cli = CaptureArgs::parse(&args(&[
            "https://example.com",
            "--intercepter",
            "forwarding",
            "--capture-timeout",
            "1000",
            "--no-video",
            "--blocklist",
            "tracker.example",
            "--output",
            "out.json",
        ]))
        .unwrap();

        assert_eq!(cli.url, "https://example.com");
        assert_eq!(cli.options.intercepter, IntercepterKind::Forwarding);
        assert_eq!(cli.options.capture_timeout, 1000);
        assert!(!cli.options.capture_video_as_attachment);
        assert_eq!(cli.options.blocklist, vec!["tracker.example"]);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_parse_capture_args_errors() {
        assert!(CaptureArgs::parse(&args(&[])).is_err());
        assert!(CaptureArgs::parse(&args(&["https://a.example", "https://b.example"])).is_err());
        assert!(CaptureArgs::parse(&args(&["https://a.example", "--max-size"])).is_err());
        assert!(CaptureArgs::parse(&args(&["https://a.example", "--bogus"])).is_err());
    }
}
