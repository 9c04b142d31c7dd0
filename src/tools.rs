// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! External tool invocation

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Run `path` with `args`, returning stdout
///
/// The process is killed when `timeout` elapses. A non-zero exit status is
/// an error carrying stderr.
pub async fn execute<S: AsRef<str>>(path: &Path, args: &[S], timeout: Duration) -> Result<String> {
    let tool = tool_name(path);
    let mut command = Command::new(path);
    command
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(tool = %tool, "Running external tool");
    let child = command
        .spawn()
        .map_err(|e| Error::external_tool(&tool, format!("could not start: {}", e)))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| Error::external_tool(&tool, format!("timed out after {} ms", timeout.as_millis())))?
        .map_err(|e| Error::external_tool(&tool, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::external_tool(
            &tool,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Check that `path --version` prints a version matching `pattern`
pub async fn probe_version(path: &Path, pattern: &Regex, timeout: Duration) -> Result<String> {
    let output = execute(path, &["--version"], timeout).await?;
    let version = output.trim();

    if !pattern.is_match(version) {
        return Err(Error::external_tool(
            tool_name(path),
            format!("unexpected version output {:?}", version),
        ));
    }
    Ok(version.to_string())
}

/// `sha256:<hex>` digest of a file
pub async fn sha256_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(sha256_prefixed(&bytes))
}

/// `sha256:<hex>` digest of bytes
pub fn sha256_prefixed(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn tool_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script(dir.path(), "echoer", "echo \"$1-$2\"");
        let out = execute(&tool, &["a", "b"], Duration::from_secs(5)).await.unwrap();
        assert_eq!(out.trim(), "a-b");
    }

    #[tokio::test]
    async fn test_execute_failures() {
        let dir = tempfile::tempdir().unwrap();
        let failing = script(dir.path(), "failing", "echo oops >&2; exit 3");
        let err = execute(&failing, &[] as &[&str], Duration::from_secs(5)).await.unwrap_err();
        assert!(err.is_external_tool());
        assert!(err.to_string().contains("oops"));

        let slow = script(dir.path(), "slow", "sleep 5");
        let err = execute(&slow, &[] as &[&str], Duration::from_millis(200)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let missing = dir.path().join("missing");
        assert!(execute(&missing, &[] as &[&str], Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_version() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").unwrap();

        let good = script(dir.path(), "good", "echo 2024.08.06");
        assert_eq!(
            probe_version(&good, &pattern, Duration::from_secs(5)).await.unwrap(),
            "2024.08.06"
        );

        let bad = script(dir.path(), "bad", "echo not-a-version");
        assert!(probe_version(&bad, &pattern, Duration::from_secs(5)).await.is_err());
    }

    #[test]
    fn test_sha256_prefixed() {
        assert_eq!(
            sha256_prefixed(b"abc"),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool");
        std::fs::write(&path, b"abc").unwrap();

        let hash = tokio_test::block_on(sha256_file(&path)).unwrap();
        assert_eq!(hash, sha256_prefixed(b"abc"));
        assert!(tokio_test::block_on(sha256_file(&dir.path().join("missing"))).is_err());
    }
}
