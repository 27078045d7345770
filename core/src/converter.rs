//! Binary ⇄ JSON conversion through an external tool.
//!
//! The tool is invoked as `<program> [args...] -e <asset>` to export
//! `<asset-stem>.json` next to the asset, and `<program> [args...] -i <json>`
//! to rebuild `<json-stem>.uasset`. It must exit zero and produce the
//! expected file; anything else is [`ChromaError::ConversionFailed`].

use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::config::ConverterConfig;
use crate::error::ChromaError;
use crate::error::Result;
use crate::fs_util::remove_if_exists;

/// Lines of converter stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 8;

/// JSON file the export step produces for `asset`.
pub fn exported_json_path(asset: &Path) -> PathBuf {
    asset.with_extension("json")
}

/// Binary asset the import step produces for `json`.
pub fn imported_asset_path(json: &Path) -> PathBuf {
    json.with_extension("uasset")
}

/// Converter seam. The session only talks to this trait, so tests can swap
/// in a scripted implementation.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Export `asset` to JSON and return the JSON path.
    async fn export_json(&self, asset: &Path, cancel: &CancellationToken) -> Result<PathBuf>;

    /// Rebuild the binary asset from `json` and return the asset path.
    async fn import_json(&self, json: &Path, cancel: &CancellationToken) -> Result<PathBuf>;
}

/// Runs the converter as a child process.
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(crate::config::DEFAULT_CONVERTER_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Arguments placed before the `-e`/`-i` flag.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(
        &self,
        flag: &str,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if !tokio::fs::try_exists(input)
            .await
            .map_err(|e| ChromaError::io(input, e))?
        {
            return Err(ChromaError::NotFound {
                path: input.to_path_buf(),
            });
        }
        let output_existed = tokio::fs::try_exists(output).await.unwrap_or(false);

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(flag)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ChromaError::conversion_failed(input, format!("failed to spawn {}: {e}", self.program))
            })?;

        let stderr_handle = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let waited = tokio::select! {
            _ = cancel.cancelled() => None,
            waited = tokio::time::timeout(self.timeout, child.wait()) => Some(waited),
        };

        let status = match waited {
            Some(Ok(Ok(status))) => status,
            Some(Ok(Err(e))) => {
                let _ = child.kill().await;
                return Err(ChromaError::conversion_failed(
                    input,
                    format!("failed waiting for converter: {e}"),
                ));
            }
            Some(Err(_)) => {
                let reason = format!("timed out after {}s", self.timeout.as_secs_f64());
                return Err(self
                    .abort(&mut child, output, output_existed, input, reason)
                    .await);
            }
            None => {
                return Err(self
                    .abort(&mut child, output, output_existed, input, "cancelled".to_string())
                    .await);
            }
        };

        let stderr = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !status.success() {
            let tail = stderr_tail(&stderr);
            warn!(input = %input.display(), flag, %status, stderr = %tail, "converter failed");
            let reason = if tail.is_empty() {
                format!("converter exited with {status}")
            } else {
                format!("converter exited with {status}: {tail}")
            };
            return Err(ChromaError::conversion_failed(input, reason));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(ChromaError::conversion_failed(
                input,
                format!("expected output {} was not produced", output.display()),
            ));
        }

        debug!(input = %input.display(), flag, elapsed_ms, "converter finished");
        Ok(output.to_path_buf())
    }

    /// Kill the child and drop any output it created.
    async fn abort(
        &self,
        child: &mut tokio::process::Child,
        output: &Path,
        output_existed: bool,
        input: &Path,
        reason: String,
    ) -> ChromaError {
        let _ = child.kill().await;
        if !output_existed {
            if let Err(e) = remove_if_exists(output) {
                warn!(output = %output.display(), error = %e, "could not remove partial converter output");
            }
        }
        warn!(input = %input.display(), %reason, "converter aborted");
        ChromaError::conversion_failed(input, reason)
    }
}

#[async_trait]
impl Converter for ProcessConverter {
    async fn export_json(&self, asset: &Path, cancel: &CancellationToken) -> Result<PathBuf> {
        self.run("-e", asset, &exported_json_path(asset), cancel).await
    }

    async fn import_json(&self, json: &Path, cancel: &CancellationToken) -> Result<PathBuf> {
        self.run("-i", json, &imported_asset_path(json), cancel).await
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join("\n")
}
