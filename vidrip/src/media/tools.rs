use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolPaths;
use crate::drm::DecryptionKey;

/**
    Error type for external tool invocations.
*/
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be started
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The tool ran but exited unsuccessfully
    #[error("{tool} exited with {}{}", exit_label(.code), stderr_suffix(.stderr))]
    Exit {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/**
    The external programs a pipeline run drives.

    A successful return only means the tool reported success. Callers check
    that the expected output exists.
*/
pub trait MediaTools {
    /// Print the format table for a manifest.
    async fn list_formats(&self, manifest_url: &str) -> Result<String, ToolError>;

    async fn download_format(
        &self,
        manifest_url: &str,
        format_id: &str,
        output: &Path,
    ) -> Result<(), ToolError>;

    /// Let the downloader pick and fetch tracks itself, named after `template`.
    async fn download_combined(&self, manifest_url: &str, template: &Path)
    -> Result<(), ToolError>;

    async fn decrypt(
        &self,
        keys: &DecryptionKey,
        input: &Path,
        output: &Path,
    ) -> Result<(), ToolError>;

    async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path)
    -> Result<(), ToolError>;
}

/**
    yt-dlp, mp4decrypt and ffmpeg run as child processes.
*/
#[derive(Debug, Clone)]
pub struct ExternalTools {
    paths: ToolPaths,
    timeout: Duration,
}

impl ExternalTools {
    pub fn new(paths: ToolPaths, timeout: Duration) -> Self {
        Self { paths, timeout }
    }

    async fn run(
        &self,
        program: &Path,
        args: Vec<OsString>,
        capture: bool,
    ) -> Result<Output, ToolError> {
        let tool = program.display().to_string();
        debug!(%tool, ?args, "running external tool");

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if capture {
            command.stdout(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit());
        }

        let child = command.spawn().map_err(|source| ToolError::Launch {
            tool: tool.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ToolError::Launch {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Exit {
                tool,
                code: output.status.code(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), 20),
            });
        }

        Ok(output)
    }
}

impl MediaTools for ExternalTools {
    async fn list_formats(&self, manifest_url: &str) -> Result<String, ToolError> {
        let mut args = downloader_args(manifest_url);
        args.push("-F".into());
        args.push(manifest_url.into());

        let output = self.run(&self.paths.downloader, args, true).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn download_format(
        &self,
        manifest_url: &str,
        format_id: &str,
        output: &Path,
    ) -> Result<(), ToolError> {
        let mut args = downloader_args(manifest_url);
        args.extend(["-f".into(), format_id.into(), manifest_url.into()]);
        args.extend(["-o".into(), output.as_os_str().to_owned()]);

        self.run(&self.paths.downloader, args, false).await?;
        Ok(())
    }

    async fn download_combined(
        &self,
        manifest_url: &str,
        template: &Path,
    ) -> Result<(), ToolError> {
        let mut args = downloader_args(manifest_url);
        args.push(manifest_url.into());
        args.extend(["-o".into(), template.as_os_str().to_owned()]);

        self.run(&self.paths.downloader, args, false).await?;
        Ok(())
    }

    async fn decrypt(
        &self,
        keys: &DecryptionKey,
        input: &Path,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.run(&self.paths.decryptor, decryptor_args(keys, input, output), false)
            .await?;
        Ok(())
    }

    async fn mux(
        &self,
        video: &Path,
        audio: Option<&Path>,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.run(&self.paths.muxer, muxer_args(video, audio, output), false)
            .await?;
        Ok(())
    }
}

/// Flags every downloader call needs. Smooth Streaming hosts use certificates yt-dlp rejects.
fn downloader_args(manifest_url: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--allow-unplayable-formats".into()];
    if manifest_url.contains("ism/manifest") {
        args.push("--no-check-certificate".into());
    }
    args
}

fn decryptor_args(keys: &DecryptionKey, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = Vec::with_capacity(keys.len() * 2 + 2);
    for key in keys.keys() {
        args.push("--key".into());
        args.push(key.to_string().into());
    }
    args.push(input.as_os_str().to_owned());
    args.push(output.as_os_str().to_owned());
    args
}

fn muxer_args(video: &Path, audio: Option<&Path>, output: &Path) -> Vec<OsString> {
    let mut inputs: Vec<PathBuf> = vec![video.to_path_buf()];
    inputs.extend(audio.map(Path::to_path_buf));

    let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.into_os_string());
    }
    args.extend(["-c".into(), "copy".into(), output.as_os_str().to_owned()]);
    args
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
