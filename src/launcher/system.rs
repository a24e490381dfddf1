//! Real process launcher backed by tokio

use super::{CommandSpec, LaunchError, LineSink, ProcessLauncher};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

/// Maximum line length fed to the sink (64 KB). Longer lines are truncated.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Launches real processes with piped output
///
/// stdout and stderr are drained concurrently with the child's execution and
/// merged into a single line stream, so a full pipe buffer can never block
/// the child, and diagnostics on either stream reach the classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn launch(
        &self,
        spec: &CommandSpec,
        sink: &mut dyn LineSink,
    ) -> Result<i32, LaunchError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.env_clear();
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if !spec.env.contains_key("PATH") {
            cmd.env("PATH", "/usr/bin:/bin");
        }

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: spec.program.to_string_lossy().into_owned(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| LaunchError::Spawn {
            program: spec.program.to_string_lossy().into_owned(),
            source: std::io::Error::other("stdout pipe not available"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| LaunchError::Spawn {
            program: spec.program.to_string_lossy().into_owned(),
            source: std::io::Error::other("stderr pipe not available"),
        })?;

        let (tx, mut rx) = mpsc::channel::<String>(64);
        let stdout_handle = tokio::spawn(read_lines(BufReader::new(stdout), tx.clone()));
        let stderr_handle = tokio::spawn(read_lines(BufReader::new(stderr), tx));

        // Drain until both reader tasks drop their senders; the sink sees
        // every line before we wait on the exit status.
        while let Some(line) = rx.recv().await {
            sink.feed_line(&line);
        }

        let _ = stdout_handle.await;
        let _ = stderr_handle.await;

        let status = child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }
}

async fn read_lines<R>(mut reader: BufReader<R>, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let mut trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                if trimmed.len() > MAX_LINE_LENGTH {
                    let mut cut = MAX_LINE_LENGTH;
                    while !trimmed.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    trimmed.truncate(cut);
                    trimmed.push_str("... [truncated]");
                }
                if tx.send(trimmed).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("error reading process output: {}", e);
                break;
            }
        }
    }
}
