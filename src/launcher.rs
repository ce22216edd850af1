use std::process::Stdio;

use tokio::process::Command;

/// Opens a posting in an external context (usually the user's browser).
///
/// Fire-and-forget: implementations must not block and nothing observes
/// whether the open succeeded.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Hands urls to a desktop opener program (`xdg-open`, `open`, ...).
#[derive(Debug, Clone)]
pub struct CommandOpener {
    program: String,
}

impl CommandOpener {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl UrlOpener for CommandOpener {
    fn open(&self, url: &str) {
        tracing::info!(url, program = %self.program, "Opening posting");

        let spawned = Command::new(&self.program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let program = self.program.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            tracing::warn!(program = %program, status = %status, "Opener exited with failure");
                        }
                        Err(e) => tracing::warn!(program = %program, error = %e, "Opener wait failed"),
                        _ => {}
                    }
                });
            }
            Err(e) => {
                tracing::warn!(url, program = %self.program, error = %e, "Failed to launch opener");
            }
        }
    }
}

/// Only logs the url. For headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOpener;

impl UrlOpener for LogOpener {
    fn open(&self, url: &str) {
        tracing::info!(url, "Posting to open");
    }
}
