//! On-change command hook.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use peerfind_core::PeerSet;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from running the hook command.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HookError {
    /// The command could not be started or fed.
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// The command exited unsuccessfully.
    #[error("`{command}` exited with {}", exit_reason(*code))]
    Failed {
        /// Command line that was run
        command: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
    },
}

fn exit_reason(code: Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

impl From<std::io::Error> for HookError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Shell command run on every peer set change.
///
/// The command runs under `sh -c` and receives the sorted peer hostnames on
/// stdin, one per line.
#[derive(Debug, Clone)]
pub struct OnChangeHook {
    command: String,
}

impl OnChangeHook {
    /// Create a hook for a shell command line.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the command for a peer set and wait for it to exit.
    pub async fn run(&self, peers: &PeerSet) -> Result<(), HookError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut input = String::new();
            for host in peers.iter() {
                input.push_str(host);
                input.push('\n');
            }

            // The command may exit without reading its input.
            match stdin.write_all(input.as_bytes()).await {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(HookError::Failed {
                command: self.command.clone(),
                code: status.code(),
            });
        }

        tracing::debug!(command = %self.command, "On-change hook finished");
        Ok(())
    }
}
