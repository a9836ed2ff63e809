//! Shell command work units.
//!
//! [`ShellUnitFactory`] turns each task description into a command line run
//! by `<shell> -c`. The effective context and model hint are exported to the
//! child as `SWARM_CONTEXT` and `SWARM_MODEL`.

use crate::config::Config;
use crate::core::task::TaskResult;
use crate::error::{Error, Result};
use crate::orchestration::unit::{UnitFactory, WorkUnit};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout for one shell unit (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default shell used to interpret task descriptions.
pub const DEFAULT_SHELL: &str = "sh";

/// Summary reported by a successful command that printed nothing.
pub const NO_OUTPUT_SUMMARY: &str = "completed with no output";

/// Builds [`ShellUnit`]s.
#[derive(Debug, Clone)]
pub struct ShellUnitFactory {
    shell: String,
    timeout: Duration,
}

impl Default for ShellUnitFactory {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ShellUnitFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory using the shell and unit timeout from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_shell(config.effective_shell())
            .with_timeout(Duration::from_secs(config.unit_timeout_secs))
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the maximum duration a single command may run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl UnitFactory for ShellUnitFactory {
    async fn create_unit(
        &self,
        description: &str,
        model: Option<&str>,
        context: &str,
    ) -> Result<Arc<dyn WorkUnit>> {
        Ok(Arc::new(ShellUnit {
            command: description.to_string(),
            model: model.map(String::from),
            context: context.to_string(),
            shell: self.shell.clone(),
            timeout: self.timeout,
        }))
    }
}

/// A single shell command with its effective context.
#[derive(Debug, Clone)]
pub struct ShellUnit {
    command: String,
    model: Option<String>,
    context: String,
    shell: String,
    timeout: Duration,
}

#[async_trait]
impl WorkUnit for ShellUnit {
    fn label(&self) -> &str {
        &self.command
    }

    async fn run(&self) -> Result<TaskResult> {
        debug!(shell = %self.shell, command = %self.command, "Running shell unit");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&self.command)
            .env("SWARM_CONTEXT", &self.context)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(model) = &self.model {
            cmd.env("SWARM_MODEL", model);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let summary = stdout.trim();
            Ok(TaskResult::success(if summary.is_empty() {
                NO_OUTPUT_SUMMARY
            } else {
                summary
            }))
        } else {
            let error = if stderr.trim().is_empty() {
                match output.status.code() {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                }
            } else {
                stderr.trim().to_string()
            };
            Ok(TaskResult::failure(stdout.trim(), error))
        }
    }
}
