//! Command execution on the local shell or over ssh
//!
//! A session is one `/bin/sh` (local, or remote behind `ssh`) fed the
//! generated commands on stdin. Both output streams are appended to a single
//! buffer as chunks arrive, so stdout/stderr interleaving follows arrival
//! order. There is no timeout: a hung remote session blocks until it closes.

use crate::error::{LabelError, Result};
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 4096;

/// Where a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    Local,
    Remote {
        host: String,
        port: u16,
        username: String,
    },
}

impl ExecutionTarget {
    fn command(&self) -> Command {
        match self {
            ExecutionTarget::Local => Command::new("/bin/sh"),
            ExecutionTarget::Remote {
                host,
                port,
                username,
            } => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-p")
                    .arg(port.to_string())
                    .arg(format!("{}@{}", username, host))
                    .arg("/bin/sh");
                cmd
            }
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTarget::Local => write!(f, "local"),
            ExecutionTarget::Remote { host, .. } => write!(f, "{}", host),
        }
    }
}

/// What happens after a failed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Stop at the first failing command (`set -e`). Off by default, so the
    /// add step still runs after a failed remove step.
    pub halt_on_failure: bool,
}

/// Combined output and exit status of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub output: String,
    pub exit_code: i32,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A single command session against a target
#[derive(Debug, Clone)]
pub struct Session {
    target: ExecutionTarget,
    policy: ExecutionPolicy,
}

impl Session {
    pub fn new(target: ExecutionTarget) -> Self {
        Self {
            target,
            policy: ExecutionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the session on its own task; the handle resolves once the child
    /// has exited
    pub fn spawn(self, commands: Vec<String>) -> JoinHandle<Result<ExecutionOutcome>> {
        tokio::spawn(async move { self.run(&commands).await })
    }

    /// Feed every command to the shell, close its input and wait for exit
    pub async fn run(&self, commands: &[String]) -> Result<ExecutionOutcome> {
        let exec_err = |reason: String| LabelError::Execution {
            target: self.target.to_string(),
            reason,
        };

        info!(target_host = %self.target, commands = commands.len(), "starting session");

        let mut cmd = self.target.command();
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| exec_err(format!("failed to spawn: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| exec_err("stdin not captured".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| exec_err("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| exec_err("stderr not captured".to_string()))?;

        let mut script = String::new();
        if self.policy.halt_on_failure {
            script.push_str("set -e\n");
        }
        for command in commands {
            debug!(command = %command, "queueing command");
            script.push_str(command);
            script.push('\n');
        }

        // Feed stdin on its own task so a shell blocked on full output pipes
        // never waits on us while we wait on it
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(script.as_bytes()).await;
            drop(stdin);
            written
        });

        let mut output = Vec::new();
        let mut out_buf = [0u8; READ_CHUNK];
        let mut err_buf = [0u8; READ_CHUNK];
        let mut out_done = false;
        let mut err_done = false;

        while !(out_done && err_done) {
            tokio::select! {
                read = stdout.read(&mut out_buf), if !out_done => match read {
                    Ok(0) => out_done = true,
                    Ok(n) => output.extend_from_slice(&out_buf[..n]),
                    Err(e) => {
                        warn!(error = %e, "error reading stdout");
                        out_done = true;
                    }
                },
                read = stderr.read(&mut err_buf), if !err_done => match read {
                    Ok(0) => err_done = true,
                    Ok(n) => output.extend_from_slice(&err_buf[..n]),
                    Err(e) => {
                        warn!(error = %e, "error reading stderr");
                        err_done = true;
                    }
                },
            }
        }

        // A shell that dies early closes the pipe; its output still explains why
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(target_host = %self.target, error = %e, "failed to write commands"),
            Err(e) => warn!(target_host = %self.target, error = %e, "command writer task failed"),
        }

        let status = child
            .wait()
            .await
            .map_err(|e| exec_err(format!("failed to wait for session: {}", e)))?;
        let exit_code = status.code().unwrap_or(-1);

        let mut output = String::from_utf8_lossy(&output).into_owned();
        if exit_code != 0 {
            output.push_str(&format!("\n{}: exit with code {}", self.target, exit_code));
            warn!(target_host = %self.target, exit_code, "session exited with failure");
        } else {
            info!(target_host = %self.target, "session completed");
        }

        Ok(ExecutionOutcome { output, exit_code })
    }
}

/// Run commands in one session with the default policy
pub async fn run(commands: &[String], target: ExecutionTarget) -> Result<ExecutionOutcome> {
    Session::new(target).run(commands).await
}
