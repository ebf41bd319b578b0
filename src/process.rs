// src/process.rs

//! Bounded execution of external tools
//!
//! Every external program the catalog talks to (archive inspector, policy
//! report, install listing, Flatpak) goes through [`run_tool`]. Output is
//! drained on helper threads so a chatty tool cannot fill its pipe and stall,
//! and a tool that overruns its deadline is sent SIGTERM, then killed after a
//! grace period.

use crate::config::ToolCommand;
use crate::error::{Error, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured output of a tool that exited successfully
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Deadline and grace period for one invocation
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub timeout: Duration,
    pub grace: Duration,
}

impl Limits {
    pub fn new(timeout: Duration, grace: Duration) -> Self {
        Self { timeout, grace }
    }
}

/// Run `tool` with `args` appended, under `LC_ALL=C`
///
/// Fails with `Spawn` if the program cannot be started, `Timeout` if it
/// overruns `limits.timeout`, and `ToolError` (carrying stderr) on a
/// non-zero exit.
pub fn run_tool<I, S>(tool: &ToolCommand, args: I, limits: Limits) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(&tool.program);
    command
        .args(&tool.args)
        .args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("Running {:?}", command);

    let mut child = command.spawn().map_err(|source| Error::Spawn {
        tool: tool.program.clone(),
        source,
    })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let deadline = Instant::now() + limits.timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            warn!(
                "{} exceeded {}s, terminating",
                tool.program,
                limits.timeout.as_secs()
            );
            terminate(&mut child, limits.grace);
            return Err(Error::Timeout {
                tool: tool.program.clone(),
                seconds: limits.timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    let output = ToolOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    };

    if !status.success() {
        return Err(Error::ToolError {
            tool: tool.program.clone(),
            status: status.code().unwrap_or(-1),
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// SIGTERM, wait up to `grace`, then SIGKILL
fn terminate(child: &mut Child, grace: Duration) {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
        debug!("SIGTERM to {} failed: {}", pid, e);
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }

    if let Err(e) = child.kill() {
        debug!("Kill of {} failed: {}", pid, e);
    }
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::with_args("sh", ["-c", script, "sh"])
    }

    fn limits(timeout_ms: u64) -> Limits {
        Limits::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_captures_stdout_and_appended_args() {
        let output = run_tool(&sh("echo \"$1-$2\""), ["policy", "bash"], limits(5000)).unwrap();
        assert_eq!(output.stdout.trim(), "policy-bash");
    }

    #[test]
    fn test_normalized_locale() {
        let output = run_tool(&sh("echo \"$LC_ALL\""), Vec::<&str>::new(), limits(5000)).unwrap();
        assert_eq!(output.stdout.trim(), "C");
    }

    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let result = run_tool(&sh("echo broken >&2; exit 3"), Vec::<&str>::new(), limits(5000));
        match result.unwrap_err() {
            Error::ToolError { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_timeout_terminates() {
        let started = Instant::now();
        let result = run_tool(&sh("sleep 10"), Vec::<&str>::new(), limits(200));
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program() {
        let tool = ToolCommand::new("/nonexistent/kydra-tool");
        let result = run_tool(&tool, ["--info"], limits(1000));
        assert!(matches!(result.unwrap_err(), Error::Spawn { .. }));
    }
}
