//! Bounded subprocess execution for the `execute_command` tool.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

const CHUNK_BYTES: usize = 8192;

/// What was kept from one output stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Capture {
    pub bytes: Vec<u8>,
    /// Bytes read past the limit and dropped.
    pub dropped: usize,
}

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn is_blank(&self) -> bool {
        self.dropped == 0 && self.text().trim().is_empty()
    }

    /// Trimmed text followed by a `[<stream> truncated N bytes]` line when
    /// anything was dropped.
    pub fn render(&self, stream: &str) -> String {
        let text = self.text();
        if self.dropped == 0 {
            return text.trim().to_string();
        }
        format!("{}\n[{stream} truncated {} bytes]", text.trim(), self.dropped)
    }
}

/// Outcome of a finished (or killed) program.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Capture,
    pub stderr: Capture,
    pub timed_out: bool,
}

/// Run `cmd` with stdin closed, keeping at most `limit` bytes of each output
/// stream and killing the program once `timeout` elapses.
///
/// Both pipes are drained on their own threads for the whole run, so a chatty
/// program never blocks on a full pipe. Spawn failures keep their
/// [`std::io::Error`]; see [`is_not_found`].
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    limit: usize,
) -> Result<CommandOutput> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawn command")?;
    debug!(pid = child.id(), "command started");

    let stdout = drain(child.stdout.take(), limit)?;
    let stderr = drain(child.stderr.take(), limit)?;
    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;
    let output = CommandOutput {
        status,
        stdout: collect(stdout).context("collect stdout")?,
        stderr: collect(stderr).context("collect stderr")?,
        timed_out,
    };
    debug!(
        exit_code = ?output.status.code(),
        timed_out,
        stdout_dropped = output.stdout.dropped,
        stderr_dropped = output.stderr.dropped,
        "command finished"
    );
    Ok(output)
}

/// True when `err` came from spawning a program that does not exist.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing it");
    child.kill().context("kill command")?;
    let status = child.wait().context("reap killed command")?;
    Ok((status, true))
}

fn drain<R>(pipe: Option<R>, limit: usize) -> Result<JoinHandle<Result<Capture>>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe.ok_or_else(|| anyhow!("output pipe missing"))?;
    Ok(thread::spawn(move || -> Result<Capture> {
        let mut capture = Capture::default();
        let mut chunk = [0u8; CHUNK_BYTES];
        loop {
            let n = pipe.read(&mut chunk).context("read command output")?;
            if n == 0 {
                return Ok(capture);
            }
            let keep = n.min(limit.saturating_sub(capture.bytes.len()));
            capture.bytes.extend_from_slice(&chunk[..keep]);
            capture.dropped += n - keep;
        }
    }))
}

fn collect(handle: JoinHandle<Result<Capture>>) -> Result<Capture> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf hello; printf oops >&2; exit 3");
        let output = run_command_with_timeout(cmd, Duration::from_secs(5), 1024).expect("run");
        assert_eq!(output.stdout.text(), "hello");
        assert_eq!(output.stderr.text(), "oops");
        assert_eq!(output.status.code(), Some(3));
        assert!(!output.timed_out);
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf 0123456789");
        let output = run_command_with_timeout(cmd, Duration::from_secs(5), 4).expect("run");
        assert_eq!(output.stdout.text(), "0123");
        assert_eq!(output.stdout.dropped, 6);
        assert_eq!(output.stdout.render("stdout"), "0123\n[stdout truncated 6 bytes]");
        assert!(output.stderr.is_blank());
    }

    #[test]
    fn kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let output =
            run_command_with_timeout(cmd, Duration::from_millis(100), 1024).expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn missing_program_is_not_found() {
        let cmd = Command::new("lovelaice-definitely-missing-binary");
        let err = run_command_with_timeout(cmd, Duration::from_secs(1), 1024).unwrap_err();
        assert!(is_not_found(&err));
    }
}
