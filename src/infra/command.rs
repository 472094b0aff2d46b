//! # Command Execution Module / 命令执行模块
//!
//! Builds shell invocations for step bodies and runs them with combined
//! stdout/stderr capture.
//!
//! 为步骤主体构建 shell 调用，并在捕获合并的 stdout/stderr 的情况下运行它们。

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::core::error::{ConfigError, ConfigResult};
use crate::infra::t;

/// Marker a custom shell may use to place the script instead of appending it.
const SCRIPT_MARKER: &str = "{0}";

/// A shell that step scripts are handed to, e.g. `sh -e -c <script>`.
/// 步骤脚本交给的 shell，例如 `sh -e -c <script>`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for Shell {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self {
                program: "cmd".to_string(),
                args: vec!["/C".to_string()],
            }
        } else {
            Self {
                program: "sh".to_string(),
                args: vec!["-e".to_string(), "-c".to_string()],
            }
        }
    }
}

impl Shell {
    /// Parses a shell specification such as `"bash -eo pipefail -c"`.
    ///
    /// The script is appended as the last argument, unless an argument is
    /// exactly `{0}`, in which case the script replaces it.
    ///
    /// 解析 shell 规范。脚本作为最后一个参数追加，除非某个参数恰好是 `{0}`。
    pub fn parse(spec: &str) -> ConfigResult<Self> {
        let mut parts = shlex::split(spec)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| ConfigError::InvalidShell(spec.to_string()))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| ConfigError::InvalidShell(spec.to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Resolves the effective shell: the most specific specification wins.
    pub fn resolve(specs: &[Option<&str>]) -> ConfigResult<Self> {
        match specs.iter().flatten().next() {
            Some(spec) => Self::parse(spec),
            None => Ok(Self::default()),
        }
    }

    /// The full argument vector for running `script`.
    pub fn argv(&self, script: &str) -> Vec<String> {
        let mut args: Vec<String> = Vec::with_capacity(self.args.len() + 1);
        let mut placed = false;
        for arg in &self.args {
            if arg == SCRIPT_MARKER {
                args.push(script.to_string());
                placed = true;
            } else {
                args.push(arg.clone());
            }
        }
        if !placed {
            args.push(script.to_string());
        }
        args
    }

    /// A ready-to-spawn command. On Unix the step gets its own process group,
    /// so the whole tree can be killed on timeout or cancellation.
    /// 一个可以直接派生的命令。在 Unix 上步骤拥有自己的进程组，以便在超时或取消时终止整个进程树。
    pub fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.argv(script))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// Kills the step's process group when dropped, unless the step exited on its own.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid {
            kill_process_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    if let Ok(pgid) = libc::pid_t::try_from(pgid) {
        // SAFETY: killpg only sends a signal; a stale group id yields ESRCH.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Appends everything `stream` produces to `output`, line by line.
/// Invalid UTF-8 is replaced, never a reason to stop reading.
async fn drain<R: AsyncRead + Unpin>(stream: R, output: &Mutex<String>) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let mut output = output.lock().await;
                output.push_str(&String::from_utf8_lossy(&line));
                if !output.ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }
}

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently and combined into a single string.
///
/// Dropping the returned future (timeout, cancellation) kills the process
/// group and stops the readers.
///
/// # Returns
/// A tuple containing:
/// - The `ExitStatus` of the process wrapped in an `io::Result`.
/// - The combined stdout and stderr as a `String`.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取并合并到一个字符串中。丢弃返回的 future 会终止整个进程组。
pub async fn spawn_and_capture(mut cmd: Command) -> (std::io::Result<ExitStatus>, String) {
    let mut child = match cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn() {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };
    let guard = ProcessGroupGuard { pgid: child.id() };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(std::io::Error::other(
                t!("command.capture_failed").to_string(),
            )),
            String::new(),
        );
    };

    let output = Mutex::new(String::new());
    let (status, (), ()) = tokio::join!(
        child.wait(),
        drain(stdout, &output),
        drain(stderr, &output)
    );
    guard.disarm();

    (status, output.into_inner())
}
