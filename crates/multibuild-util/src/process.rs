//! Process execution helpers for multibuild.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::UtilError;

/// How often the runner checks the child for exit and the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to keep draining output after the child has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Structured output from a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

/// Execute a command and capture its output.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not found).
/// A non-zero exit code is **not** an error; check `CommandOutput::success` instead.
pub fn run_command(cmd: &mut Command) -> Result<CommandOutput, UtilError> {
    let output = cmd
        .output()
        .map_err(|source| UtilError::CommandExec { source })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}

/// One line of output from a running command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// How a streamed command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// The exit code, or `None` if the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    /// Whether the runner killed the process after its timeout elapsed.
    pub timed_out: bool,
}

impl RunStatus {
    /// A status for a process that exited on its own with `code`.
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            timed_out: false,
        }
    }

    /// Whether the command exited with code zero.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs a command string and reports its output as it arrives.
pub trait CommandRunner {
    /// Run `command` to completion, calling `observer` for every output line.
    ///
    /// # Errors
    /// Returns an error only if the process cannot be spawned or waited on.
    /// A non-zero exit is reported through [`RunStatus`].
    fn run(
        &self,
        command: &str,
        observer: &mut dyn FnMut(OutputLine),
    ) -> Result<RunStatus, UtilError>;
}

/// Runs commands through the platform shell (`sh -c` or `cmd /C`).
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ShellRunner {
    /// Create a runner that inherits the current directory and never times out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands in `dir`.
    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Kill commands that run longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            // Own process group, so a timeout can kill everything the shell started.
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                cmd.process_group(0);
            }
            cmd
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        observer: &mut dyn FnMut(OutputLine),
    ) -> Result<RunStatus, UtilError> {
        let mut cmd = Self::shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(%command, dir = ?self.working_dir, "spawning shell command");
        let child = cmd
            .spawn()
            .map_err(|source| UtilError::CommandExec { source })?;
        let mut guard = ChildGuard::new(child, command);

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = guard.child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone(), OutputLine::Stdout));
        }
        if let Some(stderr) = guard.child.stderr.take() {
            readers.push(spawn_reader(stderr, tx.clone(), OutputLine::Stderr));
        }
        drop(tx);

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let status = loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => observer(line),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }

            if let Some(code) = guard.try_exit_code()? {
                break RunStatus {
                    exit_code: code,
                    timed_out: false,
                };
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(%command, "command timed out, killing it");
                guard.kill()?;
                break RunStatus {
                    exit_code: None,
                    timed_out: true,
                };
            }
        };

        drain(&rx, observer);
        // Readers still blocked on a pipe held open by a grandchild are left detached.
        for reader in readers {
            if reader.is_finished() {
                let _ = reader.join();
            }
        }

        Ok(status)
    }
}

fn spawn_reader<R, F>(stream: R, tx: Sender<OutputLine>, wrap: F) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    F: Fn(String) -> OutputLine + Send + 'static,
{
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    })
}

fn drain(rx: &Receiver<OutputLine>, observer: &mut dyn FnMut(OutputLine)) {
    loop {
        match rx.recv_timeout(DRAIN_GRACE) {
            Ok(line) => observer(line),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Owns a spawned child and kills and reaps it if it is dropped while still running.
struct ChildGuard<'a> {
    child: Child,
    command: &'a str,
    reaped: bool,
}

impl<'a> ChildGuard<'a> {
    fn new(child: Child, command: &'a str) -> Self {
        Self {
            child,
            command,
            reaped: false,
        }
    }

    /// `Some(code)` once the child has exited; the inner `None` means it died by signal.
    fn try_exit_code(&mut self) -> Result<Option<Option<i32>>, UtilError> {
        let status = self
            .child
            .try_wait()
            .map_err(|source| UtilError::CommandWait {
                command: self.command.to_owned(),
                source,
            })?;
        Ok(status.map(|s| {
            self.reaped = true;
            s.code()
        }))
    }

    /// Kill the child and, on unix, every process in its group.
    fn signal_kill(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Ok(raw) = i32::try_from(self.child.id()) {
                if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                    tracing::debug!(command = self.command, "killpg failed: {e}");
                }
            }
        }
        // The child may exit between the deadline check and the kill.
        let _ = self.child.kill();
    }

    fn kill(&mut self) -> Result<(), UtilError> {
        self.signal_kill();
        self.child
            .wait()
            .map_err(|source| UtilError::CommandWait {
                command: self.command.to_owned(),
                source,
            })?;
        self.reaped = true;
        Ok(())
    }
}

impl Drop for ChildGuard<'_> {
    fn drop(&mut self) {
        if !self.reaped {
            self.signal_kill();
            let _ = self.child.wait();
        }
    }
}
