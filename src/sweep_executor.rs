//! Simulator process execution with a hard wall-clock deadline.
//!
//! Each run spawns the simulator as the leader of its own process group and
//! wraps it in a `ChildGuard`. Whatever path the run takes (normal exit,
//! deadline, wait failure, panic unwinding), the guard kills the group and
//! reaps the child before control returns to the sweep. Only processes that
//! belong to the spawned group are signalled; nothing else on the host is
//! touched.
//!
//! The deadline covers the whole run, including draining the output pipes:
//! a descendant that left the group and keeps stdout open turns the run into
//! a timeout instead of stalling the sweep.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::sweep_interface::{
    FailureReason, FaultCount, RunCapture, RunExecutor, ScaleValue, DEFAULT_DEADLINE,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Program plus leading arguments; `-N=` and `-f=` are appended per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for SimulatorCommand {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            args: vec!["run".to_string(), ".".to_string()],
            working_dir: None,
        }
    }
}

impl SimulatorCommand {
    pub fn run_args(&self, scale: ScaleValue, faults: FaultCount) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(format!("-N={}", scale));
        args.push(format!("-f={}", faults));
        args
    }

    /// Program and leading args, without the per-run flags
    pub fn base(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Shell-ish rendering for log lines
    pub fn display(&self, scale: ScaleValue, faults: FaultCount) -> String {
        format!("{} -N={} -f={}", self.base(), scale, faults)
    }

    fn build(&self, scale: ScaleValue, faults: FaultCount) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.run_args(scale, faults))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // new group with pgid == child pid, so descendants can be killed with it
            command.process_group(0);
        }

        command
    }
}

/// Launches the real simulator, one blocking run at a time
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: SimulatorCommand,
    deadline: Duration,
    poll_interval: Duration,
}

impl ProcessExecutor {
    pub fn new(command: SimulatorCommand) -> Self {
        Self {
            command,
            deadline: DEFAULT_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn command(&self) -> &SimulatorCommand {
        &self.command
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    fn timed_out(&self, started: Instant) -> RunCapture {
        RunCapture::failed(
            FailureReason::Timeout,
            format!("no exit within {:?}", self.deadline),
            started.elapsed(),
        )
    }

    fn run(&self, scale: ScaleValue, faults: FaultCount) -> RunCapture {
        let started = Instant::now();
        // None only when the budget is too large to represent; then there is no limit
        let deadline = started.checked_add(self.deadline);
        debug!("spawning: {}", self.command.display(scale, faults));

        // spawn reports a missing cwd as NotFound too, which would read as a missing program
        if let Some(ref dir) = self.command.working_dir {
            if !dir.is_dir() {
                return RunCapture::failed(
                    FailureReason::UnexpectedError,
                    format!("working directory {} does not exist", dir.display()),
                    started.elapsed(),
                );
            }
        }

        let child = match self.command.build(scale, faults).spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return RunCapture::failed(
                    FailureReason::ExecutableNotFound,
                    format!("{}: {}", self.command.program, e),
                    started.elapsed(),
                );
            }
            Err(e) => {
                return RunCapture::failed(
                    FailureReason::UnexpectedError,
                    format!("spawn {}: {}", self.command.program, e),
                    started.elapsed(),
                );
            }
        };

        let mut guard = ChildGuard::new(child);

        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = guard.child.stdout.take() {
            spawn_reader(Stream::Stdout, pipe, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = guard.child.stderr.take() {
            spawn_reader(Stream::Stderr, pipe, tx.clone());
            pending += 1;
        }
        drop(tx);

        match guard.wait_until(deadline, self.poll_interval) {
            Ok(true) => {}
            Ok(false) => {
                guard.terminate();
                // readers are left detached; output after a timeout is never used
                return self.timed_out(started);
            }
            Err(e) => {
                guard.terminate();
                return RunCapture::failed(
                    FailureReason::UnexpectedError,
                    format!("wait: {}", e),
                    started.elapsed(),
                );
            }
        }

        // group is signalled before the child is reaped, so its id cannot have been reused
        let status = match guard.finish() {
            Ok(status) => status,
            Err(e) => {
                return RunCapture::failed(
                    FailureReason::UnexpectedError,
                    format!("wait: {}", e),
                    started.elapsed(),
                );
            }
        };

        // a descendant outside the group can still hold the pipes; the deadline covers that too
        match collect_output(&rx, pending, deadline) {
            Collected::Done { stdout, stderr } => {
                RunCapture::exited(stdout, stderr, status.code(), started.elapsed())
            }
            Collected::TimedOut => self.timed_out(started),
            Collected::Failed(detail) => RunCapture::failed(
                FailureReason::UnexpectedError,
                format!("stdout: {}", detail),
                started.elapsed(),
            ),
        }
    }
}

impl RunExecutor for ProcessExecutor {
    fn execute(&mut self, scale: ScaleValue, faults: FaultCount) -> RunCapture {
        self.run(scale, faults)
    }
}

// ============================================================================
// Child process guard
// ============================================================================

/// Owns a spawned simulator; terminating it on drop is the cleanup guarantee
struct ChildGuard {
    child: Child,
    status: Option<ExitStatus>,
    terminated: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            status: None,
            terminated: false,
        }
    }

    /// Poll until the child exits (`Ok(true)`) or `deadline` passes (`Ok(false)`)
    fn wait_until(
        &mut self,
        deadline: Option<Instant>,
        poll_interval: Duration,
    ) -> io::Result<bool> {
        loop {
            if self.has_exited()? {
                return Ok(true);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    poll_interval.min(deadline - now)
                }
                None => poll_interval,
            };
            thread::sleep(pause);
        }
    }

    /// Exit check that leaves the child as a zombie, keeping its pid and pgid reserved
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn has_exited(&mut self) -> io::Result<bool> {
        if self.status.is_some() {
            return Ok(true);
        }

        // SAFETY: a zeroed siginfo_t is a valid out-parameter, and WNOWAIT does not reap
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                self.child.id() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }

        // si_pid stays zero while the child is still running
        Ok(unsafe { info.si_pid() } != 0)
    }

    // no non-reaping wait here; the group signal in finish() follows the reap
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn has_exited(&mut self) -> io::Result<bool> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status.is_some())
    }

    /// Kill what is left of the group, then reap the exited child
    fn finish(&mut self) -> io::Result<ExitStatus> {
        self.terminated = true;
        kill_process_group(self.child.id());

        let status = match self.status {
            Some(status) => status,
            None => self.child.wait()?,
        };
        self.status = Some(status);
        Ok(status)
    }

    /// Best-effort: signal failures are ignored
    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        kill_process_group(self.child.id());

        if self.status.is_none() {
            let _ = self.child.kill();
            self.status = self.child.wait().ok();
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    // SAFETY: killpg only sends a signal; a group that is already gone yields ESRCH
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) skipped: {}",
            pgid,
            io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

// ============================================================================
// Pipe readers
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

type ReaderMessage = (Stream, io::Result<String>);

fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    mut pipe: R,
    tx: Sender<ReaderMessage>,
) {
    thread::spawn(move || {
        // receiver may be gone after a timeout
        let _ = tx.send((stream, read_lossy(&mut pipe)));
    });
}

fn read_lossy(pipe: &mut impl Read) -> io::Result<String> {
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

enum Collected {
    Done { stdout: String, stderr: String },
    TimedOut,
    Failed(String),
}

/// Wait for `pending` reader results, never past `deadline`
fn collect_output(
    rx: &Receiver<ReaderMessage>,
    pending: usize,
    deadline: Option<Instant>,
) -> Collected {
    let mut stdout = String::new();
    let mut stderr = String::new();

    for _ in 0..pending {
        let received = match deadline {
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => return Collected::TimedOut,
                    Err(RecvTimeoutError::Disconnected) => {
                        return Collected::Failed("reader thread exited without output".to_string())
                    }
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => return Collected::Failed("reader thread exited without output".to_string()),
            },
        };

        match received {
            (Stream::Stdout, Ok(text)) => stdout = text,
            (Stream::Stdout, Err(e)) => return Collected::Failed(e.to_string()),
            (Stream::Stderr, Ok(text)) => stderr = text,
            (Stream::Stderr, Err(e)) => warn!("stderr capture failed: {}", e),
        }
    }

    Collected::Done { stdout, stderr }
}
