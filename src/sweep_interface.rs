use std::fmt;
use std::time::Duration;

// all the same unsigned family to allow widening without surprises
pub type ScaleValue = u32;
pub type FaultRatio = u8;
pub type FaultCount = u32;

/// Upper bound for a fault ratio, in percent
pub const MAX_FAULT_RATIO: FaultRatio = 100;

/// Wall-clock budget for a single simulator run
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Text written into the report for any failed run
pub const FAILURE_CELL: &str = "Error/Timeout";

/// One cell of the sweep: the scale, the ratio it is reported under, and the
/// fault count the simulator is actually launched with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SweepPoint {
    pub scale: ScaleValue,
    pub ratio: FaultRatio,
    pub faults: FaultCount,
}

impl SweepPoint {
    /// F must never exceed N; violating points are skipped, not run
    pub fn is_runnable(&self) -> bool {
        self.faults <= self.scale
    }
}

impl fmt::Display for SweepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N={}, F={} ({}%)", self.scale, self.faults, self.ratio)
    }
}

/// Why a single run produced no score
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureReason {
    /// Deadline exceeded, process group was killed
    Timeout,

    /// Simulator program not found on the search path
    ExecutableNotFound,

    /// Anything else that went wrong while launching or capturing
    UnexpectedError,

    /// Output did not contain a TotalDuration field
    MetricNotFound,
}

impl FailureReason {
    pub const ALL: [FailureReason; 4] = [
        FailureReason::Timeout,
        FailureReason::ExecutableNotFound,
        FailureReason::UnexpectedError,
        FailureReason::MetricNotFound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::ExecutableNotFound => "executable-not-found",
            FailureReason::UnexpectedError => "unexpected-error",
            FailureReason::MetricNotFound => "metric-not-found",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar outcome of one (N, F) run as stored in the result matrix
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RunResult {
    /// TotalDuration plus Bandwidth limit when present, in seconds
    Score(f64),
    Failed(FailureReason),
}

impl RunResult {
    pub fn score(&self) -> Option<f64> {
        match self {
            RunResult::Score(v) => Some(*v),
            RunResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            RunResult::Score(_) => None,
            RunResult::Failed(reason) => Some(*reason),
        }
    }
}

/// How the simulator process ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Process exited on its own before the deadline
    Exited { code: Option<i32> },

    /// No usable output; `detail` is kept for the log line
    Failed {
        reason: FailureReason,
        detail: String,
    },
}

/// Everything the executor hands back for one run
#[derive(Clone, Debug)]
pub struct RunCapture {
    pub stdout: String,
    pub stderr: String,
    pub outcome: RunOutcome,
    pub elapsed: Duration,
}

impl RunCapture {
    pub fn exited(stdout: String, stderr: String, code: Option<i32>, elapsed: Duration) -> Self {
        Self {
            stdout,
            stderr,
            outcome: RunOutcome::Exited { code },
            elapsed,
        }
    }

    /// Failed captures never carry output downstream
    pub fn failed(reason: FailureReason, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            outcome: RunOutcome::Failed {
                reason,
                detail: detail.into(),
            },
            elapsed,
        }
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match &self.outcome {
            RunOutcome::Exited { .. } => None,
            RunOutcome::Failed { reason, .. } => Some(*reason),
        }
    }
}

/// Seam between the sweep loop and whatever launches the simulator
pub trait RunExecutor {
    fn execute(&mut self, scale: ScaleValue, faults: FaultCount) -> RunCapture;
}

// lets tests and dry runs drive the sweep with plain closures
impl<F> RunExecutor for F
where
    F: FnMut(ScaleValue, FaultCount) -> RunCapture,
{
    fn execute(&mut self, scale: ScaleValue, faults: FaultCount) -> RunCapture {
        self(scale, faults)
    }
}
