//! # sync-sweep - parameter sweeps over a sync-protocol simulator
//!
//! Drives an external simulator across a grid of scale (N) and fault-ratio (p)
//! values, one run at a time, and collects its reported timing into a
//! tab-separated table.
//!
//! ## Core Components
//!
//! - **SweepPlan**: ordered (N, p) grid with the derived fault count `F = floor(N*p/100)`
//! - **ProcessExecutor**: launches `<program> <args> -N=<N> -f=<F>` under a deadline,
//!   capturing output and killing the run's process group on every exit path
//! - **sweep_metrics**: pulls `TotalDuration:<s>s` and `Bandwidth limit:  <s>` out of the output
//! - **ResultMatrix**: per-cell results keyed by (N, p), rendered as the report
//!
//! ## Usage
//!
//! ```no_run
//! use sync_sweep::{run_sweep, SweepConfig};
//!
//! let config = SweepConfig::default();
//! let mut executor = config.executor();
//! let matrix = run_sweep(&config.plan(), &mut executor, config.matrix())?;
//! matrix.write_report(&config.output)?;
//! # Ok::<(), sync_sweep::SweepError>(())
//! ```
//!
//! Anything implementing `RunExecutor` (including a plain
//! `FnMut(ScaleValue, FaultCount) -> RunCapture` closure) can stand in for
//! the real simulator.

pub mod sweep_config;
pub mod sweep_error;
pub mod sweep_executor;
pub mod sweep_interface;
pub mod sweep_matrix;
pub mod sweep_metrics;
pub mod sweep_plan;
pub mod sweep_runner;

// Re-export commonly used types
pub use sweep_config::{ScaleSpec, SweepConfig};
pub use sweep_error::{SweepError, SweepResult};
pub use sweep_executor::{ProcessExecutor, SimulatorCommand};
pub use sweep_interface::{
    FailureReason, FaultCount, FaultRatio, RunCapture, RunExecutor, RunOutcome, RunResult,
    ScaleValue, SweepPoint,
};
pub use sweep_matrix::{Cell, ResultMatrix, SweepSummary};
pub use sweep_metrics::extract;
pub use sweep_plan::{fault_count, SweepPlan};
pub use sweep_runner::run_sweep;
