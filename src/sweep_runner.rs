//! The sweep loop: plan -> execute -> extract -> record, strictly one cell at a time.

use log::{info, warn};

use crate::sweep_error::SweepResult;
use crate::sweep_interface::{RunCapture, RunExecutor, RunOutcome, RunResult, SweepPoint};
use crate::sweep_matrix::ResultMatrix;
use crate::sweep_metrics;
use crate::sweep_plan::SweepPlan;

/// Run every point of `plan` through `executor`, filling `matrix`.
///
/// The matrix is taken by value and handed back once every cell has been
/// attempted or skipped. Per-run failures are recorded, never returned; an
/// error here means the matrix does not match the plan.
pub fn run_sweep<E: RunExecutor>(
    plan: &SweepPlan,
    executor: &mut E,
    mut matrix: ResultMatrix,
) -> SweepResult<ResultMatrix> {
    let total = plan.len();

    for (i, point) in plan.points().enumerate() {
        if !point.is_runnable() {
            warn!("{}/{} Skipping: {} (F exceeds N)", i + 1, total, point);
            matrix.skip(&point)?;
            continue;
        }

        info!("{}/{} Running: N={}, F={}", i + 1, total, point.scale, point.faults);
        let capture = executor.execute(point.scale, point.faults);
        let result = evaluate(&point, &capture);
        matrix.record(&point, result)?;
    }

    Ok(matrix)
}

/// Turn one capture into the value stored for its cell, logging the reason on failure
pub fn evaluate(point: &SweepPoint, capture: &RunCapture) -> RunResult {
    match &capture.outcome {
        RunOutcome::Failed { reason, detail } => {
            warn!(
                "{}: N={}, f={} after {:.1?}: {}",
                reason, point.scale, point.faults, capture.elapsed, detail
            );
            RunResult::Failed(*reason)
        }
        RunOutcome::Exited { code } => {
            if *code != Some(0) {
                warn!(
                    "simulator exited with {:?} for N={}, f={}",
                    code, point.scale, point.faults
                );
            }

            let result = sweep_metrics::extract(&capture.stdout);
            match result {
                RunResult::Score(score) => info!(
                    "Ran with N = {} and F = {} and got TotalDuration = {} ({:.1?})",
                    point.scale, point.faults, score, capture.elapsed
                ),
                RunResult::Failed(reason) => {
                    warn!("{}: N={}, f={}", reason, point.scale, point.faults);
                    if let Some(line) = capture.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                        warn!("  last stderr line: {}", line);
                    }
                }
            }
            result
        }
    }
}
