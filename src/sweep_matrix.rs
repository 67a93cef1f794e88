//! Result aggregation and the tab-separated report.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::info;

use crate::sweep_error::{SweepError, SweepResult};
use crate::sweep_interface::{FailureReason, FaultRatio, RunResult, ScaleValue, SweepPoint, FAILURE_CELL};

/// Default report file name
pub const REPORT_FILE: &str = "formatted_sync_metrics_results.txt";

/// Header of the first column
pub const CORNER_LABEL: &str = "N/F";

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Cell {
    Unset,
    /// Excluded because F > N
    Skipped,
    Recorded(RunResult),
}

impl Cell {
    /// Report text for this cell
    pub fn render(&self) -> String {
        match self {
            Cell::Unset | Cell::Skipped => String::new(),
            Cell::Recorded(RunResult::Score(value)) => format_score(*value),
            Cell::Recorded(RunResult::Failed(_)) => FAILURE_CELL.to_string(),
        }
    }
}

/// Shortest round-trip decimal that always keeps a fractional part (`8.0`, `15.75`)
pub fn format_score(value: f64) -> String {
    format!("{:?}", value)
}

/// Scale -> ratio -> cell, both axes in configured order.
///
/// Columns are keyed by the ratio p, not by the fault count the run used, so
/// two ratios that floor to the same F still get separate columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMatrix {
    ratios: Vec<FaultRatio>,
    rows: IndexMap<ScaleValue, IndexMap<FaultRatio, Cell>>,
}

impl ResultMatrix {
    /// Every cell starts out `Unset`
    pub fn new(scales: &[ScaleValue], ratios: &[FaultRatio]) -> Self {
        let rows = scales
            .iter()
            .map(|&scale| {
                let row = ratios.iter().map(|&ratio| (ratio, Cell::Unset)).collect();
                (scale, row)
            })
            .collect();

        Self {
            ratios: ratios.to_vec(),
            rows,
        }
    }

    pub fn ratios(&self) -> &[FaultRatio] {
        &self.ratios
    }

    pub fn scales(&self) -> impl Iterator<Item = ScaleValue> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, scale: ScaleValue, ratio: FaultRatio) -> Option<&Cell> {
        self.rows.get(&scale).and_then(|row| row.get(&ratio))
    }

    pub fn cells(&self) -> impl Iterator<Item = (ScaleValue, FaultRatio, &Cell)> + '_ {
        self.rows
            .iter()
            .flat_map(|(&scale, row)| row.iter().map(move |(&ratio, cell)| (scale, ratio, cell)))
    }

    pub fn record(&mut self, point: &SweepPoint, result: RunResult) -> SweepResult<()> {
        self.fill(point, Cell::Recorded(result))
    }

    pub fn skip(&mut self, point: &SweepPoint) -> SweepResult<()> {
        self.fill(point, Cell::Skipped)
    }

    fn fill(&mut self, point: &SweepPoint, value: Cell) -> SweepResult<()> {
        let (scale, ratio) = (point.scale, point.ratio);
        let cell = self
            .rows
            .get_mut(&scale)
            .and_then(|row| row.get_mut(&ratio))
            .ok_or(SweepError::UnknownCell { scale, ratio })?;

        if *cell != Cell::Unset {
            return Err(SweepError::CellAlreadyFilled { scale, ratio });
        }
        *cell = value;
        Ok(())
    }

    /// Header line plus one line per scale, each terminated by `\n`
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(CORNER_LABEL);
        for ratio in &self.ratios {
            let _ = write!(out, "\t{}%", ratio);
        }
        out.push('\n');

        for (scale, row) in &self.rows {
            let _ = write!(out, "{}", scale);
            for ratio in &self.ratios {
                out.push('\t');
                if let Some(cell) = row.get(ratio) {
                    out.push_str(&cell.render());
                }
            }
            out.push('\n');
        }

        out
    }

    /// Single write of the whole report; nothing is written mid-sweep
    pub fn write_report(&self, path: &Path) -> SweepResult<()> {
        fs::write(path, self.render()).map_err(|source| SweepError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Formatted table saved in {}", path.display());
        Ok(())
    }

    pub fn summary(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for (_, _, cell) in self.cells() {
            summary.cells += 1;
            match cell {
                Cell::Unset => summary.unset += 1,
                Cell::Skipped => summary.skipped += 1,
                Cell::Recorded(RunResult::Score(_)) => {
                    summary.attempted += 1;
                    summary.succeeded += 1;
                }
                Cell::Recorded(RunResult::Failed(reason)) => {
                    summary.attempted += 1;
                    *summary.failures.entry(*reason).or_insert(0) += 1;
                }
            }
        }
        summary
    }
}

/// Cell counts after a sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub cells: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub unset: usize,
    pub failures: BTreeMap<FailureReason, usize>,
}

impl SweepSummary {
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    /// Print a summary of the sweep
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║        Sync Sweep Results                              ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Cells: {}", self.cells);
        println!("  Attempted: {}", self.attempted);
        println!("  Succeeded: {}", self.succeeded);
        println!("  Failed: {}", self.failed());
        for reason in FailureReason::ALL {
            if let Some(count) = self.failures.get(&reason) {
                println!("    {}: {}", reason, count);
            }
        }
        println!("  Skipped (F > N): {}", self.skipped);
        if self.unset > 0 {
            println!("  Never filled: {}", self.unset);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep_plan::fault_count;

    const PERCENTAGES: [FaultRatio; 8] = [0, 5, 10, 15, 20, 25, 30, 33];

    fn point(scale: ScaleValue, ratio: FaultRatio) -> SweepPoint {
        SweepPoint {
            scale,
            ratio,
            faults: fault_count(scale, ratio),
        }
    }

    #[test]
    fn test_header_row() {
        let matrix = ResultMatrix::new(&[25], &PERCENTAGES);
        let report = matrix.render();
        let mut lines = report.lines();
        assert_eq!(
            lines.next(),
            Some("N/F\t0%\t5%\t10%\t15%\t20%\t25%\t30%\t33%")
        );
        assert_eq!(lines.next(), Some("25\t\t\t\t\t\t\t\t"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_cell_rendering() {
        let mut matrix = ResultMatrix::new(&[25, 30], &[0, 33]);
        matrix.record(&point(25, 0), RunResult::Score(15.75)).unwrap();
        matrix.record(&point(25, 33), RunResult::Score(8.0)).unwrap();
        matrix
            .record(&point(30, 0), RunResult::Failed(FailureReason::Timeout))
            .unwrap();
        matrix.skip(&point(30, 33)).unwrap();

        assert_eq!(
            matrix.render(),
            "N/F\t0%\t33%\n25\t15.75\t8.0\n30\tError/Timeout\t\n"
        );
    }

    #[test]
    fn test_keyed_by_ratio_not_fault_count() {
        // 5% and 6% of 25 both floor to F=1
        let mut matrix = ResultMatrix::new(&[25], &[5, 6]);
        matrix.record(&point(25, 5), RunResult::Score(1.0)).unwrap();
        matrix.record(&point(25, 6), RunResult::Score(2.0)).unwrap();
        assert_eq!(matrix.render(), "N/F\t5%\t6%\n25\t1.0\t2.0\n");
    }

    #[test]
    fn test_cell_filled_once() {
        let mut matrix = ResultMatrix::new(&[25], &[10]);
        matrix.record(&point(25, 10), RunResult::Score(1.0)).unwrap();

        let err = matrix.record(&point(25, 10), RunResult::Score(2.0)).unwrap_err();
        assert!(matches!(err, SweepError::CellAlreadyFilled { scale: 25, ratio: 10 }));
        let err = matrix.skip(&point(25, 10)).unwrap_err();
        assert!(matches!(err, SweepError::CellAlreadyFilled { .. }));
        assert_eq!(matrix.get(25, 10), Some(&Cell::Recorded(RunResult::Score(1.0))));
    }

    #[test]
    fn test_unknown_cell() {
        let mut matrix = ResultMatrix::new(&[25], &[10]);
        let err = matrix.record(&point(30, 10), RunResult::Score(1.0)).unwrap_err();
        assert!(matches!(err, SweepError::UnknownCell { scale: 30, ratio: 10 }));
    }

    #[test]
    fn test_summary_counts() {
        let mut matrix = ResultMatrix::new(&[25], &PERCENTAGES);
        matrix.record(&point(25, 0), RunResult::Score(1.0)).unwrap();
        matrix
            .record(&point(25, 5), RunResult::Failed(FailureReason::MetricNotFound))
            .unwrap();
        matrix
            .record(&point(25, 10), RunResult::Failed(FailureReason::MetricNotFound))
            .unwrap();
        matrix.skip(&point(25, 15)).unwrap();

        let summary = matrix.summary();
        assert_eq!(summary.cells, 8);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.failures.get(&FailureReason::MetricNotFound), Some(&2));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.unset, 4);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REPORT_FILE);

        let mut matrix = ResultMatrix::new(&[25], &[0]);
        matrix.record(&point(25, 0), RunResult::Score(12.5)).unwrap();
        matrix.write_report(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "N/F\t0%\n25\t12.5\n");
    }

    #[test]
    fn test_write_report_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(REPORT_FILE);

        let matrix = ResultMatrix::new(&[25], &[0]);
        let err = matrix.write_report(&path).unwrap_err();
        assert!(matches!(err, SweepError::ReportWrite { .. }));
    }
}
