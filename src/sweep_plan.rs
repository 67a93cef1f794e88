//! Sweep planning: the ordered (N, p) grid and the fault count derived per cell.

use crate::sweep_interface::{FaultCount, FaultRatio, ScaleValue, SweepPoint};

/// `floor(N * p / 100)`, widened so large scales cannot overflow
pub fn fault_count(scale: ScaleValue, ratio: FaultRatio) -> FaultCount {
    let faults = (scale as u64 * ratio as u64) / 100;
    faults as FaultCount
}

/// Cross product of scales (outer) and ratios (inner), in configured order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    scales: Vec<ScaleValue>,
    ratios: Vec<FaultRatio>,
}

impl SweepPlan {
    /// Inputs are expected to be validated already (see `SweepConfig::validate`)
    pub fn new(scales: Vec<ScaleValue>, ratios: Vec<FaultRatio>) -> Self {
        Self { scales, ratios }
    }

    pub fn scales(&self) -> &[ScaleValue] {
        &self.scales
    }

    pub fn ratios(&self) -> &[FaultRatio] {
        &self.ratios
    }

    /// Number of cells in the grid
    pub fn len(&self) -> usize {
        self.scales.len() * self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        self.scales.iter().flat_map(move |&scale| {
            self.ratios.iter().map(move |&ratio| SweepPoint {
                scale,
                ratio,
                faults: fault_count(scale, ratio),
            })
        })
    }
}
