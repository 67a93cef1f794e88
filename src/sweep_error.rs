use std::path::PathBuf;

use thiserror::Error;

use crate::sweep_interface::{FaultRatio, ScaleValue};

/// Errors that stop the driver. Per-run failures never end up here; they are
/// recorded in the matrix as `RunResult::Failed` instead.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to read sweep file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sweep file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid sweep configuration: {0}")]
    InvalidConfig(String),

    #[error("cell N={scale}, {ratio}% is not part of the sweep")]
    UnknownCell { scale: ScaleValue, ratio: FaultRatio },

    #[error("cell N={scale}, {ratio}% was already filled")]
    CellAlreadyFilled { scale: ScaleValue, ratio: FaultRatio },

    #[error("failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SweepResult<T> = Result<T, SweepError>;
