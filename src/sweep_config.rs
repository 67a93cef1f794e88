//! Sweep configuration: built-in defaults plus optional YAML sweep files.
//!
//! A sweep file only needs the parts it changes:
//!
//! ```yaml
//! meta:
//!   name: sol1 scaling
//! simulator:
//!   program: go
//!   args: [run, .]
//!   working_dir: ../sol1
//! sweep:
//!   scales: { start: 25, end: 100, step: 5 }
//!   percentages: [0, 5, 10, 15, 20, 25, 30, 33]
//! deadline_secs: 120
//! output: formatted_sync_metrics_results.txt
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::sweep_error::{SweepError, SweepResult};
use crate::sweep_executor::{ProcessExecutor, SimulatorCommand, DEFAULT_POLL_INTERVAL};
use crate::sweep_interface::{FaultRatio, ScaleValue, DEFAULT_DEADLINE, MAX_FAULT_RATIO};
use crate::sweep_matrix::{ResultMatrix, REPORT_FILE};
use crate::sweep_plan::SweepPlan;

pub const DEFAULT_SCALES: [ScaleValue; 1] = [25];
pub const DEFAULT_PERCENTAGES: [FaultRatio; 8] = [0, 5, 10, 15, 20, 25, 30, 33];

/// Longest per-run deadline a sweep file may ask for
pub const MAX_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Resolved configuration
// ============================================================================

/// Everything a sweep needs, after defaults and overrides are merged
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub name: Option<String>,
    pub description: Option<String>,

    /// Scale values N, rows of the report
    pub scales: Vec<ScaleValue>,

    /// Fault ratios p in percent, columns of the report
    pub percentages: Vec<FaultRatio>,

    pub simulator: SimulatorCommand,

    /// Per-run wall-clock budget
    pub deadline: Duration,

    /// How often a running simulator is polled for exit
    pub poll_interval: Duration,

    /// Report destination
    pub output: PathBuf,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            scales: DEFAULT_SCALES.to_vec(),
            percentages: DEFAULT_PERCENTAGES.to_vec(),
            simulator: SimulatorCommand::default(),
            deadline: DEFAULT_DEADLINE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            output: PathBuf::from(REPORT_FILE),
        }
    }
}

impl SweepConfig {
    /// Load a sweep file and merge it over the defaults
    pub fn load(path: &Path) -> SweepResult<Self> {
        let yaml = fs::read_to_string(path).map_err(|source| SweepError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&yaml, path)
    }

    /// `origin` only labels errors
    pub fn parse(yaml: &str, origin: &Path) -> SweepResult<Self> {
        let file: SweepFile = serde_yaml::from_str(yaml).map_err(|source| SweepError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        file.into_config()
    }

    pub fn validate(&self) -> SweepResult<()> {
        if self.scales.is_empty() {
            return Err(invalid("no scale values configured"));
        }
        if self.percentages.is_empty() {
            return Err(invalid("no percentages configured"));
        }
        if self.scales.contains(&0) {
            return Err(invalid("scale values must be positive"));
        }
        if let Some(p) = self.percentages.iter().find(|&&p| p > MAX_FAULT_RATIO) {
            return Err(invalid(format!("percentage {} exceeds {}", p, MAX_FAULT_RATIO)));
        }
        if let Some(n) = first_duplicate(&self.scales) {
            return Err(invalid(format!("scale value {} listed twice", n)));
        }
        if let Some(p) = first_duplicate(&self.percentages) {
            return Err(invalid(format!("percentage {} listed twice", p)));
        }
        if self.deadline.is_zero() {
            return Err(invalid("deadline must be positive"));
        }
        if self.deadline > MAX_DEADLINE {
            return Err(invalid(format!(
                "deadline {:?} exceeds {:?}",
                self.deadline, MAX_DEADLINE
            )));
        }
        if self.simulator.program.trim().is_empty() {
            return Err(invalid("simulator program is empty"));
        }
        Ok(())
    }

    pub fn plan(&self) -> SweepPlan {
        SweepPlan::new(self.scales.clone(), self.percentages.clone())
    }

    /// Fresh all-`Unset` matrix shaped like the plan
    pub fn matrix(&self) -> ResultMatrix {
        ResultMatrix::new(&self.scales, &self.percentages)
    }

    pub fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::new(self.simulator.clone())
            .with_deadline(self.deadline)
            .with_poll_interval(self.poll_interval)
    }
}

fn invalid(reason: impl Into<String>) -> SweepError {
    SweepError::InvalidConfig(reason.into())
}

fn first_duplicate<T: Copy + Eq + std::hash::Hash>(values: &[T]) -> Option<T> {
    let mut seen = HashSet::new();
    values.iter().copied().find(|v| !seen.insert(*v))
}

// ============================================================================
// Sweep file format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct SweepFile {
    #[serde(default)]
    meta: SweepMeta,

    #[serde(default)]
    simulator: Option<SimulatorOverrides>,

    #[serde(default)]
    sweep: Option<GridOverrides>,

    deadline_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    output: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SweepMeta {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SimulatorOverrides {
    program: Option<String>,
    args: Option<Vec<String>>,
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct GridOverrides {
    scales: Option<ScaleSpec>,
    percentages: Option<Vec<FaultRatio>>,
}

/// Scale values as an explicit list or an inclusive stepped range
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    List(Vec<ScaleValue>),
    Range {
        start: ScaleValue,
        end: ScaleValue,
        #[serde(default = "default_step")]
        step: ScaleValue,
    },
}

fn default_step() -> ScaleValue {
    1
}

impl ScaleSpec {
    pub fn expand(&self) -> SweepResult<Vec<ScaleValue>> {
        match *self {
            ScaleSpec::List(ref values) => Ok(values.clone()),
            ScaleSpec::Range { step: 0, .. } => Err(invalid("scale range step must be positive")),
            ScaleSpec::Range { start, end, step } => {
                Ok((start..=end).step_by(step as usize).collect())
            }
        }
    }
}

impl SweepFile {
    fn into_config(self) -> SweepResult<SweepConfig> {
        let mut config = SweepConfig {
            name: self.meta.name,
            description: self.meta.description,
            ..SweepConfig::default()
        };

        if let Some(sim) = self.simulator {
            if let Some(v) = sim.program {
                config.simulator.program = v;
            }
            if let Some(v) = sim.args {
                config.simulator.args = v;
            }
            if let Some(v) = sim.working_dir {
                config.simulator.working_dir = Some(v);
            }
        }

        if let Some(grid) = self.sweep {
            if let Some(ref scales) = grid.scales {
                config.scales = scales.expand()?;
            }
            if let Some(v) = grid.percentages {
                config.percentages = v;
            }
        }

        if let Some(v) = self.deadline_secs {
            config.deadline = Duration::from_secs(v);
        }
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.output {
            config.output = v;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> SweepResult<SweepConfig> {
        SweepConfig::parse(yaml, Path::new("test.yaml"))
    }

    #[test]
    fn test_defaults_reproduce_original_sweep() {
        let config = SweepConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scales, vec![25]);
        assert_eq!(config.percentages, vec![0, 5, 10, 15, 20, 25, 30, 33]);
        assert_eq!(config.deadline, Duration::from_secs(120));
        assert_eq!(config.output, PathBuf::from("formatted_sync_metrics_results.txt"));
        assert_eq!(config.simulator.display(25, 8), "go run . -N=25 -f=8");
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("{}").unwrap(), SweepConfig::default());
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
meta:
  name: sol1 scaling
  description: N from 25 to 100
simulator:
  program: ./sim
  args: []
  working_dir: ../sol1
sweep:
  scales: { start: 25, end: 100, step: 5 }
  percentages: [0, 10, 33]
deadline_secs: 60
poll_interval_ms: 10
output: out.tsv
"#,
        )
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("sol1 scaling"));
        assert_eq!(config.simulator.program, "./sim");
        assert!(config.simulator.args.is_empty());
        assert_eq!(config.simulator.working_dir, Some(PathBuf::from("../sol1")));
        assert_eq!(config.scales.len(), 16);
        assert_eq!(config.scales.first(), Some(&25));
        assert_eq!(config.scales.last(), Some(&100));
        assert_eq!(config.percentages, vec![0, 10, 33]);
        assert_eq!(config.deadline, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.output, PathBuf::from("out.tsv"));
    }

    #[test]
    fn test_scale_list() {
        let config = parse("sweep:\n  scales: [40, 25]\n").unwrap();
        assert_eq!(config.scales, vec![40, 25]);
        assert_eq!(config.percentages, DEFAULT_PERCENTAGES.to_vec());
    }

    #[test]
    fn test_rejects_bad_grids() {
        for yaml in [
            "sweep:\n  scales: []\n",
            "sweep:\n  scales: [0, 25]\n",
            "sweep:\n  scales: [25, 25]\n",
            "sweep:\n  percentages: []\n",
            "sweep:\n  percentages: [10, 101]\n",
            "sweep:\n  percentages: [5, 5]\n",
            "sweep:\n  scales: { start: 25, end: 100, step: 0 }\n",
            "sweep:\n  scales: { start: 100, end: 25, step: 5 }\n",
            "deadline_secs: 0\n",
            "deadline_secs: 86401\n",
            "deadline_secs: 18446744073709551615\n",
            "simulator:\n  program: \"\"\n",
        ] {
            let err = parse(yaml).unwrap_err();
            assert!(matches!(err, SweepError::InvalidConfig(_)), "{}: {}", yaml, err);
        }
    }

    #[test]
    fn test_parse_error() {
        let err = parse("sweep: [this is not a map").unwrap_err();
        assert!(matches!(err, SweepError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SweepConfig::load(Path::new("/nonexistent/sweep.yaml")).unwrap_err();
        assert!(matches!(err, SweepError::ConfigRead { .. }));
    }

    #[test]
    fn test_bundled_sweep_files() {
        let sync = parse(include_str!("../sweeps/sol1_sync.yaml")).unwrap();
        assert_eq!(sync.scales, DEFAULT_SCALES.to_vec());
        assert_eq!(sync.percentages, DEFAULT_PERCENTAGES.to_vec());
        assert_eq!(sync.output, PathBuf::from(REPORT_FILE));

        let scaling = parse(include_str!("../sweeps/sol1_scaling.yaml")).unwrap();
        assert_eq!(scaling.scales, (25..=100).step_by(5).collect::<Vec<_>>());
        assert_eq!(scaling.plan().len(), 16 * 8);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.yaml");
        fs::write(&path, "sweep:\n  scales: [30]\n  percentages: [0, 50]\n").unwrap();

        let config = SweepConfig::load(&path).unwrap();
        assert_eq!(config.plan().len(), 2);
        assert_eq!(config.matrix().render(), "N/F\t0%\t50%\n30\t\t\n");
    }
}
