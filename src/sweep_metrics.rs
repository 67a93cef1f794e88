//! Metric extraction from the simulator's console output.
//!
//! The simulator prints a `%+v` dump of its sync metrics per node, so the
//! primary field shows up as e.g. `TotalDuration:1.5023s` somewhere inside a
//! longer line. Only plain-seconds durations are accepted; `500ms` or `1m2s`
//! forms do not match and the scan moves on to the next occurrence.

use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;

use crate::sweep_interface::{FailureReason, RunResult};

pub const TOTAL_DURATION_PATTERN: &str = r"TotalDuration:([0-9.]+)s";

// two spaces: Println inserts one after the label's own trailing space
pub const BANDWIDTH_LIMIT_PATTERN: &str = r"Bandwidth limit:  ([0-9.]+)";

fn total_duration_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(TOTAL_DURATION_PATTERN).expect("valid TotalDuration pattern")
    })
}

fn bandwidth_limit_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(BANDWIDTH_LIMIT_PATTERN).expect("valid Bandwidth limit pattern")
    })
}

/// First capture of `pattern` in `text` that parses as a float.
///
/// A capture like `1.2.3` counts as no match and the search continues.
pub fn first_value(pattern: &Regex, text: &str) -> Option<f64> {
    for captures in pattern.captures_iter(text) {
        let Some(digits) = captures.get(1) else {
            continue;
        };
        match digits.as_str().parse::<f64>() {
            Ok(value) => return Some(value),
            Err(e) => {
                debug!(
                    "ignoring malformed value {:?} in {:?}: {}",
                    digits.as_str(),
                    &captures[0],
                    e
                );
            }
        }
    }
    None
}

pub fn total_duration(text: &str) -> Option<f64> {
    first_value(total_duration_regex(), text)
}

pub fn bandwidth_limit(text: &str) -> Option<f64> {
    first_value(bandwidth_limit_regex(), text)
}

/// TotalDuration, plus Bandwidth limit when the run printed one
pub fn extract(stdout: &str) -> RunResult {
    let Some(duration) = total_duration(stdout) else {
        warn!("TotalDuration not found in output");
        return RunResult::Failed(FailureReason::MetricNotFound);
    };

    match bandwidth_limit(stdout) {
        Some(limit) => {
            debug!("TotalDuration {} + Bandwidth limit {}", duration, limit);
            RunResult::Score(duration + limit)
        }
        None => RunResult::Score(duration),
    }
}
