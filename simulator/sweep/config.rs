// Sweep Scenario Configuration

use gossip_rust::{DiffusionError, Percent};
use serde::Deserialize;

// ============================================================================
// Scenario File
// ============================================================================

/// A YAML sweep scenario
#[derive(Debug, Clone, Deserialize)]
pub struct SweepScenario {
    /// Scenario metadata
    #[serde(default)]
    pub meta: ScenarioMeta,

    /// Trials per sweep point
    #[serde(default = "default_samples")]
    pub samples: usize,

    /// Threads per sweep point
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Sweeps to run, in order
    pub sweeps: Vec<Sweep>,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// One parameter sweep
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sweep {
    /// Mean rounds to the terminal round for each graph size, fixed fan-out
    Size { sizes: StepRange, percent: Percent },

    /// Round curves and termination histograms for each fan-out, fixed size
    Percent { size: usize, percents: StepRange },
}

/// Stepped range, `end` exclusive; `step` may be negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StepRange {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl StepRange {
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step }
    }

    /// Values of the range; rejects a zero step and negative values
    pub fn values(&self) -> Result<Vec<u64>, DiffusionError> {
        if self.step == 0 {
            return Err(DiffusionError::invalid("step", "range step must not be zero"));
        }

        let mut values = Vec::new();
        let mut v = self.start;
        while (self.step > 0 && v < self.end) || (self.step < 0 && v > self.end) {
            let value = u64::try_from(v).map_err(|_| {
                DiffusionError::invalid("range", format!("negative value {} in range", v))
            })?;
            values.push(value);
            v = v.checked_add(self.step).ok_or_else(|| {
                DiffusionError::invalid("range", format!("{} + {} overflows", v, self.step))
            })?;
        }
        Ok(values)
    }
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output and logging
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Directory for CSV tables (one file per sweep point)
    pub csv_dir: Option<String>,

    /// Trace one broadcast per sweep through the console event sink
    #[serde(default)]
    pub trace_events: bool,

    /// Also export traced events to this CSV file
    pub trace_csv: Option<String>,
}

fn default_samples() -> usize {
    30
}

fn default_workers() -> usize {
    1
}

// ============================================================================
// Default Scenario
// ============================================================================

impl Default for SweepScenario {
    /// Rounds against graph size (5..100 step 5, full fan-out), then round
    /// curves against fan-out (100 down to 10 step 5) on 100-node graphs
    fn default() -> Self {
        Self {
            meta: ScenarioMeta {
                name: Some("Default diffusion sweep".to_string()),
                description: Some(
                    "Rounds until full diffusion by graph size, then diffusion curves by fan-out"
                        .to_string(),
                ),
            },
            samples: default_samples(),
            workers: default_workers(),
            sweeps: vec![
                Sweep::Size {
                    sizes: StepRange::new(5, 100, 5),
                    percent: 100,
                },
                Sweep::Percent {
                    size: 100,
                    percents: StepRange::new(100, 5, -5),
                },
            ],
            output: OutputConfig::default(),
        }
    }
}
