// Sweep Scenario Runner

use std::fs;
use std::path::Path;

use gossip_rust::{
    generate_connected, Broadcast, DiffusionError, EventSink, Percent, Sampler, SamplingConfig,
};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::{Sweep, SweepScenario};
use super::event_sinks::{ConsoleEventSink, CsvEventSink, MultiEventSink};
use super::stats::{PercentPoint, PercentSweepResult, SizePoint, SizeSweepResult, SweepReport};

/// Runs every sweep of a scenario, one seeded [`Sampler`] per sweep point
pub struct SweepRunner {
    scenario: SweepScenario,
    rng: StdRng,
    seed_used: [u8; 32],
}

impl SweepRunner {
    pub fn new(scenario: SweepScenario, seed: Option<[u8; 32]>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });

        Self {
            scenario,
            rng: StdRng::from_seed(seed),
            seed_used: seed,
        }
    }

    pub fn run(mut self) -> Result<SweepReport, DiffusionError> {
        let mut report = SweepReport {
            name: self
                .scenario
                .meta
                .name
                .clone()
                .unwrap_or_else(|| "unnamed".to_string()),
            seed_used: self.seed_used,
            samples: self.scenario.samples,
            size_sweeps: Vec::new(),
            percent_sweeps: Vec::new(),
        };

        for sweep in self.scenario.sweeps.clone() {
            match sweep {
                Sweep::Size { sizes, percent } => {
                    let sizes = sizes.values()?;
                    info!(
                        "size sweep at {}%: {} points, {} samples each",
                        percent,
                        sizes.len(),
                        self.scenario.samples
                    );

                    let mut points = Vec::with_capacity(sizes.len());
                    for (i, size) in sizes.into_iter().enumerate() {
                        let size = size as usize;
                        if i == 0 {
                            self.trace(size, percent)?;
                        }
                        let result = Sampler::new(self.point_config(size, percent))?
                            .average_rounds()?;
                        points.push(SizePoint {
                            size,
                            mean_rounds: result.mean_rounds,
                            trials: result.trials,
                        });
                    }
                    report.size_sweeps.push(SizeSweepResult { percent, points });
                }
                Sweep::Percent { size, percents } => {
                    let percents = percents.values()?;
                    info!(
                        "percent sweep on {} nodes: {} points, {} samples each",
                        size,
                        percents.len(),
                        self.scenario.samples
                    );

                    let mut points = Vec::with_capacity(percents.len());
                    for (i, percent) in percents.into_iter().enumerate() {
                        let percent = Percent::try_from(percent).map_err(|_| {
                            DiffusionError::invalid("percent", format!("{} is too large", percent))
                        })?;
                        if i == 0 {
                            self.trace(size, percent)?;
                        }
                        let curves = Sampler::new(self.point_config(size, percent))?
                            .aggregate_curves()?
                            .curves;
                        points.push(PercentPoint { percent, curves });
                    }
                    report.percent_sweeps.push(PercentSweepResult { size, points });
                }
            }
        }

        Ok(report)
    }

    fn point_config(&mut self, size: usize, percent: Percent) -> SamplingConfig {
        SamplingConfig {
            samples: self.scenario.samples,
            size,
            percent,
            workers: self.scenario.workers,
            seed: Some(self.rng.gen()),
        }
    }

    /// Run one extra broadcast with event tracing enabled
    fn trace(&mut self, size: usize, percent: Percent) -> Result<(), DiffusionError> {
        let output = &self.scenario.output;
        if !output.trace_events {
            return Ok(());
        }

        let mut sinks: Vec<Box<dyn EventSink>> = vec![Box::new(ConsoleEventSink::new(true))];
        if let Some(ref path) = output.trace_csv {
            let path = format!("{}.{}n_{}pct.csv", path.trim_end_matches(".csv"), size, percent);
            if let Some(parent) = Path::new(&path).parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("cannot create {}: {}", parent.display(), e);
                }
            }
            match CsvEventSink::new(&path) {
                Ok(sink) => sinks.push(Box::new(sink)),
                Err(e) => warn!("cannot export events to {}: {}", path, e),
            }
        }

        let mut rng = StdRng::from_seed(self.rng.gen());
        let graph = generate_connected(size, &mut rng)?;
        info!(
            "tracing one broadcast on {} nodes / {} edges at {}%",
            graph.node_count(),
            graph.edge_count(),
            percent
        );
        let result = Broadcast::new(&graph, percent)?
            .with_sink(Box::new(MultiEventSink::new(sinks)))
            .run(&mut rng)?;
        info!(
            "traced broadcast from {}: {:?} full={}",
            result.source, result.round_known, result.fully_diffused
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::config::{OutputConfig, ScenarioMeta, StepRange};

    fn small_scenario() -> SweepScenario {
        SweepScenario {
            meta: ScenarioMeta::default(),
            samples: 4,
            workers: 2,
            sweeps: vec![
                Sweep::Size {
                    sizes: StepRange::new(3, 12, 4),
                    percent: 100,
                },
                Sweep::Percent {
                    size: 15,
                    percents: StepRange::new(100, 0, -50),
                },
            ],
            output: OutputConfig::default(),
        }
    }

    #[test]
    fn test_small_scenario_runs() {
        let report = SweepRunner::new(small_scenario(), Some([4u8; 32])).run().unwrap();

        assert_eq!(report.name, "unnamed");
        assert_eq!(report.size_sweeps.len(), 1);
        let sizes: Vec<usize> = report.size_sweeps[0].points.iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![3, 7, 11]);
        assert!(report.size_sweeps[0]
            .points
            .iter()
            .all(|p| p.trials == 4 && p.mean_rounds >= 1.0));

        let sweep = &report.percent_sweeps[0];
        let percents: Vec<Percent> = sweep.points.iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![100, 50]);
        assert_eq!(sweep.points[0].full_diffusion_rate(), 1.0);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = SweepRunner::new(small_scenario(), Some([8u8; 32])).run().unwrap();
        let b = SweepRunner::new(small_scenario(), Some([8u8; 32])).run().unwrap();
        assert_eq!(a.size_sweeps[0].points, b.size_sweeps[0].points);
        assert_eq!(a.percent_sweeps[0].points, b.percent_sweeps[0].points);
    }

    #[test]
    fn test_invalid_sweep_is_reported() {
        let mut scenario = small_scenario();
        scenario.sweeps = vec![Sweep::Size {
            sizes: StepRange::new(1, 3, 1),
            percent: 100,
        }];
        let err = SweepRunner::new(scenario, Some([1u8; 32])).run();
        assert!(matches!(err, Err(DiffusionError::InvalidArgument { .. })));
    }

    #[test]
    fn test_unwritable_trace_dir_still_runs() {
        // a regular file where the trace directory should go
        let blocker = std::env::temp_dir().join(format!("gd_trace_blocker_{}", std::process::id()));
        fs::write(&blocker, b"").unwrap();

        let mut scenario = small_scenario();
        scenario.output.trace_events = true;
        scenario.output.trace_csv = Some(blocker.join("sub").join("events.csv").display().to_string());

        let report = SweepRunner::new(scenario, Some([2u8; 32])).run();
        fs::remove_file(&blocker).unwrap();
        assert!(report.is_ok());
    }
}
