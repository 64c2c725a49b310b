//! Monte-Carlo aggregation over independent broadcast trials.
//!
//! Every trial generates a fresh connected graph and runs one broadcast on
//! it. Trials under a fixed `(size, percent)` are i.i.d., so they reduce by
//! plain summation: [`RoundsAccumulator`] for the mean terminal round and
//! [`CurveAccumulator`] for per-round curves and termination histograms.
//! Both accumulators merge associatively, which lets [`Sampler`] spread
//! trials over worker threads and still produce the same numbers as a
//! single-threaded run with the same seed.

use std::thread;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::gd_broadcast::{Broadcast, BroadcastResult};
use crate::gd_graph::{generate_connected, Graph, MIN_GRAPH_NODES};
use crate::gd_interface::{validate_percent, DiffusionError, Percent, RandomSource};

// ============================================================================
// Configuration
// ============================================================================

/// Parameters for one batch of trials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Number of independent trials
    pub samples: usize,

    /// Nodes per generated graph
    pub size: usize,

    /// Fan-out percentage used by every node
    pub percent: Percent,

    /// Threads to spread trials over
    pub workers: usize,

    /// Random seed for reproducibility
    #[serde(skip)]
    pub seed: Option<[u8; 32]>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 30,
            size: 100,
            percent: 100,
            workers: 1,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn new(samples: usize, size: usize, percent: Percent) -> Self {
        Self {
            samples,
            size,
            percent,
            ..Default::default()
        }
    }

    /// # Errors
    /// * `InvalidArgument` - zero samples or workers, percent above 100, or
    ///   a graph size with no connectivity goal
    pub fn validate(&self) -> Result<(), DiffusionError> {
        if self.samples == 0 {
            return Err(DiffusionError::invalid("samples", "need at least one trial"));
        }
        if self.workers == 0 {
            return Err(DiffusionError::invalid("workers", "need at least one worker"));
        }
        validate_percent(self.percent)?;
        if self.size < MIN_GRAPH_NODES {
            return Err(DiffusionError::invalid(
                "size",
                format!(
                    "graph needs at least {} nodes, got {}",
                    MIN_GRAPH_NODES, self.size
                ),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Graph Sources
// ============================================================================

/// Supplies the graph for each trial
pub trait GraphSource {
    fn graph<R: RandomSource + ?Sized>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> Result<Graph, DiffusionError>;
}

/// Fresh random connected graph per trial
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomConnectedGraphs;

impl GraphSource for RandomConnectedGraphs {
    fn graph<R: RandomSource + ?Sized>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> Result<Graph, DiffusionError> {
        generate_connected(size, rng)
    }
}

/// The same graph for every trial; `size` must match its node count
#[derive(Debug, Clone)]
pub struct FixedGraph(pub Graph);

impl GraphSource for FixedGraph {
    fn graph<R: RandomSource + ?Sized>(
        &self,
        size: usize,
        _rng: &mut R,
    ) -> Result<Graph, DiffusionError> {
        if self.0.node_count() != size {
            return Err(DiffusionError::invalid(
                "size",
                format!(
                    "fixed graph has {} nodes, {} requested",
                    self.0.node_count(),
                    size
                ),
            ));
        }
        Ok(self.0.clone())
    }
}

/// Generate a graph and broadcast over it once
pub fn run_trial<G, R>(
    graphs: &G,
    size: usize,
    percent: Percent,
    rng: &mut R,
) -> Result<BroadcastResult, DiffusionError>
where
    G: GraphSource + ?Sized,
    R: RandomSource + ?Sized,
{
    let graph = graphs.graph(size, rng)?;
    Broadcast::new(&graph, percent)?.run(rng)
}

// ============================================================================
// Accumulators
// ============================================================================

/// Running sum of terminal round indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundsAccumulator {
    total_rounds: usize,
    trials: usize,
}

impl RoundsAccumulator {
    pub fn add(&mut self, result: &BroadcastResult) {
        self.total_rounds += result.terminal_round();
        self.trials += 1;
    }

    pub fn merge(&mut self, other: RoundsAccumulator) {
        self.total_rounds += other.total_rounds;
        self.trials += other.trials;
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Mean terminal round, or `None` before any trial was added
    pub fn mean(&self) -> Option<f64> {
        if self.trials == 0 {
            return None;
        }
        Some(self.total_rounds as f64 / self.trials as f64)
    }
}

/// Per-round statistics across trials of differing length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundCurves {
    /// Mean informed count at each round over the trials reaching it
    pub averages: Vec<f64>,

    /// Trials whose round sequence reaches round `i`
    pub trial_counts: Vec<usize>,

    /// Trials whose round sequence ends at round `i`
    pub terminations_on_round: Vec<usize>,

    /// Fully diffused trials whose terminal round is `i`
    pub full_diffusion_histogram: Vec<usize>,

    /// Mean informed count (source excluded) at each trial's terminal round
    pub mean_final_informed: f64,

    /// Trials aggregated
    pub trials: usize,
}

/// Running per-round sums
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveAccumulator {
    sums: Vec<usize>,
    counts: Vec<usize>,
    full_diffusion: Vec<usize>,
    final_informed: usize,
    trials: usize,
}

impl CurveAccumulator {
    pub fn add(&mut self, result: &BroadcastResult) {
        let len = result.round_known.len();
        self.grow(len);

        for (i, &known) in result.round_known.iter().enumerate() {
            self.sums[i] += known;
            self.counts[i] += 1;
        }
        if result.fully_diffused {
            self.full_diffusion[result.terminal_round()] += 1;
        }
        self.final_informed += result.informed_total() - 1;
        self.trials += 1;
    }

    pub fn merge(&mut self, other: CurveAccumulator) {
        self.grow(other.sums.len());
        for (i, sum) in other.sums.into_iter().enumerate() {
            self.sums[i] += sum;
        }
        for (i, count) in other.counts.into_iter().enumerate() {
            self.counts[i] += count;
        }
        for (i, full) in other.full_diffusion.into_iter().enumerate() {
            self.full_diffusion[i] += full;
        }
        self.final_informed += other.final_informed;
        self.trials += other.trials;
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn finish(self) -> RoundCurves {
        let averages = self
            .sums
            .iter()
            .zip(&self.counts)
            .map(|(&sum, &count)| sum as f64 / count as f64)
            .collect();

        let terminations_on_round = (0..self.counts.len())
            .map(|i| self.counts[i] - self.counts.get(i + 1).copied().unwrap_or(0))
            .collect();

        let mean_final_informed = if self.trials == 0 {
            0.0
        } else {
            self.final_informed as f64 / self.trials as f64
        };

        RoundCurves {
            averages,
            trial_counts: self.counts,
            terminations_on_round,
            full_diffusion_histogram: self.full_diffusion,
            mean_final_informed,
            trials: self.trials,
        }
    }

    fn grow(&mut self, len: usize) {
        if self.sums.len() < len {
            self.sums.resize(len, 0);
            self.counts.resize(len, 0);
            self.full_diffusion.resize(len, 0);
        }
    }
}

/// Mean terminal round over `samples` trials drawn from one random source
pub fn average_rounds_with<G, R>(
    graphs: &G,
    rng: &mut R,
    samples: usize,
    size: usize,
    percent: Percent,
) -> Result<f64, DiffusionError>
where
    G: GraphSource + ?Sized,
    R: RandomSource + ?Sized,
{
    let mut acc = RoundsAccumulator::default();
    for _ in 0..samples {
        acc.add(&run_trial(graphs, size, percent, rng)?);
    }
    acc.mean()
        .ok_or_else(|| DiffusionError::invalid("samples", "need at least one trial"))
}

/// Per-round curves over `samples` trials drawn from one random source
pub fn aggregate_curves_with<G, R>(
    graphs: &G,
    rng: &mut R,
    samples: usize,
    size: usize,
    percent: Percent,
) -> Result<RoundCurves, DiffusionError>
where
    G: GraphSource + ?Sized,
    R: RandomSource + ?Sized,
{
    if samples == 0 {
        return Err(DiffusionError::invalid("samples", "need at least one trial"));
    }
    let mut acc = CurveAccumulator::default();
    for _ in 0..samples {
        acc.add(&run_trial(graphs, size, percent, rng)?);
    }
    Ok(acc.finish())
}

// ============================================================================
// Sampler
// ============================================================================

/// Mean rounds to the terminal round, with the seed that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AverageRounds {
    pub seed_used: [u8; 32],
    pub mean_rounds: f64,
    pub trials: usize,
}

/// Per-round curves, with the seed that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct CurveReport {
    pub seed_used: [u8; 32],
    pub curves: RoundCurves,
}

/// Seeded, optionally multi-threaded driver for batches of trials.
///
/// A master `StdRng` draws one seed per trial before any trial runs; each
/// trial owns an `StdRng` built from its seed. Results only depend on the
/// config seed, never on `workers`.
pub struct Sampler<G = RandomConnectedGraphs> {
    config: SamplingConfig,
    graphs: G,
    seed_used: [u8; 32],
    rng: StdRng,
}

impl Sampler<RandomConnectedGraphs> {
    pub fn new(config: SamplingConfig) -> Result<Self, DiffusionError> {
        Self::with_graph_source(config, RandomConnectedGraphs)
    }
}

impl<G: GraphSource + Sync> Sampler<G> {
    pub fn with_graph_source(config: SamplingConfig, graphs: G) -> Result<Self, DiffusionError> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });

        Ok(Self {
            config,
            graphs,
            seed_used: seed,
            rng: StdRng::from_seed(seed),
        })
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    pub fn seed_used(&self) -> [u8; 32] {
        self.seed_used
    }

    /// Mean terminal round over `samples` trials
    pub fn average_rounds(&mut self) -> Result<AverageRounds, DiffusionError> {
        info!(
            "sampling {} graphs of {} nodes at {}% for mean rounds",
            self.config.samples, self.config.size, self.config.percent
        );

        let acc = self.run_batch(
            |acc: &mut RoundsAccumulator, result| acc.add(&result),
            |acc: &mut RoundsAccumulator, other| acc.merge(other),
        )?;

        let mean_rounds = acc
            .mean()
            .ok_or_else(|| DiffusionError::invariant("batch produced no trials"))?;

        info!(
            "{} nodes at {}%: {:.3} rounds on average over {} trials",
            self.config.size,
            self.config.percent,
            mean_rounds,
            acc.trials()
        );

        Ok(AverageRounds {
            seed_used: self.seed_used,
            mean_rounds,
            trials: acc.trials(),
        })
    }

    /// Per-round curves and termination histograms over `samples` trials
    pub fn aggregate_curves(&mut self) -> Result<CurveReport, DiffusionError> {
        info!(
            "sampling {} graphs of {} nodes at {}% for round curves",
            self.config.samples, self.config.size, self.config.percent
        );

        let acc = self.run_batch(
            |acc: &mut CurveAccumulator, result| acc.add(&result),
            |acc: &mut CurveAccumulator, other| acc.merge(other),
        )?;
        let curves = acc.finish();

        info!(
            "{} nodes at {}%: {} rounds deep, {} of {} trials fully diffused",
            self.config.size,
            self.config.percent,
            curves.trial_counts.len().saturating_sub(1),
            curves.full_diffusion_histogram.iter().sum::<usize>(),
            curves.trials
        );

        Ok(CurveReport {
            seed_used: self.seed_used,
            curves,
        })
    }

    /// Draw per-trial seeds, run trials across workers, fold in trial order
    fn run_batch<A, F, M>(&mut self, add: F, merge: M) -> Result<A, DiffusionError>
    where
        A: Default + Send,
        F: Fn(&mut A, BroadcastResult) + Sync,
        M: Fn(&mut A, A),
    {
        let seeds: Vec<[u8; 32]> = (0..self.config.samples).map(|_| self.rng.gen()).collect();
        let workers = self.config.workers.min(seeds.len());
        let chunk_size = seeds.len().div_ceil(workers);

        let graphs = &self.graphs;
        let size = self.config.size;
        let percent = self.config.percent;
        let add = &add;

        let run_chunk = move |chunk: &[[u8; 32]]| -> Result<A, DiffusionError> {
            let mut acc = A::default();
            for seed in chunk {
                let mut rng = StdRng::from_seed(*seed);
                add(&mut acc, run_trial(graphs, size, percent, &mut rng)?);
            }
            Ok(acc)
        };

        if workers == 1 {
            return run_chunk(&seeds);
        }

        let partials: Vec<Result<A, DiffusionError>> = thread::scope(|scope| {
            let handles: Vec<_> = seeds
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || run_chunk(chunk)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(DiffusionError::invariant("sampling worker panicked"))
                    })
                })
                .collect()
        });

        let mut total = A::default();
        for partial in partials {
            merge(&mut total, partial?);
        }
        Ok(total)
    }
}

// ============================================================================
// Convenience entry points
// ============================================================================

/// Mean terminal round over `samples` random connected graphs of `size` nodes
pub fn sample_average_rounds(
    samples: usize,
    size: usize,
    percent: Percent,
) -> Result<f64, DiffusionError> {
    let mut sampler = Sampler::new(SamplingConfig::new(samples, size, percent))?;
    Ok(sampler.average_rounds()?.mean_rounds)
}

/// Per-round curves over `samples` random connected graphs of `size` nodes
pub fn sample_aggregate_curves(
    samples: usize,
    size: usize,
    percent: Percent,
) -> Result<RoundCurves, DiffusionError> {
    let mut sampler = Sampler::new(SamplingConfig::new(samples, size, percent))?;
    Ok(sampler.aggregate_curves()?.curves)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always picks the first candidate
    struct FirstPick;

    impl RandomSource for FirstPick {
        fn pick_index(&mut self, _len: usize) -> usize {
            0
        }
    }

    /// Fails every trial from the third graph on
    struct FailingGraphs {
        served: std::sync::atomic::AtomicUsize,
    }

    impl GraphSource for FailingGraphs {
        fn graph<R: RandomSource + ?Sized>(
            &self,
            size: usize,
            rng: &mut R,
        ) -> Result<Graph, DiffusionError> {
            let n = self
                .served
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n >= 2 {
                return Err(DiffusionError::invariant("graph source broke"));
            }
            generate_connected(size, rng)
        }
    }

    fn path4() -> FixedGraph {
        FixedGraph(Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap())
    }

    fn result(round_known: Vec<usize>, fully_diffused: bool) -> BroadcastResult {
        BroadcastResult {
            source: 0,
            rounds_executed: round_known.len() + 1,
            round_known,
            fully_diffused,
        }
    }

    #[test]
    fn test_average_rounds_on_fixed_path() {
        let avg = average_rounds_with(&path4(), &mut FirstPick, 1, 4, 100).unwrap();
        assert_eq!(avg, 3.0);

        let avg = average_rounds_with(&path4(), &mut FirstPick, 5, 4, 100).unwrap();
        assert_eq!(avg, 3.0);
    }

    #[test]
    fn test_curves_on_fixed_path() {
        let curves = aggregate_curves_with(&path4(), &mut FirstPick, 2, 4, 100).unwrap();
        assert_eq!(curves.averages, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(curves.trial_counts, vec![2, 2, 2, 2]);
        assert_eq!(curves.terminations_on_round, vec![0, 0, 0, 2]);
        assert_eq!(curves.full_diffusion_histogram, vec![0, 0, 0, 2]);
        assert_eq!(curves.mean_final_informed, 3.0);
        assert_eq!(curves.trials, 2);
    }

    #[test]
    fn test_curve_accumulator_uneven_lengths() {
        let mut acc = CurveAccumulator::default();
        acc.add(&result(vec![0, 2, 4], true));
        acc.add(&result(vec![0, 1], false));
        acc.add(&result(vec![0, 3, 3, 5, 6], true));
        let curves = acc.finish();

        assert_eq!(curves.trial_counts, vec![3, 3, 2, 1, 1]);
        assert_eq!(curves.averages, vec![0.0, 2.0, 3.5, 5.0, 6.0]);
        assert_eq!(curves.terminations_on_round, vec![0, 1, 1, 0, 1]);
        assert_eq!(curves.full_diffusion_histogram, vec![0, 0, 1, 0, 1]);
        assert_eq!(curves.mean_final_informed, (4 + 1 + 6) as f64 / 3.0);
        assert_eq!(curves.trials, 3);
    }

    #[test]
    fn test_accumulator_merge_matches_sequential_add() {
        let results = vec![
            result(vec![0, 2, 4], true),
            result(vec![0, 1], false),
            result(vec![0, 3, 3, 5, 6], true),
            result(vec![0, 0], false),
        ];

        let mut sequential = CurveAccumulator::default();
        let mut rounds = RoundsAccumulator::default();
        for r in &results {
            sequential.add(r);
            rounds.add(r);
        }

        let mut left = CurveAccumulator::default();
        let mut right = CurveAccumulator::default();
        let mut left_rounds = RoundsAccumulator::default();
        let mut right_rounds = RoundsAccumulator::default();
        for r in &results[..2] {
            left.add(r);
            left_rounds.add(r);
        }
        for r in &results[2..] {
            right.add(r);
            right_rounds.add(r);
        }
        left.merge(right);
        left_rounds.merge(right_rounds);

        assert_eq!(left, sequential);
        assert_eq!(left_rounds, rounds);
        assert_eq!(rounds.mean(), Some((2 + 1 + 4 + 1) as f64 / 4.0));
    }

    #[test]
    fn test_empty_rounds_accumulator_has_no_mean() {
        assert_eq!(RoundsAccumulator::default().mean(), None);
    }

    #[test]
    fn test_config_validation() {
        assert!(SamplingConfig::default().validate().is_ok());
        assert!(SamplingConfig::new(0, 10, 50).validate().is_err());
        assert!(SamplingConfig::new(5, 1, 50).validate().is_err());
        assert!(SamplingConfig::new(5, 10, 101).validate().is_err());

        let config = SamplingConfig {
            workers: 0,
            ..SamplingConfig::new(5, 10, 50)
        };
        assert!(matches!(
            config.validate(),
            Err(DiffusionError::InvalidArgument { what: "workers", .. })
        ));

        assert!(sample_average_rounds(0, 10, 50).is_err());
        assert!(sample_aggregate_curves(3, 10, 150).is_err());
    }

    #[test]
    fn test_fixed_graph_size_mismatch() {
        let err = average_rounds_with(&path4(), &mut FirstPick, 1, 5, 100);
        assert!(matches!(
            err,
            Err(DiffusionError::InvalidArgument { what: "size", .. })
        ));
    }

    #[test]
    fn test_seeded_sampler_independent_of_workers() {
        let base = SamplingConfig {
            samples: 24,
            size: 20,
            percent: 60,
            workers: 1,
            seed: Some([7u8; 32]),
        };

        let single = Sampler::new(base.clone()).unwrap().aggregate_curves().unwrap();
        let threaded = Sampler::new(SamplingConfig {
            workers: 5,
            ..base.clone()
        })
        .unwrap()
        .aggregate_curves()
        .unwrap();

        assert_eq!(single.seed_used, [7u8; 32]);
        assert_eq!(single, threaded);
        assert_eq!(single.curves.trials, 24);
        assert_eq!(single.curves.trial_counts[0], 24);

        let single = Sampler::new(base.clone()).unwrap().average_rounds().unwrap();
        let threaded = Sampler::new(SamplingConfig { workers: 3, ..base })
            .unwrap()
            .average_rounds()
            .unwrap();
        assert_eq!(single, threaded);
        assert_eq!(single.trials, 24);
    }

    #[test]
    fn test_full_flood_always_diffuses() {
        let config = SamplingConfig {
            samples: 15,
            size: 25,
            percent: 100,
            workers: 2,
            seed: Some([13u8; 32]),
        };
        let report = Sampler::new(config).unwrap().aggregate_curves().unwrap();
        let curves = report.curves;

        assert_eq!(curves.full_diffusion_histogram.iter().sum::<usize>(), 15);
        assert_eq!(curves.terminations_on_round, curves.full_diffusion_histogram);
        assert_eq!(curves.averages.last().copied(), Some(24.0));
    }

    #[test]
    fn test_sampler_over_fixed_graph() {
        let config = SamplingConfig {
            samples: 40,
            size: 4,
            percent: 100,
            workers: 3,
            seed: Some([2u8; 32]),
        };
        let report = Sampler::with_graph_source(config, path4())
            .unwrap()
            .average_rounds()
            .unwrap();

        // ends of the path need 3 rounds, inner nodes 2
        assert!(report.mean_rounds >= 2.0 && report.mean_rounds <= 3.0);
        assert_eq!(report.trials, 40);
    }

    #[test]
    fn test_threaded_batch_aborts_on_failing_trial() {
        let config = SamplingConfig {
            samples: 9,
            size: 6,
            percent: 100,
            workers: 3,
            seed: Some([6u8; 32]),
        };
        let graphs = FailingGraphs {
            served: std::sync::atomic::AtomicUsize::new(0),
        };
        let result = Sampler::with_graph_source(config.clone(), graphs)
            .unwrap()
            .aggregate_curves();
        assert!(matches!(
            result,
            Err(DiffusionError::InternalInvariantViolation { .. })
        ));

        let result = Sampler::with_graph_source(config, path4())
            .unwrap()
            .average_rounds();
        assert!(matches!(
            result,
            Err(DiffusionError::InvalidArgument { what: "size", .. })
        ));
    }

    #[test]
    fn test_config_from_yaml_fills_defaults() {
        let config: SamplingConfig = serde_yaml::from_str("size: 50\npercent: 40\n").unwrap();
        assert_eq!(config.size, 50);
        assert_eq!(config.percent, 40);
        assert_eq!(config.samples, 30);
        assert_eq!(config.workers, 1);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_zero_percent_never_leaves_round_one() {
        let curves = sample_aggregate_curves(10, 12, 0).unwrap();
        assert_eq!(curves.averages, vec![0.0, 0.0]);
        assert_eq!(curves.trial_counts, vec![10, 10]);
        assert_eq!(curves.terminations_on_round, vec![0, 10]);
        assert_eq!(curves.full_diffusion_histogram, vec![0, 0]);

        assert_eq!(sample_average_rounds(10, 12, 0).unwrap(), 1.0);
    }
}
