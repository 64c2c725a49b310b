//! # gossipRust - Gossip Diffusion Simulator
//!
//! Simulates epidemic-style broadcast over randomly generated connected
//! graphs and aggregates how fast information spreads: given `N` nodes and a
//! per-round fan-out percentage, how many rounds until a message from one
//! random node reaches every other node, or how far it gets if it stalls.
//!
//! ## Core Components
//!
//! - **gd_graph**: random connected graph generation (ordered-pair draws
//!   without replacement until connected)
//! - **gd_broadcast**: round-synchronous diffusion with partial neighbor
//!   fan-out and termination detection
//! - **gd_sampling**: Monte-Carlo aggregation over independent trials,
//!   optionally spread over worker threads
//!
//! ```no_run
//! use gossip_rust::{generate_connected, run_broadcast, Sampler, SamplingConfig};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::from_seed([42u8; 32]);
//! let graph = generate_connected(50, &mut rng).unwrap();
//! let result = run_broadcast(&graph, 60, &mut rng).unwrap();
//! println!("{:?} full={}", result.round_known, result.fully_diffused);
//!
//! let config = SamplingConfig { samples: 30, size: 100, percent: 80, workers: 4, seed: None };
//! let report = Sampler::new(config).unwrap().aggregate_curves().unwrap();
//! println!("{:?}", report.curves.averages);
//! ```
//!
//! Plotting and file output live in the `sweep_runner` binary under
//! `simulator/`; the library only returns numbers.

pub mod gd_broadcast;
pub mod gd_graph;
pub mod gd_interface;
pub mod gd_sampling;

pub use gd_broadcast::{fanout, run_broadcast, Broadcast, BroadcastResult};
pub use gd_graph::{connect, generate, generate_connected, Graph};
pub use gd_interface::{
    DiffusionError, Event, EventSink, NoOpSink, NodeId, Percent, RandomSource, Round,
};
pub use gd_sampling::{
    sample_aggregate_curves, sample_average_rounds, AverageRounds, CurveReport, GraphSource,
    RoundCurves, Sampler, SamplingConfig,
};
