//! Trace one broadcast over the path 0-1-2-3 at full fan-out
//!
//! Run with: cargo run --example path_broadcast

use gossip_rust::{Broadcast, Event, EventSink, Graph, NodeId, Round};
use log::info;
use simple_logger::SimpleLogger;

/// Logs each event as it happens
struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn log(&mut self, round: Round, node: NodeId, event: Event) {
        info!("round {} node {}: {:?}", round, node, event);
    }
}

fn main() {
    SimpleLogger::new().init().unwrap();

    let graph = Graph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
    let result = Broadcast::new(&graph, 100)
        .unwrap()
        .with_sink(Box::new(LoggingEventSink))
        .run_from(0)
        .unwrap();

    info!("Round sequence: {:?}", result.round_known);
    info!("Fully diffused: {}", result.fully_diffused);
    info!("Protocol rounds run: {}", result.rounds_executed);

    assert_eq!(result.round_known, vec![0, 1, 2, 3]);
    assert!(result.fully_diffused);
    info!("✓ Path scenario verified!");
}
