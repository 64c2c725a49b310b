//! Round-synchronous broadcast over a connected graph.
//!
//! One source node starts informed. Whenever a node becomes informed in
//! round `r`, it queues a message for round `r + 1` at the first
//! [`fanout`] of its neighbors (in edge insertion order). At the start of
//! each round every node in the round's delivery list clears its queue;
//! only the first delivery to an uninformed node counts. The run ends at the
//! first round that starts with no pending message anywhere in the graph.

use log::{debug, warn};

use crate::gd_graph::Graph;
use crate::gd_interface::{
    validate_percent, DiffusionError, Event, EventSink, NoOpSink, NodeId, Percent, RandomSource,
    Round,
};

/// Number of neighbors a node of `degree` forwards to at `percent`.
///
/// `degree * percent / 100` rounded to the nearest integer, ties to even:
/// 0.5 -> 0, 1.5 -> 2, 2.5 -> 2.
pub fn fanout(degree: usize, percent: Percent) -> usize {
    let exact = degree as f64 * f64::from(percent) / 100.0;
    (exact.round_ties_even() as usize).min(degree)
}

/// Outcome of one broadcast trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Node the message started from
    pub source: NodeId,

    /// `round_known[i]` = nodes other than the source informed by round `i`.
    /// Ends at the last round that informed a new node, with at least
    /// rounds 0 and 1 present.
    pub round_known: Vec<usize>,

    /// Every node of the graph was informed
    pub fully_diffused: bool,

    /// Protocol rounds actually run, including trailing rounds in which
    /// only already-informed nodes cleared their queues
    pub rounds_executed: Round,
}

impl BroadcastResult {
    /// Round on which diffusion stopped making progress
    pub fn terminal_round(&self) -> Round {
        self.round_known.len() - 1
    }

    /// Informed nodes at the end of the run, source included
    pub fn informed_total(&self) -> usize {
        self.round_known.last().copied().unwrap_or(0) + 1
    }
}

/// A message waiting in a node's queue
#[derive(Debug, Clone, Copy)]
struct PendingMessage {
    from: NodeId,
    round: Round,
}

/// Per-node runtime state, alive for one trial only
#[derive(Debug, Clone, Default)]
struct NodeState {
    informed: bool,
    pending: Vec<PendingMessage>,
}

/// One broadcast trial over a borrowed graph.
///
/// Consumed by [`Broadcast::run`] / [`Broadcast::run_from`]; node state is
/// allocated fresh per trial and dropped with it.
pub struct Broadcast<'g> {
    graph: &'g Graph,
    percent: Percent,
    nodes: Vec<NodeState>,
    pending_total: usize,
    cumulative: usize,
    round_ceiling: Option<Round>,
    event_sink: Box<dyn EventSink>,
}

impl<'g> Broadcast<'g> {
    /// # Errors
    /// * `InvalidArgument` - `percent > 100` or the graph has no nodes
    pub fn new(graph: &'g Graph, percent: Percent) -> Result<Self, DiffusionError> {
        validate_percent(percent)?;
        if graph.is_empty() {
            return Err(DiffusionError::invalid("graph", "graph has no nodes"));
        }

        Ok(Self {
            graph,
            percent,
            nodes: vec![NodeState::default(); graph.node_count()],
            pending_total: 0,
            cumulative: 0,
            round_ceiling: None,
            event_sink: Box::new(NoOpSink),
        })
    }

    /// Route per-node events to `event_sink`
    pub fn with_sink(mut self, event_sink: Box<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    /// Lower the round ceiling below the default `node_count + 2`
    pub(crate) fn with_round_ceiling(mut self, rounds: Round) -> Self {
        self.round_ceiling = Some(rounds);
        self
    }

    /// Run from a uniformly chosen source node
    pub fn run<R: RandomSource + ?Sized>(
        self,
        rng: &mut R,
    ) -> Result<BroadcastResult, DiffusionError> {
        let source = rng.pick_index(self.graph.node_count());
        self.run_from(source)
    }

    /// Run from a fixed source node
    ///
    /// # Errors
    /// * `InvalidArgument` - `source` is not a node of the graph
    /// * `InternalInvariantViolation` - more than `node_count + 2` rounds ran
    pub fn run_from(mut self, source: NodeId) -> Result<BroadcastResult, DiffusionError> {
        let node_count = self.graph.node_count();
        if source >= node_count {
            return Err(DiffusionError::invalid(
                "source",
                format!("node {} is outside 0..{}", source, node_count),
            ));
        }

        // at most n - 1 informing rounds, one drain round, one empty check
        let ceiling = self.round_ceiling.unwrap_or(node_count + 2);

        self.nodes[source].informed = true;
        let mut round_known = vec![0];
        let mut last_informing_round: Round = 0;

        let mut round: Round = 1;
        let mut next_round = Vec::new();
        self.forward(source, 0, round, &mut next_round);

        loop {
            if round > ceiling {
                warn!(
                    "broadcast from {} still has {} pending messages at round {}",
                    source, self.pending_total, round
                );
                return Err(DiffusionError::invariant(format!(
                    "round ceiling {} exceeded on a {} node graph",
                    ceiling, node_count
                )));
            }

            if self.pending_total == 0 {
                round_known.push(self.cumulative);
                break;
            }

            debug!(
                "starting round {} with {} deliveries at {}% fan-out",
                round,
                next_round.len(),
                self.percent
            );

            let mut following = Vec::new();
            for &x in &next_round {
                let first = self.nodes[x].pending.first().copied();
                let cleared = self.nodes[x].pending.len();
                self.nodes[x].pending.clear();
                self.pending_total -= cleared;

                if !self.nodes[x].informed {
                    self.nodes[x].informed = true;
                    self.cumulative += 1;
                    last_informing_round = round;
                    self.event_sink.log(
                        round,
                        x,
                        Event::Informed {
                            from: first.map(|m| m.from),
                            sent_for: first.map(|m| m.round),
                            cumulative: self.cumulative,
                        },
                    );
                    self.forward(x, round, round + 1, &mut following);
                } else if cleared > 0 {
                    self.event_sink
                        .log(round, x, Event::DuplicateDelivery { pending: cleared });
                }
            }

            round_known.push(self.cumulative);
            self.event_sink.log(
                round,
                source,
                Event::RoundCompleted {
                    cumulative: self.cumulative,
                    next_round_size: following.len(),
                },
            );
            next_round = following;
            round += 1;
        }

        let fully_diffused = self.nodes.iter().all(|node| node.informed);
        self.event_sink
            .log(round, source, Event::Terminated { fully_diffused });

        round_known.truncate(last_informing_round.max(1) + 1);

        debug!(
            "broadcast from {} informed {}/{} nodes, settled on round {} after {} rounds",
            source,
            self.cumulative + 1,
            node_count,
            round_known.len() - 1,
            round
        );

        Ok(BroadcastResult {
            source,
            round_known,
            fully_diffused,
            rounds_executed: round,
        })
    }

    /// Queue `x`'s message for `message_round` at its first `fanout`
    /// neighbors and record them as deliveries for that round
    fn forward(
        &mut self,
        x: NodeId,
        round: Round,
        message_round: Round,
        deliveries: &mut Vec<NodeId>,
    ) {
        let graph = self.graph;
        let count = fanout(graph.degree(x), self.percent);

        for &y in graph.neighbors(x).iter().take(count) {
            self.nodes[y].pending.push(PendingMessage {
                from: x,
                round: message_round,
            });
            self.pending_total += 1;
            self.event_sink.log(round, x, Event::MessageQueued { to: y });
            deliveries.push(y);
        }
    }
}

/// Run one broadcast from a uniformly chosen source
pub fn run_broadcast<R: RandomSource + ?Sized>(
    graph: &Graph,
    percent: Percent,
    rng: &mut R,
) -> Result<BroadcastResult, DiffusionError> {
    Broadcast::new(graph, percent)?.run(rng)
}
