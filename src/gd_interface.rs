use std::fmt;

use rand::Rng;

// nodes are dense indices 0..n so they double as slots in per-trial arrays
pub type NodeId = usize;
pub type Round = usize;

/// Percentage of a node's neighbors it forwards to in one round (0..=100)
pub type Percent = u32;

pub const MAX_PERCENT: Percent = 100;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by graph generation, broadcast and sampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffusionError {
    /// Malformed input: node count, percent, sample count, worker count
    InvalidArgument {
        what: &'static str,
        reason: String,
    },

    /// A logic defect: round ceiling exceeded or termination guarantee broken.
    /// The current trial is aborted; statistics must not be truncated silently.
    InternalInvariantViolation { detail: String },
}

impl DiffusionError {
    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        DiffusionError::InvalidArgument {
            what,
            reason: reason.into(),
        }
    }

    pub fn invariant(detail: impl Into<String>) -> Self {
        DiffusionError::InternalInvariantViolation {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DiffusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffusionError::InvalidArgument { what, reason } => {
                write!(f, "invalid argument `{}`: {}", what, reason)
            }
            DiffusionError::InternalInvariantViolation { detail } => {
                write!(f, "internal invariant violated: {}", detail)
            }
        }
    }
}

impl std::error::Error for DiffusionError {}

/// Check a fan-out percentage is within 0..=100
pub fn validate_percent(percent: Percent) -> Result<(), DiffusionError> {
    if percent > MAX_PERCENT {
        return Err(DiffusionError::invalid(
            "percent",
            format!("{} is outside 0..={}", percent, MAX_PERCENT),
        ));
    }
    Ok(())
}

// ============================================================================
// Randomness
// ============================================================================

/// Uniform pick from a finite candidate set.
///
/// Every `rand::Rng` is a `RandomSource`. Tests substitute scripted sources
/// to pin the chosen broadcast origin or candidate edge.
pub trait RandomSource {
    /// Return an index uniformly drawn from `0..len`. `len` is never zero.
    fn pick_index(&mut self, len: usize) -> usize;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn pick_index(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

// ============================================================================
// Event Logging System
// ============================================================================

/// Events emitted by a broadcast run for debugging and analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Sender queued a pending message at `to` for the following round
    MessageQueued { to: NodeId },
    /// Node learned the message for the first time. `from` / `sent_for` come
    /// from the first message in its queue.
    Informed {
        from: Option<NodeId>,
        sent_for: Option<Round>,
        cumulative: usize,
    },
    /// Node cleared its queue but was already informed
    DuplicateDelivery { pending: usize },
    /// End of a protocol round
    RoundCompleted {
        cumulative: usize,
        next_round_size: usize,
    },
    /// No pending messages remain anywhere in the graph
    Terminated { fully_diffused: bool },
}

/// Trait for consuming events from the broadcast simulator
pub trait EventSink {
    fn log(&mut self, round: Round, node: NodeId, event: Event);
}

/// No-op event sink for production use (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _round: Round, _node: NodeId, _event: Event) {}
}
