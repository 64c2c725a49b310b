//! Event sinks for tracing single broadcasts

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gossip_rust::{Event, EventSink, NodeId, Round};
use log::info;

// ============================================================================
// Console Logging Sink
// ============================================================================

/// Logs events through the `log` facade at info level
pub struct ConsoleEventSink {
    enabled: bool,
}

impl ConsoleEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for ConsoleEventSink {
    fn log(&mut self, round: Round, node: NodeId, event: Event) {
        if !self.enabled {
            return;
        }

        // Format: round node event_type event_details
        match event {
            Event::MessageQueued { to } => {
                info!("{:>4} {:>5} Queued       to:{}", round, node, to);
            }
            Event::Informed {
                from,
                sent_for,
                cumulative,
            } => {
                info!(
                    "{:>4} {:>5} Informed     from:{} sent_for:{} total:{}",
                    round,
                    node,
                    fmt_opt(from),
                    fmt_opt(sent_for),
                    cumulative
                );
            }
            Event::DuplicateDelivery { pending } => {
                info!("{:>4} {:>5} Duplicate    cleared:{}", round, node, pending);
            }
            Event::RoundCompleted {
                cumulative,
                next_round_size,
            } => {
                info!(
                    "{:>4} {:>5} RoundDone    total:{} next:{}",
                    round, node, cumulative, next_round_size
                );
            }
            Event::Terminated { fully_diffused } => {
                info!(
                    "{:>4} {:>5} Terminated   full:{}",
                    round,
                    node,
                    if fully_diffused { "✓" } else { "✗" }
                );
            }
        }
    }
}

fn fmt_opt(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

// ============================================================================
// CSV Event Sink
// ============================================================================

/// CSV event sink for structured data export
pub struct CsvEventSink {
    writer: BufWriter<File>,
}

impl CsvEventSink {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Write CSV header
        writeln!(writer, "round,node,event_type,related_node,value1,value2")?;

        Ok(Self { writer })
    }
}

impl EventSink for CsvEventSink {
    fn log(&mut self, round: Round, node: NodeId, event: Event) {
        let result = match event {
            Event::MessageQueued { to } => {
                writeln!(self.writer, "{},{},MessageQueued,{},0,0", round, node, to)
            }
            Event::Informed {
                from,
                sent_for,
                cumulative,
            } => writeln!(
                self.writer,
                "{},{},Informed,{},{},{}",
                round,
                node,
                from.map_or(String::new(), |v| v.to_string()),
                cumulative,
                sent_for.map_or(String::new(), |v| v.to_string())
            ),
            Event::DuplicateDelivery { pending } => writeln!(
                self.writer,
                "{},{},DuplicateDelivery,,{},0",
                round, node, pending
            ),
            Event::RoundCompleted {
                cumulative,
                next_round_size,
            } => writeln!(
                self.writer,
                "{},{},RoundCompleted,,{},{}",
                round, node, cumulative, next_round_size
            ),
            Event::Terminated { fully_diffused } => writeln!(
                self.writer,
                "{},{},Terminated,,{},0",
                round, node, fully_diffused as u8
            ),
        };

        if let Err(e) = result {
            eprintln!("Error writing to CSV: {}", e);
        }
    }
}

impl Drop for CsvEventSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Multi Event Sink
// ============================================================================

/// Forwards every event to several sinks
pub struct MultiEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiEventSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for MultiEventSink {
    fn log(&mut self, round: Round, node: NodeId, event: Event) {
        for sink in &mut self.sinks {
            sink.log(round, node, event.clone());
        }
    }
}
