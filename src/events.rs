//! Lightweight progress events emitted during a run.
//!
//! Events flow over an unbounded flume channel; dropping the receiver is
//! fine and emits simply become no-ops at the sender.

use serde::{Deserialize, Serialize};

use crate::collector::BranchKind;

/// A progress or diagnostic event from the coordinator or a collector.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A branch started, finished, or failed.
    Branch {
        branch: BranchKind,
        message: String,
    },
    /// A finalize stage started or completed.
    Stage { stage: String, message: String },
    /// Free-form diagnostic from a collector or stage.
    Diagnostic { scope: String, message: String },
}

impl Event {
    pub fn branch(branch: BranchKind, message: impl Into<String>) -> Self {
        Event::Branch {
            branch,
            message: message.into(),
        }
    }

    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic {
            scope: scope.into(),
            message: message.into(),
        }
    }
}

/// Sender half handed to collectors and stages.
#[derive(Clone, Debug)]
pub struct EventSink {
    sender: Option<flume::Sender<Event>>,
}

impl EventSink {
    pub fn new(sender: flume::Sender<Event>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Emit an event. Errors only when a live channel is disconnected;
    /// callers typically ignore the result.
    pub fn emit(&self, event: Event) -> Result<(), flume::SendError<Event>> {
        match &self.sender {
            Some(sender) => sender.send(event),
            None => Ok(()),
        }
    }
}

/// Create a connected sink/receiver pair.
pub fn channel() -> (EventSink, flume::Receiver<Event>) {
    let (tx, rx) = flume::unbounded();
    (EventSink::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_events_arrive_in_order() {
        let (sink, rx) = channel();
        sink.emit(Event::stage("cleanup", "started")).unwrap();
        sink.emit(Event::stage("cleanup", "done")).unwrap();
        drop(sink);
        let got: Vec<Event> = rx.drain().collect();
        assert_eq!(got.len(), 2);
        assert!(matches!(&got[0], Event::Stage { message, .. } if message == "started"));
    }

    #[test]
    fn disabled_sink_swallows_events() {
        let sink = EventSink::disabled();
        assert!(sink.emit(Event::diagnostic("test", "ignored")).is_ok());
    }
}
