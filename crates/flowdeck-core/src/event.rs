//! Run event distribution.
//!
//! Events fan out to every subscriber over a tokio broadcast channel.
//! Subscribers consume an [`EventStream`], which absorbs the channel's lag
//! semantics (a slow consumer skips the dropped events and keeps receiving
//! instead of erroring out) and can be scoped to a single run id so a caller
//! only sees the run it started.

use tokio::sync::broadcast;
use tracing::warn;

use crate::types::RunEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out point for run lifecycle events.
pub struct EventBus {
    tx: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing never fails; an event with no subscribers is dropped.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }

    /// A stream of every event published after this call.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            run_id: None,
        }
    }

    /// A stream limited to one run's events. Unscoped events such as log
    /// lines are filtered out as well.
    pub fn subscribe_run(&self, run_id: impl Into<String>) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            run_id: Some(run_id.into()),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One subscriber's view of the bus.
pub struct EventStream {
    rx: broadcast::Receiver<RunEvent>,
    run_id: Option<String>,
}

impl EventStream {
    fn wants(&self, event: &RunEvent) -> bool {
        match &self.run_id {
            None => true,
            Some(id) => event.run_id() == Some(id.as_str()),
        }
    }

    /// The next matching event, or `None` once the bus is gone. A stream
    /// that lags behind the channel capacity resumes from the oldest
    /// retained event.
    pub async fn recv(&mut self) -> Option<RunEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event stream lagged, skipping dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when no matching
    /// event is buffered.
    pub fn try_recv(&mut self) -> Option<RunEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Event stream lagged, skipping dropped events");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;

    fn started(run: &str, node: &str) -> RunEvent {
        RunEvent::NodeStarted {
            run_id: run.to_string(),
            node_id: node.to_string(),
        }
    }

    #[test]
    fn run_scoped_stream_sees_only_its_run() {
        let bus = EventBus::default();
        let mut stream = bus.subscribe_run("r2");

        bus.publish(started("r1", "a"));
        bus.publish(RunEvent::Log {
            level: LogLevel::Warn,
            message: "noise".to_string(),
            node_id: None,
        });
        bus.publish(started("r2", "b"));

        let event = stream.try_recv().unwrap();
        assert!(matches!(event, RunEvent::NodeStarted { ref node_id, .. } if node_id == "b"));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn lagged_stream_skips_dropped_events_and_keeps_receiving() {
        let bus = EventBus::new(1);
        let mut stream = bus.subscribe();
        for node in ["a", "b", "c"] {
            bus.publish(started("r1", node));
        }

        let event = stream.try_recv().unwrap();
        assert!(matches!(event, RunEvent::NodeStarted { ref node_id, .. } if node_id == "c"));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        bus.publish(started("r1", "a"));

        // only events published after subscribing are delivered
        let mut stream = bus.subscribe();
        assert!(stream.try_recv().is_none());
    }
}
