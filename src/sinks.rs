use crate::events::Event;
use crate::pipeline::FrameRecord;
use anyhow::Result;
use crossbeam::channel::{Receiver, Sender};
use log::{debug, error};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Consumer of domain events. `emit` blocks; a sink must observe events of one session in
/// order, which the single pipeline worker guarantees.
///
pub trait EventSink: Send {
    fn emit(&mut self, event: &Event) -> Result<()>;
}

/// Consumer of per-frame summaries.
///
pub trait FrameSink: Send {
    fn emit(&mut self, record: &FrameRecord) -> Result<()>;
}

/// Sink that discards everything.
///
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&mut self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

pub struct NoopFrameSink;

impl FrameSink for NoopFrameSink {
    fn emit(&mut self, _record: &FrameRecord) -> Result<()> {
        Ok(())
    }
}

/// Collecting sink for tests and demos. Clones share the same buffer, so a clone stays
/// readable after the sink moved into the pipeline.
///
#[derive(Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<Event>>> {
        self.events.clone()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryFrameSink {
    records: Arc<Mutex<Vec<FrameRecord>>>,
}

impl MemoryFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<FrameRecord>>> {
        self.records.clone()
    }
}

impl FrameSink for MemoryFrameSink {
    fn emit(&mut self, record: &FrameRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Decouples a blocking sink from the pipeline worker: events go through a bounded channel
/// to a dispatcher thread that drains them in order.
///
pub struct EventDispatcher {
    sender: Sender<Event>,
    worker: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn spawn(mut sink: Box<dyn EventSink>, capacity: usize) -> Self {
        let (sender, receiver): (Sender<Event>, Receiver<Event>) =
            crossbeam::channel::bounded(capacity);

        let worker = std::thread::spawn(move || {
            for event in receiver {
                if let Err(e) = sink.emit(&event) {
                    error!("event sink failed: {e:?}");
                }
            }
            debug!("event dispatcher drained");
        });

        Self {
            sender,
            worker: Some(worker),
        }
    }

    /// A cheap sink facade feeding this dispatcher.
    ///
    pub fn sink(&self) -> ChannelEventSink {
        ChannelEventSink {
            sender: self.sender.clone(),
        }
    }

    /// Closes the channel and waits for the dispatcher to drain.
    ///
    pub fn join(mut self) {
        drop(self.sender);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Sink half of an [EventDispatcher]. `emit` blocks when the channel is full, which keeps
/// the per-session ordering intact under backpressure.
///
pub struct ChannelEventSink {
    sender: Sender<Event>,
}

impl EventSink for ChannelEventSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        self.sender.send(event.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{Event, EventKind};
    use crate::sinks::{EventDispatcher, EventSink, MemoryEventSink};
    use chrono::Utc;

    fn event(track_id: u64) -> Event {
        Event {
            timestamp: Utc::now(),
            track_id,
            student_id: None,
            confidence: 1.0,
            kind: EventKind::StudentEntered,
        }
    }

    #[test]
    fn memory_sink_collects_in_order() {
        let mut sink = MemoryEventSink::new();
        let handle = sink.handle();
        for i in 0..5 {
            sink.emit(&event(i)).unwrap();
        }
        let seen: Vec<u64> = handle.lock().unwrap().iter().map(|e| e.track_id).collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn dispatcher_preserves_order() {
        let inner = MemoryEventSink::new();
        let handle = inner.handle();

        let dispatcher = EventDispatcher::spawn(Box::new(inner), 16);
        let mut sink = dispatcher.sink();
        for i in 0..100 {
            sink.emit(&event(i)).unwrap();
        }
        drop(sink);
        dispatcher.join();

        let seen: Vec<u64> = handle.lock().unwrap().iter().map(|e| e.track_id).collect();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
