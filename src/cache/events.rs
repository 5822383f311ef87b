//! Event Queue Module
//!
//! Bounded, never-blocking channel of access/removal events and the single
//! worker thread that applies them to the frequency sketch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::cache::shard::{Removal, RemovalCause};
use crate::cache::sketch::FrequencySketch;

// == Event ==
/// Something the sketch worker should know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A get or set touched this key hash
    Access(u64),
    /// An entry left a shard
    Removal(Removal),
}

// == Event Queue ==
/// Producer side of the event channel.
///
/// `push` never blocks. When the channel is full the oldest queued event is
/// discarded to make room; the queue keeps a receiver handle for exactly
/// that purpose. That handle keeps the channel connected after the worker
/// exits, so a stopped engine marks the queue closed instead.
#[derive(Debug)]
pub struct EventQueue {
    sender: Sender<Event>,
    overflow: Receiver<Event>,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` events, plus the consumer end.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Event>) {
        let (sender, receiver) = bounded(capacity.max(1));
        let queue = Self {
            sender,
            overflow: receiver.clone(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        };
        (queue, receiver)
    }

    // == Push ==
    /// Enqueues `event`, dropping the oldest pending event if full.
    ///
    /// Does nothing once the queue is closed.
    pub fn push(&self, event: Event) {
        if self.is_closed() {
            return;
        }
        let event = match self.sender.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => event,
            Err(TrySendError::Disconnected(_)) => return,
        };

        if self.overflow.try_recv().is_ok() {
            self.record_drop();
        }
        // Another producer may have refilled the slot; give up on this event then
        if let Err(TrySendError::Full(_)) = self.sender.try_send(event) {
            self.record_drop();
        }
    }

    // == Close ==
    /// Stops accepting events. Pending events stay queued for a final drain.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Events discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Events currently waiting.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    fn record_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(dropped_total = total, "event queue saturated, dropped oldest event");
    }
}

// == Worker Totals ==
/// What the worker applied over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerTotals {
    pub accesses: u64,
    pub deletions: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl WorkerTotals {
    fn apply(&mut self, sketch: &FrequencySketch, event: Event) {
        match event {
            Event::Access(hash) => {
                sketch.increment(hash);
                self.accesses += 1;
            }
            Event::Removal(removal) => {
                trace!(hash = removal.hash, cost = removal.cost, cause = ?removal.cause, "entry removed");
                match removal.cause {
                    RemovalCause::Deleted => self.deletions += 1,
                    RemovalCause::Evicted => self.evictions += 1,
                    RemovalCause::Expired => self.expirations += 1,
                }
            }
        }
    }
}

#[derive(Debug)]
enum Control {
    /// Acknowledge once everything queued so far is applied
    Wait(Sender<()>),
    /// Drain and exit
    Shutdown,
}

// == Sketch Worker ==
/// Handle to the dedicated thread that owns sketch updates.
#[derive(Debug)]
pub struct SketchWorker {
    control: Sender<Control>,
    handle: Mutex<Option<JoinHandle<WorkerTotals>>>,
}

impl SketchWorker {
    // == Spawn ==
    /// Starts the worker thread consuming `events`.
    pub fn spawn(sketch: Arc<FrequencySketch>, events: Receiver<Event>) -> std::io::Result<Self> {
        let (control, control_rx) = bounded(16);
        let handle = thread::Builder::new()
            .name("sketch-worker".into())
            .spawn(move || run(&sketch, &events, &control_rx))?;

        Ok(Self {
            control,
            handle: Mutex::new(Some(handle)),
        })
    }

    // == Wait ==
    /// Blocks until every event queued before this call has been applied.
    ///
    /// Returns immediately once the worker has stopped.
    pub fn wait(&self) {
        let (ack, done) = bounded(1);
        if self.control.send(Control::Wait(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    // == Shutdown ==
    /// Stops the worker after draining the queue. Safe to call repeatedly.
    pub fn shutdown(&self) -> Option<WorkerTotals> {
        let handle = self.handle.lock().take()?;
        let _ = self.control.send(Control::Shutdown);

        match handle.join() {
            Ok(totals) => {
                info!(
                    accesses = totals.accesses,
                    deletions = totals.deletions,
                    evictions = totals.evictions,
                    expirations = totals.expirations,
                    "sketch worker stopped"
                );
                Some(totals)
            }
            Err(_) => {
                warn!("sketch worker panicked");
                None
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

fn run(sketch: &FrequencySketch, events: &Receiver<Event>, control: &Receiver<Control>) -> WorkerTotals {
    debug!("sketch worker started");
    let mut totals = WorkerTotals::default();

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(event) => totals.apply(sketch, event),
                Err(_) => break,
            },
            recv(control) -> message => match message {
                Ok(Control::Wait(ack)) => {
                    drain(sketch, events, &mut totals);
                    let _ = ack.send(());
                }
                Ok(Control::Shutdown) | Err(_) => {
                    drain(sketch, events, &mut totals);
                    break;
                }
            },
        }
    }

    totals
}

fn drain(sketch: &FrequencySketch, events: &Receiver<Event>, totals: &mut WorkerTotals) {
    for event in events.try_iter() {
        totals.apply(sketch, event);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn removal(cause: RemovalCause) -> Event {
        Event::Removal(Removal {
            hash: 1,
            cost: 1,
            cause,
        })
    }

    #[test]
    fn test_push_within_capacity() {
        let (queue, receiver) = EventQueue::bounded(4);
        queue.push(Event::Access(1));
        queue.push(Event::Access(2));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 0);
        assert_eq!(receiver.try_recv(), Ok(Event::Access(1)));
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (queue, receiver) = EventQueue::bounded(2);
        queue.push(Event::Access(1));
        queue.push(Event::Access(2));
        queue.push(Event::Access(3));

        assert_eq!(queue.dropped(), 1);
        let pending: Vec<Event> = receiver.try_iter().collect();
        assert_eq!(pending, vec![Event::Access(2), Event::Access(3)]);
    }

    #[test]
    fn test_closed_queue_ignores_pushes() {
        let (queue, receiver) = EventQueue::bounded(4);
        queue.push(Event::Access(1));
        queue.close();

        for hash in 0..20 {
            queue.push(Event::Access(hash));
        }

        assert!(queue.is_closed());
        assert_eq!(queue.dropped(), 0);
        let pending: Vec<Event> = receiver.try_iter().collect();
        assert_eq!(pending, vec![Event::Access(1)]);
    }

    #[test]
    fn test_worker_applies_accesses() {
        let sketch = Arc::new(FrequencySketch::new(64, 10));
        let (queue, receiver) = EventQueue::bounded(64);
        let worker = SketchWorker::spawn(sketch.clone(), receiver).unwrap();

        for _ in 0..3 {
            queue.push(Event::Access(42));
        }
        queue.push(removal(RemovalCause::Evicted));
        worker.wait();

        assert_eq!(sketch.estimate(42), 3);
        assert!(queue.is_empty());

        let totals = worker.shutdown().unwrap();
        assert_eq!(totals.accesses, 3);
        assert_eq!(totals.evictions, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let sketch = Arc::new(FrequencySketch::new(64, 10));
        let (_queue, receiver) = EventQueue::bounded(8);
        let worker = SketchWorker::spawn(sketch, receiver).unwrap();

        assert!(worker.is_running());
        assert!(worker.shutdown().is_some());
        assert!(worker.shutdown().is_none());
        assert!(!worker.is_running());

        // Waiting on a stopped worker returns immediately
        worker.wait();
    }

    #[test]
    fn test_shutdown_drains_pending_events() {
        let sketch = Arc::new(FrequencySketch::new(64, 10));
        let (queue, receiver) = EventQueue::bounded(64);
        let worker = SketchWorker::spawn(sketch.clone(), receiver).unwrap();

        queue.push(Event::Access(7));
        queue.push(removal(RemovalCause::Deleted));
        queue.push(removal(RemovalCause::Expired));
        let totals = worker.shutdown().unwrap();

        assert_eq!(totals.accesses, 1);
        assert_eq!(totals.deletions, 1);
        assert_eq!(totals.expirations, 1);
        assert_eq!(sketch.estimate(7), 1);
    }
}
