//! Correlation of in-flight commands with their result handlers.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::control::ControlHandle;
use crate::error::CommandError;
use crate::status::BluetoothStatus;

/// Completion contract shared by every profile's result handler.
///
/// Each handler instance belongs to exactly one command and sees exactly one
/// callback: a profile-specific success method or `on_error`.
pub trait ResultHandler: Send + Sync + 'static {
    fn on_error(&self, status: BluetoothStatus) {
        warn!(%status, "received error code");
    }
}

type Abandon = fn(Box<dyn Any + Send>, BluetoothStatus, &ControlHandle);

/// A type-erased result handler waiting for its response.
///
/// The concrete handler type is recovered with [`PendingResult::downcast`]
/// by the module that created the entry. Anyone holding the entry can
/// [`abandon`](PendingResult::abandon) it without knowing that type.
pub struct PendingResult {
    handler: Box<dyn Any + Send>,
    abandon: Abandon,
}

impl PendingResult {
    pub fn new<H: ResultHandler + ?Sized>(handler: Arc<H>) -> Self {
        Self {
            handler: Box::new(handler),
            abandon: abandon_as::<H>,
        }
    }

    /// Recover the handler as `Arc<H>`, or hand the entry back unchanged.
    pub fn downcast<H: ResultHandler + ?Sized>(self) -> Result<Arc<H>, Self> {
        match self.handler.downcast::<Arc<H>>() {
            Ok(handler) => Ok(*handler),
            Err(handler) => Err(Self {
                handler,
                abandon: self.abandon,
            }),
        }
    }

    /// Deliver `on_error(status)` on the control thread.
    pub fn abandon(self, status: BluetoothStatus, control: &ControlHandle) {
        (self.abandon)(self.handler, status, control);
    }
}

impl std::fmt::Debug for PendingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResult").finish_non_exhaustive()
    }
}

fn abandon_as<H: ResultHandler + ?Sized>(
    handler: Box<dyn Any + Send>,
    status: BluetoothStatus,
    control: &ControlHandle,
) {
    if let Ok(handler) = handler.downcast::<Arc<H>>() {
        let handler: Arc<H> = *handler;
        control.dispatch(move || handler.on_error(status));
    }
}

/// Deliver a synthesized `on_error` for a command that never reached the
/// daemon.
pub fn dispatch_error<H: ResultHandler + ?Sized>(
    control: &ControlHandle,
    handler: Arc<H>,
    error: &CommandError,
) {
    let status = error.status();
    warn!(%error, %status, "command failed before reaching the daemon");
    control.dispatch(move || handler.on_error(status));
}

fn abandon_queue(
    service: u8,
    queue: VecDeque<(u64, Option<PendingResult>)>,
    status: BluetoothStatus,
    control: &ControlHandle,
) -> usize {
    let mut count = 0;
    for (seq, entry) in queue {
        if let Some(entry) = entry {
            debug!(service, seq, %status, "abandoning pending command");
            entry.abandon(status, control);
            count += 1;
        }
    }
    count
}

/// Outstanding commands, FIFO per service id.
///
/// Every sent command gets a slot, with or without a handler, so responses
/// pair up with commands strictly in send order.
#[derive(Default)]
pub struct PendingRequests {
    queues: Mutex<HashMap<u8, VecDeque<(u64, Option<PendingResult>)>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, service: u8, seq: u64, entry: Option<PendingResult>) {
        self.lock().entry(service).or_default().push_back((seq, entry));
    }

    /// Take the oldest slot for `service`. The outer `None` means nothing was
    /// outstanding at all.
    pub fn pop_front(&self, service: u8) -> Option<Option<PendingResult>> {
        let mut queues = self.lock();
        let queue = queues.get_mut(&service)?;
        let (_, entry) = queue.pop_front()?;
        if queue.is_empty() {
            queues.remove(&service);
        }
        Some(entry)
    }

    /// Remove the slot created for send `seq`, wherever it sits.
    pub fn remove(&self, service: u8, seq: u64) -> Option<Option<PendingResult>> {
        let mut queues = self.lock();
        let queue = queues.get_mut(&service)?;
        let position = queue.iter().position(|(s, _)| *s == seq)?;
        let (_, entry) = queue.remove(position)?;
        if queue.is_empty() {
            queues.remove(&service);
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail every outstanding handler with `status`.
    pub fn abandon_all(&self, status: BluetoothStatus, control: &ControlHandle) {
        let drained: Vec<_> = self.lock().drain().collect();
        let count: usize = drained
            .into_iter()
            .map(|(service, queue)| abandon_queue(service, queue, status, control))
            .sum();
        if count > 0 {
            warn!(count, %status, "abandoned outstanding daemon commands");
        }
    }

    /// Fail the outstanding handlers of one service with `status`.
    pub fn abandon_service(&self, service: u8, status: BluetoothStatus, control: &ControlHandle) {
        let Some(queue) = self.lock().remove(&service) else {
            return;
        };
        let count = abandon_queue(service, queue, status, control);
        if count > 0 {
            warn!(service, count, %status, "abandoned outstanding commands for service");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u8, VecDeque<(u64, Option<PendingResult>)>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::control::ControlLoop;

    trait Finishable: ResultHandler {
        fn done(&self);
    }

    #[derive(Default)]
    struct Recorder {
        errors: Mutex<Vec<BluetoothStatus>>,
        done: Mutex<usize>,
    }

    impl ResultHandler for Recorder {
        fn on_error(&self, status: BluetoothStatus) {
            self.errors.lock().unwrap().push(status);
        }
    }

    impl Finishable for Recorder {
        fn done(&self) {
            *self.done.lock().unwrap() += 1;
        }
    }

    #[test]
    fn downcast_recovers_trait_object() {
        let recorder = Arc::new(Recorder::default());
        let handler: Arc<dyn Finishable> = recorder.clone();
        let pending = PendingResult::new(handler);

        let finishable = pending.downcast::<dyn Finishable>().unwrap();
        finishable.done();
        assert_eq!(*recorder.done.lock().unwrap(), 1);
    }

    #[test]
    fn wrong_downcast_returns_entry_intact() {
        let control = ControlLoop::new();
        let recorder = Arc::new(Recorder::default());
        let pending = PendingResult::new(Arc::clone(&recorder));

        let Err(pending) = pending.downcast::<dyn Finishable>() else {
            panic!("downcast to an unrelated trait should fail");
        };
        pending.abandon(BluetoothStatus::Busy, &control.handle());
        assert!(recorder.errors.lock().unwrap().is_empty());

        control.run_pending();
        assert_eq!(*recorder.errors.lock().unwrap(), vec![BluetoothStatus::Busy]);
    }

    #[test]
    fn fifo_per_service() {
        let requests = PendingRequests::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        requests.push(8, 1, Some(PendingResult::new(Arc::clone(&first))));
        requests.push(1, 2, None);
        requests.push(8, 3, Some(PendingResult::new(Arc::clone(&second))));
        assert_eq!(requests.len(), 3);

        let popped = requests.pop_front(8).unwrap().unwrap();
        let popped: Arc<Recorder> = popped.downcast().unwrap();
        assert!(Arc::ptr_eq(&popped, &first));

        assert!(requests.pop_front(1).unwrap().is_none());
        assert!(requests.pop_front(1).is_none());
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn remove_by_sequence() {
        let requests = PendingRequests::new();
        requests.push(8, 1, None);
        requests.push(8, 2, Some(PendingResult::new(Arc::new(Recorder::default()))));
        requests.push(8, 3, None);

        assert!(requests.remove(8, 2).unwrap().is_some());
        assert!(requests.remove(8, 2).is_none());
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn abandon_all_fails_every_handler_once() {
        let control = ControlLoop::new();
        let requests = PendingRequests::new();
        let recorders: Vec<_> = (0..3).map(|_| Arc::new(Recorder::default())).collect();
        for (seq, recorder) in recorders.iter().enumerate() {
            requests.push(8, seq as u64, Some(PendingResult::new(Arc::clone(recorder))));
        }
        requests.push(8, 99, None);

        requests.abandon_all(BluetoothStatus::Fail, &control.handle());
        assert!(requests.is_empty());
        assert_eq!(control.run_pending(), 3);
        for recorder in &recorders {
            assert_eq!(*recorder.errors.lock().unwrap(), vec![BluetoothStatus::Fail]);
        }
    }

    #[test]
    fn abandon_service_leaves_other_services_alone() {
        let control = ControlLoop::new();
        let requests = PendingRequests::new();
        let avrcp = Arc::new(Recorder::default());
        let other = Arc::new(Recorder::default());
        requests.push(8, 1, Some(PendingResult::new(Arc::clone(&avrcp))));
        requests.push(8, 2, None);
        requests.push(1, 3, Some(PendingResult::new(Arc::clone(&other))));

        requests.abandon_service(8, BluetoothStatus::Fail, &control.handle());
        assert!(requests.pop_front(8).is_none());
        assert_eq!(requests.len(), 1);
        assert_eq!(control.run_pending(), 1);
        assert_eq!(*avrcp.errors.lock().unwrap(), vec![BluetoothStatus::Fail]);
        assert!(other.errors.lock().unwrap().is_empty());
    }
}
