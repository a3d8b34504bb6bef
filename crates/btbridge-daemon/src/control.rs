//! The control thread's task queue.
//!
//! Result and notification handlers only ever run on the control thread.
//! Other threads hand work over with [`ControlHandle::dispatch`]; the thread
//! that created the [`ControlLoop`] drains it.

use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::debug;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Quit,
}

/// Cloneable, thread-safe sender of control-thread tasks.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<Message>,
    owner: ThreadId,
}

impl ControlHandle {
    /// Queue `task` for the control thread. Fire-and-forget: if the loop is
    /// gone the task is dropped unrun.
    pub fn dispatch(&self, task: impl FnOnce() + Send + 'static) {
        if self.tx.send(Message::Run(Box::new(task))).is_err() {
            debug!("control loop gone; dropping task");
        }
    }

    /// Ask [`ControlLoop::run`] to return once earlier tasks have run.
    pub fn quit(&self) {
        if self.tx.send(Message::Quit).is_err() {
            debug!("control loop gone; dropping quit");
        }
    }

    pub fn is_control_thread(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl std::fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlHandle")
            .field("owner", &self.owner)
            .finish()
    }
}

/// The receiving end, pinned to the thread that created it.
pub struct ControlLoop {
    rx: Receiver<Message>,
    handle: ControlHandle,
    _not_send: PhantomData<Rc<()>>,
}

impl ControlLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            rx,
            handle: ControlHandle {
                tx,
                owner: thread::current().id(),
            },
            _not_send: PhantomData,
        }
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Run every task that is already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(Message::Run(task)) => {
                    task();
                    ran += 1;
                }
                Ok(Message::Quit) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Wait up to `timeout` for one task and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(Message::Run(task)) => {
                    task();
                    return true;
                }
                Ok(Message::Quit) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false
                }
            }
        }
    }

    /// Run tasks until `done` holds or `timeout` passes. Returns whether
    /// `done` held.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.run_one(remaining.min(Duration::from_millis(50)));
        }
    }

    /// Run tasks until [`ControlHandle::quit`] is called.
    pub fn run(&self) {
        while let Ok(message) = self.rx.recv() {
            match message {
                Message::Run(task) => task(),
                Message::Quit => return,
            }
        }
    }
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new()
    }
}
