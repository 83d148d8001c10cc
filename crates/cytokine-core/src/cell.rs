//! Cell — the actor base every detection agent builds on.
//!
//! A cell is a named, typed unit of autonomous behavior. It reacts to
//! messages through registered handlers, which the dispatcher invokes on
//! *its* thread, and runs its own periodic work on a dedicated worker
//! thread. [`CellCore`] keeps the base state those two contexts share
//! (status, counters, handler table) synchronized; any *private* state a
//! concrete cell shares between its handlers and its periodic work needs
//! the cell's own discipline (a lock, a single-writer queue, or snapshot
//! swaps).

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::types::{CellSnapshot, CellStats, CellStatus, MessageKind, Target};

/// Interval between two `process_cycle` calls on the worker thread.
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(100);

/// Handler invoked when a message of a registered kind arrives.
pub type Handler = Arc<dyn Fn(&Message) -> Result<()> + Send + Sync>;

/// Sink a cell sends messages through once registered with a coordinator.
pub trait MessageSender: Send + Sync {
    /// Enqueue `message`; returns false if the sink refused it.
    fn send(&self, message: Message) -> bool;
}

struct Lifecycle {
    status: CellStatus,
    stop_requested: bool,
}

/// Shared base state every concrete cell embeds.
///
/// Owns the common half of the actor contract: identity, lifecycle
/// state, the handler table, activity counters, and the sender the
/// coordinator injects at registration time.
pub struct CellCore {
    name: String,
    cell_type: String,
    /// Boolean mirror of the lifecycle status, for fast checks.
    active: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    lifecycle_changed: Condvar,
    handlers: RwLock<HashMap<MessageKind, Handler>>,
    sender: RwLock<Option<Arc<dyn MessageSender>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    actions_performed: AtomicU64,
    last_activity: Mutex<DateTime<Utc>>,
}

impl CellCore {
    pub fn new(name: impl Into<String>, cell_type: impl Into<String>) -> Self {
        let name = name.into();
        let cell_type = cell_type.into();
        debug!(cell = %name, cell_type = %cell_type, "cell initialized");
        Self {
            name,
            cell_type,
            active: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle {
                status: CellStatus::Initialized,
                stop_requested: false,
            }),
            lifecycle_changed: Condvar::new(),
            handlers: RwLock::new(HashMap::new()),
            sender: RwLock::new(None),
            worker: Mutex::new(None),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            actions_performed: AtomicU64::new(0),
            last_activity: Mutex::new(Utc::now()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell_type(&self) -> &str {
        &self.cell_type
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn status(&self) -> CellStatus {
        self.lifecycle_guard().status
    }

    /// Bind `handler` to `kind`. A prior binding for the same kind is
    /// replaced; last write wins, no error on overwrite.
    pub fn register_handler(
        &self,
        kind: impl Into<MessageKind>,
        handler: impl Fn(&Message) -> Result<()> + Send + Sync + 'static,
    ) {
        let kind = kind.into();
        debug!(cell = %self.name, kind = %kind, "handler registered");
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, Arc::new(handler));
    }

    /// Deliver a message to this cell's handler table.
    ///
    /// Runs on the dispatcher's thread. The receive counter and activity
    /// timestamp move even when no handler is bound. A handler failure
    /// (or panic) is caught, logged, and reported in the return value,
    /// never propagated.
    pub fn handle_message(&self, message: &Message) -> bool {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.touch();

        // Clone the handler out so the table lock is not held during the
        // call; a handler may register handlers on its own cell.
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message.kind)
            .cloned();
        let Some(handler) = handler else {
            warn!(cell = %self.name, kind = %message.kind, "no handler for message kind");
            return false;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(message)))
            .unwrap_or_else(|_| Err(CoreError::handler(message.kind.as_str(), "handler panicked")));
        match outcome {
            Ok(()) => true,
            Err(err) => {
                error!(cell = %self.name, kind = %message.kind, error = %err, "message handler failed");
                false
            }
        }
    }

    /// Send a message into the owning coordinator's bus, with this
    /// cell's name stamped as the source.
    ///
    /// Before registration with a coordinator this is a no-op that
    /// reports failure.
    pub fn send_message(
        &self,
        kind: impl Into<MessageKind>,
        target: Target,
        payload: Value,
        priority: i32,
    ) -> bool {
        let sender = self
            .sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(sender) = sender else {
            warn!(cell = %self.name, "send_message before registration with a coordinator");
            return false;
        };

        let message = Message::new(kind, self.name.clone(), target, payload, priority);
        if !sender.send(message) {
            return false;
        }
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.touch();
        true
    }

    /// Record one unit of domain work done by the concrete cell.
    pub fn record_action(&self) {
        self.actions_performed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Inject the coordinator-bound sender. Called at registration; the
    /// cell's `send_message` reports failure until this happens.
    pub fn bind_sender(&self, sender: Arc<dyn MessageSender>) {
        *self.sender.write().unwrap_or_else(|e| e.into_inner()) = Some(sender);
    }

    pub fn stats(&self) -> CellStats {
        CellStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            actions_performed: self.actions_performed.load(Ordering::Relaxed),
            last_activity: *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Snapshot of the cell's current state.
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            name: self.name.clone(),
            cell_type: self.cell_type.clone(),
            status: self.status(),
            active: self.is_active(),
            stats: self.stats(),
            last_update: Utc::now(),
        }
    }

    /// Raise the cooperative stop signal. No-op (false) if not active.
    ///
    /// The worker observes the signal on its next bounded wait and exits;
    /// marking the cell stopped is the worker's last act.
    pub fn request_stop(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        let mut lifecycle = self.lifecycle_guard();
        lifecycle.stop_requested = true;
        lifecycle.status = CellStatus::Stopping;
        self.lifecycle_changed.notify_all();
        info!(cell = %self.name, "stop requested");
        true
    }

    /// Block until the worker loop has exited, up to `timeout`.
    ///
    /// Returns false if the bound elapsed first; the caller abandons the
    /// worker in that case, it is never killed.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lifecycle = self.lifecycle_guard();
        while lifecycle.status != CellStatus::Stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .lifecycle_changed
                .wait_timeout(lifecycle, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            lifecycle = guard;
        }
        true
    }

    /// Take the worker's join handle, if one was spawned.
    pub fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Worker-side check of the cooperative stop signal.
    fn stop_requested(&self) -> bool {
        self.lifecycle_guard().stop_requested
    }

    /// Worker-side bounded wait; true once stop has been requested.
    fn wait_for_stop(&self, timeout: Duration) -> bool {
        let lifecycle = self.lifecycle_guard();
        if lifecycle.stop_requested {
            return true;
        }
        let (guard, _) = self
            .lifecycle_changed
            .wait_timeout(lifecycle, timeout)
            .unwrap_or_else(|e| e.into_inner());
        guard.stop_requested
    }

    fn mark_started(&self) {
        let mut lifecycle = self.lifecycle_guard();
        lifecycle.status = CellStatus::Active;
        lifecycle.stop_requested = false;
    }

    fn mark_stopped(&self) {
        let mut lifecycle = self.lifecycle_guard();
        lifecycle.status = CellStatus::Stopped;
        self.active.store(false, Ordering::Release);
        self.lifecycle_changed.notify_all();
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Utc::now();
    }

    fn lifecycle_guard(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The actor contract every concrete detection or monitoring cell
/// implements.
///
/// Concrete cells embed a [`CellCore`] and return it from [`Cell::core`];
/// the provided methods delegate the common contract to it. Override
/// [`Cell::process_cycle`] for the cell's periodic work.
pub trait Cell: Send + Sync + 'static {
    /// The shared base state for this cell.
    fn core(&self) -> &CellCore;

    /// One iteration of the cell's periodic work, run on its worker
    /// thread roughly every [`CYCLE_INTERVAL`]. Default: no-op.
    ///
    /// An `Err` ends the worker loop; the cell is then marked stopped.
    fn process_cycle(&self) -> Result<()> {
        Ok(())
    }

    /// Deliver a message to this cell. Called on the dispatcher thread.
    fn handle_message(&self, message: &Message) -> bool {
        self.core().handle_message(message)
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn cell_type(&self) -> &str {
        self.core().cell_type()
    }

    /// Cooperatively stop the worker loop. No-op (false) if not active.
    fn stop(&self) -> bool {
        self.core().request_stop()
    }

    /// Snapshot of the cell's current state.
    fn status(&self) -> CellSnapshot {
        self.core().snapshot()
    }
}

/// Start `cell`'s worker thread. No-op (returns false) while already
/// active; a stopped cell can be started again.
pub fn start_cell(cell: &Arc<dyn Cell>) -> bool {
    let core = cell.core();
    if core
        .active
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return false;
    }
    core.mark_started();

    let worker = Arc::clone(cell);
    let handle = thread::spawn(move || run_worker(worker));
    *core.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    info!(cell = %core.name, cell_type = %core.cell_type, "cell started");
    true
}

fn run_worker(cell: Arc<dyn Cell>) {
    let name = cell.core().name().to_string();
    debug!(cell = %name, "worker thread started");
    loop {
        if cell.core().stop_requested() {
            break;
        }
        if let Err(err) = cell.process_cycle() {
            error!(cell = %name, error = %err, "process cycle failed, stopping worker");
            break;
        }
        if cell.core().wait_for_stop(CYCLE_INTERVAL) {
            break;
        }
    }
    cell.core().mark_stopped();
    info!(cell = %name, "cell stopped");
}
