//! Coordinator — registry, dispatcher, and the startup/shutdown protocol.
//!
//! The coordinator owns the priority bus, the name/type registry, and
//! the single dispatcher thread that drains the bus and routes each
//! message to its recipients. Membership is fixed while the dispatcher
//! runs: registration is only accepted before `start()`, so the registry
//! is read-only during dispatch.
//!
//! Shutdown sequence:
//! 1. broadcast `system_stop` on the lifecycle key
//! 2. wait (bounded) for the dispatcher to confirm the broadcast was
//!    routed
//! 3. signal every cell's cooperative stop
//! 4. raise the dispatcher stop flag
//! 5. join each worker and the dispatcher, bounded per thread; a loop
//!    that does not exit within the bound is abandoned, never killed

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use cytokine_core::cell::{start_cell, Cell, MessageSender};
use cytokine_core::message::{Message, CORE_SOURCE, PRIORITY_MIN};
use cytokine_core::types::{MessageKind, Target};

use crate::bus::{PriorityBus, LIFECYCLE_KEY};

/// Tunable timing for the coordination runtime.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bounded wait on the bus before the dispatcher re-checks its stop
    /// signal (default: 500ms).
    pub pop_timeout: Duration,
    /// How long `stop()` waits for the dispatcher to confirm the stop
    /// broadcast was routed (default: 1s).
    pub drain_timeout: Duration,
    /// Per-thread bound when joining cell workers and the dispatcher
    /// (default: 5s).
    pub join_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(1),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// The most recent `alert_*` message seen by the dispatcher. Overwritten
/// by each newer alert; no history is retained.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) cells: HashMap<String, Arc<dyn Cell>>,
    pub(crate) by_type: HashMap<String, Vec<String>>,
}

/// One-shot signal with a bounded wait.
struct Flag {
    set: Mutex<bool>,
    changed: Condvar,
}

impl Flag {
    fn new() -> Self {
        Self {
            set: Mutex::new(false),
            changed: Condvar::new(),
        }
    }

    fn raise(&self) {
        *self.set.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.changed.notify_all();
    }

    fn clear(&self) {
        *self.set.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .changed
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            set = guard;
        }
        true
    }
}

pub(crate) struct Shared {
    pub(crate) bus: Arc<PriorityBus>,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) messages_processed: AtomicU64,
    pub(crate) last_alert: Mutex<Option<AlertRecord>>,
    dispatcher_stop: AtomicBool,
    /// Raised by the dispatcher once it has routed the coordinator's own
    /// `system_stop` broadcast.
    drained: Flag,
    /// Raised by the dispatcher as its loop exits.
    dispatcher_done: Flag,
}

/// Composes the registry, priority bus, and dispatcher, and owns the
/// startup/shutdown protocol and aggregate status.
pub struct Coordinator {
    pub(crate) shared: Arc<Shared>,
    config: CoordinatorConfig,
    active: AtomicBool,
    stopping: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator with default timing.
    pub fn new() -> Self {
        Self::from_config(CoordinatorConfig::default())
    }

    /// Create a coordinator with the specified timing.
    pub fn from_config(config: CoordinatorConfig) -> Self {
        info!("coordinator initialized");
        Self {
            shared: Arc::new(Shared {
                bus: Arc::new(PriorityBus::new()),
                registry: RwLock::new(Registry::default()),
                messages_processed: AtomicU64::new(0),
                last_alert: Mutex::new(None),
                dispatcher_stop: AtomicBool::new(false),
                drained: Flag::new(),
                dispatcher_done: Flag::new(),
            }),
            config,
            active: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            started_at: Mutex::new(None),
            dispatcher: Mutex::new(None),
        }
    }

    /// True strictly between a completed `start()` and a completed
    /// `stop()`.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Register `cell` under its unique name and inject the bus-backed
    /// sender into it.
    ///
    /// Fails (returns false, registry unchanged) on a duplicate name, or
    /// while the coordinator is active — membership is fixed once the
    /// dispatcher is routing.
    pub fn register_cell(&self, cell: Arc<dyn Cell>) -> bool {
        if self.is_active() {
            warn!(cell = %cell.core().name(), "registration refused while coordinator is active");
            return false;
        }

        let mut registry = self
            .shared
            .registry
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let name = cell.core().name().to_string();
        if registry.cells.contains_key(&name) {
            warn!(cell = %name, "a cell with this name is already registered");
            return false;
        }

        cell.core()
            .bind_sender(Arc::clone(&self.shared.bus) as Arc<dyn MessageSender>);
        registry
            .by_type
            .entry(cell.core().cell_type().to_string())
            .or_default()
            .push(name.clone());
        let cell_type = cell.core().cell_type().to_string();
        registry.cells.insert(name.clone(), cell);
        drop(registry);

        info!(cell = %name, cell_type = %cell_type, "cell registered");
        true
    }

    /// Number of messages the dispatcher has routed so far.
    pub fn messages_processed(&self) -> u64 {
        self.shared.messages_processed.load(Ordering::Relaxed)
    }

    /// The cached most-recent alert, if any `alert_*` message has been
    /// routed.
    pub fn last_alert(&self) -> Option<AlertRecord> {
        self.shared
            .last_alert
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of registered cells.
    pub fn cell_count(&self) -> usize {
        self.shared
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .cells
            .len()
    }

    /// Time since the last completed `start()`.
    pub fn uptime(&self) -> Duration {
        self.started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Start the dispatcher and every registered cell, then broadcast
    /// `system_start`. No-op if already active.
    pub fn start(&self) {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        *self
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.shared.dispatcher_stop.store(false, Ordering::Release);
        self.shared.drained.clear();
        self.shared.dispatcher_done.clear();

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        *self.dispatcher.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(thread::spawn(move || dispatcher_loop(shared, config)));

        let cells: Vec<Arc<dyn Cell>> = self
            .shared
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .cells
            .values()
            .cloned()
            .collect();
        for cell in &cells {
            start_cell(cell);
        }
        info!(cells = cells.len(), "coordinator started");

        self.shared
            .bus
            .push_with_key(LIFECYCLE_KEY, lifecycle_message(MessageKind::SystemStart));
    }

    /// Broadcast `system_stop`, wait for the dispatcher to confirm it was
    /// routed, then wind down every cell and the dispatcher. No-op if not
    /// active.
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("coordinator stop requested");

        self.shared
            .bus
            .push_with_key(LIFECYCLE_KEY, lifecycle_message(MessageKind::SystemStop));
        if !self.shared.drained.wait(self.config.drain_timeout) {
            warn!("stop broadcast not confirmed within drain timeout");
        }

        let cells: Vec<Arc<dyn Cell>> = self
            .shared
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .cells
            .values()
            .cloned()
            .collect();
        for cell in &cells {
            cell.core().request_stop();
        }

        self.shared.dispatcher_stop.store(true, Ordering::Release);

        for cell in &cells {
            let core = cell.core();
            if core.wait_stopped(self.config.join_timeout) {
                if let Some(worker) = core.take_worker() {
                    let _ = worker.join();
                }
            } else {
                warn!(cell = %core.name(), "worker did not exit within join timeout, abandoning");
            }
        }

        if self.shared.dispatcher_done.wait(self.config.join_timeout) {
            if let Some(handle) = self
                .dispatcher
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take()
            {
                let _ = handle.join();
            }
        } else {
            warn!("dispatcher did not exit within join timeout, abandoning");
        }

        self.active.store(false, Ordering::Release);
        self.stopping.store(false, Ordering::Release);
        info!("coordinator stopped");
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

// Lifecycle broadcasts drain first through LIFECYCLE_KEY; the message's
// own priority field keeps the default.
fn lifecycle_message(kind: MessageKind) -> Message {
    Message::new(
        kind,
        CORE_SOURCE,
        Target::Broadcast,
        json!({ "timestamp": Utc::now().to_rfc3339() }),
        PRIORITY_MIN as i32,
    )
}

fn dispatcher_loop(shared: Arc<Shared>, config: CoordinatorConfig) {
    debug!("message dispatcher started");
    while !shared.dispatcher_stop.load(Ordering::Acquire) {
        let Some(message) = shared.bus.pop_timeout(config.pop_timeout) else {
            continue;
        };

        let stop_broadcast =
            message.kind == MessageKind::SystemStop && message.source == CORE_SOURCE;

        route_message(&shared, &message);
        shared.messages_processed.fetch_add(1, Ordering::Relaxed);

        if message.kind.is_alert() {
            *shared
                .last_alert
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(AlertRecord {
                timestamp: message.timestamp,
                kind: message.kind.as_str().to_string(),
                source: message.source.clone(),
                payload: message.payload.clone(),
            });
        }

        if stop_broadcast {
            shared.drained.raise();
        }
    }
    shared.dispatcher_done.raise();
    debug!("message dispatcher stopped");
}

/// Resolve recipients and deliver synchronously on this (the
/// dispatcher's) thread. A failure inside one recipient's handler never
/// stops delivery to the rest.
fn route_message(shared: &Shared, message: &Message) {
    let registry = shared.registry.read().unwrap_or_else(|e| e.into_inner());
    match &message.target {
        Target::Broadcast => {
            for (name, cell) in &registry.cells {
                if name != &message.source {
                    cell.handle_message(message);
                }
            }
        }
        Target::Type(cell_type) => {
            if let Some(names) = registry.by_type.get(cell_type) {
                for name in names {
                    if name == &message.source {
                        continue;
                    }
                    if let Some(cell) = registry.cells.get(name) {
                        cell.handle_message(message);
                    }
                }
            }
        }
        Target::Cell(name) => match registry.cells.get(name) {
            Some(cell) => {
                cell.handle_message(message);
            }
            None => {
                warn!(target = %name, kind = %message.kind, "message addressed to unknown cell, dropping");
            }
        },
    }
}
