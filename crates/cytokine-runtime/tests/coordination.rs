//! End-to-end coordination tests: fan-out, routing, lifecycle, status.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cytokine_runtime::prelude::*;
use serde_json::{json, Value};

struct Probe {
    core: CellCore,
    pings: Arc<AtomicUsize>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl Cell for Probe {
    fn core(&self) -> &CellCore {
        &self.core
    }
}

fn probe(name: &str, cell_type: &str) -> Arc<Probe> {
    let core = CellCore::new(name, cell_type);
    let pings = Arc::new(AtomicUsize::new(0));
    let starts = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));

    let hits = Arc::clone(&pings);
    core.register_handler("ping", move |_msg| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let hits = Arc::clone(&starts);
    core.register_handler("system_start", move |_msg| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let hits = Arc::clone(&stops);
    core.register_handler("system_stop", move |_msg| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    Arc::new(Probe {
        core,
        pings,
        starts,
        stops,
    })
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn broadcast_reaches_every_cell_except_sender() {
    let coordinator = Coordinator::new();
    let a = probe("a", "macrophage");
    let b = probe("b", "macrophage");
    let c = probe("c", "b_cell");
    assert!(coordinator.register_cell(a.clone()));
    assert!(coordinator.register_cell(b.clone()));
    assert!(coordinator.register_cell(c.clone()));

    coordinator.start();
    assert!(a
        .core()
        .send_message("ping", Target::Broadcast, json!({"seq": 1}), 3));

    wait_for("broadcast fan-out", || {
        b.pings.load(Ordering::SeqCst) == 1 && c.pings.load(Ordering::SeqCst) == 1
    });
    assert_eq!(a.pings.load(Ordering::SeqCst), 0);

    coordinator.stop();
}

#[test]
fn type_targeted_delivery_excludes_other_types_and_sender() {
    let coordinator = Coordinator::new();
    let m1 = probe("m1", "macrophage");
    let b1 = probe("b1", "b_cell");
    let b2 = probe("b2", "b_cell");
    coordinator.register_cell(m1.clone());
    coordinator.register_cell(b1.clone());
    coordinator.register_cell(b2.clone());

    coordinator.start();
    m1.core()
        .send_message("ping", Target::Type("b_cell".to_string()), Value::Null, 3);

    wait_for("type fan-out", || {
        b1.pings.load(Ordering::SeqCst) == 1 && b2.pings.load(Ordering::SeqCst) == 1
    });
    assert_eq!(m1.pings.load(Ordering::SeqCst), 0);

    // sender excluded within its own type too
    b1.core()
        .send_message("ping", Target::Type("b_cell".to_string()), Value::Null, 3);
    wait_for("intra-type fan-out", || b2.pings.load(Ordering::SeqCst) == 2);
    assert_eq!(b1.pings.load(Ordering::SeqCst), 1);

    coordinator.stop();
}

#[test]
fn unknown_target_is_dropped_but_still_counted() {
    let coordinator = Coordinator::new();
    let m1 = probe("m1", "macrophage");
    coordinator.register_cell(m1.clone());

    coordinator.start();
    wait_for("start broadcast processed", || {
        coordinator.messages_processed() >= 1
    });
    let baseline = coordinator.messages_processed();

    m1.core()
        .send_message("ping", Target::Cell("ghost".to_string()), Value::Null, 3);
    wait_for("ghost message processed", || {
        coordinator.messages_processed() == baseline + 1
    });
    assert_eq!(m1.pings.load(Ordering::SeqCst), 0);

    coordinator.stop();
}

#[test]
fn system_start_broadcast_is_delivered_to_all_cells() {
    let coordinator = Coordinator::new();
    let m1 = probe("m1", "macrophage");
    let b1 = probe("b1", "b_cell");
    coordinator.register_cell(m1.clone());
    coordinator.register_cell(b1.clone());

    coordinator.start();
    wait_for("system_start delivery", || {
        m1.starts.load(Ordering::SeqCst) == 1 && b1.starts.load(Ordering::SeqCst) == 1
    });
    coordinator.stop();
}

#[test]
fn double_start_leaves_a_single_dispatch_pipeline() {
    let coordinator = Coordinator::new();
    let a = probe("a", "macrophage");
    let b = probe("b", "macrophage");
    coordinator.register_cell(a.clone());
    coordinator.register_cell(b.clone());

    coordinator.start();
    coordinator.start();
    assert!(coordinator.is_active());

    a.core()
        .send_message("ping", Target::Broadcast, Value::Null, 3);
    wait_for("single delivery", || b.pings.load(Ordering::SeqCst) >= 1);
    // a second dispatcher or worker would double-deliver; give it a beat
    thread::sleep(Duration::from_millis(100));
    assert_eq!(b.pings.load(Ordering::SeqCst), 1);
    assert_eq!(b.starts.load(Ordering::SeqCst), 1);

    coordinator.stop();
    coordinator.stop();
    assert!(!coordinator.is_active());
}

#[test]
fn stop_broadcast_reaches_cells_before_workers_are_joined() {
    let coordinator = Coordinator::from_config(CoordinatorConfig {
        pop_timeout: Duration::from_millis(50),
        drain_timeout: Duration::from_secs(1),
        join_timeout: Duration::from_secs(5),
    });
    let a = probe("a", "macrophage");
    let b = probe("b", "b_cell");
    coordinator.register_cell(a.clone());
    coordinator.register_cell(b.clone());

    coordinator.start();
    wait_for("start broadcast processed", || {
        coordinator.messages_processed() >= 1
    });

    let begun = Instant::now();
    coordinator.stop();
    let elapsed = begun.elapsed();

    // the stop broadcast was delivered to every cell
    assert_eq!(a.stops.load(Ordering::SeqCst), 1);
    assert_eq!(b.stops.load(Ordering::SeqCst), 1);
    // the dispatcher confirmed the broadcast; stop() did not sit out
    // the full drain timeout
    assert!(
        elapsed < Duration::from_secs(1),
        "stop exhausted the drain timeout: {:?}",
        elapsed
    );
}

#[test]
fn shutdown_terminates_coordinator_and_cells() {
    let coordinator = Coordinator::new();
    let cells = [
        probe("a", "macrophage"),
        probe("b", "b_cell"),
        probe("c", "nk_cell"),
    ];
    for cell in &cells {
        coordinator.register_cell(cell.clone());
    }

    coordinator.start();
    wait_for("all cells active", || {
        cells.iter().all(|c| c.core().is_active())
    });

    coordinator.stop();
    assert!(!coordinator.is_active());
    for cell in &cells {
        assert!(!cell.core().is_active());
        assert_eq!(cell.core().status(), CellStatus::Stopped);
    }
}

#[test]
fn alert_cache_keeps_only_the_newest_alert() {
    let coordinator = Coordinator::new();
    let m1 = probe("m1", "macrophage");
    coordinator.register_cell(m1.clone());

    coordinator.start();
    wait_for("start broadcast processed", || {
        coordinator.messages_processed() >= 1
    });
    let baseline = coordinator.messages_processed();

    m1.core().send_message(
        "alert_x",
        Target::Broadcast,
        json!({"severity": 2}),
        5,
    );
    m1.core().send_message(
        "alert_y",
        Target::Broadcast,
        json!({"severity": 4}),
        5,
    );
    wait_for("both alerts processed", || {
        coordinator.messages_processed() == baseline + 2
    });

    let alert = coordinator.last_alert().expect("alert cached");
    assert_eq!(alert.kind, "alert_y");
    assert_eq!(alert.source, "m1");
    assert_eq!(alert.payload, json!({"severity": 4}));

    coordinator.stop();
}

#[test]
fn status_snapshot_has_the_documented_layout() {
    let coordinator = Coordinator::new();
    coordinator.register_cell(probe("m1", "macrophage"));
    coordinator.register_cell(probe("b1", "b_cell"));

    coordinator.start();
    wait_for("start broadcast processed", || {
        coordinator.messages_processed() >= 1
    });

    let status = serde_json::to_value(coordinator.status()).unwrap();
    assert!(status["core"].is_object());
    assert!(status["cells"].is_object());
    assert_eq!(status["core"]["active"], json!(true));
    assert!(status["core"]["uptime"].as_f64().unwrap() >= 0.0);
    assert_eq!(status["core"]["cells_count"], json!(2));
    assert!(status["core"]["messages_processed"].as_u64().unwrap() >= 1);
    assert_eq!(status["core"]["last_alert"], Value::Null);

    let m1 = &status["cells"]["m1"];
    assert_eq!(m1["name"], json!("m1"));
    assert_eq!(m1["type"], json!("macrophage"));
    assert_eq!(m1["status"], json!("active"));
    assert_eq!(m1["active"], json!(true));
    assert!(m1["stats"]["messages_received"].as_u64().unwrap() >= 1);
    assert!(m1["stats"]["last_activity"].is_string());
    assert!(m1["last_update"].is_string());

    coordinator.stop();
}

#[test]
fn save_status_creates_parent_directories() {
    let coordinator = Coordinator::new();
    coordinator.register_cell(probe("m1", "macrophage"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status").join("snapshot.json");
    assert!(coordinator.save_status(&path));

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["core"]["active"], json!(false));
    assert_eq!(parsed["core"]["cells_count"], json!(1));
    assert!(parsed["cells"]["m1"]["stats"]["actions_performed"].is_u64());
}

#[test]
fn save_status_reports_failure_as_boolean() {
    let coordinator = Coordinator::new();
    let dir = tempfile::tempdir().unwrap();
    // the target path is an existing directory, so the write must fail
    assert!(!coordinator.save_status(dir.path()));
}

#[test]
fn messages_sent_before_start_are_dispatched_after_start() {
    let coordinator = Coordinator::new();
    let a = probe("a", "macrophage");
    let b = probe("b", "macrophage");
    coordinator.register_cell(a.clone());
    coordinator.register_cell(b.clone());

    // sender is bound at registration; the bus holds this until start
    assert!(a
        .core()
        .send_message("ping", Target::Broadcast, Value::Null, 2));

    coordinator.start();
    wait_for("queued message delivered", || {
        b.pings.load(Ordering::SeqCst) == 1
    });
    coordinator.stop();
}
