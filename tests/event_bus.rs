//! Dispatch guarantees of the event manager and queue.

use cmsync::error::SyncError;
use cmsync::events::{
    priorities, AbstractFolderEvent, EventCategory, EventSink, FnHandler, Outcome,
    StartNextSyncEvent, SyncEvent, SyncEventManager, SyncEventQueue,
};
use cmsync::types::ObjectKind;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn start(full: bool) -> SyncEvent {
    SyncEvent::StartNextSync(StartNextSyncEvent::new(full))
}

fn object() -> SyncEvent {
    SyncEvent::Object(AbstractFolderEvent::new(ObjectKind::File))
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn highest_priority_handler_consumes_first() {
    let manager = Arc::new(SyncEventManager::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    for (name, priority, outcome) in [
        ("default", priorities::DEFAULT, Outcome::Consumed),
        ("crawler", priorities::CRAWLER, Outcome::Consumed),
        ("debug", priorities::DEBUG, Outcome::Passed),
    ] {
        let log = Arc::clone(&log);
        manager.add_event_handler(
            priority,
            Arc::new(FnHandler::new(name, move |_| {
                log.lock().push(name);
                Ok(outcome)
            })),
        );
    }

    let queue = SyncEventQueue::new(manager).unwrap();
    queue.add_event(start(false));
    queue.stop_listener();
    assert!(queue.wait_for_stopped(WAIT));
    assert_eq!(*log.lock(), vec!["debug", "crawler"]);
}

#[test]
fn broken_handler_does_not_stop_the_consumer() {
    let manager = Arc::new(SyncEventManager::new());
    let handled = Arc::new(AtomicUsize::new(0));
    manager.add_event_handler(
        priorities::FILTER,
        Arc::new(FnHandler::new("panics-on-full-sync", |event| match event {
            SyncEvent::StartNextSync(s) if s.full_sync_requested => panic!("unexpected full sync"),
            _ => Ok(Outcome::Passed),
        })),
    );
    manager.add_event_handler(
        priorities::CRAWLER,
        Arc::new(FnHandler::new("fails-on-objects", |event| match event {
            SyncEvent::Object(_) => Err(SyncError::RemoteError("unreachable".to_string())),
            _ => Ok(Outcome::Passed),
        })),
    );
    let counter = Arc::clone(&handled);
    manager.add_event_handler(
        priorities::DEFAULT,
        Arc::new(FnHandler::new("counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Consumed)
        })),
    );

    let queue = SyncEventQueue::new(manager).unwrap();
    queue.add_event(start(true));
    queue.add_event(object());
    queue.add_event(start(false));
    queue.stop_listener();
    assert!(queue.wait_for_stopped(WAIT));

    // Only the last event reached the counter; the first two were dropped.
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(queue.stats().failed, 2);
}

#[test]
fn suspend_holds_dispatch_until_resumed() {
    let manager = Arc::new(SyncEventManager::new());
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    manager.add_event_handler(
        0,
        Arc::new(FnHandler::new("counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Consumed)
        })),
    );
    let queue = SyncEventQueue::new(manager).unwrap();

    queue.suspend();
    assert!(queue.is_suspended());
    queue.add_event(object());
    queue.add_event(object());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert!(!queue.is_empty());

    queue.resume();
    assert!(wait_until(|| handled.load(Ordering::SeqCst) == 2));
    assert!(wait_until(|| queue.is_empty()));
}

#[test]
fn suspension_waits_for_the_event_in_flight() {
    let manager = Arc::new(SyncEventManager::new());
    let entered = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Mutex::new(()));
    let guard = release.lock();

    let (e, r) = (Arc::clone(&entered), Arc::clone(&release));
    manager.add_event_handler(
        0,
        Arc::new(FnHandler::new("slow", move |_| {
            e.fetch_add(1, Ordering::SeqCst);
            drop(r.lock());
            Ok(Outcome::Consumed)
        })),
    );
    let queue = SyncEventQueue::new(manager).unwrap();
    queue.add_event(object());
    queue.add_event(object());
    assert!(wait_until(|| entered.load(Ordering::SeqCst) == 1));

    queue.suspend();
    drop(guard);
    thread::sleep(Duration::from_millis(50));
    // The first event finished, the second waits for resume.
    assert_eq!(entered.load(Ordering::SeqCst), 1);

    queue.resume();
    assert!(wait_until(|| entered.load(Ordering::SeqCst) == 2));
}

#[test]
fn stop_drains_queue_then_drops_new_events() {
    let manager = Arc::new(SyncEventManager::new());
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    manager.add_event_handler(
        0,
        Arc::new(FnHandler::new("counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Consumed)
        })),
    );
    let queue = SyncEventQueue::new(manager).unwrap();
    for _ in 0..10 {
        queue.add_event(object());
    }
    queue.stop_listener();
    assert!(queue.wait_for_stopped(WAIT));
    assert!(queue.is_stopped());
    assert_eq!(handled.load(Ordering::SeqCst), 10);

    queue.add_event(object());
    queue.handle().add_event(object());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(handled.load(Ordering::SeqCst), 10);
    assert!(queue.is_empty());
}

#[test]
fn handlers_can_publish_follow_up_events() {
    let manager = Arc::new(SyncEventManager::new());
    let queue = SyncEventQueue::new(Arc::clone(&manager)).unwrap();
    let sink = queue.handle();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    manager.add_event_handler(
        0,
        Arc::new(FnHandler::new("fan-out", move |event| {
            match event {
                SyncEvent::StartNextSync(_) => {
                    log.lock().push("start");
                    sink.add_event(object());
                    sink.add_event(object());
                }
                SyncEvent::Object(_) => log.lock().push("object"),
                SyncEvent::FullSyncCompleted(_) => {}
            }
            Ok(Outcome::Consumed)
        })),
    );

    queue.add_event(start(false));
    assert!(wait_until(|| seen.lock().len() == 3));
    assert!(wait_until(|| queue.is_empty()));
    assert_eq!(*seen.lock(), vec!["start", "object", "object"]);
}

#[test]
fn counters_follow_categories() {
    let queue = SyncEventQueue::new(Arc::new(SyncEventManager::new())).unwrap();
    let detected = queue
        .watch_category(EventCategory::DetectedChange)
        .unwrap();
    let requested = queue
        .watch_category(EventCategory::SyncRequested)
        .unwrap();
    let total = queue.watch_total();

    queue.suspend();
    queue.add_event(object());
    queue.add_event(object());
    queue.add_event(start(false));
    assert_eq!(*detected.borrow(), 2);
    assert_eq!(*requested.borrow(), 1);
    assert_eq!(*total.borrow(), 3);

    queue.resume();
    assert!(wait_until(|| *total.borrow() == 0));
    assert_eq!(*detected.borrow(), 0);
    assert_eq!(*requested.borrow(), 0);
}
