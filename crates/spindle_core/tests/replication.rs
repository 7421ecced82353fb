//! Integration tests for ingestion-to-replication hand-off.

use parking_lot::Mutex;
use spindle_codec::Event;
use spindle_core::{
    Config, CoreError, Executor, ReadHandler, Replicator, ReplicatorState, Task, ThreadExecutor,
    WriteHandler, INITIAL_CURSOR,
};
use spindle_testkit::prelude::*;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const PATIENCE: Duration = Duration::from_secs(10);

/// Spawns a thread per task and keeps the handles.
#[derive(Default)]
struct TrackedExecutor {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TrackedExecutor {
    fn all_finished(&self) -> bool {
        self.handles.lock().iter().all(JoinHandle::is_finished)
    }
}

impl Executor for TrackedExecutor {
    fn execute(&self, task: Task) {
        self.handles.lock().push(std::thread::spawn(task));
    }
}

fn ingest(pipeline: &Pipeline, events: &[Event]) {
    let mut spinner = pipeline.spinner();
    let selector = RecordingSelector::default();
    let stream: Vec<u8> = events.iter().flat_map(|e| e.encode().to_vec()).collect();
    let mut channel = ScriptedReader::chunked(&stream, &[13, 29, 5, 64]);
    while !channel.is_drained() {
        spinner.on_readable(&mut channel, &selector);
    }
}

/// Services write readiness until `count` events are out.
fn pump(replicator: &Replicator, writer: &mut ThrottledWriter, count: u64) {
    while replicator.sent() < count {
        assert!(
            wait_until(PATIENCE, || replicator.state() != ReplicatorState::Waiting
                || replicator.sent() >= count),
            "replicator stalled after {} events",
            replicator.sent()
        );
        writer.grant(11);
        replicator.on_writable(writer);
    }
}

fn numbered_events(n: u64) -> Vec<Event> {
    (0..n)
        .map(|i| Event::new(i as i32, 42_u64, format!("event number {i}").into_bytes()).unwrap())
        .collect()
}

#[test]
fn replica_receives_events_in_write_order() {
    let pipeline = Pipeline::with_config(Config::new().transfer_chunk(16));
    let replicator = pipeline.replicator("replica-a", Arc::new(ThreadExecutor::new("repl")));
    let selector = Arc::new(RecordingSelector::default());
    replicator.on_connect(selector.clone());
    replicator.start();

    let events = numbered_events(20);
    ingest(&pipeline, &events);

    let mut writer = ThrottledWriter::default();
    pump(&replicator, &mut writer, events.len() as u64);

    let expected: Vec<u8> = events.iter().flat_map(|e| e.encode().to_vec()).collect();
    assert_eq!(writer.written(), expected.as_slice());
    assert_eq!(replicator.last_replicated(), 19);

    let mut rest = writer.written();
    for event in &events {
        let received = Event::<u64>::decode(rest).unwrap();
        assert!(received.validate());
        assert_eq!(&received, event);
        rest = &rest[event.encode().len()..];
    }
    assert!(selector.writes() >= events.len());
    replicator.halt();
}

#[test]
fn halt_wakes_a_blocked_replicator() {
    let pipeline = Pipeline::new();
    let executor = Arc::new(TrackedExecutor::default());
    let replicator = pipeline.replicator("replica-b", executor.clone());
    let selector = Arc::new(RecordingSelector::default());
    replicator.on_connect(selector.clone());

    replicator.start();
    std::thread::sleep(Duration::from_millis(20));
    assert!(!executor.all_finished());

    replicator.halt();
    assert!(wait_until(PATIENCE, || executor.all_finished()));
    assert!(!replicator.is_running());

    // Published after the halt: must never reach the wire.
    ingest(&pipeline, &[slack_event()]);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(replicator.state(), ReplicatorState::Waiting);
    assert_eq!(selector.writes(), 0);

    let mut writer = ThrottledWriter::default();
    replicator.on_writable(&mut writer);
    assert!(writer.written().is_empty());
    assert_eq!(replicator.sent(), 0);
}

#[test]
fn replica_past_the_ring_gets_lag_exceeded() {
    let pipeline = Pipeline::with_config(Config::new().ring_capacity(4).sync_on_append(false));
    ingest(&pipeline, &numbered_events(5));

    let barrier = pipeline.sequencer.new_barrier();
    assert!(matches!(
        barrier.get(0),
        Err(CoreError::LagExceeded {
            requested: 0,
            overwritten_by: 4,
            capacity: 4
        })
    ));

    let executor = Arc::new(QueuedExecutor::default());
    let replicator = pipeline.replicator("replica-c", executor.clone());
    let selector = Arc::new(RecordingSelector::default());
    replicator.on_connect(selector.clone());
    replicator.start();
    assert!(executor.run_one());

    assert!(!replicator.is_running());
    assert_eq!(replicator.state(), ReplicatorState::Waiting);
    assert_eq!(selector.writes(), 0);
    assert_eq!(replicator.last_replicated(), INITIAL_CURSOR);
}

#[test]
fn replicas_progress_independently() {
    let pipeline = Pipeline::new();
    let executor = Arc::new(QueuedExecutor::default());
    let fast = pipeline.replicator("fast", executor.clone());
    let slow = pipeline.replicator("slow", executor.clone());
    fast.on_connect(Arc::new(RecordingSelector::default()));
    slow.on_connect(Arc::new(RecordingSelector::default()));

    let events = numbered_events(3);
    ingest(&pipeline, &events);
    fast.start();
    slow.start();

    let mut fast_out = ThrottledWriter::default();
    let mut slow_out = ThrottledWriter::default();
    // Each record takes two write callbacks: header, then payload.
    while fast.sent() < 3 {
        while executor.run_one() {}
        fast.on_writable(&mut fast_out);
        fast.on_writable(&mut fast_out);
    }
    slow.halt();
    fast.halt();
    while executor.run_one() {}

    assert_eq!(fast.last_replicated(), 2);
    // The halt dropped the record slow had armed but never sent.
    assert_eq!(slow.state(), ReplicatorState::Waiting);
    assert_eq!(slow.last_replicated(), INITIAL_CURSOR);
    slow.on_writable(&mut slow_out);
    assert!(slow_out.written().is_empty());
    assert_eq!(slow.sent(), 0);
}

#[test]
fn resumed_replica_sends_only_newer_events() {
    let pipeline = Pipeline::new();
    let events = numbered_events(4);
    ingest(&pipeline, &events);

    let executor = Arc::new(QueuedExecutor::default());
    let replicator = pipeline
        .replicator("resumed", executor.clone())
        .starting_after(1);
    replicator.on_connect(Arc::new(RecordingSelector::default()));
    replicator.start();

    let mut writer = ThrottledWriter::default();
    while replicator.sent() < 2 {
        assert!(executor.run_one());
        replicator.on_writable(&mut writer);
        replicator.on_writable(&mut writer);
    }

    let expected: Vec<u8> = events[2..]
        .iter()
        .flat_map(|e| e.encode().to_vec())
        .collect();
    assert_eq!(writer.written(), expected.as_slice());
    assert_eq!(replicator.last_replicated(), 3);
}

#[test]
fn closing_the_replica_connection_halts() {
    let pipeline = Pipeline::new();
    let executor = Arc::new(QueuedExecutor::default());
    let replicator = pipeline.replicator("closing", executor.clone());
    replicator.start();
    replicator.on_closing();
    assert!(!replicator.is_running());

    ingest(&pipeline, &[slack_event()]);
    assert!(executor.run_one());
    assert_eq!(replicator.state(), ReplicatorState::Waiting);
}
