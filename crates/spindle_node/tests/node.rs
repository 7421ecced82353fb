//! End-to-end tests over real sockets.

use spindle_codec::Event;
use spindle_core::Config;
use spindle_node::{Node, NodeConfig, Producer, ShutdownHandle};
use spindle_testkit::prelude::*;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const PATIENCE: Duration = Duration::from_secs(10);

struct Running {
    addr: SocketAddr,
    node_dir: TempDir,
    sequencer: std::sync::Arc<spindle_core::Sequencer>,
    shutdown: ShutdownHandle,
    task: JoinHandle<spindle_node::NodeResult<()>>,
}

impl Running {
    async fn start(configure: impl FnOnce(NodeConfig) -> NodeConfig) -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap(), configure).await
    }

    async fn start_on(addr: SocketAddr, configure: impl FnOnce(NodeConfig) -> NodeConfig) -> Self {
        let node_dir = TempDir::new().unwrap();
        let config = configure(
            NodeConfig::new(addr, node_dir.path())
                .with_reconnect_interval(Duration::from_millis(20))
                .with_liveness_interval(Duration::from_millis(50))
                .with_core(Config::new().sync_on_append(false)),
        );
        let node: Node = Node::bind(config).await.unwrap();
        Self {
            addr: node.local_addr().unwrap(),
            sequencer: node.sequencer(),
            shutdown: node.shutdown_handle(),
            task: tokio::spawn(node.run()),
            node_dir,
        }
    }

    fn segment(&self, tag: u64) -> Vec<u8> {
        let path = self.node_dir.path().join(format!("{tag:016x}.seg"));
        std::fs::read(path).unwrap_or_default()
    }

    async fn stop(self) {
        self.shutdown.shutdown();
        tokio::time::timeout(PATIENCE, self.task)
            .await
            .expect("node did not stop")
            .unwrap()
            .unwrap();
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + PATIENCE;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn events_on(tag: u64, count: usize) -> Vec<Event> {
    (0..count)
        .map(|i| Event::new(i as i32, tag, format!("{tag}:{i}").into_bytes()).unwrap())
        .collect()
}

async fn produce(addr: SocketAddr, events: &[Event]) {
    let mut producer = Producer::connect(addr).await.unwrap();
    for event in events {
        producer.send(event).await.unwrap();
    }
    assert_eq!(producer.finish().await.unwrap(), events.len() as u64);
}

fn frames(events: &[Event]) -> Vec<u8> {
    events.iter().flat_map(|e| e.encode().to_vec()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn node_stores_producer_events() {
    let node = Running::start(|c| c).await;
    let mut events = vec![slack_event()];
    events.extend(events_on(SLACK_TAG, 9));

    produce(node.addr, &events).await;
    assert!(eventually(|| node.sequencer.cursor() == 9).await);
    assert_eq!(node.segment(SLACK_TAG), frames(&events));

    node.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn split_writes_are_reassembled() {
    let node = Running::start(|c| c).await;
    let stream = frames(&[slack_event(), slack_event()]);

    let mut producer = Producer::connect(node.addr).await.unwrap();
    for piece in stream.chunks(7) {
        producer.send_raw(piece).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    producer.finish().await.unwrap();

    assert!(eventually(|| node.sequencer.cursor() == 1).await);
    assert_eq!(node.segment(SLACK_TAG), stream);
    node.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn raw_replica_receives_the_exact_frames() {
    let replica = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let replica_addr = replica.local_addr().unwrap();
    let node = Running::start(|c| c.with_replica(replica_addr)).await;

    let events = events_on(5, 12);
    let expected = frames(&events);
    let reader = tokio::spawn(async move {
        let (mut conn, _) = replica.accept().await.unwrap();
        let mut received = vec![0u8; expected.len()];
        conn.read_exact(&mut received).await.unwrap();
        (received, expected)
    });

    produce(node.addr, &events).await;
    let (received, expected) = tokio::time::timeout(PATIENCE, reader)
        .await
        .expect("replica starved")
        .unwrap();
    assert_eq!(received, expected);

    node.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn node_replicates_into_another_node() {
    let follower = Running::start(|c| c).await;
    let leader = Running::start(|c| c.with_replica(follower.addr)).await;

    let a = events_on(1, 8);
    let b = events_on(2, 5);
    tokio::join!(produce(leader.addr, &a), produce(leader.addr, &b));

    assert!(eventually(|| follower.sequencer.cursor() == 12).await);
    for tag in [1, 2] {
        assert!(!leader.segment(tag).is_empty());
        assert_eq!(leader.segment(tag), follower.segment(tag));
    }
    assert_eq!(follower.segment(1), frames(&a));
    assert_eq!(follower.segment(2), frames(&b));

    leader.stop().await;
    follower.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn late_replica_catches_up() {
    let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let follower_addr = reserved.local_addr().unwrap();
    drop(reserved);

    let leader = Running::start(|c| c.with_replica(follower_addr)).await;
    let events = events_on(9, 6);
    produce(leader.addr, &events).await;
    assert!(eventually(|| leader.sequencer.cursor() == 5).await);

    let follower = Running::start_on(follower_addr, |c| c).await;
    assert!(eventually(|| follower.sequencer.cursor() == 5).await);
    assert_eq!(follower.segment(9), frames(&events));

    leader.stop().await;
    follower.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_closes_open_connections() {
    let node = Running::start(|c| c).await;
    let mut producer = Producer::connect(node.addr).await.unwrap();
    producer
        .send_raw(&slack_event().encode()[..10])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    node.stop().await;
    drop(producer);
}

#[tokio::test]
async fn synced_appends_on_a_single_threaded_runtime() {
    let node = Running::start(|c| c.with_core(Config::new().sync_on_append(true))).await;
    let a = events_on(11, 20);
    let b = events_on(12, 20);

    // Both producers share the only async thread with the node.
    tokio::join!(produce(node.addr, &a), produce(node.addr, &b));

    assert!(eventually(|| node.sequencer.cursor() == 39).await);
    assert_eq!(node.segment(11), frames(&a));
    assert_eq!(node.segment(12), frames(&b));
    node.stop().await;
}
