//! End-to-end scenarios: queues driven by a live tick scheduler.

use std::sync::Arc;
use std::time::Duration;

use qc_18_message_queue::p2p::NetMessage;
use qc_18_message_queue::testing::RecordingConnection;
use qc_18_message_queue::{
    MessageCode, MessageQueue, MessageQueueConfig, MessageQueueError, PeerConnection, QueueKind,
    ReasonCode, TickScheduler, TransportError, WriteAck,
};
use tokio::runtime::Handle;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scheduler(period: Duration) -> Arc<TickScheduler> {
    Arc::new(TickScheduler::with_handle(Handle::current(), period))
}

fn ping(timestamp: u64) -> NetMessage {
    NetMessage::Ping { timestamp }
}

fn pong() -> NetMessage {
    NetMessage::Pong { timestamp: 0 }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..5_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn request_answer_cycle_with_live_ticks() {
    init_tracing();
    let config = MessageQueueConfig::for_testing().with_max_queue_size(2);
    let queue = MessageQueue::new(config, scheduler(Duration::from_millis(1)));
    let conn = Arc::new(RecordingConnection::<NetMessage>::new());
    queue.activate(conn.clone());

    assert_eq!(queue.send_message(ping(1)).unwrap(), QueueKind::Requests);
    tokio::time::sleep(Duration::from_millis(3)).await;
    assert_eq!(conn.written_codes(), vec![MessageCode::Ping]);

    assert_eq!(queue.send_message(ping(2)).unwrap(), QueueKind::Requests);
    tokio::time::sleep(Duration::from_millis(3)).await;
    // The second ping waits behind the unanswered first.
    assert_eq!(conn.written_codes(), vec![MessageCode::Ping]);

    let answered = queue.received_message(&pong()).unwrap();
    assert_eq!(answered.message().as_ref(), &ping(1));

    tokio::time::sleep(Duration::from_millis(3)).await;
    assert_eq!(
        conn.written().iter().map(|m| m.as_ref().clone()).collect::<Vec<_>>(),
        vec![ping(1), ping(2)]
    );
    assert_eq!(queue.stats().requests, 1);
    assert_eq!(queue.metrics().requests_reaped, 1);
}

#[tokio::test(start_paused = true)]
async fn saturated_peer_is_dropped_with_bad_peer() {
    init_tracing();
    let config = MessageQueueConfig::for_testing().with_max_queue_size(2);
    let queue = MessageQueue::new(config, scheduler(Duration::from_millis(1)));
    let conn = Arc::new(RecordingConnection::<NetMessage>::new());
    queue.activate(conn.clone());

    queue.send_message(ping(1)).unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    queue.send_message(ping(2)).unwrap();

    let err = queue.send_message(ping(3)).unwrap_err();
    assert!(matches!(err, MessageQueueError::QueueFull { max: 2, .. }));
    assert!(!queue.is_active());
    assert!(matches!(
        queue.send_message(ping(4)).unwrap_err(),
        MessageQueueError::Inactive
    ));

    wait_until(|| conn.is_closed()).await;
    assert_eq!(conn.close_count(), 1);
    assert_eq!(
        conn.written().last().map(|m| m.as_ref().clone()),
        Some(NetMessage::Disconnect {
            reason: ReasonCode::BadPeer
        })
    );

    // No tick fires after the disconnect.
    let written = conn.written().len();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(conn.written().len(), written);
}

#[tokio::test(start_paused = true)]
async fn many_connections_share_one_scheduler() {
    init_tracing();
    let shared = scheduler(Duration::from_millis(1));
    let peers: Vec<_> = (0..64)
        .map(|_| {
            let queue =
                MessageQueue::new(MessageQueueConfig::for_testing(), Arc::clone(&shared));
            let conn = Arc::new(RecordingConnection::<NetMessage>::new());
            queue.activate(conn.clone());
            (queue, conn)
        })
        .collect();

    for (queue, _) in &peers {
        queue
            .send_message(NetMessage::BftNewHeight { height: 1 })
            .unwrap();
        queue
            .send_message(NetMessage::Transaction { data: vec![1] })
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(5)).await;
    for (queue, conn) in &peers {
        assert_eq!(
            conn.written_codes(),
            vec![MessageCode::BftNewHeight, MessageCode::Transaction]
        );
        assert!(queue.is_idle());
    }
}

/// Connection whose writes blow up inside the tick.
struct PanickingConnection;

impl PeerConnection<NetMessage> for PanickingConnection {
    fn write(&self, _message: Arc<NetMessage>) -> Result<WriteAck, TransportError> {
        panic!("transport bug");
    }

    fn close(&self) {}
}

#[tokio::test(start_paused = true)]
async fn faulty_tick_does_not_stall_other_peers() {
    init_tracing();
    let shared = scheduler(Duration::from_millis(1));

    let broken = MessageQueue::new(MessageQueueConfig::for_testing(), Arc::clone(&shared));
    broken.activate(Arc::new(PanickingConnection));
    let healthy = MessageQueue::new(MessageQueueConfig::for_testing(), Arc::clone(&shared));
    let conn = Arc::new(RecordingConnection::<NetMessage>::new());
    healthy.activate(conn.clone());

    for n in 0..3 {
        broken
            .send_message(NetMessage::Transaction { data: vec![n] })
            .unwrap();
        healthy
            .send_message(NetMessage::Transaction { data: vec![n] })
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(conn.written().len(), 3);
    // The broken peer kept ticking and drained its queue one panic at a time.
    assert!(broken.is_idle());
    assert!(broken.is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_keep_per_producer_order() {
    init_tracing();
    let queue = MessageQueue::new(
        MessageQueueConfig::default(),
        scheduler(Duration::from_millis(1)),
    );
    let conn = Arc::new(RecordingConnection::<NetMessage>::new());
    queue.activate(conn.clone());

    let producers: Vec<_> = (0u8..4)
        .map(|producer| {
            let queue = queue.clone();
            tokio::spawn(async move {
                for seq in 0u8..25 {
                    queue
                        .send_message(NetMessage::Transaction {
                            data: vec![producer, seq],
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    wait_until(|| queue.is_idle() && conn.written().len() == 100).await;

    for producer in 0u8..4 {
        let seqs: Vec<u8> = conn
            .written()
            .iter()
            .filter_map(|m| match m.as_ref() {
                NetMessage::Transaction { data } if data[0] == producer => Some(data[1]),
                _ => None,
            })
            .collect();
        assert_eq!(seqs, (0u8..25).collect::<Vec<_>>());
    }
    queue.close();
}

#[test]
fn shared_scheduler_drives_queues_without_caller_runtime() {
    let queue = MessageQueue::new(
        MessageQueueConfig::for_testing(),
        TickScheduler::shared().unwrap(),
    );
    let conn = Arc::new(RecordingConnection::<NetMessage>::new());
    queue.activate(conn.clone());
    queue.send_message(ping(7)).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while conn.written().is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(conn.written_codes(), vec![MessageCode::Ping]);
    queue.close();
}
