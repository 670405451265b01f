use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use inventory_sync::broadcast::{
    BroadcastContext, Broadcaster, ResultBroadcaster, ResultNotification,
};
use inventory_sync::types::{DataSourceId, SyncItem, SyncResult, SyncResultKind, SyncResultType};
use telemetry::tracing::init_test_tracing;
use tokio::task::JoinSet;

use crate::common::notify::TimedNotify;

mod common;

const PRODUCERS: u32 = 8;
const MESSAGES_PER_PRODUCER: u32 = 200;

type Received = Arc<Mutex<Vec<(u32, u32)>>>;

fn collect(broadcaster: &Broadcaster<(u32, u32)>) -> Received {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    // The registration is dropped but the listener stays registered.
    let _ = broadcaster.register(move |message, _| sink.lock().unwrap().push(*message));
    received
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_deliver_each_message_exactly_once() {
    init_test_tracing();

    let broadcaster = Broadcaster::new("concurrent");
    let listeners: Vec<Received> = (0..3).map(|_| collect(&broadcaster)).collect();

    let mut producers = JoinSet::new();
    for producer in 0..PRODUCERS {
        let broadcaster = broadcaster.clone();
        producers.spawn(async move {
            for sequence in 0..MESSAGES_PER_PRODUCER {
                broadcaster.broadcast((producer, sequence), BroadcastContext::default());
                if sequence % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        });
    }
    while let Some(result) = producers.join_next().await {
        result.unwrap();
    }
    broadcaster.flush().await;

    for received in &listeners {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), (PRODUCERS * MESSAGES_PER_PRODUCER) as usize);

        // Per producer, messages arrive once each and in the order they were sent.
        let mut by_producer: HashMap<u32, Vec<u32>> = HashMap::new();
        for (producer, sequence) in received.iter() {
            by_producer.entry(*producer).or_default().push(*sequence);
        }
        assert_eq!(by_producer.len(), PRODUCERS as usize);
        for sequences in by_producer.values() {
            assert_eq!(*sequences, (0..MESSAGES_PER_PRODUCER).collect::<Vec<_>>());
        }
    }

    // All listeners observe the same global order.
    let first = listeners[0].lock().unwrap().clone();
    for received in &listeners[1..] {
        assert_eq!(*received.lock().unwrap(), first);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn listeners_only_see_broadcasts_made_while_registered() {
    init_test_tracing();

    let broadcaster = Broadcaster::<(u32, u32)>::new("registration");
    broadcaster.broadcast((0, 0), BroadcastContext::default());

    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let registration =
        broadcaster.register(move |message, _| sink.lock().unwrap().push(*message));
    let other = collect(&broadcaster);

    broadcaster.broadcast((0, 1), BroadcastContext::default());
    broadcaster.flush().await;

    assert!(registration.unregister());
    broadcaster.broadcast((0, 2), BroadcastContext::default());
    broadcaster.flush().await;

    assert_eq!(*received.lock().unwrap(), vec![(0, 1)]);
    assert_eq!(*other.lock().unwrap(), vec![(0, 1), (0, 2)]);
    assert_eq!(broadcaster.listener_count(), 1);

    // Deregistering twice is harmless.
    assert!(!registration.unregister());
    assert_eq!(broadcaster.listener_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registration_churn_does_not_disturb_concurrent_broadcasts() {
    init_test_tracing();

    const ROUNDS: usize = 2000;

    let broadcaster = Broadcaster::<(u32, u32)>::new("churn");
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let _stable = broadcaster.register(move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let churn = {
        let broadcaster = broadcaster.clone();
        tokio::spawn(async move {
            for round in 0..ROUNDS {
                let registration = broadcaster.register(|_, _| {});
                assert!(registration.unregister());
                if round % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    let producer = {
        let broadcaster = broadcaster.clone();
        tokio::spawn(async move {
            for sequence in 0..ROUNDS as u32 {
                broadcaster.broadcast((0, sequence), BroadcastContext::default());
                if sequence % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    churn.await.unwrap();
    producer.await.unwrap();
    broadcaster.flush().await;

    assert_eq!(delivered.load(Ordering::Relaxed), ROUNDS);
    assert_eq!(broadcaster.listener_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn result_broadcaster_delivers_results_before_text() {
    init_test_tracing();

    let broadcaster = ResultBroadcaster::new("results");
    let received = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(tokio::sync::Notify::new());

    let sink = received.clone();
    let notify = done.clone();
    let _registration = broadcaster.register(move |notification, _| {
        sink.lock().unwrap().push(notification.clone());
        if matches!(notification, ResultNotification::Text(_)) {
            notify.notify_one();
        }
    });

    let results = Arc::new(vec![SyncResult::new(
        DataSourceId(1),
        Some("fw-1".to_string()),
        SyncResultKind::Create {
            item: SyncItem::new("fw-1", "Firewall"),
        },
        SyncResultType::Information,
        "Create Firewall 'fw-1'",
    )]);
    broadcaster.publish_results(results.clone(), BroadcastContext::default());
    broadcaster.publish_text("done", BroadcastContext::default());

    TimedNotify::new(done).notified().await;

    assert_eq!(
        *received.lock().unwrap(),
        vec![
            ResultNotification::Results(results),
            ResultNotification::Text("done".to_string()),
        ]
    );

    broadcaster.shutdown().await;
}
