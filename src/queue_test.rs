use std::sync::Arc;
use std::thread;

use futures::StreamExt;

use super::{unit_queue, KeyUnit, Pull, PushOutcome};
use crate::error::CaptureError;
use crate::media::VideoFrame;

fn frame(pts: i64, is_key: bool) -> VideoFrame {
    VideoFrame::new(vec![0u8; 4], 2, 2, Some(pts), is_key)
}

#[test]
fn test_overflow_keeps_first_capacity_units() {
    let (mut tx, mut rx) = unit_queue::<u32>("test", 4).unwrap();

    let outcomes: Vec<_> = (0..7).map(|i| tx.push(i)).collect();
    assert_eq!(&outcomes[..4], &[PushOutcome::Queued; 4]);
    assert_eq!(&outcomes[4..], &[PushOutcome::Dropped; 3]);

    let stats = tx.stats();
    assert_eq!(stats.pushed(), 4);
    assert_eq!(stats.dropped(), 3);

    tx.mark_eof();
    let mut got = Vec::new();
    while let Pull::Unit(v) = rx.pull_nonblocking() {
        got.push(v);
    }
    assert_eq!(got, vec![0, 1, 2, 3]);
}

#[test]
fn test_try_again_is_not_eof() {
    let (mut tx, mut rx) = unit_queue::<u32>("test", 2).unwrap();
    assert_eq!(rx.pull_nonblocking(), Pull::TryAgain);
    assert_eq!(tx.push(1), PushOutcome::Queued);
    assert_eq!(rx.pull_nonblocking(), Pull::Unit(1));
    assert_eq!(rx.pull_nonblocking(), Pull::TryAgain);
}

#[test]
fn test_eof_is_terminal_after_drain() {
    let (mut tx, mut rx) = unit_queue::<u32>("test", 8).unwrap();
    tx.push(10);
    tx.push(11);
    tx.mark_eof();
    assert!(tx.is_eof());

    assert_eq!(rx.pull_nonblocking(), Pull::Unit(10));
    assert_eq!(rx.pull_nonblocking(), Pull::Unit(11));
    for _ in 0..5 {
        assert_eq!(rx.pull_nonblocking(), Pull::Eof);
    }

    // pushes after eof are refused
    assert_eq!(tx.push(12), PushOutcome::Closed);
    assert_eq!(rx.pull_nonblocking(), Pull::Eof);
}

#[test]
fn test_dropping_sender_marks_eof() {
    let (tx, mut rx) = unit_queue::<u32>("test", 8).unwrap();
    drop(tx);
    assert!(rx.pull_nonblocking().is_eof());
    assert_eq!(rx.pull_blocking(), None);
}

#[test]
fn test_push_after_consumer_dropped_is_closed() {
    let (mut tx, rx) = unit_queue::<u32>("test", 8).unwrap();
    drop(rx);
    assert_eq!(tx.push(1), PushOutcome::Closed);
    assert_eq!(tx.stats().dropped(), 0);
}

#[test]
fn test_key_unit_filtering() {
    let (mut tx, mut rx) = unit_queue::<VideoFrame>("video", 16).unwrap();
    let flags = [false, false, true, false, false, true, false];
    for (i, key) in flags.iter().enumerate() {
        assert_eq!(tx.push(frame(i as i64, *key)), PushOutcome::Queued);
    }
    tx.mark_eof();

    let first = rx.pull_key_unit().unwrap();
    assert_eq!(first.pts, Some(2));
    let second = rx.pull_key_unit().unwrap();
    assert_eq!(second.pts, Some(5));
    assert!(rx.pull_key_unit().is_none());
    assert_eq!(rx.skipped(), 5);
}

#[test]
fn test_unread_units_released_on_teardown() {
    let marker = Arc::new(());
    let (mut tx, rx) = unit_queue::<Arc<()>>("test", 4).unwrap();
    for _ in 0..6 {
        tx.push(Arc::clone(&marker));
    }
    // 4 buffered, 2 released by the overrun path
    assert_eq!(Arc::strong_count(&marker), 5);
    drop(rx);
    drop(tx);
    assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
fn test_threaded_order_preserved() {
    let (mut tx, mut rx) = unit_queue::<u64>("test", 64).unwrap();
    let total = 10_000u64;

    let (received, dropped) = thread::scope(|s| {
        let producer = s.spawn(move || {
            let mut dropped = 0;
            for i in 0..total {
                if tx.push(i) == PushOutcome::Dropped {
                    dropped += 1;
                }
            }
            tx.mark_eof();
            dropped
        });
        let consumer = s.spawn(move || {
            let mut got = Vec::new();
            while let Some(v) = rx.pull_blocking() {
                got.push(v);
            }
            got
        });
        (consumer.join().unwrap(), producer.join().unwrap())
    });

    assert_eq!(received.len() as u64 + dropped, total);
    assert!(received.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_blocking_pull_waits_for_late_units() {
    let (mut tx, mut rx) = unit_queue::<u32>("test", 4).unwrap();

    let received = thread::scope(|s| {
        let consumer = s.spawn(move || {
            let first = rx.pull_blocking();
            let second = rx.pull_blocking();
            (first, second)
        });
        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(tx.push(7), PushOutcome::Queued);
        thread::sleep(std::time::Duration::from_millis(50));
        tx.mark_eof();
        consumer.join().unwrap()
    });

    assert_eq!(received, (Some(7), None));
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(matches!(
        unit_queue::<u32>("test", 0),
        Err(CaptureError::Config(_))
    ));
}

#[test]
fn test_frame_key_flag() {
    assert!(frame(0, true).is_key_unit());
    assert!(!frame(0, false).is_key_unit());
}

#[tokio::test]
async fn test_async_recv_until_eof() {
    let (mut tx, mut rx) = unit_queue::<u32>("test", 4).unwrap();
    let handle = tokio::spawn(async move {
        let mut got = Vec::new();
        while let Some(v) = rx.recv().await {
            got.push(v);
        }
        got
    });
    for i in 0..3 {
        tx.push(i);
    }
    tx.mark_eof();
    assert_eq!(handle.await.unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_key_stream() {
    let (mut tx, rx) = unit_queue::<VideoFrame>("video", 16).unwrap();
    for (i, key) in [true, false, false, true].iter().enumerate() {
        tx.push(frame(i as i64, *key));
    }
    tx.mark_eof();

    let pts: Vec<_> = rx.into_key_stream().map(|f| f.pts).collect().await;
    assert_eq!(pts, vec![Some(0), Some(3)]);
}
