use std::thread;

use super::{sample_ring, Sample, SampleConsumer, SampleProducer};
use crate::error::CaptureError;

/// Drains a consumer until the producer stopped, with reads of `block` samples.
fn drain<T: Sample>(consumer: &mut SampleConsumer<T>, block: usize) -> Vec<T> {
    let mut out = Vec::new();
    let mut buf = vec![T::default(); block];
    loop {
        let n = consumer.pull_samples(&mut buf);
        out.extend_from_slice(&buf[..n]);
        if n < block {
            break;
        }
    }
    out
}

fn produce_sequence(producer: &mut SampleProducer<f32>, total: usize, block: usize) {
    let mut next = 0usize;
    let mut chunk = Vec::with_capacity(block);
    while next < total {
        chunk.clear();
        let end = (next + block).min(total);
        chunk.extend((next..end).map(|v| v as f32));
        assert!(producer.push_samples(&chunk));
        next = end;
    }
    producer.stop();
}

fn run_fifo(capacity: usize, write_block: usize, read_block: usize, total: usize) {
    let (mut producer, mut consumer) = sample_ring::<f32>(capacity).unwrap();

    let received = thread::scope(|s| {
        s.spawn(move || produce_sequence(&mut producer, total, write_block));
        let reader = s.spawn(move || drain(&mut consumer, read_block));
        reader.join().unwrap()
    });

    assert_eq!(received.len(), total);
    for (i, value) in received.iter().enumerate() {
        assert_eq!(*value, i as f32, "mismatch at {}", i);
    }
}

#[test]
fn test_fifo_small_writes_large_reads() {
    run_fifo(1024, 250, 1000, 200_000);
}

#[test]
fn test_fifo_large_writes_small_reads() {
    run_fifo(1024, 1000, 250, 200_000);
}

#[test]
fn test_fifo_single_sample_blocks() {
    run_fifo(16, 1, 7, 20_000);
    run_fifo(16, 5, 1, 20_000);
}

#[test]
fn test_fifo_full_capacity_blocks() {
    run_fifo(1024, 1024, 1024, 100_000);
}

#[test]
fn test_fifo_block_larger_than_ring() {
    // producer blocks are split into ring-sized pieces
    run_fifo(64, 1000, 100, 50_000);
}

#[test]
fn test_fifo_i16() {
    let (mut producer, mut consumer) = sample_ring::<i16>(256).unwrap();
    let total = 30_000usize;

    let received = thread::scope(|s| {
        s.spawn(move || {
            let values: Vec<i16> = (0..total).map(|v| v as i16).collect();
            for block in values.chunks(333) {
                assert!(producer.push_samples(block));
            }
            producer.stop();
        });
        s.spawn(move || drain(&mut consumer, 128)).join().unwrap()
    });

    let expected: Vec<i16> = (0..total).map(|v| v as i16).collect();
    assert_eq!(received, expected);
}

#[test]
fn test_pull_returns_short_after_stop() {
    let (mut producer, mut consumer) = sample_ring::<i16>(1024).unwrap();
    let values: Vec<i16> = (0..100).collect();
    assert!(producer.push_samples(&values));
    producer.stop();

    let mut buf = [0i16; 256];
    let n = consumer.pull_samples(&mut buf);
    assert_eq!(n, 100);
    assert_eq!(&buf[..n], values.as_slice());

    // terminal: empty and stopped returns immediately
    assert_eq!(consumer.pull_samples(&mut buf), 0);
    assert!(consumer.is_finished());
}

#[test]
fn test_pull_exact_fill_before_stop() {
    let (mut producer, mut consumer) = sample_ring::<f32>(8).unwrap();
    assert!(producer.push_samples(&[1.0, 2.0, 3.0, 4.0]));

    let mut buf = [0f32; 4];
    assert_eq!(consumer.pull_samples(&mut buf), 4);
    assert_eq!(buf, [1.0, 2.0, 3.0, 4.0]);
    assert!(!consumer.is_finished());

    drop(producer);
    assert_eq!(consumer.pull_samples(&mut buf), 0);
    assert!(consumer.is_finished());
}

#[test]
fn test_empty_buffer_pull_is_noop() {
    let (_producer, mut consumer) = sample_ring::<f32>(8).unwrap();
    let mut buf: [f32; 0] = [];
    assert_eq!(consumer.pull_samples(&mut buf), 0);
}

#[test]
fn test_occupancy_tracks_head_and_tail() {
    let (mut producer, mut consumer) = sample_ring::<i16>(8).unwrap();
    assert_eq!(producer.occupied(), 0);
    assert!(producer.push_samples(&[1, 2, 3, 4, 5, 6]));
    assert_eq!(consumer.occupied(), 6);

    let mut buf = [0i16; 4];
    assert_eq!(consumer.pull_samples(&mut buf), 4);
    assert_eq!(producer.occupied(), 2);

    // wraps around the end of the backing array
    assert!(producer.push_samples(&[7, 8, 9, 10, 11, 12]));
    assert_eq!(producer.occupied(), 8);
    producer.stop();

    let mut rest = [0i16; 16];
    let n = consumer.pull_samples(&mut rest);
    assert_eq!(&rest[..n], &[5, 6, 7, 8, 9, 10, 11, 12]);
    assert_eq!(producer.written(), 12);
    assert_eq!(consumer.read(), 12);
}

#[test]
fn test_push_gives_up_when_consumer_dropped() {
    let (mut producer, consumer) = sample_ring::<i16>(4).unwrap();
    assert!(producer.push_samples(&[1, 2, 3, 4]));
    drop(consumer);

    // ring is full and nobody will ever read it
    assert!(!producer.push_samples(&[5, 6]));
    assert_eq!(producer.discarded(), 2);
}

#[test]
fn test_capacity_must_be_power_of_two() {
    assert!(matches!(
        sample_ring::<i16>(1000),
        Err(CaptureError::Config(_))
    ));
    assert!(matches!(sample_ring::<f32>(0), Err(CaptureError::Config(_))));
    let (producer, consumer) = sample_ring::<f32>(1 << 10).unwrap();
    assert_eq!(producer.capacity(), 1024);
    assert_eq!(consumer.capacity(), 1024);
}

#[test]
fn test_full_ring_frees_space_as_consumer_pulls() {
    let (mut producer, mut consumer) = sample_ring::<f32>(4).unwrap();
    assert!(producer.push_samples(&[1.0, 2.0, 3.0, 4.0]));
    assert_eq!(producer.occupied(), 4);

    let mut buf = [0f32; 2];
    assert_eq!(consumer.pull_samples(&mut buf), 2);
    assert_eq!(buf, [1.0, 2.0]);

    // exactly the freed slots are writable again
    assert!(producer.push_samples(&[5.0, 6.0]));
    assert_eq!(consumer.occupied(), 4);
    producer.stop();

    let mut rest = [0f32; 8];
    let n = consumer.pull_samples(&mut rest);
    assert_eq!(&rest[..n], &[3.0, 4.0, 5.0, 6.0]);
    assert!(consumer.is_finished());
}
