use net_backend::{FrameQueueBackend, NetworkBackend};
use std::thread;

#[test]
fn frames_injected_from_another_thread_reach_the_backend() {
    let (mut backend, handle) = FrameQueueBackend::new();

    let producer = {
        let handle = handle.clone();
        thread::spawn(move || {
            for i in 0..64u8 {
                handle.inject(vec![i; 60]).unwrap();
            }
        })
    };
    producer.join().unwrap();

    let mut seen = Vec::new();
    while let Some(frame) = backend.poll_receive() {
        seen.push(frame[0]);
    }
    assert_eq!(seen, (0..64u8).collect::<Vec<_>>());
    assert_eq!(handle.pending_rx(), 0);

    let stats = backend.queue_stats().unwrap();
    assert_eq!(stats.rx_injected_frames, 64);
    assert_eq!(stats.rx_delivered_frames, 64);
}

#[test]
fn transmitted_frames_can_be_collected_from_another_thread() {
    let (mut backend, handle) = FrameQueueBackend::new();
    backend.transmit(vec![0xAA; 64]);
    backend.transmit(vec![0xBB; 64]);

    let collected = thread::spawn(move || handle.drain_transmitted())
        .join()
        .unwrap();
    assert_eq!(collected.len(), 2);
    assert_eq!(collected[0][0], 0xAA);
    assert_eq!(collected[1][0], 0xBB);
}
