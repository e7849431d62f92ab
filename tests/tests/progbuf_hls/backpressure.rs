//! Fragment ring backpressure.
//!
//! Key invariants:
//! - Every byte written is delivered exactly once, in write order, even
//!   when the producer blocks on a full ring
//! - Starting a fragment blocks only while the slot it needs is busy

use std::{thread, time::Duration};

use bytes::{Bytes, BytesMut};
use progbuf::{
    events::{Event, HlsEvent},
    hls::{HlsConfig, SEGMENT_SLOTS},
    pipeline::{Buffer, StreamEvent},
    storage::{CacheOptions, FileCacheFactory, MemoryCacheFactory},
};
use progbuf_test_utils::{RecordingSink, WAIT, pattern};
use rstest::rstest;

use crate::common::{HlsRig, byte_segment};

fn small_reads() -> CacheOptions {
    CacheOptions::default().with_min_read(1).with_max_read(512)
}

// Room for one underrun per chunk without lagging the probe.
fn memory() -> HlsConfig {
    HlsConfig::default()
        .with_event_channel_capacity(1024)
        .with_cache(MemoryCacheFactory::new(small_reads()))
}

fn file() -> HlsConfig {
    HlsConfig::default()
        .with_event_channel_capacity(1024)
        .with_cache(FileCacheFactory::new(small_reads()))
}

#[rstest]
#[case::memory(memory())]
#[case::file(file())]
#[timeout(Duration::from_secs(20))]
fn no_data_loss_when_producer_blocks(#[case] config: HlsConfig) {
    let mut rig = HlsRig::new(config, RecordingSink::gated());
    let sizes = [3000usize, 17, 4096, 1, 2500, 999, 8000, 64];

    let mut expected = BytesMut::new();
    let fragments: Vec<Bytes> = sizes
        .iter()
        .enumerate()
        .map(|(seed, len)| pattern(0, *len, seed as u8))
        .collect();
    for fragment in &fragments {
        expected.extend_from_slice(fragment);
    }

    thread::scope(|scope| {
        let element = &rig.element;
        let producer = scope.spawn(move || {
            for fragment in &fragments {
                assert!(element.sink_event(byte_segment(0, Some(fragment.len() as u64))));
                for chunk in fragment.chunks(700) {
                    element.chain(Buffer::new(chunk.to_vec())).unwrap();
                }
            }
            element.sink_event(StreamEvent::Eos);
        });

        assert!(
            rig.probe
                .wait_for(WAIT, |e| *e == Event::Hls(HlsEvent::CacheFull))
        );
        rig.sink.open();
        producer.join().unwrap();
    });

    assert!(rig.sink.wait_for_event(WAIT, |e| matches!(e, StreamEvent::Eos)));
    assert_eq!(rig.sink.bytes(), expected.freeze());

    let hls = rig.probe.hls();
    let resumes = hls.iter().filter(|e| **e == HlsEvent::Resume).count();
    let drained = hls.iter().filter(|e| **e == HlsEvent::CacheNotFull).count();
    assert_eq!(resumes, sizes.len());
    assert_eq!(drained, sizes.len());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn ring_fills_without_blocking_until_last_slot() {
    let mut rig = HlsRig::new(memory(), RecordingSink::gated());

    rig.element.sink_event(byte_segment(0, Some(2048)));
    rig.element
        .chain(Buffer::new(pattern(0, 2048, 0)))
        .unwrap();

    for _ in 1..SEGMENT_SLOTS {
        assert!(rig.element.sink_event(byte_segment(0, Some(10))));
    }
    assert!(
        !rig.probe
            .events()
            .contains(&Event::Hls(HlsEvent::CacheFull))
    );

    thread::scope(|scope| {
        let element = &rig.element;
        let next = scope.spawn(move || element.sink_event(byte_segment(0, Some(10))));
        assert!(
            rig.probe
                .wait_for(WAIT, |e| *e == Event::Hls(HlsEvent::CacheFull))
        );
        assert!(!next.is_finished());

        rig.sink.open();
        assert!(next.join().unwrap());
    });
    assert_eq!(rig.element.slot_indices().0, Some(0));
}
