//! Push mode: the delivery task and downstream seeks.
//!
//! Key invariants:
//! - Bytes reach downstream in write order, stamped with their stream offset
//! - A seek inside `[start, last_stop]` never reaches the network source
//! - Segment and EOS events follow the data that precedes them

use std::time::Duration;

use bytes::BytesMut;
use progbuf::{
    pipeline::{Buffer, FlowError, SeekEvent, SegmentEvent, StreamEvent},
    progressive::{DeliveryMode, ProgressiveConfig},
    storage::{CacheOptions, FileCacheFactory},
};
use progbuf_test_utils::{RecordingSink, WAIT, pattern, wait_until};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{ProgressiveRig, byte_segment};

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn push_round_trip_in_order() {
    let rig = ProgressiveRig::new(ProgressiveConfig::default());
    rig.element.activate_push().unwrap();
    rig.element.sink_event(byte_segment(0, Some(200_000)));

    let data = pattern(0, 200_000, 5);
    for chunk in data.chunks(1777) {
        rig.element.chain(Buffer::new(chunk.to_vec())).unwrap();
    }
    rig.element.sink_event(StreamEvent::Eos);

    assert!(rig.sink.wait_for_event(WAIT, |e| matches!(e, StreamEvent::Eos)));
    assert_eq!(rig.sink.bytes(), data);

    let buffers = rig.sink.buffers();
    assert!(
        buffers
            .windows(2)
            .all(|w| w[0].end_offset() == w[1].offset)
    );

    // The segment goes out before any data, EOS after all of it.
    let events = rig.sink.events();
    assert!(matches!(events.first(), Some(StreamEvent::NewSegment(_))));
    assert!(matches!(events.last(), Some(StreamEvent::Eos)));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn file_cache_push_round_trip() {
    let dir = TempDir::new().unwrap();
    let rig = ProgressiveRig::new(
        ProgressiveConfig::default()
            .with_cache(FileCacheFactory::new(CacheOptions::default()).with_dir(dir.path())),
    );
    rig.element.activate_push().unwrap();
    rig.element.sink_event(byte_segment(0, None));

    let data = pattern(0, 50_000, 1);
    for chunk in data.chunks(4096) {
        rig.element.chain(Buffer::new(chunk.to_vec())).unwrap();
    }
    rig.element.sink_event(StreamEvent::Eos);

    assert!(rig.sink.wait_for_event(WAIT, |e| matches!(e, StreamEvent::Eos)));
    assert_eq!(rig.sink.bytes(), data);
}

#[rstest]
#[case::start(0)]
#[case::middle(20_000)]
#[case::last_stop(40_000)]
#[timeout(Duration::from_secs(10))]
fn seek_within_cache_is_local(#[case] target: u64) {
    let rig = ProgressiveRig::new(ProgressiveConfig::default());
    rig.element.activate_push().unwrap();
    rig.element.sink_event(byte_segment(0, Some(100_000)));
    rig.element.chain(Buffer::new(pattern(0, 40_000, 0))).unwrap();
    assert!(rig.sink.wait_for_bytes(40_000, WAIT));

    assert!(
        rig.element
            .src_event(StreamEvent::Seek(SeekEvent::bytes(target)))
    );
    assert!(rig.source.seeks().is_empty());
    assert!(rig.sink.wait_for_event(WAIT, |e| matches!(
        e,
        StreamEvent::NewSegment(SegmentEvent { start, .. }) if *start == target
    )));

    // Delivery resumes from the target once more data is cached.
    rig.element
        .chain(Buffer::new(pattern(40_000, 60_000, 0)))
        .unwrap();
    assert!(wait_until(WAIT, || {
        rig.sink
            .buffers()
            .iter()
            .any(|b| b.offset == Some(target))
    }));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn seek_after_eos_replays_and_ends_again() {
    let rig = ProgressiveRig::new(ProgressiveConfig::default());
    rig.element.activate_push().unwrap();
    rig.element.sink_event(byte_segment(0, Some(8000)));
    rig.element.chain(Buffer::new(pattern(0, 8000, 0))).unwrap();
    rig.element.sink_event(StreamEvent::Eos);
    assert!(rig.sink.wait_for_event(WAIT, |e| matches!(e, StreamEvent::Eos)));

    assert!(
        rig.element
            .src_event(StreamEvent::Seek(SeekEvent::bytes(4000)))
    );
    assert!(rig.source.seeks().is_empty());
    assert!(wait_until(WAIT, || {
        rig.sink
            .events()
            .iter()
            .filter(|e| matches!(e, StreamEvent::Eos))
            .count()
            == 2
    }));

    let mut replay = BytesMut::new();
    for buffer in rig.sink.buffers() {
        if buffer.offset.is_some_and(|offset| offset >= 4000) {
            replay.extend_from_slice(&buffer.data);
        }
    }
    assert_eq!(replay.freeze(), pattern(4000, 4000, 0));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn seek_beyond_cache_goes_upstream() {
    let rig = ProgressiveRig::new(ProgressiveConfig::default().with_wait_tolerance(0.0));
    rig.element.activate_push().unwrap();
    rig.element.sink_event(byte_segment(0, Some(1_000_000)));
    rig.element.chain(Buffer::new(pattern(0, 10_000, 0))).unwrap();

    assert!(
        rig.element
            .src_event(StreamEvent::Seek(SeekEvent::bytes(500_000)))
    );
    assert_eq!(rig.source.seeks(), vec![500_000]);

    // Source answers with a segment update at the target.
    rig.element.sink_event(StreamEvent::NewSegment(
        SegmentEvent::bytes(500_000, Some(1_000_000)),
    ));
    rig.element
        .chain(Buffer::new(pattern(500_000, 10_000, 0)))
        .unwrap();
    assert!(wait_until(WAIT, || {
        rig.sink
            .buffers()
            .iter()
            .any(|b| b.offset == Some(500_000) && b.data == pattern(500_000, 10_000, 0))
    }));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn segment_update_repositions_cache() {
    let rig = ProgressiveRig::new(ProgressiveConfig::default());
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(100_000)));
    rig.element.chain(Buffer::new(pattern(0, 10_000, 0))).unwrap();

    rig.element.sink_event(StreamEvent::NewSegment(
        SegmentEvent::bytes(6000, Some(100_000)).with_update(true),
    ));
    let segment = rig.element.segment().unwrap();
    assert_eq!((segment.start, segment.last_stop), (0, 6000));

    rig.element.chain(Buffer::new(pattern(6000, 100, 0))).unwrap();
    assert_eq!(rig.element.segment().unwrap().last_stop, 6100);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[test]
fn skip_mode_drops_data_until_segment_accepted() {
    let sink = RecordingSink::new();
    sink.set_push_result(Err(FlowError::NotLinked));
    let rig = ProgressiveRig::with_sink(ProgressiveConfig::default(), sink);
    rig.element.activate_push().unwrap();
    rig.element.sink_event(byte_segment(0, Some(100_000)));
    rig.element.chain(Buffer::new(pattern(0, 8000, 0))).unwrap();
    assert!(wait_until(WAIT, || rig.element.delivery_mode() == DeliveryMode::Skip));

    // Downstream relinks; a fresh segment ends skip mode.
    rig.sink.set_push_result(Ok(()));
    rig.element.sink_event(byte_segment(0, Some(100_000)));
    assert!(wait_until(WAIT, || rig.element.delivery_mode() == DeliveryMode::Normal));
    rig.element.chain(Buffer::new(pattern(0, 8000, 0))).unwrap();
    assert!(rig.sink.wait_for_bytes(8000, WAIT));
}
