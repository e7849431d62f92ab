//! Buffering-progress messages.
//!
//! Key invariants:
//! - Positions are non-decreasing and never exceed the segment stop
//! - EOS clamps an unreached stop before the final message

use progbuf::{
    events::{BufferEvent, Event},
    pipeline::{Buffer, FlowError, StreamEvent},
    progressive::ProgressiveConfig,
    storage::{CacheOptions, FileCacheFactory, MemoryCacheFactory},
};
use progbuf_test_utils::pattern;
use rstest::rstest;

use crate::common::{ProgressiveRig, byte_segment};

fn memory() -> ProgressiveConfig {
    ProgressiveConfig::default()
}

fn file() -> ProgressiveConfig {
    ProgressiveConfig::default().with_cache(FileCacheFactory::new(CacheOptions::default()))
}

#[rstest]
#[case::memory(memory())]
#[case::file(file())]
fn ten_writes_then_eos_report_complete_segment(#[case] config: ProgressiveConfig) {
    let mut rig = ProgressiveRig::new(config);
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(10_000)));

    for i in 0..10u64 {
        rig.element
            .chain(Buffer::new(pattern(i * 1000, 1000, 3)))
            .unwrap();
    }
    rig.element.sink_event(StreamEvent::Eos);

    let progress = rig.probe.progress();
    assert_eq!(progress.last(), Some(&(0, 10_000, Some(10_000), true)));
}

#[rstest]
#[case(0.0)]
#[case(1.0)]
#[case(25.0)]
fn progress_positions_monotonic_and_bounded(#[case] threshold: f64) {
    let mut rig = ProgressiveRig::new(ProgressiveConfig::default().with_threshold(threshold));
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(50_000)));

    let mut offset = 0u64;
    for len in [1, 7, 333, 4096, 10_000, 1, 5000, 30_562] {
        rig.element
            .chain(Buffer::new(pattern(offset, len, 0)))
            .unwrap();
        offset += len as u64;
    }
    assert_eq!(offset, 50_000);

    let progress = rig.probe.progress();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(progress.iter().all(|(_, position, stop, _)| Some(*position) <= *stop));
    assert_eq!(progress.last().map(|p| p.1), Some(50_000));
}

#[test]
fn eos_before_stop_clamps_final_message() {
    let mut rig = ProgressiveRig::new(ProgressiveConfig::default());
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(10_000)));
    rig.element.chain(Buffer::new(pattern(0, 4000, 0))).unwrap();
    rig.element.sink_event(StreamEvent::Eos);

    let progress = rig.probe.progress();
    assert_eq!(progress.last(), Some(&(0, 4000, Some(4000), true)));
    assert!(progress.iter().all(|(_, position, stop, _)| Some(*position) <= *stop));
    assert_eq!(rig.element.segment().and_then(|s| s.stop), Some(4000));
}

#[test]
fn cache_exhaustion_stops_chain() {
    let mut rig = ProgressiveRig::new(ProgressiveConfig::default().with_cache(
        MemoryCacheFactory::new(CacheOptions::default().with_capacity(1500)),
    ));
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, None));

    rig.element.chain(Buffer::new(pattern(0, 1000, 0))).unwrap();
    assert_eq!(
        rig.element.chain(Buffer::new(pattern(1000, 1000, 0))),
        Err(FlowError::Error)
    );
    assert_eq!(
        rig.element.chain(Buffer::new(pattern(1000, 10, 0))),
        Err(FlowError::Error)
    );
    assert!(rig.probe.events().iter().any(|event| matches!(
        event,
        Event::Buffer(BufferEvent::Error {
            recoverable: false,
            ..
        })
    )));
}
