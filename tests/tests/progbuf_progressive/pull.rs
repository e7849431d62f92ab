//! Pull mode: `getrange` against a growing download.

use std::{thread, time::Duration};

use bytes::BytesMut;
use progbuf::{
    events::{BufferEvent, Event},
    pipeline::{Buffer, FlowError, RangeOutcome, StreamEvent},
    progressive::ProgressiveConfig,
};
use progbuf_test_utils::{WAIT, pattern};
use rstest::rstest;

use crate::common::{ProgressiveRig, byte_segment};

const LEN: usize = 64 * 1024;

#[test]
fn getrange_round_trips_written_bytes() {
    let rig = ProgressiveRig::new(ProgressiveConfig::default());
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(LEN as u64)));

    let data = pattern(0, LEN, 42);
    for chunk in data.chunks(1500) {
        rig.element.chain(Buffer::new(chunk.to_vec())).unwrap();
    }

    match rig.element.getrange(0, LEN) {
        Ok(RangeOutcome::Data(buffer)) => {
            assert_eq!(buffer.offset, Some(0));
            assert_eq!(buffer.data, data);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn getrange_beyond_download_retries_and_records_range() {
    let mut rig = ProgressiveRig::new(
        ProgressiveConfig::default()
            .with_prebuffer_time(0.0)
            .with_wait_tolerance(0.0),
    );
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(10_000)));
    rig.element.chain(Buffer::new(pattern(0, 3000, 0))).unwrap();

    assert!(matches!(
        rig.element.getrange(5000, 1000),
        Ok(RangeOutcome::Retry)
    ));
    assert!(
        rig.probe
            .events()
            .contains(&Event::Buffer(BufferEvent::Underrun))
    );

    // The range is announced only once all of [5000, 6000) arrived.
    rig.element.chain(Buffer::new(pattern(3000, 2500, 0))).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(!rig.probe.events().iter().any(|event| matches!(
        event,
        Event::Buffer(BufferEvent::RangeReady { .. })
    )));

    rig.element.chain(Buffer::new(pattern(5500, 500, 0))).unwrap();
    assert!(rig.probe.wait_for(WAIT, |event| {
        matches!(
            event,
            Event::Buffer(BufferEvent::RangeReady { start, stop }) if *start <= 5000 && *stop >= 6000
        )
    }));
}

#[test]
fn reader_thread_follows_producer() {
    let rig = ProgressiveRig::new(ProgressiveConfig::default().with_prebuffer_time(0.0));
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(0, Some(LEN as u64)));
    let data = pattern(0, LEN, 9);

    thread::scope(|scope| {
        let element = &rig.element;
        let reader = scope.spawn(move || {
            let mut out = BytesMut::new();
            let mut offset = 0u64;
            loop {
                match element.getrange(offset, 4096) {
                    Ok(RangeOutcome::Data(buffer)) => {
                        offset += buffer.len() as u64;
                        out.extend_from_slice(&buffer.data);
                    }
                    Ok(RangeOutcome::Retry) => thread::sleep(Duration::from_millis(1)),
                    Err(FlowError::Eos) => break out.freeze(),
                    Err(err) => panic!("unexpected {err:?}"),
                }
            }
        });

        for chunk in data.chunks(3000) {
            rig.element.chain(Buffer::new(chunk.to_vec())).unwrap();
            thread::sleep(Duration::from_micros(200));
        }
        rig.element.sink_event(StreamEvent::Eos);

        assert_eq!(reader.join().unwrap(), data);
    });
}

#[rstest]
#[case::before_segment(500, true)]
#[case::within_window(12_000, false)]
#[case::far_ahead(90_000, true)]
fn speculative_seek_only_outside_window(#[case] offset: u64, #[case] seeks: bool) {
    let rig = ProgressiveRig::new(ProgressiveConfig::default().with_wait_tolerance(0.0));
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(10_000, Some(100_000)));
    rig.element
        .chain(Buffer::new(pattern(10_000, 5000, 0)))
        .unwrap();

    let outcome = rig.element.getrange(offset, 100).unwrap();
    if seeks {
        assert!(matches!(outcome, RangeOutcome::Retry));
        assert_eq!(rig.source.seeks(), vec![offset]);
    } else {
        assert!(matches!(outcome, RangeOutcome::Data(_)));
        assert!(rig.source.seeks().is_empty());
    }
}

#[test]
fn speculative_seek_disabled() {
    let rig = ProgressiveRig::new(
        ProgressiveConfig::default()
            .with_speculative_seek(false)
            .with_wait_tolerance(0.0),
    );
    rig.element.activate_pull().unwrap();
    rig.element.sink_event(byte_segment(10_000, Some(100_000)));

    assert!(matches!(
        rig.element.getrange(500, 100),
        Ok(RangeOutcome::Retry)
    ));
    assert!(rig.source.seeks().is_empty());
}
