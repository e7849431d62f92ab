//! Integration tests for the status bus as seen by a player controller.

use std::sync::Arc;

use progbuf::prelude::*;
use progbuf_test_utils::{RecordingSink, RecordingSource, pattern};

#[tokio::test]
async fn test_shared_bus_carries_both_elements() {
    let bus = EventBus::new(256);
    let mut rx = bus.subscribe();
    let sink = Arc::new(RecordingSink::new());

    let progressive = ProgressiveBuffer::new(
        ProgressiveConfig::default().with_bus(bus.clone()),
        Arc::clone(&sink) as Arc<dyn Downstream>,
        Arc::new(RecordingSource::new()),
    );
    progressive.activate_pull().unwrap();
    progressive.sink_event(StreamEvent::NewSegment(SegmentEvent::bytes(0, Some(10))));
    progressive.chain(Buffer::new(pattern(0, 10, 0))).unwrap();

    let hls = HlsBuffer::new(
        HlsConfig::default().with_bus(bus.clone()),
        sink,
        Arc::new(RecordingSource::new()),
    )
    .unwrap();
    hls.activate_push().unwrap();
    hls.sink_event(StreamEvent::NewSegment(SegmentEvent::bytes(0, Some(10))));

    let mut saw_progress = false;
    let mut saw_resume = false;
    while !(saw_progress && saw_resume) {
        match rx.recv().await.unwrap() {
            Event::Buffer(BufferEvent::BufferingProgress { position: 10, .. }) => {
                saw_progress = true;
            }
            Event::Hls(HlsEvent::Resume) => saw_resume = true,
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_underrun_reaches_async_subscriber() {
    let source = Arc::new(RecordingSource::new());
    let element = ProgressiveBuffer::new(
        ProgressiveConfig::default(),
        Arc::new(RecordingSink::new()),
        source,
    );
    let mut rx = element.bus().subscribe();
    element.activate_pull().unwrap();
    element.sink_event(StreamEvent::NewSegment(SegmentEvent::bytes(0, Some(100))));

    assert!(matches!(element.getrange(0, 50), Ok(RangeOutcome::Retry)));
    loop {
        if rx.recv().await.unwrap() == Event::Buffer(BufferEvent::Underrun) {
            break;
        }
    }
}
