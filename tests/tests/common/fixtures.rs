use std::sync::Arc;

use progbuf::{
    hls::{HlsBuffer, HlsConfig},
    pipeline::{Downstream, SegmentEvent, StreamEvent, Upstream},
    progressive::{ProgressiveBuffer, ProgressiveConfig},
};
use progbuf_test_utils::{BusProbe, RecordingSink, RecordingSource, init_tracing};

/// A progressive element wired to recording pads.
pub struct ProgressiveRig {
    pub element: ProgressiveBuffer,
    pub sink: Arc<RecordingSink>,
    pub source: Arc<RecordingSource>,
    pub probe: BusProbe,
}

impl ProgressiveRig {
    pub fn new(config: ProgressiveConfig) -> Self {
        Self::with_sink(config, RecordingSink::new())
    }

    pub fn with_sink(config: ProgressiveConfig, sink: RecordingSink) -> Self {
        init_tracing();
        let sink = Arc::new(sink);
        let source = Arc::new(RecordingSource::new());
        let element = ProgressiveBuffer::new(
            config,
            Arc::clone(&sink) as Arc<dyn Downstream>,
            Arc::clone(&source) as Arc<dyn Upstream>,
        );
        let probe = BusProbe::new(element.bus());
        Self {
            element,
            sink,
            source,
            probe,
        }
    }
}

/// An activated HLS element wired to recording pads.
pub struct HlsRig {
    pub element: HlsBuffer,
    pub sink: Arc<RecordingSink>,
    pub probe: BusProbe,
}

impl HlsRig {
    pub fn new(config: HlsConfig, sink: RecordingSink) -> Self {
        init_tracing();
        let sink = Arc::new(sink);
        let element = HlsBuffer::new(
            config,
            Arc::clone(&sink) as Arc<dyn Downstream>,
            Arc::new(RecordingSource::new()),
        )
        .unwrap();
        let probe = BusProbe::new(element.bus());
        element.activate_push().unwrap();
        Self {
            element,
            sink,
            probe,
        }
    }
}

pub fn byte_segment(start: u64, stop: Option<u64>) -> StreamEvent {
    StreamEvent::NewSegment(SegmentEvent::bytes(start, stop))
}
