//! Recording pads standing in for the demuxer and the network source.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};
use progbuf_pipeline::{Buffer, Downstream, FlowResult, StreamEvent, Upstream};

use crate::wait_until;

#[derive(Default)]
struct SinkLog {
    buffers: Vec<Buffer>,
    events: Vec<StreamEvent>,
}

/// Downstream pad that records everything pushed into it.
///
/// Pushes can be made to fail with a fixed flow result, or held at a gate
/// until the test opens it.
pub struct RecordingSink {
    log: Mutex<SinkLog>,
    result: Mutex<FlowResult>,
    gate: Mutex<bool>,
    gate_cv: Condvar,
    blocked: AtomicUsize,
    exposed: AtomicUsize,
    accept_events: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            log: Mutex::new(SinkLog::default()),
            result: Mutex::new(Ok(())),
            gate: Mutex::new(true),
            gate_cv: Condvar::new(),
            blocked: AtomicUsize::new(0),
            exposed: AtomicUsize::new(0),
            accept_events: AtomicBool::new(true),
        }
    }
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose pushes block until [`open`](Self::open) is called.
    #[must_use]
    pub fn gated() -> Self {
        let sink = Self::default();
        *sink.gate.lock() = false;
        sink
    }

    pub fn open(&self) {
        *self.gate.lock() = true;
        self.gate_cv.notify_all();
    }

    pub fn close(&self) {
        *self.gate.lock() = false;
    }

    /// Pushes currently held at the gate.
    pub fn blocked(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Result returned from every subsequent push.
    pub fn set_push_result(&self, result: FlowResult) {
        *self.result.lock() = result;
    }

    pub fn set_accept_events(&self, accept: bool) {
        self.accept_events.store(accept, Ordering::SeqCst);
    }

    pub fn buffers(&self) -> Vec<Buffer> {
        self.log.lock().buffers.clone()
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.log.lock().events.clone()
    }

    /// All accepted payload bytes, concatenated.
    pub fn bytes(&self) -> Bytes {
        let log = self.log.lock();
        let mut out = BytesMut::new();
        for buffer in &log.buffers {
            out.extend_from_slice(&buffer.data);
        }
        out.freeze()
    }

    pub fn byte_count(&self) -> usize {
        self.log.lock().buffers.iter().map(Buffer::len).sum()
    }

    pub fn exposed(&self) -> usize {
        self.exposed.load(Ordering::SeqCst)
    }

    pub fn saw_eos(&self) -> bool {
        self.log
            .lock()
            .events
            .iter()
            .any(|event| matches!(event, StreamEvent::Eos))
    }

    pub fn wait_for_bytes(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.byte_count() >= count)
    }

    pub fn wait_for_event(&self, timeout: Duration, pred: impl Fn(&StreamEvent) -> bool) -> bool {
        wait_until(timeout, || self.log.lock().events.iter().any(&pred))
    }
}

impl Downstream for RecordingSink {
    fn push(&self, buffer: Buffer) -> FlowResult {
        {
            let mut open = self.gate.lock();
            if !*open {
                self.blocked.fetch_add(1, Ordering::SeqCst);
                while !*open {
                    self.gate_cv.wait(&mut open);
                }
                self.blocked.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let result = *self.result.lock();
        if result.is_ok() {
            self.log.lock().buffers.push(buffer);
        }
        result
    }

    fn push_event(&self, event: StreamEvent) -> bool {
        self.log.lock().events.push(event);
        self.accept_events.load(Ordering::SeqCst)
    }

    fn expose(&self) {
        self.exposed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Upstream pad that records the events sent to the network source.
pub struct RecordingSource {
    events: Mutex<Vec<StreamEvent>>,
    accept: AtomicBool,
}

impl Default for RecordingSource {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
        }
    }
}

impl RecordingSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that refuses every event.
    #[must_use]
    pub fn refusing() -> Self {
        let source = Self::default();
        source.accept.store(false, Ordering::SeqCst);
        source
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }

    /// Start offsets of the seeks received.
    pub fn seeks(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Seek(seek) => Some(seek.start),
                _ => None,
            })
            .collect()
    }
}

impl Upstream for RecordingSource {
    fn push_event(&self, event: StreamEvent) -> bool {
        self.events.lock().push(event);
        self.accept.load(Ordering::SeqCst)
    }
}
