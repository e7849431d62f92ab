#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use progbuf_events::{BufferEvent, Event, EventBus};
use progbuf_pipeline::{
    Downstream, ElementError, FlowError, FlowResult, Segment, SegmentEvent, Upstream,
};
use progbuf_storage::ByteCache;
use tracing::{debug, error, warn};

use crate::{BandwidthMeter, ProgressiveConfig, RangeRequest};

/// How the element is currently scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Inactive,
    /// Delivery task pushes downstream.
    Push,
    /// Downstream pulls through `getrange`; the range monitor runs.
    Pull,
}

/// What the delivery task does with cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Push data and events downstream.
    Normal,
    /// Downstream refused data (not linked / already at EOS). Data is
    /// discarded while segment and EOS events are still forwarded; the next
    /// segment downstream accepts switches back to `Normal`.
    Skip,
}

/// Rate limiter for buffering-progress messages.
#[derive(Debug, Clone)]
pub(crate) struct ProgressReporter {
    threshold: f64,
    last_position: Option<u64>,
}

impl ProgressReporter {
    pub(crate) fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_position: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last_position = None;
    }

    /// Message for `segment`, if due.
    ///
    /// Due on the first report of a segment, whenever `threshold` percent of
    /// the declared length arrived since the last one, when the segment
    /// completes, and always when forced.
    pub(crate) fn check(&mut self, segment: &Segment, eos: bool, force: bool) -> Option<BufferEvent> {
        let position = segment.last_stop;
        let due = force
            || eos
            || match (self.last_position, segment.len()) {
                (None, _) => true,
                (Some(last), Some(len)) if len > 0 => {
                    let advanced = position.saturating_sub(last) as f64 * 100.0 / len as f64;
                    advanced >= self.threshold || segment.is_complete()
                }
                (Some(last), _) => position > last,
            };
        if !due {
            return None;
        }

        self.last_position = Some(position);
        Some(BufferEvent::BufferingProgress {
            start: segment.start,
            position,
            stop: segment.stop,
            eos,
        })
    }
}

/// Everything guarded by the element lock.
pub(crate) struct State {
    pub(crate) srcresult: FlowResult,
    pub(crate) is_flushing: bool,
    pub(crate) is_eos: bool,
    /// Segment event to forward before any further data.
    pub(crate) pending_event: Option<SegmentEvent>,
    pub(crate) segment: Option<Segment>,
    pub(crate) cache: Option<Box<dyn ByteCache>>,
    pub(crate) mode: DeliveryMode,
    /// Downstream answered a push with `Eos`; upstream data is refused until
    /// skip mode is left again.
    pub(crate) unexpected: bool,
    /// Cached data is valid for delivery. Cleared while a seek is forwarded
    /// upstream, re-armed by the next upstream segment.
    pub(crate) instant_seek: bool,
    pub(crate) bandwidth: BandwidthMeter,
    pub(crate) range: RangeRequest,
    /// Offset of the last speculative upstream seek, to avoid repeating it.
    pub(crate) pending_seek: Option<u64>,
    pub(crate) progress: ProgressReporter,
    pub(crate) exposed: bool,
    pub(crate) activation: Activation,
}

impl State {
    pub(crate) fn new(threshold: f64) -> Self {
        Self {
            srcresult: Err(FlowError::Flushing),
            is_flushing: false,
            is_eos: false,
            pending_event: None,
            segment: None,
            cache: None,
            mode: DeliveryMode::Normal,
            unexpected: false,
            instant_seek: true,
            bandwidth: BandwidthMeter::new(),
            range: RangeRequest::default(),
            pending_seek: None,
            progress: ProgressReporter::new(threshold),
            exposed: false,
            activation: Activation::Inactive,
        }
    }

    /// Drop all stream data, keeping the bandwidth estimate.
    pub(crate) fn reset(&mut self) {
        self.is_flushing = false;
        self.is_eos = false;
        self.pending_event = None;
        self.segment = None;
        self.cache = None;
        self.leave_skip();
        self.instant_seek = true;
        self.range.clear();
        self.pending_seek = None;
        self.progress.reset();
        self.bandwidth.restart_window();
    }

    pub(crate) fn leave_skip(&mut self) {
        self.mode = DeliveryMode::Normal;
        self.unexpected = false;
    }

    /// Unread bytes in the cache.
    pub(crate) fn unread(&self) -> u64 {
        self.cache.as_ref().map_or(0, |cache| cache.unread())
    }

    /// Slack in bytes granted by the bandwidth estimate.
    pub(crate) fn tolerance_bytes(&self, secs: f64) -> u64 {
        self.bandwidth.bytes_within(secs)
    }
}

/// State shared between the element handle and its tasks.
pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    /// Producer → consumer: data, events or state changes arrived.
    pub(crate) data_added: Condvar,
    pub(crate) config: ProgressiveConfig,
    pub(crate) bus: EventBus,
    pub(crate) downstream: Arc<dyn Downstream>,
    pub(crate) upstream: Arc<dyn Upstream>,
}

impl Shared {
    /// Record an element error while the lock is held.
    ///
    /// Fatal errors stop dataflow right away; the bus message is queued in
    /// `outbox` and posted once the lock is released.
    pub(crate) fn fail(&self, state: &mut State, err: ElementError, outbox: &mut Vec<Event>) {
        if err.is_fatal() {
            error!(%err, "progressive buffer error");
            state.srcresult = Err(FlowError::Error);
            self.data_added.notify_all();
        } else {
            warn!(%err, "progressive buffer warning");
        }
        outbox.push(err.to_event().into());
    }

    pub(crate) fn post(&self, outbox: Vec<Event>) {
        for event in outbox {
            debug!(?event, "posting");
            self.bus.publish(event);
        }
    }

    /// Allocate a fresh cache through the configured factory.
    pub(crate) fn allocate_cache(&self) -> Result<Box<dyn ByteCache>, ElementError> {
        Ok(self.config.cache.create()?)
    }
}
