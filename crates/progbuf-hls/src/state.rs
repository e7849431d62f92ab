#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use progbuf_events::{Event, EventBus};
use progbuf_pipeline::{Downstream, ElementError, FlowError, FlowResult, SegmentEvent, Upstream};
use tracing::{debug, error, warn};

use crate::SegmentCacheSet;

/// Everything guarded by the element lock.
pub(crate) struct State {
    pub(crate) srcresult: FlowResult,
    pub(crate) is_flushing: bool,
    pub(crate) is_eos: bool,
    pub(crate) pending_event: Option<SegmentEvent>,
    pub(crate) slots: SegmentCacheSet,
    /// Downstream already got its segment since the last flush.
    pub(crate) segment_sent: bool,
    /// Stall already posted for the current starvation episode.
    pub(crate) starving: bool,
    pub(crate) exposed: bool,
    pub(crate) active: bool,
}

impl State {
    pub(crate) fn new(slots: SegmentCacheSet) -> Self {
        Self {
            srcresult: Err(FlowError::Flushing),
            is_flushing: false,
            is_eos: false,
            pending_event: None,
            slots,
            segment_sent: false,
            starving: false,
            exposed: false,
            active: false,
        }
    }

    /// Drop every fragment and rewind the ring.
    pub(crate) fn reset(&mut self) {
        self.is_eos = false;
        self.pending_event = None;
        self.slots.reset();
        self.segment_sent = false;
        self.starving = false;
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    /// Producer → consumer: data, fragments or state changes arrived.
    pub(crate) data_added: Condvar,
    /// Consumer → producer: a slot was drained.
    pub(crate) slot_freed: Condvar,
    pub(crate) bus: EventBus,
    pub(crate) downstream: Arc<dyn Downstream>,
    pub(crate) upstream: Arc<dyn Upstream>,
}

impl Shared {
    /// Wake every waiter on both sides.
    pub(crate) fn notify_all(&self) {
        self.data_added.notify_all();
        self.slot_freed.notify_all();
    }

    /// Record an element error while the lock is held; fatal ones stop
    /// dataflow. The bus message goes to `outbox`.
    pub(crate) fn fail(&self, state: &mut State, err: ElementError, outbox: &mut Vec<Event>) {
        if err.is_fatal() {
            error!(%err, "hls buffer error");
            state.srcresult = Err(FlowError::Error);
            self.notify_all();
        } else {
            warn!(%err, "hls buffer warning");
        }
        outbox.push(err.to_event().into());
    }

    pub(crate) fn post(&self, outbox: Vec<Event>) {
        for event in outbox {
            debug!(?event, "posting");
            self.bus.publish(event);
        }
    }
}
