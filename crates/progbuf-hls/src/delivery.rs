#![forbid(unsafe_code)]

use parking_lot::MutexGuard;
use progbuf_events::{Event, HlsEvent};
use progbuf_pipeline::{Buffer, ElementError, FlowError, SegmentEvent, StreamEvent, TaskControl};
use tracing::{debug, trace};

use crate::state::Shared;

enum Work {
    Segment(SegmentEvent),
    Data(Buffer),
    Eos,
}

/// One iteration of the HLS delivery task.
///
/// Drains the read slot in write order. A fully drained slot is handed back
/// to the producer (`slot_freed` + cache-not-full) before the next fragment
/// is looked at.
pub(crate) fn push_loop(shared: &Shared, control: &TaskControl) {
    let mut outbox: Vec<Event> = Vec::new();
    let mut state = shared.state.lock();

    let work = loop {
        if let Err(err) = state.srcresult {
            debug!(%err, "hls delivery task pausing");
            control.pause();
            return;
        }

        if let Some(event) = state.pending_event.take() {
            break Work::Segment(event);
        }

        let is_eos = state.is_eos;
        let read_index = state.slots.read_index();
        let Some(slot) = state.slots.reading_mut() else {
            if is_eos {
                break Work::Eos;
            }
            shared.data_added.wait(&mut state);
            continue;
        };

        let unread = slot.unread();
        if unread > 0 && (slot.has_enough_data() || slot.is_complete() || is_eos) {
            match slot.read_next() {
                Ok(data) => {
                    if slot.is_drained() {
                        state.slots.finish_read();
                        debug!(slot = read_index, "fragment drained, slot freed");
                        shared.slot_freed.notify_all();
                        outbox.push(HlsEvent::CacheNotFull.into());
                    }
                    state.starving = false;
                    break Work::Data(Buffer::new(data));
                }
                Err(err) => {
                    shared.fail(&mut state, ElementError::Cache(err), &mut outbox);
                    drop(state);
                    shared.post(outbox);
                    control.pause();
                    return;
                }
            }
        }

        if unread == 0 && (slot.is_drained() || is_eos) {
            // Truncated fragment at EOS, or an empty declared size.
            state.slots.finish_read();
            debug!(slot = read_index, "fragment ended short, slot freed");
            shared.slot_freed.notify_all();
            outbox.push(HlsEvent::CacheNotFull.into());
            continue;
        }

        if !state.starving {
            state.starving = true;
            trace!(slot = read_index, unread, "fragment starving");
            MutexGuard::unlocked(&mut state, || {
                shared.bus.publish(HlsEvent::Stall);
            });
            continue;
        }

        shared.data_added.wait(&mut state);
    };
    drop(state);
    shared.post(outbox);

    match work {
        Work::Segment(event) => {
            debug!(start = event.start, "forwarding segment");
            shared.downstream.push_event(StreamEvent::NewSegment(event));
        }
        Work::Data(buffer) => {
            trace!(len = buffer.len(), "pushing downstream");
            if let Err(err) = shared.downstream.push(buffer) {
                debug!(%err, "downstream refused data, stopping delivery");
                let mut state = shared.state.lock();
                if state.srcresult.is_ok() {
                    state.srcresult = Err(err);
                }
                shared.slot_freed.notify_all();
                control.pause();
            }
        }
        Work::Eos => {
            debug!("forwarding EOS");
            shared.downstream.push_event(StreamEvent::Eos);
            let mut state = shared.state.lock();
            if state.srcresult.is_ok() {
                state.srcresult = Err(FlowError::Eos);
            }
            shared.slot_freed.notify_all();
            control.pause();
        }
    }
}
