#![forbid(unsafe_code)]

//! Task bodies: the push delivery loop and the pull-mode range monitor.

use progbuf_events::{BufferEvent, Event};
use progbuf_pipeline::{
    Buffer, ElementError, FlowError, SegmentEvent, StreamEvent, TaskControl,
};
use tracing::{debug, trace};

use crate::state::{DeliveryMode, Shared};

enum Work {
    Segment(SegmentEvent),
    Data(Buffer),
    Eos,
}

/// One iteration of the delivery task.
///
/// Blocks until there is something to forward, then forwards it with the
/// lock released. Any non-`Ok` flow state pauses the task.
pub(crate) fn push_loop(shared: &Shared, control: &TaskControl) {
    let mut outbox: Vec<Event> = Vec::new();
    let mut state = shared.state.lock();

    let work = loop {
        if let Err(err) = state.srcresult {
            debug!(%err, "delivery task pausing");
            control.pause();
            return;
        }

        if let Some(event) = state.pending_event.take() {
            break Work::Segment(event);
        }

        let unread = state.unread();
        if state.is_eos && (unread == 0 || !state.instant_seek) {
            break Work::Eos;
        }

        if state.instant_seek && unread > 0 {
            if state.mode == DeliveryMode::Skip {
                if let Some(cache) = state.cache.as_mut() {
                    let end = cache.write_position();
                    cache.set_read_position(end);
                    trace!(discarded = unread, "skip mode: dropping cached data");
                }
                continue;
            }

            let complete = state.segment.is_some_and(|segment| segment.is_complete());
            let ready = state
                .cache
                .as_ref()
                .is_some_and(|cache| cache.has_enough_data());
            if ready || complete || state.is_eos {
                let start = state.segment.map_or(0, |segment| segment.start);
                let read = match state.cache.as_mut() {
                    Some(cache) => cache.read_next(),
                    None => continue,
                };
                match read {
                    Ok((data, read_pos)) => {
                        let offset = start + read_pos - data.len() as u64;
                        break Work::Data(Buffer::new(data).with_offset(offset));
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
        }

        shared.data_added.wait(&mut state);
    };
    drop(state);

    match work {
        Work::Segment(event) => {
            let handled = shared
                .downstream
                .push_event(StreamEvent::NewSegment(event));
            let mut state = shared.state.lock();
            if handled && state.mode == DeliveryMode::Skip {
                debug!(start = event.start, "segment accepted, leaving skip mode");
                state.leave_skip();
            }
        }
        Work::Data(buffer) => {
            let offset = buffer.offset;
            let len = buffer.len();
            trace!(?offset, len, "pushing downstream");
            match shared.downstream.push(buffer) {
                Ok(()) => {}
                Err(FlowError::Flushing) => {
                    let mut state = shared.state.lock();
                    if state.srcresult.is_ok() {
                        state.srcresult = Err(FlowError::Flushing);
                    }
                    control.pause();
                }
                Err(err @ (FlowError::NotLinked | FlowError::Eos)) => {
                    debug!(%err, "downstream refused data, entering skip mode");
                    let mut state = shared.state.lock();
                    state.mode = DeliveryMode::Skip;
                    state.unexpected |= err == FlowError::Eos;
                }
                Err(FlowError::Error) => {
                    debug!("downstream error, pausing");
                    let mut state = shared.state.lock();
                    state.srcresult = Err(FlowError::Error);
                    control.pause();
                }
            }
        }
        Work::Eos => {
            debug!("forwarding EOS");
            shared.downstream.push_event(StreamEvent::Eos);
            let mut state = shared.state.lock();
            if state.srcresult.is_ok() {
                state.srcresult = Err(FlowError::Eos);
            }
            control.pause();
        }
    }
}

/// One iteration of the pull-mode range monitor.
///
/// Waits until the outstanding range request is buffered together with
/// `prebuffer_time` worth of bandwidth (or the stream ended), then clears the
/// request and announces it.
pub(crate) fn range_monitor(shared: &Shared, control: &TaskControl) {
    let mut state = shared.state.lock();

    let (start, stop) = loop {
        if let Err(err) = state.srcresult {
            debug!(%err, "range monitor pausing");
            control.pause();
            return;
        }

        if let Some((start, stop)) = state.range.bounds() {
            let prebuffer = state.tolerance_bytes(shared.config.prebuffer_time);
            let ready = state.is_eos
                || state.segment.is_some_and(|segment| {
                    let target = stop
                        .saturating_add(prebuffer)
                        .min(segment.stop.unwrap_or(u64::MAX));
                    (start >= segment.start && segment.last_stop >= target)
                        || segment.is_past_stop(start)
                });
            if ready {
                state.range.clear();
                break (start, stop);
            }
        }

        shared.data_added.wait(&mut state);
    };
    drop(state);

    debug!(start, stop, "pull range ready");
    shared.post(vec![Event::from(BufferEvent::RangeReady { start, stop })]);
}
