#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use progbuf_events::{BufferEvent, Event, EventBus};
use progbuf_pipeline::{
    Buffer, Downstream, ElementError, FlowError, FlowResult, Format, RangeOutcome, SeekEvent,
    SeekType, Segment, SegmentEvent, StreamEvent, Task, TaskControl, Upstream,
};
use tracing::{debug, trace, warn};

use crate::{
    ProgressiveConfig,
    delivery,
    state::{Activation, DeliveryMode, Shared, State},
};

/// Progressive-download buffering element.
///
/// Accepts pushed data from a network source into a single growing cache and
/// serves it downstream either from its own delivery task (push mode) or
/// through random-access [`getrange`](Self::getrange) calls (pull mode).
///
/// ```ignore
/// let buffer = ProgressiveBuffer::new(ProgressiveConfig::default(), demuxer, http_source);
/// buffer.activate_push()?;
/// buffer.sink_event(StreamEvent::NewSegment(SegmentEvent::bytes(0, Some(len))));
/// buffer.chain(Buffer::new(chunk))?;
/// ```
pub struct ProgressiveBuffer {
    shared: Arc<Shared>,
    task: Task,
    monitor: Task,
}

impl std::fmt::Debug for ProgressiveBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ProgressiveBuffer")
            .field("segment", &state.segment)
            .field("srcresult", &state.srcresult)
            .field("activation", &state.activation)
            .finish()
    }
}

impl ProgressiveBuffer {
    pub fn new(
        config: ProgressiveConfig,
        downstream: Arc<dyn Downstream>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let bus = config
            .bus
            .clone()
            .unwrap_or_else(|| EventBus::new(config.event_channel_capacity));
        let shared = Arc::new(Shared {
            state: Mutex::new(State::new(config.threshold)),
            data_added: Condvar::new(),
            config,
            bus,
            downstream,
            upstream,
        });

        let task = Task::new("progbuf-progressive", {
            let shared = Arc::clone(&shared);
            move |control: &TaskControl| delivery::push_loop(&shared, control)
        });
        let monitor = Task::new("progbuf-range-monitor", {
            let shared = Arc::clone(&shared);
            move |control: &TaskControl| delivery::range_monitor(&shared, control)
        });

        Self {
            shared,
            task,
            monitor,
        }
    }

    /// Bus the element posts its status messages on.
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Estimated download rate in bytes per second.
    pub fn bandwidth(&self) -> f64 {
        self.shared.state.lock().bandwidth.estimate()
    }

    /// Snapshot of the live segment.
    pub fn segment(&self) -> Option<Segment> {
        self.shared.state.lock().segment
    }

    /// Current delivery mode of the push task.
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.shared.state.lock().mode
    }

    /// Current flow state of the source side.
    pub fn flow_state(&self) -> FlowResult {
        self.shared.state.lock().srcresult
    }

    // ── Activation ─────────────────────────────────────────────────────

    /// Start serving downstream from the delivery task.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery thread cannot be spawned.
    pub fn activate_push(&self) -> Result<(), ElementError> {
        self.activate(Activation::Push);
        self.task.start().map_err(|source| ElementError::TaskSpawn {
            name: "progbuf-progressive".to_string(),
            source,
        })
    }

    /// Serve downstream through [`getrange`](Self::getrange).
    ///
    /// # Errors
    ///
    /// Returns an error if the range monitor thread cannot be spawned.
    pub fn activate_pull(&self) -> Result<(), ElementError> {
        self.activate(Activation::Pull);
        self.monitor.start().map_err(|source| ElementError::TaskSpawn {
            name: "progbuf-range-monitor".to_string(),
            source,
        })
    }

    fn activate(&self, activation: Activation) {
        let mut state = self.shared.state.lock();
        debug!(?activation, "activating");
        state.activation = activation;
        state.is_flushing = false;
        state.srcresult = Ok(());
    }

    /// Stop all tasks and drop buffered data.
    pub fn deactivate(&self) {
        {
            let mut state = self.shared.state.lock();
            debug!(activation = ?state.activation, "deactivating");
            state.srcresult = Err(FlowError::Flushing);
            state.activation = Activation::Inactive;
            self.shared.data_added.notify_all();
        }
        self.task.join();
        self.monitor.join();

        self.shared.state.lock().reset();
    }

    fn restart_tasks(&self) {
        let activation = self.shared.state.lock().activation;
        let started = match activation {
            Activation::Push => self.task.start(),
            Activation::Pull => self.monitor.start(),
            Activation::Inactive => Ok(()),
        };
        if let Err(source) = started {
            let mut outbox: Vec<Event> = Vec::new();
            let mut state = self.shared.state.lock();
            self.shared.fail(
                &mut state,
                ElementError::TaskSpawn {
                    name: "progbuf-progressive".to_string(),
                    source,
                },
                &mut outbox,
            );
            drop(state);
            self.shared.post(outbox);
        }
    }

    fn pause_tasks(&self) {
        self.task.pause();
        self.monitor.pause();
    }

    // ── Sink side ──────────────────────────────────────────────────────

    /// Accept a buffer from upstream.
    ///
    /// # Errors
    ///
    /// - `Flushing` while a flush is in progress or the element is inactive
    /// - `Eos` once end-of-stream was received, or after downstream answered
    ///   a push with `Eos`
    /// - `Error` after a fatal element error (e.g. the cache ran out of room)
    pub fn chain(&self, buffer: Buffer) -> FlowResult {
        let mut outbox: Vec<Event> = Vec::new();
        let mut state = self.shared.state.lock();

        if state.is_flushing {
            return Err(FlowError::Flushing);
        }
        if state.is_eos || state.unexpected {
            return Err(FlowError::Eos);
        }
        match state.srcresult {
            Err(FlowError::Error) => return Err(FlowError::Error),
            Err(FlowError::Flushing) if state.activation == Activation::Inactive => {
                return Err(FlowError::Flushing);
            }
            _ => {}
        }
        if buffer.is_empty() {
            return Ok(());
        }

        if state.cache.is_none() {
            match self.shared.allocate_cache() {
                Ok(cache) => {
                    debug!("no segment before data, opening [0, unknown)");
                    state.cache = Some(cache);
                    state.segment = Some(Segment::new(0, None));
                }
                Err(err) => {
                    self.shared.fail(&mut state, err, &mut outbox);
                    drop(state);
                    self.shared.post(outbox);
                    return Err(FlowError::Error);
                }
            }
        }

        let len = buffer.len() as u64;
        let written = match state.cache.as_mut() {
            Some(cache) => cache.write(&buffer.data),
            None => Ok(()),
        };
        if let Err(err) = written {
            self.shared
                .fail(&mut state, ElementError::Cache(err), &mut outbox);
            drop(state);
            self.shared.post(outbox);
            return Err(FlowError::Error);
        }

        let threshold_event = {
            let state = &mut *state;
            let Some(segment) = state.segment.as_mut() else {
                return Ok(());
            };
            if segment.advance(len) {
                debug!(stop = ?segment.stop, "data past declared stop, extending segment");
            }
            state.bandwidth.record(len);
            state.progress.check(segment, false, false)
        };
        if let Some(event) = threshold_event {
            outbox.push(event.into());
        }

        let first_write = !state.exposed;
        state.exposed = true;
        trace!(len, last_stop = ?state.segment.map(|s| s.last_stop), "chain");
        self.shared.data_added.notify_all();
        drop(state);

        if first_write {
            debug!("first data cached, exposing source pad");
            self.shared.downstream.expose();
        }
        self.shared.post(outbox);
        Ok(())
    }

    /// Handle an event arriving from upstream.
    pub fn sink_event(&self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::NewSegment(segment) => self.handle_segment(segment),
            StreamEvent::Eos => self.handle_eos(),
            StreamEvent::FlushStart => {
                let handled = self.shared.downstream.push_event(StreamEvent::FlushStart);
                {
                    let mut state = self.shared.state.lock();
                    state.is_flushing = true;
                    state.srcresult = Err(FlowError::Flushing);
                    self.shared.data_added.notify_all();
                }
                self.pause_tasks();
                handled
            }
            StreamEvent::FlushStop => {
                let handled = self.shared.downstream.push_event(StreamEvent::FlushStop);
                {
                    let mut state = self.shared.state.lock();
                    state.is_flushing = false;
                    state.is_eos = false;
                    state.leave_skip();
                    if state.activation != Activation::Inactive {
                        state.srcresult = Ok(());
                    }
                }
                self.restart_tasks();
                handled
            }
            other => self.shared.downstream.push_event(other),
        }
    }

    fn handle_segment(&self, event: SegmentEvent) -> bool {
        let mut outbox: Vec<Event> = Vec::new();
        let mut state = self.shared.state.lock();

        if event.format != Format::Bytes {
            self.shared
                .fail(&mut state, ElementError::NonByteSegment(event.format), &mut outbox);
            drop(state);
            self.shared.post(outbox);
            return true;
        }
        if let Some(stop) = event.stop {
            if stop <= event.start {
                self.shared.fail(
                    &mut state,
                    ElementError::EmptySegment {
                        start: event.start,
                        stop,
                    },
                    &mut outbox,
                );
                drop(state);
                self.shared.post(outbox);
                return true;
            }
        }

        let is_update = event.update
            && state.cache.is_some()
            && state.segment.is_some_and(|segment| segment.covers(event.start));

        if is_update {
            let state = &mut *state;
            if let (Some(segment), Some(cache)) = (state.segment.as_mut(), state.cache.as_mut()) {
                let position = segment.cache_position(event.start);
                segment.last_stop = event.start;
                if event.stop.is_some() {
                    segment.stop = event.stop;
                }
                cache.set_write_position(position);
                cache.set_read_position(position);
                debug!(start = event.start, "segment update, cache repositioned");
            }
        } else {
            match self.shared.allocate_cache() {
                Ok(cache) => {
                    debug!(start = event.start, stop = ?event.stop, "new segment, fresh cache");
                    state.cache = Some(cache);
                    state.segment = Some(Segment::from_event(&event));
                }
                Err(err) => {
                    self.shared.fail(&mut state, err, &mut outbox);
                    drop(state);
                    self.shared.post(outbox);
                    return true;
                }
            }
        }

        state.is_eos = false;
        state.instant_seek = true;
        state.pending_seek = None;
        state.bandwidth.restart_window();
        if let Some(replaced) = state.pending_event.replace(event) {
            debug!(start = replaced.start, "undelivered segment event replaced");
        }
        state.progress.reset();
        let state_ref = &mut *state;
        if let Some(segment) = state_ref.segment.as_ref() {
            if let Some(progress) = state_ref.progress.check(segment, false, true) {
                outbox.push(progress.into());
            }
        }
        self.shared.data_added.notify_all();
        drop(state);

        self.shared.post(outbox);
        true
    }

    fn handle_eos(&self) -> bool {
        let mut outbox: Vec<Event> = Vec::new();
        let mut state = self.shared.state.lock();

        state.is_eos = true;
        let state_ref = &mut *state;
        if let Some(segment) = state_ref.segment.as_mut() {
            segment.clamp_to_last_stop();
            debug!(last_stop = segment.last_stop, "EOS, stop clamped");
            if let Some(progress) = state_ref.progress.check(segment, true, true) {
                outbox.push(progress.into());
            }
        }
        self.shared.data_added.notify_all();
        drop(state);

        self.shared.post(outbox);
        true
    }

    // ── Source side ────────────────────────────────────────────────────

    /// Handle an event arriving from downstream.
    pub fn src_event(&self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Seek(seek) => {
                let activation = self.shared.state.lock().activation;
                if activation == Activation::Push {
                    self.perform_push_seek(seek)
                } else {
                    self.shared.upstream.push_event(StreamEvent::Seek(seek))
                }
            }
            other => self.shared.upstream.push_event(other),
        }
    }

    /// Seek requested by downstream while push-activated.
    ///
    /// Targets inside `[start, last_stop]` (plus `wait_tolerance` seconds of
    /// bandwidth) are served from the cache by repositioning the read cursor;
    /// anything else is forwarded upstream as a byte-range request.
    pub fn perform_push_seek(&self, seek: SeekEvent) -> bool {
        let rejection = if seek.format != Format::Bytes {
            Some(ElementError::NonByteSeek(seek.format))
        } else if seek.stop_type != SeekType::None {
            Some(ElementError::SeekStopUnsupported)
        } else if seek.start_type != SeekType::Set {
            Some(ElementError::RelativeSeek)
        } else {
            None
        };
        if let Some(err) = rejection {
            let mut outbox: Vec<Event> = Vec::new();
            let mut state = self.shared.state.lock();
            self.shared.fail(&mut state, err, &mut outbox);
            drop(state);
            self.shared.post(outbox);
            return false;
        }

        if seek.flush {
            self.shared.downstream.push_event(StreamEvent::FlushStart);
        }

        {
            let mut state = self.shared.state.lock();
            state.srcresult = Err(FlowError::Flushing);
            self.shared.data_added.notify_all();
        }
        self.task.pause();

        let target = seek.start;
        let instant = {
            let mut state = self.shared.state.lock();
            let slack = state.tolerance_bytes(self.shared.config.wait_tolerance);
            let state = &mut *state;
            state.leave_skip();

            match (state.segment, state.cache.as_mut()) {
                (Some(segment), Some(cache))
                    if target >= segment.start
                        && target <= segment.last_stop.saturating_add(slack) =>
                {
                    cache.set_read_position(segment.cache_position(target));
                    state.pending_event = Some(SegmentEvent {
                        update: false,
                        format: Format::Bytes,
                        start: target,
                        stop: segment.stop,
                        position: target,
                    });
                    state.instant_seek = true;
                    debug!(target, last_stop = segment.last_stop, slack, "instant seek");
                    true
                }
                _ => {
                    state.instant_seek = false;
                    state.is_eos = false;
                    state.pending_event = None;
                    debug!(target, "seek outside cache, forwarding upstream");
                    false
                }
            }
        };

        let handled = instant || self.shared.upstream.push_event(StreamEvent::Seek(seek));
        if !handled {
            warn!(target, "upstream refused seek");
            self.shared.state.lock().instant_seek = true;
        }

        if seek.flush {
            self.shared.downstream.push_event(StreamEvent::FlushStop);
        }

        {
            let mut state = self.shared.state.lock();
            if state.activation != Activation::Inactive {
                state.srcresult = Ok(());
            }
            self.shared.data_added.notify_all();
        }
        self.restart_tasks();
        handled
    }

    /// Random-access read for pull mode.
    ///
    /// # Errors
    ///
    /// - `Eos` when `offset` lies at or past the segment stop
    /// - `Flushing` during a flush or when inactive
    /// - `Error` after a fatal element error
    pub fn getrange(&self, offset: u64, size: usize) -> FlowResult<RangeOutcome> {
        let mut outbox: Vec<Event> = Vec::new();
        let mut state = self.shared.state.lock();

        if state.is_flushing {
            return Err(FlowError::Flushing);
        }
        match state.srcresult {
            Err(FlowError::Error) => return Err(FlowError::Error),
            Err(FlowError::Flushing) => return Err(FlowError::Flushing),
            _ => {}
        }

        let len = size as u64;
        let end = offset.saturating_add(len);

        if let Some(segment) = state.segment {
            if segment.is_past_stop(offset) {
                return Err(FlowError::Eos);
            }

            // A request straddling the final stop is served short.
            let serve = if segment.is_buffered(offset, len) {
                Some(size)
            } else if segment.is_complete() && segment.covers(offset) && end > segment.last_stop
            {
                Some((segment.last_stop - offset) as usize)
            } else {
                None
            };

            if let Some(size) = serve {
                let read = match state.cache.as_mut() {
                    Some(cache) => cache.read_at(segment.cache_position(offset), size),
                    None => return Ok(RangeOutcome::Retry),
                };
                return match read {
                    Ok(data) => {
                        trace!(offset, size, "getrange served from cache");
                        Ok(RangeOutcome::Data(Buffer::new(data).with_offset(offset)))
                    }
                    Err(err) => {
                        self.shared
                            .fail(&mut state, ElementError::Cache(err), &mut outbox);
                        drop(state);
                        self.shared.post(outbox);
                        Err(FlowError::Error)
                    }
                };
            }
        }

        state.range.extend(offset, end);
        let slack = state.tolerance_bytes(self.shared.config.wait_tolerance);
        let out_of_window = state.segment.is_some_and(|segment| {
            offset < segment.start || offset > segment.last_stop.saturating_add(slack)
        });
        let seek_to = (self.shared.config.speculative_seek
            && out_of_window
            && state.pending_seek != Some(offset))
        .then_some(offset);
        if seek_to.is_some() {
            state.pending_seek = seek_to;
        }
        debug!(offset, size, range = ?state.range.bounds(), "getrange underrun");
        self.shared.data_added.notify_all();
        drop(state);

        outbox.push(Event::from(BufferEvent::Underrun));
        self.shared.post(outbox);

        if let Some(offset) = seek_to {
            debug!(offset, "speculative upstream seek");
            if !self
                .shared
                .upstream
                .push_event(StreamEvent::Seek(SeekEvent::bytes(offset)))
            {
                warn!(offset, "upstream refused speculative seek");
                let mut state = self.shared.state.lock();
                if state.pending_seek == Some(offset) {
                    state.pending_seek = None;
                }
            }
        }

        Ok(RangeOutcome::Retry)
    }
}

impl Drop for ProgressiveBuffer {
    fn drop(&mut self) {
        self.deactivate();
    }
}
