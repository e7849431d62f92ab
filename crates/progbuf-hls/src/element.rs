#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use progbuf_events::{Event, EventBus, HlsEvent};
use progbuf_pipeline::{
    Buffer, Downstream, ElementError, FlowError, FlowResult, Format, SegmentEvent, StreamEvent,
    Task, TaskControl, Upstream,
};
use tracing::{debug, trace, warn};

use crate::{
    HlsConfig, SegmentCacheSet, delivery,
    state::{Shared, State},
};

/// HLS fragment buffering element.
///
/// Each fragment announced by a new-segment event gets its own cache slot.
/// The delivery task drains slots in fragment order while the fetcher keeps
/// filling the next ones; when every slot is busy the new-segment call blocks
/// until the oldest fragment has been drained.
pub struct HlsBuffer {
    shared: Arc<Shared>,
    task: Task,
}

impl std::fmt::Debug for HlsBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("HlsBuffer")
            .field("slots", &state.slots)
            .field("srcresult", &state.srcresult)
            .finish()
    }
}

impl HlsBuffer {
    /// # Errors
    ///
    /// Returns an error if a fragment cache cannot be allocated.
    pub fn new(
        config: HlsConfig,
        downstream: Arc<dyn Downstream>,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, ElementError> {
        let slots = SegmentCacheSet::new(config.cache.as_ref(), config.slots)?;
        let bus = config
            .bus
            .clone()
            .unwrap_or_else(|| EventBus::new(config.event_channel_capacity));
        let shared = Arc::new(Shared {
            state: Mutex::new(State::new(slots)),
            data_added: Condvar::new(),
            slot_freed: Condvar::new(),
            bus,
            downstream,
            upstream,
        });

        let task = Task::new("progbuf-hls", {
            let shared = Arc::clone(&shared);
            move |control: &TaskControl| delivery::push_loop(&shared, control)
        });

        Ok(Self { shared, task })
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn flow_state(&self) -> FlowResult {
        self.shared.state.lock().srcresult
    }

    /// Slot the next `chain()` writes into, and the slot being drained.
    pub fn slot_indices(&self) -> (Option<usize>, usize) {
        let state = self.shared.state.lock();
        (state.slots.write_index(), state.slots.read_index())
    }

    /// Start the delivery task.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery thread cannot be spawned.
    pub fn activate_push(&self) -> Result<(), ElementError> {
        {
            let mut state = self.shared.state.lock();
            debug!("activating");
            state.active = true;
            state.is_flushing = false;
            state.srcresult = Ok(());
        }
        self.task.start().map_err(|source| ElementError::TaskSpawn {
            name: "progbuf-hls".to_string(),
            source,
        })
    }

    /// Stop the delivery task, wake a blocked producer and drop all
    /// fragments.
    pub fn deactivate(&self) {
        {
            let mut state = self.shared.state.lock();
            debug!("deactivating");
            state.active = false;
            state.srcresult = Err(FlowError::Flushing);
            self.shared.notify_all();
        }
        self.task.join();
        self.shared.state.lock().reset();
    }

    /// Append fragment data to the slot of the current fragment.
    ///
    /// # Errors
    ///
    /// - `Flushing` during a flush or when inactive
    /// - `Eos` after end-of-stream
    /// - `Error` for data before any fragment, or after a fatal error
    pub fn chain(&self, buffer: Buffer) -> FlowResult {
        let mut outbox: Vec<Event> = Vec::new();
        let mut state = self.shared.state.lock();

        if state.is_flushing {
            return Err(FlowError::Flushing);
        }
        if state.is_eos {
            return Err(FlowError::Eos);
        }
        match state.srcresult {
            Err(FlowError::Error) => return Err(FlowError::Error),
            Err(FlowError::Flushing) if !state.active => return Err(FlowError::Flushing),
            _ => {}
        }
        if buffer.is_empty() {
            return Ok(());
        }

        if state.slots.write_index().is_none() {
            self.shared
                .fail(&mut state, ElementError::DataBeforeSegment, &mut outbox);
            drop(state);
            self.shared.post(outbox);
            return Err(FlowError::Error);
        }

        let write_index = state.slots.write_index();
        let Some(slot) = state.slots.writing_mut() else {
            warn!(slot = ?write_index, len = buffer.len(), "fragment already drained, dropping data");
            return Ok(());
        };
        match slot.write(&buffer.data) {
            Ok(grown) => {
                if grown {
                    debug!(size = slot.size(), "data past declared fragment size");
                }
                trace!(len = buffer.len(), written = slot.written(), "chain");
            }
            Err(err) => {
                self.shared
                    .fail(&mut state, ElementError::Cache(err), &mut outbox);
                drop(state);
                self.shared.post(outbox);
                return Err(FlowError::Error);
            }
        }

        let first_write = !state.exposed;
        state.exposed = true;
        self.shared.data_added.notify_all();
        drop(state);

        if first_write {
            debug!("first fragment data cached, exposing source pad");
            self.shared.downstream.expose();
        }
        Ok(())
    }

    /// Handle an event arriving from upstream.
    ///
    /// A new segment starts the next fragment and may block until a slot is
    /// free.
    pub fn sink_event(&self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::NewSegment(segment) => self.begin_fragment(segment),
            StreamEvent::Eos => {
                {
                    let mut state = self.shared.state.lock();
                    debug!("EOS received");
                    state.is_eos = true;
                    self.shared.notify_all();
                }
                self.shared.bus.publish(HlsEvent::EndOfStream);
                true
            }
            StreamEvent::FlushStart => {
                let handled = self.shared.downstream.push_event(StreamEvent::FlushStart);
                {
                    let mut state = self.shared.state.lock();
                    state.is_flushing = true;
                    state.srcresult = Err(FlowError::Flushing);
                    self.shared.notify_all();
                }
                self.task.pause();
                self.shared.state.lock().reset();
                handled
            }
            StreamEvent::FlushStop => {
                let handled = self.shared.downstream.push_event(StreamEvent::FlushStop);
                let restart = {
                    let mut state = self.shared.state.lock();
                    state.is_flushing = false;
                    if state.active {
                        state.srcresult = Ok(());
                    }
                    state.active && !state.is_eos
                };
                if restart {
                    if let Err(err) = self.task.start() {
                        warn!(%err, "failed to restart delivery task");
                    }
                }
                handled
            }
            other => self.shared.downstream.push_event(other),
        }
    }

    fn begin_fragment(&self, event: SegmentEvent) -> bool {
        let mut outbox: Vec<Event> = Vec::new();
        let mut state = self.shared.state.lock();

        let invalid = match event.stop {
            _ if event.format != Format::Bytes => Some(ElementError::NonByteSegment(event.format)),
            None => Some(ElementError::UnboundedSegment),
            Some(stop) if stop <= event.start => Some(ElementError::EmptySegment {
                start: event.start,
                stop,
            }),
            Some(_) => None,
        };
        if let Some(err) = invalid {
            self.shared.fail(&mut state, err, &mut outbox);
            drop(state);
            self.shared.post(outbox);
            return true;
        }
        let size = event.stop.map_or(0, |stop| stop - event.start);

        let mut announced_full = false;
        loop {
            if let Err(err) = state.srcresult {
                debug!(%err, "fragment dropped, element not flowing");
                return false;
            }
            if state.slots.is_next_free() {
                break;
            }
            if !announced_full {
                announced_full = true;
                debug!(read = state.slots.read_index(), "all fragment slots busy");
                MutexGuard::unlocked(&mut state, || {
                    self.shared.bus.publish(HlsEvent::CacheFull);
                });
                continue;
            }
            self.shared.slot_freed.wait(&mut state);
        }

        let index = state.slots.claim_next(size);
        debug!(slot = index, size, "fragment started");
        if !state.segment_sent {
            state.segment_sent = true;
            state.pending_event = Some(SegmentEvent::bytes(0, None));
        }
        self.shared.data_added.notify_all();
        drop(state);

        outbox.push(HlsEvent::Resume.into());
        self.shared.post(outbox);
        true
    }

    /// Handle an event arriving from downstream. Seeks are not served from
    /// the fragment ring and go straight to the fetcher.
    pub fn src_event(&self, event: StreamEvent) -> bool {
        self.shared.upstream.push_event(event)
    }
}

impl Drop for HlsBuffer {
    fn drop(&mut self) {
        self.deactivate();
    }
}
