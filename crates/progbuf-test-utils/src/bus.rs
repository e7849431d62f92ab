//! Synchronous view of an [`EventBus`] for assertions.

use std::time::Duration;

use progbuf_events::{BufferEvent, Event, EventBus, HlsEvent};
use tokio::sync::broadcast::{Receiver, error::TryRecvError};

use crate::wait_until;

/// Collects every message posted on a bus since the probe was created.
pub struct BusProbe {
    rx: Receiver<Event>,
    seen: Vec<Event>,
}

impl BusProbe {
    #[must_use]
    pub fn new(bus: &EventBus) -> Self {
        Self {
            rx: bus.subscribe(),
            seen: Vec::new(),
        }
    }

    fn pump(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.seen.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    panic!("bus probe lagged by {skipped} messages");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return,
            }
        }
    }

    /// All messages received so far.
    pub fn events(&mut self) -> &[Event] {
        self.pump();
        &self.seen
    }

    /// Take the received messages, leaving the probe empty.
    pub fn drain(&mut self) -> Vec<Event> {
        self.pump();
        std::mem::take(&mut self.seen)
    }

    /// Wait until a message matching `pred` has been received.
    pub fn wait_for(&mut self, timeout: Duration, pred: impl Fn(&Event) -> bool) -> bool {
        wait_until(timeout, || {
            self.pump();
            self.seen.iter().any(&pred)
        })
    }

    pub fn count(&mut self, pred: impl Fn(&Event) -> bool) -> usize {
        self.pump();
        self.seen.iter().filter(|event| pred(event)).count()
    }

    /// Buffering-progress messages as `(start, position, stop, eos)`.
    pub fn progress(&mut self) -> Vec<(u64, u64, Option<u64>, bool)> {
        self.pump();
        self.seen
            .iter()
            .filter_map(|event| match event {
                Event::Buffer(BufferEvent::BufferingProgress {
                    start,
                    position,
                    stop,
                    eos,
                }) => Some((*start, *position, *stop, *eos)),
                _ => None,
            })
            .collect()
    }

    pub fn hls(&mut self) -> Vec<HlsEvent> {
        self.pump();
        self.seen
            .iter()
            .filter_map(|event| match event {
                Event::Hls(event) => Some(*event),
                Event::Buffer(_) => None,
            })
            .collect()
    }
}
