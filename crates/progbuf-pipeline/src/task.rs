#![forbid(unsafe_code)]

//! Pausable delivery thread.
//!
//! A [`Task`] owns one named OS thread that calls its body in a loop while
//! `Started`, parks while `Paused` and exits when `Stopped`. Each call of the
//! body runs under the task's stream lock, so pausing from another thread
//! returns only after the running iteration has finished. Pausing from inside
//! the body (the task thread itself) just flips the state.
//!
//! The body may block on its element's condition variable; whoever pauses or
//! stops the task must first wake it (set a non-`Ok` flow state and notify).

use std::{
    fmt, io,
    sync::Arc,
    thread::{self, JoinHandle, ThreadId},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

type Body = Box<dyn FnMut(&TaskControl) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Started,
    Paused,
    Stopped,
}

struct ControlState {
    state: TaskState,
    running: bool,
    thread: Option<ThreadId>,
}

struct Control {
    state: Mutex<ControlState>,
    condvar: Condvar,
}

/// Handle given to the task body to change the task state from inside.
#[derive(Clone)]
pub struct TaskControl {
    inner: Arc<Control>,
}

impl fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("state", &self.state())
            .finish()
    }
}

impl TaskControl {
    pub fn state(&self) -> TaskState {
        self.inner.state.lock().state
    }

    /// Park the task after the current iteration.
    pub fn pause(&self) {
        self.set_state(TaskState::Paused);
    }

    /// Exit the task thread after the current iteration.
    pub fn stop(&self) {
        self.set_state(TaskState::Stopped);
    }

    fn set_state(&self, state: TaskState) {
        let mut guard = self.inner.state.lock();
        if guard.state == TaskState::Stopped && state == TaskState::Paused {
            return;
        }
        guard.state = state;
        self.inner.condvar.notify_all();
    }

    fn on_task_thread(&self) -> bool {
        self.inner.state.lock().thread == Some(thread::current().id())
    }
}

/// Delivery task driving an element's loop function.
pub struct Task {
    name: String,
    control: TaskControl,
    body: Arc<Mutex<Body>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Task {
    /// Create a stopped task. Nothing runs until [`Task::start`].
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&TaskControl) + Send + 'static,
    {
        Self {
            name: name.into(),
            control: TaskControl {
                inner: Arc::new(Control {
                    state: Mutex::new(ControlState {
                        state: TaskState::Stopped,
                        running: false,
                        thread: None,
                    }),
                    condvar: Condvar::new(),
                }),
            },
            body: Arc::new(Mutex::new(Box::new(body))),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    /// Start (or resume) the task, spawning its thread if none is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS thread cannot be spawned.
    pub fn start(&self) -> io::Result<()> {
        let mut guard = self.control.inner.state.lock();
        guard.state = TaskState::Started;
        self.control.inner.condvar.notify_all();
        if guard.running {
            return Ok(());
        }

        let control = self.control.clone();
        let body = Arc::clone(&self.body);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(&control, &body))?;
        guard.running = true;
        guard.thread = Some(handle.thread().id());
        drop(guard);

        debug!(task = %self.name, "task thread spawned");
        // A previous thread that already left its loop is simply detached.
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Pause the task. Off the task thread this waits for the running
    /// iteration to finish.
    pub fn pause(&self) {
        self.control.pause();
        if !self.control.on_task_thread() {
            drop(self.body.lock());
        }
        trace!(task = %self.name, "task paused");
    }

    /// Stop the task and wait for its thread to exit.
    ///
    /// Called from the task thread itself this only stops it.
    pub fn join(&self) {
        self.control.stop();
        if self.control.on_task_thread() {
            return;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                debug!(task = %self.name, "task thread panicked");
            }
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.join();
    }
}

fn run(control: &TaskControl, body: &Mutex<Body>) {
    loop {
        {
            let mut guard = control.inner.state.lock();
            while guard.state == TaskState::Paused {
                control.inner.condvar.wait(&mut guard);
            }
            if guard.state == TaskState::Stopped {
                guard.running = false;
                guard.thread = None;
                return;
            }
        }

        let mut body = body.lock();
        (&mut **body)(control);
    }
}
