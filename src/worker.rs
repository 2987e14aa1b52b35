//! Offscreen decode/group worker.
//!
//! Decoding thousands of records per second must not occupy the thread
//! responsible for interactive latency, so a dedicated OS thread owns the
//! [`StreamGrouper`] and all decode work. Control messages go in over a
//! crossbeam channel and are processed strictly in send order; grouped
//! batches come back on an ordered tokio channel, tagged with the generation
//! set by the last `reset` so a controller can discard output that belongs
//! to a superseded run.

use crate::display::{DisplayItem, StreamGrouper};
use crate::error::{Result, RgviewError};
use crate::event::{decode_line, Event};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

/// Flush to the controller at this many buffered events...
pub const WORKER_BATCH_SIZE: usize = 500;
/// ...or this long after the first unflushed event, whichever comes first.
pub const WORKER_BATCH_INTERVAL: Duration = Duration::from_millis(50);

/// One decoded, grouped batch of output.
#[derive(Debug)]
pub struct WorkerBatch {
    /// Generation of the run this batch belongs to.
    pub generation: u64,
    /// Decoded events, in stream order.
    pub events: Vec<Event>,
    /// Display items produced by the grouper for those events.
    pub items: Vec<DisplayItem>,
}

enum WorkerMsg {
    Reset {
        generation: u64,
        ack: oneshot::Sender<()>,
    },
    Data(Vec<String>),
    Flush {
        ack: Option<oneshot::Sender<()>>,
    },
}

/// Handle to the background decode/group thread.
///
/// Dropping the handle closes the control channel and joins the thread.
pub struct GroupingWorker {
    ctrl: Option<Sender<WorkerMsg>>,
    thread: Option<JoinHandle<()>>,
}

impl GroupingWorker {
    /// Spawn the worker thread. Output batches arrive on `out` in the order
    /// the worker produced them.
    pub fn spawn(out: mpsc::UnboundedSender<WorkerBatch>) -> Result<Self> {
        let (ctrl, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("rgview-grouper".to_string())
            .spawn(move || worker_loop(rx, out))?;
        Ok(Self {
            ctrl: Some(ctrl),
            thread: Some(thread),
        })
    }

    fn sender(&self) -> Result<&Sender<WorkerMsg>> {
        self.ctrl.as_ref().ok_or(RgviewError::WorkerGone)
    }

    /// Clear all accumulated state and start tagging output with
    /// `generation`. Resolves once the worker has acknowledged, at which
    /// point every batch of the previous generation has already been
    /// emitted.
    pub async fn reset(&self, generation: u64) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.sender()?
            .send(WorkerMsg::Reset { generation, ack })
            .map_err(|_| RgviewError::WorkerGone)?;
        done.await.map_err(|_| RgviewError::WorkerGone)
    }

    /// Queue a batch of raw output lines for decoding.
    pub fn send_data(&self, lines: Vec<String>) -> Result<()> {
        self.sender()?
            .send(WorkerMsg::Data(lines))
            .map_err(|_| RgviewError::WorkerGone)
    }

    /// Force emission of whatever has accumulated.
    pub fn flush(&self) -> Result<()> {
        self.sender()?
            .send(WorkerMsg::Flush { ack: None })
            .map_err(|_| RgviewError::WorkerGone)
    }

    /// Flush and resolve once the flushed batch has been emitted. Used at
    /// end-of-run so the controller can finalize against complete counts.
    pub async fn flush_acked(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.sender()?
            .send(WorkerMsg::Flush { ack: Some(ack) })
            .map_err(|_| RgviewError::WorkerGone)?;
        done.await.map_err(|_| RgviewError::WorkerGone)
    }
}

impl Drop for GroupingWorker {
    fn drop(&mut self) {
        drop(self.ctrl.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct WorkerState {
    grouper: StreamGrouper,
    generation: u64,
    events: Vec<Event>,
    items: Vec<DisplayItem>,
    deadline: Option<Instant>,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            grouper: StreamGrouper::new(),
            generation: 0,
            events: Vec::new(),
            items: Vec::new(),
            deadline: None,
        }
    }

    fn reset(&mut self, generation: u64) {
        self.grouper.reset();
        self.generation = generation;
        self.events.clear();
        self.items.clear();
        self.deadline = None;
    }

    fn flush(&mut self, out: &mpsc::UnboundedSender<WorkerBatch>) {
        self.deadline = None;
        if self.events.is_empty() && self.items.is_empty() {
            return;
        }
        let batch = WorkerBatch {
            generation: self.generation,
            events: std::mem::take(&mut self.events),
            items: std::mem::take(&mut self.items),
        };
        if out.send(batch).is_err() {
            debug!("controller receiver gone, dropping batch");
        }
    }
}

fn worker_loop(rx: Receiver<WorkerMsg>, out: mpsc::UnboundedSender<WorkerBatch>) {
    let mut state = WorkerState::new();

    loop {
        let msg = match state.deadline {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            },
        };

        match msg {
            // Timer fired with no message: emit the pending batch.
            None => state.flush(&out),
            Some(WorkerMsg::Reset { generation, ack }) => {
                state.reset(generation);
                let _ = ack.send(());
            }
            Some(WorkerMsg::Data(lines)) => {
                for line in &lines {
                    if let Some(event) = decode_line(line) {
                        state.grouper.accept(&event, &mut state.items);
                        state.events.push(event);
                    }
                }
                if state.events.len() >= WORKER_BATCH_SIZE {
                    state.flush(&out);
                } else if !state.events.is_empty() && state.deadline.is_none() {
                    state.deadline = Some(Instant::now() + WORKER_BATCH_INTERVAL);
                }
            }
            Some(WorkerMsg::Flush { ack }) => {
                state.flush(&out);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
        }
    }
}
