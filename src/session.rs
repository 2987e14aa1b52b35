//! Search session controller.
//!
//! Owns the one-at-a-time search lifecycle end to end: starting a run tears
//! down the previous process and resets the worker before any state is
//! cleared, accumulation is append-only so display indices stay correlated,
//! and completion derives duration, limit detection and the initial
//! selection. All state transitions happen on the interactive side,
//! sequenced by incoming messages; the controller is the single owner of the
//! current process handle and the worker, so no other call site can race a
//! cancel or reset.

use crate::display::{self, DisplayItem, ResultsFilter};
use crate::error::{Result, RgviewError};
use crate::event::Event;
use crate::pipeline::{Completion, IngestionPipeline, PipelineEvent, RunHandle, SearchOptions};
use crate::settings::SettingsStore;
use crate::virtual_list::VirtualList;
use crate::worker::{GroupingWorker, WorkerBatch};
use log::{debug, info, warn};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Errored,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Errored
        )
    }
}

/// Per-search toggles the shell passes alongside the query. Exclusions and
/// the match cap come from the settings store at run start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchToggles {
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub regex: bool,
}

/// Derived stats surfaced next to the results list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub total_matches: usize,
    pub distinct_files: usize,
    pub duration: Option<Duration>,
}

enum Update {
    Pipe(Option<PipelineEvent>),
    Batch(Option<WorkerBatch>),
}

pub struct SearchController {
    pipeline: IngestionPipeline,
    store: Arc<dyn SettingsStore>,
    worker: GroupingWorker,
    batches_rx: mpsc::UnboundedReceiver<WorkerBatch>,

    state: SessionState,
    generation: u64,
    run: Option<RunHandle>,
    pipe_rx: Option<mpsc::UnboundedReceiver<PipelineEvent>>,
    query: String,
    root: PathBuf,
    options: SearchOptions,
    started_at: Option<Instant>,

    results: Vec<Event>,
    display_items: Vec<DisplayItem>,
    row_index: VirtualList,
    selected: Option<usize>,
    limit_reached: bool,
    duration: Option<Duration>,
    last_error: Option<String>,
}

impl SearchController {
    pub fn new(pipeline: IngestionPipeline, store: Arc<dyn SettingsStore>) -> Result<Self> {
        let (batches_tx, batches_rx) = mpsc::unbounded_channel();
        let worker = GroupingWorker::spawn(batches_tx)?;
        Ok(Self {
            pipeline,
            store,
            worker,
            batches_rx,
            state: SessionState::Idle,
            generation: 0,
            run: None,
            pipe_rx: None,
            query: String::new(),
            root: PathBuf::new(),
            options: SearchOptions::default(),
            started_at: None,
            results: Vec::new(),
            display_items: Vec::new(),
            row_index: VirtualList::new(),
            selected: None,
            limit_reached: false,
            duration: None,
            last_error: None,
        })
    }

    /// Start a new search, superseding any run in flight.
    ///
    /// The previous process is cancelled and its teardown awaited, then the
    /// worker is reset and acknowledged, and only then is accumulated state
    /// cleared and the new process spawned. Output of the superseded run can
    /// still be in flight at that point; it carries the old generation and
    /// is discarded on arrival.
    pub async fn start_search(
        &mut self,
        query: &str,
        root: impl AsRef<Path>,
        toggles: SearchToggles,
    ) -> Result<()> {
        let root = root.as_ref();

        if let Some(run) = self.run.take() {
            debug!("superseding live run (generation {})", self.generation);
            run.cancel().await;
        }
        self.pipe_rx = None;

        self.generation += 1;
        self.worker.reset(self.generation).await?;

        // Cleared before the new run's first data can arrive, so no stale
        // results flash into view.
        self.results.clear();
        self.display_items.clear();
        self.row_index.clear();
        self.selected = None;
        self.limit_reached = false;
        self.duration = None;
        self.last_error = None;

        let settings = self.store.settings();
        self.options = SearchOptions {
            case_sensitive: toggles.case_sensitive,
            whole_word: toggles.whole_word,
            regex: toggles.regex,
            exclusions: settings.exclusions,
            max_results: settings.max_results,
        };
        self.query = query.to_string();
        self.root = root.to_path_buf();

        if let Err(e) = self.store.record_search(query, &root.display().to_string()) {
            warn!("failed to record search history: {e}");
        }

        self.started_at = Some(Instant::now());
        let (pipe_tx, pipe_rx) = mpsc::unbounded_channel();
        match self.pipeline.start(query, root, &self.options, pipe_tx) {
            Ok(run) => {
                info!(
                    "search started (generation {}): {:?} under {}",
                    self.generation,
                    query,
                    root.display()
                );
                self.run = Some(run);
                self.pipe_rx = Some(pipe_rx);
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => {
                self.duration = self.started_at.map(|t| t.elapsed());
                self.last_error = Some(e.to_string());
                self.state = SessionState::Errored;
                Err(e)
            }
        }
    }

    /// Cancel the run in flight. Duration is recorded at the moment of
    /// cancellation; results that already arrived stay visible.
    pub async fn stop(&mut self) {
        if !self.state.is_running() {
            return;
        }
        if let Some(run) = self.run.take() {
            run.cancel().await;
        }

        // Forward what the pipeline flushed during teardown, then drain the
        // worker so the partial accumulation is complete and timers are gone.
        if let Some(mut pipe_rx) = self.pipe_rx.take() {
            while let Ok(event) = pipe_rx.try_recv() {
                if let PipelineEvent::Chunk(lines) = event {
                    let _ = self.worker.send_data(lines);
                }
            }
        }
        if self.worker.flush_acked().await.is_err() {
            warn!("worker did not acknowledge flush during stop");
        }
        self.drain_batches();

        self.duration = self.started_at.map(|t| t.elapsed());
        self.state = SessionState::Cancelled;
        info!("search cancelled (generation {})", self.generation);
    }

    /// Process messages until the session reaches a terminal state.
    pub async fn run_to_completion(&mut self) -> SessionState {
        while self.state.is_running() {
            self.pump_once().await;
        }
        self.state
    }

    /// Await and apply the next pipeline or worker message.
    pub async fn pump_once(&mut self) {
        let update = match self.pipe_rx.as_mut() {
            Some(pipe_rx) => tokio::select! {
                event = pipe_rx.recv() => Update::Pipe(event),
                batch = self.batches_rx.recv() => Update::Batch(batch),
            },
            None => Update::Batch(self.batches_rx.recv().await),
        };

        match update {
            Update::Pipe(Some(PipelineEvent::Chunk(lines))) => {
                if self.worker.send_data(lines).is_err() {
                    self.fail(RgviewError::WorkerGone.to_string()).await;
                }
            }
            Update::Pipe(Some(PipelineEvent::Finished(completion))) => {
                self.finalize(completion).await;
            }
            Update::Pipe(Some(PipelineEvent::Failed(text))) => {
                self.fail(text).await;
            }
            Update::Pipe(None) => {
                // Stream task ended without a terminal event (aborted
                // teardown). Treat as cancellation.
                self.pipe_rx = None;
                if self.state.is_running() {
                    self.duration = self.started_at.map(|t| t.elapsed());
                    self.state = SessionState::Cancelled;
                }
            }
            Update::Batch(Some(batch)) => self.apply_batch(batch),
            Update::Batch(None) => {}
        }
    }

    fn apply_batch(&mut self, batch: WorkerBatch) {
        if batch.generation != self.generation {
            debug!(
                "discarding stale batch (generation {} != {})",
                batch.generation, self.generation
            );
            return;
        }
        self.results.extend(batch.events);
        self.row_index.extend_for_items(&batch.items);
        self.display_items.extend(batch.items);
    }

    fn drain_batches(&mut self) {
        while let Ok(batch) = self.batches_rx.try_recv() {
            self.apply_batch(batch);
        }
    }

    async fn finalize(&mut self, completion: Completion) {
        // Everything the pipeline emitted is already queued to the worker;
        // the acknowledged flush guarantees the final partial batch has been
        // sent back before counts are derived.
        if self.worker.flush_acked().await.is_err() {
            self.fail(RgviewError::WorkerGone.to_string()).await;
            return;
        }
        self.drain_batches();
        self.pipe_rx = None;
        self.run = None;

        // Prefer the tool's own elapsed time; it excludes scheduling jitter
        // on this side. Cancelled runs never produce a summary, hence the
        // wall-clock fallback.
        let reported = self
            .results
            .iter()
            .rev()
            .find_map(|e| e.summary())
            .and_then(|s| s.elapsed_total.as_ref())
            .map(|e| e.as_duration());
        self.duration = reported.or_else(|| self.started_at.map(|t| t.elapsed()));

        let total = display::match_count(&self.results);
        self.limit_reached = completion.cap_hit || total >= self.options.match_cap();

        if self.selected.is_none() {
            self.selected = self.results.iter().position(|e| e.is_match());
        }

        self.state = if completion.cancelled {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        info!(
            "search finished (generation {}): {total} matches, limit_reached={}",
            self.generation, self.limit_reached
        );
    }

    async fn fail(&mut self, text: String) {
        // Keep whatever arrived before the failure visible.
        if self.worker.flush_acked().await.is_ok() {
            self.drain_batches();
        }
        self.pipe_rx = None;
        self.run = None;
        self.duration = self.started_at.map(|t| t.elapsed());
        self.last_error = Some(text);
        self.state = SessionState::Errored;
    }

    // --- selection -------------------------------------------------------

    /// Select the match event at `index` in the flat results sequence.
    pub fn select(&mut self, index: usize) -> bool {
        match self.results.get(index) {
            Some(event) if event.is_match() => {
                self.selected = Some(index);
                true
            }
            _ => false,
        }
    }

    /// Move the selection to the next match event.
    pub fn select_next(&mut self) {
        let from = self.selected.map(|i| i + 1).unwrap_or(0);
        if let Some(offset) = self.results[from.min(self.results.len())..]
            .iter()
            .position(|e| e.is_match())
        {
            self.selected = Some(from + offset);
        }
    }

    /// Move the selection to the previous match event.
    pub fn select_prev(&mut self) {
        let Some(current) = self.selected else {
            return self.select_next();
        };
        if let Some(index) = self.results[..current]
            .iter()
            .rposition(|e| e.is_match())
        {
            self.selected = Some(index);
        }
    }

    /// Position of the selected match in the display-item sequence, for
    /// `scroll_to_item`.
    pub fn selected_display_index(&self) -> Option<usize> {
        let selected = self.selected?;
        self.display_items.iter().position(
            |item| matches!(item, DisplayItem::Match { original_index } if *original_index == selected),
        )
    }

    // --- accessors -------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Monotonic identity token of the current (or last) run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The flat accumulated results sequence, in stream order.
    pub fn results(&self) -> &[Event] {
        &self.results
    }

    /// The render-ready sequence from the streaming grouper.
    pub fn display_items(&self) -> &[DisplayItem] {
        &self.display_items
    }

    /// Display items under an ad-hoc client-side filter. An empty filter
    /// returns the streamed sequence as-is; otherwise the accumulation is
    /// re-grouped, which also fills in per-file counts.
    pub fn display_items_filtered(&self, filter: &ResultsFilter) -> Cow<'_, [DisplayItem]> {
        if filter.is_empty() {
            Cow::Borrowed(&self.display_items)
        } else {
            Cow::Owned(display::regroup(&self.results, filter))
        }
    }

    /// Row-offset index kept in lockstep with [`display_items`](Self::display_items).
    pub fn row_index(&self) -> &VirtualList {
        &self.row_index
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn limit_reached(&self) -> bool {
        self.limit_reached
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            total_matches: display::match_count(&self.results),
            distinct_files: display::distinct_files(&self.results),
            duration: self.duration,
        }
    }
}
