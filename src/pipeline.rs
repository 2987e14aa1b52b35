//! Ingestion of the external search process's output stream.
//!
//! The pipeline owns the process lifecycle: deterministic argument
//! construction, spawn, raw line streaming with dual-threshold batching,
//! total-match cap enforcement, and acknowledged teardown. It never decodes
//! records beyond a kind probe for cap accounting; full decoding belongs to
//! the offscreen worker.

use crate::error::{Result, RgviewError};
use crate::event::is_match_record;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Emit a chunk to the caller at this many buffered lines...
pub const PIPELINE_BATCH_SIZE: usize = 1000;
/// ...or this long since the last emission, whichever comes first.
pub const PIPELINE_BATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Safety cap applied when no max-result option is configured. A
/// one-character query over a large tree must not exhaust memory.
pub const DEFAULT_MATCH_CAP: usize = 20_000;

/// Line-length cap passed to the tool, bounding memory on pathological
/// single-line files.
pub const MAX_LINE_COLUMNS: usize = 1000;

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-run option set, resolved by the controller from settings at start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Interpret the query as a regex; otherwise it is literal text.
    pub regex: bool,
    /// Glob patterns excluded from the search, one `--glob !<g>` pair each.
    pub exclusions: Vec<String>,
    /// Total-match cap; `None` falls back to [`DEFAULT_MATCH_CAP`].
    pub max_results: Option<usize>,
}

impl SearchOptions {
    pub fn match_cap(&self) -> usize {
        self.max_results.unwrap_or(DEFAULT_MATCH_CAP)
    }
}

/// Build the tool invocation arguments for one run.
///
/// A query with embedded newlines switches the run into multiline mode. In
/// literal mode the query is regex-escaped per line and the line breaks are
/// joined with a `\r?\n` sub-pattern, so pasted multi-line text matches no
/// matter which line-ending convention the target file uses.
pub fn build_args(query: &str, path: &Path, options: &SearchOptions) -> Vec<String> {
    let mut args = vec!["--json".to_string()];

    if options.case_sensitive {
        args.push("--case-sensitive".to_string());
    } else {
        args.push("--smart-case".to_string());
    }
    if options.whole_word {
        args.push("--word-regexp".to_string());
    }

    let pattern = if query.contains('\n') {
        args.push("--multiline".to_string());
        if options.regex {
            query.to_string()
        } else {
            query
                .split('\n')
                .map(|part| regex::escape(part.strip_suffix('\r').unwrap_or(part)))
                .collect::<Vec<_>>()
                .join("\\r?\\n")
        }
    } else {
        if !options.regex {
            args.push("--fixed-strings".to_string());
        }
        query.to_string()
    };

    for glob in &options.exclusions {
        args.push("--glob".to_string());
        args.push(format!("!{glob}"));
    }

    args.push("--max-columns".to_string());
    args.push(MAX_LINE_COLUMNS.to_string());
    // Keep stdout pure data; per-file warnings would otherwise interleave.
    args.push("--no-messages".to_string());

    args.push(pattern);
    args.push(path.display().to_string());
    args
}

/// How a run's stream ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// `match`-kind records observed by the pipeline.
    pub match_count: usize,
    /// The total-match cap forced early termination.
    pub cap_hit: bool,
    /// Teardown was requested before the stream ended.
    pub cancelled: bool,
}

/// Events emitted to the caller, in stream order, ending with exactly one
/// `Finished` or `Failed`.
#[derive(Debug)]
pub enum PipelineEvent {
    /// A batch of raw, undecoded output lines.
    Chunk(Vec<String>),
    Finished(Completion),
    Failed(String),
}

/// Spawns and streams one search process per [`start`](Self::start) call.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    program: PathBuf,
    batch_size: usize,
    batch_interval: Duration,
}

impl IngestionPipeline {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            batch_size: PIPELINE_BATCH_SIZE,
            batch_interval: PIPELINE_BATCH_INTERVAL,
        }
    }

    /// Override the batching thresholds (latency-sensitive embeddings,
    /// tests).
    pub fn with_batching(mut self, batch_size: usize, batch_interval: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_interval = batch_interval;
        self
    }

    /// Spawn the process and stream its output into `sink`.
    ///
    /// The returned handle is the only way to tear the run down; the caller
    /// owns it for the lifetime of the run. The pipeline itself never tracks
    /// more than the one child it was asked to spawn, so one-live-process
    /// enforcement composes from "cancel the previous handle first".
    pub fn start(
        &self,
        query: &str,
        path: &Path,
        options: &SearchOptions,
        sink: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Result<RunHandle> {
        let args = build_args(query, path, options);
        debug!("spawning {} {:?}", self.program.display(), args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RgviewError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RgviewError::Other("search process has no stdout handle".to_string())
        })?;
        let stderr = child.stderr.take();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let stream = StreamTask {
            child,
            cap: options.match_cap(),
            batch_size: self.batch_size,
            batch_interval: self.batch_interval,
        };
        let task = tokio::spawn(stream.run(stdout, stderr, sink, cancel_rx));

        Ok(RunHandle {
            cancel: Some(cancel_tx),
            task,
        })
    }
}

/// Handle to one live run. Cancellation is cooperative and acknowledged:
/// [`cancel`](Self::cancel) resolves only once the stream task has wound
/// down (or the bounded teardown wait expired and the task was aborted, at
/// which point the child is killed by `kill_on_drop`).
#[derive(Debug)]
pub struct RunHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RunHandle {
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        match tokio::time::timeout(TEARDOWN_TIMEOUT, &mut self.task).await {
            Ok(_) => {}
            Err(_) => {
                warn!("search teardown not acknowledged within {TEARDOWN_TIMEOUT:?}, aborting");
                self.task.abort();
            }
        }
    }

    /// Wait for the run to end on its own.
    pub async fn wait(self) {
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct StreamTask {
    child: Child,
    cap: usize,
    batch_size: usize,
    batch_interval: Duration,
}

impl StreamTask {
    async fn run(
        mut self,
        stdout: tokio::process::ChildStdout,
        stderr: Option<tokio::process::ChildStderr>,
        sink: mpsc::UnboundedSender<PipelineEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        // Drain stderr concurrently so a chatty process cannot deadlock on a
        // full pipe; the text only surfaces on a failed exit.
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(stderr) = stderr {
                let _ = BufReader::new(stderr).read_to_string(&mut text).await;
            }
            text
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut batch: Vec<String> = Vec::new();
        let mut last_emit = Instant::now();
        let mut completion = Completion::default();

        loop {
            let flush_deadline = last_emit + self.batch_interval;
            tokio::select! {
                _ = &mut cancel_rx => {
                    completion.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep_until(flush_deadline), if !batch.is_empty() => {
                    emit_chunk(&sink, &mut batch);
                    last_emit = Instant::now();
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if is_match_record(&line) {
                            completion.match_count += 1;
                        }
                        batch.push(line);
                        if batch.len() >= self.batch_size {
                            emit_chunk(&sink, &mut batch);
                            last_emit = Instant::now();
                        }
                        if completion.match_count >= self.cap {
                            completion.cap_hit = true;
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!("stdout read error: {e}");
                        break;
                    }
                }
            }
        }

        if completion.cancelled || completion.cap_hit {
            if let Err(e) = self.child.start_kill() {
                debug!("kill after {} failed: {e}",
                    if completion.cap_hit { "cap" } else { "cancel" });
            }
        }

        // Flush buffered partial output before signaling completion.
        emit_chunk(&sink, &mut batch);

        let status = self.child.wait().await;
        let diagnostics = stderr_task.await.unwrap_or_default();

        match status {
            Ok(status) => {
                // Exit code 1 is the tool's "no matches" result, not a failure.
                let failed = !status.success()
                    && status.code() != Some(1)
                    && !completion.cancelled
                    && !completion.cap_hit;
                if failed {
                    let text = if diagnostics.trim().is_empty() {
                        format!("search process exited with {status}")
                    } else {
                        diagnostics.trim().to_string()
                    };
                    info!("search run failed: {text}");
                    let _ = sink.send(PipelineEvent::Failed(text));
                } else {
                    let _ = sink.send(PipelineEvent::Finished(completion));
                }
            }
            Err(e) => {
                let _ = sink.send(PipelineEvent::Failed(format!(
                    "failed to reap search process: {e}"
                )));
            }
        }
    }
}

fn emit_chunk(sink: &mpsc::UnboundedSender<PipelineEvent>, batch: &mut Vec<String>) {
    if batch.is_empty() {
        return;
    }
    if sink.send(PipelineEvent::Chunk(std::mem::take(batch))).is_err() {
        debug!("pipeline sink gone, dropping chunk");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn args_for(query: &str, options: &SearchOptions) -> Vec<String> {
        build_args(query, Path::new("/repo"), options)
    }

    #[test]
    fn literal_search_uses_fixed_strings_and_smart_case() {
        let args = args_for("needle", &SearchOptions::default());
        assert!(args.contains(&"--fixed-strings".to_string()));
        assert!(args.contains(&"--smart-case".to_string()));
        assert!(!args.contains(&"--case-sensitive".to_string()));
        assert_eq!(args[args.len() - 2], "needle");
        assert_eq!(args[args.len() - 1], "/repo");
    }

    #[test]
    fn regex_mode_passes_query_unmodified() {
        let options = SearchOptions {
            regex: true,
            ..Default::default()
        };
        let args = args_for(r"fn \w+\(", &options);
        assert!(!args.contains(&"--fixed-strings".to_string()));
        assert_eq!(args[args.len() - 2], r"fn \w+\(");
    }

    #[test]
    fn case_and_word_flags() {
        let options = SearchOptions {
            case_sensitive: true,
            whole_word: true,
            ..Default::default()
        };
        let args = args_for("Needle", &options);
        assert!(args.contains(&"--case-sensitive".to_string()));
        assert!(args.contains(&"--word-regexp".to_string()));
        assert!(!args.contains(&"--smart-case".to_string()));
    }

    #[test]
    fn multiline_literal_is_escaped_and_line_ending_tolerant() {
        let args = args_for("foo(\r\nbar)", &SearchOptions::default());
        assert!(args.contains(&"--multiline".to_string()));
        assert!(!args.contains(&"--fixed-strings".to_string()));
        // Metacharacters escaped, CR stripped, newline widened to \r?\n.
        assert_eq!(args[args.len() - 2], r"foo\(\r?\nbar\)");
    }

    #[test]
    fn exclusions_become_negated_glob_pairs() {
        let options = SearchOptions {
            exclusions: vec!["node_modules".to_string(), "*.min.js".to_string()],
            ..Default::default()
        };
        let args = args_for("x", &options);
        let globs: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--glob")
            .map(|(i, _)| args[i + 1].clone())
            .collect();
        assert_eq!(globs, vec!["!node_modules", "!*.min.js"]);
    }

    #[test]
    fn always_bounds_line_length_and_suppresses_messages() {
        let args = args_for("x", &SearchOptions::default());
        assert!(args.contains(&"--max-columns".to_string()));
        assert!(args.contains(&"--no-messages".to_string()));
        assert_eq!(args[0], "--json");
    }

    #[test]
    fn cap_defaults_when_unset() {
        assert_eq!(SearchOptions::default().match_cap(), DEFAULT_MATCH_CAP);
        let options = SearchOptions {
            max_results: Some(500),
            ..Default::default()
        };
        assert_eq!(options.match_cap(), 500);
    }
}
