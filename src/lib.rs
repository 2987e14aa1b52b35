//! Engine crate for a streaming search front-end.
//!
//! Wraps an external line-oriented search tool (ripgrep with `--json`
//! output) behind a pipeline that can ingest an unbounded result stream
//! without blocking the interactive surface: process ingestion with
//! cancellation and a total-match cap ([`pipeline`]), an offscreen
//! decode/group worker ([`worker`]), a virtual-scroll row index
//! ([`virtual_list`]) and a single-flight session controller ([`session`]).

pub mod display;
pub mod error;
pub mod event;
pub mod export;
pub mod fsio;
pub mod pipeline;
pub mod session;
pub mod settings;
pub mod virtual_list;
pub mod worker;

pub use display::{DisplayItem, ResultsFilter, StreamGrouper};
pub use error::{Result, RgviewError};
pub use event::{decode_line, Event};
pub use fsio::{FileAccess, LocalFiles};
pub use pipeline::{IngestionPipeline, PipelineEvent, RunHandle, SearchOptions};
pub use session::{SearchController, SearchToggles, SessionState, SessionStats};
pub use settings::{HistoryEntry, MemoryStore, Settings, SettingsStore, TomlStore};
pub use virtual_list::{PositionedRow, Viewport, VirtualList};
pub use worker::{GroupingWorker, WorkerBatch};

use env_logger::{Builder, Env, Target};
use std::fs;
use std::path::Path;

/// Opt-in logging initializer for embedding shells.
///
/// Respects `RUST_LOG`, defaults to `info`, and writes to stderr or to
/// `log_path` when given.
pub fn init_logging(log_path: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = log_path {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        let log_file = fs::File::create(log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| RgviewError::Other(e.to_string()))?;
    Ok(())
}
