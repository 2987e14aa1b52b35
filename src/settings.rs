//! Settings entity, persistence interface, and search history.
//!
//! The core never touches ambient global state: the store is an injected
//! collaborator handed to the session controller, which reads `exclusions`
//! and `max_results` at run start and records history entries. Everything
//! else is pass-through state for the embedding shell.

use crate::error::{Result, RgviewError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Base,
    Large,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Glob patterns excluded from every search.
    pub exclusions: Vec<String>,
    /// Configured total-match cap. `None` defers to the pipeline's safety
    /// cap. Serialized as an absent key when unlimited (TOML has no null),
    /// so the field default must stay `None` rather than the fresh-store
    /// default.
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Debounce applied by the shell between keystroke and search start.
    pub search_delay_ms: u64,
    pub default_search_path: Option<PathBuf>,
    pub editor_path: Option<PathBuf>,
    pub theme: Theme,
    pub font_size: FontSize,
    pub preview_lines: usize,
    pub show_line_numbers: bool,
    pub auto_open_preview: bool,
    pub confirm_before_replace: bool,
    pub clear_results_on_new_search: bool,
    pub max_history_items: usize,
    pub save_search_history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exclusions: vec!["node_modules".to_string(), ".git".to_string()],
            max_results: Some(10_000),
            search_delay_ms: 300,
            default_search_path: None,
            editor_path: None,
            theme: Theme::default(),
            font_size: FontSize::default(),
            preview_lines: 5,
            show_line_numbers: true,
            auto_open_preview: true,
            confirm_before_replace: true,
            clear_results_on_new_search: true,
            max_history_items: 100,
            save_search_history: true,
        }
    }
}

/// One remembered search. `timestamp` is unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub path: String,
    pub timestamp: i64,
}

/// Injected persistence collaborator for settings and search history.
pub trait SettingsStore: Send + Sync {
    fn settings(&self) -> Settings;
    fn set_settings(&self, settings: Settings) -> Result<()>;
    fn history(&self) -> Vec<HistoryEntry>;
    fn set_history(&self, history: Vec<HistoryEntry>) -> Result<()>;

    /// Record a search: most recent first, deduplicated on (query, path),
    /// truncated to the configured cap. A no-op when history is disabled.
    fn record_search(&self, query: &str, path: &str) -> Result<()> {
        let settings = self.settings();
        if !settings.save_search_history {
            return Ok(());
        }
        let mut history = self.history();
        history.retain(|h| h.query != query || h.path != path);
        history.insert(
            0,
            HistoryEntry {
                query: query.to_string(),
                path: path.to_string(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
        history.truncate(settings.max_history_items);
        self.set_history(history)
    }

    fn clear_history(&self) -> Result<()> {
        self.set_history(Vec::new())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PersistedState {
    settings: Settings,
    history: Vec<HistoryEntry>,
}

/// In-memory store for tests and ephemeral embeddings.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<(Settings, Vec<HistoryEntry>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            state: Mutex::new((settings, Vec::new())),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn settings(&self) -> Settings {
        self.state.lock().0.clone()
    }

    fn set_settings(&self, settings: Settings) -> Result<()> {
        self.state.lock().0 = settings;
        Ok(())
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().1.clone()
    }

    fn set_history(&self, history: Vec<HistoryEntry>) -> Result<()> {
        self.state.lock().1 = history;
        Ok(())
    }
}

/// TOML-file-backed store under the platform config directory.
pub struct TomlStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl TomlStore {
    /// Default location: `<config dir>/rgview/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rgview/settings.toml"))
    }

    /// Open the store at `path`, reading existing state or starting from
    /// defaults when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)
                .map_err(|e| RgviewError::Store(format!("failed to parse {}: {e}", path.display())))?
        } else {
            PersistedState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        let content = toml::to_string_pretty(state)
            .map_err(|e| RgviewError::Store(format!("failed to serialize settings: {e}")))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SettingsStore for TomlStore {
    fn settings(&self) -> Settings {
        self.state.lock().settings.clone()
    }

    fn set_settings(&self, settings: Settings) -> Result<()> {
        let mut state = self.state.lock();
        state.settings = settings;
        self.save(&state)
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().history.clone()
    }

    fn set_history(&self, history: Vec<HistoryEntry>) -> Result<()> {
        let mut state = self.state.lock();
        state.history = history;
        self.save(&state)
    }
}
