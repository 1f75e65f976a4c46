//! Aggregates the per-file download/load events a worker reports during
//! model initialization into a single, throttled global percentage.
//!
//! Grounded on the engine crate's `TaskProgressTracker` / `ProgressManager`
//! pair (clamped percentages, `DashMap`-backed per-key state) generalized
//! from "one tracker per task id" to "one tracker per download file, folded
//! into one global estimate".

use chat_graph::llm::ProgressSink;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    Downloading,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct FileProgress {
    loaded: u64,
    total: u64,
    state: FileState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalPhase {
    Downloading { file: String },
    Processing { message: String },
    Completed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalProgress {
    pub phase: GlobalPhase,
    pub percent: u8,
}

/// Turns a stream of `(file, loaded, total)` events from one or more
/// in-flight downloads into a single monotonically nondecreasing percent,
/// throttled so a UI consumer doesn't get flooded with noise.
pub struct ProgressReporter {
    files: DashMap<String, FileProgress>,
    aliases: DashMap<String, String>,
    last_percent: Mutex<Option<u8>>,
    last_emitted_at: Mutex<Option<Instant>>,
    last_progress: Mutex<Option<GlobalProgress>>,
    done: Mutex<bool>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            aliases: DashMap::new(),
            last_percent: Mutex::new(None),
            last_emitted_at: Mutex::new(None),
            last_progress: Mutex::new(None),
            done: Mutex::new(false),
        }
    }

    /// The most recently computed progress, for a caller outside the
    /// `ProgressSink` callbacks (e.g. a status endpoint polling between
    /// events). Reads as 0%/`Processing` before anything has been reported.
    pub fn snapshot(&self) -> GlobalProgress {
        self.last_progress.lock().clone().unwrap_or(GlobalProgress {
            phase: GlobalPhase::Processing { message: "not started".to_string() },
            percent: 0,
        })
    }

    /// Strip a scheme+host prefix and collapse to a basename, then resolve
    /// against the alias cache: an already-seen name reuses its canonical
    /// key, otherwise a new name that shares a basename with a tracked file
    /// (the longest suffix match) is folded into that file's key, and
    /// failing that the basename itself becomes the canonical key.
    fn canonical_key(&self, observed: &str) -> String {
        if let Some(existing) = self.aliases.get(observed) {
            return existing.clone();
        }

        let basename = observed
            .split("://")
            .last()
            .unwrap_or(observed)
            .rsplit('/')
            .next()
            .unwrap_or(observed)
            .to_string();

        let matched = self
            .files
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key.ends_with(&basename) || basename.ends_with(key.as_str()))
            .max_by_key(|key| key.len());

        let canonical = matched.unwrap_or(basename);
        self.aliases.insert(observed.to_string(), canonical.clone());
        canonical
    }

    fn record_progress(&self, file: &str, loaded: u64, total: u64) -> GlobalProgress {
        let key = self.canonical_key(file);
        self.files.insert(
            key.clone(),
            FileProgress { loaded, total, state: FileState::Downloading },
        );
        self.emit(GlobalPhase::Downloading { file: key })
    }

    fn record_complete(&self, file: &str) -> GlobalProgress {
        let key = self.canonical_key(file);
        self.files
            .entry(key.clone())
            .and_modify(|f| {
                f.state = FileState::Done;
                f.loaded = f.total.max(f.loaded);
            })
            .or_insert(FileProgress { loaded: 1, total: 1, state: FileState::Done });

        let all_done = self.files.iter().all(|entry| entry.state == FileState::Done);
        if all_done {
            self.emit(GlobalPhase::Processing { message: "verifying".to_string() })
        } else {
            self.emit(GlobalPhase::Downloading { file: key })
        }
    }

    pub fn mark_completed(&self) -> GlobalProgress {
        *self.done.lock() = true;
        self.force_emit(GlobalProgress { phase: GlobalPhase::Completed, percent: 100 })
    }

    pub fn mark_error(&self, message: impl Into<String>) -> GlobalProgress {
        self.force_emit(GlobalProgress { phase: GlobalPhase::Error(message.into()), percent: self.current_percent() })
    }

    fn current_percent(&self) -> u8 {
        let total_files = self.files.len();
        if total_files == 0 {
            return 0;
        }

        let known_total: u64 = self.files.iter().filter(|f| f.total > 0).map(|f| f.total).sum();
        let known_count = self.files.iter().filter(|f| f.total > 0).count();
        let unknown_count = total_files - known_count;

        let raw = if known_count == 0 {
            // No file has a known total; fall back to fraction of files done.
            let done = self.files.iter().filter(|f| f.state == FileState::Done).count();
            (done as f64 / total_files as f64) * 100.0
        } else if unknown_count == 0 {
            let loaded: u64 = self.files.iter().map(|f| f.loaded).sum();
            (loaded as f64 / known_total.max(1) as f64) * 100.0
        } else {
            // Mixed: estimate each unknown-total file's size as the average
            // of the known ones, then blend loaded bytes across both sets.
            let avg_known = known_total as f64 / known_count as f64;
            let estimated_total = known_total as f64 + avg_known * unknown_count as f64;
            let loaded: u64 = self.files.iter().map(|f| f.loaded).sum();
            (loaded as f64 / estimated_total.max(1.0)) * 100.0
        };

        raw.clamp(0.0, 100.0) as u8
    }

    /// Apply the monotonic-nondecreasing rule (capped at 99 until a
    /// terminal status) and the throttling rule, returning the progress to
    /// report only when it actually should be emitted.
    fn emit(&self, phase: GlobalPhase) -> GlobalProgress {
        let mut percent = self.current_percent();
        if !*self.done.lock() {
            percent = percent.min(99);
        }

        let mut last_percent = self.last_percent.lock();
        let monotonic = last_percent.map(|p| percent.max(p)).unwrap_or(percent);

        let mut last_emitted_at = self.last_emitted_at.lock();
        let elapsed = last_emitted_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
        let changed = last_percent.map(|p| monotonic != p).unwrap_or(true);
        let terminal = matches!(phase, GlobalPhase::Completed | GlobalPhase::Error(_));

        if !terminal && !changed && elapsed < Duration::from_millis(100) {
            let progress = GlobalProgress { phase, percent: monotonic };
            *self.last_progress.lock() = Some(progress.clone());
            return progress;
        }

        *last_percent = Some(monotonic);
        *last_emitted_at = Some(Instant::now());
        let progress = GlobalProgress { phase, percent: monotonic };
        *self.last_progress.lock() = Some(progress.clone());
        progress
    }

    fn force_emit(&self, progress: GlobalProgress) -> GlobalProgress {
        *self.last_percent.lock() = Some(progress.percent);
        *self.last_emitted_at.lock() = Some(Instant::now());
        *self.last_progress.lock() = Some(progress.clone());
        progress
    }
}

/// Bridges the `ProgressSink` hook an `EmbeddingModel`/`RerankModel` calls
/// during `init` to this reporter. The global, throttled value is discarded
/// here; callers who want it should read `current_percent`-derived snapshots
/// through `ProgressReporter` directly rather than through the sink.
impl ProgressSink for ProgressReporter {
    fn on_progress(&self, file: &str, loaded: u64, total: u64) {
        self.record_progress(file, loaded, total);
    }

    fn on_complete(&self, file: &str) {
        self.record_complete(file);
    }
}
