use crate::compiler::CompileError;
use crate::fs::FsError;
use crate::targets::CompileTarget;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hint appended to every missing-output-directory notice
pub const SETTINGS_HINT: &str = "You can add CSS output directories to the profile in lesswatch.json.";

/// Why a target failed to compile
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureDetail {
    /// The compiler rejected the source
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Reading the source or writing the output failed
    #[error("{message}")]
    Io { path: PathBuf, message: String },

    /// The source is not valid UTF-8
    #[error("{message}")]
    Encoding { path: PathBuf, message: String },
}

impl From<FsError> for FailureDetail {
    fn from(error: FsError) -> Self {
        Self::Io { path: error.path().to_path_buf(), message: error.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "kebab-case")]
pub enum CompileStatus {
    Success,
    Failed(FailureDetail),
    SkippedNoOutputDirs,
}

/// Outcome of compiling one target, or of skipping one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileResult {
    pub source: PathBuf,

    /// Absent when the source was skipped before any target existed
    pub target: Option<CompileTarget>,

    #[serde(flatten)]
    pub status: CompileStatus,
}

impl CompileResult {
    pub fn succeeded(target: CompileTarget) -> Self {
        Self { source: target.source().to_path_buf(), target: Some(target), status: CompileStatus::Success }
    }

    pub fn failed(target: CompileTarget, detail: impl Into<FailureDetail>) -> Self {
        Self {
            source: target.source().to_path_buf(),
            target: Some(target),
            status: CompileStatus::Failed(detail.into()),
        }
    }

    pub fn skipped(source: impl Into<PathBuf>) -> Self {
        Self { source: source.into(), target: None, status: CompileStatus::SkippedNoOutputDirs }
    }

    pub fn is_success(&self) -> bool {
        self.status == CompileStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, CompileStatus::Failed(_))
    }
}

/// Files of one batch that could not be compiled for lack of an output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSkipSummary {
    pub missing: usize,
    pub total: usize,
}

impl BatchSkipSummary {
    pub fn new(missing: usize, total: usize) -> Self {
        Self { missing, total }
    }

    pub fn title(&self) -> &'static str {
        if self.missing == 1 {
            "Missing CSS Output Directory"
        } else {
            "Missing CSS Output Directories"
        }
    }

    pub fn message(&self) -> String {
        match (self.missing, self.total) {
            (1, 1) => "The selected LESS file does not have any CSS output directories mapped to it \
                       and cannot be compiled."
                .to_string(),
            (1, total) => format!(
                "1 of the {total} LESS files you selected does not have any CSS output directories \
                 mapped to it and cannot be compiled."
            ),
            (missing, total) => format!(
                "{missing} of the {total} LESS files you selected do not have any CSS output \
                 directories mapped to them and cannot be compiled."
            ),
        }
    }
}

/// Everything the coordinator tells the outside world
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Notification {
    Compiled(CompileResult),
    BatchSkipped(BatchSkipSummary),
}

/// Receives compile outcomes for display.
///
/// Called from compile worker threads; implementations must not block for long.
pub trait Reporter: Send + Sync {
    fn report(&self, notification: &Notification);
}

/// Human readable output on stdout/stderr
pub struct TextReporter {
    cwd: PathBuf,
}

impl TextReporter {
    /// Paths are printed relative to `cwd` when possible
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.cwd).unwrap_or(path)
    }
}

impl Reporter for TextReporter {
    fn report(&self, notification: &Notification) {
        match notification {
            Notification::Compiled(result) => {
                let source = self.relative(&result.source).display();
                match (&result.status, &result.target) {
                    (CompileStatus::Success, Some(target)) => {
                        println!("  compiled {source} -> {}", self.relative(target.output_file()).display());
                    }
                    (CompileStatus::Success, None) => println!("  compiled {source}"),
                    (CompileStatus::Failed(detail), _) => eprintln!("error: {source}: {detail}"),
                    (CompileStatus::SkippedNoOutputDirs, _) => {
                        eprintln!("warning: {source} has no CSS output directories. {SETTINGS_HINT}");
                    }
                }
            }
            Notification::BatchSkipped(summary) => {
                eprintln!("warning: {}\n  {}\n  {SETTINGS_HINT}", summary.title(), summary.message());
            }
        }
    }
}

/// One JSON object per line on stdout
#[derive(Debug, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, notification: &Notification) {
        match serde_json::to_string(notification) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("failed to serialize notification: {e}"),
        }
    }
}

/// Forwards notifications to the `tracing` log
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, notification: &Notification) {
        match notification {
            Notification::Compiled(result) => match &result.status {
                CompileStatus::Success => tracing::info!(source = %result.source.display(), "compiled"),
                CompileStatus::Failed(detail) => {
                    tracing::error!(source = %result.source.display(), "compile failed: {detail}");
                }
                CompileStatus::SkippedNoOutputDirs => {
                    tracing::warn!(source = %result.source.display(), "no CSS output directories");
                }
            },
            Notification::BatchSkipped(summary) => tracing::warn!("{}", summary.message()),
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn results(&self) -> Vec<CompileResult> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Compiled(result) => Some(result.clone()),
                Notification::BatchSkipped(_) => None,
            })
            .collect()
    }

    pub fn batch_summaries(&self) -> Vec<BatchSkipSummary> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::BatchSkipped(summary) => Some(*summary),
                Notification::Compiled(_) => None,
            })
            .collect()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, notification: &Notification) {
        self.notifications.lock().push(notification.clone());
    }
}
