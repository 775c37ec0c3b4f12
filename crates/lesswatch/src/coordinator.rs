//! Schedules compiles for changed LESS sources.
//!
//! Every `(source, output directory)` pair moves through
//! `Idle -> Compiling -> Idle`. A change arriving while its target compiles
//! parks the target in `Queued`; when the running compile finishes the worker
//! immediately compiles again with fresh source. Only the newest queued
//! request is kept, so any number of saves during one compile cost exactly
//! one extra compile. Different targets compile in parallel on a bounded
//! worker pool.

use crate::compiler::{CompileOptions, Compiler};
use crate::context::ProjectContext;
use crate::fs::{FileSystem, LocalFs};
use crate::matcher::is_included;
use crate::profile::Profile;
use crate::reporter::{
    BatchSkipSummary, CompileResult, CompileStatus, FailureDetail, LogReporter, Notification, Reporter,
};
use crate::targets::{CompileTarget, TargetKey, expand_targets};
use crate::types::{LesswatchError, ProfileId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// What caused a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// A file was saved; honours the profile's compile-automatically flag
    Save,
    /// The user asked to compile one file
    ExplicitAction,
    /// Part of a multi-file compile request
    Batch,
}

/// A source file that needs (re)compiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub source_path: PathBuf,
    /// Logical time; later events supersede earlier ones for the same target
    pub timestamp: u64,
    pub trigger: Trigger,
}

/// Scheduling state of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Idle,
    Compiling,
    Queued,
}

/// How a submitted event affected one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The target was idle and a compile was started
    Started,
    /// The target was compiling; a follow-up compile was queued
    Queued,
    /// A follow-up compile was already queued
    AlreadyQueued,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTarget {
    pub target: CompileTarget,
    pub disposition: Disposition,
}

/// What [`Coordinator::submit`] did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No profile claims the file
    Unresolved,
    /// The owning profile's include/exclude patterns reject the file
    Excluded { profile_id: ProfileId },
    /// A save event for a profile that does not compile on save
    AutoCompileDisabled { profile_id: ProfileId },
    /// The owning profile has no CSS output directories
    MissingOutputDirectories { profile_id: ProfileId },
    Scheduled(Vec<ScheduledTarget>),
}

impl SubmitOutcome {
    /// Whether the file counts as "cannot be compiled" in a batch summary
    fn lacks_output(&self) -> bool {
        matches!(self, Self::Unresolved | Self::MissingOutputDirectories { .. })
    }
}

/// Result of [`Coordinator::submit_batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub outcomes: Vec<(PathBuf, SubmitOutcome)>,
    pub summary: Option<BatchSkipSummary>,
}

/// Running totals since the coordinator was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompileStats {
    pub compiled: usize,
    pub failed: usize,
    pub skipped: usize,
}

struct CompileJob {
    target: CompileTarget,
    /// Snapshot taken at submit time; later profile edits do not affect this job
    profile: Arc<Profile>,
    timestamp: u64,
}

/// Idle targets have no slot
enum Slot {
    Compiling,
    Queued(CompileJob),
}

struct Inner {
    context: Arc<ProjectContext>,
    compiler: Arc<dyn Compiler>,
    fs: Arc<dyn FileSystem>,
    reporter: Arc<dyn Reporter>,
    pool: ThreadPool,
    slots: DashMap<TargetKey, Slot>,
    clock: AtomicU64,
    /// Jobs spawned and not yet finished
    in_flight: Mutex<usize>,
    idle: Condvar,
    compiled: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

pub struct CoordinatorBuilder {
    context: Arc<ProjectContext>,
    compiler: Arc<dyn Compiler>,
    fs: Arc<dyn FileSystem>,
    reporter: Arc<dyn Reporter>,
    workers: Option<usize>,
}

impl CoordinatorBuilder {
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Number of compile workers; defaults to the number of CPUs
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn build(self) -> Result<Coordinator, LesswatchError> {
        let mut pool = ThreadPoolBuilder::new().thread_name(|i| format!("lesswatch-worker-{i}"));
        if let Some(workers) = self.workers {
            pool = pool.num_threads(workers);
        }

        let inner = Inner {
            context: self.context,
            compiler: self.compiler,
            fs: self.fs,
            reporter: self.reporter,
            pool: pool.build()?,
            slots: DashMap::new(),
            clock: AtomicU64::new(0),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            compiled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        };
        Ok(Coordinator { inner: Arc::new(inner) })
    }
}

/// Accepts change events and compiles the affected targets in the background
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Start configuring a coordinator. Defaults to the local file system and
    /// a reporter that writes to the log.
    pub fn builder(context: Arc<ProjectContext>, compiler: Arc<dyn Compiler>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            context,
            compiler,
            fs: Arc::new(LocalFs),
            reporter: Arc::new(LogReporter),
            workers: None,
        }
    }

    pub fn context(&self) -> &Arc<ProjectContext> {
        &self.inner.context
    }

    /// Stamp a new event with the next logical timestamp
    pub fn event(&self, source_path: impl Into<PathBuf>, trigger: Trigger) -> ChangeEvent {
        let timestamp = self.inner.clock.fetch_add(1, Ordering::Relaxed) + 1;
        ChangeEvent { source_path: source_path.into(), timestamp, trigger }
    }

    /// Schedule compiles for every target of the event's source.
    ///
    /// Never blocks on compilation: it only updates target state and hands
    /// work to the pool.
    pub fn submit(&self, event: ChangeEvent) -> SubmitOutcome {
        let inner = &self.inner;
        let Some(source) = inner.context.normalize_source(&event.source_path) else {
            return SubmitOutcome::Unresolved;
        };

        let Some(profile) = inner.context.store().get_profile_for(&source) else {
            tracing::debug!(source = %source.display(), "no profile owns file");
            return SubmitOutcome::Unresolved;
        };
        let profile_id = profile.id();

        if !is_included(&source, &profile) {
            tracing::debug!(source = %source.display(), profile = profile.name(), "excluded by profile patterns");
            return SubmitOutcome::Excluded { profile_id };
        }

        if event.trigger == Trigger::Save && !profile.compile_automatically() {
            return SubmitOutcome::AutoCompileDisabled { profile_id };
        }

        let targets = expand_targets(&source, &profile);
        if targets.is_empty() {
            // Batches report one aggregated summary instead
            if event.trigger != Trigger::Batch {
                inner.skipped.fetch_add(1, Ordering::Relaxed);
                inner.notify(Notification::Compiled(CompileResult::skipped(source)));
            }
            return SubmitOutcome::MissingOutputDirectories { profile_id };
        }

        let scheduled = targets
            .into_iter()
            .map(|target| {
                let job = CompileJob {
                    target: target.clone(),
                    profile: Arc::clone(&profile),
                    timestamp: event.timestamp,
                };
                ScheduledTarget { target, disposition: self.schedule(job) }
            })
            .collect();
        SubmitOutcome::Scheduled(scheduled)
    }

    /// Submit several files as one user action.
    ///
    /// Files without a profile or without output directories are not
    /// reported one by one; a single summary counts them instead.
    pub fn submit_batch(&self, paths: &[PathBuf]) -> BatchOutcome {
        let mut outcomes = Vec::with_capacity(paths.len());
        let mut missing = 0;

        for path in paths {
            let outcome = self.submit(self.event(path.clone(), Trigger::Batch));
            if outcome.lacks_output() {
                missing += 1;
            }
            outcomes.push((path.clone(), outcome));
        }

        let summary = (missing > 0).then(|| BatchSkipSummary::new(missing, paths.len()));
        if let Some(summary) = summary {
            self.inner.skipped.fetch_add(missing, Ordering::Relaxed);
            self.inner.notify(Notification::BatchSkipped(summary));
        }

        BatchOutcome { outcomes, summary }
    }

    fn schedule(&self, job: CompileJob) -> Disposition {
        let inner = &self.inner;
        match inner.slots.entry(job.target.key()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Compiling);
                // Counted before the slot lock is released so waiters never
                // observe a compiling target with nothing in flight
                *inner.in_flight.lock() += 1;
                tracing::debug!(output = %job.target.output_file().display(), "idle -> compiling");

                let worker = Arc::clone(inner);
                inner.pool.spawn(move || worker.run(job));
                Disposition::Started
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if let Slot::Queued(pending) = &mut *slot {
                    if job.timestamp >= pending.timestamp {
                        *pending = job;
                    }
                    return Disposition::AlreadyQueued;
                }
                tracing::debug!(output = %job.target.output_file().display(), "compiling -> queued");
                *slot = Slot::Queued(job);
                Disposition::Queued
            }
        }
    }

    /// Current scheduling state of `target`
    pub fn phase(&self, target: &CompileTarget) -> TargetPhase {
        match self.inner.slots.get(&target.key()).as_deref() {
            None => TargetPhase::Idle,
            Some(Slot::Compiling) => TargetPhase::Compiling,
            Some(Slot::Queued(_)) => TargetPhase::Queued,
        }
    }

    /// Block until every target is idle
    pub fn wait_idle(&self) {
        let mut in_flight = self.inner.in_flight.lock();
        while *in_flight > 0 {
            self.inner.idle.wait(&mut in_flight);
        }
    }

    /// Like [`Coordinator::wait_idle`] but gives up after `timeout`.
    /// Returns true if every target is idle.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let mut in_flight = self.inner.in_flight.lock();
        while *in_flight > 0 {
            if self.inner.idle.wait_for(&mut in_flight, timeout).timed_out() {
                return *in_flight == 0;
            }
        }
        true
    }

    pub fn stats(&self) -> CompileStats {
        CompileStats {
            compiled: self.inner.compiled.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    /// Worker loop for one target: compile, then keep going while newer
    /// requests were queued in the meantime
    fn run(&self, mut job: CompileJob) {
        loop {
            let result = self.compile_one(&job.target, &job.profile);
            match result.status {
                CompileStatus::Success => self.compiled.fetch_add(1, Ordering::Relaxed),
                _ => self.failed.fetch_add(1, Ordering::Relaxed),
            };
            self.notify(Notification::Compiled(result));

            match self.finish(&job.target.key()) {
                Some(next) => job = next,
                None => break,
            }
        }

        let mut in_flight = self.in_flight.lock();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }

    /// Leave the compiling state: hand back the queued job, or go idle
    fn finish(&self, key: &TargetKey) -> Option<CompileJob> {
        let Entry::Occupied(mut occupied) = self.slots.entry(key.clone()) else {
            return None;
        };
        match std::mem::replace(occupied.get_mut(), Slot::Compiling) {
            Slot::Queued(next) => {
                tracing::debug!(output = %next.target.output_file().display(), "queued -> compiling");
                Some(next)
            }
            Slot::Compiling => {
                occupied.remove();
                None
            }
        }
    }

    fn compile_one(&self, target: &CompileTarget, profile: &Profile) -> CompileResult {
        let bytes = match self.fs.read_file(target.source()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("cannot read source: {e}");
                return CompileResult::failed(target.clone(), e);
            }
        };
        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(e) => {
                let detail = FailureDetail::Encoding {
                    path: target.source().to_path_buf(),
                    message: format!("{} is not valid UTF-8: {}", target.source().display(), e.utf8_error()),
                };
                tracing::warn!("cannot decode source: {detail}");
                return CompileResult::failed(target.clone(), detail);
            }
        };

        let options = CompileOptions { compress_output: profile.compress_output() };
        let css = match self.compiler.compile(&source, target.source(), &options) {
            Ok(css) => css,
            Err(e) => {
                tracing::warn!(compiler = self.compiler.name(), "compile failed: {e}");
                return CompileResult::failed(target.clone(), e);
            }
        };

        if let Err(e) = self.fs.write_file_atomic(target.output_file(), css.as_bytes()) {
            tracing::warn!("cannot write output: {e}");
            return CompileResult::failed(target.clone(), e);
        }

        tracing::info!(
            source = %target.source().display(),
            output = %target.output_file().display(),
            profile = profile.name(),
            "compiled"
        );
        CompileResult::succeeded(target.clone())
    }

    /// Forward to the reporter unless the user turned this kind of notice off.
    /// Failures are always reported.
    fn notify(&self, notification: Notification) {
        let prompts = self.context.prompts();
        let wanted = match &notification {
            Notification::Compiled(result) => match result.status {
                CompileStatus::Success => prompts.notify_success,
                CompileStatus::SkippedNoOutputDirs => prompts.notify_missing_output_dirs,
                CompileStatus::Failed(_) => true,
            },
            Notification::BatchSkipped(_) => prompts.notify_missing_output_dirs,
        };
        if wanted {
            self.reporter.report(&notification);
        }
    }
}
