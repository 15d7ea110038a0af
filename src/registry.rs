//! Concurrency-safe job table.
//!
//! The map lock is held only long enough to insert, look up, or sweep
//! entries.  Each job sits behind its own `RwLock`, so a worker publishing
//! progress on one job never blocks readers of another.
//!
//! Callers only ever get cloned [`Job`] snapshots.  The one exception is the
//! [`JobHandle`] returned by [`JobRegistry::create`]: it is not `Clone`, and
//! its mutators are crate-private, so exactly one worker can drive each job.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use chrono::Utc;

use crate::job::{Job, JobId, JobOutput, JobParams, JobStatus};

type SharedJob = Arc<RwLock<Job>>;

// A panicking worker must not take the whole table down with it.
fn read(job: &RwLock<Job>) -> RwLockReadGuard<'_, Job> {
    job.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(job: &RwLock<Job>) -> RwLockWriteGuard<'_, Job> {
    job.write().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// JobRegistry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, SharedJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<JobId, SharedJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new `Started` job and return the handle its worker uses.
    ///
    /// The id is drawn and inserted under the table lock, so concurrent
    /// creates never collide and no reader sees a half-built record.
    pub fn create(&self, params: JobParams, total_chunks: usize) -> JobHandle {
        let mut table = self.table();
        let id = loop {
            let id = JobId::generate();
            if !table.contains_key(&id) {
                break id;
            }
        };
        let job = Arc::new(RwLock::new(Job::new(id.clone(), params, total_chunks)));
        table.insert(id.clone(), Arc::clone(&job));
        JobHandle { id, job }
    }

    /// Snapshot of the job, if it is still registered.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        let job = self.table().get(id).cloned()?;
        let snapshot = read(&job).clone();
        Some(snapshot)
    }

    /// Ask a running job to stop at its next checkpoint.
    ///
    /// Returns `true` only if the job exists and is `Started` or `Processing`.
    pub fn request_cancel(&self, id: &JobId) -> bool {
        let Some(job) = self.table().get(id).cloned() else {
            return false;
        };
        let mut job = write(&job);
        if job.status.is_terminal() {
            return false;
        }
        job.cancel_requested = true;
        true
    }

    /// Drop terminal jobs that finished more than `max_age` ago.
    ///
    /// Running jobs are never removed, however old.  Returns how many jobs
    /// were dropped.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, job| {
            let job = read(job);
            let expired = match job.completed_at {
                Some(done) if job.status.is_terminal() => (now - done)
                    .to_std()
                    .map(|age| age > max_age)
                    .unwrap_or(false),
                _ => false,
            };
            !expired
        });
        before - table.len()
    }

    /// Forget a job whose worker never started.
    pub(crate) fn discard(&self, id: &JobId) {
        self.table().remove(id);
    }

    /// Snapshots of every registered job, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let jobs: Vec<SharedJob> = self.table().values().cloned().collect();
        let mut snapshots: Vec<Job> = jobs.iter().map(|j| read(j).clone()).collect();
        snapshots.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobHandle — the worker's write access to one job
// ─────────────────────────────────────────────────────────────────────────────

/// Exclusive write access to one registered job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    job: SharedJob,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn snapshot(&self) -> Job {
        read(&self.job).clone()
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        read(&self.job).cancel_requested
    }

    pub(crate) fn is_terminal(&self) -> bool {
        read(&self.job).status.is_terminal()
    }

    /// `Started → Processing`.  Returns `false` from any other status.
    pub(crate) fn mark_processing(&self) -> bool {
        let mut job = write(&self.job);
        if job.status != JobStatus::Started {
            return false;
        }
        job.status = JobStatus::Processing;
        true
    }

    /// Publish progress.  Never moves backwards or past `total_chunks`.
    pub(crate) fn advance(&self, chunks_done: usize) {
        let mut job = write(&self.job);
        if job.status != JobStatus::Processing {
            return;
        }
        let done = chunks_done.min(job.total_chunks);
        if done > job.current_chunk {
            job.current_chunk = done;
        }
    }

    /// `→ Completed`, unless a cancellation slipped in after the last
    /// checkpoint, in which case the job ends `Cancelled` and this returns
    /// `false`.
    pub(crate) fn complete(&self, output: JobOutput) -> bool {
        let mut job = write(&self.job);
        if job.status.is_terminal() {
            return false;
        }
        if job.cancel_requested {
            finish(&mut job, JobStatus::Cancelled);
            return false;
        }
        job.output = Some(output);
        finish(&mut job, JobStatus::Completed);
        true
    }

    /// `→ Failed` with `message`.  No-op on a terminal job.
    pub(crate) fn fail(&self, message: impl Into<String>) -> bool {
        let mut job = write(&self.job);
        if job.status.is_terminal() {
            return false;
        }
        job.error_message = Some(message.into());
        finish(&mut job, JobStatus::Failed);
        true
    }

    /// `→ Cancelled`.  No-op on a terminal job.
    pub(crate) fn cancel(&self) -> bool {
        let mut job = write(&self.job);
        if job.status.is_terminal() {
            return false;
        }
        finish(&mut job, JobStatus::Cancelled);
        true
    }
}

/// The single place a terminal status and `completed_at` are written.
fn finish(job: &mut Job, status: JobStatus) {
    debug_assert!(status.is_terminal());
    job.status = status;
    job.completed_at = Some(Utc::now());
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashSet, path::PathBuf, thread};

    fn params() -> JobParams {
        JobParams { title: "Book".into(), voice: "af_heart".into(), speed: 1.0 }
    }

    fn output() -> JobOutput {
        JobOutput { path: PathBuf::from("x.wav"), duration_seconds: 1.0, file_size_bytes: 44 }
    }

    #[test]
    fn test_create_and_get() {
        let reg = JobRegistry::new();
        let handle = reg.create(params(), 3);
        let job = reg.get(handle.id()).unwrap();
        assert_eq!(job.status, JobStatus::Started);
        assert_eq!(job.total_chunks, 3);
        assert_eq!(job.current_chunk, 0);
        assert!(job.completed_at.is_none());
        assert_eq!(job.params.title, "Book");
    }

    #[test]
    fn test_get_unknown() {
        let reg = JobRegistry::new();
        assert!(reg.get(&JobId::from("nope")).is_none());
        assert!(!reg.request_cancel(&JobId::from("nope")));
    }

    #[test]
    fn test_concurrent_creates_unique() {
        let reg = Arc::new(JobRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    (0..50).map(|_| reg.create(params(), 1).id().clone()).collect::<Vec<_>>()
                })
            })
            .collect();
        let ids: HashSet<JobId> = workers.into_iter().flat_map(|w| w.join().unwrap()).collect();
        assert_eq!(ids.len(), 400);
        assert_eq!(reg.len(), 400);
    }

    #[test]
    fn test_cancel_only_while_running() {
        let reg = JobRegistry::new();
        let handle = reg.create(params(), 2);
        assert!(reg.request_cancel(handle.id()));
        assert!(reg.get(handle.id()).unwrap().cancel_requested);

        handle.mark_processing();
        assert!(reg.request_cancel(handle.id()));

        handle.cancel();
        assert!(!reg.request_cancel(handle.id()));
    }

    #[test]
    fn test_terminal_is_final() {
        let reg = JobRegistry::new();
        let handle = reg.create(params(), 1);
        handle.mark_processing();
        assert!(handle.fail("boom"));
        let first = reg.get(handle.id()).unwrap();

        assert!(!handle.complete(output()));
        assert!(!handle.cancel());
        assert!(!handle.fail("again"));
        assert!(!handle.mark_processing());

        let again = reg.get(handle.id()).unwrap();
        assert_eq!(again.status, JobStatus::Failed);
        assert_eq!(again.completed_at, first.completed_at);
        assert_eq!(again.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_complete_loses_to_late_cancel() {
        let reg = JobRegistry::new();
        let handle = reg.create(params(), 1);
        handle.mark_processing();
        reg.request_cancel(handle.id());
        assert!(!handle.complete(output()));
        let job = reg.get(handle.id()).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.output.is_none());
    }

    #[test]
    fn test_advance_is_monotonic_and_bounded() {
        let reg = JobRegistry::new();
        let handle = reg.create(params(), 3);
        handle.advance(1);
        assert_eq!(handle.snapshot().current_chunk, 0, "not processing yet");

        handle.mark_processing();
        handle.advance(2);
        handle.advance(1);
        assert_eq!(handle.snapshot().current_chunk, 2);
        handle.advance(10);
        assert_eq!(handle.snapshot().current_chunk, 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let reg = JobRegistry::new();
        let handle = reg.create(params(), 1);
        let mut snap = reg.get(handle.id()).unwrap();
        snap.status = JobStatus::Completed;
        snap.current_chunk = 1;
        let fresh = reg.get(handle.id()).unwrap();
        assert_eq!(fresh.status, JobStatus::Started);
        assert_eq!(fresh.current_chunk, 0);
    }

    #[test]
    fn test_sweep_keeps_running_jobs() {
        let reg = JobRegistry::new();
        let running = reg.create(params(), 1);
        running.mark_processing();
        let done = reg.create(params(), 1);
        done.mark_processing();
        done.complete(output());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(reg.sweep(Duration::ZERO), 1);
        assert!(reg.get(running.id()).is_some());
        assert!(reg.get(done.id()).is_none());
    }

    #[test]
    fn test_sweep_respects_max_age() {
        let reg = JobRegistry::new();
        let done = reg.create(params(), 1);
        done.cancel();
        assert_eq!(reg.sweep(Duration::from_secs(3600)), 0);
        assert!(reg.get(done.id()).is_some());
    }

    #[test]
    fn test_list_sorted_by_start() {
        let reg = JobRegistry::new();
        let a = reg.create(params(), 1);
        thread::sleep(Duration::from_millis(5));
        let b = reg.create(params(), 1);
        let ids: Vec<JobId> = reg.list().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![a.id().clone(), b.id().clone()]);
        assert!(!reg.is_empty());
    }
}
