use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::capability::Capability;
use super::ledger::ContentLedger;

/// Shared handle to a job. Pipelines, the runner and descendants all hold one.
pub type JobHandle = Rc<Job>;

/// Tracks the lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// `Completed` and `Failed` are terminal; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// The body of a job: what it does when started and polled.
///
/// `start` may finish the job synchronously through [`JobContext::succeed`] /
/// [`JobContext::fail`], or hand a [`Completer`] to an external callback and
/// return straight away. Returning `Err` forces the job into a failed terminal
/// state carrying the error chain as its message.
///
/// The remaining methods expose what the job offers to its descendants; a
/// task that does not produce a ledger or a deployed folder keeps the defaults.
pub trait Task: 'static {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()>;

    /// Periodic tick while the job is running.
    fn poll(&mut self, _ctx: &JobContext<'_>) {}

    fn ledger(&self) -> Option<&ContentLedger> {
        None
    }

    fn ledger_mut(&mut self) -> Option<&mut ContentLedger> {
        None
    }

    fn deployed_path(&self) -> Option<PathBuf> {
        None
    }

    /// For staged tasks: the most recent stage that finished successfully.
    /// Jobs started with such a task as ancestor inherit that stage instead.
    fn last_finished_stage(&self) -> Option<JobHandle> {
        None
    }

    /// Appends a stage. Only staged tasks that have not begun accept one.
    fn append_stage(&mut self, _stage: JobHandle) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct Lifecycle {
    status: JobStatus,
    message: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Shared {
    id: Uuid,
    label: String,
    lifecycle: RefCell<Lifecycle>,
}

/// One-shot terminal-state setter for a job.
///
/// Cloneable so that long-running work can carry it into a callback. The first
/// `complete` call is authoritative; every later call is ignored and returns
/// `false`.
#[derive(Debug, Clone)]
pub struct Completer {
    shared: Rc<Shared>,
}

impl Completer {
    pub fn complete(&self, failed: bool, message: impl Into<String>) -> bool {
        let mut lifecycle = self.shared.lifecycle.borrow_mut();
        if lifecycle.status.is_terminal() {
            return false;
        }

        lifecycle.status = if failed {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        lifecycle.message = message.into();
        lifecycle.completed_at = Some(Utc::now());

        if failed {
            warn!(job = %self.shared.label, message = %lifecycle.message, "job failed");
        } else {
            debug!(job = %self.shared.label, "job completed");
        }
        true
    }

    pub fn succeed(&self) -> bool {
        self.complete(false, "")
    }

    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.complete(true, message)
    }

    pub fn is_completed(&self) -> bool {
        self.shared.lifecycle.borrow().status.is_terminal()
    }
}

/// A unit of pipeline work with a start / poll / complete lifecycle.
///
/// The ancestor is bound once, when the job starts, and names the job that ran
/// before this one. Walking ancestors is how a job finds upstream output.
pub struct Job {
    shared: Rc<Shared>,
    ancestor: OnceCell<JobHandle>,
    task: RefCell<Box<dyn Task>>,
}

impl Job {
    pub fn new(label: impl Into<String>, task: impl Task) -> JobHandle {
        Rc::new(Self {
            shared: Rc::new(Shared {
                id: Uuid::new_v4(),
                label: label.into(),
                lifecycle: RefCell::new(Lifecycle {
                    status: JobStatus::Pending,
                    message: String::new(),
                    started_at: None,
                    completed_at: None,
                }),
            }),
            ancestor: OnceCell::new(),
            task: RefCell::new(Box::new(task)),
        })
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn status(&self) -> JobStatus {
        self.shared.lifecycle.borrow().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == JobStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn has_failed(&self) -> bool {
        self.status() == JobStatus::Failed
    }

    /// Message recorded with the terminal transition; empty until then.
    pub fn message(&self) -> String {
        self.shared.lifecycle.borrow().message.clone()
    }

    pub fn ancestor(&self) -> Option<&JobHandle> {
        self.ancestor.get()
    }

    pub fn completer(&self) -> Completer {
        Completer {
            shared: Rc::clone(&self.shared),
        }
    }

    /// Same as [`Completer::complete`].
    pub fn complete(&self, failed: bool, message: impl Into<String>) -> bool {
        self.completer().complete(failed, message)
    }

    /// Starts the job with `ancestor` as the job that ran before it.
    ///
    /// Returns `false` with no state change when the job has already been
    /// started or completed, or when `ancestor` descends from this job. Also
    /// returns `false` when the start logic fails; the job is then terminal
    /// and failed.
    pub fn start(&self, ancestor: Option<JobHandle>) -> bool {
        if self.status() != JobStatus::Pending {
            return false;
        }

        let ancestor = ancestor.map(inherit_finished_stage);
        if let Some(ancestor) = &ancestor {
            if chain_contains(ancestor, self) {
                warn!(job = %self.label(), ancestor = %ancestor.label(), "ancestor chain loops back to job, not starting");
                return false;
            }
        }

        {
            let mut lifecycle = self.shared.lifecycle.borrow_mut();
            lifecycle.status = JobStatus::Running;
            lifecycle.started_at = Some(Utc::now());
        }
        if let Some(ancestor) = ancestor {
            // Pending jobs have never bound an ancestor.
            let _ = self.ancestor.set(ancestor);
        }

        let result = match self.task.try_borrow_mut() {
            Ok(mut task) => task.start(&JobContext { job: self }),
            Err(_) => Err(anyhow::anyhow!("job body is already executing")),
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                let message = format!("{err:#}");
                error!(job = %self.label(), error = %message, "job failed on start");
                self.complete(true, message);
                false
            }
        }
    }

    /// Gives a running job its periodic tick. A no-op in any other state.
    pub fn poll(&self) {
        if !self.is_running() {
            return;
        }
        if let Ok(mut task) = self.task.try_borrow_mut() {
            task.poll(&JobContext { job: self });
        }
    }

    /// Appends a stage to a staged job that has not started yet.
    pub fn then(&self, stage: JobHandle) -> bool {
        if self.status() != JobStatus::Pending {
            return false;
        }
        match self.task.try_borrow_mut() {
            Ok(mut task) => task.append_stage(stage),
            Err(_) => false,
        }
    }

    /// Nearest ancestor offering capability `C`, starting at the bound ancestor.
    pub fn find_ancestor<C: Capability>(&self) -> Option<JobHandle> {
        let mut cursor = self.ancestor.get().cloned();
        while let Some(job) = cursor {
            if C::is_offered_by(&job) {
                return Some(job);
            }
            cursor = job.ancestor.get().cloned();
        }
        None
    }

    /// The ledger this job exposes, if any. `None` while the job body is busy.
    pub fn ledger(&self) -> Option<Ref<'_, ContentLedger>> {
        let task = self.task.try_borrow().ok()?;
        Ref::filter_map(task, |task| task.ledger()).ok()
    }

    /// Mutable access to the exposed ledger. Changes are seen by every job
    /// that later reads this ledger through the ancestor chain.
    pub fn ledger_mut(&self) -> Option<RefMut<'_, ContentLedger>> {
        let task = self.task.try_borrow_mut().ok()?;
        RefMut::filter_map(task, |task| task.ledger_mut()).ok()
    }

    pub fn deployed_path(&self) -> Option<PathBuf> {
        self.task.try_borrow().ok()?.deployed_path()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle.borrow().clone()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("status", &self.status())
            .field("ancestor", &self.ancestor.get().map(|a| a.label().to_string()))
            .finish()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn inherit_finished_stage(ancestor: JobHandle) -> JobHandle {
    let finished = match ancestor.task.try_borrow() {
        Ok(task) => task.last_finished_stage(),
        Err(_) => None,
    };
    finished.unwrap_or(ancestor)
}

fn chain_contains(start: &JobHandle, target: &Job) -> bool {
    let mut cursor = Some(Rc::clone(start));
    while let Some(job) = cursor {
        if std::ptr::eq(Rc::as_ptr(&job), target) {
            return true;
        }
        cursor = job.ancestor.get().cloned();
    }
    false
}

/// What a task sees of its own job while starting or polling.
pub struct JobContext<'a> {
    job: &'a Job,
}

impl<'a> JobContext<'a> {
    pub fn job_id(&self) -> Uuid {
        self.job.id()
    }

    pub fn label(&self) -> &'a str {
        self.job.label()
    }

    pub fn ancestor(&self) -> Option<&'a JobHandle> {
        self.job.ancestor()
    }

    pub fn find_ancestor<C: Capability>(&self) -> Option<JobHandle> {
        self.job.find_ancestor::<C>()
    }

    pub fn is_completed(&self) -> bool {
        self.job.is_completed()
    }

    pub fn completer(&self) -> Completer {
        self.job.completer()
    }

    pub fn complete(&self, failed: bool, message: impl Into<String>) -> bool {
        self.job.complete(failed, message)
    }

    pub fn succeed(&self) -> bool {
        self.job.complete(false, "")
    }

    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.job.complete(true, message)
    }
}

/// Structured record produced once a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub label: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl JobReport {
    pub fn from_job(job: &Job) -> Self {
        let lifecycle = job.lifecycle();
        let duration_ms = match (lifecycle.started_at, lifecycle.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        };

        Self {
            job_id: job.id().to_string(),
            label: job.label().to_string(),
            status: lifecycle.status,
            message: (!lifecycle.message.is_empty()).then_some(lifecycle.message),
            started_at: lifecycle.started_at,
            completed_at: lifecycle.completed_at,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::capability::ContentSource;
    use crate::engine::testing::{Counter, Manual, Producer, StartError};

    #[test]
    fn job_creation_defaults() {
        let job = Job::new("idle", Manual::default());
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(!job.is_running());
        assert!(!job.is_completed());
        assert!(job.ancestor().is_none());
        assert!(job.message().is_empty());
    }

    #[test]
    fn second_start_is_rejected_without_rerunning_start_logic() {
        let counter = Counter::default();
        let job = Job::new("counted", counter.clone());

        assert!(job.start(None));
        assert!(!job.start(None));
        assert_eq!(counter.starts(), 1);
        assert!(job.is_running());
    }

    #[test]
    fn completed_job_never_runs_again() {
        let counter = Counter::default();
        let job = Job::new("counted", counter.clone());
        job.start(None);
        job.complete(false, "");

        assert!(!job.start(None));
        assert_eq!(counter.starts(), 1);
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn first_completion_is_authoritative() {
        let job = Job::new("manual", Manual::default());
        job.start(None);

        assert!(job.complete(true, "disk full"));
        assert!(!job.complete(false, "all good"));
        assert!(!job.completer().succeed());

        assert!(job.has_failed());
        assert!(!job.is_running());
        assert_eq!(job.message(), "disk full");
    }

    #[test]
    fn start_error_becomes_failed_completion() {
        let job = Job::new("broken", StartError("archive is corrupt"));

        assert!(!job.start(None));
        assert!(job.is_completed());
        assert!(job.has_failed());
        assert!(job.message().contains("archive is corrupt"));
    }

    #[test]
    fn ancestor_is_bound_at_start() {
        let first = Job::new("first", Manual::default());
        let second = Job::new("second", Manual::default());
        first.start(None);
        second.start(Some(first.clone()));

        assert!(Rc::ptr_eq(second.ancestor().unwrap(), &first));
    }

    #[test]
    fn find_ancestor_returns_nearest_capable_job() {
        let far = Job::new("far", Producer::new("X", ["far.txt"]));
        let near = Job::new("near", Producer::new("X", ["near.txt"]));
        let plain = Job::new("plain", Manual::default());
        let probe = Job::new("probe", Manual::default());

        far.start(None);
        near.start(Some(far.clone()));
        plain.start(Some(near.clone()));
        probe.start(Some(plain.clone()));

        let found = probe.find_ancestor::<ContentSource>().unwrap();
        assert!(Rc::ptr_eq(&found, &near));
        assert_eq!(found.ledger().unwrap().assets("X"), vec!["near.txt"]);
    }

    #[test]
    fn find_ancestor_without_match_is_none() {
        let plain = Job::new("plain", Manual::default());
        let probe = Job::new("probe", Manual::default());
        plain.start(None);
        probe.start(Some(plain));
        assert!(probe.find_ancestor::<ContentSource>().is_none());

        let orphan = Job::new("orphan", Manual::default());
        orphan.start(None);
        assert!(orphan.find_ancestor::<ContentSource>().is_none());
    }

    #[test]
    fn ancestor_loop_is_rejected() {
        let a = Job::new("a", Manual::default());
        let b = Job::new("b", Manual::default());
        b.start(Some(a.clone()));

        assert!(!a.start(Some(b)));
        assert_eq!(a.status(), JobStatus::Pending);
        assert!(a.ancestor().is_none());
    }

    #[test]
    fn completer_finishes_job_from_outside() {
        let job = Job::new("async", Manual::default());
        job.start(None);
        let completer = job.completer();
        assert!(job.is_running());

        assert!(completer.succeed());
        assert!(completer.is_completed());
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn report_from_completed_job() {
        let job = Job::new("reported", Manual::default());
        job.start(None);
        job.complete(true, "boom");

        let report = JobReport::from_job(&job);
        assert_eq!(report.label, "reported");
        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.message.as_deref(), Some("boom"));
        assert!(report.started_at.is_some());
        assert!(report.duration_ms.unwrap() >= 0);
    }

    #[test]
    fn report_serialization_roundtrip() {
        let job = Job::new("serialize me", Manual::default());
        job.start(None);
        job.complete(false, "");

        let report = JobReport::from_job(&job);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("\"message\""));
        let back: JobReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn status_display() {
        assert_eq!(JobStatus::Pending.to_string(), "PENDING");
        assert_eq!(JobStatus::Running.to_string(), "RUNNING");
        assert_eq!(JobStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(JobStatus::Failed.to_string(), "FAILED");
    }
}
