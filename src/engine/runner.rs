use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use super::events::{EventSink, LifecycleEvent, TracingSink};
use super::job::{JobHandle, JobReport};

/// Tick interval used when the host does not configure one.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// FIFO queue that drives at most one top-level job at a time.
///
/// Every [`tick`](Self::tick) either polls the active job (clearing the slot
/// once it is terminal) or starts the next queued job with no ancestor.
pub struct Runner {
    queue: VecDeque<JobHandle>,
    current: Option<JobHandle>,
    active: bool,
    tick_interval: Duration,
    sinks: Vec<Box<dyn EventSink>>,
    reports: Vec<JobReport>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Inactive runner reporting to [`TracingSink`].
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            active: false,
            tick_interval: DEFAULT_TICK_INTERVAL,
            sinks: vec![Box::new(TracingSink)],
            reports: Vec::new(),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Adds another destination for lifecycle events.
    pub fn add_sink(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Active with either a running job or queued work.
    pub fn is_busy(&self) -> bool {
        self.active && (self.current.is_some() || !self.queue.is_empty())
    }

    pub fn current_job(&self) -> Option<&JobHandle> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Reports of every job that reached a terminal state under this runner.
    pub fn reports(&self) -> &[JobReport] {
        &self.reports
    }

    /// Starts accepting work. Clears anything left in the queue.
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.queue.clear();
        self.active = true;
        debug!("runner activated");
    }

    /// Stops scheduling and drops queued jobs.
    ///
    /// A job that is already running is neither aborted nor completed; it
    /// stays in the active slot and is polled again after re-activation.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.queue.clear();
        self.active = false;
        debug!("runner deactivated");
    }

    /// Appends `job` to the queue. Rejected while the runner is inactive.
    pub fn enqueue(&mut self, job: JobHandle) -> bool {
        if !self.active {
            self.emit(&LifecycleEvent::Rejected {
                label: job.label().to_string(),
                reason: "runner is inactive".to_string(),
            });
            return false;
        }

        self.emit(&LifecycleEvent::Enqueued {
            job_id: job.id().to_string(),
            label: job.label().to_string(),
        });
        self.queue.push_back(job);
        true
    }

    /// One scheduling step.
    pub fn tick(&mut self) {
        if !self.active {
            return;
        }

        if let Some(job) = self.current.clone() {
            job.poll();
            if job.is_completed() {
                self.current = None;
                let report = JobReport::from_job(&job);
                let event = if job.has_failed() {
                    LifecycleEvent::Failed(report.clone())
                } else {
                    LifecycleEvent::Completed(report.clone())
                };
                self.emit(&event);
                self.reports.push(report);
            }
            return;
        }

        if let Some(job) = self.queue.pop_front() {
            self.current = Some(job.clone());
            self.emit(&LifecycleEvent::Started {
                job_id: job.id().to_string(),
                label: job.label().to_string(),
            });
            job.start(None);
        }
    }

    /// Ticks at the configured interval until the runner has nothing left to do.
    ///
    /// Long-running jobs advance their I/O from the tick, so the runtime's
    /// drivers get to run while this awaits the next tick.
    pub async fn run_until_idle(&mut self) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while self.is_busy() {
            ticker.tick().await;
            self.tick();
        }
    }

    fn emit(&self, event: &LifecycleEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
