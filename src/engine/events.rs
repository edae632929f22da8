use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::job::JobReport;

/// Lifecycle events the runner reports to its sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Enqueued { job_id: String, label: String },
    Rejected { label: String, reason: String },
    Started { job_id: String, label: String },
    Completed(JobReport),
    Failed(JobReport),
}

/// Destination for lifecycle events. Injected into the runner.
pub trait EventSink {
    fn emit(&self, event: &LifecycleEvent);
}

impl<S: EventSink + ?Sized> EventSink for Rc<S> {
    fn emit(&self, event: &LifecycleEvent) {
        (**self).emit(event);
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Enqueued { job_id, label } => {
                info!(job = %label, job_id = %job_id, "job enqueued");
            }
            LifecycleEvent::Rejected { label, reason } => {
                warn!(job = %label, reason = %reason, "job rejected");
            }
            LifecycleEvent::Started { job_id, label } => {
                info!(job = %label, job_id = %job_id, "job started");
            }
            LifecycleEvent::Completed(report) => {
                info!(
                    job = %report.label,
                    job_id = %report.job_id,
                    duration_ms = report.duration_ms.unwrap_or_default(),
                    "job completed"
                );
            }
            LifecycleEvent::Failed(report) => {
                error!(
                    job = %report.label,
                    job_id = %report.job_id,
                    message = report.message.as_deref().unwrap_or_default(),
                    "job failed"
                );
            }
        }
    }
}

/// Keeps every event in memory. Handy for callers that inspect a run afterwards.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<LifecycleEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.borrow().clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
