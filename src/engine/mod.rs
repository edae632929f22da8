mod capability;
mod child;
mod composite;
mod events;
mod inflight;
mod job;
mod ledger;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{Capability, ContentSource, DeploySource};
pub use child::{ChildJob, ChildTask};
pub use composite::Composite;
pub use events::{EventSink, LifecycleEvent, MemorySink, TracingSink};
pub use inflight::InFlight;
pub use job::{Completer, Job, JobContext, JobHandle, JobReport, JobStatus, Task};
pub use ledger::{ContentFilter, ContentLedger};
pub use runner::{DEFAULT_TICK_INTERVAL, Runner};
