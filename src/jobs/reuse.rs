use anyhow::bail;
use tracing::info;

use crate::engine::{ContentLedger, Job, JobContext, JobHandle, Task};

/// Forks the content of a job that is not on this job's ancestor chain.
///
/// The ledger is copied when this job starts, so later changes to the
/// source do not leak into the fork.
pub struct ReuseLedger {
    source: JobHandle,
    ledger: Option<ContentLedger>,
}

impl ReuseLedger {
    pub fn new(source: JobHandle) -> Self {
        Self {
            source,
            ledger: None,
        }
    }
}

impl Task for ReuseLedger {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        let copy = self.source.ledger().map(|l| l.clone());
        let Some(ledger) = copy else {
            bail!("job '{}' holds no ledger to reuse", self.source.label());
        };
        info!(job = %ctx.label(), source = %self.source.label(), artifacts = ledger.len(), "ledger reused");
        self.ledger = Some(ledger);
        ctx.succeed();
        Ok(())
    }

    fn ledger(&self) -> Option<&ContentLedger> {
        self.ledger.as_ref()
    }

    fn ledger_mut(&mut self) -> Option<&mut ContentLedger> {
        self.ledger.as_mut()
    }
}

pub fn reuse_ledger(label: impl Into<String>, source: JobHandle) -> JobHandle {
    Job::new(label, ReuseLedger::new(source))
}
