//! Job bodies shared by the engine tests.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::bail;

use super::capability::Capability;
use super::child::ChildTask;
use super::job::{Job, JobContext, JobHandle, Task};
use super::ledger::ContentLedger;

/// Stays running until someone completes it.
#[derive(Default)]
pub struct Manual;

impl Task for Manual {
    fn start(&mut self, _ctx: &JobContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Counts how often its start logic runs; stays running.
#[derive(Clone, Default)]
pub struct Counter {
    starts: Rc<Cell<usize>>,
}

impl Counter {
    pub fn starts(&self) -> usize {
        self.starts.get()
    }
}

impl Task for Counter {
    fn start(&mut self, _ctx: &JobContext<'_>) -> anyhow::Result<()> {
        self.starts.set(self.starts.get() + 1);
        Ok(())
    }
}

/// Start logic that always errors.
pub struct StartError(pub &'static str);

impl Task for StartError {
    fn start(&mut self, _ctx: &JobContext<'_>) -> anyhow::Result<()> {
        bail!("{}", self.0)
    }
}

/// Writes one group into a fresh ledger and completes synchronously.
pub struct Producer {
    group: String,
    artifacts: Vec<String>,
    ledger: Option<ContentLedger>,
}

impl Producer {
    pub fn new<const N: usize>(group: &str, artifacts: [&str; N]) -> Self {
        Self {
            group: group.to_string(),
            artifacts: artifacts.iter().map(|a| a.to_string()).collect(),
            ledger: None,
        }
    }
}

impl Task for Producer {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        let mut ledger = ContentLedger::new();
        ledger.add_range(&self.group, &self.artifacts);
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

/// Copies the source's ledger (if it has one) and completes.
#[derive(Default)]
pub struct LedgerCopier {
    ledger: Option<ContentLedger>,
}

impl<C: Capability> ChildTask<C> for LedgerCopier {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        self.ledger = Some(source.ledger().map(|l| l.clone()).unwrap_or_default());
        ctx.succeed();
        Ok(())
    }

    fn ledger(&self) -> Option<&ContentLedger> {
        self.ledger.as_ref()
    }
}

/// Polls `job` until it is terminal or `max_polls` is exhausted.
pub fn poll_until_done(job: &Job, max_polls: usize) {
    for _ in 0..max_polls {
        if job.is_completed() {
            return;
        }
        job.poll();
    }
}
