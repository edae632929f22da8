use std::marker::PhantomData;
use std::path::PathBuf;

use tracing::{error, info};

use super::capability::Capability;
use super::job::{JobContext, JobHandle, Task};
use super::ledger::ContentLedger;

/// Body of a job that needs an upstream job offering capability `C`.
pub trait ChildTask<C: Capability>: 'static {
    /// Called with the nearest ancestor offering `C`.
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()>;

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
}

/// Capability-gated task: looks up its source before running the child body.
///
/// When no ancestor offers `C` the job completes straight away with a
/// descriptive message. That completion is a failure unless the job was built
/// with [`tolerate_missing`](Self::tolerate_missing).
pub struct ChildJob<C, T> {
    task: T,
    fail_when_missing: bool,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability, T: ChildTask<C>> ChildJob<C, T> {
    pub fn new(task: T) -> Self {
        Self {
            task,
            fail_when_missing: true,
            _capability: PhantomData,
        }
    }

    /// A missing source means "no upstream work": complete successfully.
    pub fn tolerate_missing(mut self) -> Self {
        self.fail_when_missing = false;
        self
    }
}

impl<C: Capability, T: ChildTask<C>> Task for ChildJob<C, T> {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        let Some(source) = ctx.find_ancestor::<C>() else {
            let message = format!(
                "job '{}': nothing to process, no {} found among ancestors",
                ctx.label(),
                C::NAME
            );
            if self.fail_when_missing {
                error!(job = %ctx.label(), "{message}");
            } else {
                info!(job = %ctx.label(), "{message}");
            }
            ctx.complete(self.fail_when_missing, message);
            return Ok(());
        };

        self.task.start_child(ctx, &source)
    }

    fn poll(&mut self, ctx: &JobContext<'_>) {
        self.task.poll(ctx);
    }

    fn ledger(&self) -> Option<&ContentLedger> {
        self.task.ledger()
    }

    fn ledger_mut(&mut self) -> Option<&mut ContentLedger> {
        self.task.ledger_mut()
    }

    fn deployed_path(&self) -> Option<PathBuf> {
        self.task.deployed_path()
    }
}
