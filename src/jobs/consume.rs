use anyhow::Context;
use tracing::info;

use crate::engine::{ChildJob, ChildTask, ContentSource, Job, JobContext, JobHandle};

/// Marks everything in the upstream ledger as processed.
///
/// This mutates the source ledger in place, so every later reader of that
/// ledger sees the flags.
#[derive(Debug, Default)]
pub struct ConsumeContent;

impl ChildTask<ContentSource> for ConsumeContent {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        let consumed = {
            let mut ledger = source
                .ledger_mut()
                .with_context(|| format!("ledger of '{}' is busy", source.label()))?;
            let pending = ledger.unprocessed_count();
            ledger.mark_all_processed();
            pending
        };
        info!(job = %ctx.label(), source = %source.label(), consumed, "content consumed");
        ctx.succeed();
        Ok(())
    }
}

pub fn consume_content(label: impl Into<String>) -> JobHandle {
    Job::new(label, ChildJob::<ContentSource, _>::new(ConsumeContent).tolerate_missing())
}
