use tracing::info;

use crate::engine::{Job, JobContext, JobHandle, Task};

/// Writes a marker line to the log, tagged with the upstream job.
#[derive(Debug, Clone)]
pub struct LogMarker {
    id: String,
}

impl Task for LogMarker {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        let after = ctx.ancestor().map(|a| a.label().to_string());
        info!(job = %ctx.label(), job_id = %ctx.job_id(), marker = %self.id, after = ?after, "pipeline marker");
        ctx.succeed();
        Ok(())
    }
}

pub fn log_marker(label: impl Into<String>, id: impl Into<String>) -> JobHandle {
    Job::new(label, LogMarker { id: id.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JobStatus;

    #[test]
    fn marker_completes_immediately() {
        let job = log_marker("mark", "after-import");
        assert!(job.start(None));
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.message().is_empty());
    }
}
