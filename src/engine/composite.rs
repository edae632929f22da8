use tracing::{debug, error, info};

use super::job::{Job, JobContext, JobHandle, Task};

/// Runs an ordered list of jobs as pipeline stages.
///
/// Stage 0 starts with the composite's own ancestor. Every later stage starts
/// with the stage that finished just before it as ancestor, which is how one
/// stage's ledger becomes visible to the next. The first failing stage fails
/// the whole composite with the stage's message, and no later stage starts.
#[derive(Default)]
pub struct Composite {
    stages: Vec<JobHandle>,
    // None until the composite starts.
    index: Option<usize>,
    active: Option<JobHandle>,
    last_finished: Option<JobHandle>,
}

impl Composite {
    pub fn new(stages: impl IntoIterator<Item = JobHandle>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Convenience for `Job::new(label, Composite::new(stages))`.
    pub fn sequence(label: impl Into<String>, stages: impl IntoIterator<Item = JobHandle>) -> JobHandle {
        Job::new(label, Self::new(stages))
    }

    /// Appends a stage. Rejected once the composite has started.
    pub fn then(&mut self, stage: JobHandle) -> bool {
        if self.index.is_some() {
            return false;
        }
        self.stages.push(stage);
        true
    }

    pub fn stages(&self) -> &[JobHandle] {
        &self.stages
    }

    /// Index of the active stage, `None` before start.
    pub fn stage_index(&self) -> Option<usize> {
        self.index
    }

    fn advance(&mut self, ctx: &JobContext<'_>, ancestor: Option<JobHandle>) {
        if ctx.is_completed() {
            debug!(composite = %ctx.label(), "composite already completed, not advancing");
            return;
        }

        let next = self.index.map_or(0, |i| i + 1);
        self.index = Some(next);

        let Some(stage) = self.stages.get(next).cloned() else {
            self.active = None;
            info!(composite = %ctx.label(), stages = self.stages.len(), "all stages completed");
            ctx.succeed();
            return;
        };

        info!(composite = %ctx.label(), stage = next, job = %stage.label(), "stage started");
        self.active = Some(stage.clone());
        stage.start(ancestor);
    }
}

impl Task for Composite {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        self.advance(ctx, ctx.ancestor().cloned());
        Ok(())
    }

    fn poll(&mut self, ctx: &JobContext<'_>) {
        let Some(stage) = self.active.clone() else {
            return;
        };

        stage.poll();
        if !stage.is_completed() {
            return;
        }

        let index = self.index.unwrap_or_default();
        if stage.has_failed() {
            error!(composite = %ctx.label(), stage = index, job = %stage.label(), "stage failed, aborting");
            self.active = None;
            ctx.fail(stage.message());
        } else {
            info!(composite = %ctx.label(), stage = index, job = %stage.label(), "stage completed");
            self.last_finished = Some(stage.clone());
            self.advance(ctx, Some(stage));
        }
    }

    fn last_finished_stage(&self) -> Option<JobHandle> {
        self.last_finished.clone()
    }

    fn append_stage(&mut self, stage: JobHandle) -> bool {
        self.then(stage)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::capability::ContentSource;
    use crate::engine::child::ChildJob;
    use crate::engine::job::JobStatus;
    use crate::engine::testing::{Counter, LedgerCopier, Manual, Producer, poll_until_done};

    #[test]
    fn stages_run_in_order_and_composite_succeeds() {
        let a = Job::new("a", Producer::new("X", ["a.txt"]));
        let b = Job::new("b", Producer::new("Y", ["b.txt"]));
        let pipeline = Composite::sequence("pipeline", [a.clone(), b.clone()]);

        assert!(pipeline.start(None));
        assert!(a.is_completed());
        assert_eq!(b.status(), JobStatus::Pending);

        poll_until_done(&pipeline, 10);
        assert_eq!(pipeline.status(), JobStatus::Completed);
        assert!(b.is_completed());
        assert!(Rc::ptr_eq(b.ancestor().unwrap(), &a));
    }

    #[test]
    fn next_stage_waits_for_running_stage() {
        let slow = Job::new("slow", Manual::default());
        let next = Job::new("next", Manual::default());
        let pipeline = Composite::sequence("pipeline", [slow.clone(), next.clone()]);

        pipeline.start(None);
        for _ in 0..5 {
            pipeline.poll();
        }
        assert_eq!(next.status(), JobStatus::Pending);

        slow.completer().succeed();
        pipeline.poll();
        assert!(next.is_running());
    }

    #[test]
    fn failed_stage_stops_pipeline_and_keeps_message() {
        let a = Job::new("a", Manual::default());
        let b = Job::new("b", Manual::default());
        let c_counter = Counter::default();
        let c = Job::new("c", c_counter.clone());
        let pipeline = Composite::sequence("pipeline", [a.clone(), b.clone(), c.clone()]);

        pipeline.start(None);
        a.complete(false, "");
        pipeline.poll();
        b.complete(true, "texture import failed: bad header");
        pipeline.poll();

        assert!(pipeline.has_failed());
        assert_eq!(pipeline.message(), "texture import failed: bad header");
        assert_eq!(c_counter.starts(), 0);
        assert_eq!(c.status(), JobStatus::Pending);

        pipeline.poll();
        assert_eq!(c_counter.starts(), 0);
    }

    #[test]
    fn empty_composite_completes_on_start() {
        let pipeline = Composite::sequence("empty", Vec::<JobHandle>::new());
        assert!(pipeline.start(None));
        assert_eq!(pipeline.status(), JobStatus::Completed);
    }

    #[test]
    fn ledger_flows_to_gated_stage() {
        let producer = Job::new("stage-a", Producer::new("X", ["a.txt"]));
        let consumer = Job::new(
            "stage-b",
            ChildJob::<ContentSource, _>::new(LedgerCopier::default()),
        );
        let pipeline = Composite::sequence("pipeline", [producer, consumer.clone()]);

        pipeline.start(None);
        poll_until_done(&pipeline, 10);

        assert_eq!(pipeline.status(), JobStatus::Completed);
        let ledger = consumer.ledger().unwrap();
        assert_eq!(ledger.groups().collect::<Vec<_>>(), vec!["X"]);
        assert_eq!(ledger.assets("X"), vec!["a.txt"]);
    }

    #[test]
    fn then_appends_only_before_start() {
        let pipeline = Composite::sequence("pipeline", [Job::new("a", Producer::new("X", ["a"]))]);
        assert!(pipeline.then(Job::new("b", Producer::new("Y", ["b"]))));

        pipeline.start(None);
        let late = Job::new("late", Counter::default());
        assert!(!pipeline.then(late.clone()));

        poll_until_done(&pipeline, 10);
        assert_eq!(pipeline.status(), JobStatus::Completed);
        assert_eq!(late.status(), JobStatus::Pending);
    }

    #[test]
    fn then_is_rejected_by_leaf_jobs() {
        let leaf = Job::new("leaf", Manual::default());
        assert!(!leaf.then(Job::new("other", Manual::default())));
    }

    #[test]
    fn stage_after_nested_pipeline_sees_its_last_stage() {
        let inner_producer = Job::new("inner-a", Producer::new("X", ["inner.txt"]));
        let inner = Composite::sequence("inner", [inner_producer.clone()]);
        let consumer = Job::new(
            "outer-b",
            ChildJob::<ContentSource, _>::new(LedgerCopier::default()),
        );
        let outer = Composite::sequence("outer", [inner, consumer.clone()]);

        outer.start(None);
        poll_until_done(&outer, 20);

        assert_eq!(outer.status(), JobStatus::Completed);
        assert!(Rc::ptr_eq(consumer.ancestor().unwrap(), &inner_producer));
        assert_eq!(consumer.ledger().unwrap().assets("X"), vec!["inner.txt"]);
    }

    #[test]
    fn nested_pipeline_stages_see_outer_ancestor() {
        let upstream = Job::new("upstream", Producer::new("X", ["up.txt"]));
        let consumer = Job::new(
            "inner-consumer",
            ChildJob::<ContentSource, _>::new(LedgerCopier::default()),
        );
        let inner = Composite::sequence("inner", [consumer.clone()]);
        let outer = Composite::sequence("outer", [upstream, inner]);

        outer.start(None);
        poll_until_done(&outer, 20);

        assert_eq!(outer.status(), JobStatus::Completed);
        assert_eq!(consumer.ledger().unwrap().assets("X"), vec!["up.txt"]);
    }

    #[test]
    fn stage_start_error_fails_composite() {
        let broken = Job::new("broken", crate::engine::testing::StartError("no such archive"));
        let pipeline = Composite::sequence("pipeline", [broken]);

        pipeline.start(None);
        pipeline.poll();

        assert!(pipeline.has_failed());
        assert!(pipeline.message().contains("no such archive"));
    }
}
