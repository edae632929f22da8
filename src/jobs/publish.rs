use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::engine::{
    ChildJob, ChildTask, ContentFilter, ContentSource, Job, JobContext, JobHandle,
};

/// Copies unprocessed upstream content to `<output>/<group>/<file>` and
/// exposes `output` as the deployed folder.
pub struct Publish {
    output: PathBuf,
    deployed: Option<PathBuf>,
}

impl Publish {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            deployed: None,
        }
    }
}

impl ChildTask<ContentSource> for Publish {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        let upstream = source.ledger().map(|l| l.clone()).unwrap_or_default();

        let mut published = 0;
        for group in upstream.groups() {
            let folder = self.output.join(group);
            fs::create_dir_all(&folder)
                .with_context(|| format!("failed to create {}", folder.display()))?;
            for asset in upstream.assets_filtered(group, ContentFilter::ExcludeProcessed) {
                let input = Path::new(asset);
                let Some(name) = input.file_name() else {
                    warn!(job = %ctx.label(), asset, "asset has no file name, skipping");
                    continue;
                };
                fs::copy(input, folder.join(name))
                    .with_context(|| format!("failed to publish {asset}"))?;
                published += 1;
            }
        }

        info!(job = %ctx.label(), output = %self.output.display(), published, "content published");
        self.deployed = Some(self.output.clone());
        ctx.succeed();
        Ok(())
    }

    fn deployed_path(&self) -> Option<PathBuf> {
        self.deployed.clone()
    }
}

pub fn publish(label: impl Into<String>, output: impl Into<PathBuf>) -> JobHandle {
    Job::new(label, ChildJob::<ContentSource, _>::new(Publish::new(output)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Capability, DeploySource, JobStatus};
    use crate::jobs::import_folder;

    #[test]
    fn publishes_unprocessed_assets_per_group() {
        let input = tempfile::tempdir().unwrap();
        fs::create_dir_all(input.path().join("deep")).unwrap();
        fs::write(input.path().join("deep/a.png"), "a").unwrap();
        fs::write(input.path().join("b.png"), "b").unwrap();
        let upstream = import_folder("import", input.path(), "Props");
        upstream.start(None);
        let done = input.path().join("b.png");
        upstream.ledger_mut().unwrap().mark_processed(&done.to_string_lossy());

        let output = tempfile::tempdir().unwrap();
        let job = publish("publish", output.path());
        assert!(job.deployed_path().is_none());
        job.start(Some(upstream));

        assert_eq!(job.status(), JobStatus::Completed);
        assert!(output.path().join("Props/a.png").exists());
        assert!(!output.path().join("Props/b.png").exists());
        assert_eq!(job.deployed_path(), Some(output.path().to_path_buf()));
        assert!(DeploySource::is_offered_by(&job));
    }

    #[test]
    fn missing_file_fails_publish() {
        let upstream = Job::new(
            "source",
            crate::engine::testing::Producer::new("X", ["/no/such/file.png"]),
        );
        upstream.start(None);

        let output = tempfile::tempdir().unwrap();
        let job = publish("publish", output.path());
        job.start(Some(upstream));

        assert!(job.has_failed());
        assert!(job.message().contains("file.png"));
        assert!(job.deployed_path().is_none());
    }
}
