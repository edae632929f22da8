use std::fs;
use std::path::PathBuf;

use anyhow::{Context, ensure};
use tracing::info;

use super::fsutil;
use crate::engine::{ChildJob, ChildTask, DeploySource, Job, JobContext, JobHandle};

/// Copies the nearest deployed folder to a final target.
pub struct PostDeploy {
    target: PathBuf,
    keep_source: bool,
    overwrite: bool,
    deployed: Option<PathBuf>,
}

impl PostDeploy {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            keep_source: true,
            overwrite: false,
            deployed: None,
        }
    }

    /// When `false`, the source folder is emptied after the copy.
    pub fn keep_source(mut self, keep: bool) -> Self {
        self.keep_source = keep;
        self
    }

    /// Clear the target before copying.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl ChildTask<DeploySource> for PostDeploy {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        let from = source
            .deployed_path()
            .with_context(|| format!("'{}' no longer reports a deployed folder", source.label()))?;
        ensure!(from.is_dir(), "deployed folder {} does not exist", from.display());
        ensure!(from != self.target, "deploy target equals the source folder");

        if self.overwrite {
            fsutil::clear_dir_contents(&self.target)?;
        }
        fs::create_dir_all(&self.target)
            .with_context(|| format!("failed to create {}", self.target.display()))?;
        let copied = fsutil::copy_dir(&from, &self.target, self.overwrite)?;
        if !self.keep_source {
            fsutil::clear_dir_contents(&from)?;
        }

        info!(
            job = %ctx.label(),
            from = %from.display(),
            to = %self.target.display(),
            copied,
            "deployed content copied"
        );
        self.deployed = Some(self.target.clone());
        ctx.succeed();
        Ok(())
    }

    fn deployed_path(&self) -> Option<PathBuf> {
        self.deployed.clone()
    }
}

pub fn post_deploy(
    label: impl Into<String>,
    target: impl Into<PathBuf>,
    keep_source: bool,
    overwrite: bool,
) -> JobHandle {
    let task = PostDeploy::new(target)
        .keep_source(keep_source)
        .overwrite(overwrite);
    Job::new(label, ChildJob::<DeploySource, _>::new(task))
}
