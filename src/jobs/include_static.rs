use std::path::PathBuf;

use anyhow::ensure;
use tracing::{info, warn};

use super::fsutil;
use crate::engine::{ContentLedger, Job, JobContext, JobHandle, Task};

/// Adds a folder of static files to the upstream content.
///
/// Starts from a copy of the nearest upstream ledger, or an empty one. Matching
/// files go to `group` when given, otherwise to every group the copy already
/// holds.
pub struct IncludeStatic {
    folder: PathBuf,
    extension: String,
    group: Option<String>,
    ledger: Option<ContentLedger>,
}

impl IncludeStatic {
    pub fn new(folder: impl Into<PathBuf>, extension: &str, group: Option<String>) -> Self {
        Self {
            folder: folder.into(),
            extension: fsutil::normalize_extension(extension),
            group,
            ledger: None,
        }
    }
}

impl Task for IncludeStatic {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        ensure!(
            self.folder.is_dir(),
            "static folder {} does not exist",
            self.folder.display()
        );

        let mut ledger = super::upstream_ledger(ctx);

        let extensions = [self.extension.clone()];
        let files: Vec<String> = fsutil::list_files(&self.folder)?
            .into_iter()
            .filter(|f| fsutil::has_extension(f, &extensions))
            .map(|f| f.to_string_lossy().into_owned())
            .collect();

        let targets: Vec<String> = match &self.group {
            Some(group) => vec![group.clone()],
            None => ledger.groups().map(str::to_string).collect(),
        };
        if targets.is_empty() {
            warn!(job = %ctx.label(), "no group to include static files into");
        }
        for group in &targets {
            ledger.add_range(group, &files);
        }
        info!(
            job = %ctx.label(),
            folder = %self.folder.display(),
            files = files.len(),
            groups = targets.len(),
            "static files included"
        );

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

pub fn include_static(
    label: impl Into<String>,
    folder: impl Into<PathBuf>,
    extension: &str,
    group: Option<String>,
) -> JobHandle {
    Job::new(label, IncludeStatic::new(folder, extension, group))
}
