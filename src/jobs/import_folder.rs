use std::path::PathBuf;

use anyhow::{Context, ensure};
use tracing::info;

use super::fsutil;
use crate::engine::{ContentLedger, Job, JobContext, JobHandle, Task};

/// Records every file under a folder in a fresh ledger.
pub struct ImportFolder {
    folder: PathBuf,
    group: String,
    ledger: Option<ContentLedger>,
}

impl ImportFolder {
    pub fn new(folder: impl Into<PathBuf>, group: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            group: group.into(),
            ledger: None,
        }
    }
}

impl Task for ImportFolder {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        ensure!(
            self.folder.is_dir(),
            "import folder {} does not exist",
            self.folder.display()
        );

        let files = fsutil::list_files(&self.folder)
            .with_context(|| format!("failed to scan {}", self.folder.display()))?;
        let mut ledger = ContentLedger::new();
        for file in &files {
            ledger.add(&self.group, &file.to_string_lossy());
        }
        info!(job = %ctx.label(), group = %self.group, files = files.len(), "folder imported");

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

pub fn import_folder(
    label: impl Into<String>,
    folder: impl Into<PathBuf>,
    group: impl Into<String>,
) -> JobHandle {
    Job::new(label, ImportFolder::new(folder, group))
}
