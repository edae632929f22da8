use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::fsutil;
use crate::engine::{
    ChildJob, ChildTask, ContentFilter, ContentLedger, ContentSource, Job, JobContext, JobHandle,
};

/// Moves upstream files under `target`, keeping their layout relative to the
/// deepest folder they share. Files already under `target` stay put.
///
/// Exposes a ledger with the new locations; processed flags carry over.
pub struct MoveImported {
    target: PathBuf,
    ledger: Option<ContentLedger>,
}

impl MoveImported {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            ledger: None,
        }
    }

    fn destination(&self, file: &Path, common: Option<&Path>) -> PathBuf {
        let relative = common
            .and_then(|c| file.strip_prefix(c).ok())
            .map(Path::to_path_buf)
            .or_else(|| file.file_name().map(PathBuf::from))
            .unwrap_or_else(|| file.to_path_buf());
        self.target.join(relative)
    }
}

impl ChildTask<ContentSource> for MoveImported {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        let upstream = source.ledger().map(|l| l.clone()).unwrap_or_default();

        let to_move: Vec<PathBuf> = upstream
            .all_assets(ContentFilter::All)
            .into_iter()
            .map(PathBuf::from)
            .filter(|p| !p.starts_with(&self.target))
            .collect();
        let common = fsutil::common_dir(&to_move);

        let mut ledger = ContentLedger::new();
        let mut moved = 0;
        for group in upstream.groups() {
            let processed = upstream.assets_filtered(group, ContentFilter::OnlyProcessed);
            for artifact in upstream.assets(group) {
                let file = Path::new(artifact);
                let new_path = if file.starts_with(&self.target) {
                    file.to_path_buf()
                } else {
                    let dest = self.destination(file, common.as_deref());
                    if let Err(err) = fsutil::move_file(file, &dest) {
                        warn!(job = %ctx.label(), file = %file.display(), error = %format!("{err:#}"), "failed to move asset");
                        continue;
                    }
                    moved += 1;
                    dest
                };
                let new_path = new_path.to_string_lossy();
                ledger.add(group, &new_path);
                if processed.contains(&artifact) {
                    ledger.mark_processed(&new_path);
                }
            }
        }

        info!(job = %ctx.label(), target = %self.target.display(), moved, "imported assets moved");
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

pub fn move_imported(label: impl Into<String>, target: impl Into<PathBuf>) -> JobHandle {
    Job::new(label, ChildJob::<ContentSource, _>::new(MoveImported::new(target)))
}
