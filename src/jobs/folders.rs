use std::fs;
use std::path::PathBuf;

use anyhow::{Context, ensure};
use tracing::info;

use super::fsutil;
use crate::engine::{Job, JobContext, JobHandle, Task};

/// Synchronous folder housekeeping.
#[derive(Debug, Clone)]
pub enum FolderTask {
    Copy {
        source: PathBuf,
        target: PathBuf,
        overwrite: bool,
    },
    /// Copy then delete the source folder.
    Move { source: PathBuf, target: PathBuf },
    /// Empty a folder, keeping the folder itself.
    Clear { folder: PathBuf },
}

impl Task for FolderTask {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        match self {
            FolderTask::Copy {
                source,
                target,
                overwrite,
            } => {
                ensure!(source.is_dir(), "folder {} does not exist", source.display());
                let copied = fsutil::copy_dir(source, target, *overwrite)?;
                info!(job = %ctx.label(), from = %source.display(), to = %target.display(), copied, "folder copied");
            }
            FolderTask::Move { source, target } => {
                ensure!(source.is_dir(), "folder {} does not exist", source.display());
                let moved = fsutil::copy_dir(source, target, true)?;
                fs::remove_dir_all(&*source)
                    .with_context(|| format!("failed to remove {}", source.display()))?;
                info!(job = %ctx.label(), from = %source.display(), to = %target.display(), moved, "folder moved");
            }
            FolderTask::Clear { folder } => {
                fsutil::clear_dir_contents(folder)?;
                info!(job = %ctx.label(), folder = %folder.display(), "folder cleared");
            }
        }
        ctx.succeed();
        Ok(())
    }
}

pub fn copy_folder(
    label: impl Into<String>,
    source: impl Into<PathBuf>,
    target: impl Into<PathBuf>,
    overwrite: bool,
) -> JobHandle {
    Job::new(
        label,
        FolderTask::Copy {
            source: source.into(),
            target: target.into(),
            overwrite,
        },
    )
}

pub fn move_folder(
    label: impl Into<String>,
    source: impl Into<PathBuf>,
    target: impl Into<PathBuf>,
) -> JobHandle {
    Job::new(
        label,
        FolderTask::Move {
            source: source.into(),
            target: target.into(),
        },
    )
}

pub fn clear_folder(label: impl Into<String>, folder: impl Into<PathBuf>) -> JobHandle {
    Job::new(
        label,
        FolderTask::Clear {
            folder: folder.into(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JobStatus;

    #[test]
    fn copy_then_clear() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "a").unwrap();
        let dst = tempfile::tempdir().unwrap();

        let copy = copy_folder("copy", src.path(), dst.path().join("out"), false);
        copy.start(None);
        assert_eq!(copy.status(), JobStatus::Completed);
        assert!(dst.path().join("out/a.txt").exists());

        let clear = clear_folder("clear", dst.path().join("out"));
        clear.start(None);
        assert_eq!(clear.status(), JobStatus::Completed);
        assert!(dst.path().join("out").exists());
        assert!(!dst.path().join("out/a.txt").exists());
    }

    #[test]
    fn move_removes_source() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("staging");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();

        let job = move_folder("move", &src, root.path().join("final"));
        job.start(None);

        assert_eq!(job.status(), JobStatus::Completed);
        assert!(!src.exists());
        assert!(root.path().join("final/nested/b.txt").exists());
    }

    #[test]
    fn copy_of_missing_folder_fails() {
        let root = tempfile::tempdir().unwrap();
        let job = copy_folder("copy", root.path().join("missing"), root.path().join("out"), true);

        assert!(!job.start(None));
        assert!(job.message().contains("does not exist"));
    }

    #[test]
    fn clearing_missing_folder_is_fine() {
        let root = tempfile::tempdir().unwrap();
        let job = clear_folder("clear", root.path().join("missing"));
        job.start(None);
        assert_eq!(job.status(), JobStatus::Completed);
    }
}
