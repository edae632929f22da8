//! Concrete job bodies built on the engine.
//!
//! Every constructor returns a ready-to-start [`JobHandle`]. Jobs that need
//! upstream content are capability-gated through [`ChildJob`].
//!
//! [`JobHandle`]: crate::engine::JobHandle
//! [`ChildJob`]: crate::engine::ChildJob

mod command;
mod consume;
mod deploy;
mod folders;
mod fsutil;
mod import_folder;
mod include_static;
mod marker;
mod move_imported;
mod notify;
mod process;
mod publish;
mod reuse;

pub use command::{RunCommand, run_command};
pub use consume::{ConsumeContent, consume_content};
pub use deploy::{PostDeploy, post_deploy};
pub use folders::{FolderTask, clear_folder, copy_folder, move_folder};
pub use import_folder::{ImportFolder, import_folder};
pub use include_static::{IncludeStatic, include_static};
pub use marker::{LogMarker, log_marker};
pub use move_imported::{MoveImported, move_imported};
pub use notify::{NotifyDeploy, notify_deploy};
pub use process::{
    CompositeProcessor, CopyProcessor, MoveProcessor, ProcessContent, Processor, process_content,
};
pub use publish::{Publish, publish};
pub use reuse::{ReuseLedger, reuse_ledger};

use crate::engine::{ContentLedger, ContentSource, JobContext};

/// Copy of the nearest upstream ledger, or an empty one.
fn upstream_ledger(ctx: &JobContext<'_>) -> ContentLedger {
    let Some(source) = ctx.find_ancestor::<ContentSource>() else {
        return ContentLedger::new();
    };
    source.ledger().map(|l| l.clone()).unwrap_or_default()
}
