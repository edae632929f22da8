use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use super::fsutil;
use crate::engine::{
    ChildJob, ChildTask, ContentFilter, ContentLedger, ContentSource, Job, JobContext, JobHandle,
};

/// Turns one input asset into zero or more output files.
pub trait Processor {
    fn name(&self) -> &str;

    fn can_process(&self, group: &str, input: &Path) -> bool;

    /// Writes the outputs for `input` below `output` and returns their paths.
    fn process(
        &self,
        group: &str,
        input: &Path,
        output: &Path,
        overwrite: bool,
    ) -> anyhow::Result<Vec<PathBuf>>;
}

/// Copies files with matching extensions to `<output>/<group>/<folder>/`.
#[derive(Debug, Clone)]
pub struct CopyProcessor {
    folder: String,
    extensions: Vec<String>,
}

impl CopyProcessor {
    pub fn new<I, S>(folder: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            folder: folder.into(),
            extensions: extensions
                .into_iter()
                .map(|e| fsutil::normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Processor for CopyProcessor {
    fn name(&self) -> &str {
        "copy"
    }

    fn can_process(&self, _group: &str, input: &Path) -> bool {
        input.is_file() && fsutil::has_extension(input, &self.extensions)
    }

    fn process(
        &self,
        group: &str,
        input: &Path,
        output: &Path,
        overwrite: bool,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let dest = output_path(output, group, &self.folder, input)?;

        // Existing outputs are reported but left alone.
        if dest.exists() && !overwrite {
            return Ok(vec![dest]);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::copy(input, &dest)
            .with_context(|| format!("failed to copy {} to {}", input.display(), dest.display()))?;
        Ok(vec![dest])
    }
}

/// Moves files with matching extensions to `<output>/<group>/<folder>/`,
/// replacing whatever output is already there.
#[derive(Debug, Clone)]
pub struct MoveProcessor {
    folder: String,
    extensions: Vec<String>,
}

impl MoveProcessor {
    pub fn new<I, S>(folder: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let CopyProcessor { folder, extensions } = CopyProcessor::new(folder, extensions);
        Self { folder, extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Processor for MoveProcessor {
    fn name(&self) -> &str {
        "move"
    }

    fn can_process(&self, _group: &str, input: &Path) -> bool {
        input.is_file() && fsutil::has_extension(input, &self.extensions)
    }

    fn process(
        &self,
        group: &str,
        input: &Path,
        output: &Path,
        _overwrite: bool,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let dest = output_path(output, group, &self.folder, input)?;
        if dest.exists() {
            fs::remove_file(&dest)
                .with_context(|| format!("failed to replace {}", dest.display()))?;
        }
        fsutil::move_file(input, &dest)?;
        Ok(vec![dest])
    }
}

fn output_path(output: &Path, group: &str, folder: &str, input: &Path) -> anyhow::Result<PathBuf> {
    let file_name = input
        .file_name()
        .with_context(|| format!("{} has no file name", input.display()))?;
    Ok(output.join(group).join(folder).join(file_name))
}

/// Runs several processors on the same input. Accepts an input only when
/// every child does; outputs are collected in order.
#[derive(Default)]
pub struct CompositeProcessor {
    children: Vec<Box<dyn Processor>>,
}

impl CompositeProcessor {
    pub fn new(children: Vec<Box<dyn Processor>>) -> Self {
        Self { children }
    }
}

impl Processor for CompositeProcessor {
    fn name(&self) -> &str {
        "composite"
    }

    fn can_process(&self, group: &str, input: &Path) -> bool {
        !self.children.is_empty() && self.children.iter().all(|p| p.can_process(group, input))
    }

    fn process(
        &self,
        group: &str,
        input: &Path,
        output: &Path,
        _overwrite: bool,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();
        for child in &self.children {
            let produced = child
                .process(group, input, output, true)
                .with_context(|| format!("processor '{}' failed", child.name()))?;
            outputs.extend(produced);
        }
        Ok(outputs)
    }
}

/// Runs upstream content through processors into a fresh ledger.
///
/// Each unprocessed upstream asset goes to the first processor that accepts
/// it. The new ledger holds only the outputs, so downstream jobs see it in
/// place of the upstream one.
pub struct ProcessContent {
    processors: Vec<Box<dyn Processor>>,
    output: PathBuf,
    overwrite: bool,
    ledger: Option<ContentLedger>,
}

impl ProcessContent {
    pub fn new(processors: Vec<Box<dyn Processor>>, output: impl Into<PathBuf>) -> Self {
        Self {
            processors,
            output: output.into(),
            overwrite: false,
            ledger: None,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl ChildTask<ContentSource> for ProcessContent {
    fn start_child(&mut self, ctx: &JobContext<'_>, source: &JobHandle) -> anyhow::Result<()> {
        let upstream = source.ledger().map(|l| l.clone()).unwrap_or_default();
        fs::create_dir_all(&self.output)
            .with_context(|| format!("failed to create {}", self.output.display()))?;

        let mut ledger = ContentLedger::new();
        let mut skipped = 0;
        for group in upstream.groups() {
            for asset in upstream.assets_filtered(group, ContentFilter::ExcludeProcessed) {
                let input = Path::new(asset);
                let Some(processor) = self.processors.iter().find(|p| p.can_process(group, input))
                else {
                    debug!(job = %ctx.label(), asset, "no processor accepts asset");
                    skipped += 1;
                    continue;
                };
                let outputs = processor
                    .process(group, input, &self.output, self.overwrite)
                    .with_context(|| format!("failed to process {asset}"))?;
                debug!(job = %ctx.label(), asset, processor = processor.name(), outputs = outputs.len(), "asset processed");
                ledger.add_range(group, outputs.iter().map(|p| p.to_string_lossy()));
            }
        }

        info!(job = %ctx.label(), outputs = ledger.len(), skipped, "content processed");
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

pub fn process_content(
    label: impl Into<String>,
    processors: Vec<Box<dyn Processor>>,
    output: impl Into<PathBuf>,
    overwrite: bool,
) -> JobHandle {
    Job::new(
        label,
        ChildJob::<ContentSource, _>::new(ProcessContent::new(processors, output).overwrite(overwrite)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JobStatus;
    use crate::engine::testing::Producer;
    use crate::jobs::import_folder;

    fn assets() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hero.png"), "png").unwrap();
        fs::write(dir.path().join("hero.fbx"), "fbx").unwrap();
        fs::write(dir.path().join("notes.txt"), "txt").unwrap();
        dir
    }

    #[test]
    fn copy_processor_writes_into_group_folder() {
        let input = assets();
        let output = tempfile::tempdir().unwrap();
        let copy = CopyProcessor::new("textures", [".PNG"]);
        let png = input.path().join("hero.png");

        assert_eq!(copy.extensions(), ["png"]);
        assert!(copy.can_process("Chars", &png));
        assert!(!copy.can_process("Chars", &input.path().join("hero.fbx")));

        let outputs = copy.process("Chars", &png, output.path(), false).unwrap();
        assert_eq!(outputs, vec![output.path().join("Chars/textures/hero.png")]);
        assert_eq!(fs::read_to_string(&outputs[0]).unwrap(), "png");
    }

    #[test]
    fn copy_processor_keeps_existing_output_unless_overwriting() {
        let input = assets();
        let output = tempfile::tempdir().unwrap();
        let copy = CopyProcessor::new("textures", ["png"]);
        let png = input.path().join("hero.png");
        copy.process("Chars", &png, output.path(), false).unwrap();

        fs::write(&png, "new").unwrap();
        let outputs = copy.process("Chars", &png, output.path(), false).unwrap();
        assert_eq!(fs::read_to_string(&outputs[0]).unwrap(), "png");
        let outputs = copy.process("Chars", &png, output.path(), true).unwrap();
        assert_eq!(fs::read_to_string(&outputs[0]).unwrap(), "new");
    }

    #[test]
    fn move_processor_replaces_existing_output() {
        let input = assets();
        let output = tempfile::tempdir().unwrap();
        let mover = MoveProcessor::new("models", ["*.FBX"]);
        let fbx = input.path().join("hero.fbx");
        let stale = output.path().join("Chars/models/hero.fbx");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        assert_eq!(mover.extensions(), ["fbx"]);
        assert!(mover.can_process("Chars", &fbx));
        assert!(!mover.can_process("Chars", &input.path().join("hero.png")));

        let outputs = mover.process("Chars", &fbx, output.path(), false).unwrap();
        assert_eq!(outputs, vec![stale.clone()]);
        assert_eq!(fs::read_to_string(&stale).unwrap(), "fbx");
        assert!(!fbx.exists());
    }

    #[test]
    fn composite_processor_needs_every_child() {
        let input = assets();
        let output = tempfile::tempdir().unwrap();
        let composite = CompositeProcessor::new(vec![
            Box::new(CopyProcessor::new("a", ["png"])),
            Box::new(CopyProcessor::new("b", ["png", "fbx"])),
        ]);
        let png = input.path().join("hero.png");

        assert!(composite.can_process("G", &png));
        assert!(!composite.can_process("G", &input.path().join("hero.fbx")));
        assert!(!CompositeProcessor::default().can_process("G", &png));

        let outputs = composite.process("G", &png, output.path(), false).unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(output.path().join("G/a/hero.png").exists());
        assert!(output.path().join("G/b/hero.png").exists());
    }

    #[test]
    fn process_content_replaces_upstream_ledger() {
        let input = assets();
        let upstream = import_folder("import", input.path(), "Chars");
        upstream.start(None);

        let output = tempfile::tempdir().unwrap();
        let job = process_content(
            "process",
            vec![
                Box::new(CopyProcessor::new("textures", ["png"])),
                Box::new(CopyProcessor::new("models", ["fbx"])),
            ],
            output.path(),
            false,
        );
        job.start(Some(upstream));

        assert_eq!(job.status(), JobStatus::Completed);
        let ledger = job.ledger().unwrap();
        assert_eq!(ledger.len(), 2);
        let texture = output.path().join("Chars/textures/hero.png");
        assert!(ledger.contains("Chars", &texture.to_string_lossy()));
        assert!(output.path().join("Chars/models/hero.fbx").exists());
    }

    #[test]
    fn processed_upstream_entries_are_skipped() {
        let input = assets();
        let upstream = import_folder("import", input.path(), "Chars");
        upstream.start(None);
        upstream.ledger_mut().unwrap().mark_all_processed();

        let output = tempfile::tempdir().unwrap();
        let job = process_content(
            "process",
            vec![Box::new(CopyProcessor::new("all", ["*"]))],
            output.path(),
            false,
        );
        job.start(Some(upstream));

        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.ledger().unwrap().is_empty());
    }

    #[test]
    fn processor_error_fails_job() {
        let upstream = Job::new("source", Producer::new("X", ["/definitely/missing.png"]));
        upstream.start(None);

        struct Broken;
        impl Processor for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn can_process(&self, _: &str, _: &Path) -> bool {
                true
            }
            fn process(&self, _: &str, _: &Path, _: &Path, _: bool) -> anyhow::Result<Vec<PathBuf>> {
                anyhow::bail!("codec unavailable")
            }
        }

        let output = tempfile::tempdir().unwrap();
        let job = process_content("process", vec![Box::new(Broken)], output.path(), false);
        job.start(Some(upstream));

        assert!(job.has_failed());
        assert!(job.message().contains("missing.png"));
        assert!(job.message().contains("codec unavailable"));
    }
}
