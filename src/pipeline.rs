//! Declarative pipeline files.
//!
//! A pipeline file holds one or more `[[pipeline]]` entries, each an ordered
//! list of stages tagged by `kind`:
//!
//! ```toml
//! [[pipeline]]
//! label = "characters"
//!
//! [[pipeline.stages]]
//! kind = "import_folder"
//! folder = "incoming/characters"
//! group = "Characters"
//!
//! [[pipeline.stages]]
//! kind = "publish"
//! output = "build/content"
//! ```
//!
//! Files ending in `.json` are read as JSON, everything else as TOML.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipeConfig;
use crate::engine::{Composite, JobHandle};
use crate::error::{PipeError, Result};
use crate::jobs::{self, CompositeProcessor, CopyProcessor, MoveProcessor, Processor};
use crate::notify::WebhookClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineFile {
    #[serde(default)]
    pub pipeline: Vec<PipelineSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub label: String,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

/// One stage of a pipeline. Stage labels default to the stage kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSpec {
    ImportFolder {
        label: Option<String>,
        folder: PathBuf,
        group: String,
    },
    IncludeStatic {
        label: Option<String>,
        folder: PathBuf,
        #[serde(default = "wildcard")]
        extension: String,
        group: Option<String>,
    },
    /// Forks the ledger of an earlier stage, referenced by label.
    Reuse {
        label: Option<String>,
        from: String,
    },
    Consume {
        label: Option<String>,
    },
    MoveImported {
        label: Option<String>,
        target: PathBuf,
    },
    Process {
        label: Option<String>,
        output: PathBuf,
        #[serde(default)]
        overwrite: bool,
        processors: Vec<ProcessorSpec>,
    },
    Publish {
        label: Option<String>,
        output: PathBuf,
    },
    PostDeploy {
        label: Option<String>,
        target: PathBuf,
        #[serde(default = "yes")]
        keep_source: bool,
        #[serde(default)]
        overwrite: bool,
    },
    /// Falls back to the configured `notify_url` when `url` is absent.
    Notify {
        label: Option<String>,
        url: Option<String>,
    },
    Command {
        label: Option<String>,
        program: String,
        #[serde(default)]
        args: Vec<String>,
        cwd: Option<PathBuf>,
    },
    CopyFolder {
        label: Option<String>,
        source: PathBuf,
        target: PathBuf,
        #[serde(default)]
        overwrite: bool,
    },
    MoveFolder {
        label: Option<String>,
        source: PathBuf,
        target: PathBuf,
    },
    ClearFolder {
        label: Option<String>,
        folder: PathBuf,
    },
    Marker {
        label: Option<String>,
        id: String,
    },
    /// Nested pipeline run as a single stage.
    Sequence {
        label: String,
        #[serde(default)]
        stages: Vec<StageSpec>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorSpec {
    Copy {
        folder: String,
        extensions: Vec<String>,
    },
    /// Like `copy`, but moves the input and replaces existing outputs.
    Move {
        folder: String,
        extensions: Vec<String>,
    },
    Composite {
        processors: Vec<ProcessorSpec>,
    },
}

fn wildcard() -> String {
    "*".to_string()
}

fn yes() -> bool {
    true
}

impl PipelineFile {
    /// Reads and validates a pipeline file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PipeError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file = if is_json {
            Self::from_json(&contents)?
        } else {
            Self::from_toml(&contents)?
        };
        file.validate()?;
        debug!(path = %path.display(), pipelines = file.pipeline.len(), "pipeline file loaded");
        Ok(file)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Checks labels, required fields and `reuse` references.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.is_empty() {
            return Err(PipeError::pipeline("file defines no pipelines"));
        }
        let mut seen = HashSet::new();
        for spec in &self.pipeline {
            spec.validate_with(&mut seen)?;
        }
        ensure_unique_reuse_targets(self.pipeline.iter().flat_map(|spec| &spec.stages))
    }

    /// Builds every pipeline. `reuse` stages may refer to stages of an
    /// earlier pipeline in the same file.
    pub fn build(&self, config: &PipeConfig) -> Result<Vec<JobHandle>> {
        let mut builder = Builder::new(config);
        self.pipeline
            .iter()
            .map(|spec| builder.pipeline(spec))
            .collect()
    }
}

impl PipelineSpec {
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&mut HashSet::new())?;
        ensure_unique_reuse_targets(&self.stages)
    }

    fn validate_with(&self, seen: &mut HashSet<String>) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(PipeError::pipeline("pipeline label must not be empty"));
        }
        for stage in &self.stages {
            stage
                .validate(seen)
                .map_err(|e| PipeError::pipeline(format!("pipeline '{}': {}", self.label, detail(e))))?;
        }
        Ok(())
    }

    /// Compiles the pipeline into a composite job.
    pub fn build(&self, config: &PipeConfig) -> Result<JobHandle> {
        Builder::new(config).pipeline(self)
    }

    /// Indented stage tree, one stage per line.
    pub fn outline(&self) -> String {
        let mut out = format!("{}\n", self.label);
        for stage in &self.stages {
            stage.outline_into(&mut out, 1);
        }
        out
    }
}

impl StageSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            StageSpec::ImportFolder { .. } => "import_folder",
            StageSpec::IncludeStatic { .. } => "include_static",
            StageSpec::Reuse { .. } => "reuse",
            StageSpec::Consume { .. } => "consume",
            StageSpec::MoveImported { .. } => "move_imported",
            StageSpec::Process { .. } => "process",
            StageSpec::Publish { .. } => "publish",
            StageSpec::PostDeploy { .. } => "post_deploy",
            StageSpec::Notify { .. } => "notify",
            StageSpec::Command { .. } => "command",
            StageSpec::CopyFolder { .. } => "copy_folder",
            StageSpec::MoveFolder { .. } => "move_folder",
            StageSpec::ClearFolder { .. } => "clear_folder",
            StageSpec::Marker { .. } => "marker",
            StageSpec::Sequence { .. } => "sequence",
        }
    }

    pub fn label(&self) -> &str {
        let label = match self {
            StageSpec::Sequence { label, .. } => return label,
            StageSpec::ImportFolder { label, .. }
            | StageSpec::IncludeStatic { label, .. }
            | StageSpec::Reuse { label, .. }
            | StageSpec::Consume { label }
            | StageSpec::MoveImported { label, .. }
            | StageSpec::Process { label, .. }
            | StageSpec::Publish { label, .. }
            | StageSpec::PostDeploy { label, .. }
            | StageSpec::Notify { label, .. }
            | StageSpec::Command { label, .. }
            | StageSpec::CopyFolder { label, .. }
            | StageSpec::MoveFolder { label, .. }
            | StageSpec::ClearFolder { label, .. }
            | StageSpec::Marker { label, .. } => label,
        };
        label.as_deref().unwrap_or(self.kind())
    }

    fn validate(&self, seen: &mut HashSet<String>) -> Result<()> {
        let label = self.label();
        if label.trim().is_empty() {
            return Err(PipeError::pipeline(format!("{} stage has an empty label", self.kind())));
        }
        let fail = |field: &str| {
            Err(PipeError::pipeline(format!("stage '{label}': `{field}` must not be empty")))
        };

        match self {
            StageSpec::ImportFolder { folder, group, .. } => {
                if is_blank(folder) {
                    return fail("folder");
                }
                if group.trim().is_empty() {
                    return fail("group");
                }
            }
            StageSpec::IncludeStatic { folder, group, .. } => {
                if is_blank(folder) {
                    return fail("folder");
                }
                if group.as_deref().is_some_and(|g| g.trim().is_empty()) {
                    return fail("group");
                }
            }
            StageSpec::Reuse { from, .. } => {
                if !seen.contains(from.as_str()) {
                    return Err(PipeError::pipeline(format!(
                        "stage '{label}': no earlier stage is labelled '{from}'"
                    )));
                }
            }
            StageSpec::MoveImported { target, .. } | StageSpec::PostDeploy { target, .. } => {
                if is_blank(target) {
                    return fail("target");
                }
            }
            StageSpec::Process {
                output, processors, ..
            } => {
                if is_blank(output) {
                    return fail("output");
                }
                if processors.is_empty() {
                    return fail("processors");
                }
                for processor in processors {
                    processor
                        .validate()
                        .map_err(|e| PipeError::pipeline(format!("stage '{label}': {}", detail(e))))?;
                }
            }
            StageSpec::Publish { output, .. } => {
                if is_blank(output) {
                    return fail("output");
                }
            }
            StageSpec::Notify { url, .. } => {
                if url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                    return fail("url");
                }
            }
            StageSpec::Command { program, .. } => {
                if program.trim().is_empty() {
                    return fail("program");
                }
            }
            StageSpec::CopyFolder { source, target, .. }
            | StageSpec::MoveFolder { source, target, .. } => {
                if is_blank(source) {
                    return fail("source");
                }
                if is_blank(target) {
                    return fail("target");
                }
            }
            StageSpec::ClearFolder { folder, .. } => {
                if is_blank(folder) {
                    return fail("folder");
                }
            }
            StageSpec::Marker { id, .. } => {
                if id.trim().is_empty() {
                    return fail("id");
                }
            }
            StageSpec::Consume { .. } => {}
            StageSpec::Sequence { stages, .. } => {
                for stage in stages {
                    stage.validate(seen)?;
                }
            }
        }

        seen.insert(label.to_string());
        Ok(())
    }

    fn outline_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        if self.label() == self.kind() {
            let _ = writeln!(out, "{indent}- {}", self.kind());
        } else {
            let _ = writeln!(out, "{indent}- {} ({})", self.label(), self.kind());
        }
        if let StageSpec::Sequence { stages, .. } = self {
            for stage in stages {
                stage.outline_into(out, depth + 1);
            }
        }
    }
}

impl ProcessorSpec {
    fn kind(&self) -> &'static str {
        match self {
            ProcessorSpec::Copy { .. } => "copy",
            ProcessorSpec::Move { .. } => "move",
            ProcessorSpec::Composite { .. } => "composite",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ProcessorSpec::Copy { folder, extensions }
            | ProcessorSpec::Move { folder, extensions } => {
                let kind = self.kind();
                if folder.trim().is_empty() {
                    return Err(PipeError::pipeline(format!("{kind} processor needs a folder")));
                }
                if extensions.iter().all(|e| e.trim().is_empty()) {
                    return Err(PipeError::pipeline(format!(
                        "{kind} processor '{folder}' needs at least one extension"
                    )));
                }
            }
            ProcessorSpec::Composite { processors } => {
                if processors.is_empty() {
                    return Err(PipeError::pipeline("composite processor is empty"));
                }
                for processor in processors {
                    processor.validate()?;
                }
            }
        }
        Ok(())
    }

    fn build(&self) -> Box<dyn Processor> {
        match self {
            ProcessorSpec::Copy { folder, extensions } => {
                Box::new(CopyProcessor::new(folder.clone(), extensions))
            }
            ProcessorSpec::Move { folder, extensions } => {
                Box::new(MoveProcessor::new(folder.clone(), extensions))
            }
            ProcessorSpec::Composite { processors } => Box::new(CompositeProcessor::new(
                processors.iter().map(ProcessorSpec::build).collect(),
            )),
        }
    }
}

/// A label that a `reuse` stage points at must name exactly one stage.
fn ensure_unique_reuse_targets<'a>(stages: impl IntoIterator<Item = &'a StageSpec>) -> Result<()> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut targets = Vec::new();
    let mut pending: Vec<&StageSpec> = stages.into_iter().collect();
    while let Some(stage) = pending.pop() {
        *counts.entry(stage.label()).or_default() += 1;
        match stage {
            StageSpec::Reuse { from, .. } => targets.push(from.as_str()),
            StageSpec::Sequence { stages, .. } => pending.extend(stages),
            _ => {}
        }
    }

    targets.sort_unstable();
    match targets.into_iter().find(|from| counts.get(from).is_some_and(|n| *n > 1)) {
        Some(from) => Err(PipeError::pipeline(format!(
            "`reuse` refers to '{from}', but more than one stage has that label"
        ))),
        None => Ok(()),
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

fn detail(err: PipeError) -> String {
    match err {
        PipeError::Pipeline(msg) => msg,
        other => other.to_string(),
    }
}

/// Turns specs into jobs, remembering built stages for `reuse` lookups.
struct Builder<'a> {
    config: &'a PipeConfig,
    built: HashMap<String, JobHandle>,
}

impl<'a> Builder<'a> {
    fn new(config: &'a PipeConfig) -> Self {
        Self {
            config,
            built: HashMap::new(),
        }
    }

    fn pipeline(&mut self, spec: &PipelineSpec) -> Result<JobHandle> {
        let stages = self.stages(&spec.stages)?;
        Ok(Composite::sequence(spec.label.clone(), stages))
    }

    fn stages(&mut self, specs: &[StageSpec]) -> Result<Vec<JobHandle>> {
        specs.iter().map(|stage| self.stage(stage)).collect()
    }

    fn stage(&mut self, spec: &StageSpec) -> Result<JobHandle> {
        let label = spec.label().to_string();
        let job = match spec {
            StageSpec::ImportFolder { folder, group, .. } => {
                jobs::import_folder(&label, folder, group.clone())
            }
            StageSpec::IncludeStatic {
                folder,
                extension,
                group,
                ..
            } => jobs::include_static(&label, folder, extension, group.clone()),
            StageSpec::Reuse { from, .. } => {
                let source = self.built.get(from).cloned().ok_or_else(|| {
                    PipeError::pipeline(format!("stage '{label}': no earlier stage is labelled '{from}'"))
                })?;
                jobs::reuse_ledger(&label, source)
            }
            StageSpec::Consume { .. } => jobs::consume_content(&label),
            StageSpec::MoveImported { target, .. } => jobs::move_imported(&label, target),
            StageSpec::Process {
                output,
                overwrite,
                processors,
                ..
            } => jobs::process_content(
                &label,
                processors.iter().map(ProcessorSpec::build).collect(),
                output,
                *overwrite,
            ),
            StageSpec::Publish { output, .. } => jobs::publish(&label, output),
            StageSpec::PostDeploy {
                target,
                keep_source,
                overwrite,
                ..
            } => jobs::post_deploy(&label, target, *keep_source, *overwrite),
            StageSpec::Notify { url, .. } => {
                let url = url
                    .clone()
                    .or_else(|| self.config.notify_url.clone())
                    .ok_or_else(|| {
                        PipeError::pipeline(format!(
                            "stage '{label}': no url given and no notify_url configured"
                        ))
                    })?;
                let client = WebhookClient::new(url, self.config.notify_timeout())?;
                jobs::notify_deploy(&label, client)
            }
            StageSpec::Command {
                program, args, cwd, ..
            } => jobs::run_command(&label, program.clone(), args.clone(), cwd.clone()),
            StageSpec::CopyFolder {
                source,
                target,
                overwrite,
                ..
            } => jobs::copy_folder(&label, source, target, *overwrite),
            StageSpec::MoveFolder { source, target, .. } => jobs::move_folder(&label, source, target),
            StageSpec::ClearFolder { folder, .. } => jobs::clear_folder(&label, folder),
            StageSpec::Marker { id, .. } => jobs::log_marker(&label, id.clone()),
            StageSpec::Sequence { stages, .. } => {
                let stages = self.stages(stages)?;
                Composite::sequence(&label, stages)
            }
        };
        self.built.insert(label, job.clone());
        Ok(job)
    }
}
