use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use contentpipe::cli::{Cli, Command, LogFormat};
use contentpipe::config::PipeConfig;
use contentpipe::engine::{JobStatus, Runner};
use contentpipe::pipeline::PipelineFile;
use contentpipe::ui::{RunProgress, print_reports};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = PipeConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_interval_ms = tick_ms;
        config.validate()?;
    }
    debug!(?config, "config loaded");

    match &cli.command {
        Command::Run { file, report } => run(file, *report, &config).await,
        Command::Check { file } => check(file),
    }
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(file: &Path, report: bool, config: &PipeConfig) -> anyhow::Result<ExitCode> {
    let pipelines = PipelineFile::load(file)
        .with_context(|| format!("failed to load pipeline file {}", file.display()))?;
    let jobs = pipelines.build(config)?;

    let progress = Rc::new(if console::user_attended_stderr() {
        RunProgress::new()
    } else {
        RunProgress::hidden()
    });
    let mut runner = Runner::new().with_tick_interval(config.tick_interval());
    runner.add_sink(Rc::clone(&progress));
    runner.activate();
    for job in jobs {
        runner.enqueue(job);
    }

    info!(file = %file.display(), pipelines = runner.pending(), "running pipelines");
    runner.run_until_idle().await;
    progress.finish();

    if report {
        print_reports(runner.reports());
    }

    let failed = runner
        .reports()
        .iter()
        .any(|r| r.status == JobStatus::Failed);
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn check(file: &Path) -> anyhow::Result<ExitCode> {
    let pipelines = PipelineFile::load(file)
        .with_context(|| format!("failed to load pipeline file {}", file.display()))?;
    for spec in &pipelines.pipeline {
        print!("{}", spec.outline());
    }
    println!(
        "{}",
        console::style(format!("{} pipeline(s) OK", pipelines.pipeline.len()))
            .green()
            .bold()
    );
    Ok(ExitCode::SUCCESS)
}
