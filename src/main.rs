// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command-line interface for the vendor report binary.
//!
//! A single invocation loads the YAML configuration, applies command-line
//! overrides, runs the fetch and merge pipeline and writes the CSV and HTML
//! reports. A JSON summary of the written artifacts is printed to stdout.

use std::{io, path::PathBuf, process, time::Duration};

use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vendor_report::{AppConfig, Error, FilterPreset, Pipeline, ReportPaths, emit_reports};

/// Fetch vendors, resolve their owners and write the lifecycle report.
#[derive(Debug, Parser,)]
#[command(name = "vendor-report", version, about = "Generate vendor lifecycle reports")]
struct Cli
{
    /// Path to the YAML configuration file.
    #[arg(
        long = "config",
        value_name = "PATH",
        env = "VENDOR_REPORT_CONFIG",
        default_value = "config.yaml"
    )]
    config: PathBuf,

    /// User resolution strategy, `targeted` or `exhaustive`.
    #[arg(long = "strategy", value_name = "STRATEGY")]
    strategy: Option<String,>,

    /// Lifecycle preset: `approved`, `in_progress` or `rejected_terminated`.
    #[arg(long = "filter", value_name = "PRESET")]
    filter: Option<String,>,

    /// Local directory for the generated reports.
    #[arg(long = "output", value_name = "DIR")]
    output: Option<PathBuf,>,

    /// Append a timestamp to the report filenames.
    #[arg(long = "unique", action = ArgAction::SetTrue)]
    unique: bool,

    /// Print the summary as indented JSON.
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pretty: bool,
}

/// Machine-readable outcome printed after a successful run.
#[derive(Debug, Serialize,)]
struct Summary
{
    preset:   FilterPreset,
    strategy: String,
    rows:     usize,
    #[serde(flatten)]
    paths:    ReportPaths,
}

#[tokio::main]
async fn main()
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into(),),)
        .with_writer(io::stderr,)
        .init();

    if let Err(error,) = run(Cli::parse(),).await {
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

/// Executes one report run.
///
/// # Errors
///
/// Propagates configuration, fetch and report errors.
async fn run(cli: Cli,) -> Result<(), Error,>
{
    let mut config = AppConfig::load(&cli.config,)?;
    apply_overrides(&mut config, &cli,)?;
    let preset = config.filter_preset()?;
    info!(config = %cli.config.display(), %preset, strategy = %config.users.strategy, "starting report run");

    let spinner = spinner(format!("Fetching {}...", preset.title()),);
    let pipeline = Pipeline::from_config(config,)?;
    let result = pipeline.run().await;
    spinner.finish_and_clear();
    let table = result?;

    let paths = emit_reports(
        &table,
        &pipeline.config().output,
        preset,
        chrono::Local::now().naive_local(),
    )?;

    let summary = Summary {
        preset,
        strategy: pipeline.config().users.strategy.clone(),
        rows:     table.len(),
        paths,
    };
    write_summary(&mut io::stdout().lock(), &summary, cli.pretty,)
}

/// Applies command-line overrides on top of the loaded configuration.
///
/// A `--filter` preset replaces any explicit stage and status lists from the
/// file.
fn apply_overrides(config: &mut AppConfig, cli: &Cli,) -> Result<(), Error,>
{
    if let Some(strategy,) = &cli.strategy {
        config.users.strategy = strategy.clone();
    }
    if let Some(filter,) = &cli.filter {
        config.filter.preset = Some(filter.clone(),);
        config.filter.stages.clear();
        config.filter.statuses.clear();
    }
    if let Some(output,) = &cli.output {
        config.output.directory = output.clone();
    }
    if cli.unique {
        config.output.unique_filenames = true;
    }
    config.validate()
}

fn spinner(message: String,) -> ProgressBar
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}",)
            .unwrap_or_else(|_| ProgressStyle::default_spinner(),),
    );
    spinner.set_message(message,);
    spinner.enable_steady_tick(Duration::from_millis(120,),);
    spinner
}

fn write_summary<W: io::Write,>(writer: &mut W, summary: &Summary, pretty: bool,) -> Result<(), Error,>
{
    let rendered = if pretty {
        serde_json::to_string_pretty(summary,)
    } else {
        serde_json::to_string(summary,)
    }
    .map_err(|e| Error::report(format!("failed to encode summary: {e}"),),)?;

    writeln!(writer, "{rendered}")
        .map_err(|e| Error::report(format!("failed to write summary: {e}"),),)
}
