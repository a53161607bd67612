// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Report emitters for merged vendor tables.
//!
//! Every run produces two artifacts side by side: a CSV spreadsheet with a
//! 1-based index column and a standalone HTML page with the same rows. Both
//! share a filename stem derived from the lifecycle preset, optionally
//! suffixed with a timestamp so repeated runs do not overwrite each other.
//! The destination prefers a synchronized shared directory and falls back to
//! the local output directory when the share is not mounted.

use std::{
    borrow::Cow,
    fmt::Write as _,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::OutputConfig,
    error::{self, Error},
    merge::{FilterPreset, MergedTable},
};

const INDEX_HEADER: &str = "#";

const STYLESHEET: &str = "\
body { font-family: Arial, sans-serif; font-size: 15px; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #dddddd; padding: 6px 8px; text-align: left; vertical-align: top; }
th { background-color: #808080; color: #ffffff; }
tbody tr:nth-child(even) { background-color: #f2f2f2; }
";

/// Locations of the artifacts written by [`emit_reports`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct ReportPaths
{
    /// CSV spreadsheet.
    pub spreadsheet: PathBuf,
    /// HTML document.
    pub document:    PathBuf,
}

/// Builds the filename stem shared by both artifacts.
///
/// ```
/// use chrono::NaiveDate;
/// use vendor_report::{FilterPreset, report_file_stem};
///
/// let now = NaiveDate::from_ymd_opt(2024, 5, 6,)
///     .and_then(|date| date.and_hms_opt(7, 8, 9,),)
///     .expect("valid timestamp",);
/// assert_eq!(report_file_stem(FilterPreset::Approved, false, now,), "Approved_Vendors");
/// assert_eq!(
///     report_file_stem(FilterPreset::InProgress, true, now,),
///     "In_Progress_Vendors_20240506070809"
/// );
/// ```
pub fn report_file_stem(preset: FilterPreset, unique: bool, now: NaiveDateTime,) -> String
{
    let stem = format!("{}_Vendors", preset.file_prefix());
    if unique {
        format!("{stem}_{}", now.format("%Y%m%d%H%M%S",))
    } else {
        stem
    }
}

/// Chooses the directory reports are written to and makes sure it exists.
///
/// # Errors
///
/// Returns [`Error::Io`] when the fallback directory cannot be created.
pub fn select_output_directory(output: &OutputConfig,) -> Result<PathBuf, Error,>
{
    if let Some(shared,) = output.shared_directory.as_deref() {
        if shared.is_dir() {
            return Ok(shared.to_path_buf(),);
        }
        warn!(path = %shared.display(), "shared directory unavailable, using local output");
    }

    fs::create_dir_all(&output.directory,)
        .map_err(|source| error::io_error(&output.directory, source,),)?;
    Ok(output.directory.clone(),)
}

/// Writes both report artifacts for `table`.
///
/// # Errors
///
/// Returns [`Error::Io`] when a file cannot be created or written and
/// [`Error::Report`] when the CSV encoder fails.
///
/// # Example
///
/// ```no_run
/// use vendor_report::{AppConfig, FilterPreset, Pipeline, emit_reports};
///
/// # async fn example() -> Result<(), vendor_report::Error> {
/// let config = AppConfig::load(std::path::Path::new("config.yaml",),)?;
/// let table = Pipeline::from_config(config.clone(),)?.run().await?;
/// let paths = emit_reports(
///     &table,
///     &config.output,
///     FilterPreset::Approved,
///     chrono::Local::now().naive_local(),
/// )?;
/// println!("{}", paths.document.display());
/// # Ok(())
/// # }
/// ```
pub fn emit_reports(
    table: &MergedTable,
    output: &OutputConfig,
    preset: FilterPreset,
    now: NaiveDateTime,
) -> Result<ReportPaths, Error,>
{
    let directory = select_output_directory(output,)?;
    let stem = report_file_stem(preset, output.unique_filenames, now,);

    let spreadsheet = directory.join(format!("{stem}.csv"),);
    let document = directory.join(format!("{stem}.html"),);

    write_spreadsheet(table, &spreadsheet,)?;
    write_document(&document, &render_html(table, preset.title(),),)?;

    info!(
        rows = table.len(),
        spreadsheet = %spreadsheet.display(),
        document = %document.display(),
        "reports written"
    );

    Ok(ReportPaths {
        spreadsheet,
        document,
    },)
}

/// Writes `table` as CSV with a leading 1-based index column.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Report`] when writing fails.
pub fn write_spreadsheet(table: &MergedTable, path: &Path,) -> Result<(), Error,>
{
    let file = File::create(path,).map_err(|source| error::io_error(path, source,),)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file,),);

    writer.write_record(std::iter::once(INDEX_HEADER,).chain(table.columns.iter().copied(),),)?;
    for (index, row,) in table.rows.iter().enumerate() {
        let position = (index + 1).to_string();
        writer.write_record(std::iter::once(position.as_str(),).chain(row.cells(),),)?;
    }

    writer.flush().map_err(|source| error::io_error(path, source,),)
}

/// Renders `table` as a standalone HTML page titled `title`.
///
/// Cells holding `http://` or `https://` URLs become links; everything else
/// is escaped verbatim.
pub fn render_html(table: &MergedTable, title: &str,) -> String
{
    let mut buffer = String::with_capacity(1024 + table.len() * 256,);
    let title = escape_html(title,);

    let _ = writeln!(
        buffer,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{STYLESHEET}</style>\n</head>\n<body>\n<h2>{title}</h2>\n<table>\n<thead>\n<tr>"
    );
    let _ = write!(buffer, "<th>{INDEX_HEADER}</th>");
    for column in &table.columns {
        let _ = write!(buffer, "<th>{}</th>", escape_html(column,));
    }
    buffer.push_str("</tr>\n</thead>\n<tbody>\n",);

    for (index, row,) in table.rows.iter().enumerate() {
        let _ = write!(buffer, "<tr><td>{}</td>", index + 1);
        for cell in row.cells() {
            let _ = write!(buffer, "<td>{}</td>", render_cell(cell,));
        }
        buffer.push_str("</tr>\n",);
    }

    buffer.push_str("</tbody>\n</table>\n</body>\n</html>\n",);
    buffer
}

fn write_document(path: &Path, contents: &str,) -> Result<(), Error,>
{
    let file = File::create(path,).map_err(|source| error::io_error(path, source,),)?;
    let mut writer = BufWriter::new(file,);
    writer
        .write_all(contents.as_bytes(),)
        .map_err(|source| error::io_error(path, source,),)?;
    writer.flush().map_err(|source| error::io_error(path, source,),)
}

fn render_cell(cell: &str,) -> Cow<'_, str,>
{
    let trimmed = cell.trim();
    if is_link(trimmed,) {
        let href = escape_html(trimmed,);
        Cow::Owned(format!("<a href=\"{href}\" target=\"_blank\">{href}</a>"),)
    } else {
        escape_html(cell,)
    }
}

fn is_link(cell: &str,) -> bool
{
    (cell.starts_with("http://",) || cell.starts_with("https://",))
        && !cell.chars().any(char::is_whitespace,)
}

fn escape_html(value: &str,) -> Cow<'_, str,>
{
    if !value.chars().any(|c| matches!(c, '&' | '<' | '>' | '"' | '\''),) {
        return Cow::Borrowed(value,);
    }
    let mut escaped = String::with_capacity(value.len() + 16,);
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;",),
            '<' => escaped.push_str("&lt;",),
            '>' => escaped.push_str("&gt;",),
            '"' => escaped.push_str("&quot;",),
            '\'' => escaped.push_str("&#39;",),
            other => escaped.push(other,),
        }
    }
    Cow::Owned(escaped,)
}
