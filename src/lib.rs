// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Vendor inventory reporting against a paginated REST API.
//!
//! The library walks the vendor inventory page by page, resolves business
//! owners either one by one or from the full user directory, joins both into
//! a flat table and renders it as CSV and HTML. Every HTTP call goes through
//! a single [`Transport`] seam and a shared [`retry_with_backoff`] policy, so
//! the whole pipeline can be driven by a scripted transport in tests.

mod config;
mod error;
mod merge;
mod model;
mod pagination;
mod pipeline;
mod report;
mod retry;
mod transport;
mod users;

pub use config::{
    ApiConfig, AppConfig, FilterConfig, OutputConfig, PaginationConfig, UserConfig,
};
pub use error::{Error, describe_status, io_error};
pub use merge::{COLUMNS, FilterPreset, LifecycleFilter, MergedRow, MergedTable, merge};
pub use model::{UserRecord, VendorRecord, flatten, lookup, text_of};
pub use pagination::{Endpoint, PageFetcher, PageScheme};
pub use pipeline::Pipeline;
pub use report::{
    ReportPaths, emit_reports, render_html, report_file_stem, select_output_directory,
    write_spreadsheet,
};
pub use retry::{RetryConfig, retry_with_backoff};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
pub use users::{
    ExhaustiveResolver, TargetedResolver, UserDirectory, UserResolver, UserStrategy,
};
