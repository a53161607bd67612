// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Configuration document consumed by the report pipeline.
//!
//! The YAML file is parsed into a generic value first so that `${VAR}` and
//! `$VAR` references inside string scalars can be expanded from the process
//! environment before the typed document is built. Unknown variables are left
//! untouched. Validation runs once, before any network call, and turns every
//! invalid combination into [`Error::Configuration`].

use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Error},
    merge::{FilterPreset, LifecycleFilter},
    retry::RetryConfig,
    users::UserStrategy,
};

const DEFAULT_API_VERSION: &str = "v2";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Largest page the inventory service accepts.
const DEFAULT_VENDOR_PAGE_SIZE: u32 = 50;
const DEFAULT_USER_PAGE_SIZE: u32 = 500;
const DEFAULT_MAX_IN_FLIGHT: usize = 8;
const DEFAULT_OUTPUT_DIR: &str = "~/Downloads";

/// Root configuration document.
///
/// # Examples
///
/// ```
/// use vendor_report::AppConfig;
///
/// let yaml = r#"
/// api:
///   base_url: https://tenant.example.com
///   token: secret
/// "#;
/// let config = AppConfig::from_yaml(yaml,).expect("valid configuration",);
/// assert_eq!(config.pagination.vendor_page_size, 50);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct AppConfig
{
    /// Remote API connection settings.
    pub api:              ApiConfig,
    /// Page sizes for the paged endpoints.
    #[serde(default)]
    pub pagination:       PaginationConfig,
    /// Retry and backoff behaviour shared by every request.
    #[serde(default)]
    pub retry:            RetryConfig,
    /// User resolution strategy and its concurrency bound.
    #[serde(default)]
    pub users:            UserConfig,
    /// Lifecycle filter applied during merge.
    #[serde(default)]
    pub filter:           FilterConfig,
    /// Owner id substituted for vendors without a business owner.
    ///
    /// Lookups are never issued for this id.
    #[serde(default)]
    pub default_owner_id: Option<String,>,
    /// Cancel sibling requests on the first fatal error.
    #[serde(default = "default_fail_fast")]
    pub fail_fast:        bool,
    /// Report destination.
    #[serde(default)]
    pub output:           OutputConfig,
}

/// Connection settings for the remote API.
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct ApiConfig
{
    /// Scheme and host, e.g. `https://tenant.example.com`.
    pub base_url:     String,
    /// Bearer token sent with every request.
    #[serde(skip_serializing)]
    pub token:        String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Version segment inserted into every path.
    #[serde(default = "default_api_version")]
    pub api_version:  String,
}

impl ApiConfig
{
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self,) -> Duration
    {
        Duration::from_secs(self.timeout_secs,)
    }
}

/// Page sizes for the vendor inventory and the user directory.
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct PaginationConfig
{
    #[serde(default = "default_vendor_page_size")]
    pub vendor_page_size: u32,
    #[serde(default = "default_user_page_size")]
    pub user_page_size:   u32,
}

impl Default for PaginationConfig
{
    fn default() -> Self
    {
        Self {
            vendor_page_size: DEFAULT_VENDOR_PAGE_SIZE,
            user_page_size:   DEFAULT_USER_PAGE_SIZE,
        }
    }
}

/// User resolution settings.
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct UserConfig
{
    /// `targeted` or `exhaustive`.
    #[serde(default = "default_strategy")]
    pub strategy:      String,
    /// Upper bound on simultaneous per-user lookups in targeted mode.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for UserConfig
{
    fn default() -> Self
    {
        Self {
            strategy:      default_strategy(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Lifecycle filter settings.
///
/// Explicit `stages`/`statuses` lists override the preset's predicate while
/// the preset still names the report.
#[derive(Debug, Clone, Default, Deserialize, Serialize,)]
pub struct FilterConfig
{
    #[serde(default)]
    pub preset:   Option<String,>,
    #[serde(default)]
    pub stages:   Vec<String,>,
    #[serde(default)]
    pub statuses: Vec<String,>,
}

/// Report destination settings.
#[derive(Debug, Clone, Deserialize, Serialize,)]
pub struct OutputConfig
{
    /// Local directory used when the shared directory is unavailable.
    #[serde(default = "default_output_dir")]
    pub directory:        PathBuf,
    /// Synchronized network share preferred when it exists.
    #[serde(default)]
    pub shared_directory: Option<PathBuf,>,
    /// Append a timestamp to generated filenames.
    #[serde(default)]
    pub unique_filenames: bool,
}

impl Default for OutputConfig
{
    fn default() -> Self
    {
        Self {
            directory:        default_output_dir(),
            shared_directory: None,
            unique_filenames: false,
        }
    }
}

impl AppConfig
{
    /// Loads, expands and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read,
    /// [`Error::ConfigParse`] when the YAML is malformed and
    /// [`Error::Configuration`] when validation fails.
    pub fn load(path: &Path,) -> Result<Self, Error,>
    {
        let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
        Self::from_yaml(&contents,)
    }

    /// Parses, expands and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::load`] minus the I/O failure.
    pub fn from_yaml(contents: &str,) -> Result<Self, Error,>
    {
        let mut raw: serde_yaml::Value = serde_yaml::from_str(contents,)?;
        expand_value(&mut raw,);
        let mut config: Self = serde_yaml::from_value(raw,)?;
        config.output.directory = expand_home(&config.output.directory,);
        config.output.shared_directory = config.output.shared_directory.as_deref().map(expand_home,);
        config.validate()?;
        Ok(config,)
    }

    /// Checks invariants that cannot be expressed through serde defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first violation.
    pub fn validate(&self,) -> Result<(), Error,>
    {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(Error::configuration("api.base_url must be provided",),);
        }
        if !(base_url.starts_with("http://",) || base_url.starts_with("https://",)) {
            return Err(Error::configuration(format!(
                "api.base_url must start with http:// or https://, got '{base_url}'"
            ),),);
        }
        // References left after expansion name unset variables.
        if self.api.token.trim().is_empty() || env_pattern().is_match(&self.api.token,) {
            return Err(Error::configuration("api.token is empty or references an unset variable",),);
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::configuration("api.timeout_secs must be positive",),);
        }
        if self.pagination.vendor_page_size == 0 || self.pagination.user_page_size == 0 {
            return Err(Error::configuration("page sizes must be positive",),);
        }
        if self.users.max_in_flight == 0 {
            return Err(Error::configuration("users.max_in_flight must be positive",),);
        }
        self.retry.validate()?;
        self.user_strategy()?;
        self.lifecycle_filter()?;
        Ok((),)
    }

    /// Parsed user resolution strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown strategy names.
    pub fn user_strategy(&self,) -> Result<UserStrategy, Error,>
    {
        UserStrategy::from_str(&self.users.strategy,)
    }

    /// Selected preset, defaulting to approved vendors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown preset names.
    pub fn filter_preset(&self,) -> Result<FilterPreset, Error,>
    {
        match self.filter.preset.as_deref() {
            Some(name,) => FilterPreset::from_str(name,),
            None => Ok(FilterPreset::Approved,),
        }
    }

    /// Lifecycle filter resolved from the preset and explicit overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown preset names.
    pub fn lifecycle_filter(&self,) -> Result<LifecycleFilter, Error,>
    {
        let preset = self.filter_preset()?;
        if self.filter.stages.is_empty() && self.filter.statuses.is_empty() {
            return Ok(preset.filter(),);
        }
        if self.filter.stages.is_empty() {
            return Err(Error::configuration(
                "filter.statuses requires filter.stages to be provided",
            ),);
        }
        Ok(LifecycleFilter::new(
            self.filter.stages.clone(),
            self.filter.statuses.clone(),
        ),)
    }
}

/// Expands `${VAR}` and `$VAR` references in every string scalar.
fn expand_value(value: &mut serde_yaml::Value,)
{
    match value {
        serde_yaml::Value::String(text,) => {
            if text.contains('$',) {
                *text = expand_env(text,);
            }
        }
        serde_yaml::Value::Sequence(items,) => items.iter_mut().for_each(expand_value,),
        serde_yaml::Value::Mapping(map,) => map.iter_mut().for_each(|(_, item,)| expand_value(item,),),
        serde_yaml::Value::Tagged(tagged,) => expand_value(&mut tagged.value,),
        _ => {}
    }
}

fn env_pattern() -> &'static Regex
{
    static PATTERN: OnceLock<Regex,> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)",)
            .unwrap_or_else(|error| panic!("env pattern must compile: {error}"),)
    },)
}

/// Replaces environment references, keeping unknown ones verbatim.
pub(crate) fn expand_env(input: &str,) -> String
{
    env_pattern()
        .replace_all(input, |caps: &Captures<'_,>| {
            let name = caps.get(1,).or_else(|| caps.get(2,),).map_or("", |m| m.as_str(),);
            env::var(name,).unwrap_or_else(|_| caps[0].to_owned(),)
        },)
        .into_owned()
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &Path,) -> PathBuf
{
    let Ok(rest,) = path.strip_prefix("~",) else {
        return path.to_path_buf();
    };
    match env::var_os("HOME",).or_else(|| env::var_os("USERPROFILE",),) {
        Some(home,) => PathBuf::from(home,).join(rest,),
        None => path.to_path_buf(),
    }
}

fn default_fail_fast() -> bool
{
    true
}

fn default_timeout_secs() -> u64
{
    DEFAULT_TIMEOUT_SECS
}

fn default_api_version() -> String
{
    DEFAULT_API_VERSION.to_owned()
}

fn default_vendor_page_size() -> u32
{
    DEFAULT_VENDOR_PAGE_SIZE
}

fn default_user_page_size() -> u32
{
    DEFAULT_USER_PAGE_SIZE
}

fn default_strategy() -> String
{
    UserStrategy::Targeted.as_str().to_owned()
}

fn default_max_in_flight() -> usize
{
    DEFAULT_MAX_IN_FLIGHT
}

fn default_output_dir() -> PathBuf
{
    PathBuf::from(DEFAULT_OUTPUT_DIR,)
}

#[cfg(test)]
mod tests
{
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;

    const MINIMAL: &str = r#"
api:
  base_url: https://tenant.example.com
  token: secret
"#;

    fn expect_configuration_error(yaml: &str, needle: &str,)
    {
        match AppConfig::from_yaml(yaml,) {
            Err(Error::Configuration {
                message,
            },) => assert!(message.contains(needle,), "unexpected message: {message}"),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_document_uses_defaults()
    {
        let config = AppConfig::from_yaml(MINIMAL,).expect("valid config",);
        assert_eq!(config.api.api_version, "v2");
        assert_eq!(config.api.timeout(), Duration::from_secs(30,));
        assert_eq!(config.pagination.vendor_page_size, 50);
        assert_eq!(config.pagination.user_page_size, 500);
        assert_eq!(config.users.max_in_flight, 8);
        assert!(config.fail_fast);
        assert!(!config.output.unique_filenames);
        assert_eq!(config.user_strategy().expect("strategy",), UserStrategy::Targeted);
        assert_eq!(config.filter_preset().expect("preset",), FilterPreset::Approved);
    }

    #[test]
    fn rejects_zero_page_size()
    {
        let yaml = format!("{MINIMAL}pagination:\n  vendor_page_size: 0\n");
        expect_configuration_error(&yaml, "page sizes must be positive",);
    }

    #[test]
    fn rejects_unknown_strategy()
    {
        let yaml = format!("{MINIMAL}users:\n  strategy: psychic\n");
        expect_configuration_error(&yaml, "unknown user strategy 'psychic'",);
    }

    #[test]
    fn rejects_unknown_preset()
    {
        let yaml = format!("{MINIMAL}filter:\n  preset: archived\n");
        expect_configuration_error(&yaml, "unknown filter preset 'archived'",);
    }

    #[test]
    fn rejects_zero_concurrency_bound()
    {
        let yaml = format!("{MINIMAL}users:\n  max_in_flight: 0\n");
        expect_configuration_error(&yaml, "max_in_flight",);
    }

    #[test]
    fn rejects_zero_retry_attempts()
    {
        let yaml = format!("{MINIMAL}retry:\n  max_attempts: 0\n");
        expect_configuration_error(&yaml, "max_attempts",);
    }

    #[test]
    fn rejects_base_url_without_scheme()
    {
        expect_configuration_error(
            "api:\n  base_url: tenant.example.com\n  token: secret\n",
            "must start with http",
        );
    }

    #[test]
    fn rejects_unset_token_variable()
    {
        expect_configuration_error(
            "api:\n  base_url: https://x.example\n  token: ${VENDOR_REPORT_SURELY_UNSET_TOKEN}\n",
            "api.token",
        );
    }

    #[test]
    fn accepts_literal_token_with_dollar_sign()
    {
        let yaml = "api:\n  base_url: https://x.example\n  token: \"$3cret-value\"\n";
        let config = AppConfig::from_yaml(yaml,).expect("valid config",);
        assert_eq!(config.api.token, "$3cret-value");
    }

    #[test]
    fn expands_environment_references()
    {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("VENDOR_REPORT_TEST_HOST", "tenant.example.com",) };
        let expanded = expand_env("https://${VENDOR_REPORT_TEST_HOST}/x/$VENDOR_REPORT_TEST_HOST",);
        assert_eq!(expanded, "https://tenant.example.com/x/tenant.example.com");
    }

    #[test]
    fn leaves_unknown_references_verbatim()
    {
        assert_eq!(
            expand_env("${VENDOR_REPORT_NOT_DEFINED_ANYWHERE}",),
            "${VENDOR_REPORT_NOT_DEFINED_ANYWHERE}"
        );
        assert_eq!(expand_env("cost: 5$",), "cost: 5$");
    }

    #[test]
    fn explicit_stages_override_preset_predicate()
    {
        let yaml = format!(
            "{MINIMAL}filter:\n  preset: in_progress\n  stages: [Live]\n  statuses: [active]\n"
        );
        let config = AppConfig::from_yaml(&yaml,).expect("valid config",);
        let filter = config.lifecycle_filter().expect("filter",);
        assert_eq!(filter, LifecycleFilter::new(vec!["Live".into()], vec!["active".into()],));
    }

    #[test]
    fn statuses_without_stages_are_rejected()
    {
        let yaml = format!("{MINIMAL}filter:\n  statuses: [active]\n");
        expect_configuration_error(&yaml, "filter.statuses",);
    }

    #[test]
    fn home_prefix_is_expanded()
    {
        let expanded = expand_home(Path::new("/absolute/path",),);
        assert_eq!(expanded, Path::new("/absolute/path",));
        if let Some(home,) = env::var_os("HOME",) {
            assert_eq!(expand_home(Path::new("~/Downloads",),), Path::new(&home,).join("Downloads",));
        }
    }

    #[test]
    fn load_reads_file_from_disk()
    {
        let temp = tempdir().expect("failed to create tempdir",);
        let path = temp.path().join("config.yaml",);
        fs::write(&path, MINIMAL,).expect("failed to write config",);
        let config = AppConfig::load(&path,).expect("config should load",);
        assert_eq!(config.api.base_url, "https://tenant.example.com");
    }

    #[test]
    fn load_reports_missing_file()
    {
        let error = AppConfig::load(Path::new("/nonexistent/config.yaml",),).unwrap_err();
        assert!(matches!(error, Error::Io { .. }));
    }
}
