//! Run configuration.
//!
//! A run is described by a YAML document whose keys map one-to-one onto
//! [`RunConfig`]. Unknown keys are rejected. The access token is never read
//! from the file; it comes from `RUNSYNC_PAT`.

use crate::error::{SyncError, SyncResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bon::Builder;
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PAT_ENV: &str = "RUNSYNC_PAT";
pub const SUITE_TYPE_ENV: &str = "SUITE_TYPE";
pub const PIPELINE_MODE_ENV: &str = "PIPELINE_MODE";
pub const TEST_ENV_ENV: &str = "TEST_ENV";

#[derive(Deserialize, Builder, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[builder(into)]
    pub org_url: String,
    #[builder(into)]
    pub project: String,
    pub plan_id: u64,
    pub suite_id: u64,
    #[serde(default)]
    pub build_definition_id: Option<u64>,
    #[builder(into)]
    pub test_env: String,
    #[serde(default = "default_suite_type")]
    #[builder(into, default = default_suite_type())]
    pub suite_type: String,
    #[serde(default = "default_pipeline_mode")]
    #[builder(into, default = default_pipeline_mode())]
    pub pipeline_mode: String,
    #[serde(default)]
    #[builder(into)]
    pub domain_tag: Option<String>,
    #[serde(default = "default_api_version")]
    #[builder(into, default = default_api_version())]
    pub api_version: String,
    #[serde(default = "default_build_api_version")]
    #[builder(into, default = default_build_api_version())]
    pub build_api_version: String,
    #[serde(default = "default_timeout_secs")]
    #[builder(default = default_timeout_secs())]
    pub request_timeout_secs: u64,
    #[serde(default = "default_artifacts_dir")]
    #[builder(into, default = default_artifacts_dir())]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_test_settings")]
    #[builder(into, default = default_test_settings())]
    pub test_settings: String,
    #[serde(default = "default_test_type")]
    #[builder(into, default = default_test_type())]
    pub automated_test_type: String,
    #[serde(default = "default_test_storage")]
    #[builder(into, default = default_test_storage())]
    pub automated_test_storage: String,
    /// Creates an `{Env}-{OS}` test configuration at start and assigns it to every point.
    #[serde(default)]
    #[builder(default)]
    pub assign_configuration: bool,
}

fn default_suite_type() -> String {
    "regression".to_string()
}

fn default_pipeline_mode() -> String {
    "local".to_string()
}

fn default_api_version() -> String {
    "7.1".to_string()
}

fn default_build_api_version() -> String {
    "7.1-preview.7".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_test_settings() -> String {
    "Automation".to_string()
}

fn default_test_type() -> String {
    "PlaywrightTest".to_string()
}

fn default_test_storage() -> String {
    "playwright.automation".to_string()
}

impl RunConfig {
    pub fn from_yaml(source: &str) -> SyncResult<Self> {
        let config: RunConfig =
            serde_yaml::from_str(source).map_err(|err| SyncError::Config(err.to_string()))?;
        config.validated()
    }

    pub fn load(path: &Path) -> SyncResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| SyncError::Config(format!("{}: {}", path.display(), err)))?;
        Self::from_yaml(&source)
    }

    /// Applies `SUITE_TYPE`, `PIPELINE_MODE` and `TEST_ENV` when set.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(suite_type) = non_empty(SUITE_TYPE_ENV) {
            self.suite_type = suite_type;
        }
        if let Some(mode) = non_empty(PIPELINE_MODE_ENV) {
            self.pipeline_mode = mode;
        }
        if let Some(env) = non_empty(TEST_ENV_ENV) {
            self.test_env = env;
        }
    }

    pub fn validated(mut self) -> SyncResult<Self> {
        self.org_url = self.org_url.trim_end_matches('/').to_string();
        let required = [
            ("org_url", &self.org_url),
            ("project", &self.project),
            ("test_env", &self.test_env),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SyncError::Config(format!("{} must not be empty", key)));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config("request_timeout_secs must be positive".to_string()));
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn api_base(&self) -> String {
        format!("{}/{}/_apis", self.org_url, self.project)
    }

    pub fn is_pipeline(&self) -> bool {
        self.pipeline_mode.eq_ignore_ascii_case("cicd")
    }
}

#[derive(Clone)]
pub struct Credentials {
    pat: String,
}

impl Credentials {
    pub fn new(pat: impl Into<String>) -> Self {
        Self { pat: pat.into() }
    }

    pub fn from_env() -> SyncResult<Self> {
        match std::env::var(PAT_ENV) {
            Ok(pat) if !pat.trim().is_empty() => Ok(Self::new(pat)),
            _ => Err(SyncError::Config(format!("{} is not set", PAT_ENV))),
        }
    }

    pub fn authorization_header(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!(":{}", self.pat)))
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(***)")
    }
}
