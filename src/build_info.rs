use crate::config::{Credentials, RunConfig};
use crate::error::{SyncError, SyncResult};
use crate::http::{ApiClient, HttpRequest, ReqParam};
use crate::remote::client::{decode, send};
use crate::remote::model::ListEnvelope;
use async_trait::async_trait;
use serde::Deserialize;

pub(crate) const DEFAULT_PLATFORM: &str = "ubuntu-latest";
pub(crate) const DEFAULT_FLAVOR: &str = "CI";

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub id: u64,
    #[serde(default)]
    pub build_number: String,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default, rename = "queue", deserialize_with = "queue_name")]
    pub queue_name: Option<String>,
    #[serde(default, rename = "repository", deserialize_with = "repository_type")]
    pub repository_type: Option<String>,
}

impl BuildInfo {
    /// Last segment of the source branch, e.g. `main` for `refs/heads/main`.
    pub fn stage(&self) -> String {
        self.source_branch
            .as_deref()
            .and_then(|branch| branch.rsplit('/').next())
            .unwrap_or("")
            .to_string()
    }

    pub fn platform(&self) -> String {
        self.queue_name.clone().unwrap_or_else(|| DEFAULT_PLATFORM.to_string())
    }

    pub fn flavor(&self) -> String {
        self.repository_type.clone().unwrap_or_else(|| DEFAULT_FLAVOR.to_string())
    }
}

fn queue_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Queue {
        name: Option<String>,
    }
    Ok(Option::<Queue>::deserialize(deserializer)?.and_then(|queue| queue.name))
}

fn repository_type<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Repository {
        #[serde(rename = "type")]
        kind: Option<String>,
    }
    Ok(Option::<Repository>::deserialize(deserializer)?.and_then(|repository| repository.kind))
}

#[async_trait]
pub trait BuildInfoProvider: Send + Sync {
    /// Most recent successful build of `definition_id`.
    async fn latest_successful(&self, definition_id: u64) -> SyncResult<BuildInfo>;
}

pub struct RestBuildInfoProvider {
    api_client: ApiClient,
    base: String,
    api_version: String,
}

impl RestBuildInfoProvider {
    pub fn new(config: &RunConfig, credentials: &Credentials) -> SyncResult<Self> {
        let api_client = ApiClient::new(credentials.authorization_header(), config.request_timeout())
            .map_err(|err| SyncError::Config(err.get_message()))?;
        Ok(Self {
            api_client,
            base: config.api_base(),
            api_version: config.build_api_version.clone(),
        })
    }
}

#[async_trait]
impl BuildInfoProvider for RestBuildInfoProvider {
    async fn latest_successful(&self, definition_id: u64) -> SyncResult<BuildInfo> {
        let operation = "list builds";
        let value = send(
            &self.api_client,
            operation,
            HttpRequest::get(
                format!("{}/build/builds", self.base),
                vec![
                    ReqParam::new("definitions", definition_id.to_string()),
                    ReqParam::new("statusFilter", "completed"),
                    ReqParam::new("resultFilter", "succeeded"),
                    ReqParam::new("$top", "1"),
                    ReqParam::new("api-version", self.api_version.clone()),
                ],
            ),
        )
        .await?;
        let builds: ListEnvelope<BuildInfo> = decode(operation, value)?;
        let latest = builds.value.into_iter().next().ok_or_else(|| {
            SyncError::NotFound(format!("no successful build for definition {}", definition_id))
        })?;

        let operation = "get build";
        let value = send(
            &self.api_client,
            operation,
            HttpRequest::get(
                format!("{}/build/builds/{}", self.base, latest.id),
                vec![ReqParam::new("api-version", self.api_version.clone())],
            ),
        )
        .await?;
        decode(operation, value)
    }
}
