use crate::config::{Credentials, RunConfig};
use crate::error::{RemoteServiceError, SyncError, SyncResult};
use crate::http::{ApiClient, HttpError, HttpMethod, HttpRequest, ReqParam};
use crate::remote::model::{
    Attachment, CreateRunRequest, IdRef, ListEnvelope, NamedRef, PointConfiguration, RemoteResult,
    RemoteRun, ResultPatch, RunPatch, SuiteTestCase, TestConfiguration, TestPoint,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Operations against the remote test-management service. Implementations
/// perform no retries; every failure surfaces as a [`RemoteServiceError`].
#[async_trait]
pub trait TestManagementApi: Send + Sync {
    async fn create_run(&self, request: &CreateRunRequest) -> SyncResult<RemoteRun>;

    async fn get_run(&self, run_id: u64) -> SyncResult<RemoteRun>;

    async fn patch_run(&self, run_id: u64, patch: &RunPatch) -> SyncResult<RemoteRun>;

    async fn list_results(&self, run_id: u64) -> SyncResult<Vec<RemoteResult>>;

    async fn patch_results(&self, run_id: u64, patches: &[ResultPatch]) -> SyncResult<()>;

    async fn attach_to_result(
        &self,
        run_id: u64,
        result_id: u64,
        attachment: &Attachment,
    ) -> SyncResult<()>;

    async fn attach_to_run(&self, run_id: u64, attachment: &Attachment) -> SyncResult<()>;

    async fn list_points(&self, plan_id: u64, suite_id: u64) -> SyncResult<Vec<TestPoint>>;

    async fn plan_name(&self, plan_id: u64) -> SyncResult<Option<String>>;

    async fn suite_name(&self, plan_id: u64, suite_id: u64) -> SyncResult<Option<String>>;

    async fn list_suite_cases(&self, plan_id: u64, suite_id: u64) -> SyncResult<Vec<SuiteTestCase>>;

    /// Creates a test configuration and returns its id.
    async fn create_configuration(&self, configuration: &TestConfiguration) -> SyncResult<u64>;

    async fn assign_configuration(
        &self,
        plan_id: u64,
        suite_id: u64,
        points: &[PointConfiguration],
    ) -> SyncResult<()>;
}

/// Test configurations are only served by the older API surface.
const CONFIGURATION_API_VERSION: &str = "5.0";

pub struct RestTestManagementClient {
    api_client: ApiClient,
    base: String,
    api_version: String,
}

impl RestTestManagementClient {
    pub fn new(config: &RunConfig, credentials: &Credentials) -> SyncResult<Self> {
        let api_client = ApiClient::new(credentials.authorization_header(), config.request_timeout())
            .map_err(|err| SyncError::Config(err.get_message()))?;
        Ok(Self::with_client(api_client, config))
    }

    pub fn with_client(api_client: ApiClient, config: &RunConfig) -> Self {
        Self {
            api_client,
            base: config.api_base(),
            api_version: config.api_version.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn version(&self) -> Vec<ReqParam> {
        vec![ReqParam::new("api-version", self.api_version.clone())]
    }

    async fn get<T: DeserializeOwned>(&self, operation: &'static str, path: &str) -> SyncResult<T> {
        let value = send(
            &self.api_client,
            operation,
            HttpRequest::get(self.url(path), self.version()),
        )
        .await?;
        decode(operation, value)
    }

    async fn send_json(
        &self,
        operation: &'static str,
        method: HttpMethod,
        path: &str,
        body: Value,
    ) -> SyncResult<Value> {
        send(
            &self.api_client,
            operation,
            HttpRequest::with_body(method, self.url(path), self.version(), body),
        )
        .await
    }
}

pub(crate) async fn send(
    api_client: &ApiClient,
    operation: &'static str,
    request: HttpRequest,
) -> SyncResult<Value> {
    debug!(operation, "sending request");
    match api_client.execute(request).await {
        Ok(result) => Ok(result.body),
        Err(HttpError::Status(status, body)) => {
            Err(RemoteServiceError::status(operation, status, body).into())
        }
        Err(HttpError::Timeout(message)) => Err(RemoteServiceError::timeout(operation, message).into()),
        Err(HttpError::Io(message)) => Err(RemoteServiceError::transport(operation, message).into()),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(operation: &'static str, value: Value) -> SyncResult<T> {
    serde_json::from_value(value).map_err(|err| SyncError::Decode(format!("{}: {}", operation, err)))
}

fn to_body<T: serde::Serialize>(operation: &'static str, payload: &T) -> SyncResult<Value> {
    serde_json::to_value(payload).map_err(|err| SyncError::Decode(format!("{}: {}", operation, err)))
}

#[async_trait]
impl TestManagementApi for RestTestManagementClient {
    async fn create_run(&self, request: &CreateRunRequest) -> SyncResult<RemoteRun> {
        let operation = "create run";
        let value = self
            .send_json(operation, HttpMethod::POST, "test/runs", to_body(operation, request)?)
            .await?;
        decode(operation, value)
    }

    async fn get_run(&self, run_id: u64) -> SyncResult<RemoteRun> {
        self.get("get run", &format!("test/runs/{}", run_id)).await
    }

    async fn patch_run(&self, run_id: u64, patch: &RunPatch) -> SyncResult<RemoteRun> {
        let operation = "patch run";
        let value = self
            .send_json(
                operation,
                HttpMethod::PATCH,
                &format!("test/runs/{}", run_id),
                to_body(operation, patch)?,
            )
            .await?;
        decode(operation, value)
    }

    async fn list_results(&self, run_id: u64) -> SyncResult<Vec<RemoteResult>> {
        let envelope: ListEnvelope<RemoteResult> = self
            .get("list results", &format!("test/runs/{}/results", run_id))
            .await?;
        Ok(envelope.value)
    }

    async fn patch_results(&self, run_id: u64, patches: &[ResultPatch]) -> SyncResult<()> {
        let operation = "patch results";
        self.send_json(
            operation,
            HttpMethod::PATCH,
            &format!("test/runs/{}/results", run_id),
            to_body(operation, &patches)?,
        )
        .await?;
        Ok(())
    }

    async fn attach_to_result(
        &self,
        run_id: u64,
        result_id: u64,
        attachment: &Attachment,
    ) -> SyncResult<()> {
        let operation = "attach to result";
        self.send_json(
            operation,
            HttpMethod::POST,
            &format!("test/Runs/{}/Results/{}/attachments", run_id, result_id),
            to_body(operation, attachment)?,
        )
        .await?;
        Ok(())
    }

    async fn attach_to_run(&self, run_id: u64, attachment: &Attachment) -> SyncResult<()> {
        let operation = "attach to run";
        self.send_json(
            operation,
            HttpMethod::POST,
            &format!("test/runs/{}/attachments", run_id),
            to_body(operation, attachment)?,
        )
        .await?;
        Ok(())
    }

    async fn list_points(&self, plan_id: u64, suite_id: u64) -> SyncResult<Vec<TestPoint>> {
        let envelope: ListEnvelope<TestPoint> = self
            .get(
                "list points",
                &format!("test/plans/{}/suites/{}/points", plan_id, suite_id),
            )
            .await?;
        Ok(envelope.value)
    }

    async fn plan_name(&self, plan_id: u64) -> SyncResult<Option<String>> {
        let plan: NamedRef = self.get("get plan", &format!("test/plans/{}", plan_id)).await?;
        Ok(plan.name)
    }

    async fn suite_name(&self, plan_id: u64, suite_id: u64) -> SyncResult<Option<String>> {
        let suite: NamedRef = self
            .get(
                "get suite",
                &format!("test/plans/{}/suites/{}", plan_id, suite_id),
            )
            .await?;
        Ok(suite.name)
    }

    async fn list_suite_cases(&self, plan_id: u64, suite_id: u64) -> SyncResult<Vec<SuiteTestCase>> {
        let envelope: ListEnvelope<SuiteTestCase> = self
            .get(
                "list suite test cases",
                &format!("test/plans/{}/suites/{}/testcases", plan_id, suite_id),
            )
            .await?;
        Ok(envelope.value)
    }

    async fn create_configuration(&self, configuration: &TestConfiguration) -> SyncResult<u64> {
        let operation = "create configuration";
        let value = send(
            &self.api_client,
            operation,
            HttpRequest::with_body(
                HttpMethod::POST,
                self.url("test/configurations"),
                vec![ReqParam::new("api-version", CONFIGURATION_API_VERSION)],
                to_body(operation, configuration)?,
            ),
        )
        .await?;
        let created: IdRef = decode(operation, value)?;
        Ok(created.id)
    }

    async fn assign_configuration(
        &self,
        plan_id: u64,
        suite_id: u64,
        points: &[PointConfiguration],
    ) -> SyncResult<()> {
        let operation = "assign configuration";
        self.send_json(
            operation,
            HttpMethod::PATCH,
            &format!("test/plans/{}/suites/{}/points", plan_id, suite_id),
            to_body(operation, &points)?,
        )
        .await?;
        Ok(())
    }
}
