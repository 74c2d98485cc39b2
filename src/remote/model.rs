use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

pub const STATE_IN_PROGRESS: &str = "InProgress";
pub const STATE_COMPLETED: &str = "Completed";
pub const GENERAL_ATTACHMENT: &str = "GeneralAttachment";

/// Collection responses wrap their items in `value`.
#[derive(Deserialize, Debug)]
pub struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdRef {
    pub id: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CaseRef {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRef {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub web_access_url: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest {
    pub name: String,
    pub plan: IdRef,
    pub point_ids: Vec<u64>,
    pub automated: bool,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<IdRef>,
    pub comment: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_settings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtmlab_environment: Option<String>,
}

impl RunPatch {
    pub fn complete(comment: String) -> Self {
        RunPatch {
            state: Some(STATE_COMPLETED.to_string()),
            comment: Some(comment),
            ..RunPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &RunPatch::default()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResult {
    pub id: u64,
    #[serde(default)]
    pub test_case: Option<CaseRef>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub automated_test_name: Option<String>,
    #[serde(default)]
    pub test_case_title: Option<String>,
}

impl RemoteResult {
    pub fn case_id(&self) -> Option<&str> {
        self.test_case.as_ref().map(|case| case.id.as_str())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IterationDetails {
    pub steps: String,
}

/// One entry of a result patch request. Only populated fields are sent, so
/// the same shape covers outcome, metadata, step and owner updates.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultPatch {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automated_test_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automated_test_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automated_test_storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_details: Option<Vec<IterationDetails>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<DisplayRef>,
}

/// Marks a result as produced by this tool rather than a human tester.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutomationIdentity {
    pub test_type: String,
    pub test_storage: String,
}

impl AutomationIdentity {
    pub fn test_name(&self, case_id: &str) -> String {
        format!("TestCase_{}", case_id)
    }
}

impl ResultPatch {
    pub fn outcome(
        result_id: u64,
        case_id: &str,
        outcome: &str,
        comment: String,
        identity: &AutomationIdentity,
    ) -> Self {
        ResultPatch {
            id: result_id,
            outcome: Some(outcome.to_string()),
            state: Some(STATE_COMPLETED.to_string()),
            comment: Some(comment),
            automated_test_name: Some(identity.test_name(case_id)),
            automated_test_type: Some(identity.test_type.clone()),
            automated_test_storage: Some(identity.test_storage.clone()),
            ..ResultPatch::default()
        }
    }

    pub fn metadata(
        result_id: u64,
        duration_in_ms: u64,
        computer_name: String,
        error_message: Option<String>,
    ) -> Self {
        ResultPatch {
            id: result_id,
            duration_in_ms: Some(duration_in_ms),
            computer_name: Some(computer_name),
            error_message,
            ..ResultPatch::default()
        }
    }

    pub fn steps(result_id: u64, steps: String) -> Self {
        ResultPatch {
            id: result_id,
            iteration_details: Some(vec![IterationDetails { steps }]),
            ..ResultPatch::default()
        }
    }

    pub fn owner(result_id: u64, display_name: String) -> Self {
        ResultPatch {
            id: result_id,
            owner: Some(DisplayRef { display_name }),
            ..ResultPatch::default()
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub stream: String,
    pub file_name: String,
    pub comment: String,
    pub attachment_type: String,
}

impl Attachment {
    pub fn general(content: &[u8], file_name: impl Into<String>, comment: impl Into<String>) -> Self {
        Attachment {
            stream: STANDARD.encode(content),
            file_name: file_name.into(),
            comment: comment.into(),
            attachment_type: GENERAL_ATTACHMENT.to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestPoint {
    pub id: u64,
    #[serde(default)]
    pub test_case: Option<CaseRef>,
    #[serde(default)]
    pub assigned_to: Option<DisplayRef>,
}

impl TestPoint {
    /// Owner display name without the trailing `<identity>` part.
    pub fn owner_name(&self) -> Option<String> {
        self.assigned_to
            .as_ref()
            .map(|assigned| assigned.display_name.split('<').next().unwrap_or("").trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

/// A named test configuration (e.g. `Qa-Linux`) that points can be run under.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestConfiguration {
    pub name: String,
    pub description: String,
    pub state: String,
    pub values: Vec<ConfigurationValue>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationValue {
    pub name: String,
    pub value: String,
}

impl TestConfiguration {
    pub fn active(name: impl Into<String>, description: impl Into<String>) -> Self {
        TestConfiguration {
            name: name.into(),
            description: description.into(),
            state: "active".to_string(),
            values: vec![],
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointConfiguration {
    pub id: u64,
    pub configuration: IdRef,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuiteTestCase {
    #[serde(default)]
    pub test_case: Option<CaseRef>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
