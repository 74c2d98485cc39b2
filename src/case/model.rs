use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Terminal outcome of a case. Parsing is case-insensitive; anything
/// unrecognized is kept verbatim so it can still be written to the remote
/// result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    NotExecuted,
    Other(String),
}

impl Outcome {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "passed" => Outcome::Passed,
            "failed" => Outcome::Failed,
            "skipped" => Outcome::Skipped,
            "notexecuted" => Outcome::NotExecuted,
            _ => Outcome::Other(value.to_string()),
        }
    }

    /// Wire spelling sent to the remote service.
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Passed => "Passed",
            Outcome::Failed => "Failed",
            Outcome::Skipped => "Skipped",
            Outcome::NotExecuted => "NotExecuted",
            Outcome::Other(raw) => raw,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed)
    }
}

impl FromStr for Outcome {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Outcome::parse(s))
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Outcome::parse(&raw))
    }
}

/// One recorded sub-assertion of a case, in execution order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub action: String,
    pub expected: String,
    pub outcome: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Step {
    pub fn new(action: impl Into<String>, expected: impl Into<String>, outcome: impl Into<String>) -> Self {
        Step {
            action: action.into(),
            expected: expected.into(),
            outcome: outcome.into(),
            timestamp: None,
        }
    }

    pub fn passed(&self) -> bool {
        Outcome::parse(&self.outcome) == Outcome::Passed
    }
}
