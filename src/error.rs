use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A failed call against the test-management service. `status` is `None`
/// when no response was received (connection failure or timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServiceError {
    pub operation: &'static str,
    pub status: Option<u16>,
    pub body: String,
    timed_out: bool,
}

impl RemoteServiceError {
    pub fn status(operation: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self {
            operation,
            status: Some(status),
            body: body.into(),
            timed_out: false,
        }
    }

    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            status: None,
            body: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            status: None,
            body: message.into(),
            timed_out: true,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl Display for RemoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failed with status {}: {}", self.operation, status, self.body),
            None if self.timed_out => write!(f, "{} timed out: {}", self.operation, self.body),
            None => write!(f, "{} failed: {}", self.operation, self.body),
        }
    }
}

impl std::error::Error for RemoteServiceError {}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    RemoteService(#[from] RemoteServiceError),
    #[error("case {case_id} is not part of this run's plan")]
    UnknownCase { case_id: String },
    #[error("run {run_id} returned no results although {planned_points} test points were planned")]
    MappingIncomplete { run_id: u64, planned_points: usize },
    #[error("run is {actual}, expected {expected}")]
    RunState { expected: String, actual: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("could not decode remote payload: {0}")]
    Decode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("artifact capture failed: {0}")]
    Artifact(String),
}

impl SyncError {
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            SyncError::RemoteService(err) => err.status,
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_message_carries_status_and_body() {
        let err: SyncError = RemoteServiceError::status("patch results", 400, "bad payload").into();
        assert_eq!(err.remote_status(), Some(400));
        assert_eq!(err.to_string(), "patch results failed with status 400: bad payload");
    }

    #[test]
    fn timeout_is_a_remote_error_without_status() {
        let err = RemoteServiceError::timeout("create run", "no response after 30s");
        assert!(err.is_timeout());
        assert_eq!(err.status, None);
        assert_eq!(err.to_string(), "create run timed out: no response after 30s");
    }
}
