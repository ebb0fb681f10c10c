//! Error types for the deployment driver

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::teardown::TeardownReport;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Unsupported workload kind: {0}")]
    UnsupportedWorkloadKind(String),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Service {service} in namespace {namespace} has no cluster IP")]
    MissingClusterIp { service: String, namespace: String },

    #[error("Gave up waiting for {what} after {attempts} attempts")]
    PollExhausted { what: String, attempts: u32 },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Wait for {0} was cancelled")]
    Cancelled(String),

    #[error("{0}")]
    PartialTeardown(Box<TeardownReport>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status code of the underlying cluster error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Cluster(e) => e.status_code(),
            _ => None,
        }
    }

    /// Check if the cluster reported the object as absent
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Teardown report attached to a partial failure
    pub fn teardown_report(&self) -> Option<&TeardownReport> {
        match self {
            Error::PartialTeardown(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_passthrough() {
        let err: Error = ClusterError::api(404, "NotFound", "gone").into();
        assert_eq!(err.status_code(), Some(404));
        assert!(err.is_not_found());

        let err = Error::Config("bad".into());
        assert_eq!(err.status_code(), None);
        assert!(!err.is_not_found());
    }
}
