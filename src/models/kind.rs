//! Object kinds handled by the driver

use serde::{Deserialize, Serialize};

/// Cluster object kinds the driver creates or removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Namespace,
    Service,
    Deployment,
    DaemonSet,
    Pod,
    Secret,
    Autoscaler,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Namespace => write!(f, "Namespace"),
            ObjectKind::Service => write!(f, "Service"),
            ObjectKind::Deployment => write!(f, "Deployment"),
            ObjectKind::DaemonSet => write!(f, "DaemonSet"),
            ObjectKind::Pod => write!(f, "Pod"),
            ObjectKind::Secret => write!(f, "Secret"),
            ObjectKind::Autoscaler => write!(f, "HorizontalPodAutoscaler"),
        }
    }
}

/// Kinds a workload can be deployed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
}

impl WorkloadKind {
    pub fn object_kind(self) -> ObjectKind {
        match self {
            WorkloadKind::Deployment => ObjectKind::Deployment,
            WorkloadKind::DaemonSet => ObjectKind::DaemonSet,
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.object_kind().fmt(f)
    }
}

impl std::str::FromStr for WorkloadKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployment" => Ok(WorkloadKind::Deployment),
            "DaemonSet" => Ok(WorkloadKind::DaemonSet),
            other => Err(crate::Error::UnsupportedWorkloadKind(other.to_string())),
        }
    }
}
