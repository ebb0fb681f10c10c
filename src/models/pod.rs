//! Pod observations and resolved service endpoints

use std::net::IpAddr;

use k8s_openapi::api::core::v1::{Pod, Service};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Simplified pod phase. Unknown strings map to [`PodPhase::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A pod as seen by one poll. Never cached across polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodObservation {
    pub name: String,
    pub namespace: Option<String>,
    pub phase: PodPhase,
    pub ip: Option<String>,
}

impl PodObservation {
    pub fn is_running_in(&self, namespace: &str) -> bool {
        self.phase == PodPhase::Running && self.namespace.as_deref() == Some(namespace)
    }
}

impl From<&Pod> for PodObservation {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone(),
            phase: status
                .and_then(|s| s.phase.as_deref())
                .map(PodPhase::from)
                .unwrap_or(PodPhase::Unknown),
            ip: status.and_then(|s| s.pod_ip.clone()),
        }
    }
}

/// Stable in-cluster address of a ready workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub service: String,
    pub namespace: String,
    pub cluster_ip: IpAddr,
    /// Running pods observed by the poll that converged
    pub pods: Vec<PodObservation>,
}

impl ServiceEndpoint {
    pub fn from_service(
        service: &Service,
        namespace: &str,
        pods: Vec<PodObservation>,
    ) -> Result<Self> {
        let name = service.metadata.name.clone().unwrap_or_default();
        let missing = || Error::MissingClusterIp {
            service: name.clone(),
            namespace: namespace.to_string(),
        };

        let raw = service
            .spec
            .as_ref()
            .and_then(|s| s.cluster_ip.as_deref())
            .filter(|ip| !ip.is_empty() && *ip != "None")
            .ok_or_else(missing)?;

        let cluster_ip = raw
            .parse()
            .map_err(|_| Error::InvalidObject(format!("service {} has cluster IP {:?}", name, raw)))?;

        Ok(Self {
            service: name,
            namespace: namespace.to_string(),
            cluster_ip,
            pods,
        })
    }
}
