//! Desired-state workload objects

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Service;
use serde::{Deserialize, Serialize, Serializer};

use super::{LabelScheme, WorkloadKind};
use crate::{Error, Result};

/// A fully resolved workload object, tagged by kind.
///
/// Deserializes from a Kubernetes object by reading its `kind` field; any kind
/// other than `Deployment` or `DaemonSet` is rejected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum WorkloadSpec {
    Deployment(Deployment),
    DaemonSet(DaemonSet),
}

impl TryFrom<serde_json::Value> for WorkloadSpec {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        let kind: WorkloadKind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or_else(|| Error::InvalidObject("workload without kind".into()))?
            .parse()?;

        Ok(match kind {
            WorkloadKind::Deployment => WorkloadSpec::Deployment(serde_json::from_value(value)?),
            WorkloadKind::DaemonSet => WorkloadSpec::DaemonSet(serde_json::from_value(value)?),
        })
    }
}

impl Serialize for WorkloadSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            WorkloadSpec::Deployment(d) => d.serialize(serializer),
            WorkloadSpec::DaemonSet(d) => d.serialize(serializer),
        }
    }
}

impl From<Deployment> for WorkloadSpec {
    fn from(deployment: Deployment) -> Self {
        WorkloadSpec::Deployment(deployment)
    }
}

impl From<DaemonSet> for WorkloadSpec {
    fn from(daemonset: DaemonSet) -> Self {
        WorkloadSpec::DaemonSet(daemonset)
    }
}

impl WorkloadSpec {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            WorkloadSpec::Deployment(_) => WorkloadKind::Deployment,
            WorkloadSpec::DaemonSet(_) => WorkloadKind::DaemonSet,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            WorkloadSpec::Deployment(d) => d.metadata.name.as_deref(),
            WorkloadSpec::DaemonSet(d) => d.metadata.name.as_deref(),
        }
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            WorkloadSpec::Deployment(d) => d.metadata.labels.as_ref(),
            WorkloadSpec::DaemonSet(d) => d.metadata.labels.as_ref(),
        }
    }

    /// Declared replica count. Daemonsets have none.
    pub fn replicas(&self) -> Option<i32> {
        match self {
            WorkloadSpec::Deployment(d) => d.spec.as_ref().and_then(|s| s.replicas),
            WorkloadSpec::DaemonSet(_) => None,
        }
    }
}

/// Object graph for one workload, as produced by the recipe layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecipe {
    #[serde(default)]
    pub service: Option<Service>,
    #[serde(default, alias = "deployment")]
    pub workload: Option<WorkloadSpec>,
}

impl WorkloadRecipe {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What the readiness poller waits for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    /// Value of the per-workload label; also the service name stem
    pub label: String,
    pub namespace: String,
    pub replicas: usize,
    pub kind: WorkloadKind,
}

impl WorkloadDescriptor {
    pub fn new(label: impl Into<String>, namespace: impl Into<String>, replicas: usize, kind: WorkloadKind) -> Self {
        Self {
            label: label.into(),
            namespace: namespace.into(),
            replicas,
            kind,
        }
    }

    /// Derive a descriptor from a workload object.
    ///
    /// The label comes from the workload label, falling back to the object
    /// name. Replicas come from `spec.replicas`, then the replicas label, then 1.
    pub fn for_workload(workload: &WorkloadSpec, namespace: &str, labels: &LabelScheme) -> Result<Self> {
        let object_labels = workload.labels();
        let label = object_labels
            .and_then(|l| l.get(&labels.workload_key()))
            .map(String::as_str)
            .or_else(|| workload.name())
            .ok_or_else(|| Error::InvalidObject(format!("{} without name or workload label", workload.kind())))?;

        let replicas = match workload.replicas() {
            Some(n) => n,
            None => match object_labels.and_then(|l| l.get(&labels.replicas_key())) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| Error::InvalidObject(format!("replicas label {:?} is not a number", raw)))?,
                None => 1,
            },
        };

        Ok(Self::new(label, namespace, replicas.max(0) as usize, workload.kind()))
    }

    /// Name of the service fronting this workload
    pub fn service_name(&self) -> String {
        format!("{}-service", self.label)
    }
}
