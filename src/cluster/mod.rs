//! Cluster client abstraction
//!
//! The driver only talks to the cluster through [`ClusterClient`]. The
//! production implementation, [`KubeClusterClient`], is backed by the
//! [`kube`] crate; [`MemoryCluster`] keeps everything in process for dry runs
//! and tests.

mod kube_client;
mod memory;

pub use kube_client::KubeClusterClient;
pub use memory::{MemoryCluster, Operation};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, Service};
use thiserror::Error;

/// Errors surfaced by a [`ClusterClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The API server answered with a failure status.
    #[error("cluster API error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },
    /// The request never produced an API response (transport, auth, decode).
    #[error("cluster request failed: {0}")]
    Request(String),
    /// The object handed to the client cannot be submitted as is.
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl ClusterError {
    pub fn api(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        ClusterError::Api {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::api(404, "NotFound", format!("{} \"{}\" not found", kind, name))
    }

    pub fn already_exists(kind: &str, name: &str) -> Self {
        Self::api(409, "AlreadyExists", format!("{} \"{}\" already exists", kind, name))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClusterError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }
}

/// Options attached to a delete call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub grace_period_seconds: Option<u32>,
}

impl DeleteOptions {
    /// Remove the object without a termination grace period
    pub fn immediate() -> Self {
        Self {
            grace_period_seconds: Some(0),
        }
    }
}

/// Typed cluster operations used by the driver.
///
/// Every namespaced call takes the namespace explicitly. `selector` is a
/// Kubernetes label selector in `key=value[,key=value]` form.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError>;

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ClusterError>;

    async fn list_services(&self, namespace: &str, selector: &str) -> Result<Vec<Service>, ClusterError>;

    async fn delete_service(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, ClusterError>;

    /// Replaces the deployment named by `deployment.metadata.name`.
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    async fn delete_deployment(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError>;

    async fn create_daemonset(
        &self,
        namespace: &str,
        daemonset: &DaemonSet,
    ) -> Result<DaemonSet, ClusterError>;

    async fn list_daemonsets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<DaemonSet>, ClusterError>;

    async fn delete_daemonset(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError>;

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClusterError>;

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError>;

    /// Replaces the secret named by `secret.metadata.name`.
    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError>;

    async fn delete_secret(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError>;

    /// Deletes the horizontal pod autoscaler `name`.
    async fn delete_autoscaler(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError>;
}
