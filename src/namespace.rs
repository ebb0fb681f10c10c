//! Namespace provisioning

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::driver::Driver;
use crate::Result;

/// Outcome of [`Driver::ensure_namespace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceStatus {
    Existing,
    Created,
}

impl std::fmt::Display for NamespaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamespaceStatus::Existing => write!(f, "existing"),
            NamespaceStatus::Created => write!(f, "created"),
        }
    }
}

impl Driver {
    /// Make sure `namespace` exists, creating it when absent.
    ///
    /// Not atomic: a namespace created concurrently between the list and the
    /// create surfaces as a 409 cluster error.
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<NamespaceStatus> {
        let namespaces = self.client.list_namespaces().await?;
        if namespaces
            .iter()
            .any(|ns| ns.metadata.name.as_deref() == Some(namespace))
        {
            tracing::info!(namespace, "Reusing existing namespace");
            return Ok(NamespaceStatus::Existing);
        }

        tracing::info!(namespace, "Creating namespace");
        let object = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                labels: Some(self.labels.ownership_labels()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.client.create_namespace(&object).await?;

        Ok(NamespaceStatus::Created)
    }
}
