//! Submission of desired-state objects
//!
//! Every apply takes optional inputs and returns `Ok(None)` when there is
//! nothing to do, so callers can invoke them unconditionally.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::driver::Driver;
use crate::models::WorkloadSpec;
use crate::Result;

impl Driver {
    /// Create `service` in `namespace`. No-op unless both are present.
    pub async fn apply_service(&self, service: Option<&Service>, namespace: Option<&str>) -> Result<Option<Service>> {
        let (Some(service), Some(namespace)) = (service, namespace) else {
            tracing::debug!("No service to apply");
            return Ok(None);
        };

        tracing::info!(
            namespace,
            service = service.metadata.name.as_deref().unwrap_or_default(),
            "Creating service"
        );
        let created = self.client.create_service(namespace, service).await?;
        Ok(Some(created))
    }

    /// Create `workload` in `namespace`, dispatching on its kind.
    pub async fn apply_workload(
        &self,
        workload: Option<&WorkloadSpec>,
        namespace: Option<&str>,
    ) -> Result<Option<WorkloadSpec>> {
        let (Some(workload), Some(namespace)) = (workload, namespace) else {
            tracing::debug!("No workload to apply");
            return Ok(None);
        };

        tracing::info!(
            namespace,
            kind = %workload.kind(),
            name = workload.name().unwrap_or_default(),
            "Creating workload"
        );
        let created = match workload {
            WorkloadSpec::Deployment(deployment) => {
                WorkloadSpec::from(self.client.create_deployment(namespace, deployment).await?)
            }
            WorkloadSpec::DaemonSet(daemonset) => {
                WorkloadSpec::from(self.client.create_daemonset(namespace, daemonset).await?)
            }
        };
        Ok(Some(created))
    }

    /// Write the profile secret, replacing it when it already exists.
    pub async fn apply_secret(
        &self,
        profile: Option<&serde_json::Value>,
        namespace: Option<&str>,
    ) -> Result<Option<Secret>> {
        let (Some(profile), Some(namespace)) = (profile, namespace) else {
            tracing::debug!("No profile secret to apply");
            return Ok(None);
        };

        let secret = self.profile_secret(profile)?;
        match self.client.create_secret(namespace, &secret).await {
            Ok(created) => {
                tracing::info!(namespace, secret = %self.config.profile_secret_name, "Created profile secret");
                Ok(Some(created))
            }
            Err(e) if e.is_conflict() => {
                tracing::info!(namespace, secret = %self.config.profile_secret_name, "Replacing profile secret");
                Ok(Some(self.client.replace_secret(namespace, &secret).await?))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build the opaque secret carrying `profile`
    pub fn profile_secret(&self, profile: &serde_json::Value) -> Result<Secret> {
        let name = self.config.profile_secret_name.clone();
        let content = self.config.profile_secret_encoding.encode(profile)?;

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(BTreeMap::from([
                    (self.labels.secret_name_key(), name.clone()),
                    (self.labels.secret_type_key(), "Opaque".to_string()),
                ])),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(BTreeMap::from([(name, content)])),
            ..Default::default()
        })
    }
}
