//! Driver tying the cluster client, configuration and progress reporting
//! together
//!
//! The individual operations live in [`crate::namespace`], [`crate::applier`],
//! [`crate::poller`] and [`crate::teardown`]; this module owns the shared
//! state and the composite deploy/teardown flows.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cluster::ClusterClient;
use crate::config::DriverConfig;
use crate::models::{LabelScheme, ServiceEndpoint, WorkloadDescriptor, WorkloadRecipe};
use crate::progress::{ProgressObserver, TracingProgress};
use crate::teardown::TeardownReport;
use crate::{Error, Result};

/// Drives deployments and teardowns against one cluster.
///
/// Holds no cluster state: every operation reads what it needs from the
/// cluster, so a driver can be shared freely across tasks.
#[derive(Clone)]
pub struct Driver {
    pub(crate) client: Arc<dyn ClusterClient>,
    pub(crate) config: DriverConfig,
    pub(crate) labels: LabelScheme,
    pub(crate) progress: Arc<dyn ProgressObserver>,
    pub(crate) cancel: CancellationToken,
}

impl Driver {
    /// Create a driver with the given client and validated config
    pub fn new(client: Arc<dyn ClusterClient>, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let labels = config.labels();

        Ok(Self {
            client,
            config,
            labels,
            progress: Arc::new(TracingProgress),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the progress observer (defaults to [`TracingProgress`])
    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Use an externally owned token to cancel poll loops
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelScheme {
        &self.labels
    }

    /// Token whose cancellation aborts every running poll loop
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Deploy one workload and wait for it to become ready.
    ///
    /// Ensures the namespace, writes the profile secret (when given), creates
    /// the service and workload, then polls until the expected replicas run.
    pub async fn deploy(
        &self,
        namespace: &str,
        recipe: &WorkloadRecipe,
        profile: Option<&serde_json::Value>,
    ) -> Result<ServiceEndpoint> {
        let workload = recipe
            .workload
            .as_ref()
            .ok_or_else(|| Error::InvalidObject("recipe has no workload".into()))?;
        let descriptor = WorkloadDescriptor::for_workload(workload, namespace, &self.labels)?;

        tracing::info!(
            namespace,
            workload = %descriptor.label,
            kind = %descriptor.kind,
            replicas = descriptor.replicas,
            "Deploying workload"
        );

        self.ensure_namespace(namespace).await?;
        self.apply_secret(profile, Some(namespace)).await?;
        self.apply_service(recipe.service.as_ref(), Some(namespace)).await?;
        self.apply_workload(Some(workload), Some(namespace)).await?;

        let endpoint = self.wait_for_ready(&descriptor).await?;
        tracing::info!(
            namespace,
            workload = %descriptor.label,
            cluster_ip = %endpoint.cluster_ip,
            "Workload ready"
        );
        Ok(endpoint)
    }

    /// Remove every managed object from a namespace and wait for its pods to
    /// terminate.
    ///
    /// Steps run in order and stop at the first one that fails.
    pub async fn teardown(&self, namespace: &str) -> Result<Vec<TeardownReport>> {
        tracing::info!(namespace, "Tearing down managed objects");

        let reports = vec![
            self.teardown_workloads(namespace).await?,
            self.teardown_daemonsets(namespace).await?,
            self.teardown_services(namespace).await?,
            self.teardown_pods(namespace).await?,
            self.teardown_secret(namespace).await?,
        ];

        self.wait_for_drain(namespace).await?;

        let deleted: usize = reports.iter().map(|r| r.deleted.len()).sum();
        tracing::info!(namespace, deleted, "Teardown complete");
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterError, MockClusterClient};
    use crate::progress::ChannelProgress;
    use k8s_openapi::api::core::v1::{Pod, PodStatus, Service, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    fn recipe() -> WorkloadRecipe {
        serde_json::from_value(json!({
            "service": {
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": { "name": "urac-service" },
                "spec": { "selector": { "soajs.service.label": "urac" } }
            },
            "deployment": {
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {
                    "name": "urac",
                    "labels": { "soajs.content": "true", "soajs.service.label": "urac" }
                },
                "spec": {
                    "replicas": 1,
                    "selector": { "matchLabels": { "soajs.service.label": "urac" } },
                    "template": {
                        "metadata": { "labels": { "soajs.service.label": "urac" } },
                        "spec": { "containers": [{ "name": "urac", "image": "soajsorg/urac" }] }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DriverConfig::builder().poll_interval(std::time::Duration::ZERO).build();
        let result = Driver::new(Arc::new(MockClusterClient::new()), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_sequence() {
        let mut client = MockClusterClient::new();
        let mut seq = mockall::Sequence::new();

        client
            .expect_list_namespaces()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![]));
        client
            .expect_create_namespace()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|ns| Ok(ns.clone()));
        client
            .expect_create_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, svc| Ok(svc.clone()));
        client
            .expect_create_deployment()
            .withf(|ns, d| ns == "dashboard" && d.metadata.name.as_deref() == Some("urac"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, d| Ok(d.clone()));
        client
            .expect_list_pods()
            .withf(|ns, selector| ns == "dashboard" && selector == "soajs.service.label=urac")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(vec![Pod {
                    metadata: ObjectMeta {
                        name: Some("urac-0".into()),
                        namespace: Some("dashboard".into()),
                        ..Default::default()
                    },
                    status: Some(PodStatus {
                        phase: Some("Running".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }])
            });
        client
            .expect_get_service()
            .withf(|ns, name| ns == "dashboard" && name == "urac-service")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, name| {
                Ok(Service {
                    metadata: ObjectMeta {
                        name: Some(name.to_string()),
                        ..Default::default()
                    },
                    spec: Some(ServiceSpec {
                        cluster_ip: Some("10.96.0.10".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
            });
        client.expect_create_secret().never();

        let driver = Driver::new(Arc::new(client), DriverConfig::default()).unwrap();
        let endpoint = driver.deploy("dashboard", &recipe(), None).await.unwrap();

        assert_eq!(endpoint.cluster_ip.to_string(), "10.96.0.10");
        assert_eq!(endpoint.pods.len(), 1);
    }

    #[tokio::test]
    async fn test_deploy_without_workload() {
        let driver = Driver::new(Arc::new(MockClusterClient::new()), DriverConfig::default()).unwrap();
        let recipe = WorkloadRecipe::default();

        let err = driver.deploy("dashboard", &recipe, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidObject(_)));
    }

    #[tokio::test]
    async fn test_deploy_surfaces_namespace_conflict() {
        let mut client = MockClusterClient::new();
        client.expect_list_namespaces().returning(|| Ok(vec![]));
        client
            .expect_create_namespace()
            .returning(|_| Err(ClusterError::already_exists("namespaces", "dashboard")));
        client.expect_create_service().never();

        let driver = Driver::new(Arc::new(client), DriverConfig::default()).unwrap();
        let err = driver.deploy("dashboard", &recipe(), None).await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_empty_namespace() {
        let mut client = MockClusterClient::new();
        client.expect_list_deployments().returning(|_, _| Ok(vec![]));
        client.expect_list_daemonsets().returning(|_, _| Ok(vec![]));
        client.expect_list_services().returning(|_, _| Ok(vec![]));
        client.expect_list_pods().returning(|_, _| Ok(vec![]));
        client
            .expect_delete_secret()
            .returning(|_, name, _| Err(ClusterError::not_found("secrets", name)));

        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), DriverConfig::default())
            .unwrap()
            .with_progress(Arc::new(progress));

        let reports = driver.teardown("dashboard").await.unwrap();
        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(|r| r.deleted.is_empty() && r.failed.is_empty()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_teardown_stops_on_list_error() {
        let mut client = MockClusterClient::new();
        client
            .expect_list_deployments()
            .returning(|_, _| Err(ClusterError::Request("connection refused".into())));
        client.expect_list_daemonsets().never();

        let driver = Driver::new(Arc::new(client), DriverConfig::default()).unwrap();
        let err = driver.teardown("dashboard").await.unwrap_err();
        assert!(matches!(err, Error::Cluster(ClusterError::Request(_))));
    }
}
