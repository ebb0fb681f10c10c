//! Removal of managed objects
//!
//! Each step lists the objects carrying the ownership label and removes them
//! concurrently. A step returns a [`TeardownReport`] when every object was
//! removed; otherwise [`Error::PartialTeardown`] carries the same report with
//! the failed objects listed next to the ones already gone.

use futures::future::join_all;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::cluster::{ClusterError, DeleteOptions};
use crate::driver::Driver;
use crate::models::ObjectKind;
use crate::{Error, Result};

/// Step of an object's removal that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStage {
    ScaleDown,
    Delete,
    DeleteAutoscaler,
}

impl std::fmt::Display for TeardownStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownStage::ScaleDown => write!(f, "scale down"),
            TeardownStage::Delete => write!(f, "delete"),
            TeardownStage::DeleteAutoscaler => write!(f, "delete autoscaler"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFailure {
    pub name: String,
    pub stage: TeardownStage,
    pub error: ClusterError,
}

impl ObjectFailure {
    fn new(name: &str, stage: TeardownStage, error: ClusterError) -> Self {
        Self {
            name: name.to_string(),
            stage,
            error,
        }
    }
}

/// Per-object outcome of one teardown step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub kind: ObjectKind,
    pub namespace: String,
    pub deleted: Vec<String>,
    pub failed: Vec<ObjectFailure>,
}

impl TeardownReport {
    pub fn new(kind: ObjectKind, namespace: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            deleted: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Names of the objects that could not be removed
    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.name.as_str()).collect()
    }

    fn record(&mut self, outcome: std::result::Result<String, ObjectFailure>) {
        match outcome {
            Ok(name) => self.deleted.push(name),
            Err(failure) => self.failed.push(failure),
        }
    }

    fn into_result(self) -> Result<Self> {
        if self.is_success() {
            tracing::info!(
                kind = %self.kind,
                namespace = %self.namespace,
                deleted = self.deleted.len(),
                "Teardown step complete"
            );
            Ok(self)
        } else {
            tracing::error!(
                kind = %self.kind,
                namespace = %self.namespace,
                failed = ?self.failed_names(),
                "Teardown step failed"
            );
            Err(Error::PartialTeardown(Box::new(self)))
        }
    }
}

impl std::fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} teardown in {}: {} deleted, {} failed",
            self.kind,
            self.namespace,
            self.deleted.len(),
            self.failed.len()
        )?;
        for failure in &self.failed {
            write!(f, "; {} ({}): {}", failure.name, failure.stage, failure.error)?;
        }
        Ok(())
    }
}

/// Treat an already-absent object as removed
fn absent_ok(result: std::result::Result<(), ClusterError>) -> std::result::Result<(), ClusterError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

fn names(metas: impl Iterator<Item = ObjectMeta>) -> Vec<String> {
    metas.filter_map(|meta| meta.name).collect()
}

impl Driver {
    /// Scale every managed deployment to zero, wait the grace period, then
    /// delete it.
    ///
    /// With autoscaling enabled the autoscaler goes first. A deployment whose
    /// autoscaler cannot be removed is left untouched, so a later teardown
    /// still finds it through the ownership selector and retries both.
    ///
    /// Deployments are handled concurrently; the grace period therefore
    /// costs its duration once, not once per deployment.
    pub async fn teardown_workloads(&self, namespace: &str) -> Result<TeardownReport> {
        let deployments = self
            .client
            .list_deployments(namespace, &self.labels.ownership_selector())
            .await?;

        let mut report = TeardownReport::new(ObjectKind::Deployment, namespace);
        let outcomes = join_all(
            deployments
                .into_iter()
                .map(|deployment| self.teardown_deployment(namespace, deployment)),
        )
        .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        report.into_result()
    }

    async fn teardown_deployment(
        &self,
        namespace: &str,
        mut deployment: Deployment,
    ) -> std::result::Result<String, ObjectFailure> {
        let name = deployment.metadata.name.clone().ok_or_else(|| {
            ObjectFailure::new(
                "",
                TeardownStage::ScaleDown,
                ClusterError::InvalidObject("deployment without metadata.name".into()),
            )
        })?;

        if self.config.autoscaling {
            absent_ok(
                self.client
                    .delete_autoscaler(namespace, &name, DeleteOptions::default())
                    .await,
            )
            .map_err(|e| ObjectFailure::new(&name, TeardownStage::DeleteAutoscaler, e))?;
        }

        tracing::info!(namespace, deployment = %name, "Scaling deployment to zero");
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(0);
        self.client
            .replace_deployment(namespace, &deployment)
            .await
            .map_err(|e| ObjectFailure::new(&name, TeardownStage::ScaleDown, e))?;

        tokio::time::sleep(self.config.grace_period()).await;

        absent_ok(
            self.client
                .delete_deployment(namespace, &name, DeleteOptions::immediate())
                .await,
        )
        .map_err(|e| ObjectFailure::new(&name, TeardownStage::Delete, e))?;

        tracing::info!(namespace, deployment = %name, "Deleted deployment");
        Ok(name)
    }

    /// Delete every managed daemonset
    pub async fn teardown_daemonsets(&self, namespace: &str) -> Result<TeardownReport> {
        let daemonsets = self
            .client
            .list_daemonsets(namespace, &self.labels.ownership_selector())
            .await?;
        let names = names(daemonsets.into_iter().map(|d| d.metadata));

        let outcomes = join_all(names.into_iter().map(|name| async move {
            absent_ok(
                self.client
                    .delete_daemonset(namespace, &name, DeleteOptions::default())
                    .await,
            )
            .map(|_| name.clone())
            .map_err(|e| ObjectFailure::new(&name, TeardownStage::Delete, e))
        }))
        .await;

        let mut report = TeardownReport::new(ObjectKind::DaemonSet, namespace);
        outcomes.into_iter().for_each(|o| report.record(o));
        report.into_result()
    }

    /// Delete every managed service
    pub async fn teardown_services(&self, namespace: &str) -> Result<TeardownReport> {
        let services = self
            .client
            .list_services(namespace, &self.labels.ownership_selector())
            .await?;
        let names = names(services.into_iter().map(|s| s.metadata));

        let outcomes = join_all(names.into_iter().map(|name| async move {
            absent_ok(
                self.client
                    .delete_service(namespace, &name, DeleteOptions::default())
                    .await,
            )
            .map(|_| name.clone())
            .map_err(|e| ObjectFailure::new(&name, TeardownStage::Delete, e))
        }))
        .await;

        let mut report = TeardownReport::new(ObjectKind::Service, namespace);
        outcomes.into_iter().for_each(|o| report.record(o));
        report.into_result()
    }

    /// Force-delete every managed pod
    pub async fn teardown_pods(&self, namespace: &str) -> Result<TeardownReport> {
        let pods = self
            .client
            .list_pods(namespace, &self.labels.ownership_selector())
            .await?;
        let names = names(pods.into_iter().map(|p| p.metadata));

        let outcomes = join_all(names.into_iter().map(|name| async move {
            absent_ok(
                self.client
                    .delete_pod(namespace, &name, DeleteOptions::immediate())
                    .await,
            )
            .map(|_| name.clone())
            .map_err(|e| ObjectFailure::new(&name, TeardownStage::Delete, e))
        }))
        .await;

        let mut report = TeardownReport::new(ObjectKind::Pod, namespace);
        outcomes.into_iter().for_each(|o| report.record(o));
        report.into_result()
    }

    /// Delete the profile secret. An absent secret is not an error.
    pub async fn teardown_secret(&self, namespace: &str) -> Result<TeardownReport> {
        let name = &self.config.profile_secret_name;
        let mut report = TeardownReport::new(ObjectKind::Secret, namespace);

        match self
            .client
            .delete_secret(namespace, name, DeleteOptions::immediate())
            .await
        {
            Ok(()) => report.deleted.push(name.clone()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(namespace, secret = %name, "No profile secret to delete");
            }
            Err(e) => report.failed.push(ObjectFailure::new(name, TeardownStage::Delete, e)),
        }

        report.into_result()
    }
}
