//! [`ClusterClient`] backed by the `kube` crate

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ClusterClient, ClusterError, DeleteOptions};

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => ClusterError::Api {
                code: response.code,
                reason: response.reason,
                message: response.message,
            },
            other => ClusterError::Request(other.to_string()),
        }
    }
}

/// Talks to a real API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient configuration (in-cluster or
    /// `~/.kube/config`).
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn delete_params(options: DeleteOptions) -> DeleteParams {
    DeleteParams {
        grace_period_seconds: options.grace_period_seconds,
        ..DeleteParams::default()
    }
}

fn object_name<K: Resource>(object: &K) -> Result<&str, ClusterError> {
    object
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| ClusterError::InvalidObject("object without metadata.name".into()))
}

async fn list<K>(api: Api<K>, selector: &str) -> Result<Vec<K>, ClusterError>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(selector)
    };
    Ok(api.list(&params).await?.items)
}

async fn create<K>(api: Api<K>, object: &K) -> Result<K, ClusterError>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    Ok(api.create(&PostParams::default(), object).await?)
}

async fn replace<K>(api: Api<K>, object: &K) -> Result<K, ClusterError>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = object_name(object)?;
    Ok(api.replace(name, &PostParams::default(), object).await?)
}

async fn delete<K>(api: Api<K>, name: &str, options: DeleteOptions) -> Result<(), ClusterError>
where
    K: Clone + DeserializeOwned + Debug,
{
    api.delete(name, &delete_params(options)).await?;
    Ok(())
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        list(Api::<Namespace>::all(self.client.clone()), "").await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        create(Api::<Namespace>::all(self.client.clone()), namespace).await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        create(self.api(namespace), service).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ClusterError> {
        Ok(self.api::<Service>(namespace).get(name).await?)
    }

    async fn list_services(&self, namespace: &str, selector: &str) -> Result<Vec<Service>, ClusterError> {
        list(self.api(namespace), selector).await
    }

    async fn delete_service(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError> {
        delete(self.api::<Service>(namespace), name, options).await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        create(self.api(namespace), deployment).await
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, ClusterError> {
        list(self.api(namespace), selector).await
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        replace(self.api(namespace), deployment).await
    }

    async fn delete_deployment(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError> {
        delete(self.api::<Deployment>(namespace), name, options).await
    }

    async fn create_daemonset(
        &self,
        namespace: &str,
        daemonset: &DaemonSet,
    ) -> Result<DaemonSet, ClusterError> {
        create(self.api(namespace), daemonset).await
    }

    async fn list_daemonsets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<DaemonSet>, ClusterError> {
        list(self.api(namespace), selector).await
    }

    async fn delete_daemonset(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError> {
        delete(self.api::<DaemonSet>(namespace), name, options).await
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        list(self.api(namespace), selector).await
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError> {
        delete(self.api::<Pod>(namespace), name, options).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        create(self.api(namespace), secret).await
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        replace(self.api(namespace), secret).await
    }

    async fn delete_secret(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError> {
        delete(self.api::<Secret>(namespace), name, options).await
    }

    async fn delete_autoscaler(
        &self,
        namespace: &str,
        name: &str,
        options: DeleteOptions,
    ) -> Result<(), ClusterError> {
        delete(self.api::<HorizontalPodAutoscaler>(namespace), name, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    #[test]
    fn test_api_error_keeps_status_code() {
        let err = kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "horizontalpodautoscalers.autoscaling \"web\" not found".into(),
            reason: "NotFound".into(),
            code: 404,
        });

        let mapped = ClusterError::from(err);
        assert!(mapped.is_not_found());
        assert!(matches!(mapped, ClusterError::Api { ref reason, .. } if reason == "NotFound"));
    }

    #[test]
    fn test_delete_params_grace_period() {
        assert_eq!(delete_params(DeleteOptions::immediate()).grace_period_seconds, Some(0));
        assert_eq!(delete_params(DeleteOptions::default()).grace_period_seconds, None);
    }
}
