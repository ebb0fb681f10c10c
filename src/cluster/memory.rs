//! In-process cluster used for dry runs and tests
//!
//! Mimics the API server closely enough for the driver: duplicate creates
//! fail with 409, deletes of absent objects with 404, and workloads get pods
//! that come and go with their replica count.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Namespace, Pod, PodStatus, Secret, Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use parking_lot::RwLock;

use super::{ClusterClient, ClusterError, DeleteOptions};
use crate::models::{selector_matches, PodPhase};

/// Cluster calls that can be made to fail with [`MemoryCluster::fail_next`]
/// or hang with [`MemoryCluster::stall_next`].
///
/// List operations are keyed by namespace, every other operation by object
/// name. `ListNamespaces` uses the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListNamespaces,
    CreateNamespace,
    CreateService,
    GetService,
    ListServices,
    DeleteService,
    CreateDeployment,
    ListDeployments,
    ReplaceDeployment,
    DeleteDeployment,
    CreateDaemonSet,
    ListDaemonSets,
    DeleteDaemonSet,
    ListPods,
    DeletePod,
    CreateSecret,
    ReplaceSecret,
    DeleteSecret,
    DeleteAutoscaler,
}

/// (namespace, name)
type Key = (String, String);

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, Namespace>,
    services: BTreeMap<Key, Service>,
    deployments: BTreeMap<Key, Deployment>,
    daemonsets: BTreeMap<Key, DaemonSet>,
    pods: BTreeMap<Key, Pod>,
    secrets: BTreeMap<Key, Secret>,
    autoscalers: BTreeMap<Key, ()>,
    failures: HashMap<(Operation, String), ClusterError>,
    stalls: HashSet<(Operation, String)>,
    services_allocated: u32,
    pods_allocated: u32,
}

impl State {
    fn take_failure(&mut self, op: Operation, name: &str) -> Result<(), ClusterError> {
        match self.failures.remove(&(op, name.to_string())) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_namespace(&self, namespace: &str) -> Result<(), ClusterError> {
        if self.namespaces.contains_key(namespace) {
            Ok(())
        } else {
            Err(ClusterError::not_found("namespaces", namespace))
        }
    }

    fn next_service_ip(&mut self) -> String {
        self.services_allocated += 1;
        ipv4([10, 96], self.services_allocated + 9)
    }

    fn next_pod_ip(&mut self) -> String {
        self.pods_allocated += 1;
        ipv4([10, 244], self.pods_allocated + 1)
    }

    /// Bring the pods owned by `owner_kind/owner` up or down to `count`.
    fn scale_pods(
        &mut self,
        namespace: &str,
        owner_kind: &str,
        owner: &str,
        labels: Option<BTreeMap<String, String>>,
        phase: PodPhase,
        count: usize,
    ) {
        let owned: Vec<Key> = self
            .pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && is_owned_by(pod, owner_kind, owner))
            .map(|(key, _)| key.clone())
            .collect();

        for key in owned.iter().skip(count) {
            self.pods.remove(key);
        }

        let mut index = 0;
        while self
            .pods
            .iter()
            .filter(|((ns, _), pod)| ns == namespace && is_owned_by(pod, owner_kind, owner))
            .count()
            < count
        {
            let name = format!("{}-{}", owner, index);
            index += 1;
            let key = (namespace.to_string(), name.clone());
            if self.pods.contains_key(&key) {
                continue;
            }

            let ip = self.next_pod_ip();
            let pod = Pod {
                metadata: ObjectMeta {
                    name: Some(name),
                    namespace: Some(namespace.to_string()),
                    labels: labels.clone(),
                    owner_references: Some(vec![OwnerReference {
                        api_version: "apps/v1".into(),
                        kind: owner_kind.into(),
                        name: owner.into(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
                status: Some(PodStatus {
                    phase: Some(phase.to_string()),
                    pod_ip: Some(ip),
                    ..Default::default()
                }),
                ..Default::default()
            };
            self.pods.insert(key, pod);
        }
    }
}

fn ipv4(prefix: [u8; 2], n: u32) -> String {
    format!("{}.{}.{}.{}", prefix[0], prefix[1], (n >> 8) & 0xff, n & 0xff)
}

fn is_owned_by(pod: &Pod, kind: &str, name: &str) -> bool {
    pod.metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.kind == kind && r.name == name))
}

fn object_name<K: Resource>(kind: &str, object: &K) -> Result<String, ClusterError> {
    object
        .meta()
        .name
        .clone()
        .ok_or_else(|| ClusterError::InvalidObject(format!("{} without metadata.name", kind)))
}

fn insert<K: Resource + Clone>(
    store: &mut BTreeMap<Key, K>,
    kind: &str,
    namespace: &str,
    object: &K,
) -> Result<K, ClusterError> {
    let name = object_name(kind, object)?;
    let key = (namespace.to_string(), name);
    if store.contains_key(&key) {
        return Err(ClusterError::already_exists(kind, &key.1));
    }

    let mut object = object.clone();
    object.meta_mut().namespace = Some(namespace.to_string());
    store.insert(key, object.clone());
    Ok(object)
}

fn replace<K: Resource + Clone>(
    store: &mut BTreeMap<Key, K>,
    kind: &str,
    namespace: &str,
    object: &K,
) -> Result<K, ClusterError> {
    let name = object_name(kind, object)?;
    let key = (namespace.to_string(), name);
    let slot = store
        .get_mut(&key)
        .ok_or_else(|| ClusterError::not_found(kind, &key.1))?;

    let mut object = object.clone();
    object.meta_mut().namespace = Some(namespace.to_string());
    *slot = object.clone();
    Ok(object)
}

fn remove<K>(store: &mut BTreeMap<Key, K>, kind: &str, namespace: &str, name: &str) -> Result<K, ClusterError> {
    store
        .remove(&(namespace.to_string(), name.to_string()))
        .ok_or_else(|| ClusterError::not_found(kind, name))
}

fn list<K: Resource + Clone>(store: &BTreeMap<Key, K>, namespace: &str, selector: &str) -> Vec<K> {
    store
        .iter()
        .filter(|((ns, _), object)| ns == namespace && selector_matches(selector, object.meta().labels.as_ref()))
        .map(|(_, object)| object.clone())
        .collect()
}

/// Cluster state held in memory.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryCluster {
    state: Arc<RwLock<State>>,
    daemonset_nodes: usize,
    initial_phase: PodPhase,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            daemonset_nodes: 1,
            initial_phase: PodPhase::Running,
        }
    }
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pods each daemonset runs (one per simulated node)
    pub fn with_daemonset_nodes(mut self, nodes: usize) -> Self {
        self.daemonset_nodes = nodes;
        self
    }

    /// Phase given to newly materialized workload pods
    pub fn with_initial_phase(mut self, phase: PodPhase) -> Self {
        self.initial_phase = phase;
        self
    }

    /// Make the next `op` on `name` fail with `error`. One-shot.
    pub fn fail_next(&self, op: Operation, name: impl Into<String>, error: ClusterError) {
        self.state.write().failures.insert((op, name.into()), error);
    }

    /// Make the next `op` on `name` never complete. One-shot.
    pub fn stall_next(&self, op: Operation, name: impl Into<String>) {
        self.state.write().stalls.insert((op, name.into()));
    }

    async fn stall(&self, op: Operation, name: &str) {
        let stalled = self.state.write().stalls.remove(&(op, name.to_string()));
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state.read().namespaces.contains_key(namespace)
    }

    pub fn pods(&self, namespace: &str) -> Vec<Pod> {
        list(&self.state.read().pods, namespace, "")
    }

    pub fn services(&self, namespace: &str) -> Vec<Service> {
        list(&self.state.read().services, namespace, "")
    }

    pub fn deployments(&self, namespace: &str) -> Vec<Deployment> {
        list(&self.state.read().deployments, namespace, "")
    }

    pub fn daemonsets(&self, namespace: &str) -> Vec<DaemonSet> {
        list(&self.state.read().daemonsets, namespace, "")
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .read()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn has_autoscaler(&self, namespace: &str, name: &str) -> bool {
        self.state
            .read()
            .autoscalers
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    /// Register a horizontal pod autoscaler
    pub fn insert_autoscaler(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .autoscalers
            .insert((namespace.to_string(), name.to_string()), ());
    }

    /// Add a free-standing pod, replacing any pod of the same name
    pub fn insert_pod(&self, namespace: &str, mut pod: Pod) {
        let name = pod.metadata.name.clone().unwrap_or_default();
        pod.metadata.namespace = Some(namespace.to_string());
        self.state.write().pods.insert((namespace.to_string(), name), pod);
    }

    /// Returns false when the pod does not exist
    pub fn set_pod_phase(&self, namespace: &str, name: &str, phase: PodPhase) -> bool {
        let mut state = self.state.write();
        match state.pods.get_mut(&(namespace.to_string(), name.to_string())) {
            Some(pod) => {
                pod.status.get_or_insert_with(Default::default).phase = Some(phase.to_string());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ClusterError> {
        self.stall(Operation::ListNamespaces, "").await;
        let mut state = self.state.write();
        state.take_failure(Operation::ListNamespaces, "")?;
        Ok(state.namespaces.values().cloned().collect())
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, ClusterError> {
        let name = object_name("namespaces", namespace)?;
        self.stall(Operation::CreateNamespace, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::CreateNamespace, &name)?;
        if state.namespaces.contains_key(&name) {
            return Err(ClusterError::already_exists("namespaces", &name));
        }
        state.namespaces.insert(name, namespace.clone());
        Ok(namespace.clone())
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        let name = object_name("services", service)?;
        self.stall(Operation::CreateService, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::CreateService, &name)?;
        state.require_namespace(namespace)?;

        let mut service = service.clone();
        let spec = service.spec.get_or_insert_with(ServiceSpec::default);
        if spec.cluster_ip.is_none() {
            spec.cluster_ip = Some(state.next_service_ip());
        }
        insert(&mut state.services, "services", namespace, &service)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ClusterError> {
        self.stall(Operation::GetService, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::GetService, name)?;
        state
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("services", name))
    }

    async fn list_services(&self, namespace: &str, selector: &str) -> Result<Vec<Service>, ClusterError> {
        self.stall(Operation::ListServices, namespace).await;
        let mut state = self.state.write();
        state.take_failure(Operation::ListServices, namespace)?;
        Ok(list(&state.services, namespace, selector))
    }

    async fn delete_service(&self, namespace: &str, name: &str, _options: DeleteOptions) -> Result<(), ClusterError> {
        self.stall(Operation::DeleteService, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::DeleteService, name)?;
        remove(&mut state.services, "services", namespace, name).map(|_| ())
    }

    async fn create_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let name = object_name("deployments", deployment)?;
        self.stall(Operation::CreateDeployment, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::CreateDeployment, &name)?;
        state.require_namespace(namespace)?;

        let created = insert(&mut state.deployments, "deployments", namespace, deployment)?;
        let spec = created.spec.as_ref();
        let replicas = spec.and_then(|s| s.replicas).unwrap_or(1).max(0) as usize;
        let labels = spec.and_then(|s| s.template.metadata.as_ref()).and_then(|m| m.labels.clone());
        state.scale_pods(namespace, "Deployment", &name, labels, self.initial_phase, replicas);
        Ok(created)
    }

    async fn list_deployments(&self, namespace: &str, selector: &str) -> Result<Vec<Deployment>, ClusterError> {
        self.stall(Operation::ListDeployments, namespace).await;
        let mut state = self.state.write();
        state.take_failure(Operation::ListDeployments, namespace)?;
        Ok(list(&state.deployments, namespace, selector))
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let name = object_name("deployments", deployment)?;
        self.stall(Operation::ReplaceDeployment, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::ReplaceDeployment, &name)?;

        let replaced = replace(&mut state.deployments, "deployments", namespace, deployment)?;
        let spec = replaced.spec.as_ref();
        let replicas = spec.and_then(|s| s.replicas).unwrap_or(1).max(0) as usize;
        let labels = spec.and_then(|s| s.template.metadata.as_ref()).and_then(|m| m.labels.clone());
        state.scale_pods(namespace, "Deployment", &name, labels, self.initial_phase, replicas);
        Ok(replaced)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str, _options: DeleteOptions) -> Result<(), ClusterError> {
        self.stall(Operation::DeleteDeployment, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::DeleteDeployment, name)?;
        remove(&mut state.deployments, "deployments", namespace, name)?;
        state.scale_pods(namespace, "Deployment", name, None, self.initial_phase, 0);
        Ok(())
    }

    async fn create_daemonset(&self, namespace: &str, daemonset: &DaemonSet) -> Result<DaemonSet, ClusterError> {
        let name = object_name("daemonsets", daemonset)?;
        self.stall(Operation::CreateDaemonSet, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::CreateDaemonSet, &name)?;
        state.require_namespace(namespace)?;

        let created = insert(&mut state.daemonsets, "daemonsets", namespace, daemonset)?;
        let labels = created
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.labels.clone());
        state.scale_pods(namespace, "DaemonSet", &name, labels, self.initial_phase, self.daemonset_nodes);
        Ok(created)
    }

    async fn list_daemonsets(&self, namespace: &str, selector: &str) -> Result<Vec<DaemonSet>, ClusterError> {
        self.stall(Operation::ListDaemonSets, namespace).await;
        let mut state = self.state.write();
        state.take_failure(Operation::ListDaemonSets, namespace)?;
        Ok(list(&state.daemonsets, namespace, selector))
    }

    async fn delete_daemonset(&self, namespace: &str, name: &str, _options: DeleteOptions) -> Result<(), ClusterError> {
        self.stall(Operation::DeleteDaemonSet, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::DeleteDaemonSet, name)?;
        remove(&mut state.daemonsets, "daemonsets", namespace, name)?;
        state.scale_pods(namespace, "DaemonSet", name, None, self.initial_phase, 0);
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        self.stall(Operation::ListPods, namespace).await;
        let mut state = self.state.write();
        state.take_failure(Operation::ListPods, namespace)?;
        Ok(list(&state.pods, namespace, selector))
    }

    async fn delete_pod(&self, namespace: &str, name: &str, _options: DeleteOptions) -> Result<(), ClusterError> {
        self.stall(Operation::DeletePod, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::DeletePod, name)?;
        remove(&mut state.pods, "pods", namespace, name).map(|_| ())
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = object_name("secrets", secret)?;
        self.stall(Operation::CreateSecret, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::CreateSecret, &name)?;
        state.require_namespace(namespace)?;
        insert(&mut state.secrets, "secrets", namespace, secret)
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = object_name("secrets", secret)?;
        self.stall(Operation::ReplaceSecret, &name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::ReplaceSecret, &name)?;
        replace(&mut state.secrets, "secrets", namespace, secret)
    }

    async fn delete_secret(&self, namespace: &str, name: &str, _options: DeleteOptions) -> Result<(), ClusterError> {
        self.stall(Operation::DeleteSecret, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::DeleteSecret, name)?;
        remove(&mut state.secrets, "secrets", namespace, name).map(|_| ())
    }

    async fn delete_autoscaler(&self, namespace: &str, name: &str, _options: DeleteOptions) -> Result<(), ClusterError> {
        self.stall(Operation::DeleteAutoscaler, name).await;
        let mut state = self.state.write();
        state.take_failure(Operation::DeleteAutoscaler, name)?;
        remove(&mut state.autoscalers, "horizontalpodautoscalers", namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use k8s_openapi::api::apps::v1::{DaemonSetSpec, DeploymentSpec};
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.into()),
            labels: Some(BTreeMap::from([
                ("soajs.content".to_string(), "true".to_string()),
                ("soajs.service.label".to_string(), name.to_string()),
            ])),
            ..Default::default()
        }
    }

    fn template(name: &str) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: Some(meta(name)),
            ..Default::default()
        }
    }

    fn deployment(name: &str, replicas: i32) -> Deployment {
        Deployment {
            metadata: meta(name),
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                template: template(name),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn cluster_with_namespace(ns: &str) -> MemoryCluster {
        let cluster = MemoryCluster::new();
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(ns.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        cluster.create_namespace(&namespace).await.unwrap();
        cluster
    }

    #[tokio::test]
    async fn test_namespace_conflict() {
        let cluster = cluster_with_namespace("envA").await;
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some("envA".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cluster.create_namespace(&ns).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(cluster.list_namespaces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_namespace() {
        let cluster = MemoryCluster::new();
        let err = cluster.create_deployment("missing", &deployment("urac", 1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_service_gets_cluster_ip() {
        let cluster = cluster_with_namespace("dashboard").await;
        let service = Service {
            metadata: meta("urac-service"),
            ..Default::default()
        };
        let created = cluster.create_service("dashboard", &service).await.unwrap();
        let ip = created.spec.unwrap().cluster_ip.unwrap();
        assert_eq!(ip, "10.96.0.10");

        let fetched = cluster.get_service("dashboard", "urac-service").await.unwrap();
        assert_eq!(fetched.spec.unwrap().cluster_ip.unwrap(), ip);
    }

    #[tokio::test]
    async fn test_deployment_pods_follow_replicas() {
        let cluster = cluster_with_namespace("dashboard").await;
        cluster.create_deployment("dashboard", &deployment("urac", 3)).await.unwrap();

        let pods = cluster.list_pods("dashboard", "soajs.service.label=urac").await.unwrap();
        assert_eq!(pods.len(), 3);
        assert!(pods.iter().all(|p| p.metadata.namespace.as_deref() == Some("dashboard")));

        cluster.replace_deployment("dashboard", &deployment("urac", 0)).await.unwrap();
        assert!(cluster.pods("dashboard").is_empty());
        assert_eq!(cluster.deployments("dashboard").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_pods() {
        let cluster = MemoryCluster::new().with_daemonset_nodes(2);
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some("dashboard".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        cluster.create_namespace(&ns).await.unwrap();

        let daemonset = DaemonSet {
            metadata: meta("nginx"),
            spec: Some(DaemonSetSpec {
                template: template("nginx"),
                ..Default::default()
            }),
            ..Default::default()
        };
        cluster.create_daemonset("dashboard", &daemonset).await.unwrap();
        cluster.create_deployment("dashboard", &deployment("urac", 1)).await.unwrap();
        assert_eq!(cluster.pods("dashboard").len(), 3);

        cluster
            .delete_daemonset("dashboard", "nginx", DeleteOptions::default())
            .await
            .unwrap();
        let remaining = cluster.pods("dashboard");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].metadata.name.as_deref(), Some("urac-0"));
    }

    #[tokio::test]
    async fn test_missing_delete_is_not_found() {
        let cluster = cluster_with_namespace("dashboard").await;
        let err = cluster
            .delete_secret("dashboard", "soajsprofile", DeleteOptions::immediate())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let cluster = cluster_with_namespace("dashboard").await;
        cluster.insert_autoscaler("dashboard", "urac");
        cluster.fail_next(
            Operation::DeleteAutoscaler,
            "urac",
            ClusterError::api(500, "InternalError", "etcd unavailable"),
        );

        let err = cluster
            .delete_autoscaler("dashboard", "urac", DeleteOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(cluster.has_autoscaler("dashboard", "urac"));

        cluster
            .delete_autoscaler("dashboard", "urac", DeleteOptions::default())
            .await
            .unwrap();
        assert!(!cluster.has_autoscaler("dashboard", "urac"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_next_is_one_shot() {
        let cluster = cluster_with_namespace("dashboard").await;
        cluster.stall_next(Operation::ListPods, "dashboard");

        let stalled = tokio::time::timeout(Duration::from_secs(30), cluster.list_pods("dashboard", "")).await;
        assert!(stalled.is_err());

        let pods = tokio::time::timeout(Duration::from_secs(30), cluster.list_pods("dashboard", ""))
            .await
            .unwrap()
            .unwrap();
        assert!(pods.is_empty());
    }

    #[tokio::test]
    async fn test_set_pod_phase() {
        let cluster = cluster_with_namespace("dashboard").await;
        let cluster = cluster.with_initial_phase(PodPhase::Pending);
        cluster.create_deployment("dashboard", &deployment("urac", 1)).await.unwrap();

        let pod = &cluster.pods("dashboard")[0];
        assert_eq!(pod.status.as_ref().unwrap().phase.as_deref(), Some("Pending"));

        assert!(cluster.set_pod_phase("dashboard", "urac-0", PodPhase::Running));
        assert!(!cluster.set_pod_phase("dashboard", "urac-9", PodPhase::Running));
        let pod = &cluster.pods("dashboard")[0];
        assert_eq!(pod.status.as_ref().unwrap().phase.as_deref(), Some("Running"));
    }
}
