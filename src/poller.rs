//! Readiness and drain polling
//!
//! Both loops observe the cluster, compare against an expected pod count and
//! sleep for the configured interval between attempts. Each loop is bounded
//! by the attempt and wall-clock limits from [`crate::config::DriverConfig`]
//! and aborts as soon as the driver's cancellation token fires.
//!
//! The wall-clock limit is a deadline: sleeps are cut short to meet it and
//! cluster calls still in flight when it passes are abandoned.

use std::future::Future;

use tokio::time::Instant;

use crate::cluster::ClusterError;
use crate::driver::Driver;
use crate::models::{PodObservation, ServiceEndpoint, WorkloadDescriptor};
use crate::progress::{ProgressEvent, WaitTarget};
use crate::{Error, Result};

/// Loop state carried from one attempt to the next
#[derive(Debug, Clone, Copy)]
pub struct PollState {
    /// Zero-based index of the current observation
    pub attempt: u32,
    pub started: Instant,
}

impl PollState {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
        }
    }

    fn next(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    /// Wait until exactly `workload.replicas` pods of the workload are
    /// running, then resolve the cluster IP of its service.
    ///
    /// Overshoot does not count as ready: the loop keeps polling while old
    /// pods of a rolling update are still running.
    pub async fn wait_for_ready(&self, workload: &WorkloadDescriptor) -> Result<ServiceEndpoint> {
        let selector = self.labels.workload_selector(&workload.label);
        let target = WaitTarget::Ready {
            workload: workload.label.clone(),
            namespace: workload.namespace.clone(),
        };

        let mut state = PollState::new();
        let running = loop {
            let running: Vec<PodObservation> = self
                .bounded(&state, &target, self.client.list_pods(&workload.namespace, &selector))
                .await?
                .iter()
                .map(PodObservation::from)
                .filter(|pod| pod.is_running_in(&workload.namespace))
                .collect();

            if running.len() == workload.replicas {
                break running;
            }

            tracing::debug!(
                namespace = %workload.namespace,
                workload = %workload.label,
                running = running.len(),
                expected = workload.replicas,
                "Workload not ready"
            );
            state = self.next_poll(state, &target, running.len(), workload.replicas).await?;
        };

        let service_name = workload.service_name();
        let service = self
            .bounded(&state, &target, self.client.get_service(&workload.namespace, &service_name))
            .await?;
        ServiceEndpoint::from_service(&service, &workload.namespace, running)
    }

    /// Wait until no managed pods remain in `namespace`.
    ///
    /// Every listed pod counts regardless of phase, so terminating pods keep
    /// the loop going.
    pub async fn wait_for_drain(&self, namespace: &str) -> Result<()> {
        let selector = self.labels.ownership_selector();
        let target = WaitTarget::Drain {
            namespace: namespace.to_string(),
        };

        let mut state = PollState::new();
        loop {
            let remaining = self
                .bounded(&state, &target, self.client.list_pods(namespace, &selector))
                .await?
                .len();
            if remaining == 0 {
                tracing::info!(namespace, "All managed pods terminated");
                return Ok(());
            }

            tracing::debug!(namespace, remaining, "Pods still terminating");
            state = self.next_poll(state, &target, remaining, 0).await?;
        }
    }

    /// Report a failed observation, enforce the loop bounds and sleep.
    async fn next_poll(
        &self,
        state: PollState,
        target: &WaitTarget,
        observed: usize,
        expected: usize,
    ) -> Result<PollState> {
        self.progress.on_progress(&ProgressEvent {
            target: target.clone(),
            attempt: state.attempt,
            observed,
            expected,
        });

        let attempts = state.attempt + 1;
        if self.config.max_poll_attempts.is_some_and(|max| attempts >= max) {
            tracing::warn!(wait = %target, attempts, "Poll attempts exhausted");
            return Err(Error::PollExhausted {
                what: target.to_string(),
                attempts,
            });
        }

        let deadline = self.deadline(&state);
        let pause = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(timed_out(target, attempts));
                }
                left.min(self.config.poll_interval())
            }
            None => self.config.poll_interval(),
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(target)),
            _ = tokio::time::sleep(pause) => Ok(state.next()),
        }
    }

    /// Run one cluster call of a poll, racing it against cancellation and
    /// the poll deadline. A call that is already complete wins over the
    /// deadline so its observation is not lost.
    async fn bounded<T>(
        &self,
        state: &PollState,
        target: &WaitTarget,
        call: impl Future<Output = std::result::Result<T, ClusterError>>,
    ) -> Result<T> {
        let deadline = self.deadline(state);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled(target)),
            result = call => Ok(result?),
            _ = until(deadline) => Err(timed_out(target, state.attempt + 1)),
        }
    }

    fn deadline(&self, state: &PollState) -> Option<Instant> {
        self.config.poll_timeout().map(|timeout| state.started + timeout)
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn timed_out(target: &WaitTarget, attempts: u32) -> Error {
    tracing::warn!(wait = %target, attempts, "Poll timed out");
    Error::Timeout(target.to_string())
}

fn cancelled(target: &WaitTarget) -> Error {
    tracing::info!(wait = %target, "Poll cancelled");
    Error::Cancelled(target.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cluster::{MemoryCluster, MockClusterClient, Operation};
    use crate::config::DriverConfig;
    use crate::models::WorkloadKind;
    use crate::progress::ChannelProgress;
    use k8s_openapi::api::core::v1::{Pod, PodStatus, Service, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: &str, namespace: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace.into()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn running(count: usize) -> Vec<Pod> {
        (0..count)
            .map(|i| pod(&format!("urac-{}", i), "dashboard", "Running"))
            .collect()
    }

    fn service(ip: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("urac-service".into()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some(ip.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn descriptor(replicas: usize) -> WorkloadDescriptor {
        WorkloadDescriptor::new("urac", "dashboard", replicas, WorkloadKind::Deployment)
    }

    /// Mock whose successive pod listings return `counts` running pods
    fn client_with_counts(counts: Vec<usize>) -> MockClusterClient {
        let mut client = MockClusterClient::new();
        let calls = AtomicUsize::new(0);
        client
            .expect_list_pods()
            .withf(|ns, selector| ns == "dashboard" && selector == "soajs.service.label=urac")
            .returning(move |_, _| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                Ok(running(counts[call.min(counts.len() - 1)]))
            });
        client
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_two_retries() {
        let mut client = client_with_counts(vec![1, 2, 3]);
        client
            .expect_get_service()
            .withf(|ns, name| ns == "dashboard" && name == "urac-service")
            .times(1)
            .returning(|_, _| Ok(service("10.96.0.12")));

        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), DriverConfig::default())
            .unwrap()
            .with_progress(Arc::new(progress));

        let endpoint = driver.wait_for_ready(&descriptor(3)).await.unwrap();
        assert_eq!(endpoint.cluster_ip.to_string(), "10.96.0.12");
        assert_eq!(endpoint.pods.len(), 3);

        let first = rx.try_recv().unwrap();
        assert_eq!((first.attempt, first.observed, first.expected), (0, 1, 3));
        let second = rx.try_recv().unwrap();
        assert_eq!((second.attempt, second.observed), (1, 2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_running_pods_in_namespace_count() {
        let mut client = MockClusterClient::new();
        let calls = AtomicUsize::new(0);
        client.expect_list_pods().returning(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![
                    pod("urac-0", "dashboard", "Running"),
                    pod("urac-1", "dashboard", "Pending"),
                    pod("urac-2", "other", "Running"),
                ])
            } else {
                Ok(running(2))
            }
        });
        client.expect_get_service().returning(|_, _| Ok(service("10.96.0.12")));

        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), DriverConfig::default())
            .unwrap()
            .with_progress(Arc::new(progress));

        driver.wait_for_ready(&descriptor(2)).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().observed, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overshoot_keeps_polling() {
        let mut client = client_with_counts(vec![3, 2]);
        client.expect_get_service().returning(|_, _| Ok(service("10.96.0.12")));

        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), DriverConfig::default())
            .unwrap()
            .with_progress(Arc::new(progress));

        let endpoint = driver.wait_for_ready(&descriptor(2)).await.unwrap();
        assert_eq!(endpoint.pods.len(), 2);
        assert_eq!(rx.try_recv().unwrap().observed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_replicas_ready_immediately() {
        let mut client = client_with_counts(vec![0]);
        client.expect_get_service().returning(|_, _| Ok(service("10.96.0.12")));

        let driver = Driver::new(Arc::new(client), DriverConfig::default()).unwrap();
        let endpoint = driver.wait_for_ready(&descriptor(0)).await.unwrap();
        assert!(endpoint.pods.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhausted() {
        let mut client = client_with_counts(vec![1]);
        client.expect_get_service().never();

        let config = DriverConfig::builder().max_poll_attempts(Some(4)).build();
        let driver = Driver::new(Arc::new(client), config).unwrap();

        let err = driver.wait_for_ready(&descriptor(3)).await.unwrap_err();
        assert!(matches!(err, Error::PollExhausted { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_timeout() {
        let client = client_with_counts(vec![1]);
        let config = DriverConfig::builder()
            .max_poll_attempts(None)
            .poll_timeout(Some(Duration::from_secs(3)))
            .build();
        let driver = Driver::new(Arc::new(client), config).unwrap();

        let started = Instant::now();
        let err = driver.wait_for_ready(&descriptor(3)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_interval() {
        let client = client_with_counts(vec![1]);
        let config = DriverConfig::builder()
            .max_poll_attempts(None)
            .poll_interval(Duration::from_secs(60))
            .poll_timeout(Some(Duration::from_secs(2)))
            .build();
        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), config)
            .unwrap()
            .with_progress(Arc::new(progress));

        let started = Instant::now();
        let err = driver.wait_for_ready(&descriptor(3)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_listing_abandoned_at_deadline() {
        let cluster = MemoryCluster::new();
        cluster.stall_next(Operation::ListPods, "dashboard");
        let config = DriverConfig::builder()
            .max_poll_attempts(None)
            .poll_timeout(Some(Duration::from_secs(5)))
            .build();
        let driver = Driver::new(Arc::new(cluster), config).unwrap();

        let started = Instant::now();
        let err = driver.wait_for_drain("dashboard").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_hung_listing() {
        let cluster = MemoryCluster::new();
        cluster.stall_next(Operation::ListPods, "dashboard");
        let config = DriverConfig::builder().max_poll_attempts(None).build();
        let driver = Driver::new(Arc::new(cluster), config).unwrap();

        let token = driver.cancellation_token().clone();
        let handle = tokio::spawn(async move { driver.wait_for_drain("dashboard").await });

        tokio::time::sleep(Duration::from_secs(90)).await;
        token.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_poll() {
        let client = client_with_counts(vec![1]);
        let config = DriverConfig::builder().max_poll_attempts(None).build();
        let driver = Driver::new(Arc::new(client), config).unwrap();

        let token = driver.cancellation_token().clone();
        let handle = tokio::spawn(async move { driver.wait_for_ready(&descriptor(3)).await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        token.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_cluster_ip() {
        let mut client = client_with_counts(vec![1]);
        client.expect_get_service().returning(|_, _| Ok(service("None")));

        let driver = Driver::new(Arc::new(client), DriverConfig::default()).unwrap();
        let err = driver.wait_for_ready(&descriptor(1)).await.unwrap_err();
        assert!(matches!(err, Error::MissingClusterIp { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_counts_every_phase() {
        let mut client = MockClusterClient::new();
        let calls = AtomicUsize::new(0);
        client
            .expect_list_pods()
            .withf(|ns, selector| ns == "dashboard" && selector == "soajs.content=true")
            .returning(move |_, _| match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(vec![
                    pod("urac-0", "dashboard", "Running"),
                    pod("urac-1", "dashboard", "Succeeded"),
                ]),
                1 => Ok(vec![pod("urac-1", "dashboard", "Failed")]),
                _ => Ok(vec![]),
            });

        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), DriverConfig::default())
            .unwrap()
            .with_progress(Arc::new(progress));

        driver.wait_for_drain("dashboard").await.unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].observed, 2);
        assert_eq!(events[1].observed, 1);
        assert!(events.iter().all(|e| e.expected == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_empty_namespace() {
        let mut client = MockClusterClient::new();
        client.expect_list_pods().times(1).returning(|_, _| Ok(vec![]));

        let (progress, mut rx) = ChannelProgress::new();
        let driver = Driver::new(Arc::new(client), DriverConfig::default())
            .unwrap()
            .with_progress(Arc::new(progress));

        driver.wait_for_drain("dashboard").await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
