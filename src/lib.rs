//! Kubernetes Deployment Driver
//!
//! A Rust library for deploying labelled workloads into a Kubernetes
//! namespace, waiting for them to become reachable, and tearing everything
//! the driver created back down.
//!
//! # Key Features
//!
//! - **Label-scoped** - Every managed object carries one ownership label; teardown never touches anything else
//! - **Bounded polling** - Readiness and drain loops honour attempt limits, timeouts and cancellation
//! - **Partial failure reporting** - Teardown reports which objects were removed and which were not
//! - **Dry runs** - An in-memory cluster stands in for a real API server
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kube_deployer::{Driver, DriverConfig, KubeClusterClient, WorkloadRecipe};
//!
//! # async fn run() -> kube_deployer::Result<()> {
//! let client = KubeClusterClient::try_default().await?;
//! let driver = Driver::new(Arc::new(client), DriverConfig::default())?;
//!
//! let recipe = WorkloadRecipe::from_json(&std::fs::read_to_string("urac.json")?)?;
//! let endpoint = driver.deploy("dashboard", &recipe, None).await?;
//! println!("urac reachable at {}", endpoint.cluster_ip);
//!
//! driver.teardown("dashboard").await?;
//! # Ok(())
//! # }
//! ```

pub mod applier;
pub mod cluster;
pub mod config;
pub mod driver;
pub mod error;
pub mod models;
pub mod namespace;
pub mod poller;
pub mod progress;
pub mod teardown;

pub use cluster::{ClusterClient, ClusterError, DeleteOptions, KubeClusterClient, MemoryCluster};
pub use config::{DriverConfig, SecretEncoding};
pub use driver::Driver;
pub use error::{Error, Result};
pub use models::{ServiceEndpoint, WorkloadDescriptor, WorkloadKind, WorkloadRecipe, WorkloadSpec};
pub use namespace::NamespaceStatus;
pub use poller::PollState;
pub use progress::{ProgressEvent, ProgressObserver, WaitTarget};
pub use teardown::{TeardownReport, TeardownStage};
