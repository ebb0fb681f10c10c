//! Kubernetes deployment driver CLI

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube_deployer::{
    ClusterClient, Driver, DriverConfig, KubeClusterClient, MemoryCluster, ProgressEvent, ProgressObserver,
    WorkloadDescriptor, WorkloadKind, WorkloadRecipe,
};

#[derive(Parser)]
#[command(name = "kube-deployer")]
#[command(about = "Deploy and tear down labelled workloads on Kubernetes", long_about = None)]
struct Cli {
    /// JSON driver config (defaults apply to missing fields)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Run against an in-memory cluster instead of the current kube context
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a workload recipe and wait until it is ready
    Deploy {
        #[arg(short, long)]
        namespace: String,
        /// Recipe JSON holding `service` and `deployment`
        #[arg(short, long)]
        recipe: PathBuf,
        /// Profile JSON written into the profile secret
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },
    /// Remove every managed object from a namespace
    Teardown {
        #[arg(short, long)]
        namespace: String,
    },
    /// Wait for an already deployed workload to become ready
    Wait {
        #[arg(short, long)]
        namespace: String,
        /// Workload label value
        #[arg(short, long)]
        label: String,
        #[arg(short, long, default_value = "1")]
        replicas: usize,
        #[arg(short, long, default_value = "Deployment")]
        kind: String,
    },
    /// Wait until no managed pods remain in a namespace
    Drain {
        #[arg(short, long)]
        namespace: String,
    },
}

/// Prints a status line, then one dot per further attempt
struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let mut out = std::io::stdout().lock();
        if event.attempt % 5 == 0 {
            let _ = write!(out, "\n{} ({}/{}) ", event.message(), event.observed, event.expected);
        } else {
            let _ = write!(out, ".");
        }
        let _ = out.flush();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kube_deployer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DriverConfig::from_file(path)?,
        None => DriverConfig::default(),
    };

    let client: Arc<dyn ClusterClient> = if cli.dry_run {
        println!("Dry run: using in-memory cluster");
        Arc::new(MemoryCluster::new())
    } else {
        Arc::new(KubeClusterClient::try_default().await?)
    };

    let driver = Driver::new(client, config)?.with_progress(Arc::new(ConsoleProgress));

    let token = driver.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            token.cancel();
        }
    });

    match cli.command {
        Commands::Deploy {
            namespace,
            recipe,
            profile,
        } => cmd_deploy(&driver, &namespace, &recipe, profile.as_deref()).await?,
        Commands::Teardown { namespace } => cmd_teardown(&driver, &namespace).await?,
        Commands::Wait {
            namespace,
            label,
            replicas,
            kind,
        } => cmd_wait(&driver, &namespace, &label, replicas, &kind).await?,
        Commands::Drain { namespace } => cmd_drain(&driver, &namespace).await?,
    }

    Ok(())
}

async fn cmd_deploy(
    driver: &Driver,
    namespace: &str,
    recipe: &Path,
    profile: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let recipe = WorkloadRecipe::from_json(&std::fs::read_to_string(recipe)?)?;
    let profile: Option<serde_json::Value> = match profile {
        Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => None,
    };

    let endpoint = driver.deploy(namespace, &recipe, profile.as_ref()).await?;

    println!();
    println!("Service {} ready in {}", endpoint.service, endpoint.namespace);
    println!("  Cluster IP: {}", endpoint.cluster_ip);
    for pod in &endpoint.pods {
        println!("  {} {} {}", pod.name, pod.phase, pod.ip.as_deref().unwrap_or("-"));
    }
    Ok(())
}

async fn cmd_teardown(driver: &Driver, namespace: &str) -> Result<(), Box<dyn std::error::Error>> {
    match driver.teardown(namespace).await {
        Ok(reports) => {
            println!();
            for report in &reports {
                println!("{}", report);
            }
            Ok(())
        }
        Err(e) => {
            if let Some(report) = e.teardown_report() {
                println!();
                for failure in &report.failed {
                    println!("  FAILED {} ({}): {}", failure.name, failure.stage, failure.error);
                }
            }
            Err(e.into())
        }
    }
}

async fn cmd_wait(
    driver: &Driver,
    namespace: &str,
    label: &str,
    replicas: usize,
    kind: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind: WorkloadKind = kind.parse()?;
    let descriptor = WorkloadDescriptor::new(label, namespace, replicas, kind);

    let endpoint = driver.wait_for_ready(&descriptor).await?;
    println!();
    println!("{} reachable at {}", label, endpoint.cluster_ip);
    Ok(())
}

async fn cmd_drain(driver: &Driver, namespace: &str) -> Result<(), Box<dyn std::error::Error>> {
    driver.wait_for_drain(namespace).await?;
    println!();
    println!("No managed pods left in {}", namespace);
    Ok(())
}
