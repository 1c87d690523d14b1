//! NetPulse CLI
//!
//! Commands: `serve` the HTTP API, `discover` a subnet, `monitor` a device,
//! run a `compliance` audit, or `chat` with the intent router. Exit code is
//! 0 on success and 1 on fatal errors.

use clap::{Parser, Subcommand};

use netpulse_agents::{AgentHandler, Coordinator};
use netpulse_agents::compliance::ComplianceHandler;
use netpulse_collect::{PollCollector, PollTarget};
use netpulse_model::AgentTask;
use netpulse_monitor::HealthEngine;
use netpulse_topology::NetworkScanner;

#[derive(Parser)]
#[command(name = "netpulse")]
#[command(about = "NetPulse - network operations observability platform")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Bind port
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Discover network devices on a subnet
    Discover {
        /// Subnet to scan (CIDR)
        #[arg(long, default_value = "10.0.0.0/24")]
        subnet: String,
        /// SNMP community string
        #[arg(long, default_value = "public")]
        community: String,
    },
    /// Show health metrics for a device
    Monitor {
        /// Device hostname or address
        #[arg(long)]
        device: Option<String>,
    },
    /// Run a compliance audit
    Compliance {
        /// Framework filter (NIST-800-53, CIS, PCI-DSS)
        #[arg(long)]
        framework: Option<String>,
    },
    /// Chat with the intent router
    Chat {
        /// Free-text query
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { host, port } => {
            println!("Starting NetPulse API on {host}:{port}");
            netpulse_gateway::run_server(&host, port, true).await?;
        }
        Commands::Discover { subnet, community } => {
            discover(&subnet, &community).await?;
        }
        Commands::Monitor { device } => {
            monitor(device.as_deref()).await?;
        }
        Commands::Compliance { framework } => {
            compliance(framework.as_deref()).await?;
        }
        Commands::Chat { message } => {
            let mut coordinator = Coordinator::new(true);
            let response = coordinator.chat(&message, None).await;
            println!("\n{response}");
        }
    }
    Ok(())
}

async fn discover(subnet: &str, community: &str) -> anyhow::Result<()> {
    println!("Scanning {subnet}...");
    let mut scanner = NetworkScanner::new(true);
    let devices = scanner.scan_subnet(subnet, community).await?;

    println!("\nDiscovered {} devices:\n", devices.len());
    for device in &devices {
        println!(
            "  {:<25} {:<15} {:<10} {:<20} {}",
            device.hostname,
            device.ip_address,
            device.vendor.as_str(),
            device.model,
            device.os_version,
        );
    }
    Ok(())
}

async fn monitor(device: Option<&str>) -> anyhow::Result<()> {
    let target = device.unwrap_or("10.0.0.1");
    let mut poller = PollCollector::new(true);
    poller.add_target(PollTarget::new(target));

    let metrics = poller.poll_one(target).await?;
    let mut health = HealthEngine::default();
    let alerts = health.process_metrics(&metrics);

    println!("\nHealth metrics for {target}:\n");
    for metric in &metrics {
        let interface = metric
            .interface_name
            .as_deref()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        println!(
            "  {:<20}{:<25} {:>8.1} {}",
            metric.metric_type.as_str(),
            interface,
            metric.value,
            metric.unit,
        );
    }

    if !alerts.is_empty() {
        println!("\n{} alert(s):", alerts.len());
        for alert in &alerts {
            println!("  [{:<8}] {}", alert.severity.as_str(), alert.title);
        }
    }
    Ok(())
}

async fn compliance(framework: Option<&str>) -> anyhow::Result<()> {
    let mut handler = ComplianceHandler::new(true);
    let task = AgentTask::new(
        "compliance",
        "audit_all",
        serde_json::json!({"framework": framework}),
    );
    let result = handler.process(task).await;

    let summary = &result.output["summary"];
    println!("\nCompliance Audit Results");
    println!("{}", "=".repeat(50));
    println!("Overall Score: {}%", summary["overall_score"]);
    println!(
        "Checks: {} total, {} passed, {} failed\n",
        summary["total_checks"], summary["compliant"], summary["non_compliant"],
    );

    if let Some(devices) = result.output["devices"].as_object() {
        for (device_id, audit) in devices {
            println!("  {device_id}: {}%", audit["score"]);
            if let Some(failures) = audit["failures"].as_array() {
                for failure in failures {
                    println!("    FAIL: {}", failure["rule"].as_str().unwrap_or_default());
                }
            }
        }
    }
    Ok(())
}
