//! Finds helm-managed cluster objects whose `cloudbees/expiry` annotation
//! has passed and uninstalls the releases that own them.

mod cleanup;
mod expiry;
mod local_k8s;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::cleanup::{cleanup_releases, Outcome, ReleaseReport};
use crate::expiry::find_expired_releases;
use crate::local_k8s::{ClusterTools, KubeHelm, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Uninstall helm releases whose objects carry an expired expiry annotation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Kubernetes namespace to check (default: all namespaces)
    #[arg(long, short = 'n')]
    namespace: Option<String>,

    /// Print actions without executing them
    #[arg(long)]
    dry_run: bool,

    /// Report format for the cleanup results
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,
}

impl Args {
    fn scope(&self) -> Scope {
        match &self.namespace {
            Some(ns) => Scope::Namespace(ns.clone()),
            None => Scope::AllNamespaces,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let text = args.output == OutputFormat::Text;

    let tools = KubeHelm::connect().await?;

    if text {
        println!("Finding expired releases...");
    } else {
        info!("finding expired releases");
    }
    let inventory = tools.fetch_inventory(&args.scope()).await?;
    let expired = find_expired_releases(&inventory, Utc::now());

    if expired.is_empty() {
        if text {
            println!("No expired releases found.");
        } else {
            println!("[]");
        }
        return Ok(());
    }

    if text {
        println!("\nFound {} expired release(s):", expired.len());
        for release in &expired {
            println!("- {release}");
        }
        println!("\nProceeding with cleanup...");
    }

    let reports = cleanup_releases(&tools, &expired, args.dry_run).await;

    if text {
        print_reports(&reports);
    } else {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(())
}

/// Results go to stdout, failures to stderr. Individual failures never
/// change the exit code; only top-level errors do.
fn print_reports(reports: &[ReleaseReport]) {
    for report in reports {
        match report.outcome {
            Outcome::WouldUninstall => {
                println!("[DRY RUN] Would uninstall release: {}", report.release);
            }
            Outcome::Uninstalled => {
                println!("Successfully uninstalled release: {}", report.release);
                if let Some(output) = report.detail.as_deref() {
                    let output = output.trim_end();
                    if !output.is_empty() {
                        println!("{output}");
                    }
                }
            }
            Outcome::Failed => {
                let detail = report.detail.as_deref().unwrap_or("unknown error");
                eprintln!("Failed to uninstall release {}: {}", report.release, detail);
            }
            Outcome::SkippedNoNamespace => {
                eprintln!(
                    "Skipping release with no recorded namespace: {}",
                    report.release
                );
            }
        }
    }
}
