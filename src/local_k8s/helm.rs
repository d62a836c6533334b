use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Run `helm uninstall` for one release and return helm's stdout.
pub async fn uninstall_release(name: &str, namespace: &str) -> Result<String> {
    debug!(release = %name, namespace = %namespace, "running helm uninstall");

    let output = Command::new("helm")
        .arg("uninstall")
        .arg(name)
        .arg("--namespace")
        .arg(namespace)
        .output()
        .await
        .context("failed to run helm")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("helm uninstall exited with {}: {}", output.status, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
