use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use crate::expiry::ReleaseKey;
use crate::local_k8s::ClusterTools;

/// What happened (or would happen) to one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    WouldUninstall,
    Uninstalled,
    Failed,
    /// No release-namespace annotation was recorded, so the release
    /// manager was never invoked: an uninstall without a namespace would
    /// land in whatever namespace helm defaults to.
    SkippedNoNamespace,
}

#[derive(Debug, Serialize)]
pub struct ReleaseReport {
    pub release: ReleaseKey,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Uninstall every release in the set, one at a time.
///
/// A failed uninstall is recorded and the remaining releases are still
/// processed. With `dry_run` no destructive call is made at all. The
/// namespace check runs before the dry-run check so a dry run predicts
/// exactly what a real run would do.
pub async fn cleanup_releases<T: ClusterTools>(
    tools: &T,
    releases: &BTreeSet<ReleaseKey>,
    dry_run: bool,
) -> Vec<ReleaseReport> {
    let mut reports = Vec::with_capacity(releases.len());

    for release in releases {
        let Some(namespace) = release.namespace.as_deref() else {
            reports.push(ReleaseReport {
                release: release.clone(),
                outcome: Outcome::SkippedNoNamespace,
                detail: None,
            });
            continue;
        };

        if dry_run {
            reports.push(ReleaseReport {
                release: release.clone(),
                outcome: Outcome::WouldUninstall,
                detail: None,
            });
            continue;
        }

        info!(release = %release, "uninstalling release");
        let report = match tools.uninstall_release(&release.name, namespace).await {
            Ok(output) => ReleaseReport {
                release: release.clone(),
                outcome: Outcome::Uninstalled,
                detail: Some(output),
            },
            Err(e) => ReleaseReport {
                release: release.clone(),
                outcome: Outcome::Failed,
                detail: Some(e.to_string()),
            },
        };
        reports.push(report);
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::ClusterObject;
    use crate::local_k8s::Scope;
    use anyhow::{bail, Result};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTools {
        inventory: Vec<ClusterObject>,
        fail_on: Option<String>,
        uninstalled: Mutex<Vec<(String, String)>>,
    }

    impl FakeTools {
        fn failing_on(name: &str) -> Self {
            Self {
                fail_on: Some(name.to_string()),
                ..Default::default()
            }
        }

        fn uninstalled(&self) -> Vec<(String, String)> {
            self.uninstalled.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ClusterTools for FakeTools {
        async fn fetch_inventory(&self, _scope: &Scope) -> Result<Vec<ClusterObject>> {
            Ok(self.inventory.clone())
        }

        async fn uninstall_release(&self, name: &str, namespace: &str) -> Result<String> {
            if self.fail_on.as_deref() == Some(name) {
                bail!("release: not found");
            }
            self.uninstalled
                .lock()
                .unwrap()
                .push((name.to_string(), namespace.to_string()));
            Ok(format!("release \"{name}\" uninstalled\n"))
        }
    }

    fn release(name: &str, namespace: Option<&str>) -> ReleaseKey {
        ReleaseKey {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn uninstalls_every_release_once() {
        let tools = FakeTools::default();
        let releases: BTreeSet<_> = [release("bar", Some("ns2")), release("foo", Some("ns1"))]
            .into_iter()
            .collect();

        let reports = cleanup_releases(&tools, &releases, false).await;

        assert!(reports.iter().all(|r| r.outcome == Outcome::Uninstalled));
        let mut calls = tools.uninstalled();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("bar".to_string(), "ns2".to_string()),
                ("foo".to_string(), "ns1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn dry_run_performs_no_destructive_calls() {
        let tools = FakeTools::default();
        let releases: BTreeSet<_> = [release("foo", Some("ns1")), release("bar", Some("ns2"))]
            .into_iter()
            .collect();

        let reports = cleanup_releases(&tools, &releases, true).await;

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome == Outcome::WouldUninstall));
        assert!(tools.uninstalled().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let tools = FakeTools::failing_on("bad");
        let releases: BTreeSet<_> = [
            release("bad", Some("ns1")),
            release("good-1", Some("ns1")),
            release("good-2", Some("ns2")),
        ]
        .into_iter()
        .collect();

        let reports = cleanup_releases(&tools, &releases, false).await;

        assert_eq!(reports.len(), 3);
        let failed: Vec<_> = reports
            .iter()
            .filter(|r| r.outcome == Outcome::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].release.name, "bad");
        assert_eq!(failed[0].detail.as_deref(), Some("release: not found"));
        assert_eq!(tools.uninstalled().len(), 2);
    }

    #[tokio::test]
    async fn release_without_namespace_is_never_invoked() {
        let tools = FakeTools::default();
        let releases: BTreeSet<_> = [release("foo", None), release("bar", Some("ns2"))]
            .into_iter()
            .collect();

        let reports = cleanup_releases(&tools, &releases, false).await;

        let skipped: Vec<_> = reports
            .iter()
            .filter(|r| r.outcome == Outcome::SkippedNoNamespace)
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].release.name, "foo");
        assert_eq!(tools.uninstalled(), vec![("bar".to_string(), "ns2".to_string())]);
    }

    #[tokio::test]
    async fn expired_inventory_flows_through_to_uninstall() {
        use crate::expiry::{
            find_expired_releases, EXPIRY_ANNOTATION, RELEASE_NAMESPACE_ANNOTATION,
            RELEASE_NAME_ANNOTATION,
        };
        use chrono::TimeZone;

        let annotations: std::collections::BTreeMap<String, String> = [
            (EXPIRY_ANNOTATION, "2020-01-01T00:00:00Z"),
            (RELEASE_NAME_ANNOTATION, "bar"),
            (RELEASE_NAMESPACE_ANNOTATION, "ns2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let tools = FakeTools {
            inventory: vec![
                ClusterObject {
                    name: "pod-1".to_string(),
                    annotations: annotations.clone(),
                },
                ClusterObject {
                    name: "svc-1".to_string(),
                    annotations,
                },
            ],
            ..Default::default()
        };

        let objects = tools.fetch_inventory(&Scope::AllNamespaces).await.unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expired = find_expired_releases(&objects, now);
        let reports = cleanup_releases(&tools, &expired, false).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, Outcome::Uninstalled);
        assert_eq!(
            tools.uninstalled(),
            vec![("bar".to_string(), "ns2".to_string())]
        );
    }

    #[tokio::test]
    async fn release_without_namespace_is_skipped_in_dry_run_too() {
        let tools = FakeTools::default();
        let releases: BTreeSet<_> = [release("foo", None)].into_iter().collect();

        let reports = cleanup_releases(&tools, &releases, true).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, Outcome::SkippedNoNamespace);
    }
}
