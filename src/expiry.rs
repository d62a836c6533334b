use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Annotation holding the instant after which the owning release is stale.
pub const EXPIRY_ANNOTATION: &str = "cloudbees/expiry";

/// Annotations helm stamps on every object it manages.
pub const RELEASE_NAME_ANNOTATION: &str = "meta.helm.sh/release-name";
pub const RELEASE_NAMESPACE_ANNOTATION: &str = "meta.helm.sh/release-namespace";

/// One cluster object's metadata, reduced to what expiry scanning needs.
/// The name is only used to identify the object in warnings.
#[derive(Debug, Clone, Default)]
pub struct ClusterObject {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

/// A helm release identified by name and namespace. Objects annotated
/// without a release-namespace map to `namespace: None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReleaseKey {
    pub name: String,
    pub namespace: Option<String>,
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} ({})", self.name, ns),
            None => write!(f, "{} (no namespace)", self.name),
        }
    }
}

/// Collect the releases whose expiry annotation lies strictly before `now`.
///
/// Objects missing the expiry or release-name annotation are not
/// expiry-managed and are ignored. A malformed timestamp skips only the
/// object carrying it: the rest of the snapshot is still scanned.
pub fn find_expired_releases(
    objects: &[ClusterObject],
    now: DateTime<Utc>,
) -> BTreeSet<ReleaseKey> {
    let mut expired = BTreeSet::new();

    for obj in objects {
        let Some(expiry) = obj.annotations.get(EXPIRY_ANNOTATION) else {
            continue;
        };
        let Some(release_name) = obj.annotations.get(RELEASE_NAME_ANNOTATION) else {
            continue;
        };

        // RFC 3339 only, trailing `Z` included; an offset-less timestamp
        // has no defined instant and counts as malformed.
        let expires_at = match DateTime::parse_from_rfc3339(expiry) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                warn!(
                    resource = %obj.name,
                    expiry = %expiry,
                    error = %e,
                    "invalid expiry annotation, skipping object"
                );
                continue;
            }
        };

        if expires_at < now {
            expired.insert(ReleaseKey {
                name: release_name.clone(),
                namespace: obj.annotations.get(RELEASE_NAMESPACE_ANNOTATION).cloned(),
            });
        }
    }

    expired
}
