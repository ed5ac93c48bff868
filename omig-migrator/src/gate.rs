use std::cmp::Ordering;

use omig_store::{HostStore, RecordQuery};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::VersionGates;

pub const INSTALLATION_CLASS: &str = "_Installation";
const APP_NAME_KEY: &str = "appName";
const APP_VERSION_KEY: &str = "appVersion";

/// Whether a write issued by `installation_id` has to be migrated by the
/// live triggers. Clients at or above the gated version of their app write
/// to the destination themselves. Anything unknown is migrated.
pub(crate) async fn needs_migration(
    store: &dyn HostStore,
    gates: &VersionGates,
    installation_id: Option<&str>,
) -> bool {
    if gates.is_empty() {
        return true;
    }
    let Some(installation_id) = installation_id else {
        debug!("No installation id; migrating to be safe");
        return true;
    };

    let query = RecordQuery::new(INSTALLATION_CLASS)
        .id_in(vec![installation_id.to_string()])
        .limit(1);
    let installation = match store.find(&query).await {
        Ok(found) => found.into_iter().next(),
        Err(e) => {
            warn!(
                "Failed to load installation {}: {}; migrating to be safe",
                installation_id, e
            );
            return true;
        }
    };
    let Some(installation) = installation else {
        debug!(
            "Installation {} does not exist; migrating to be safe",
            installation_id
        );
        return true;
    };

    let (Some(Value::String(app_name)), Some(Value::String(version))) = (
        installation.get(APP_NAME_KEY),
        installation.get(APP_VERSION_KEY),
    ) else {
        info!(
            "Installation {} has no app name or version; migrating to be safe",
            installation_id
        );
        return true;
    };
    let Some(min_version) = gates.min_version(app_name) else {
        debug!("No migrated version known for app {}", app_name);
        return true;
    };
    compare_versions(version, min_version) == Ordering::Less
}

/// Compares dotted versions segment by segment, numerically where both
/// segments are numbers. `1.2` sorts before `1.2.0`.
pub(crate) fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut left = left.split('.');
    let mut right = right.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let order = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if order != Ordering::Equal {
                    return order;
                }
            }
        }
    }
}
