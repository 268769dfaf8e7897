//! Best-effort usage tracking.

use dbprov_core::{Identifier, InstanceName};
use dbprov_metadata::UsageRepo;
use std::sync::Arc;
use time::OffsetDateTime;

/// Records when each instance was first and last handed out.
///
/// Tracking never affects a provision's result: failures are logged and
/// dropped.
#[derive(Clone)]
pub struct UsageTracker {
    repo: Arc<dyn UsageRepo>,
}

impl UsageTracker {
    pub fn new(repo: Arc<dyn UsageRepo>) -> Self {
        Self { repo }
    }

    /// Upsert the usage record of `instance` with the current time.
    pub async fn touch(&self, instance: &InstanceName, template: &Identifier, caller: &Identifier) {
        let now = OffsetDateTime::now_utc();
        if let Err(e) = self
            .repo
            .touch_instance(instance.as_str(), template.as_str(), caller.as_str(), now)
            .await
        {
            tracing::warn!(
                instance = %instance,
                error = %e,
                "Failed to record instance usage"
            );
        }
    }
}
