//! Instance usage repository.

use crate::error::MetadataResult;
use crate::models::InstanceUsageRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for instance usage records.
#[async_trait]
pub trait UsageRepo: Send + Sync {
    /// Insert a usage record, or bump `last_accessed_at` if one exists.
    ///
    /// Template name and caller id are only written on insert.
    async fn touch_instance(
        &self,
        full_instance_name: &str,
        template_name: &str,
        caller_id: &str,
        accessed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Get the usage record of an instance.
    async fn get_instance_usage(
        &self,
        full_instance_name: &str,
    ) -> MetadataResult<Option<InstanceUsageRow>>;

    /// List usage records, most recently accessed first.
    async fn list_instance_usage(&self) -> MetadataResult<Vec<InstanceUsageRow>>;
}
