//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

/// Usage record of one provisioned instance.
#[derive(Debug, Clone, FromRow)]
pub struct InstanceUsageRow {
    pub full_instance_name: String,
    pub template_name: String,
    pub caller_id: String,
    /// Set on first successful provision, never updated.
    pub first_provisioned_at: OffsetDateTime,
    /// Updated on every successful provision.
    pub last_accessed_at: OffsetDateTime,
}
