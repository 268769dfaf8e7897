//! Usage listing endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use dbprov_metadata::InstanceUsageRow;
use serde::Serialize;
use time::OffsetDateTime;

/// One provisioned instance and its usage timestamps.
#[derive(Debug, Serialize)]
pub struct InstanceUsageResponse {
    pub database: String,
    pub template: String,
    pub caller: String,
    #[serde(with = "time::serde::rfc3339")]
    pub first_provisioned_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_accessed_at: OffsetDateTime,
}

impl From<InstanceUsageRow> for InstanceUsageResponse {
    fn from(row: InstanceUsageRow) -> Self {
        Self {
            database: row.full_instance_name,
            template: row.template_name,
            caller: row.caller_id,
            first_provisioned_at: row.first_provisioned_at,
            last_accessed_at: row.last_accessed_at,
        }
    }
}

/// List response.
#[derive(Debug, Serialize)]
pub struct ListInstancesResponse {
    pub instances: Vec<InstanceUsageResponse>,
}

/// GET /v1/instances - List tracked instances, most recently accessed first.
///
/// Reads tracking records only; instances dropped out of band still appear.
pub async fn list_instances(
    State(state): State<AppState>,
) -> ApiResult<Json<ListInstancesResponse>> {
    let rows = state.metadata.list_instance_usage().await?;
    Ok(Json(ListInstancesResponse {
        instances: rows.into_iter().map(Into::into).collect(),
    }))
}
