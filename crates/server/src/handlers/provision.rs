//! Provisioning endpoint.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use dbprov_core::ProvisionOutcome;
use dbprov_provisioner::ProvisionError;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Query string of `POST /{template}/{caller}`.
#[derive(Debug, Default, Deserialize)]
pub struct ProvisionQuery {
    #[serde(rename = "restoreFromSnapshot")]
    pub restore_from_snapshot: Option<bool>,
}

/// Optional JSON body of `POST /{template}/{caller}`.
#[derive(Debug, Default, Deserialize)]
pub struct ProvisionBody {
    #[serde(rename = "restoreFromSnapshot", default)]
    pub restore_from_snapshot: Option<bool>,
}

/// Provision response.
#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    /// Full instance name.
    pub database: String,
    pub status: ProvisionOutcome,
}

/// Work out the reset flag. The query parameter wins over the body; both
/// absent means no reset.
fn reset_requested(
    query: Result<Query<ProvisionQuery>, QueryRejection>,
    body: &Bytes,
) -> ApiResult<bool> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if let Some(flag) = query.restore_from_snapshot {
        return Ok(flag);
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(false);
    }
    let body: ProvisionBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
    Ok(body.restore_from_snapshot.unwrap_or(false))
}

/// POST /{template}/{caller} - Ensure the caller's instance of a template exists.
///
/// Returns 201 when the instance was created from the template backup and
/// 200 when it already existed or was reset to its snapshot.
///
/// The provision runs on its own task. A client that goes away while the
/// request still waits for the instance lock cancels it; once a strategy has
/// started it runs to completion regardless.
#[tracing::instrument(skip_all, fields(template = %template, caller = %caller))]
pub async fn provision_instance(
    State(state): State<AppState>,
    Path((template, caller)): Path<(String, String)>,
    query: Result<Query<ProvisionQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Response> {
    let reset = reset_requested(query, &body)?;

    let cancel = state.shutdown.child_token();
    let _disconnect_guard = cancel.clone().drop_guard();

    let task = {
        let provisioner = state.provisioner.clone();
        let (template, caller) = (template.clone(), caller.clone());
        tokio::spawn(
            async move {
                let _in_flight = metrics::InFlightGuard::new();
                let timer = metrics::PROVISION_DURATION.start_timer();
                let result = provisioner
                    .provision(&template, &caller, reset, &cancel)
                    .await;
                timer.observe_duration();

                match &result {
                    Ok(provisioned) => metrics::record_provision(provisioned.outcome),
                    Err(e) => {
                        metrics::record_provision_failure(e.code());
                        match e {
                            ProvisionError::InvalidIdentifier(_) | ProvisionError::Cancelled => {
                                tracing::warn!(error = %e, "Provision rejected");
                            }
                            _ => tracing::error!(error = %e, reset, "Provision failed"),
                        }
                    }
                }
                result
            }
            .in_current_span(),
        )
    };

    let provisioned = task
        .await
        .map_err(|e| ApiError::Internal(format!("provision task failed: {e}")))??;

    let body = Json(ProvisionResponse {
        database: provisioned.instance.to_string(),
        status: provisioned.outcome,
    });

    let response = match provisioned.outcome {
        ProvisionOutcome::Created => (
            StatusCode::CREATED,
            [(header::LOCATION, format!("/{template}/{caller}"))],
            body,
        )
            .into_response(),
        ProvisionOutcome::AlreadyExists | ProvisionOutcome::RestoredFromSnapshot => {
            (StatusCode::OK, body).into_response()
        }
    };
    Ok(response)
}
