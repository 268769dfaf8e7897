//! Instance existence probes.

use crate::error::EngineResult;
use crate::gateway::EngineConnection;
use crate::statement::Statement;
use dbprov_core::{InstanceName, InstanceState, SnapshotName};

/// Query whether the instance currently exists in the engine.
///
/// Issues a single `DB_ID` lookup and changes nothing. The answer is never
/// cached: instances can be dropped out of band between calls.
pub async fn query_state(
    conn: &mut dyn EngineConnection,
    instance: &InstanceName,
) -> EngineResult<InstanceState> {
    if database_exists(conn, instance.as_str()).await? {
        Ok(InstanceState::Present)
    } else {
        Ok(InstanceState::Absent)
    }
}

/// Query whether the snapshot exists in the engine.
pub async fn snapshot_exists(
    conn: &mut dyn EngineConnection,
    snapshot: &SnapshotName,
) -> EngineResult<bool> {
    database_exists(conn, snapshot.as_str()).await
}

async fn database_exists(conn: &mut dyn EngineConnection, name: &str) -> EngineResult<bool> {
    let id = conn.query_scalar(&Statement::database_id(name)).await?;
    Ok(id.is_some())
}
