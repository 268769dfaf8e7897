//! The provisioning orchestrator.

use crate::error::ProvisionError;
use crate::locks::InstanceLocks;
use crate::tracker::UsageTracker;
use dbprov_core::{Identifier, InstanceName, InstanceState, ProvisionOutcome};
use dbprov_engine::{Engine, EngineConnection, StrategyOptions, locator, strategy};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of a successful provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub instance: InstanceName,
    pub outcome: ProvisionOutcome,
}

/// Action chosen from an instance's state and the caller's reset flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The instance exists and no reset was asked for.
    Reuse,
    /// Restore the template backup, then snapshot the new instance.
    CreateFromBackup,
    /// Revert the existing instance to its snapshot.
    ResetFromSnapshot,
}

impl Strategy {
    /// Decision table. An absent instance is always created, even when a
    /// reset was requested.
    pub fn select(state: InstanceState, reset_to_snapshot: bool) -> Self {
        match (state, reset_to_snapshot) {
            (InstanceState::Absent, _) => Self::CreateFromBackup,
            (InstanceState::Present, false) => Self::Reuse,
            (InstanceState::Present, true) => Self::ResetFromSnapshot,
        }
    }

    pub fn outcome(self) -> ProvisionOutcome {
        match self {
            Self::Reuse => ProvisionOutcome::AlreadyExists,
            Self::CreateFromBackup => ProvisionOutcome::Created,
            Self::ResetFromSnapshot => ProvisionOutcome::RestoredFromSnapshot,
        }
    }
}

/// Hands out per-caller instances of template databases.
pub struct Provisioner {
    engine: Arc<dyn Engine>,
    locks: Arc<InstanceLocks>,
    tracker: UsageTracker,
    options: StrategyOptions,
}

impl Provisioner {
    pub fn new(
        engine: Arc<dyn Engine>,
        locks: Arc<InstanceLocks>,
        tracker: UsageTracker,
        options: StrategyOptions,
    ) -> Self {
        Self {
            engine,
            locks,
            tracker,
            options,
        }
    }

    pub fn locks(&self) -> &InstanceLocks {
        &self.locks
    }

    /// Ensure the instance for `(template, caller)` exists, optionally reset
    /// to its snapshot.
    ///
    /// Names are validated before anything else happens. Work on one instance
    /// is serialized; the engine state is queried only once the lock is held.
    /// `cancel` is honoured while waiting for the lock and before the chosen
    /// strategy starts, but never interrupts a running strategy.
    pub async fn provision(
        &self,
        template: &str,
        caller: &str,
        reset_to_snapshot: bool,
        cancel: &CancellationToken,
    ) -> Result<Provisioned, ProvisionError> {
        let (template, caller, instance) = InstanceName::resolve(template, caller)?;

        let _guard = self.locks.acquire(&instance, cancel).await?;
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        let outcome = self
            .run_locked(&template, &instance, reset_to_snapshot, cancel)
            .await?;

        self.tracker.touch(&instance, &template, &caller).await;

        tracing::info!(
            instance = %instance,
            template = %template,
            caller = %caller,
            outcome = %outcome,
            "Provisioned instance"
        );

        Ok(Provisioned { instance, outcome })
    }

    async fn run_locked(
        &self,
        template: &Identifier,
        instance: &InstanceName,
        reset_to_snapshot: bool,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let mut conn = self.engine.connect().await?;

        let result = self
            .apply(conn.as_mut(), template, instance, reset_to_snapshot, cancel)
            .await;

        if let Err(e) = conn.close().await {
            tracing::warn!(instance = %instance, error = %e, "Failed to close engine connection");
        }

        result
    }

    async fn apply(
        &self,
        conn: &mut dyn EngineConnection,
        template: &Identifier,
        instance: &InstanceName,
        reset_to_snapshot: bool,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let state = locator::query_state(conn, instance).await?;
        let chosen = Strategy::select(state, reset_to_snapshot);
        tracing::debug!(instance = %instance, ?state, strategy = ?chosen, "Selected strategy");

        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        match chosen {
            Strategy::Reuse => {}
            Strategy::CreateFromBackup => {
                strategy::create_from_backup(conn, template, instance, &self.options).await?;
            }
            Strategy::ResetFromSnapshot => {
                strategy::reset_from_snapshot(conn, instance, &self.options).await?;
            }
        }

        Ok(chosen.outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table() {
        use InstanceState::*;
        assert_eq!(Strategy::select(Absent, false), Strategy::CreateFromBackup);
        assert_eq!(Strategy::select(Absent, true), Strategy::CreateFromBackup);
        assert_eq!(Strategy::select(Present, false), Strategy::Reuse);
        assert_eq!(Strategy::select(Present, true), Strategy::ResetFromSnapshot);
    }

    #[test]
    fn outcomes_follow_strategy() {
        assert_eq!(Strategy::Reuse.outcome(), ProvisionOutcome::AlreadyExists);
        assert_eq!(Strategy::CreateFromBackup.outcome(), ProvisionOutcome::Created);
        assert_eq!(
            Strategy::ResetFromSnapshot.outcome(),
            ProvisionOutcome::RestoredFromSnapshot
        );
    }
}
