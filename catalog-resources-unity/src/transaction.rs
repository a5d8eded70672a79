//! Executing an update plan, with compensation for a partially applied owner
//! change.
//!
//! Calls run strictly in plan order, each exactly once. When a call fails after
//! the owner call went through, one compensating call restores the owner that
//! was observed before the transaction. Attribute changes are never
//! compensated: the attribute call is always last, so nothing follows it.
//!
//! The outcome only reports what happened to our own calls. Callers re-read
//! the remote state to find out what actually persisted.

use thiserror::Error;
use tracing::Instrument as _;

use crate::{
    api::{ApiError, CatalogApi},
    external_location::ExternalLocationState,
    plan::{plan, UpdateCall},
};

/// What became of the calls of one update.
#[derive(Debug)]
pub enum TransactionOutcome {
    Success,
    /// A call failed. Any owner change made before it has been reverted.
    Failed(ApiError),
    /// A call failed, and so did reverting the owner.
    FailedWithRollbackFailure {
        primary: ApiError,
        rollback: ApiError,
    },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Failed(ApiError),
    #[error("{primary}. Owner rollback also failed: {rollback}")]
    RollbackFailed { primary: ApiError, rollback: ApiError },
}

impl UpdateError {
    /// The error of the call that failed first.
    pub fn primary(&self) -> &ApiError {
        match self {
            UpdateError::Failed(e) => e,
            UpdateError::RollbackFailed { primary, .. } => primary,
        }
    }
}

impl TransactionOutcome {
    pub fn into_result(self) -> Result<(), UpdateError> {
        match self {
            TransactionOutcome::Success => Ok(()),
            TransactionOutcome::Failed(e) => Err(UpdateError::Failed(e)),
            TransactionOutcome::FailedWithRollbackFailure { primary, rollback } => {
                Err(UpdateError::RollbackFailed { primary, rollback })
            }
        }
    }
}

/// Run `calls` against the location `name`.
///
/// `previous_owner` is the owner observed before any call ran; it is what a
/// compensating call restores. When it is unknown, an owner change can not be
/// reverted and the failure is reported as is.
pub async fn execute<C: CatalogApi + ?Sized>(
    api: &C,
    name: &str,
    calls: &[UpdateCall],
    previous_owner: Option<&str>,
) -> TransactionOutcome {
    let mut owner_changed = false;

    for call in calls {
        tracing::debug!(?call, "applying update call");
        let primary = match api.update_external_location(name, &call.to_request()).await {
            Ok(_) => {
                owner_changed |= call.is_owner();
                continue;
            }
            Err(e) => e,
        };

        if !owner_changed {
            return TransactionOutcome::Failed(primary);
        }

        let Some(previous_owner) = previous_owner else {
            tracing::warn!(
                error = %primary,
                "update failed after changing the owner, but the previous owner is unknown; not rolling back"
            );
            return TransactionOutcome::Failed(primary);
        };

        tracing::warn!(
            error = %primary,
            owner = previous_owner,
            "update failed after changing the owner; rolling back the owner"
        );
        let compensation = UpdateCall::Owner {
            owner: previous_owner.to_string(),
        };
        return match api
            .update_external_location(name, &compensation.to_request())
            .await
        {
            Ok(_) => TransactionOutcome::Failed(primary),
            Err(rollback) => {
                tracing::error!(error = %rollback, "owner rollback failed");
                TransactionOutcome::FailedWithRollbackFailure { primary, rollback }
            }
        };
    }

    TransactionOutcome::Success
}

/// Bring the location from `observed` to `desired`.
///
/// `observed` must have been read at the start of this update.
pub async fn update<C: CatalogApi + ?Sized>(
    api: &C,
    desired: &ExternalLocationState,
    observed: &ExternalLocationState,
    force: bool,
) -> Result<(), UpdateError> {
    let calls = plan(observed, desired, force);
    if calls.is_empty() {
        tracing::debug!(location = %desired.name, "nothing to update");
        return Ok(());
    }

    let span = tracing::info_span!("update", location = %desired.name, calls = calls.len());
    execute(api, &desired.name, &calls, observed.owner.as_deref())
        .instrument(span)
        .await
        .into_result()
}
