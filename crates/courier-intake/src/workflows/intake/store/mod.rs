//! Durable record of submitted applications.

mod memory;
mod sqlite;

pub use memory::MemoryApplicationStore;
pub use sqlite::SqliteApplicationStore;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::domain::{
    ApplicationFields, ApplicationId, ApplicationRecord, ApplicationStatus, FieldViolation,
    RecentApplication, StatusAndOwner, Submitter,
};

/// Storage collaborator for the intake and moderation workflows.
///
/// `transition` is the only coordination primitive between concurrent moderation
/// directives: it must apply atomically and only when the current status matches `from`.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Insert a new record with status `new` and return its id.
    async fn create(
        &self,
        fields: ApplicationFields,
        submitter: Submitter,
    ) -> Result<ApplicationId, StoreError>;

    async fn status_and_owner(&self, id: ApplicationId) -> Result<StatusAndOwner, StoreError>;

    /// Conditional status update; `Ok(false)` means the precondition did not hold.
    async fn transition(
        &self,
        id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, StoreError>;

    async fn counts_by_status(&self) -> Result<BTreeMap<ApplicationStatus, u64>, StoreError>;

    /// Most recent `new` applications, newest first.
    async fn recent_new(&self, limit: usize) -> Result<Vec<RecentApplication>, StoreError>;

    async fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application rejected by store: {0}")]
    Invalid(#[from] FieldViolation),
    #[error("transition from {from:?} to {to:?} is not allowed")]
    IllegalTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("storage call exceeded {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored row is malformed: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Run a storage call with an upper bound; an elapsed timer counts as a storage failure.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

pub(crate) fn ensure_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), StoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition { from, to })
    }
}
