use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{ensure_transition, ApplicationStore, StoreError};
use crate::workflows::intake::domain::{
    ApplicationFields, ApplicationId, ApplicationRecord, ApplicationStatus, RecentApplication,
    StatusAndOwner, Submitter,
};

/// Process-local store; the compare-and-set in `transition` runs under the map lock.
#[derive(Debug, Default)]
pub struct MemoryApplicationStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: BTreeMap<ApplicationId, ApplicationRecord>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn create(
        &self,
        fields: ApplicationFields,
        submitter: Submitter,
    ) -> Result<ApplicationId, StoreError> {
        fields.ensure_complete()?;
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = ApplicationId(state.next_id);
        state.records.insert(
            id,
            ApplicationRecord {
                id,
                submitter,
                fields,
                status: ApplicationStatus::New,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn status_and_owner(&self, id: ApplicationId) -> Result<StatusAndOwner, StoreError> {
        let state = self.lock()?;
        let record = state.records.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(StatusAndOwner {
            status: record.status,
            submitter_id: record.submitter.user_id,
            full_name: record.fields.full_name.clone(),
        })
    }

    async fn transition(
        &self,
        id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, StoreError> {
        ensure_transition(from, to)?;
        let mut state = self.lock()?;
        match state.records.get_mut(&id) {
            Some(record) if record.status == from => {
                record.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn counts_by_status(&self) -> Result<BTreeMap<ApplicationStatus, u64>, StoreError> {
        let state = self.lock()?;
        let mut counts = BTreeMap::new();
        for record in state.records.values() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn recent_new(&self, limit: usize) -> Result<Vec<RecentApplication>, StoreError> {
        let state = self.lock()?;
        let mut pending: Vec<&ApplicationRecord> = state
            .records
            .values()
            .filter(|record| record.status == ApplicationStatus::New)
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(pending
            .into_iter()
            .take(limit)
            .map(|record| RecentApplication {
                id: record.id,
                created_at: record.created_at,
                city: record.fields.city.clone(),
            })
            .collect())
    }

    async fn fetch(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.records.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::intake::domain::{
        PriorEmployment, SelfEmployment, Transport, UserId,
    };

    fn fields() -> ApplicationFields {
        ApplicationFields {
            full_name: "Sidorov Petr".to_string(),
            citizenship: "🇰🇿 Kazakhstan".to_string(),
            prior_employment: PriorEmployment::No,
            employment_period: None,
            phone: "+7 (900) 000-00-01".to_string(),
            city: "Omsk".to_string(),
            age: 40,
            self_employment: SelfEmployment::Registered,
            registration: None,
            transport: Transport::Car,
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_and_status_starts_new() {
        let store = MemoryApplicationStore::new();
        let submitter = Submitter::new(UserId(9), None);
        let first = store.create(fields(), submitter.clone()).await.expect("insert");
        let second = store.create(fields(), submitter).await.expect("insert");

        assert_eq!(first, ApplicationId(1));
        assert_eq!(second, ApplicationId(2));
        let owner = store.status_and_owner(second).await.expect("lookup");
        assert_eq!(owner.status, ApplicationStatus::New);
        assert_eq!(owner.full_name, "Sidorov Petr");
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = MemoryApplicationStore::new();
        let id = store
            .create(fields(), Submitter::new(UserId(9), None))
            .await
            .expect("insert");

        assert!(store
            .transition(id, ApplicationStatus::New, ApplicationStatus::Rejected)
            .await
            .expect("transition"));
        assert!(!store
            .transition(id, ApplicationStatus::New, ApplicationStatus::Approved)
            .await
            .expect("transition"));
        assert!(!store
            .transition(ApplicationId(77), ApplicationStatus::New, ApplicationStatus::Approved)
            .await
            .expect("transition"));
        assert!(store.recent_new(5).await.expect("recent").is_empty());
    }
}
