use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::workflows::intake::catalog::{CONFIRM_CHOICE, DOMESTIC_CHOICE};
use crate::workflows::intake::channel::{
    ChannelError, ConversationChannel, ModerationRequest, OutboundMessage,
};
use crate::workflows::intake::domain::{
    ApplicationFields, ApplicationId, ApplicationRecord, ApplicationStatus, PriorEmployment,
    RecentApplication, RegistrationChoice, SelfEmployment, StatusAndOwner, Submitter, Transport,
    UserId,
};
use crate::workflows::intake::machine::EditPolicy;
use crate::workflows::intake::moderation::{ModerationWorkflow, SingleModerator};
use crate::workflows::intake::service::{IntakeService, IntakeSettings};
use crate::workflows::intake::store::{ApplicationStore, StoreError};
use crate::workflows::intake::IntakeDispatcher;

pub(super) const MODERATOR: UserId = UserId(900);

/// Replies that walk a fresh session to confirmation and submit it.
pub(super) const HAPPY_PATH: [&str; 9] = [
    DOMESTIC_CHOICE,
    "Ivanov Ivan Ivanovich",
    "❌ No",
    "+7 912 345 67 89",
    "moscow",
    "25",
    "✅ Yes",
    "🚗 Car",
    CONFIRM_CHOICE,
];

pub(super) fn applicant() -> Submitter {
    Submitter::new(UserId(501), Some("courier_anna".to_string()))
}

pub(super) fn settings(edit_policy: EditPolicy) -> IntakeSettings {
    IntakeSettings {
        edit_policy,
        storage_timeout: Duration::from_millis(200),
        session_idle: Some(chrono::Duration::hours(1)),
    }
}

pub(super) fn fields(city: &str) -> ApplicationFields {
    ApplicationFields {
        full_name: "Ivanov Ivan Ivanovich".to_string(),
        citizenship: "🇷🇺 Russia".to_string(),
        prior_employment: PriorEmployment::No,
        employment_period: None,
        phone: "+7 (912) 345-67-89".to_string(),
        city: city.to_string(),
        age: 25,
        self_employment: SelfEmployment::NotRegistered,
        registration: Some(RegistrationChoice::AtOffice),
        transport: Transport::Car,
    }
}

pub(super) fn intake_service<S>(
    store: Arc<S>,
    channel: Arc<RecordingChannel>,
    edit_policy: EditPolicy,
) -> IntakeService<S, RecordingChannel>
where
    S: ApplicationStore + ?Sized,
{
    IntakeService::new(store, channel, MODERATOR, settings(edit_policy))
}

pub(super) fn moderation_workflow<S>(
    store: Arc<S>,
    channel: Arc<RecordingChannel>,
) -> ModerationWorkflow<S, RecordingChannel, SingleModerator>
where
    S: ApplicationStore + ?Sized,
{
    ModerationWorkflow::new(
        store,
        channel,
        SingleModerator(MODERATOR),
        Duration::from_millis(200),
    )
}

pub(super) fn dispatcher<S>(
    store: Arc<S>,
    channel: Arc<RecordingChannel>,
) -> IntakeDispatcher<S, RecordingChannel, SingleModerator>
where
    S: ApplicationStore + ?Sized,
{
    IntakeDispatcher::new(
        intake_service(store.clone(), channel.clone(), EditPolicy::Rewalk),
        moderation_workflow(store, channel.clone()),
        channel,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Delivery {
    Message {
        recipient: UserId,
        message: OutboundMessage,
    },
    Moderation {
        moderator: UserId,
        request: ModerationRequest,
    },
    Finalized {
        moderator: UserId,
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
}

/// Channel that records every delivery; recipients can be marked unreachable.
#[derive(Debug, Default)]
pub(super) struct RecordingChannel {
    deliveries: Mutex<Vec<Delivery>>,
    unreachable: Mutex<HashSet<UserId>>,
    moderation_offline: Mutex<bool>,
}

impl RecordingChannel {
    pub(super) fn mark_unreachable(&self, user: UserId) {
        self.unreachable.lock().expect("lock").insert(user);
    }

    pub(super) fn take_moderation_offline(&self) {
        *self.moderation_offline.lock().expect("lock") = true;
    }

    pub(super) fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().expect("lock").clone()
    }

    pub(super) fn texts_for(&self, user: UserId) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Message { recipient, message } if recipient == user => {
                    Some(message.text)
                }
                _ => None,
            })
            .collect()
    }

    pub(super) fn last_message_for(&self, user: UserId) -> Option<OutboundMessage> {
        self.deliveries()
            .into_iter()
            .rev()
            .find_map(|delivery| match delivery {
                Delivery::Message { recipient, message } if recipient == user => Some(message),
                _ => None,
            })
    }

    pub(super) fn moderation_requests(&self) -> Vec<ModerationRequest> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Moderation { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub(super) fn finalized(&self) -> Vec<(ApplicationId, ApplicationStatus)> {
        self.deliveries()
            .into_iter()
            .filter_map(|delivery| match delivery {
                Delivery::Finalized {
                    application_id,
                    status,
                    ..
                } => Some((application_id, status)),
                _ => None,
            })
            .collect()
    }

    pub(super) fn clear(&self) {
        self.deliveries.lock().expect("lock").clear();
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries.lock().expect("lock").push(delivery);
    }
}

#[async_trait]
impl ConversationChannel for RecordingChannel {
    async fn send(&self, recipient: UserId, message: OutboundMessage) -> Result<(), ChannelError> {
        if self.unreachable.lock().expect("lock").contains(&recipient) {
            return Err(ChannelError::Unreachable(recipient));
        }
        self.record(Delivery::Message { recipient, message });
        Ok(())
    }

    async fn send_moderation_request(
        &self,
        moderator: UserId,
        request: ModerationRequest,
    ) -> Result<(), ChannelError> {
        if *self.moderation_offline.lock().expect("lock") {
            return Err(ChannelError::Transport("moderator chat offline".to_string()));
        }
        self.record(Delivery::Moderation { moderator, request });
        Ok(())
    }

    async fn finalize_moderation_request(
        &self,
        moderator: UserId,
        application_id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), ChannelError> {
        self.record(Delivery::Finalized {
            moderator,
            application_id,
            status,
        });
        Ok(())
    }
}

/// Store whose every call fails as if the database were down.
#[derive(Debug, Default)]
pub(super) struct FailingStore;

fn down() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

#[async_trait]
impl ApplicationStore for FailingStore {
    async fn create(
        &self,
        _fields: ApplicationFields,
        _submitter: Submitter,
    ) -> Result<ApplicationId, StoreError> {
        Err(down())
    }

    async fn status_and_owner(&self, _id: ApplicationId) -> Result<StatusAndOwner, StoreError> {
        Err(down())
    }

    async fn transition(
        &self,
        _id: ApplicationId,
        _from: ApplicationStatus,
        _to: ApplicationStatus,
    ) -> Result<bool, StoreError> {
        Err(down())
    }

    async fn counts_by_status(&self) -> Result<BTreeMap<ApplicationStatus, u64>, StoreError> {
        Err(down())
    }

    async fn recent_new(&self, _limit: usize) -> Result<Vec<RecentApplication>, StoreError> {
        Err(down())
    }

    async fn fetch(&self, _id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        Err(down())
    }
}

/// Store that never answers `create` within the configured bound.
#[derive(Debug, Default)]
pub(super) struct StalledStore;

#[async_trait]
impl ApplicationStore for StalledStore {
    async fn create(
        &self,
        _fields: ApplicationFields,
        _submitter: Submitter,
    ) -> Result<ApplicationId, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ApplicationId(1))
    }

    async fn status_and_owner(&self, id: ApplicationId) -> Result<StatusAndOwner, StoreError> {
        Err(StoreError::NotFound(id))
    }

    async fn transition(
        &self,
        _id: ApplicationId,
        _from: ApplicationStatus,
        _to: ApplicationStatus,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn counts_by_status(&self) -> Result<BTreeMap<ApplicationStatus, u64>, StoreError> {
        Ok(BTreeMap::new())
    }

    async fn recent_new(&self, _limit: usize) -> Result<Vec<RecentApplication>, StoreError> {
        Ok(Vec::new())
    }

    async fn fetch(&self, _id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(None)
    }
}
