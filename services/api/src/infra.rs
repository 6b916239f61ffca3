use async_trait::async_trait;
use courier_intake::config::{StorageBackend, StorageConfig};
use courier_intake::workflows::intake::summary::finalized_card;
use courier_intake::workflows::intake::{
    ApplicationId, ApplicationStatus, ApplicationStore, ChannelError, ConversationChannel,
    IntakeDispatcher, IntakeService, IntakeSettings, MemoryApplicationStore, ModerationRequest,
    ModerationWorkflow, OutboundMessage, SingleModerator, SqliteApplicationStore, StoreError,
    UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type SharedStore = Arc<dyn ApplicationStore>;
pub(crate) type AppDispatcher = IntakeDispatcher<dyn ApplicationStore, OutboxChannel, SingleModerator>;

/// Item waiting in a recipient's outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum OutboxEntry {
    Message(OutboundMessage),
    ModerationRequest(ModerationRequest),
    /// The moderator's card for `application_id` now reads `text`.
    CardUpdate {
        application_id: ApplicationId,
        text: String,
    },
}

#[derive(Debug)]
struct Card {
    moderator: UserId,
    text: String,
    status: Option<ApplicationStatus>,
}

#[derive(Debug, Default)]
struct Outboxes {
    pending: HashMap<UserId, Vec<OutboxEntry>>,
    cards: HashMap<ApplicationId, Card>,
}

/// In-process channel: queues deliveries per recipient until an HTTP client drains them.
#[derive(Debug, Default)]
pub(crate) struct OutboxChannel {
    inner: Mutex<Outboxes>,
}

impl OutboxChannel {
    fn lock(&self) -> Result<MutexGuard<'_, Outboxes>, ChannelError> {
        self.inner
            .lock()
            .map_err(|_| ChannelError::Transport("outbox mutex poisoned".to_string()))
    }

    fn push(&self, recipient: UserId, entry: OutboxEntry) -> Result<(), ChannelError> {
        self.lock()?.pending.entry(recipient).or_default().push(entry);
        Ok(())
    }

    /// Remove and return everything queued for `recipient`.
    pub(crate) fn drain(&self, recipient: UserId) -> Vec<OutboxEntry> {
        self.lock()
            .map(|mut outboxes| outboxes.pending.remove(&recipient).unwrap_or_default())
            .unwrap_or_default()
    }

    pub(crate) fn card_status(&self, application_id: ApplicationId) -> Option<ApplicationStatus> {
        self.lock()
            .ok()
            .and_then(|outboxes| outboxes.cards.get(&application_id).and_then(|card| card.status))
    }
}

#[async_trait]
impl ConversationChannel for OutboxChannel {
    async fn send(&self, recipient: UserId, message: OutboundMessage) -> Result<(), ChannelError> {
        self.push(recipient, OutboxEntry::Message(message))
    }

    async fn send_moderation_request(
        &self,
        moderator: UserId,
        request: ModerationRequest,
    ) -> Result<(), ChannelError> {
        let mut outboxes = self.lock()?;
        outboxes.cards.insert(
            request.application_id,
            Card {
                moderator,
                text: request.text.clone(),
                status: None,
            },
        );
        outboxes
            .pending
            .entry(moderator)
            .or_default()
            .push(OutboxEntry::ModerationRequest(request));
        Ok(())
    }

    async fn finalize_moderation_request(
        &self,
        _moderator: UserId,
        application_id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), ChannelError> {
        let mut outboxes = self.lock()?;
        let Some(card) = outboxes.cards.get_mut(&application_id) else {
            debug!(%application_id, "no moderation card to finalize");
            return Ok(());
        };
        if card.status == Some(status) {
            return Ok(());
        }
        card.status = Some(status);
        let owner = card.moderator;
        let text = finalized_card(&card.text, status);
        outboxes
            .pending
            .entry(owner)
            .or_default()
            .push(OutboxEntry::CardUpdate {
                application_id,
                text,
            });
        Ok(())
    }
}

/// Per-user async locks: one user's directives are handled one at a time, different users
/// run concurrently.
#[derive(Debug, Default)]
pub(crate) struct ConversationLocks {
    users: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationLocks {
    pub(crate) async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
            users.retain(|_, lock| Arc::strong_count(lock) > 1);
            users.entry(user).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub(crate) fn tracked(&self) -> usize {
        self.users
            .lock()
            .map(|users| users.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

pub(crate) async fn open_store(config: &StorageConfig) -> Result<SharedStore, StoreError> {
    match config.backend() {
        StorageBackend::Memory => Ok(Arc::new(MemoryApplicationStore::new())),
        StorageBackend::Sqlite(url) => Ok(Arc::new(SqliteApplicationStore::connect(&url).await?)),
    }
}

pub(crate) fn build_dispatcher(
    moderator: UserId,
    settings: IntakeSettings,
    store: SharedStore,
    outbox: Arc<OutboxChannel>,
) -> AppDispatcher {
    IntakeDispatcher::new(
        IntakeService::new(store.clone(), outbox.clone(), moderator, settings),
        ModerationWorkflow::new(
            store,
            outbox.clone(),
            SingleModerator(moderator),
            settings.storage_timeout,
        ),
        outbox,
    )
}
