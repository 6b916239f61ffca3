//! Applicant-facing side of intake: sessions in, stored applications and moderation
//! requests out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::catalog::FormState;
use super::channel::{ChannelError, ConversationChannel, OutboundMessage};
use super::domain::{ApplicationId, Submitter, UserId};
use super::machine::{CompletedApplication, EditPolicy, Session, Transition};
use super::sessions::{SessionLookup, SessionStore};
use super::store::{bounded, ApplicationStore};
use super::summary;

pub const SUBMITTED_MESSAGE: &str = "✅ Application received! Expect a call.";
pub const STORAGE_FAILURE_MESSAGE: &str =
    "⚠️ Failed to save your application. Please try again with /start.";
pub const CANCELLED_MESSAGE: &str = "❌ Conversation cancelled. Send /start to begin again.";
pub const NO_SESSION_MESSAGE: &str = "Send /start to begin your application.";
pub const SESSION_EXPIRED_MESSAGE: &str =
    "⌛ Your application was idle for too long and has been discarded. Send /start to begin again.";
pub const ALREADY_ACTIVE_MESSAGE: &str =
    "⚠️ You already have an application in progress. Continue below or send /cancel to start over.";

/// Runtime knobs for the intake flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSettings {
    pub edit_policy: EditPolicy,
    /// Upper bound on a single storage call.
    pub storage_timeout: Duration,
    /// Idle sessions older than this are discarded on their next directive.
    pub session_idle: Option<chrono::Duration>,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            edit_policy: EditPolicy::default(),
            storage_timeout: Duration::from_millis(5_000),
            session_idle: Some(chrono::Duration::hours(24)),
        }
    }
}

/// What a single intake directive did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeOutcome {
    Started,
    /// `/start` arrived while a session was live; the session was kept.
    AlreadyActive(FormState),
    Cancelled,
    /// The session is still live, now at the given state.
    Advanced(FormState),
    Submitted(ApplicationId),
    /// The confirmed form failed its completeness check.
    Aborted,
    StorageFailed,
    NoSession,
    Expired,
}

/// Drives applicant sessions through the form and hands confirmed forms to the store.
pub struct IntakeService<S: ?Sized, C: ?Sized> {
    store: Arc<S>,
    channel: Arc<C>,
    sessions: SessionStore,
    moderator: UserId,
    settings: IntakeSettings,
}

impl<S, C> IntakeService<S, C>
where
    S: ApplicationStore + ?Sized,
    C: ConversationChannel + ?Sized,
{
    pub fn new(store: Arc<S>, channel: Arc<C>, moderator: UserId, settings: IntakeSettings) -> Self {
        Self {
            store,
            channel,
            sessions: SessionStore::new(settings.session_idle),
            moderator,
            settings,
        }
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn start(&self, user: UserId) -> Result<IntakeOutcome, IntakeError> {
        self.start_at(user, Utc::now()).await
    }

    /// Open a session unless one is already live.
    pub async fn start_at(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, IntakeError> {
        if let SessionLookup::Active(session) = self.sessions.peek(user, now) {
            warn!(%user, state = ?session.state(), "start ignored, session already active");
            self.deliver(
                user,
                vec![
                    OutboundMessage::text(ALREADY_ACTIVE_MESSAGE),
                    session.current_prompt(),
                ],
            )
            .await?;
            return Ok(IntakeOutcome::AlreadyActive(session.state()));
        }

        let (session, prompt) = Session::start();
        self.sessions.put(user, session, now);
        debug!(%user, "session started");
        self.channel.send(user, prompt).await?;
        Ok(IntakeOutcome::Started)
    }

    /// Drop the session from any state.
    pub async fn cancel(&self, user: UserId) -> Result<IntakeOutcome, IntakeError> {
        let existed = self.sessions.remove(user);
        debug!(%user, existed, "session cancelled");
        self.channel
            .send(user, OutboundMessage::text(CANCELLED_MESSAGE))
            .await?;
        Ok(IntakeOutcome::Cancelled)
    }

    pub async fn reply(
        &self,
        submitter: &Submitter,
        text: &str,
    ) -> Result<IntakeOutcome, IntakeError> {
        self.reply_at(submitter, text, Utc::now()).await
    }

    /// Feed one free-text or menu reply to the submitter's session.
    pub async fn reply_at(
        &self,
        submitter: &Submitter,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let user = submitter.user_id;
        let session = match self.sessions.take(user, now) {
            SessionLookup::Active(session) => session,
            SessionLookup::Expired => {
                info!(%user, "idle session expired");
                self.channel
                    .send(user, OutboundMessage::text(SESSION_EXPIRED_MESSAGE))
                    .await?;
                return Ok(IntakeOutcome::Expired);
            }
            SessionLookup::Absent => {
                self.channel
                    .send(user, OutboundMessage::text(NO_SESSION_MESSAGE))
                    .await?;
                return Ok(IntakeOutcome::NoSession);
            }
        };

        match session.step(text, self.settings.edit_policy) {
            Transition::Continue { session, effects } => {
                let state = session.state();
                self.sessions.put(user, session, now);
                self.deliver(user, effects).await?;
                Ok(IntakeOutcome::Advanced(state))
            }
            Transition::Abort { effects } => {
                self.deliver(user, effects).await?;
                Ok(IntakeOutcome::Aborted)
            }
            Transition::Submit(application) => self.submit(submitter, application).await,
        }
    }

    /// Remove a session without notifying anyone; used after an unexpected failure.
    pub fn abandon(&self, user: UserId) -> bool {
        self.sessions.remove(user)
    }

    async fn submit(
        &self,
        submitter: &Submitter,
        application: CompletedApplication,
    ) -> Result<IntakeOutcome, IntakeError> {
        let user = submitter.user_id;
        let created = bounded(
            self.settings.storage_timeout,
            self.store
                .create(application.fields.clone(), submitter.clone()),
        )
        .await;

        let id = match created {
            Ok(id) => id,
            Err(error) => {
                error!(%user, %error, "failed to store application");
                self.channel
                    .send(user, OutboundMessage::text(STORAGE_FAILURE_MESSAGE))
                    .await?;
                return Ok(IntakeOutcome::StorageFailed);
            }
        };

        info!(
            application_id = %id,
            %user,
            advisories = application.advisories.any(),
            "application submitted"
        );

        let request = summary::moderation_request(id, submitter, &application);
        if let Err(error) = self
            .channel
            .send_moderation_request(self.moderator, request)
            .await
        {
            warn!(application_id = %id, %error, "moderation request not delivered");
        }

        self.channel
            .send(user, OutboundMessage::text(SUBMITTED_MESSAGE))
            .await?;
        Ok(IntakeOutcome::Submitted(id))
    }

    async fn deliver(&self, user: UserId, messages: Vec<OutboundMessage>) -> Result<(), IntakeError> {
        for message in messages {
            self.channel.send(user, message).await?;
        }
        Ok(())
    }
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("failed to reach applicant: {0}")]
    Channel(#[from] ChannelError),
}
