//! Moderator decisions on stored applications.
//!
//! At-most-once decisions rest entirely on [`ApplicationStore::transition`]; this module
//! holds no locks of its own. Losing the race is an ordinary "already processed" outcome.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::channel::{ChannelError, ConversationChannel, OutboundMessage};
use super::domain::{ApplicationId, ApplicationStatus, UserId};
use super::store::{bounded, ApplicationStore, StoreError};
use super::summary;

pub const STATS_LIMIT: usize = 5;

/// Decides whether a caller may issue moderation directives.
pub trait Authorizer: Send + Sync {
    fn is_moderator(&self, user: UserId) -> bool;
}

/// The single allow-listed moderator identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleModerator(pub UserId);

impl Authorizer for SingleModerator {
    fn is_moderator(&self, user: UserId) -> bool {
        self.0 == user
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub const fn verb(self) -> &'static str {
        match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Reject => "reject",
        }
    }

    pub fn from_verb(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    pub const fn target_status(self) -> ApplicationStatus {
        match self {
            ModerationAction::Approve => ApplicationStatus::Approved,
            ModerationAction::Reject => ApplicationStatus::Rejected,
        }
    }

    /// Payload carried by the moderation card's buttons, e.g. `approve_7`.
    pub fn callback_data(self, id: ApplicationId) -> String {
        format!("{}_{}", self.verb(), id.0)
    }

    pub fn parse_callback(data: &str) -> Option<(Self, ApplicationId)> {
        let (verb, id) = data.trim().split_once('_')?;
        let action = Self::from_verb(verb)?;
        let id = id.parse::<i64>().ok()?;
        Some((action, ApplicationId(id)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationDirective {
    pub moderator: UserId,
    pub action: ModerationAction,
    pub application_id: ApplicationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationOutcome {
    Applied(ApplicationStatus),
    AlreadyProcessed,
    NotFound,
    /// The caller is not the moderator; nothing was sent.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsOutcome {
    Reported,
    Ignored,
}

pub struct ModerationWorkflow<S: ?Sized, C: ?Sized, A> {
    store: Arc<S>,
    channel: Arc<C>,
    authorizer: A,
    storage_timeout: Duration,
}

impl<S, C, A> ModerationWorkflow<S, C, A>
where
    S: ApplicationStore + ?Sized,
    C: ConversationChannel + ?Sized,
    A: Authorizer,
{
    pub fn new(store: Arc<S>, channel: Arc<C>, authorizer: A, storage_timeout: Duration) -> Self {
        Self {
            store,
            channel,
            authorizer,
            storage_timeout,
        }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    pub async fn handle(
        &self,
        directive: ModerationDirective,
    ) -> Result<ModerationOutcome, ModerationError> {
        let ModerationDirective {
            moderator,
            action,
            application_id: id,
        } = directive;

        if !self.authorizer.is_moderator(moderator) {
            warn!(user = %moderator, application_id = %id, "moderation directive from unauthorized user ignored");
            return Ok(ModerationOutcome::Ignored);
        }

        let owner = match bounded(self.storage_timeout, self.store.status_and_owner(id)).await {
            Ok(owner) => owner,
            Err(error) if error.is_not_found() => {
                self.notify_moderator(moderator, summary::not_found_notice(id))
                    .await?;
                return Ok(ModerationOutcome::NotFound);
            }
            Err(source) => {
                return Err(ModerationError::Store {
                    application_id: id,
                    source,
                })
            }
        };

        let target = action.target_status();
        let applied = owner.status == ApplicationStatus::New
            && bounded(
                self.storage_timeout,
                self.store.transition(id, ApplicationStatus::New, target),
            )
            .await
            .map_err(|source| ModerationError::Store {
                application_id: id,
                source,
            })?;

        if !applied {
            info!(application_id = %id, current = ?owner.status, "application already processed");
            self.notify_moderator(moderator, summary::already_processed_notice(id))
                .await?;
            return Ok(ModerationOutcome::AlreadyProcessed);
        }

        info!(application_id = %id, status = target.label(), "moderation decision recorded");

        let notice = OutboundMessage::text(summary::decision_notice(target, &owner.full_name));
        if let Err(error) = self.channel.send(owner.submitter_id, notice).await {
            warn!(application_id = %id, applicant = %owner.submitter_id, %error, "applicant notification failed");
        }

        if let Err(error) = self
            .channel
            .finalize_moderation_request(moderator, id, target)
            .await
        {
            warn!(application_id = %id, %error, "moderation card not updated");
        }

        self.notify_moderator(moderator, summary::moderation_receipt(id, target))
            .await?;
        Ok(ModerationOutcome::Applied(target))
    }

    /// Status counts and the latest undecided applications, for the moderator only.
    pub async fn stats(
        &self,
        requester: UserId,
        limit: usize,
    ) -> Result<StatsOutcome, ModerationError> {
        if !self.authorizer.is_moderator(requester) {
            warn!(user = %requester, "stats request from unauthorized user ignored");
            return Ok(StatsOutcome::Ignored);
        }

        let counts = bounded(self.storage_timeout, self.store.counts_by_status())
            .await
            .map_err(ModerationError::Statistics)?;
        let recent = bounded(self.storage_timeout, self.store.recent_new(limit))
            .await
            .map_err(ModerationError::Statistics)?;

        self.notify_moderator(requester, summary::render_stats(&counts, &recent))
            .await?;
        Ok(StatsOutcome::Reported)
    }

    async fn notify_moderator(&self, moderator: UserId, text: String) -> Result<(), ModerationError> {
        self.channel
            .send(moderator, OutboundMessage::text(text))
            .await
            .map_err(ModerationError::from)
    }
}

/// Error raised by the moderation workflow.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("storage failed while processing application {application_id}: {source}")]
    Store {
        application_id: ApplicationId,
        #[source]
        source: StoreError,
    },
    #[error("could not load statistics: {0}")]
    Statistics(#[source] StoreError),
    #[error("failed to reach moderator: {0}")]
    Channel(#[from] ChannelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_round_trips_through_parser() {
        let data = ModerationAction::Reject.callback_data(ApplicationId(41));
        assert_eq!(data, "reject_41");
        assert_eq!(
            ModerationAction::parse_callback(&data),
            Some((ModerationAction::Reject, ApplicationId(41)))
        );
    }

    #[test]
    fn malformed_callbacks_are_refused() {
        assert_eq!(ModerationAction::parse_callback("approve_"), None);
        assert_eq!(ModerationAction::parse_callback("approve_x1"), None);
        assert_eq!(ModerationAction::parse_callback("archive_3"), None);
        assert_eq!(ModerationAction::parse_callback("approve"), None);
    }

    #[test]
    fn actions_map_to_decided_statuses() {
        assert_eq!(
            ModerationAction::Approve.target_status(),
            ApplicationStatus::Approved
        );
        assert_eq!(
            ModerationAction::Reject.target_status(),
            ApplicationStatus::Rejected
        );
    }

    #[test]
    fn only_the_configured_moderator_is_authorized() {
        let authorizer = SingleModerator(UserId(10));
        assert!(authorizer.is_moderator(UserId(10)));
        assert!(!authorizer.is_moderator(UserId(11)));
    }
}
