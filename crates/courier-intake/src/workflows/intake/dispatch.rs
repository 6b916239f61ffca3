//! Directive boundary: every inbound message or callback ends here, and nothing past
//! this point propagates as an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

use super::channel::{ConversationChannel, OutboundMessage};
use super::directive::Directive;
use super::domain::{Submitter, UserId};
use super::moderation::{
    Authorizer, ModerationDirective, ModerationError, ModerationOutcome, ModerationWorkflow,
    StatsOutcome, STATS_LIMIT,
};
use super::service::{IntakeError, IntakeOutcome, IntakeService};
use super::store::ApplicationStore;

pub const GENERIC_FAILURE_MESSAGE: &str = "⚠️ Something went wrong. Please try again with /start.";
pub const STATS_FAILURE_MESSAGE: &str = "❌ Could not load statistics.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Intake(IntakeOutcome),
    Moderation(ModerationOutcome),
    Stats(StatsOutcome),
    /// A moderation command was missing its id.
    Usage,
    /// A callback payload nobody understands.
    Unrecognized,
    /// The directive failed; the user got a generic notice.
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Moderation(#[from] ModerationError),
}

/// Routes classified directives to the intake service or the moderation workflow.
pub struct IntakeDispatcher<S: ?Sized, C: ?Sized, A> {
    intake: IntakeService<S, C>,
    moderation: ModerationWorkflow<S, C, A>,
    channel: Arc<C>,
}

impl<S, C, A> IntakeDispatcher<S, C, A>
where
    S: ApplicationStore + ?Sized,
    C: ConversationChannel + ?Sized,
    A: Authorizer,
{
    pub fn new(
        intake: IntakeService<S, C>,
        moderation: ModerationWorkflow<S, C, A>,
        channel: Arc<C>,
    ) -> Self {
        Self {
            intake,
            moderation,
            channel,
        }
    }

    pub fn intake(&self) -> &IntakeService<S, C> {
        &self.intake
    }

    pub fn moderation(&self) -> &ModerationWorkflow<S, C, A> {
        &self.moderation
    }

    /// Handle a text message from `sender`.
    pub async fn handle_text(&self, sender: &Submitter, text: &str) -> DispatchOutcome {
        let user = sender.user_id;
        let result = self.route(sender, Directive::parse(text)).await;
        self.settle(user, result).await
    }

    /// Handle a button payload pressed by `sender`.
    pub async fn handle_callback(&self, sender: &Submitter, data: &str) -> DispatchOutcome {
        let Some(directive) = Directive::from_callback(data) else {
            warn!(user = %sender.user_id, data, "unrecognized callback payload");
            return DispatchOutcome::Unrecognized;
        };
        let result = self.route(sender, directive).await;
        self.settle(sender.user_id, result).await
    }

    async fn route(
        &self,
        sender: &Submitter,
        directive: Directive,
    ) -> Result<DispatchOutcome, DispatchError> {
        let user = sender.user_id;
        let outcome = match directive {
            Directive::Start => DispatchOutcome::Intake(self.intake.start(user).await?),
            Directive::Cancel => DispatchOutcome::Intake(self.intake.cancel(user).await?),
            Directive::Reply(text) => DispatchOutcome::Intake(self.intake.reply(sender, &text).await?),
            Directive::Stats => DispatchOutcome::Stats(self.moderation.stats(user, STATS_LIMIT).await?),
            Directive::Moderate {
                action,
                application_id,
            } => {
                let directive = ModerationDirective {
                    moderator: user,
                    action,
                    application_id,
                };
                DispatchOutcome::Moderation(self.moderation.handle(directive).await?)
            }
            Directive::Malformed { usage } => {
                if !self.moderation.authorizer().is_moderator(user) {
                    warn!(%user, "moderation command from unauthorized user ignored");
                    return Ok(DispatchOutcome::Moderation(ModerationOutcome::Ignored));
                }
                self.channel
                    .send(user, OutboundMessage::text(usage))
                    .await
                    .map_err(ModerationError::from)?;
                DispatchOutcome::Usage
            }
        };
        Ok(outcome)
    }

    async fn settle(
        &self,
        user: UserId,
        result: Result<DispatchOutcome, DispatchError>,
    ) -> DispatchOutcome {
        let failure = match result {
            Ok(outcome) => return outcome,
            Err(failure) => failure,
        };

        let notice = match &failure {
            DispatchError::Moderation(ModerationError::Store {
                application_id,
                source,
            }) => {
                error!(%user, %application_id, error = %source, "moderation directive failed");
                format!("❌ Failed to process application {application_id}")
            }
            DispatchError::Moderation(ModerationError::Statistics(source)) => {
                error!(%user, error = %source, "statistics unavailable");
                STATS_FAILURE_MESSAGE.to_string()
            }
            DispatchError::Moderation(ModerationError::Channel(source)) => {
                error!(%user, error = %source, "moderation reply not delivered");
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            DispatchError::Intake(source) => {
                let dropped = self.intake.abandon(user);
                error!(%user, error = %source, dropped, "intake directive failed");
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        };

        if let Err(error) = self.channel.send(user, OutboundMessage::text(notice)).await {
            warn!(%user, %error, "failure notice not delivered");
        }
        DispatchOutcome::Failed
    }
}
