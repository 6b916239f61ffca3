use async_trait::async_trait;
use serde::Serialize;

use super::catalog::ChoiceSet;
use super::domain::{ApplicationId, ApplicationStatus, UserId};

/// External link attached to an outbound message (rendered as a button by chat transports).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

/// Message delivered to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<ChoiceSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: None,
            link: None,
        }
    }

    pub fn prompt(text: impl Into<String>, choices: Option<ChoiceSet>) -> Self {
        Self {
            text: text.into(),
            choices,
            link: None,
        }
    }

    pub fn with_link(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.link = Some(Link {
            title: title.into(),
            url: url.into(),
        });
        self
    }
}

/// Decision buttons attached to a moderation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationButton {
    pub label: &'static str,
    pub callback: String,
}

/// Card sent to the moderator for every stored application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationRequest {
    pub application_id: ApplicationId,
    pub text: String,
    pub buttons: Vec<ModerationButton>,
}

/// Outbound side of the conversation channel.
///
/// Implementations deliver to a chat transport; inbound replies and directives are fed to
/// the intake service and moderation workflow by the transport adapter.
#[async_trait]
pub trait ConversationChannel: Send + Sync {
    async fn send(&self, recipient: UserId, message: OutboundMessage) -> Result<(), ChannelError>;

    async fn send_moderation_request(
        &self,
        moderator: UserId,
        request: ModerationRequest,
    ) -> Result<(), ChannelError>;

    /// Mark the moderator's card with the final status. Must tolerate a missing card.
    async fn finalize_moderation_request(
        &self,
        moderator: UserId,
        application_id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("recipient {0} is unreachable")]
    Unreachable(UserId),
    #[error("channel transport unavailable: {0}")]
    Transport(String),
}
