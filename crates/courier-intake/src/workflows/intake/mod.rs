//! Guided courier application intake and its moderation workflow.
//!
//! The conversation state machine in [`machine`] is pure; [`service::IntakeService`] and
//! [`moderation::ModerationWorkflow`] run its effects against an [`store::ApplicationStore`]
//! and a [`channel::ConversationChannel`]. [`dispatch::IntakeDispatcher`] is the single
//! entry point a transport adapter feeds.

pub mod catalog;
pub mod channel;
mod cities;
pub mod directive;
pub mod dispatch;
pub mod domain;
pub mod machine;
pub mod moderation;
pub mod service;
pub mod sessions;
pub mod store;
pub mod summary;
pub mod validators;

#[cfg(test)]
mod tests;

pub use catalog::{ChoiceSet, EditableField, FormState};
pub use channel::{
    ChannelError, ConversationChannel, Link, ModerationButton, ModerationRequest,
    OutboundMessage,
};
pub use directive::Directive;
pub use dispatch::{DispatchError, DispatchOutcome, IntakeDispatcher};
pub use domain::{
    Advisories, ApplicationFields, ApplicationId, ApplicationRecord, ApplicationStatus,
    EmploymentPeriod, FieldViolation, PriorEmployment, RecentApplication, RegistrationChoice,
    SelfEmployment, StatusAndOwner, Submitter, Transport, UserId,
};
pub use machine::{CompletedApplication, EditPolicy, FormDraft, Session, Transition};
pub use moderation::{
    Authorizer, ModerationAction, ModerationDirective, ModerationError, ModerationOutcome,
    ModerationWorkflow, SingleModerator, StatsOutcome,
};
pub use service::{IntakeError, IntakeOutcome, IntakeService, IntakeSettings};
pub use sessions::{SessionLookup, SessionStore};
pub use store::{
    ApplicationStore, MemoryApplicationStore, SqliteApplicationStore, StoreError,
};
