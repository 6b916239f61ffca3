use std::sync::Arc;

use super::common::*;
use crate::workflows::intake::dispatch::{
    DispatchOutcome, GENERIC_FAILURE_MESSAGE, STATS_FAILURE_MESSAGE,
};
use crate::workflows::intake::domain::{ApplicationId, ApplicationStatus, Submitter};
use crate::workflows::intake::moderation::{ModerationOutcome, StatsOutcome};
use crate::workflows::intake::service::IntakeOutcome;
use crate::workflows::intake::store::{ApplicationStore, MemoryApplicationStore};

fn moderator() -> Submitter {
    Submitter::new(MODERATOR, Some("lead".to_string()))
}

#[tokio::test]
async fn text_and_callbacks_drive_the_full_lifecycle() {
    let store = Arc::new(MemoryApplicationStore::new());
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = dispatcher(store.clone(), channel.clone());

    assert_eq!(
        dispatcher.handle_text(&applicant(), "/start").await,
        DispatchOutcome::Intake(IntakeOutcome::Started)
    );
    let mut last = DispatchOutcome::Failed;
    for reply in HAPPY_PATH {
        last = dispatcher.handle_text(&applicant(), reply).await;
    }
    assert_eq!(
        last,
        DispatchOutcome::Intake(IntakeOutcome::Submitted(ApplicationId(1)))
    );

    let request = channel.moderation_requests().pop().expect("card sent");
    let reject = &request.buttons[1].callback;
    assert_eq!(
        dispatcher.handle_callback(&moderator(), reject).await,
        DispatchOutcome::Moderation(ModerationOutcome::Applied(ApplicationStatus::Rejected))
    );
    let owner = store
        .status_and_owner(ApplicationId(1))
        .await
        .expect("lookup");
    assert_eq!(owner.status, ApplicationStatus::Rejected);
}

#[tokio::test]
async fn approve_command_requires_an_id() {
    let store = Arc::new(MemoryApplicationStore::new());
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = dispatcher(store, channel.clone());

    assert_eq!(
        dispatcher.handle_text(&moderator(), "/approve").await,
        DispatchOutcome::Usage
    );
    assert_eq!(
        channel.texts_for(MODERATOR),
        ["Use: /approve <application id>".to_string()]
    );

    assert_eq!(
        dispatcher.handle_text(&applicant(), "/approve").await,
        DispatchOutcome::Moderation(ModerationOutcome::Ignored)
    );
    assert!(channel.texts_for(applicant().user_id).is_empty());
}

#[tokio::test]
async fn applicant_cannot_moderate_mid_session() {
    let store = Arc::new(MemoryApplicationStore::new());
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = dispatcher(store.clone(), channel.clone());
    store
        .create(fields("Kazan"), applicant())
        .await
        .expect("seed");

    dispatcher.handle_text(&applicant(), "/start").await;
    assert_eq!(
        dispatcher.handle_callback(&applicant(), "approve_1").await,
        DispatchOutcome::Moderation(ModerationOutcome::Ignored)
    );
    assert_eq!(
        dispatcher.handle_text(&applicant(), "/stats").await,
        DispatchOutcome::Stats(StatsOutcome::Ignored)
    );
    assert_eq!(dispatcher.intake().sessions().len(), 1);
}

#[tokio::test]
async fn unknown_callback_is_dropped() {
    let store = Arc::new(MemoryApplicationStore::new());
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = dispatcher(store, channel.clone());

    assert_eq!(
        dispatcher.handle_callback(&moderator(), "archive_1").await,
        DispatchOutcome::Unrecognized
    );
    assert!(channel.deliveries().is_empty());
}

#[tokio::test]
async fn delivery_failure_terminates_the_session() {
    let store = Arc::new(MemoryApplicationStore::new());
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = dispatcher(store, channel.clone());

    dispatcher.handle_text(&applicant(), "/start").await;
    channel.mark_unreachable(applicant().user_id);

    assert_eq!(
        dispatcher.handle_text(&applicant(), HAPPY_PATH[0]).await,
        DispatchOutcome::Failed
    );
    assert!(dispatcher.intake().sessions().is_empty());
}

#[tokio::test]
async fn storage_faults_become_user_visible_notices() {
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = dispatcher(Arc::new(FailingStore), channel.clone());

    assert_eq!(
        dispatcher.handle_text(&moderator(), "/stats").await,
        DispatchOutcome::Failed
    );
    assert_eq!(
        dispatcher.handle_text(&moderator(), "/reject 5").await,
        DispatchOutcome::Failed
    );
    assert_eq!(
        channel.texts_for(MODERATOR),
        [
            STATS_FAILURE_MESSAGE.to_string(),
            "❌ Failed to process application #5".to_string(),
        ]
    );
    assert_ne!(GENERIC_FAILURE_MESSAGE, STATS_FAILURE_MESSAGE);
}
