use std::sync::Arc;

use tokio::sync::Barrier;

use super::common::*;
use crate::workflows::intake::domain::{ApplicationId, ApplicationStatus};
use crate::workflows::intake::moderation::{
    ModerationAction, ModerationDirective, ModerationOutcome,
};
use crate::workflows::intake::store::{
    ApplicationStore, MemoryApplicationStore, SqliteApplicationStore,
};

async fn race_transitions<S>(store: Arc<S>, id: ApplicationId)
where
    S: ApplicationStore + 'static,
{
    let barrier = Arc::new(Barrier::new(2));
    let racers = [ApplicationStatus::Approved, ApplicationStatus::Rejected].map(|target| {
        let store = store.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            let applied = store
                .transition(id, ApplicationStatus::New, target)
                .await
                .expect("transition");
            (target, applied)
        })
    });

    let mut winners = Vec::new();
    for racer in racers {
        let (target, applied) = racer.await.expect("racer finished");
        if applied {
            winners.push(target);
        }
    }

    assert_eq!(winners.len(), 1, "exactly one transition applies");
    let owner = store.status_and_owner(id).await.expect("lookup");
    assert_eq!(owner.status, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn memory_store_admits_one_concurrent_decision() {
    let store = Arc::new(MemoryApplicationStore::new());
    let id = store
        .create(fields("Kazan"), applicant())
        .await
        .expect("seed");
    race_transitions(store, id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sqlite_store_admits_one_concurrent_decision() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("applications.db").display());
    let store = Arc::new(SqliteApplicationStore::connect(&url).await.expect("open store"));
    assert!(store.max_connections() > 1);

    for city in ["Kazan", "Omsk", "Tomsk"] {
        let id = store.create(fields(city), applicant()).await.expect("seed");
        race_transitions(store.clone(), id).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_directive_delivery_notifies_applicant_once() {
    let store = Arc::new(MemoryApplicationStore::new());
    let id = store
        .create(fields("Kazan"), applicant())
        .await
        .expect("seed");
    let channel = Arc::new(RecordingChannel::default());
    let workflow = Arc::new(moderation_workflow(store.clone(), channel.clone()));
    let directive = ModerationDirective {
        moderator: MODERATOR,
        action: ModerationAction::Approve,
        application_id: id,
    };

    let (first, second) = tokio::join!(workflow.handle(directive), workflow.handle(directive));
    let mut outcomes = [first.expect("first"), second.expect("second")];
    outcomes.sort_by_key(|outcome| matches!(outcome, ModerationOutcome::AlreadyProcessed));

    assert_eq!(
        outcomes,
        [
            ModerationOutcome::Applied(ApplicationStatus::Approved),
            ModerationOutcome::AlreadyProcessed,
        ]
    );
    assert_eq!(channel.texts_for(applicant().user_id).len(), 1);
    assert_eq!(channel.finalized().len(), 1);
}
