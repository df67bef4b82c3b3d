mod common;

use common::{
    Harness, Op, dispatch_all, drain, fields, fill_in, foreign_record, wait_for,
};
use pretty_assertions::assert_eq;
use roster::{
    controller::{FormMode, Notice, NoticeLevel, Phase},
    data::record::Field,
    error::{AuthError, IntentError, ValidationError},
    screen::{Intent, Screen, ScreenEvent, ScreenRegistry},
    session::{Identity, LocalSessionProvider, gate::GateStatus},
    store::memory::MemoryStore,
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

fn notices(events: Vec<ScreenEvent>) -> Vec<Notice> {
    events
        .into_iter()
        .filter_map(|event| match event {
            ScreenEvent::Notice(notice) => Some(notice),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn empty_list_lands_idle() {
    let harness = Harness::new();
    let screen = harness.mount().await;

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.records.is_empty());
    assert_eq!(snapshot.identity, harness.identity);
    assert_eq!(harness.store().calls(), vec![Op::List]);
}

#[tokio::test]
async fn create_inserts_for_the_owner_then_refetches() {
    let harness = Harness::new();
    let screen = harness.mount().await;
    let mut events = screen.subscribe();

    let ana = fields("Ana Silva");
    screen.dispatch(Intent::OpenCreate).await.unwrap();
    let snapshot = screen.snapshot().await;
    let (form, submitting) = snapshot.phase.form().unwrap();
    assert_eq!(form.mode(), FormMode::Create);
    assert_eq!(form.submit_label(submitting), "Create");

    dispatch_all(&screen, fill_in(&ana)).await;
    screen.dispatch(Intent::Submit).await.unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.records[0].fields, ana);
    assert_eq!(snapshot.records[0].owner_id, harness.identity.id);
    assert_eq!(harness.store().calls(), vec![Op::List, Op::Insert, Op::List]);

    assert_eq!(
        notices(drain(&mut events)),
        vec![Notice {
            level: NoticeLevel::Success,
            message: "Student created!".into(),
        }]
    );
}

#[tokio::test]
async fn edit_is_seeded_and_keeps_identity_fields() {
    let harness = Harness::new();
    let id = harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let before = screen.snapshot().await.records[0].clone();

    screen.dispatch(Intent::OpenEdit(id)).await.unwrap();
    let snapshot = screen.snapshot().await;
    let (form, submitting) = snapshot.phase.form().unwrap();
    assert_eq!(form.mode(), FormMode::Edit);
    assert_eq!(form.draft.fields(), &before.fields);
    assert_eq!(form.submit_label(submitting), "Update");

    screen
        .dispatch(Intent::EditField(Field::Email, "ana.silva@x.com".into()))
        .await
        .unwrap();
    screen.dispatch(Intent::Submit).await.unwrap();

    let after = screen.snapshot().await.records[0].clone();
    assert_eq!(after.fields.email, "ana.silva@x.com");
    assert_eq!(after.fields.full_name, before.fields.full_name);
    assert_eq!(after.id, before.id);
    assert_eq!(after.owner_id, before.owner_id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(harness.store().calls(), vec![Op::List, Op::Update, Op::List]);
}

#[tokio::test]
async fn delete_needs_confirming() {
    let harness = Harness::new();
    let id = harness.seed("Ana Silva").await;
    let screen = harness.mount().await;

    screen.dispatch(Intent::RequestDelete(id)).await.unwrap();
    assert_eq!(screen.snapshot().await.phase, Phase::ConfirmingDelete { id });
    screen.dispatch(Intent::CancelDelete).await.unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(harness.store().count(Op::Delete), 0);

    screen.dispatch(Intent::RequestDelete(id)).await.unwrap();
    screen.dispatch(Intent::ConfirmDelete).await.unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.records.is_empty());
    assert_eq!(
        harness.store().calls(),
        vec![Op::List, Op::Delete, Op::List]
    );
}

#[tokio::test]
async fn failed_delete_keeps_the_record() {
    let harness = Harness::new();
    let id = harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let mut events = screen.subscribe();
    harness.store().fail(Op::Delete);

    screen.dispatch(Intent::RequestDelete(id)).await.unwrap();
    screen.dispatch(Intent::ConfirmDelete).await.unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(harness.store().count(Op::List), 1);

    let notices = notices(drain(&mut events));
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.starts_with("Error deleting student"));
}

#[tokio::test]
async fn failed_update_keeps_the_form_and_skips_the_refresh() {
    let harness = Harness::new();
    let id = harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let mut events = screen.subscribe();
    harness.store().fail(Op::Update);

    screen.dispatch(Intent::OpenEdit(id)).await.unwrap();
    screen
        .dispatch(Intent::EditField(Field::FullName, "Ana Souza".into()))
        .await
        .unwrap();
    screen.dispatch(Intent::Submit).await.unwrap();

    let snapshot = screen.snapshot().await;
    let (form, submitting) = snapshot.phase.form().unwrap();
    assert!(!submitting);
    assert_eq!(form.mode(), FormMode::Edit);
    assert_eq!(form.target.as_ref().map(|t| t.id), Some(id));
    assert_eq!(form.draft.get(Field::FullName), "Ana Souza");
    assert_eq!(snapshot.records[0].fields.full_name, "Ana Silva");
    assert_eq!(harness.store().calls(), vec![Op::List, Op::Update]);
    assert_eq!(harness.memory.all().await[0].fields.full_name, "Ana Silva");

    let notices = notices(drain(&mut events));
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);

    //retrying from the preserved draft goes through
    harness.store().heal(Op::Update);
    screen.dispatch(Intent::Submit).await.unwrap();
    assert_eq!(
        screen.snapshot().await.records[0].fields.full_name,
        "Ana Souza"
    );
}

#[tokio::test]
async fn only_the_owners_records_are_listed() {
    let harness = Harness::new();
    harness.seed("Ana Silva").await;
    harness
        .memory
        .seed(roster::data::record::NewRecord {
            fields: fields("Someone Elses Student"),
            owner_id: Uuid::new_v4(),
        })
        .await;

    let screen = harness.mount().await;
    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.records.len(), 1);
    assert!(
        snapshot
            .records
            .iter()
            .all(|record| record.owner_id == harness.identity.id)
    );
}

#[tokio::test]
async fn a_leaked_foreign_record_is_refused() {
    let harness = Harness::new();
    harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let before = screen.snapshot().await.records;
    let mut events = screen.subscribe();

    harness.store().leak_into_lists(foreign_record());
    screen.dispatch(Intent::Refresh).await.unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records, before);
    assert_eq!(notices(drain(&mut events))[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn refreshing_twice_gives_the_same_list() {
    let harness = Harness::new();
    harness.seed("Ana Silva").await;
    harness.seed("Bruno Costa").await;
    let screen = harness.mount().await;

    screen.dispatch(Intent::Refresh).await.unwrap();
    let first = screen.snapshot().await.records;
    screen.dispatch(Intent::Refresh).await.unwrap();
    let second = screen.snapshot().await.records;

    assert_eq!(first, second);
    assert_eq!(first[0].fields.full_name, "Bruno Costa");
    assert_eq!(harness.store().count(Op::List), 3);
}

#[tokio::test]
async fn a_failed_list_keeps_the_previous_one() {
    let harness = Harness::new();
    harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let before = screen.snapshot().await.records;

    harness.store().fail(Op::List);
    screen.dispatch(Intent::Refresh).await.unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records, before);
}

#[tokio::test]
async fn incomplete_forms_never_reach_the_store() {
    let harness = Harness::new();
    let screen = harness.mount().await;

    screen.dispatch(Intent::OpenCreate).await.unwrap();
    screen
        .dispatch(Intent::EditField(Field::FullName, "Ana Silva".into()))
        .await
        .unwrap();
    screen
        .dispatch(Intent::EditField(Field::Email, "   ".into()))
        .await
        .unwrap();

    let refused = screen.dispatch(Intent::Submit).await.unwrap_err();
    assert!(matches!(
        refused,
        IntentError::Invalid {
            source: ValidationError::MissingField { .. }
        }
    ));
    assert!(matches!(screen.snapshot().await.phase, Phase::FormOpen(_)));
    assert_eq!(harness.store().count(Op::Insert), 0);
}

#[tokio::test]
async fn busy_screens_refuse_other_intents() {
    let harness = Harness::new();
    let id = harness.seed("Ana Silva").await;
    let screen = harness.mount().await;

    screen.dispatch(Intent::OpenCreate).await.unwrap();
    assert!(matches!(
        screen.dispatch(Intent::OpenEdit(id)).await,
        Err(IntentError::NotAllowed { .. })
    ));
    assert!(matches!(
        screen.dispatch(Intent::RequestDelete(id)).await,
        Err(IntentError::NotAllowed { .. })
    ));

    screen.dispatch(Intent::Cancel).await.unwrap();
    assert!(matches!(
        screen.dispatch(Intent::OpenEdit(Uuid::new_v4())).await,
        Err(IntentError::UnknownRecord { .. })
    ));
}

#[tokio::test]
async fn nothing_changes_until_the_store_answers() {
    let harness = Harness::new();
    let screen = harness.mount().await;
    let store = harness.store();
    store.hold_mutations();

    screen.dispatch(Intent::OpenCreate).await.unwrap();
    dispatch_all(&screen, fill_in(&fields("Ana Silva"))).await;

    let submitting = tokio::spawn({
        let screen = screen.clone();
        async move { screen.dispatch(Intent::Submit).await }
    });
    wait_for(|| {
        let screen = screen.clone();
        async move { matches!(screen.snapshot().await.phase, Phase::Submitting { .. }) }
    })
    .await;

    let snapshot = screen.snapshot().await;
    assert!(snapshot.records.is_empty());
    let (form, submitting_now) = snapshot.phase.form().unwrap();
    assert_eq!(form.submit_label(submitting_now), "Submitting…");
    assert!(matches!(
        screen.dispatch(Intent::Submit).await,
        Err(IntentError::NotAllowed { .. })
    ));

    store.release();
    submitting.await.unwrap().unwrap();
    assert_eq!(screen.snapshot().await.records.len(), 1);
    assert_eq!(store.count(Op::Insert), 1);
}

#[tokio::test]
async fn cancelling_mid_submit_still_refreshes_on_success() {
    let harness = Harness::new();
    let screen = harness.mount().await;
    let store = harness.store();
    store.hold_mutations();

    screen.dispatch(Intent::OpenCreate).await.unwrap();
    dispatch_all(&screen, fill_in(&fields("Ana Silva"))).await;

    let submitting = tokio::spawn({
        let screen = screen.clone();
        async move { screen.dispatch(Intent::Submit).await }
    });
    wait_for(|| {
        let screen = screen.clone();
        async move { matches!(screen.snapshot().await.phase, Phase::Submitting { .. }) }
    })
    .await;

    screen.dispatch(Intent::Cancel).await.unwrap();
    assert_eq!(screen.snapshot().await.phase, Phase::Idle);

    store.release();
    submitting.await.unwrap().unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(store.calls(), vec![Op::List, Op::Insert, Op::List]);
}

#[tokio::test]
async fn a_detached_insert_is_refetched_after_a_failed_delete() {
    let harness = Harness::new();
    let ana = harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let store = harness.store();
    store.hold_mutations();

    screen.dispatch(Intent::OpenCreate).await.unwrap();
    dispatch_all(&screen, fill_in(&fields("Bruno Costa"))).await;
    let submitting = tokio::spawn({
        let screen = screen.clone();
        async move { screen.dispatch(Intent::Submit).await }
    });
    wait_for(|| {
        let screen = screen.clone();
        async move { matches!(screen.snapshot().await.phase, Phase::Submitting { .. }) }
    })
    .await;

    screen.dispatch(Intent::Cancel).await.unwrap();
    screen.dispatch(Intent::RequestDelete(ana)).await.unwrap();
    let deleting = tokio::spawn({
        let screen = screen.clone();
        async move { screen.dispatch(Intent::ConfirmDelete).await }
    });
    wait_for(|| {
        let screen = screen.clone();
        async move { matches!(screen.snapshot().await.phase, Phase::Deleting { .. }) }
    })
    .await;

    //permits go out in arrival order, so the insert answers first
    store.release();
    submitting.await.unwrap().unwrap();
    assert!(matches!(screen.snapshot().await.phase, Phase::Deleting { .. }));
    assert_eq!(screen.snapshot().await.records.len(), 1);

    store.fail(Op::Delete);
    store.release();
    deleting.await.unwrap().unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(
        store.calls(),
        vec![Op::List, Op::Insert, Op::Delete, Op::List]
    );
}

#[tokio::test]
async fn mounting_needs_a_session() {
    let provider = Arc::new(LocalSessionProvider::new(None));
    let memory = MemoryStore::default();
    assert!(matches!(
        Screen::mount(provider, &memory).await,
        Err(AuthError::NoSession)
    ));

    let provider = Arc::new(LocalSessionProvider::new(None));
    provider.fail_lookups(AuthError::SessionLookup {
        message: "provider offline".into(),
    });
    assert!(Screen::mount(provider.clone(), &memory).await.is_err());
    assert_eq!(provider.subscriber_count(), 0);
}

#[tokio::test]
async fn logging_out_exits_the_screen() {
    let harness = Harness::new();
    harness.seed("Ana Silva").await;
    let screen = harness.mount().await;
    let mut events = screen.subscribe();

    harness.provider.set(None);
    wait_for(|| {
        let screen = screen.clone();
        async move { screen.is_exited().await }
    })
    .await;

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Exited);
    assert!(snapshot.records.is_empty());
    assert_eq!(screen.gate_status(), GateStatus::Unauthenticated);
    assert!(matches!(
        screen.dispatch(Intent::Refresh).await,
        Err(IntentError::ScreenExited)
    ));

    wait_for(|| {
        let seen = drain(&mut events).contains(&ScreenEvent::Exited);
        async move { seen }
    })
    .await;
    wait_for(|| {
        let count = harness.provider.subscriber_count();
        async move { count == 0 }
    })
    .await;
}

#[tokio::test]
async fn replies_after_exit_are_ignored() {
    let harness = Harness::new();
    let screen = harness.mount().await;
    let store = harness.store();
    store.hold_mutations();

    screen.dispatch(Intent::OpenCreate).await.unwrap();
    dispatch_all(&screen, fill_in(&fields("Ana Silva"))).await;
    let submitting = tokio::spawn({
        let screen = screen.clone();
        async move { screen.dispatch(Intent::Submit).await }
    });
    wait_for(|| {
        let screen = screen.clone();
        async move { matches!(screen.snapshot().await.phase, Phase::Submitting { .. }) }
    })
    .await;

    harness.provider.set(None);
    wait_for(|| {
        let screen = screen.clone();
        async move { screen.is_exited().await }
    })
    .await;

    store.release();
    submitting.await.unwrap().unwrap();

    let snapshot = screen.snapshot().await;
    assert_eq!(snapshot.phase, Phase::Exited);
    assert!(snapshot.records.is_empty());
    assert_eq!(store.calls(), vec![Op::List, Op::Insert]);
}

#[tokio::test]
async fn session_refresh_for_the_same_account_only_relabels() {
    let harness = Harness::new();
    let screen = harness.mount().await;

    let relabelled = Identity {
        id: harness.identity.id,
        label: "Ms Silva".into(),
    };
    harness.provider.set(Some(relabelled.clone()));
    wait_for(|| {
        let screen = screen.clone();
        let relabelled = relabelled.clone();
        async move { screen.identity().await == relabelled }
    })
    .await;
    assert!(!screen.is_exited().await);

    harness.provider.set(Some(Identity {
        id: Uuid::new_v4(),
        label: "someone@else.test".into(),
    }));
    wait_for(|| {
        let screen = screen.clone();
        async move { screen.is_exited().await }
    })
    .await;
}

#[tokio::test]
async fn unmounting_releases_the_session_subscription() {
    let harness = Harness::new();
    let screen = Screen::mount(harness.provider.clone(), &harness.connector)
        .await
        .unwrap();
    assert_eq!(harness.provider.subscriber_count(), 1);

    screen.unmount();
    wait_for(|| {
        let count = harness.provider.subscriber_count();
        async move { count == 0 }
    })
    .await;
}

#[tokio::test]
async fn unmounting_tells_listeners_the_screen_is_gone() {
    let harness = Harness::new();
    let screen = Screen::mount(harness.provider.clone(), &harness.connector)
        .await
        .unwrap();
    let mut events = screen.subscribe();

    screen.unmount();
    assert_eq!(drain(&mut events), vec![ScreenEvent::Exited]);
}

#[tokio::test]
async fn a_screen_announces_its_exit_once() {
    let harness = Harness::new();
    let screen = harness.mount().await;
    let mut events = screen.subscribe();

    harness.provider.set(None);
    wait_for(|| {
        let screen = screen.clone();
        async move { screen.is_exited().await }
    })
    .await;
    Arc::into_inner(screen)
        .expect("nobody else holds the screen")
        .unmount();

    let exits = drain(&mut events)
        .into_iter()
        .filter(|event| *event == ScreenEvent::Exited)
        .count();
    assert_eq!(exits, 1);
}

#[tokio::test]
async fn the_registry_keeps_one_live_screen_per_user() {
    let harness = Harness::new();
    let registry = ScreenRegistry::default();
    let user_id = harness.identity.id;

    let first = registry
        .get_or_mount(user_id, harness.provider.clone(), &harness.connector)
        .await
        .unwrap();
    let again = registry
        .get_or_mount(user_id, harness.provider.clone(), &harness.connector)
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    //an exited screen is replaced on the next visit
    harness.provider.set(None);
    wait_for(|| {
        let first = first.clone();
        async move { first.is_exited().await }
    })
    .await;
    harness.provider.set(Some(harness.identity.clone()));
    let remounted = registry
        .get_or_mount(user_id, harness.provider.clone(), &harness.connector)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &remounted));
    assert_eq!(remounted.snapshot().await.phase, Phase::Idle);

    registry.unmount(user_id).await;
    let after_unmount = registry
        .get_or_mount(user_id, harness.provider.clone(), &harness.connector)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&remounted, &after_unmount));
}

#[tokio::test]
async fn a_slow_mount_does_not_hold_up_other_users() {
    let slow = Arc::new(Harness::new());
    slow.connector.slow_lists(Duration::from_secs(2));
    let registry = Arc::new(ScreenRegistry::default());

    let mounting = tokio::spawn({
        let slow = slow.clone();
        let registry = registry.clone();
        async move {
            registry
                .get_or_mount(slow.identity.id, slow.provider.clone(), &slow.connector)
                .await
                .map(|_| ())
        }
    });
    wait_for(|| {
        let listing = slow.connector.listing();
        async move { listing }
    })
    .await;

    let other = Identity {
        id: Uuid::new_v4(),
        label: "other@school.test".into(),
    };
    let memory = MemoryStore::default();
    let screen = tokio::time::timeout(
        Duration::from_millis(500),
        registry.get_or_mount(
            other.id,
            Arc::new(LocalSessionProvider::new(Some(other.clone()))),
            &memory,
        ),
    )
    .await
    .expect("the other user waited on a slow mount")
    .unwrap();
    assert_eq!(screen.identity().await, other);
    assert!(!mounting.is_finished());

    mounting.await.unwrap().unwrap();
}
