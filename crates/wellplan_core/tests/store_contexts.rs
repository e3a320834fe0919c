use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use wellplan_core::store::WellQuery;
use wellplan_core::{
    ContextOrigin, EntityKind, EntityStore, OwnedRecord, ProjectState, SqliteContainer,
    StoreContainer, StoreError, Well,
};

fn container() -> (tempfile::TempDir, SqliteContainer) {
    let dir = tempfile::tempdir().unwrap();
    let container = SqliteContainer::open(dir.path().join("wellplan.sqlite3")).unwrap();
    (dir, container)
}

#[test]
fn uncommitted_writes_are_invisible_to_other_contexts() {
    let (_dir, container) = container();
    let mut writer = container.open_context(ContextOrigin::Interactive).unwrap();
    let reader = container.open_context(ContextOrigin::Background).unwrap();

    let well = Well::new("Well A");
    writer.insert_well(&well).unwrap();
    assert!(writer.has_pending_changes());
    assert!(reader.fetch_wells(&WellQuery::all()).unwrap().is_empty());

    writer.commit().unwrap();
    assert!(!writer.has_pending_changes());
    let seen = reader.fetch_wells(&WellQuery::all()).unwrap();
    assert_eq!(seen, vec![well]);
}

#[test]
fn dropping_a_context_discards_staged_writes() {
    let (_dir, container) = container();
    {
        let mut writer = container.open_context(ContextOrigin::Interactive).unwrap();
        writer.insert_well(&Well::new("Never committed")).unwrap();
    }
    let reader = container.open_context(ContextOrigin::Interactive).unwrap();
    assert!(reader.fetch_wells(&WellQuery::all()).unwrap().is_empty());
}

#[test]
fn commit_publishes_one_notice_per_committed_change() {
    let (_dir, container) = container();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    container.subscribe(Box::new(move |notice| {
        assert_eq!(notice.origin, ContextOrigin::Background);
        seen.fetch_add(1, Ordering::SeqCst);
        true
    }));

    let mut context = container.open_context(ContextOrigin::Background).unwrap();
    context.commit().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0, "empty commit must stay silent");

    context.insert_well(&Well::new("Well A")).unwrap();
    context.commit().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(container.generation(), 1);
}

#[test]
fn listeners_returning_false_are_dropped() {
    let (_dir, container) = container();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    container.subscribe(Box::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        false
    }));

    let mut context = container.open_context(ContextOrigin::Interactive).unwrap();
    for name in ["Well A", "Well B"] {
        context.insert_well(&Well::new(name)).unwrap();
        context.commit().unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn inserts_require_a_live_owner() {
    let (_dir, container) = container();
    let mut context = container.open_context(ContextOrigin::Interactive).unwrap();

    let orphan = ProjectState::new(Uuid::new_v4(), "Orphan");
    match context.insert_project(&orphan) {
        Err(StoreError::MissingOwner { kind, owner_uuid }) => {
            assert_eq!(kind, EntityKind::ProjectState);
            assert_eq!(owner_uuid, orphan.well_uuid);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let record = OwnedRecord::new(EntityKind::MudStep, Uuid::new_v4(), "step");
    assert!(matches!(
        context.insert_record(&record),
        Err(StoreError::MissingOwner { .. })
    ));
    assert!(matches!(
        context.insert_record(&OwnedRecord::new(EntityKind::Well, Uuid::new_v4(), "x")),
        Err(StoreError::UnsupportedKind(EntityKind::Well))
    ));
}

#[test]
fn owner_with_live_rows_cannot_be_deleted_directly() {
    let (_dir, container) = container();
    let mut context = container.open_context(ContextOrigin::Interactive).unwrap();
    let well = Well::new("Well A");
    let project = ProjectState::new(well.uuid, "Baseline");
    context.insert_well(&well).unwrap();
    context.insert_project(&project).unwrap();
    context.commit().unwrap();

    let err = context
        .delete_by_identity(EntityKind::Well, well.uuid)
        .unwrap_err();
    assert!(matches!(err, StoreError::Db(_)));
    context.rollback().unwrap();

    assert_eq!(context.fetch_projects(Some(well.uuid)).unwrap(), vec![project]);
}

#[test]
fn deleting_a_missing_row_reports_false() {
    let (_dir, container) = container();
    let mut context = container.open_context(ContextOrigin::Background).unwrap();
    assert!(!context
        .delete_by_identity(EntityKind::ProjectState, Uuid::new_v4())
        .unwrap());
    context.commit().unwrap();
}

#[test]
fn listings_follow_creation_order() {
    let (_dir, container) = container();
    let mut context = container.open_context(ContextOrigin::Interactive).unwrap();
    let well = Well::new("Well A");
    context.insert_well(&well).unwrap();

    let labels = ["first", "second", "third"];
    for label in labels {
        let record = OwnedRecord::new(EntityKind::Transfer, well.uuid, label).with_amount(1.5);
        context.insert_record(&record).unwrap();
    }
    context.commit().unwrap();

    let records = context.fetch_records(EntityKind::Transfer, well.uuid).unwrap();
    let fetched: Vec<&str> = records.iter().map(|record| record.label.as_str()).collect();
    assert_eq!(fetched, labels);
    assert!(records.iter().all(|record| record.amount == Some(1.5)));
    assert_eq!(
        context
            .fetch_owned_ids(EntityKind::Transfer, well.uuid)
            .unwrap(),
        records.iter().map(|record| record.uuid).collect::<Vec<_>>()
    );
}
