use chrono::{Duration, TimeZone, Utc};
use herald_core::db::open_db_in_memory;
use herald_core::{
    DirectoryStore, FlagUpdate, Level, NewNotification, NotificationFilter,
    NotificationStore, NotificationValidationError, ObjectRef, Predicate, RepoError,
    SqliteDirectoryStore, SqliteNotificationStore, Window,
};
use rusqlite::Connection;
use serde_json::json;

fn draft(recipient: i64, verb: &str, minutes_ago: i64) -> NewNotification {
    let mut draft = NewNotification::new(recipient, ObjectRef::new("auth.user", 7), verb);
    draft.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        - Duration::minutes(minutes_ago);
    draft
}

fn seed_user(conn: &Connection, name: &str) -> i64 {
    SqliteDirectoryStore::new(conn).create_user(name).unwrap()
}

#[test]
fn insert_and_get_round_trip_preserves_every_field() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let mut new = draft(alice, "commented", 0);
    new.description = Some("nice post".to_string());
    new.target = Some(ObjectRef::new("blog.post", 1));
    new.action_object = Some(ObjectRef::new("blog.comment", 9));
    new.level = Level::Warning;
    new.public = false;
    new.data = Some(json!({"url": "/p/1"}).as_object().unwrap().clone());

    let created = store.insert(new.clone()).unwrap();
    let loaded = store.get(created.id()).unwrap().unwrap();

    assert_eq!(loaded, created);
    assert_eq!(loaded.recipient, alice);
    assert_eq!(loaded.verb, "commented");
    assert_eq!(loaded.level, Level::Warning);
    assert_eq!(loaded.target, Some(ObjectRef::new("blog.post", 1)));
    assert_eq!(loaded.timestamp, new.timestamp);
    assert!(!loaded.public);
    assert!(loaded.unread);
    assert_eq!(loaded.data.unwrap()["url"], "/p/1");

    let by_uuid = store.get_by_uuid(created.uuid()).unwrap().unwrap();
    assert_eq!(by_uuid.id(), created.id());
}

#[test]
fn batch_insert_assigns_increasing_ids_in_input_order() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let created = store
        .insert_batch(vec![draft(bob, "liked", 0), draft(alice, "liked", 0)])
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0].recipient, bob);
    assert_eq!(created[1].recipient, alice);
    assert!(created[0].id() < created[1].id());
    assert_ne!(created[0].uuid(), created[1].uuid());
}

#[test]
fn batch_insert_is_all_or_nothing() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let err = store
        .insert_batch(vec![draft(alice, "liked", 0), draft(404, "liked", 0)])
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(store.count(&NotificationFilter::all()).unwrap(), 0);
}

#[test]
fn invalid_drafts_are_rejected_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let err = store.insert(draft(alice, "  ", 0)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(NotificationValidationError::EmptyVerb)
    ));

    let mut bad_kind = draft(alice, "liked", 0);
    bad_kind.target = Some(ObjectRef::new("9post", 1));
    assert!(matches!(
        store.insert(bad_kind).unwrap_err(),
        RepoError::Validation(NotificationValidationError::InvalidObjectKind { .. })
    ));
}

#[test]
fn select_orders_newest_first_and_applies_window() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    store
        .insert_batch(vec![
            draft(alice, "oldest", 30),
            draft(alice, "newest", 0),
            draft(alice, "middle", 10),
        ])
        .unwrap();

    let all = store.select(&NotificationFilter::all(), Window::default()).unwrap();
    let verbs: Vec<_> = all.iter().map(|n| n.verb.as_str()).collect();
    assert_eq!(verbs, ["newest", "middle", "oldest"]);

    let page = store
        .select(
            &NotificationFilter::all(),
            Window {
                limit: Some(1),
                offset: 1,
            },
        )
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].verb, "middle");

    let skipped = store
        .select(
            &NotificationFilter::all(),
            Window {
                limit: None,
                offset: 2,
            },
        )
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].verb, "oldest");
}

#[test]
fn update_matching_changes_only_matching_rows() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    store
        .insert_batch(vec![draft(alice, "a", 0), draft(alice, "b", 1), draft(bob, "c", 2)])
        .unwrap();

    let alice_unread = NotificationFilter::all()
        .and(Predicate::Recipient(alice))
        .and(Predicate::Unread(true));
    let changed = store
        .update_matching(&alice_unread, FlagUpdate::unread(false))
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(store.count(&alice_unread).unwrap(), 0);

    let still_unread = NotificationFilter::all().and(Predicate::Unread(true));
    assert_eq!(store.count(&still_unread).unwrap(), 1);

    assert_eq!(
        store
            .update_matching(&NotificationFilter::all(), FlagUpdate::default())
            .unwrap(),
        0
    );
}

#[test]
fn save_persists_flags_and_reports_missing_rows() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let mut created = store.insert(draft(alice, "liked", 0)).unwrap();
    created.emailed = true;
    store.save(&created).unwrap();
    assert!(store.get(created.id()).unwrap().unwrap().emailed);

    store.delete(created.id()).unwrap();
    assert!(store.get(created.id()).unwrap().is_none());
    assert!(matches!(
        store.save(&created).unwrap_err(),
        RepoError::NotFound(id) if id == created.id()
    ));
    assert!(matches!(
        store.delete(created.id()).unwrap_err(),
        RepoError::NotFound(_)
    ));
}

#[test]
fn update_flags_writes_named_columns_only() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let mut created = store.insert(draft(alice, "liked", 0)).unwrap();
    created.public = false;
    store
        .update_flags(created.id(), FlagUpdate::unread(false))
        .unwrap();
    let stored = store.get(created.id()).unwrap().unwrap();
    assert!(!stored.unread);
    assert!(stored.public);

    store.delete(created.id()).unwrap();
    assert!(matches!(
        store
            .update_flags(created.id(), FlagUpdate::unread(true))
            .unwrap_err(),
        RepoError::NotFound(id) if id == created.id()
    ));
}

#[test]
fn delete_matching_honours_timestamp_cutoff() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let created = store
        .insert_batch(vec![draft(alice, "old", 60), draft(alice, "edge", 30), draft(alice, "new", 0)])
        .unwrap();

    let cutoff = created[1].timestamp;
    let removed = store
        .delete_matching(&NotificationFilter::all().and(Predicate::TimestampAtOrBefore(cutoff)))
        .unwrap();
    assert_eq!(removed, 2);

    let left = store.select(&NotificationFilter::all(), Window::default()).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].verb, "new");
}

#[test]
fn corrupted_rows_surface_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let created = store.insert(draft(alice, "liked", 0)).unwrap();

    conn.execute(
        "UPDATE notifications SET data = '{not json' WHERE id = ?1;",
        [created.id()],
    )
    .unwrap();

    assert!(matches!(
        store.get(created.id()).unwrap_err(),
        RepoError::InvalidData(_)
    ));
}

#[test]
fn store_requires_a_migrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    match SqliteNotificationStore::try_new(&conn) {
        Err(RepoError::UninitializedConnection { actual_version, .. }) => {
            assert_eq!(actual_version, 0)
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
}

#[test]
fn directory_lists_group_members_in_user_order() {
    let conn = open_db_in_memory().unwrap();
    let directory = SqliteDirectoryStore::new(&conn);
    let alice = directory.create_user("alice").unwrap();
    let bob = directory.create_user("bob").unwrap();
    let staff = directory.create_group("staff").unwrap();

    directory.add_member(staff, bob).unwrap();
    directory.add_member(staff, alice).unwrap();
    directory.add_member(staff, alice).unwrap();

    assert_eq!(directory.group_members(staff).unwrap(), vec![alice, bob]);
    assert_eq!(directory.get_user(bob).unwrap().unwrap().username, "bob");
    assert!(!directory.user_exists(99).unwrap());
    assert!(matches!(
        directory.group_members(99).unwrap_err(),
        RepoError::GroupNotFound(99)
    ));
    assert!(matches!(
        directory.add_member(staff, 99).unwrap_err(),
        RepoError::UserNotFound(99)
    ));
}
