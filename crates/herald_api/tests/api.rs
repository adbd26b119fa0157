use herald_api::{
    all_notifications, delete, live_all_notification_count, live_all_notification_list,
    live_unread_notification_count, live_unread_notification_list, mark_all_as_read,
    mark_as_read, mark_as_unread, unread_notifications, ApiContext, ApiError, FollowUp,
};
use herald_core::db::open_db_in_memory;
use herald_core::{
    DirectoryStore, NewNotification, NotificationFilter, NotificationSettings,
    NotificationStore, ObjectRef, ObjectRegistry, ObjectResolver, SettingsHandle,
    SqliteDirectoryStore, SqliteNotificationStore,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;

struct Users;

impl ObjectResolver for Users {
    fn display_name(&self, id: &str) -> Option<String> {
        (id == "1").then(|| "Alice".to_string())
    }
}

struct Seeded {
    conn: Connection,
    registry: ObjectRegistry,
    alice: i64,
    bob: i64,
}

fn seeded() -> Seeded {
    let conn = open_db_in_memory().unwrap();
    let directory = SqliteDirectoryStore::new(&conn);
    let alice = directory.create_user("alice").unwrap();
    let bob = directory.create_user("bob").unwrap();
    let mut registry = ObjectRegistry::new();
    registry.register("auth.user", Arc::new(Users)).unwrap();
    Seeded {
        conn,
        registry,
        alice,
        bob,
    }
}

fn settings(soft_delete: bool, paginate_by: u32) -> SettingsHandle {
    SettingsHandle::fixed(NotificationSettings {
        soft_delete,
        paginate_by,
        num_to_fetch: 3,
        ..NotificationSettings::default()
    })
}

fn context(seeded: &Seeded, settings: SettingsHandle, user: Option<i64>) -> ApiContext<'_> {
    ApiContext {
        conn: &seeded.conn,
        settings,
        registry: &seeded.registry,
        user,
    }
}

fn insert(seeded: &Seeded, recipient: i64, count: usize) -> Vec<i64> {
    let store = SqliteNotificationStore::try_new(&seeded.conn).unwrap();
    (0..count)
        .map(|index| {
            let mut draft =
                NewNotification::new(recipient, ObjectRef::new("auth.user", 1), "commented");
            draft.target = Some(ObjectRef::new("blog.post", index));
            store.insert(draft).unwrap().slug()
        })
        .collect()
}

#[test]
fn anonymous_live_endpoints_return_empty_payloads() {
    let seeded = seeded();
    insert(&seeded, seeded.alice, 2);
    let ctx = context(&seeded, settings(false, 20), None);

    assert_eq!(live_unread_notification_count(&ctx).unwrap().unread_count, 0);
    assert_eq!(live_all_notification_count(&ctx).unwrap().all_count, 0);
    let list = live_unread_notification_list(&ctx, None, false).unwrap();
    assert_eq!(list.unread_count, 0);
    assert!(list.unread_list.is_empty());
    assert!(live_all_notification_list(&ctx, None, false)
        .unwrap()
        .all_list
        .is_empty());
}

#[test]
fn anonymous_mutations_and_pages_require_authentication() {
    let seeded = seeded();
    let slugs = insert(&seeded, seeded.alice, 1);
    let ctx = context(&seeded, settings(false, 20), None);
    let slug = slugs[0].to_string();

    assert!(matches!(mark_as_read(&ctx, &slug), Err(ApiError::Unauthenticated)));
    assert!(matches!(delete(&ctx, &slug), Err(ApiError::Unauthenticated)));
    assert!(matches!(mark_all_as_read(&ctx), Err(ApiError::Unauthenticated)));
    assert!(matches!(all_notifications(&ctx, 1), Err(ApiError::Unauthenticated)));
}

#[test]
fn live_unread_list_respects_max_and_marks_returned_items() {
    let seeded = seeded();
    insert(&seeded, seeded.alice, 5);
    insert(&seeded, seeded.bob, 1);
    let ctx = context(&seeded, settings(false, 20), Some(seeded.alice));

    let defaulted = live_unread_notification_list(&ctx, Some("abc"), false).unwrap();
    assert_eq!(defaulted.unread_list.len(), 3);
    assert_eq!(defaulted.unread_count, 5);

    let marked = live_unread_notification_list(&ctx, Some("2"), true).unwrap();
    assert_eq!(marked.unread_list.len(), 2);
    assert!(marked.unread_list.iter().all(|item| item.unread));
    assert_eq!(marked.unread_count, 3);
    assert_eq!(live_unread_notification_count(&ctx).unwrap().unread_count, 3);

    let bob = context(&seeded, settings(false, 20), Some(seeded.bob));
    assert_eq!(live_unread_notification_count(&bob).unwrap().unread_count, 1);
}

#[test]
fn live_items_serialize_display_strings() {
    let seeded = seeded();
    insert(&seeded, seeded.alice, 1);
    let ctx = context(&seeded, settings(false, 20), Some(seeded.alice));

    let response = live_all_notification_list(&ctx, Some("10"), false).unwrap();
    assert_eq!(response.all_count, 1);
    let value = serde_json::to_value(&response).unwrap();
    let item = &value["all_list"][0];
    assert_eq!(item["actor"], json!("Alice"));
    assert_eq!(item["target"], json!("blog.post#0"));
    assert_eq!(item["verb"], json!("commented"));
    assert_eq!(item["level"], json!("info"));
    assert!(item.get("action_object").is_none());
    assert!(item.get("data").is_none());
    assert_eq!(item["slug"], json!(response.all_list[0].id + 110_909));
}

#[test]
fn mark_as_read_and_unread_are_scoped_to_owner() {
    let seeded = seeded();
    let alice_slugs = insert(&seeded, seeded.alice, 1);
    let slug = alice_slugs[0].to_string();

    let bob = context(&seeded, settings(false, 20), Some(seeded.bob));
    assert!(matches!(mark_as_read(&bob, &slug), Err(ApiError::NotFound(_))));

    let alice = context(&seeded, settings(false, 20), Some(seeded.alice));
    let first = mark_as_read(&alice, &slug).unwrap();
    assert_eq!(first.affected, 1);
    assert_eq!(first.redirect, FollowUp::Unread);
    assert_eq!(mark_as_read(&alice, &slug).unwrap().affected, 0);
    assert_eq!(mark_as_unread(&alice, &slug).unwrap().affected, 1);

    assert!(matches!(
        mark_as_read(&alice, "not-a-slug"),
        Err(ApiError::InvalidSlug(_))
    ));
    assert!(matches!(
        mark_as_read(&alice, "999999"),
        Err(ApiError::NotFound(999_999))
    ));
}

#[test]
fn delete_hard_deletes_without_soft_delete() {
    let seeded = seeded();
    let slugs = insert(&seeded, seeded.alice, 2);
    let ctx = context(&seeded, settings(false, 20), Some(seeded.alice));

    let response = delete(&ctx, &slugs[0].to_string()).unwrap();
    assert_eq!(response.affected, 1);
    assert_eq!(response.redirect, FollowUp::All);

    let store = SqliteNotificationStore::try_new(&seeded.conn).unwrap();
    assert_eq!(store.count(&NotificationFilter::all()).unwrap(), 1);
}

#[test]
fn delete_soft_deletes_and_hides_from_all_list_under_soft_delete() {
    let seeded = seeded();
    let slugs = insert(&seeded, seeded.alice, 2);
    let ctx = context(&seeded, settings(true, 20), Some(seeded.alice));

    assert_eq!(delete(&ctx, &slugs[0].to_string()).unwrap().affected, 1);
    assert_eq!(delete(&ctx, &slugs[0].to_string()).unwrap().affected, 0);

    let store = SqliteNotificationStore::try_new(&seeded.conn).unwrap();
    assert_eq!(store.count(&NotificationFilter::all()).unwrap(), 2);

    let page = all_notifications(&ctx, 1).unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.notifications[0].slug, slugs[1]);
    assert_eq!(unread_notifications(&ctx, 1).unwrap().count, 1);
}

#[test]
fn pages_follow_paginate_by() {
    let seeded = seeded();
    insert(&seeded, seeded.alice, 5);
    let ctx = context(&seeded, settings(false, 2), Some(seeded.alice));

    let first = all_notifications(&ctx, 1).unwrap();
    assert_eq!(first.num_pages, 3);
    assert_eq!(first.count, 5);
    assert_eq!(first.notifications.len(), 2);

    let last = all_notifications(&ctx, 3).unwrap();
    assert_eq!(last.notifications.len(), 1);

    assert!(matches!(all_notifications(&ctx, 4), Err(ApiError::InvalidPage(4))));
    assert!(matches!(all_notifications(&ctx, 0), Err(ApiError::InvalidPage(0))));
}

#[test]
fn empty_first_page_is_allowed() {
    let seeded = seeded();
    let ctx = context(&seeded, settings(false, 20), Some(seeded.bob));

    let page = unread_notifications(&ctx, 1).unwrap();
    assert_eq!(page.num_pages, 1);
    assert!(page.notifications.is_empty());
}

#[test]
fn mark_all_as_read_only_touches_current_user() {
    let seeded = seeded();
    insert(&seeded, seeded.alice, 3);
    insert(&seeded, seeded.bob, 2);
    let ctx = context(&seeded, settings(false, 20), Some(seeded.alice));

    assert_eq!(mark_all_as_read(&ctx).unwrap().affected, 3);
    assert_eq!(live_unread_notification_count(&ctx).unwrap().unread_count, 0);

    let bob = context(&seeded, settings(false, 20), Some(seeded.bob));
    assert_eq!(live_unread_notification_count(&bob).unwrap().unread_count, 2);
}
