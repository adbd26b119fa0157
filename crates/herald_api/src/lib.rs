//! Use-case handlers that a web router calls for notification views.

pub mod api;

pub use api::{
    all_notifications, delete, live_all_notification_count, live_all_notification_list,
    live_unread_notification_count, live_unread_notification_list, mark_all_as_read,
    mark_as_read, mark_as_unread, num_to_fetch, unread_notifications, ActionResponse,
    AllCountResponse, AllListResponse, ApiContext, ApiError, ApiResult, FollowUp,
    NotificationItem, NotificationPage, UnreadCountResponse, UnreadListResponse,
};
