//! Request handlers a web layer calls for notification views.
//!
//! # Responsibility
//! - Expose list, live count/list, mark and delete use cases per user.
//! - Translate core errors into a small, status-mapped error set.
//!
//! # Invariants
//! - Handlers never panic.
//! - Single-notification lookups are scoped to the requesting user.
//! - Anonymous callers get empty live payloads and `Unauthenticated` elsewhere.

use chrono::{DateTime, Utc};
use herald_core::{
    id_to_slug, slug_to_id, Level, Notification, NotificationData, NotificationManager,
    NotificationQuerySet, ObjectRegistry, QueryError, RepoError, SettingsHandle, SlugError,
    SqliteNotificationStore, UserId,
};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Upper bound accepted for the `max` live-list parameter.
pub const MAX_LIVE_FETCH: u32 = 100;

pub type ApiResult<T> = Result<T, ApiError>;

/// Handler error with an HTTP-style status mapping.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    /// No notification with this slug belongs to the requesting user.
    NotFound(i64),
    InvalidSlug(SlugError),
    InvalidPage(u32),
    Query(QueryError),
    Repo(RepoError),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::NotFound(_) | Self::InvalidSlug(_) | Self::InvalidPage(_) => 404,
            Self::Query(_) | Self::Repo(_) => 500,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "authentication required"),
            Self::NotFound(slug) => write!(f, "notification not found: {slug}"),
            Self::InvalidSlug(err) => write!(f, "{err}"),
            Self::InvalidPage(page) => write!(f, "page out of range: {page}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSlug(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SlugError> for ApiError {
    fn from(value: SlugError) -> Self {
        Self::InvalidSlug(value)
    }
}

/// Per-request handler context.
pub struct ApiContext<'a> {
    pub conn: &'a Connection,
    pub settings: SettingsHandle,
    pub registry: &'a ObjectRegistry,
    /// Authenticated user, `None` for anonymous requests.
    pub user: Option<UserId>,
}

impl<'a> ApiContext<'a> {
    fn manager(&self) -> ApiResult<NotificationManager<SqliteNotificationStore<'a>>> {
        let store = SqliteNotificationStore::try_new(self.conn)?;
        Ok(NotificationManager::new(store, self.settings.clone()))
    }

    fn require_user(&self) -> ApiResult<UserId> {
        self.user.ok_or(ApiError::Unauthenticated)
    }
}

/// One notification as rendered for live lists and pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationItem {
    pub id: i64,
    pub slug: i64,
    pub uuid: Uuid,
    pub recipient: UserId,
    pub level: Level,
    pub verb: String,
    pub description: Option<String>,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_object: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub timesince: String,
    pub unread: bool,
    pub public: bool,
    pub deleted: bool,
    pub emailed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
}

impl NotificationItem {
    fn render(notification: &Notification, registry: &ObjectRegistry, now: DateTime<Utc>) -> Self {
        Self {
            id: notification.id(),
            slug: notification.slug(),
            uuid: notification.uuid(),
            recipient: notification.recipient,
            level: notification.level,
            verb: notification.verb.clone(),
            description: notification.description.clone(),
            actor: registry.display(&notification.actor),
            target: notification
                .target
                .as_ref()
                .map(|target| registry.display(target)),
            action_object: notification
                .action_object
                .as_ref()
                .map(|action_object| registry.display(action_object)),
            timestamp: notification.timestamp,
            timesince: notification.timesince(now),
            unread: notification.unread,
            public: notification.public,
            deleted: notification.deleted,
            emailed: notification.emailed,
            data: notification.data.clone().filter(|data| !data.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllCountResponse {
    pub all_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnreadListResponse {
    pub unread_count: u64,
    pub unread_list: Vec<NotificationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllListResponse {
    pub all_count: u64,
    pub all_list: Vec<NotificationItem>,
}

/// One page of a paginated list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPage {
    /// 1-based page number.
    pub page: u32,
    pub num_pages: u32,
    pub count: u64,
    pub notifications: Vec<NotificationItem>,
}

/// Where a browser client should go after a mutating handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUp {
    Unread,
    All,
}

/// Result envelope for mutating handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    /// Number of rows whose state changed.
    pub affected: usize,
    pub redirect: FollowUp,
}

/// Unread count for the live badge. Anonymous callers get zero.
pub fn live_unread_notification_count(ctx: &ApiContext<'_>) -> ApiResult<UnreadCountResponse> {
    let Some(user) = ctx.user else {
        return Ok(UnreadCountResponse { unread_count: 0 });
    };
    let manager = ctx.manager()?;
    let unread_count = manager.for_recipient(user).unread(false).count()?;
    Ok(UnreadCountResponse { unread_count })
}

/// Total count for the live badge. Anonymous callers get zero.
pub fn live_all_notification_count(ctx: &ApiContext<'_>) -> ApiResult<AllCountResponse> {
    let Some(user) = ctx.user else {
        return Ok(AllCountResponse { all_count: 0 });
    };
    let all_count = ctx.manager()?.for_recipient(user).count()?;
    Ok(AllCountResponse { all_count })
}

/// Newest unread notifications, optionally marking each returned one read.
///
/// `max` is the raw query parameter; values outside `1..=100` or
/// unparseable text fall back to the configured fetch size.
pub fn live_unread_notification_list(
    ctx: &ApiContext<'_>,
    max: Option<&str>,
    mark_as_read: bool,
) -> ApiResult<UnreadListResponse> {
    let Some(user) = ctx.user else {
        return Ok(UnreadListResponse {
            unread_count: 0,
            unread_list: Vec::new(),
        });
    };
    let manager = ctx.manager()?;
    let view = manager.for_recipient(user);
    let unread_list = live_items(ctx, &manager, &view.unread(false), max, mark_as_read)?;
    let unread_count = view.unread(false).count()?;
    Ok(UnreadListResponse {
        unread_count,
        unread_list,
    })
}

/// Newest notifications regardless of state, optionally marking each
/// returned one read.
pub fn live_all_notification_list(
    ctx: &ApiContext<'_>,
    max: Option<&str>,
    mark_as_read: bool,
) -> ApiResult<AllListResponse> {
    let Some(user) = ctx.user else {
        return Ok(AllListResponse {
            all_count: 0,
            all_list: Vec::new(),
        });
    };
    let manager = ctx.manager()?;
    let view = manager.for_recipient(user);
    let all_list = live_items(ctx, &manager, &view, max, mark_as_read)?;
    let all_count = view.count()?;
    Ok(AllListResponse {
        all_count,
        all_list,
    })
}

/// Paginated list of the user's notifications; only active ones when soft
/// delete is on.
pub fn all_notifications(ctx: &ApiContext<'_>, page: u32) -> ApiResult<NotificationPage> {
    let user = ctx.require_user()?;
    let manager = ctx.manager()?;
    let view = manager.for_recipient(user);
    let view = if ctx.settings.soft_delete() {
        view.active()?
    } else {
        view
    };
    paginate(ctx, &view, page)
}

/// Paginated list of the user's unread notifications.
pub fn unread_notifications(ctx: &ApiContext<'_>, page: u32) -> ApiResult<NotificationPage> {
    let user = ctx.require_user()?;
    let manager = ctx.manager()?;
    let view = manager.for_recipient(user).unread(false);
    paginate(ctx, &view, page)
}

pub fn mark_all_as_read(ctx: &ApiContext<'_>) -> ApiResult<ActionResponse> {
    let user = ctx.require_user()?;
    let affected = ctx.manager()?.all().mark_all_as_read(Some(user))?;
    Ok(ActionResponse {
        affected,
        redirect: FollowUp::Unread,
    })
}

pub fn mark_as_read(ctx: &ApiContext<'_>, slug: &str) -> ApiResult<ActionResponse> {
    let manager = ctx.manager()?;
    let mut notification = find_owned(ctx, &manager, slug)?;
    let changed = notification.mark_as_read(manager.store())?;
    Ok(ActionResponse {
        affected: usize::from(changed),
        redirect: FollowUp::Unread,
    })
}

pub fn mark_as_unread(ctx: &ApiContext<'_>, slug: &str) -> ApiResult<ActionResponse> {
    let manager = ctx.manager()?;
    let mut notification = find_owned(ctx, &manager, slug)?;
    let changed = notification.mark_as_unread(manager.store())?;
    Ok(ActionResponse {
        affected: usize::from(changed),
        redirect: FollowUp::Unread,
    })
}

/// Soft-deletes the notification when soft delete is on, removes it
/// otherwise.
pub fn delete(ctx: &ApiContext<'_>, slug: &str) -> ApiResult<ActionResponse> {
    let manager = ctx.manager()?;
    let mut notification = find_owned(ctx, &manager, slug)?;
    let affected = if ctx.settings.soft_delete() {
        usize::from(notification.mark_as_deleted(manager.store(), &ctx.settings)?)
    } else {
        manager.all().with_id(notification.id()).delete()?
    };
    info!(
        "event=api_delete module=api status=ok soft={} affected={affected}",
        ctx.settings.soft_delete()
    );
    Ok(ActionResponse {
        affected,
        redirect: FollowUp::All,
    })
}

/// Parses the live-list `max` parameter.
pub fn num_to_fetch(max: Option<&str>, default: u32) -> u32 {
    match max.map(|raw| raw.trim().parse::<u32>()) {
        Some(Ok(value)) if (1..=MAX_LIVE_FETCH).contains(&value) => value,
        _ => default,
    }
}

fn live_items(
    ctx: &ApiContext<'_>,
    manager: &NotificationManager<SqliteNotificationStore<'_>>,
    view: &NotificationQuerySet<'_, SqliteNotificationStore<'_>>,
    max: Option<&str>,
    mark_as_read: bool,
) -> ApiResult<Vec<NotificationItem>> {
    let limit = num_to_fetch(max, ctx.settings.snapshot().num_to_fetch);
    let now = Utc::now();
    let mut items = Vec::new();
    for mut notification in view.list_window(limit, 0)? {
        items.push(NotificationItem::render(&notification, ctx.registry, now));
        if mark_as_read {
            notification.mark_as_read(manager.store())?;
        }
    }
    Ok(items)
}

fn paginate(
    ctx: &ApiContext<'_>,
    view: &NotificationQuerySet<'_, SqliteNotificationStore<'_>>,
    page: u32,
) -> ApiResult<NotificationPage> {
    let per_page = ctx.settings.snapshot().paginate_by.max(1);
    let count = view.count()?;
    let num_pages = u32::try_from(count.div_ceil(u64::from(per_page)))
        .unwrap_or(u32::MAX)
        .max(1);
    if page == 0 || page > num_pages {
        return Err(ApiError::InvalidPage(page));
    }

    let now = Utc::now();
    let notifications = view
        .list_window(per_page, (page - 1).saturating_mul(per_page))?
        .iter()
        .map(|notification| NotificationItem::render(notification, ctx.registry, now))
        .collect();
    Ok(NotificationPage {
        page,
        num_pages,
        count,
        notifications,
    })
}

fn find_owned(
    ctx: &ApiContext<'_>,
    manager: &NotificationManager<SqliteNotificationStore<'_>>,
    slug: &str,
) -> ApiResult<Notification> {
    let user = ctx.require_user()?;
    let id = slug_to_id(slug)?;
    match manager.for_recipient(user).get(id)? {
        Some(notification) => Ok(notification),
        None => {
            warn!("event=api_lookup module=api status=not_found");
            Err(ApiError::NotFound(id_to_slug(id)))
        }
    }
}
