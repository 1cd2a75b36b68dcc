use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{FlashQuery, PageContext};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::UserSummary;
use crate::AppState;

const PAGE_SIZE: i64 = 100;

#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
struct AdminUsersTemplate {
    page: PageContext,
    users: Vec<UserSummary>,
    offset: i64,
    prev_offset: Option<i64>,
    next_offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct AdminUsersQuery {
    offset: Option<i64>,
    success: Option<String>,
    error: Option<String>,
}

pub async fn admin_users_page(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Response, AppError> {
    // The session flag was checked by the layer; the database has the final say.
    if !current.is_admin() {
        return Err(AppError::Forbidden);
    }

    let offset = query.offset.unwrap_or(0).max(0);
    let flash = FlashQuery {
        success: query.success,
        error: query.error,
    };
    let page = PageContext::new(&current, flash, "admin").await?;
    let users = app_state
        .user_service
        .list_users(Some(PAGE_SIZE), Some(offset))
        .await?;

    let next_offset = (users.len() as i64 == PAGE_SIZE).then_some(offset + PAGE_SIZE);
    let prev_offset = (offset > 0).then(|| (offset - PAGE_SIZE).max(0));

    Ok(AdminUsersTemplate {
        page,
        users,
        offset,
        prev_offset,
        next_offset,
    }
    .into_response())
}
