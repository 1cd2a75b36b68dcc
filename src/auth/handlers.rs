use crate::error::AppError;
use crate::handlers::clear_assigned_prompt;
use crate::middleware::csrf::{get_or_create_csrf_token, verify_csrf_token};
use crate::models::Gender;
use crate::services::user_service::{LoginRequest, UserServiceError, MAX_AGE, MIN_AGE};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use super::{SESSION_IS_ADMIN, SESSION_PHONE};

struct GenderOption {
    value: &'static str,
    selected: bool,
}

fn gender_options(selected: &str) -> Vec<GenderOption> {
    Gender::ALL
        .iter()
        .map(|g| GenderOption {
            value: g.as_str(),
            selected: g.as_str() == selected.trim(),
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    error: Option<String>,
    csrf_token: String,
    name: String,
    phone: String,
    age: i64,
    genders: Vec<GenderOption>,
    min_age: i64,
    max_age: i64,
}

impl LoginTemplate {
    fn blank(csrf_token: String) -> Self {
        Self {
            error: None,
            csrf_token,
            name: String::new(),
            phone: String::new(),
            age: 18,
            genders: gender_options(Gender::Male.as_str()),
            min_age: MIN_AGE,
            max_age: MAX_AGE,
        }
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    name: String,
    phone: String,
    age: String,
    gender: String,
    admin_password: Option<String>,
    csrf_token: String,
}

pub async fn index_handler(session: Session) -> Result<Redirect, AppError> {
    match session.get::<String>(SESSION_PHONE).await? {
        Some(_) => Ok(Redirect::to("/play")),
        None => Ok(Redirect::to("/login")),
    }
}

pub async fn login_page(session: Session) -> Result<Response, AppError> {
    if session.get::<String>(SESSION_PHONE).await?.is_some() {
        return Ok(Redirect::to("/play").into_response());
    }
    let csrf_token = get_or_create_csrf_token(&session).await?;
    Ok(LoginTemplate::blank(csrf_token).into_response())
}

async fn login_error(session: &Session, form: &LoginForm, msg: &str) -> Result<Response, AppError> {
    let csrf_token = get_or_create_csrf_token(session).await?;
    let template = LoginTemplate {
        error: Some(msg.to_string()),
        name: form.name.clone(),
        phone: form.phone.clone(),
        age: form.age.trim().parse().unwrap_or(18),
        genders: gender_options(&form.gender),
        ..LoginTemplate::blank(csrf_token)
    };
    Ok(template.into_response())
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if !verify_csrf_token(&session, &form.csrf_token).await {
        return login_error(
            &session,
            &form,
            "Invalid security token. Please refresh the page and try again.",
        )
        .await;
    }

    let Ok(age) = form.age.trim().parse::<i64>() else {
        return login_error(&session, &form, &UserServiceError::InvalidAge.to_string()).await;
    };

    let request = LoginRequest {
        name: form.name.clone(),
        phone: form.phone.clone(),
        age,
        gender: form.gender.clone(),
        admin_passphrase: form.admin_password.clone(),
    };

    match app_state.user_service.login(request).await {
        Ok(user) => {
            // Fresh session id on privilege change.
            session.cycle_id().await?;
            // An assignment never carries over to whoever logs in next.
            clear_assigned_prompt(&session).await?;
            session.insert(SESSION_PHONE, &user.phone).await?;
            session.insert(SESSION_IS_ADMIN, user.is_admin).await?;

            let greeting = format!(
                "Welcome, {}{}!",
                if user.is_admin { "ADMIN " } else { "" },
                user.name
            );
            Ok(Redirect::to(&format!(
                "/play?success={}",
                urlencoding::encode(&greeting)
            ))
            .into_response())
        }
        Err(UserServiceError::Repository(e)) => Err(AppError::Repository(e)),
        Err(UserServiceError::HashingError(e)) => Err(AppError::Internal(e)),
        Err(err) => login_error(&session, &form, &err.to_string()).await,
    }
}

#[derive(Deserialize)]
pub struct LogoutForm {
    csrf_token: String,
}

pub async fn logout_handler(
    session: Session,
    Form(form): Form<LogoutForm>,
) -> Result<Redirect, AppError> {
    if !verify_csrf_token(&session, &form.csrf_token).await {
        return Ok(Redirect::to("/play"));
    }
    if let Ok(Some(phone)) = session.get::<String>(SESSION_PHONE).await {
        tracing::info!("{} logged out", phone);
    }
    session.flush().await?;
    Ok(Redirect::to("/login"))
}
