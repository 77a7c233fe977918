//! Admin login, logout and the extractors that gate admin routes.

use crate::{
    errors::AppError,
    services::{
        admin::{AuthError, SESSION_COOKIE},
        render,
    },
    state::AppState,
};
use axum::{
    Form, Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Admin gate for HTML pages. Unauthenticated visitors are sent to `/login`.
pub struct AdminPage;

impl FromRequestParts<AppState> for AdminPage {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.admin.authorize(&parts.headers).map_err(|err| {
            tracing::debug!("admin page refused: {}", err);
            Redirect::to("/login")
        })?;
        Ok(AdminPage)
    }
}

/// Admin gate for JSON routes. Unauthenticated callers get a 401.
pub struct AdminApi;

impl FromRequestParts<AppState> for AdminApi {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.admin.authorize(&parts.headers)?;
        Ok(AdminApi)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn login_page_html(
    state: &AppState,
    email: &str,
    error: Option<&str>,
) -> Result<Html<String>, AppError> {
    let html = state.templates.render(
        render::LOGIN,
        &json!({
            "page_title": "관리자 로그인",
            "email": email,
            "error": error,
        }),
    )?;
    Ok(Html(html))
}

fn session_cookie(state: &AppState, token: &str, max_age: u64) -> String {
    let secure = if state.base_url.starts_with("https://") {
        "; Secure"
    } else {
        ""
    };
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure}")
}

/// GET `/login`
pub async fn login_page(State(state): State<AppState>) -> Result<Response, AppError> {
    if !state.admin.is_enabled() {
        return Ok(Redirect::to("/upload_form").into_response());
    }
    Ok(login_page_html(&state, "", None)?.into_response())
}

/// POST `/login`
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match state.admin.login(&form.email, &form.password) {
        Ok(token) => {
            tracing::info!("admin signed in");
            let cookie = session_cookie(&state, &token, state.admin.session_ttl().as_secs());
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/upload_form")).into_response())
        }
        Err(AuthError::NotConfigured) => Ok(Redirect::to("/upload_form").into_response()),
        Err(err) => {
            tracing::warn!("admin sign-in failed: {}", err);
            let page = login_page_html(
                &state,
                &form.email,
                Some("이메일 또는 비밀번호가 올바르지 않습니다."),
            )?;
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
    }
}

/// POST `/logout`
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = session_cookie(&state, "", 0);
    ([(header::SET_COOKIE, cookie)], Redirect::to("/login")).into_response()
}

/// POST `/api/admin/login`
pub async fn api_login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Json<Value>, AppError> {
    let token = state.admin.login(&form.email, &form.password)?;
    Ok(Json(json!({
        "token": token,
        "token_type": "bearer",
        "expires_in": state.admin.session_ttl().as_secs(),
    })))
}
