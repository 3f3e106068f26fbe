use crate::error::AppError;
use crate::login::LoginRequest;
use crate::registration::RegisterRequest;
use crate::state::AppState;
use axum::extract::rejection::FormRejection;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Form, Json};
use std::sync::Arc;

fn bad_form(rejection: FormRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

/// POST /register
#[tracing::instrument(skip(state, form))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    form: Result<Form<RegisterRequest>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Form(req) = form.map_err(bad_form)?;
    let outcome = state.registration.register(req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /login
#[tracing::instrument(skip(state, form))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    form: Result<Form<LoginRequest>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Form(req) = form.map_err(bad_form)?;
    let token = state.login.login(req).await?;
    Ok(Json(token))
}
