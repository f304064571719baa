use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    routing::post,
    Router,
};
use docqa_auth::{jwt::JwtService, password::PasswordService};
use docqa_error::{DocqaError, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::db::Store;

#[derive(Clone)]
pub struct AuthServices {
    pub store: Store,
    pub jwt_service: Arc<JwtService>,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn create_auth_routes() -> Router<AuthServices> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

async fn register(
    State(services): State<AuthServices>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    validate_email(&request.email)?;
    PasswordService::validate_password(&request.password)?;

    let hash = PasswordService::hash_password(&request.password)?;
    let user_id = services.store.create_user(&request.email, &hash).await?;
    info!(%user_id, "user registered");

    Ok((
        StatusCode::CREATED,
        ResponseJson(json!({ "id": user_id, "email": request.email })),
    ))
}

async fn login(
    State(services): State<AuthServices>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let invalid = || DocqaError::Authentication {
        message: "invalid email or password".to_string(),
    };

    let user = services
        .store
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid)?;

    if !PasswordService::verify_password(&request.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = services.jwt_service.issue_token(user.id, user.email)?;
    Ok((StatusCode::OK, ResponseJson(json!({ "token": token }))))
}

fn validate_email(email: &str) -> Result<()> {
    let well_formed = email.len() <= 254
        && email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
    if well_formed {
        Ok(())
    } else {
        Err(DocqaError::Validation {
            reason: "invalid email address".to_string(),
        })
    }
}
