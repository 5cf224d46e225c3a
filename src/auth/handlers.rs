use crate::{
    auth::{
        auth::AuthUser,
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::AppError,
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, TokenPair, TokenType, UserReq},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token generation failed: {e}"))
}

/// Issues an access/refresh pair and stores the refresh `jti`.
async fn issue_pair(pool: &MySqlPool, config: &Config, subject: &Subject<'_>) -> Result<TokenPair, AppError> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(token_error)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, user_id = subject.user_id, "Failed to store refresh token");
        AppError::Database(e)
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

const REVOKE_LIVE_TOKEN: &str =
    "UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0 AND expires_at > NOW()";

/// A refresh token rotates only if this request revoked it.
fn ensure_rotated(rows_affected: u64) -> Result<(), AppError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Invalid refresh token".into()))
    }
}

fn subject(user: &User) -> Subject<'_> {
    Subject {
        user_id: user.id,
        username: &user.username,
        role: user.role_id,
        employee_id: user.employee_id,
    }
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Register a user (admin only)
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Invalid username, password or role"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Username already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Username required and password must have at least 8 characters".into(),
        ));
    }
    let role = Role::from_id(user.role_id)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown role id {}", user.role_id)))?;

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    sqlx::query("INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)")
        .bind(&username)
        .bind(hashed)
        .bind(role.id())
        .bind(user.employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::from_insert(e, "Username already exists"))?;

    info!(%username, %role, created_by = auth.user_id, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully"
    })))
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::BadRequest("Username or password required".into()));
    }

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Database error while fetching user");
        AppError::Database(e)
    })?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::Unauthorized("Invalid credentials".into())
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let pair = issue_pair(pool.get_ref(), &config, &subject(&db_user)).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    Ok(HttpResponse::Ok().json(pair))
}

/// Rotate a refresh token (send it as the bearer token)
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Missing, revoked or expired refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = refresh_claims(&req, &config)
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    // the conditional update lets exactly one concurrent refresh win
    let revoked = sqlx::query(REVOKE_LIVE_TOKEN)
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?
        .rows_affected();
    ensure_rotated(revoked)?;

    // role or employee link may have changed since the token was issued
    let db_user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role_id, employee_id FROM users WHERE id = ?",
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".into()))?;

    let pair = issue_pair(pool.get_ref(), &config, &subject(&db_user)).await?;

    debug!(user_id = claims.user_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(pair))
}

/// Revoke a refresh token (send it as the bearer token)
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    // Idempotent: anything that is not a live refresh token is simply ignored
    if let Some(claims) = refresh_claims(&req, &config) {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await?;
        info!(user_id = claims.user_id, "Logged out");
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Identity behind the current access token
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses((status = 200, description = "Current user", body = Object, example = json!({
        "user_id": 1, "username": "admin", "role": "admin", "employee_id": null
    }))),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "user_id": auth.user_id,
        "username": auth.username,
        "role": auth.role,
        "employee_id": auth.employee_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_refresh_wins_the_rotation() {
        assert!(ensure_rotated(1).is_ok());
        assert!(matches!(ensure_rotated(0), Err(AppError::Unauthorized(_))));
        assert!(REVOKE_LIVE_TOKEN.contains("AND revoked = 0"));
    }

    #[test]
    fn subject_comes_from_the_stored_user() {
        let user = User {
            id: 9,
            username: "cajero".into(),
            password: String::new(),
            role_id: 3,
            employee_id: Some(4),
        };
        let s = subject(&user);
        assert_eq!((s.user_id, s.username, s.role, s.employee_id), (9, "cajero", 3, Some(4)));
    }
}
