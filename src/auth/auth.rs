use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn extract(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // Set by auth_middleware on protected scopes
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = bearer(req).ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Unauthorized("Configuration unavailable".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Access token required".into()));
    }

    let role = Role::from_id(claims.role).ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
    })
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(extract(req).map_err(actix_web::Error::from))
    }
}

impl AuthUser {
    /// Passes when the user holds one of `roles`. Admin always passes.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.role == Role::Admin || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require_any(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id: None,
        }
    }

    #[test]
    fn admin_always_passes() {
        assert!(user(Role::Admin).require_any(&[Role::Ventas]).is_ok());
        assert!(user(Role::Admin).require_admin().is_ok());
    }

    #[test]
    fn other_roles_need_to_be_listed() {
        assert!(user(Role::Rrhh).require_any(&[Role::Rrhh, Role::Finanzas]).is_ok());
        assert!(matches!(
            user(Role::Ventas).require_any(&[Role::Rrhh]),
            Err(AppError::Forbidden(_))
        ));
        assert!(user(Role::Rrhh).require_admin().is_err());
    }
}
