//! Authentication middleware
//!
//! JWT bearer authentication and permission checks

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Role allowed to do everything
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(ADMIN_ROLE)
    }

    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.is_admin() || self.permissions.contains(&permission)
    }

    /// Fail with `InsufficientPermissions` unless the permission is held
    pub fn require_permission(&self, resource: &str, action: &str) -> Result<(), AppError> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Validates the bearer token and stores the `AuthUser` in request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    let user_id = match claims.sub.parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => return unauthorized_response("Invalid user ID in token"),
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        role: claims.role,
        permissions: claims.permissions,
    });

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized_error(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_id: "Tidak memiliki otorisasi".to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error))
}

fn unauthorized_response(message: &str) -> Response {
    unauthorized_error(message).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| unauthorized_error("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn user(role: &str, permissions: &[&str]) -> AuthUser {
        AuthUser {
            user_id: 7,
            role: role.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_permission_checks() {
        assert!(user("staff", &["settings:update"]).has_permission("settings", "update"));
        assert!(!user("staff", &["settings:read"]).has_permission("settings", "update"));
        assert!(user("Admin", &[]).has_permission("settings", "update"));
        assert!(matches!(
            user("staff", &[]).require_permission("settings", "update"),
            Err(AppError::InsufficientPermissions)
        ));
    }

    #[test]
    fn test_decode_jwt_roundtrip_and_wrong_secret() {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "7".to_string(),
            role: "staff".to_string(),
            permissions: vec!["settings:update".to_string()],
            exp: now + 3600,
            iat: now,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        let decoded = decode_jwt(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "7");
        assert_eq!(decoded.permissions, vec!["settings:update"]);

        assert!(decode_jwt(&token, "other").is_err());
    }
}
