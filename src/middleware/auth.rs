use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, state::AppState};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

/// Parses `Bearer <jwt>` and validates it against `secret`.
pub fn decode_bearer(header_value: &str, secret: &str) -> Result<AuthUser, AppError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?
        .trim();

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

    Ok(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}

fn authorization(parts: &Parts) -> Result<Option<&str>, AppError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))
        })
        .transpose()
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = authorization(parts)?.ok_or(AppError::Unauthorized)?;
        decode_bearer(value, &state.config.jwt_secret)
    }
}

/// Guest checkout: no header means no user, a bad header is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match authorization(parts)? {
            Some(value) => decode_bearer(value, &state.config.jwt_secret).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn token(secret: &str, role: &str, exp_offset: Duration) -> String {
        let claims = Claims {
            sub: Uuid::nil().to_string(),
            role: role.into(),
            exp: (Utc::now() + exp_offset).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_user() {
        let header = format!("Bearer {}", token("s3cret", "admin", Duration::hours(1)));
        let user = decode_bearer(&header, "s3cret").unwrap();
        assert_eq!(user.user_id, Uuid::nil());
        assert!(user.is_admin());
        assert!(ensure_admin(&user).is_ok());
    }

    #[test]
    fn wrong_secret_or_scheme_is_unauthorized() {
        let raw = token("s3cret", "user", Duration::hours(1));
        assert!(matches!(
            decode_bearer(&format!("Bearer {raw}"), "other"),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(decode_bearer(&format!("Token {raw}"), "s3cret"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let header = format!("Bearer {}", token("s3cret", "user", Duration::hours(-2)));
        assert!(matches!(decode_bearer(&header, "s3cret"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn users_are_not_admins() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        };
        assert!(matches!(ensure_admin(&user), Err(AppError::Forbidden)));
    }
}
