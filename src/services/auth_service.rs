use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    domain::otp::{self, OtpKind},
    dto::auth::{
        Claims, LoginRequest, LoginResponse, OtpSent, RegisterRequest, ResendOtpRequest,
        VerifyOtpRequest,
    },
    entity::{
        Users,
        users::{ActiveModel as UserActive, Column as UserCol, Model as UserModel},
    },
    error::{AppError, AppResult, ValidationError},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const TOKEN_TTL_HOURS: i64 = 24;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    let RegisterRequest {
        name,
        email,
        password,
    } = payload;
    let email = normalize_email(&email);
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField("name").into());
    }
    if !email.contains('@') {
        return Err(ValidationError::Invalid("email is not valid".into()).into());
    }
    if password.len() < 6 {
        return Err(ValidationError::Invalid("password must be at least 6 characters".into()).into());
    }

    let existing = find_by_email(state, &email).await?;
    if existing.as_ref().is_some_and(|u| u.is_verified) {
        return Err(AppError::Conflict("Email is already taken".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let now = Utc::now();
    let grant = otp::issue(OtpKind::Initial, &state.config.otp, now, &mut rand::thread_rng());

    // an unverified account is re-used so a lost OTP does not lock the email
    let user = match existing {
        Some(model) => {
            let mut active: UserActive = model.into();
            active.name = Set(name.trim().to_string());
            active.password_hash = Set(password_hash);
            active.otp = Set(Some(grant.code.clone()));
            active.otp_expires = Set(Some(grant.expires_at.into()));
            active.updated_at = Set(now.into());
            active.update(&state.orm).await?
        }
        None => {
            UserActive {
                id: Set(Uuid::new_v4()),
                name: Set(name.trim().to_string()),
                email: Set(email.clone()),
                password_hash: Set(password_hash),
                role: Set("user".into()),
                is_verified: Set(false),
                otp: Set(Some(grant.code.clone())),
                otp_expires: Set(Some(grant.expires_at.into())),
                loyalty_points: Set(0),
                is_student_verified: Set(false),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&state.orm)
            .await?
        }
    };

    state
        .notifier
        .send_otp(&user.email, &grant.code, OtpKind::Initial, state.config.otp.ttl_minutes)
        .await?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        user.id,
        serde_json::json!({ "email": user.email }),
    )
    .await;

    Ok(ApiResponse::success(
        "Registration successful. Please verify the OTP sent to your email.",
        OtpSent {
            email: user.email,
            expires_at: grant.expires_at,
        },
        Some(Meta::empty()),
    ))
}

pub async fn verify_otp(
    state: &AppState,
    payload: VerifyOtpRequest,
) -> AppResult<ApiResponse<User>> {
    let email = normalize_email(&payload.email);
    let user = find_by_email(state, &email).await?.ok_or(AppError::NotFound)?;
    if user.is_verified {
        return Err(AppError::BadRequest("Account is already verified".into()));
    }

    otp::verify(
        user.otp.as_deref(),
        user.otp_expires.map(|dt| dt.with_timezone(&Utc)),
        &payload.otp,
        Utc::now(),
    )?;

    let mut active: UserActive = user.into();
    active.is_verified = Set(true);
    active.otp = Set(None);
    active.otp_expires = Set(None);
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    tracing::info!(user_id = %user.id, "email verified");
    Ok(ApiResponse::success(
        "Email verified successfully",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn resend_otp(
    state: &AppState,
    payload: ResendOtpRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    let email = normalize_email(&payload.email);
    let user = find_by_email(state, &email).await?.ok_or(AppError::NotFound)?;
    if user.is_verified {
        return Err(AppError::BadRequest("Account is already verified".into()));
    }

    let grant = otp::issue(
        OtpKind::Resend,
        &state.config.otp,
        Utc::now(),
        &mut rand::thread_rng(),
    );
    let mut active: UserActive = user.into();
    active.otp = Set(Some(grant.code.clone()));
    active.otp_expires = Set(Some(grant.expires_at.into()));
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    state
        .notifier
        .send_otp(
            &user.email,
            &grant.code,
            OtpKind::Resend,
            state.config.otp.resend_ttl_minutes,
        )
        .await?;

    Ok(ApiResponse::success(
        "A new OTP has been sent to your email",
        OtpSent {
            email: user.email,
            expires_at: grant.expires_at,
        },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = find_by_email(state, &normalize_email(&email))
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }
    if !user.is_verified {
        return Err(AppError::Forbidden);
    }

    let token = issue_token(&user, &state.config.jwt_secret)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        user.id,
        serde_json::json!({}),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
            user: user_from_entity(user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", user_from_entity(user), None))
}

fn issue_token(user: &UserModel, secret: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<UserModel>> {
    Ok(Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?)
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        role: model.role,
        is_verified: model.is_verified,
        loyalty_points: model.loyalty_points,
        is_student_verified: model.is_student_verified,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_bearer;

    fn account(role: &str) -> UserModel {
        let now = Utc::now();
        UserModel {
            id: Uuid::new_v4(),
            name: "Sana".into(),
            email: "sana@example.com".into(),
            password_hash: String::new(),
            role: role.into(),
            is_verified: true,
            otp: None,
            otp_expires: None,
            loyalty_points: 120,
            is_student_verified: false,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn issued_token_decodes_to_the_same_user() {
        let user = account("admin");
        let token = issue_token(&user, "test-secret").unwrap();
        let auth = decode_bearer(&format!("Bearer {token}"), "test-secret").unwrap();
        assert_eq!(auth.user_id, user.id);
        assert!(auth.is_admin());
        assert!(decode_bearer(&format!("Bearer {token}"), "other").is_err());
    }

    #[test]
    fn public_user_hides_credentials() {
        let user = user_from_entity(account("user"));
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["loyaltyPoints"], 120);
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Sana@Example.COM "), "sana@example.com");
    }
}
