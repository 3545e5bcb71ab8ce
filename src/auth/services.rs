use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo_types::{PublicUser, User};
use crate::error::{ApiError, ApiResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Sign an access/refresh pair and persist the refresh token onto the user
/// row. The single write per login; overwrites any previous token.
pub async fn issue_session(
    db: &PgPool,
    keys: &JwtKeys,
    user_id: Uuid,
) -> ApiResult<(String, String)> {
    let access_token = keys.sign_access(user_id)?;
    let refresh_token = keys.sign_refresh(user_id)?;
    User::set_refresh_token(db, user_id, Some(&refresh_token)).await?;
    Ok((access_token, refresh_token))
}

/// Verify credentials and open a session.
pub async fn login(
    db: &PgPool,
    keys: &JwtKeys,
    user_name: Option<&str>,
    email: Option<&str>,
    password: &str,
) -> ApiResult<(PublicUser, String, String)> {
    if user_name.is_none() && email.is_none() {
        return Err(ApiError::bad_request("User name or email is required"));
    }

    let user = User::find_by_identifier(db, user_name, email)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist. Please register yourself"))?;

    if !verify_password(password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let (access_token, refresh_token) = issue_session(db, keys, user.id).await?;
    info!(user_id = %user.id, user_name = %user.user_name, "user logged in");
    Ok((PublicUser::from(user), access_token, refresh_token))
}

/// Clear the stored refresh token. Idempotent.
pub async fn logout(db: &PgPool, user_id: Uuid) -> ApiResult<()> {
    User::set_refresh_token(db, user_id, None).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// A presented refresh token is current only if it exactly equals the value
/// stored for the user. Rotation overwrites that value and logout clears it,
/// so superseded tokens fail here even while still cryptographically valid.
fn ensure_current(presented: &str, stored: Option<&str>) -> ApiResult<()> {
    if stored != Some(presented) {
        return Err(ApiError::unauthorized(
            "Refresh token is expired or has been revoked",
        ));
    }
    Ok(())
}

/// Rotate a token pair presented via refresh token.
///
/// The presented token must verify cryptographically AND equal the value
/// stored for the user. The equality check is what makes logout and rotation
/// revoke tokens that are otherwise still valid.
pub async fn refresh_session(
    db: &PgPool,
    keys: &JwtKeys,
    presented: &str,
) -> ApiResult<(String, String)> {
    if presented.is_empty() {
        return Err(ApiError::unauthorized("Unauthorized access"));
    }

    let claims = keys
        .verify_refresh(presented)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user = User::find_by_id(db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    ensure_current(presented, user.refresh_token.as_deref())?;

    let pair = issue_session(db, keys, user.id).await?;
    info!(user_id = %user.id, "refresh token rotated");
    Ok(pair)
}

/// Verify the current password and store a new hash.
pub async fn change_password(
    db: &PgPool,
    user_id: Uuid,
    old_password: &str,
    new_password: &str,
) -> ApiResult<()> {
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    if !verify_password(old_password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Incorrect password"));
    }

    let hash = hash_password(new_password)?;
    User::set_password_hash(db, user_id, &hash).await?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}
