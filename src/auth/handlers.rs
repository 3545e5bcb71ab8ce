use axum::{
    extract::{FromRef, Multipart, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE},
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, RefreshRequest,
            TokenPairResponse, UpdateAccountRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::hash_password,
        repo_types::{PublicUser, User},
        services::{self, is_valid_email},
    },
    error::{ApiError, ApiResult},
    media::{self, TempFile},
    response::ApiResponse,
    state::AppState,
};

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(e.to_string())
}

/// Map a failed write to Conflict when it tripped a unique constraint, and to
/// a generic Internal error otherwise.
fn db_conflict(e: sqlx::Error, message: &str) -> ApiError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => ApiError::conflict(message),
        _ => {
            error!(error = %e, "database write failed");
            ApiError::internal("Something went wrong")
        }
    }
}

async fn spool_field(
    state: &AppState,
    field: axum::extract::multipart::Field<'_>,
) -> ApiResult<TempFile> {
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let data = field.bytes().await.map_err(bad_multipart)?;
    Ok(media::store_temp(&state.config.upload_dir, data, &content_type).await?)
}

/// Pull a single named file out of a multipart body, spooled to disk.
async fn file_field(
    state: &AppState,
    mp: &mut Multipart,
    field_name: &str,
) -> ApiResult<Option<TempFile>> {
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        if field.name() == Some(field_name) {
            return Ok(Some(spool_field(state, field).await?));
        }
    }
    Ok(None)
}

fn token_cookies(
    keys: &JwtKeys,
    access_token: &str,
    refresh_token: &str,
) -> ApiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        cookies::auth_cookie(ACCESS_COOKIE, access_token, keys.access_ttl)?,
    );
    headers.append(
        SET_COOKIE,
        cookies::auth_cookie(REFRESH_COOKIE, refresh_token, keys.refresh_ttl)?,
    );
    Ok(headers)
}

fn cleared_cookies() -> ApiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, cookies::expired_cookie(ACCESS_COOKIE)?);
    headers.append(SET_COOKIE, cookies::expired_cookie(REFRESH_COOKIE)?);
    Ok(headers)
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let mut user_name: Option<String> = None;
    let mut email: Option<String> = None;
    let mut full_name: Option<String> = None;
    let mut password: Option<String> = None;
    let mut avatar: Option<TempFile> = None;
    let mut cover_image: Option<TempFile> = None;

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        match name.as_str() {
            "userName" => user_name = Some(field.text().await.map_err(bad_multipart)?),
            "email" => email = Some(field.text().await.map_err(bad_multipart)?),
            "fullName" => full_name = Some(field.text().await.map_err(bad_multipart)?),
            "password" => password = Some(field.text().await.map_err(bad_multipart)?),
            "avatar" => avatar = Some(spool_field(&state, field).await?),
            "coverImage" => cover_image = Some(spool_field(&state, field).await?),
            _ => {}
        }
    }

    let required = |v: Option<String>| -> ApiResult<String> {
        match v.map(|s| s.trim().to_string()) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(ApiError::bad_request("All fields are required")),
        }
    };
    let user_name = required(user_name)?.to_lowercase();
    let email = required(email)?.to_lowercase();
    let full_name = required(full_name)?;
    let password = required(password)?;

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }
    if password.len() < 8 {
        return Err(ApiError::bad_request("Password too short"));
    }

    if User::exists(&state.db, &user_name, &email).await? {
        warn!(user_name = %user_name, "registration for existing user");
        return Err(ApiError::conflict("User already exists"));
    }

    // The avatar upload must succeed before anything is written; a failed
    // upload leaves no partial user row behind.
    let avatar = avatar.ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;
    let avatar_url = media::upload(&*state.storage, avatar)
        .await
        .ok_or_else(|| ApiError::bad_request("Avatar file is required"))?;

    let cover_image_url = match cover_image {
        Some(tmp) => media::upload(&*state.storage, tmp).await,
        None => None,
    };

    let password_hash = hash_password(&password)?;
    let user = User::create(
        &state.db,
        &user_name,
        &email,
        &full_name,
        &password_hash,
        &avatar_url,
        cover_image_url.as_deref(),
    )
    .await
    .map_err(|e| db_conflict(e, "User already exists"))?;

    info!(user_id = %user.id, user_name = %user.user_name, "user registered");
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        PublicUser::from(user),
        "User registered successfully",
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    // A blank identifier is the same as an absent one.
    let user_name = payload
        .user_name
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let email = payload
        .email
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let keys = JwtKeys::from_ref(&state);
    let (user, access_token, refresh_token) = services::login(
        &state.db,
        &keys,
        user_name.as_deref(),
        email.as_deref(),
        &payload.password,
    )
    .await?;

    let headers = token_cookies(&keys, &access_token, &refresh_token)?;
    Ok((
        headers,
        ApiResponse::new(
            StatusCode::OK,
            AuthResponse {
                user,
                access_token,
                refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

#[instrument(skip(state, identity))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<impl IntoResponse> {
    services::logout(&state.db, identity.id).await?;
    Ok((
        cleared_cookies()?,
        ApiResponse::new(StatusCode::OK, serde_json::Value::Null, "User logged out"),
    ))
}

#[instrument(skip(state, headers, body))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<impl IntoResponse> {
    let presented = cookies::get_cookie(&headers, REFRESH_COOKIE)
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized access"))?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) =
        services::refresh_session(&state.db, &keys, &presented).await?;

    let headers = token_cookies(&keys, &access_token, &refresh_token)?;
    Ok((
        headers,
        ApiResponse::new(
            StatusCode::OK,
            TokenPairResponse {
                access_token,
                refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

#[instrument(skip(state, identity, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    services::change_password(
        &state.db,
        identity.id,
        &payload.old_password,
        &payload.new_password,
    )
    .await?;
    Ok(ApiResponse::new(
        StatusCode::OK,
        serde_json::Value::Null,
        "Password changed successfully",
    ))
}

#[instrument(skip(identity))]
pub async fn current_user(AuthUser(identity): AuthUser) -> ApiResult<ApiResponse<PublicUser>> {
    Ok(ApiResponse::new(
        StatusCode::OK,
        identity,
        "Current user fetched successfully",
    ))
}

#[instrument(skip(state, identity, payload))]
pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let full_name = payload.full_name.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    if full_name.is_empty() || email.is_empty() {
        return Err(ApiError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }

    // The new email can collide with another account's.
    let user = User::update_details(&state.db, identity.id, &full_name, &email)
        .await
        .map_err(|e| db_conflict(e, "Email already in use"))?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        PublicUser::from(user),
        "Account details updated successfully",
    ))
}

#[instrument(skip(state, identity, mp))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mut mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let tmp = file_field(&state, &mut mp, "avatar")
        .await?
        .ok_or_else(|| ApiError::bad_request("Avatar file is missing"))?;

    let url = media::upload(&*state.storage, tmp)
        .await
        .ok_or_else(|| ApiError::bad_request("Error while updating avatar"))?;

    let user = User::set_avatar(&state.db, identity.id, &url)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        PublicUser::from(user),
        "Avatar image updated successfully",
    ))
}

#[instrument(skip(state, identity, mp))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    mut mp: Multipart,
) -> ApiResult<ApiResponse<PublicUser>> {
    let tmp = file_field(&state, &mut mp, "coverImage")
        .await?
        .ok_or_else(|| ApiError::bad_request("Cover image file is missing"))?;

    let url = media::upload(&*state.storage, tmp)
        .await
        .ok_or_else(|| ApiError::bad_request("Error while updating cover image"))?;

    let user = User::set_cover_image(&state.db, identity.id, &url)
        .await?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        PublicUser::from(user),
        "Cover image updated successfully",
    ))
}
