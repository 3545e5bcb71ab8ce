use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::{
    auth::extractors::MaybeAuthUser,
    channels::repo::{channel_profile, ChannelProfile},
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
};

#[instrument(skip(state, viewer))]
pub async fn get_channel_profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(user_name): Path<String>,
) -> ApiResult<ApiResponse<ChannelProfile>> {
    let user_name = user_name.trim().to_lowercase();
    if user_name.is_empty() {
        return Err(ApiError::bad_request("User name is missing"));
    }

    let profile = channel_profile(&state.db, &user_name, viewer.map(|v| v.id))
        .await?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        profile,
        "User channel fetched successfully",
    ))
}
