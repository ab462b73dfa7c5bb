//! `/api/friendships`: friend requests and the friend list.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use tally_core::social;
use tally_types::friendship::{Friend, FriendRequest, Friendship};
use tally_types::{unix_now, FriendshipId, UserId};

use crate::auth::CurrentUser;
use crate::dto::{
    AreFriendsResponse, FriendRequestBody, HasPendingResponse, MessageResponse, ValidJson,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_friends))
        .route("/requests", post(send_request))
        .route("/requests/pending", get(pending_received))
        .route("/requests/sent", get(pending_sent))
        .route("/requests/:id/accept", patch(accept))
        .route("/requests/:id/reject", patch(reject))
        .route("/requests/:id/block", patch(block))
        .route("/check/:user_id", get(are_friends))
        .route("/check-pending/:user_id", get(has_pending_request))
        .route("/friendship/:user_id", get(get_friendship))
        .route("/:friend_id", delete(remove_friend))
}

async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<Friend>>> {
    let conn = state.db.lock().await;
    Ok(Json(social::friends(&conn, caller.user_id)?))
}

async fn pending_received(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<FriendRequest>>> {
    let conn = state.db.lock().await;
    Ok(Json(social::pending_received(&conn, caller.user_id)?))
}

async fn pending_sent(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<FriendRequest>>> {
    let conn = state.db.lock().await;
    Ok(Json(social::pending_sent(&conn, caller.user_id)?))
}

async fn send_request(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ValidJson(req): ValidJson<FriendRequestBody>,
) -> ApiResult<(StatusCode, Json<Friendship>)> {
    let mut conn = state.db.lock().await;
    let friendship = social::send_request(&mut conn, &caller, req.addressee_id, unix_now())?;
    Ok((StatusCode::CREATED, Json(friendship)))
}

async fn accept(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(friendship_id): Path<FriendshipId>,
) -> ApiResult<Json<Friendship>> {
    let conn = state.db.lock().await;
    Ok(Json(social::accept(&conn, &caller, friendship_id, unix_now())?))
}

/// The request row is removed, so the pair may ask again later.
async fn reject(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(friendship_id): Path<FriendshipId>,
) -> ApiResult<Json<MessageResponse>> {
    let conn = state.db.lock().await;
    social::reject(&conn, &caller, friendship_id)?;
    Ok(Json(MessageResponse::new("friend request rejected")))
}

async fn block(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(friendship_id): Path<FriendshipId>,
) -> ApiResult<Json<Friendship>> {
    let conn = state.db.lock().await;
    Ok(Json(social::block(&conn, &caller, friendship_id, unix_now())?))
}

async fn remove_friend(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(friend_id): Path<UserId>,
) -> ApiResult<StatusCode> {
    let conn = state.db.lock().await;
    social::remove_friend(&conn, &caller, friend_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn are_friends(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<AreFriendsResponse>> {
    let conn = state.db.lock().await;
    let are_friends = social::are_friends(&conn, caller.user_id, user_id)?;
    Ok(Json(AreFriendsResponse { are_friends }))
}

/// Whether the caller has an unanswered request out to `user_id`.
async fn has_pending_request(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<HasPendingResponse>> {
    let conn = state.db.lock().await;
    let has_pending_request = social::has_pending_request(&conn, caller.user_id, user_id)?;
    Ok(Json(HasPendingResponse {
        has_pending_request,
    }))
}

async fn get_friendship(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Friendship>> {
    let conn = state.db.lock().await;
    social::get_friendship(&conn, caller.user_id, user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("friendship"))
}
