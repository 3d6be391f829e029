// HTTP surface: thin handlers that resolve the acting user, dispatch to a
// service, and hand the result to the view assembler.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    auth::CurrentUser,
    error::{AppError, AppResult},
    models::Post,
    services::{
        content::{FeedQuery, PostInput},
        identity::{CreateUserInput, UpdateUserInput, UserQuery},
        social::RecommendationQuery,
        ContentService, IdentityService, SocialService,
    },
    views::{PostDetails, PostList, TokenResponse, UserList, UserMinimal, UserPublic, ViewAssembler},
};

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

fn identity(state: &AppState) -> IdentityService {
    IdentityService::new(state.store.clone(), state.security.clone())
}

fn social(state: &AppState) -> SocialService {
    SocialService::new(state.store.clone())
}

fn content(state: &AppState) -> ContentService {
    ContentService::new(state.store.clone())
}

fn views(state: &AppState) -> ViewAssembler {
    ViewAssembler::new(state.store.clone())
}

// --- auth ---

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<TokenResponse>> {
    let token = identity(&state)
        .authenticate(&input.username, &input.password)
        .await?;
    Ok(Json(TokenResponse {
        access_token: token,
    }))
}

// --- users ---

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<UserPublic>)> {
    let user = identity(&state).create_user(input).await?;
    // A fresh account is its own viewer.
    let view = views(&state).user_public(&user, &user).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserList>> {
    let users = identity(&state).list_users(query).await?;
    Ok(Json(UserList {
        users: users.iter().map(UserMinimal::from_user).collect(),
    }))
}

async fn me(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Json<UserPublic>> {
    let view = views(&state).user_public(&viewer, &viewer).await?;
    Ok(Json(view))
}

async fn get_user_by_username(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<UserPublic>> {
    let user = identity(&state).get_user_by_username(&username).await?;
    let view = views(&state).user_public(&user, &viewer).await?;
    Ok(Json(view))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<UserPublic>> {
    let id = parse_user_id(&id)?;
    let user = identity(&state).update_user(id, input).await?;
    let view = views(&state).user_public(&user, &viewer).await?;
    Ok(Json(view))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_user_id(&id)?;
    identity(&state).delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /users/{username} and PUT/DELETE /users/{id} share one route pattern;
// the id-addressed handlers parse the segment themselves.
fn parse_user_id(segment: &str) -> AppResult<i64> {
    segment
        .parse()
        .map_err(|_| AppError::NotFound("User not found".to_string()))
}

// --- social graph ---

async fn follow(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserPublic>> {
    let target = social(&state).follow(&viewer, id).await?;
    let view = views(&state).user_public(&target, &viewer).await?;
    Ok(Json(view))
}

async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserPublic>> {
    let target = social(&state).unfollow(&viewer, id).await?;
    let view = views(&state).user_public(&target, &viewer).await?;
    Ok(Json(view))
}

async fn recommendations(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<Vec<UserMinimal>>> {
    let users = social(&state).recommendations(&viewer, query).await?;
    Ok(Json(users))
}

// --- posts ---

async fn feed(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<PostList>> {
    let nodes = content(&state).list_feed(query).await?;
    let assembler = views(&state);
    let mut posts = Vec::with_capacity(nodes.len());
    for node in &nodes {
        posts.push(assembler.post_details(node, &viewer).await?);
    }
    Ok(Json(PostList { posts }))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Json(input): Json<PostInput>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = content(&state).create_post(&viewer, &input.content).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetails>> {
    let node = content(&state).get_post(id).await?;
    let details = views(&state).post_details(&node, &viewer).await?;
    Ok(Json(details))
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<PostInput>,
) -> AppResult<Json<PostDetails>> {
    let node = content(&state)
        .update_post(&viewer, id, &input.content)
        .await?;
    let details = views(&state).post_details(&node, &viewer).await?;
    Ok(Json(details))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(_viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    content(&state).delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn comment_post(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<PostInput>,
) -> AppResult<Json<PostDetails>> {
    let parent = content(&state)
        .create_comment(&viewer, id, &input.content)
        .await?;
    let details = views(&state).post_details(&parent, &viewer).await?;
    Ok(Json(details))
}

async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetails>> {
    let node = content(&state).toggle_like(&viewer, id).await?;
    let details = views(&state).post_details(&node, &viewer).await?;
    Ok(Json(details))
}

async fn toggle_dislike(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetails>> {
    let node = content(&state).toggle_dislike(&viewer, id).await?;
    let details = views(&state).post_details(&node, &viewer).await?;
    Ok(Json(details))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/users", post(create_user).get(list_users))
        .route("/users/me", get(me))
        .route("/users/recommendations", get(recommendations))
        .route("/users/follow/{id}", post(follow))
        .route("/users/unfollow/{id}", post(unfollow))
        .route(
            "/users/{username}",
            get(get_user_by_username).put(update_user).delete(delete_user),
        )
        .route("/posts/feed", get(feed))
        .route("/posts", post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/comment", post(comment_post))
        .route("/posts/{id}/toggle-like", post(toggle_like))
        .route("/posts/{id}/toggle-dislike", post(toggle_dislike))
        .with_state(state)
}
