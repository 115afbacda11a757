pub mod config;
pub mod error;
pub mod groups;
pub mod pagination;
pub mod store;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use draw_core::{
    can_manage, can_redistribute, can_view_own_result, Actor, Assignment, Group, GroupId,
    ResultsView, UserId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
use error::{ApiError, ApiResult};
use groups::GroupRepository;
use pagination::{Page, PageParams};
use store::{JsonFileStore, MemoryStore, RecordStore, StoreError};
use users::{PublicProfile, User, UserRepository};

#[derive(Clone)]
pub struct AppState {
    groups: Arc<GroupRepository>,
    users: Arc<UserRepository>,
    admin_password: Arc<str>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory("changeme")
    }
}

impl AppState {
    pub fn in_memory(admin_password: &str) -> Self {
        Self {
            groups: Arc::new(GroupRepository::new(Arc::new(MemoryStore::<Group>::default()))),
            users: Arc::new(UserRepository::new(Arc::new(MemoryStore::<User>::default()))),
            admin_password: Arc::from(admin_password),
        }
    }

    /// File-backed state under `dir`. Both collections are read once so a
    /// corrupt file fails startup instead of the first request.
    pub async fn with_persistence(
        dir: impl Into<PathBuf>,
        admin_password: &str,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        let groups: Arc<dyn RecordStore<Group>> =
            Arc::new(JsonFileStore::<Group>::new(dir.join("groups.json")));
        let users: Arc<dyn RecordStore<User>> =
            Arc::new(JsonFileStore::<User>::new(dir.join("users.json")));

        let group_count = groups.load_all().await?.records.len();
        let user_count = users.load_all().await?.records.len();
        tracing::info!(
            dir = %dir.display(),
            groups = group_count,
            users = user_count,
            "loaded persisted collections"
        );

        Ok(Self {
            groups: Arc::new(GroupRepository::new(groups)),
            users: Arc::new(UserRepository::new(users)),
            admin_password: Arc::from(admin_password),
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        match &config.data_dir {
            Some(dir) => Self::with_persistence(dir, &config.admin_password).await,
            None => Ok(Self::in_memory(&config.admin_password)),
        }
    }

    /// The caller as established by the upstream authenticator: `x-user-id`
    /// names the user, a matching `x-admin-password` grants site-admin rights.
    fn actor(&self, headers: &HeaderMap) -> ApiResult<Actor> {
        let id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .ok_or(ApiError::Unauthorized)?;

        let is_admin = match headers.get("x-admin-password").and_then(|v| v.to_str().ok()) {
            Some(password) if password == &*self.admin_password => true,
            Some(_) => {
                tracing::warn!(user_id = id, "invalid admin password");
                false
            }
            None => false,
        };

        Ok(Actor { id, is_admin })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(register_user).get(list_users))
        .route("/users/me", patch(update_profile))
        .route("/users/:id", delete(delete_user))
        .route("/groups", post(create_group).get(list_groups))
        .route("/groups/mine", get(my_groups))
        .route("/groups/:id", get(get_group).delete(delete_group))
        .route("/groups/:id/participants", patch(add_participant))
        .route("/groups/:id/draw", post(run_draw))
        .route("/groups/:id/redistribute", post(redistribute))
        .route("/groups/:id/results", get(get_results))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct GroupView {
    id: GroupId,
    name: String,
    admin_id: UserId,
    participants: Vec<UserId>,
    status: &'static str,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drawn_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignment: Option<Assignment>,
}

/// `reveal` controls whether the pairings are included.
fn to_view(group: &Group, reveal: bool) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name.clone(),
        admin_id: group.admin_id,
        participants: group.participants.clone(),
        status: status_label(group),
        created_at: group.created_at,
        drawn_at: group.drawn_at(),
        assignment: group.assignment().filter(|_| reveal).cloned(),
    }
}

#[derive(Serialize)]
struct GroupSummary {
    id: GroupId,
    name: String,
    admin_id: UserId,
    participants: Vec<UserId>,
    status: &'static str,
    created_at: DateTime<Utc>,
}

fn to_summary(group: Group) -> GroupSummary {
    GroupSummary {
        status: status_label(&group),
        id: group.id,
        name: group.name,
        admin_id: group.admin_id,
        participants: group.participants,
        created_at: group.created_at,
    }
}

fn status_label(group: &Group) -> &'static str {
    if group.is_open() {
        "open"
    } else {
        "closed"
    }
}

fn require_site_admin(actor: &Actor) -> ApiResult<()> {
    if actor.is_admin {
        Ok(())
    } else {
        tracing::warn!(user_id = actor.id, "site admin route refused");
        Err(ApiError::Forbidden)
    }
}

async fn managed_group(state: &AppState, group_id: GroupId, actor: &Actor) -> ApiResult<Group> {
    let group = state.groups.find(group_id).await?;
    if !can_manage(&group, actor) {
        tracing::warn!(group_id, user_id = actor.id, "group management refused");
        return Err(ApiError::Forbidden);
    }
    Ok(group)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.users.create(&payload.name, &payload.email).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<User>>> {
    require_site_admin(&state.actor(&headers)?)?;
    let users = state.users.list_all().await?;
    Ok(Json(params.paginate(users)?))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    email: Option<String>,
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let actor = state.actor(&headers)?;
    let user = state
        .users
        .update(actor.id, payload.name.as_deref(), payload.email.as_deref())
        .await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Value>> {
    require_site_admin(&state.actor(&headers)?)?;
    state.users.delete(user_id).await?;
    Ok(Json(json!({ "message": "user deleted" })))
}

#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
}

async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<GroupView>)> {
    let actor = state.actor(&headers)?;
    let group = state.groups.create(&payload.name, actor.id).await?;
    Ok((StatusCode::CREATED, Json(to_view(&group, true))))
}

async fn list_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<GroupSummary>>> {
    require_site_admin(&state.actor(&headers)?)?;
    let groups = state.groups.list_all().await?;
    Ok(Json(params.paginate(groups.into_iter().map(to_summary).collect())?))
}

async fn my_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<GroupSummary>>> {
    let actor = state.actor(&headers)?;
    let groups = state.groups.list_for_member(actor.id).await?;
    Ok(Json(params.paginate(groups.into_iter().map(to_summary).collect())?))
}

async fn get_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
) -> ApiResult<Json<GroupView>> {
    let actor = state.actor(&headers)?;
    let group = state.groups.find(group_id).await?;
    if can_manage(&group, &actor) {
        Ok(Json(to_view(&group, true)))
    } else if can_view_own_result(&group, &actor) {
        Ok(Json(to_view(&group, false)))
    } else {
        Err(ApiError::Forbidden)
    }
}

#[derive(Deserialize)]
struct AddParticipantRequest {
    user_id: UserId,
}

async fn add_participant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
    Json(payload): Json<AddParticipantRequest>,
) -> ApiResult<Json<GroupView>> {
    let actor = state.actor(&headers)?;
    managed_group(&state, group_id, &actor).await?;
    state.users.find(payload.user_id).await?;

    let group = state
        .groups
        .add_participant(group_id, payload.user_id)
        .await?;
    Ok(Json(to_view(&group, true)))
}

#[derive(Deserialize)]
struct DrawParams {
    seed: Option<u64>,
}

fn draw_rng(seed: Option<u64>) -> ChaCha8Rng {
    seed.map(ChaCha8Rng::seed_from_u64)
        .unwrap_or_else(ChaCha8Rng::from_entropy)
}

async fn run_draw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
    Query(params): Query<DrawParams>,
) -> ApiResult<Json<GroupView>> {
    let actor = state.actor(&headers)?;
    managed_group(&state, group_id, &actor).await?;

    let mut rng = draw_rng(params.seed);
    let group = state.groups.run_draw(group_id, &mut rng).await?;
    Ok(Json(to_view(&group, true)))
}

async fn redistribute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
    Query(params): Query<DrawParams>,
) -> ApiResult<Json<GroupView>> {
    let actor = state.actor(&headers)?;
    if !can_redistribute(&actor) {
        tracing::warn!(group_id, user_id = actor.id, "redistribution refused");
        return Err(ApiError::Forbidden);
    }

    let mut rng = draw_rng(params.seed);
    let group = state.groups.redistribute(group_id, &mut rng).await?;
    Ok(Json(to_view(&group, true)))
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResultsResponse {
    Full(Assignment),
    Own { receiver: PublicProfile },
}

async fn get_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
) -> ApiResult<Json<ResultsResponse>> {
    let actor = state.actor(&headers)?;
    let response = match state
        .groups
        .results_view(group_id, actor.id, actor.is_admin)
        .await?
    {
        ResultsView::Full(assignment) => ResultsResponse::Full(assignment),
        ResultsView::Own { receiver } => ResultsResponse::Own {
            receiver: state.users.public_profile(receiver).await?,
        },
    };
    Ok(Json(response))
}

async fn delete_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(group_id): Path<GroupId>,
) -> ApiResult<Json<Value>> {
    let actor = state.actor(&headers)?;
    managed_group(&state, group_id, &actor).await?;
    state.groups.delete(group_id).await?;
    Ok(Json(json!({ "message": "group deleted" })))
}
