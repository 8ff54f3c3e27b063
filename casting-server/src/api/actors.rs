use crate::api::guard::{subject, Authorized, DeleteActors, GetActors, PatchActors, PostActors};
use crate::errors::ApiError;
use crate::models::{Actor, ActorPatch, NewActor};
use crate::openapi::ACTORS_TAG;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ActorList {
    success: bool,
    actors: Vec<Actor>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ActorCreated {
    success: bool,
    /// Identifier of the new actor
    created: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ActorUpdated {
    success: bool,
    actor: Actor,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ActorDeleted {
    success: bool,
    deleted: u64,
    /// Number of actors left in the catalog
    total_actors: usize,
}

#[utoipa::path(
    get,
    path = "/actors",
    tag = ACTORS_TAG,
    security(("bearer_auth" = ["get:actors"])),
    responses(
        (status = 200, description = "All actors", body = ActorList),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the get:actors permission")
    )
)]
pub(crate) async fn list_actors(
    Authorized(claims, _): Authorized<GetActors>,
    State(state): State<AppState>,
) -> Json<ActorList> {
    debug!("Listing actors for '{}'", subject(&claims));
    Json(ActorList {
        success: true,
        actors: state.catalog.actors().await,
    })
}

#[utoipa::path(
    post,
    path = "/actors",
    tag = ACTORS_TAG,
    request_body = NewActor,
    security(("bearer_auth" = ["post:actors"])),
    responses(
        (status = 200, description = "Actor created", body = ActorCreated),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the post:actors permission"),
        (status = 422, description = "Invalid actor payload")
    )
)]
pub(crate) async fn create_actor(
    Authorized(claims, _): Authorized<PostActors>,
    State(state): State<AppState>,
    payload: Result<Json<NewActor>, JsonRejection>,
) -> Result<Json<ActorCreated>, ApiError> {
    let Json(actor) = payload.map_err(|e| {
        debug!("Rejected actor payload: {}", e);
        ApiError::unprocessable()
    })?;
    let id = state.catalog.create_actor(actor).await?;
    info!("Actor {} created by '{}'", id, subject(&claims));
    Ok(Json(ActorCreated {
        success: true,
        created: id,
    }))
}

#[utoipa::path(
    patch,
    path = "/actors/{id}",
    tag = ACTORS_TAG,
    params(("id" = u64, Path, description = "Actor identifier")),
    request_body = ActorPatch,
    security(("bearer_auth" = ["patch:actors"])),
    responses(
        (status = 200, description = "Actor updated", body = ActorUpdated),
        (status = 400, description = "Invalid update payload"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the patch:actors permission"),
        (status = 404, description = "No actor with this id")
    )
)]
pub(crate) async fn update_actor(
    Authorized(claims, _): Authorized<PatchActors>,
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ActorPatch>, JsonRejection>,
) -> Result<Json<ActorUpdated>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found())?;
    let Json(patch) = payload.map_err(|e| {
        debug!("Rejected actor update: {}", e);
        ApiError::bad_request()
    })?;
    let actor = state.catalog.update_actor(id, patch).await?;
    info!("Actor {} updated by '{}'", id, subject(&claims));
    Ok(Json(ActorUpdated {
        success: true,
        actor,
    }))
}

#[utoipa::path(
    delete,
    path = "/actors/{id}",
    tag = ACTORS_TAG,
    params(("id" = u64, Path, description = "Actor identifier")),
    security(("bearer_auth" = ["delete:actors"])),
    responses(
        (status = 200, description = "Actor deleted", body = ActorDeleted),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the delete:actors permission"),
        (status = 404, description = "No actor with this id")
    )
)]
pub(crate) async fn delete_actor(
    Authorized(claims, _): Authorized<DeleteActors>,
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ActorDeleted>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found())?;
    let total_actors = state.catalog.delete_actor(id).await?;
    info!("Actor {} deleted by '{}'", id, subject(&claims));
    Ok(Json(ActorDeleted {
        success: true,
        deleted: id,
        total_actors,
    }))
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/actors", get(list_actors).post(create_actor))
        .route("/actors/{id}", patch(update_actor).delete(delete_actor))
}
