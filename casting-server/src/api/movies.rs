use crate::api::guard::{subject, Authorized, DeleteMovies, GetMovies, PatchMovies, PostMovies};
use crate::errors::ApiError;
use crate::models::{Movie, MoviePatch, NewMovie};
use crate::openapi::MOVIES_TAG;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct MovieList {
    success: bool,
    movies: Vec<Movie>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct MovieCreated {
    success: bool,
    created: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct MovieUpdated {
    success: bool,
    movie: Movie,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct MovieDeleted {
    success: bool,
    deleted: u64,
    total_movies: usize,
}

#[utoipa::path(
    get,
    path = "/movies",
    tag = MOVIES_TAG,
    security(("bearer_auth" = ["get:movies"])),
    responses(
        (status = 200, description = "All movies", body = MovieList),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the get:movies permission")
    )
)]
pub(crate) async fn list_movies(
    Authorized(_claims, _): Authorized<GetMovies>,
    State(state): State<AppState>,
) -> Json<MovieList> {
    Json(MovieList {
        success: true,
        movies: state.catalog.movies().await,
    })
}

#[utoipa::path(
    post,
    path = "/movies",
    tag = MOVIES_TAG,
    request_body = NewMovie,
    security(("bearer_auth" = ["post:movies"])),
    responses(
        (status = 200, description = "Movie created", body = MovieCreated),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the post:movies permission"),
        (status = 422, description = "Invalid movie payload")
    )
)]
pub(crate) async fn create_movie(
    Authorized(claims, _): Authorized<PostMovies>,
    State(state): State<AppState>,
    payload: Result<Json<NewMovie>, JsonRejection>,
) -> Result<Json<MovieCreated>, ApiError> {
    let Json(movie) = payload.map_err(|e| {
        debug!("Rejected movie payload: {}", e);
        ApiError::unprocessable()
    })?;
    let id = state.catalog.create_movie(movie).await?;
    info!("Movie {} created by '{}'", id, subject(&claims));
    Ok(Json(MovieCreated {
        success: true,
        created: id,
    }))
}

#[utoipa::path(
    patch,
    path = "/movies/{id}",
    tag = MOVIES_TAG,
    params(("id" = u64, Path, description = "Movie identifier")),
    request_body = MoviePatch,
    security(("bearer_auth" = ["patch:movies"])),
    responses(
        (status = 200, description = "Movie updated", body = MovieUpdated),
        (status = 400, description = "Invalid update payload"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the patch:movies permission"),
        (status = 404, description = "No movie with this id")
    )
)]
pub(crate) async fn update_movie(
    Authorized(claims, _): Authorized<PatchMovies>,
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<MoviePatch>, JsonRejection>,
) -> Result<Json<MovieUpdated>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found())?;
    let Json(patch) = payload.map_err(|e| {
        debug!("Rejected movie update: {}", e);
        ApiError::bad_request()
    })?;
    let movie = state.catalog.update_movie(id, patch).await?;
    info!("Movie {} updated by '{}'", id, subject(&claims));
    Ok(Json(MovieUpdated {
        success: true,
        movie,
    }))
}

#[utoipa::path(
    delete,
    path = "/movies/{id}",
    tag = MOVIES_TAG,
    params(("id" = u64, Path, description = "Movie identifier")),
    security(("bearer_auth" = ["delete:movies"])),
    responses(
        (status = 200, description = "Movie deleted", body = MovieDeleted),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token lacks the delete:movies permission"),
        (status = 404, description = "No movie with this id")
    )
)]
pub(crate) async fn delete_movie(
    Authorized(claims, _): Authorized<DeleteMovies>,
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<MovieDeleted>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::not_found())?;
    let total_movies = state.catalog.delete_movie(id).await?;
    info!("Movie {} deleted by '{}'", id, subject(&claims));
    Ok(Json(MovieDeleted {
        success: true,
        deleted: id,
        total_movies,
    }))
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", patch(update_movie).delete(delete_movie))
}
