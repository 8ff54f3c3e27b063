use crate::api::{actors, health, movies};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::{Modify, OpenApi};

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const ACTORS_TAG: &str = "Actors API";
pub(crate) const MOVIES_TAG: &str = "Movies API";

/// Name of the bearer security scheme referenced by every guarded route
pub(crate) const BEARER_AUTH: &str = "bearer_auth";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::index,
        health::health_check,
        health::ready_check,
        actors::list_actors,
        actors::create_actor,
        actors::update_actor,
        actors::delete_actor,
        movies::list_movies,
        movies::create_movie,
        movies::update_movie,
        movies::delete_movie,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = ACTORS_TAG, description = "Actor records"),
        (name = MOVIES_TAG, description = "Movie records"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Casting Agency API",
        description = "Actors and movies guarded by bearer token permissions",
        version = "1.0.0"
    )
)]
pub(crate) struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi
            .components
            .get_or_insert_with(Components::new)
            .add_security_scheme(
                BEARER_AUTH,
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
    }
}
