use crate::models::{Actor, ActorPatch, Movie, MoviePatch, NewActor, NewMovie};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{0} {1} not found")]
    NotFound(&'static str, u64),
    #[error("invalid {0}: {1}")]
    InvalidRecord(&'static str, String),
    #[error("invalid {0} update: {1}")]
    InvalidUpdate(&'static str, String),
}

/// Longest accepted actor name or movie title, in characters
pub const MAX_TEXT_LEN: usize = 80;

/// Rows of one record type keyed by id. Ids are never reused.
struct Records<T> {
    next_id: u64,
    rows: BTreeMap<u64, T>,
}

impl<T: Clone> Records<T> {
    fn new() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }

    fn list(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }

    fn insert(&mut self, build: impl FnOnce(u64) -> T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.insert(id, build(id));
        id
    }
}

/// In-memory store of actors and movies.
pub struct Catalog {
    actors: RwLock<Records<Actor>>,
    movies: RwLock<Records<Movie>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            actors: RwLock::new(Records::new()),
            movies: RwLock::new(Records::new()),
        }
    }

    pub async fn actors(&self) -> Vec<Actor> {
        self.actors.read().await.list()
    }

    pub async fn create_actor(&self, actor: NewActor) -> Result<u64, CatalogError> {
        if let Err(reason) = check_text("name", &actor.name) {
            return Err(CatalogError::InvalidRecord("actor", reason));
        }

        let id = self.actors.write().await.insert(|id| Actor {
            id,
            name: actor.name,
            age: actor.age,
            gender: actor.gender,
        });
        Ok(id)
    }

    pub async fn update_actor(&self, id: u64, patch: ActorPatch) -> Result<Actor, CatalogError> {
        let mut actors = self.actors.write().await;
        let actor = actors
            .rows
            .get_mut(&id)
            .ok_or(CatalogError::NotFound("actor", id))?;

        if let Some(Err(reason)) = patch.name.as_deref().map(|name| check_text("name", name)) {
            return Err(CatalogError::InvalidUpdate("actor", reason));
        }
        if let Some(name) = patch.name {
            actor.name = name;
        }
        if let Some(age) = patch.age {
            actor.age = Some(age);
        }
        if let Some(gender) = patch.gender {
            actor.gender = Some(gender);
        }
        Ok(actor.clone())
    }

    /// Removes an actor and returns how many remain.
    pub async fn delete_actor(&self, id: u64) -> Result<usize, CatalogError> {
        let mut actors = self.actors.write().await;
        actors
            .rows
            .remove(&id)
            .ok_or(CatalogError::NotFound("actor", id))?;
        Ok(actors.rows.len())
    }

    pub async fn movies(&self) -> Vec<Movie> {
        self.movies.read().await.list()
    }

    pub async fn create_movie(&self, movie: NewMovie) -> Result<u64, CatalogError> {
        if let Err(reason) = check_text("title", &movie.title) {
            return Err(CatalogError::InvalidRecord("movie", reason));
        }

        let id = self.movies.write().await.insert(|id| Movie {
            id,
            title: movie.title,
            release_date: movie.release_date,
        });
        Ok(id)
    }

    pub async fn update_movie(&self, id: u64, patch: MoviePatch) -> Result<Movie, CatalogError> {
        let mut movies = self.movies.write().await;
        let movie = movies
            .rows
            .get_mut(&id)
            .ok_or(CatalogError::NotFound("movie", id))?;

        if let Some(Err(reason)) = patch.title.as_deref().map(|title| check_text("title", title)) {
            return Err(CatalogError::InvalidUpdate("movie", reason));
        }
        if let Some(title) = patch.title {
            movie.title = title;
        }
        if let Some(release_date) = patch.release_date {
            movie.release_date = Some(release_date);
        }
        Ok(movie.clone())
    }

    /// Removes a movie and returns how many remain.
    pub async fn delete_movie(&self, id: u64) -> Result<usize, CatalogError> {
        let mut movies = self.movies.write().await;
        movies
            .rows
            .remove(&id)
            .ok_or(CatalogError::NotFound("movie", id))?;
        Ok(movies.rows.len())
    }
}

/// Names and titles must be non-blank and at most [`MAX_TEXT_LEN`] characters.
fn check_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else if value.chars().count() > MAX_TEXT_LEN {
        Err(format!("{field} is longer than {MAX_TEXT_LEN} characters"))
    } else {
        Ok(())
    }
}
