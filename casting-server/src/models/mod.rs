use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Actor {
    /// Identifier assigned by the catalog
    pub id: u64,
    /// Actor's full name
    pub name: String,
    /// Age in years
    pub age: Option<u32>,
    pub gender: Option<String>,
}

/// Payload for creating an actor
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct NewActor {
    /// Actor's full name, must not be blank
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// Partial update of an actor, absent fields are left unchanged
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Default)]
pub struct ActorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Movie {
    /// Identifier assigned by the catalog
    pub id: u64,
    pub title: String,
    /// Year of release
    pub release_date: Option<i32>,
}

/// Payload for creating a movie
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct NewMovie {
    /// Movie title, must not be blank
    pub title: String,
    #[serde(default)]
    pub release_date: Option<i32>,
}

/// Partial update of a movie, absent fields are left unchanged
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Default)]
pub struct MoviePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<i32>,
}
