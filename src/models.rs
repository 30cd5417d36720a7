//! Shared data shapes: the flattened join row coming out of PostgreSQL and
//! the nested film document going into Elasticsearch.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Credit roles that map to a dedicated list on the film document.
///
/// Any other role value in `person_film_work` contributes nothing to the
/// role lists; the row's genre is still folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Actor,
    Writer,
    Director,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "actor" => Some(Role::Actor),
            "writer" => Some(Role::Writer),
            "director" => Some(Role::Director),
            _ => None,
        }
    }
}

/// One row of the flattened film query: the film's scalar fields plus at
/// most one person credit and one genre. Standard join fan-out means many
/// rows per film, with persons and genres repeated across the cross product.
#[derive(Debug, Clone, FromRow)]
pub struct FilmRow {
    pub fw_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub role: Option<String>,
    pub person_id: Option<Uuid>,
    pub full_name: Option<String>,
    pub genre: Option<String>,
}

/// A person credit embedded in a film document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// The denormalized document written to the search index, one per film.
///
/// Every list preserves first-seen order and is free of duplicates: person
/// lists are guarded by name (which also keeps ids unique), string lists by
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDocument {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub genre: Vec<String>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub director: Vec<String>,
}

impl FilmDocument {
    /// Start an empty document from the scalar fields of a join row.
    pub fn from_row_scalars(row: &FilmRow) -> Self {
        Self {
            id: row.fw_id,
            title: row.title.clone(),
            description: row.description.clone(),
            rating: row.rating,
            genre: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
            actors_names: Vec::new(),
            writers_names: Vec::new(),
            director: Vec::new(),
        }
    }
}
