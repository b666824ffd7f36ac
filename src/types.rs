//! Core data types shared by the backend client and the query engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique series identifier (the volkszaehler entity UUID)
pub type SeriesId = String;

/// Kind of a node in the entity hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Queryable series
    Leaf,
    /// Logical grouping of other entities
    Group,
}

/// Node of the backend's entity hierarchy
///
/// Only [`EntityKind::Group`] nodes carry children. A tree is never
/// mutated after it has been fetched; every refresh produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTree {
    /// Series identifier
    pub id: SeriesId,
    /// Leaf or group
    pub kind: EntityKind,
    /// Human readable title
    pub title: String,
    /// Child nodes (groups only)
    pub children: Vec<EntityTree>,
}

impl EntityTree {
    /// Create a leaf node
    pub fn leaf(id: impl Into<SeriesId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Leaf,
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Create a group node
    pub fn group(
        id: impl Into<SeriesId>,
        title: impl Into<String>,
        children: Vec<EntityTree>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Group,
            title: title.into(),
            children,
        }
    }
}

/// Leaf entity with its hierarchy-qualified display title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntity {
    /// Series identifier
    pub id: SeriesId,
    /// Title, suffixed with the nearest enclosing group title
    pub display_title: String,
}

impl FlatEntity {
    /// Create a flat entity
    pub fn new(id: impl Into<SeriesId>, display_title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_title: display_title.into(),
        }
    }
}

/// Single backend sample
///
/// Tuples arrive in ascending timestamp order and are never re-sorted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuple {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Sample value
    pub value: f32,
}

impl Tuple {
    /// Create a tuple
    pub fn new(timestamp: i64, value: f32) -> Self {
        Self { timestamp, value }
    }
}

/// Time range of a dashboard query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Range start
    pub from: DateTime<Utc>,
    /// Range end
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Create a time range
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Range start in Unix seconds
    pub fn from_secs(&self) -> i64 {
        self.from.timestamp()
    }

    /// Range end in Unix seconds
    pub fn to_secs(&self) -> i64 {
        self.to.timestamp()
    }
}
