//! Wire model of the volkszaehler middleware responses

use crate::types::{EntityKind, EntityTree, Tuple};
use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Exception block the middleware embeds in failed responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Exception {
    /// Exception class reported by the middleware
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
}

/// Envelope used to pick the exception out of an error response
#[derive(Debug, Deserialize)]
pub(crate) struct ExceptionEnvelope {
    #[serde(default)]
    pub exception: Option<Exception>,
}

/// Response to `/entity.json`
#[derive(Debug, Deserialize)]
pub(crate) struct EntitiesResponse {
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub exception: Option<Exception>,
}

/// Entity as delivered by the middleware
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntity {
    /// Entity UUID
    pub uuid: String,
    /// Entity type, `group` for aggregators
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Entity title
    #[serde(default)]
    pub title: String,
    /// Child entities (groups only)
    #[serde(default)]
    pub children: Vec<RawEntity>,
}

impl From<RawEntity> for EntityTree {
    fn from(raw: RawEntity) -> Self {
        let kind = if raw.kind == "group" {
            EntityKind::Group
        } else {
            EntityKind::Leaf
        };
        EntityTree {
            id: raw.uuid,
            kind,
            title: raw.title,
            children: raw.children.into_iter().map(EntityTree::from).collect(),
        }
    }
}

/// Response to `/data/<uuid>.json`
#[derive(Debug, Deserialize)]
pub(crate) struct DataResponse {
    #[serde(default)]
    pub data: Option<Data>,
    #[serde(default)]
    pub exception: Option<Exception>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Data {
    #[serde(default)]
    pub tuples: Vec<WireTuple>,
}

/// Middleware tuple `[timestamp, value, count]`
///
/// Only the first two positions are used; the count is optional.
#[derive(Debug)]
pub(crate) struct WireTuple(pub Tuple);

impl<'de> Deserialize<'de> for WireTuple {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
        if raw.len() < 2 {
            return Err(de::Error::invalid_length(raw.len(), &"at least 2 elements"));
        }

        let timestamp = raw[0]
            .as_i64()
            .or_else(|| raw[0].as_f64().map(|ts| ts as i64))
            .ok_or_else(|| de::Error::custom("tuple timestamp is not a number"))?;
        // A null value marks a gap and reads as zero
        let value = match &raw[1] {
            serde_json::Value::Null => 0.0,
            v => v
                .as_f64()
                .ok_or_else(|| de::Error::custom("tuple value is not a number"))?,
        };

        Ok(WireTuple(Tuple::new(timestamp, value as f32)))
    }
}

/// Response to `/prognosis/<uuid>.json`
#[derive(Debug, Deserialize)]
pub(crate) struct PrognosisResponse {
    #[serde(default)]
    pub prognosis: Option<Prognosis>,
    #[serde(default)]
    pub exception: Option<Exception>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Prognosis {
    #[serde(default)]
    pub consumption: f32,
}

/// Extract the exception message, if the middleware reported one
pub(crate) fn exception_message(exception: &Option<Exception>) -> Option<&str> {
    exception
        .as_ref()
        .map(|e| e.message.as_str())
        .filter(|m| !m.is_empty())
}
