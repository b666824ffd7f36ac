//! vz-grafana - Grafana SimpleJson datasource for the volkszaehler middleware
//!
//! This library translates Grafana dashboard requests into volkszaehler
//! middleware calls and reshapes the results:
//! - Concurrent fan-out of query targets with results in request order
//! - Partial failure isolation: a failing target yields empty datapoints
//! - Timestamp rounding to hour/day/month buckets
//! - Display names from a cached, flattened entity hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Backend trait and the volkszaehler HTTP client
pub mod backend;

/// Configuration management with TOML support
pub mod config;

/// Entity hierarchy flattening and the display name cache
pub mod entity;

/// Query fan-out engine and time buckets
pub mod query;

/// Grafana SimpleJson HTTP server
pub mod server;

// Re-export main types
pub use backend::{Backend, VolkszaehlerClient};
pub use config::Config;
pub use entity::EntityCache;
pub use error::{BackendError, Error, Result};
pub use query::{QueryEngine, QueryResponse, QueryTarget};
pub use types::{EntityTree, FlatEntity, TimeRange, Tuple};
