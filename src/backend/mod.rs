//! Backend access
//!
//! The query engine talks to the time-series backend only through the
//! [`Backend`] trait. [`VolkszaehlerClient`] is the production
//! implementation speaking the volkszaehler middleware's JSON API; tests
//! substitute in-memory doubles.

mod client;
mod model;

pub use client::{ClientConfig, VolkszaehlerClient};
pub use model::{Exception, RawEntity};

use crate::error::BackendError;
use crate::types::{EntityTree, Tuple};
use async_trait::async_trait;

/// Core trait for time-series backends
///
/// Implementations must be safe for concurrent use: the query engine calls
/// them from many fan-out tasks at once.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Fetch the complete entity hierarchy (top-level nodes)
    async fn fetch_entities(&self) -> Result<Vec<EntityTree>, BackendError>;

    /// Fetch the samples of a series
    ///
    /// `from` and `to` are Unix seconds. Empty `group`/`options` mean no
    /// grouping and no option; `max_points == 0` means no point budget.
    async fn fetch_series(
        &self,
        id: &str,
        from: i64,
        to: i64,
        group: &str,
        options: &str,
        max_points: usize,
    ) -> Result<Vec<Tuple>, BackendError>;

    /// Fetch the forecast consumption of a series for `period`
    async fn fetch_forecast(&self, id: &str, period: &str) -> Result<f32, BackendError>;
}
