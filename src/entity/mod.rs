//! Entity hierarchy handling
//!
//! The volkszaehler middleware exposes its channels as a tree of groups and
//! leaves. Grafana only understands a flat list of series, so the tree is
//! flattened into display titles and kept in an [`EntityCache`] that the
//! query engine consults when naming its results.

mod cache;
mod flatten;

pub use cache::EntityCache;
pub use flatten::flatten;
