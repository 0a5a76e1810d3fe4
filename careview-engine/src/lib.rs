//! CAREVIEW Engine - Effective-View Resolution
//!
//! The algorithmic core of the platform: merges the shared base library,
//! tenant custom items, tenant overrides, and review status into each
//! tenant's effective view, served through the tag-addressable cache in
//! `careview-storage` and kept correct by synchronous invalidation.
//!
//! - [`resolver`]: the pure layering function.
//! - [`partition`]: review-state partitioning for dashboards.
//! - [`invalidator`]: tag eviction on every mutation path, degrading to
//!   cache bypass on failure.
//! - [`engine`]: the [`ViewEngine`] facade exposing the inbound operations.

pub mod engine;
pub mod invalidator;
pub mod partition;
pub mod resolver;

pub use engine::{OverrideUpdate, ViewEngine};
pub use invalidator::Invalidator;
pub use partition::{partition, status_index, ReviewCounts, ReviewPartition, StatusIndex};
pub use resolver::{orphaned_overrides, resolve_effective};
