//! Tag-addressable cache for resolved effective views.
//!
//! Every cache entry is keyed by (tenant, visibility mode) and associated
//! with exactly two invalidation tags: its tenant-scoped tag and the global
//! `all-items` sentinel. A base-library mutation invalidates the global tag
//! (every tenant's view depends on the shared library); a tenant-local
//! mutation invalidates only that tenant's tags. Eviction is synchronous
//! with the mutating call, so a reader that starts after a write's success
//! never observes pre-write data.
//!
//! The tag strings are a persisted contract (external purge triggers key on
//! them) and must remain stable; see [`tags`].

pub mod tags;
pub mod view_cache;

pub use tags::{all_items_tag, tenant_tag, ViewKey, ALL_ITEMS_TAG};
pub use view_cache::{CacheConfig, CacheStats, CachedView, InMemoryViewCache, ViewCache};
