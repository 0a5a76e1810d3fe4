//! Tag invalidation driven by the mutation paths.
//!
//! Every mutation calls one of the `on_*` hooks synchronously, after the
//! store commit and before the caller sees success, so a client that
//! writes and immediately re-reads never observes pre-write data.
//!
//! Invalidation failure never rolls back the data mutation. Instead the
//! invalidator flips into degraded mode: readers bypass the cache (always
//! recompute) until a later full purge succeeds, at which point normal
//! caching resumes. Possibly-stale entries are therefore never served.

use careview_core::{TenantId, Visibility};
use careview_storage::{tenant_tag, ViewCache, ALL_ITEMS_TAG};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Computes affected tags for each mutation kind and evicts them.
#[derive(Debug)]
pub struct Invalidator<C: ViewCache> {
    cache: Arc<C>,
    /// Set when an eviction could not be confirmed; cleared by the next
    /// successful full purge.
    degraded: Arc<AtomicBool>,
}

impl<C: ViewCache> Clone for Invalidator<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            degraded: Arc::clone(&self.degraded),
        }
    }
}

impl<C: ViewCache> Invalidator<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache,
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a failed eviction is unconfirmed. Readers must bypass
    /// the cache rather than risk serving stale data.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// A base-library mutation can change any tenant's view: purge the
    /// global tag, which every entry carries.
    pub async fn on_base_item_changed(&self) {
        self.purge_all().await;
    }

    /// A tenant-local layer mutation (override or custom item) affects
    /// only that tenant's entries, in both visibility modes.
    pub async fn on_tenant_layer_changed(&self, tenant_id: TenantId) {
        self.invalidate_tenant(tenant_id).await;
    }

    /// Review-status edits are tenant-local too.
    pub async fn on_review_status_changed(&self, tenant_id: TenantId) {
        self.invalidate_tenant(tenant_id).await;
    }

    async fn invalidate_tenant(&self, tenant_id: TenantId) {
        // While degraded, the tenant-scoped eviction is not enough: other
        // entries may be stale from the earlier failure. Recover with a
        // full purge instead.
        if self.is_degraded() {
            self.purge_all().await;
            return;
        }
        for visibility in Visibility::ALL {
            let tag = tenant_tag(tenant_id, visibility);
            match self.cache.invalidate_tag(&tag).await {
                Ok(evicted) => {
                    tracing::debug!(%tag, evicted, "cache tag invalidated");
                }
                Err(err) => {
                    tracing::warn!(%tag, %err, "cache invalidation failed; degrading to bypass");
                    self.degraded.store(true, Ordering::Release);
                }
            }
        }
    }

    async fn purge_all(&self) {
        match self.cache.invalidate_tag(ALL_ITEMS_TAG).await {
            Ok(evicted) => {
                tracing::debug!(evicted, "global cache purge");
                self.degraded.store(false, Ordering::Release);
            }
            Err(err) => {
                tracing::warn!(%err, "global cache purge failed; degrading to bypass");
                self.degraded.store(true, Ordering::Release);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
