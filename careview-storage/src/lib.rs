//! CAREVIEW Storage - Layer Store Trait and In-Memory Reference Implementation
//!
//! Defines the persistence abstraction for the four record families the
//! resolver consumes (base items, tenant custom items, tenant overrides,
//! review status). Real deployments implement [`LayerStore`] over a
//! relational backend; [`MemoryLayerStore`] is the in-process reference
//! implementation used by tests and light embedders.
//!
//! Multi-row writes (promotion, cascading deletes) are single methods on
//! the trait so that backends can execute them inside one transaction.

pub mod cache;

pub use cache::{
    all_items_tag, tenant_tag, CacheConfig, CacheStats, CachedView, InMemoryViewCache, ViewCache,
    ViewKey, ALL_ITEMS_TAG,
};

use async_trait::async_trait;
use careview_core::{
    AgeGroup, BaseItem, BaseItemId, CareviewError, CareviewResult, CustomItemId, EntityType,
    ItemContent, ItemKey, ReviewStatus, StorageError, TenantCustomItem, TenantId, TenantOverride,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for base items. Unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BaseItemUpdate {
    /// Replacement content
    pub content: Option<ItemContent>,
    /// New age-group classification
    pub age_group: Option<AgeGroup>,
    /// Global enablement toggle
    pub enabled: Option<bool>,
}

/// Update payload for tenant custom items. Unset fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct CustomItemUpdate {
    /// Replacement content
    pub content: Option<ItemContent>,
    /// New age-group classification
    pub age_group: Option<AgeGroup>,
    /// Tenant enablement toggle
    pub enabled: Option<bool>,
}

// ============================================================================
// PROMOTION
// ============================================================================

/// Transactional payload migrating a tenant custom item into the shared
/// library.
///
/// The engine derives the new [`BaseItem`] (content clone, fresh slug) and
/// the store applies the whole migration atomically: insert the base item,
/// re-key the review rows from the custom identity to the new base
/// identity, delete the custom row, and hide the new base item for the
/// promoting tenant when the custom item was disabled. Nothing outside the
/// transaction observes a state where neither or both identities exist.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub tenant_id: TenantId,
    pub custom_item_id: CustomItemId,
    pub base_item: BaseItem,
    /// Map the custom item's disabled state to a hidden override for the
    /// promoting tenant on the new base item.
    pub hide_for_tenant: bool,
}

// ============================================================================
// LAYER STORE TRAIT
// ============================================================================

/// Persistence for the four record families the resolver consumes.
///
/// Single-row operations map to ordinary statements; `apply_promotion`,
/// `base_item_delete`, and `custom_item_delete` are multi-row and must run
/// inside one transaction in real backends.
#[async_trait]
pub trait LayerStore: Send + Sync {
    // === Base Items ===

    /// Insert a new base item. Fails on duplicate id or slug.
    async fn base_item_insert(&self, item: &BaseItem) -> CareviewResult<()>;

    /// Get a base item by ID.
    async fn base_item_get(&self, id: BaseItemId) -> CareviewResult<Option<BaseItem>>;

    /// Get a base item by its unique slug.
    async fn base_item_get_by_slug(&self, slug: &str) -> CareviewResult<Option<BaseItem>>;

    /// List the full shared library.
    async fn base_item_list(&self) -> CareviewResult<Vec<BaseItem>>;

    /// Update a base item.
    async fn base_item_update(&self, id: BaseItemId, update: BaseItemUpdate) -> CareviewResult<()>;

    /// Delete a base item together with every dependent override and review
    /// row, in one transaction.
    async fn base_item_delete(&self, id: BaseItemId) -> CareviewResult<()>;

    // === Tenant Custom Items ===

    /// Insert a new custom item.
    async fn custom_item_insert(&self, item: &TenantCustomItem) -> CareviewResult<()>;

    /// Get a custom item by ID.
    async fn custom_item_get(&self, id: CustomItemId) -> CareviewResult<Option<TenantCustomItem>>;

    /// List a tenant's custom items.
    async fn custom_item_list_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> CareviewResult<Vec<TenantCustomItem>>;

    /// Update a custom item.
    async fn custom_item_update(
        &self,
        id: CustomItemId,
        update: CustomItemUpdate,
    ) -> CareviewResult<()>;

    /// Delete a custom item together with its review rows, in one
    /// transaction.
    async fn custom_item_delete(&self, id: CustomItemId) -> CareviewResult<()>;

    // === Tenant Overrides ===

    /// Get the override for one (tenant, base item) pair.
    async fn override_get(
        &self,
        tenant_id: TenantId,
        base_item_id: BaseItemId,
    ) -> CareviewResult<Option<TenantOverride>>;

    /// List a tenant's overrides.
    async fn override_list_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> CareviewResult<Vec<TenantOverride>>;

    /// Insert or replace the override for its (tenant, base item) pair.
    async fn override_upsert(&self, ovr: &TenantOverride) -> CareviewResult<()>;

    /// Delete the override for one (tenant, base item) pair.
    async fn override_delete(
        &self,
        tenant_id: TenantId,
        base_item_id: BaseItemId,
    ) -> CareviewResult<()>;

    // === Review Status ===

    /// Get the review row for one (tenant, item, age group).
    async fn review_get(
        &self,
        tenant_id: TenantId,
        item: ItemKey,
        age_group: AgeGroup,
    ) -> CareviewResult<Option<ReviewStatus>>;

    /// List a tenant's review rows.
    async fn review_list_by_tenant(&self, tenant_id: TenantId)
        -> CareviewResult<Vec<ReviewStatus>>;

    /// Insert or replace a review row.
    async fn review_upsert(&self, status: &ReviewStatus) -> CareviewResult<()>;

    /// Delete a review row.
    async fn review_delete(
        &self,
        tenant_id: TenantId,
        item: ItemKey,
        age_group: AgeGroup,
    ) -> CareviewResult<()>;

    // === Promotion ===

    /// Apply a promotion atomically. See [`Promotion`].
    async fn apply_promotion(&self, promotion: &Promotion) -> CareviewResult<()>;
}

// ============================================================================
// IN-MEMORY REFERENCE STORE
// ============================================================================

/// All four record families behind one lock, so the multi-row operations
/// are atomic with respect to every reader.
#[derive(Debug, Default)]
struct StoreInner {
    base_items: HashMap<BaseItemId, BaseItem>,
    custom_items: HashMap<CustomItemId, TenantCustomItem>,
    overrides: HashMap<(TenantId, BaseItemId), TenantOverride>,
    reviews: HashMap<(TenantId, ItemKey, AgeGroup), ReviewStatus>,
}

/// In-memory [`LayerStore`] used by tests and embedders without a database.
#[derive(Debug, Default)]
pub struct MemoryLayerStore {
    inner: RwLock<StoreInner>,
}

impl MemoryLayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of stored base items.
    pub async fn base_item_count(&self) -> usize {
        self.inner.read().await.base_items.len()
    }

    /// Count of stored custom items.
    pub async fn custom_item_count(&self) -> usize {
        self.inner.read().await.custom_items.len()
    }

    /// Count of stored overrides.
    pub async fn override_count(&self) -> usize {
        self.inner.read().await.overrides.len()
    }

    /// Count of stored review rows.
    pub async fn review_count(&self) -> usize {
        self.inner.read().await.reviews.len()
    }
}

#[async_trait]
impl LayerStore for MemoryLayerStore {
    // === Base Items ===

    async fn base_item_insert(&self, item: &BaseItem) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        if inner.base_items.contains_key(&item.base_item_id) {
            return Err(CareviewError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::BaseItem,
                reason: "already exists".to_string(),
            }));
        }
        if inner.base_items.values().any(|b| b.slug == item.slug) {
            return Err(CareviewError::Storage(StorageError::DuplicateSlug {
                slug: item.slug.clone(),
            }));
        }
        inner.base_items.insert(item.base_item_id, item.clone());
        Ok(())
    }

    async fn base_item_get(&self, id: BaseItemId) -> CareviewResult<Option<BaseItem>> {
        let inner = self.inner.read().await;
        Ok(inner.base_items.get(&id).cloned())
    }

    async fn base_item_get_by_slug(&self, slug: &str) -> CareviewResult<Option<BaseItem>> {
        let inner = self.inner.read().await;
        Ok(inner.base_items.values().find(|b| b.slug == slug).cloned())
    }

    async fn base_item_list(&self) -> CareviewResult<Vec<BaseItem>> {
        let inner = self.inner.read().await;
        Ok(inner.base_items.values().cloned().collect())
    }

    async fn base_item_update(&self, id: BaseItemId, update: BaseItemUpdate) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        let item = inner.base_items.get_mut(&id).ok_or(CareviewError::Storage(
            StorageError::NotFound {
                entity_type: EntityType::BaseItem,
                id,
            },
        ))?;

        if let Some(content) = update.content {
            item.content = content;
        }
        if let Some(age_group) = update.age_group {
            item.age_group = age_group;
        }
        if let Some(enabled) = update.enabled {
            item.enabled = enabled;
        }
        item.updated_at = chrono::Utc::now();

        Ok(())
    }

    async fn base_item_delete(&self, id: BaseItemId) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        if inner.base_items.remove(&id).is_none() {
            return Err(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::BaseItem,
                id,
            }));
        }
        // Orphan tolerance: dependent rows die in the same transaction.
        inner.overrides.retain(|(_, base_id), _| *base_id != id);
        inner
            .reviews
            .retain(|(_, item, _), _| *item != ItemKey::Base(id));
        Ok(())
    }

    // === Tenant Custom Items ===

    async fn custom_item_insert(&self, item: &TenantCustomItem) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        if inner.custom_items.contains_key(&item.custom_item_id) {
            return Err(CareviewError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::CustomItem,
                reason: "already exists".to_string(),
            }));
        }
        inner.custom_items.insert(item.custom_item_id, item.clone());
        Ok(())
    }

    async fn custom_item_get(&self, id: CustomItemId) -> CareviewResult<Option<TenantCustomItem>> {
        let inner = self.inner.read().await;
        Ok(inner.custom_items.get(&id).cloned())
    }

    async fn custom_item_list_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> CareviewResult<Vec<TenantCustomItem>> {
        let inner = self.inner.read().await;
        Ok(inner
            .custom_items
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn custom_item_update(
        &self,
        id: CustomItemId,
        update: CustomItemUpdate,
    ) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        let item = inner
            .custom_items
            .get_mut(&id)
            .ok_or(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::CustomItem,
                id,
            }))?;

        if let Some(content) = update.content {
            item.content = content;
        }
        if let Some(age_group) = update.age_group {
            item.age_group = age_group;
        }
        if let Some(enabled) = update.enabled {
            item.enabled = enabled;
        }
        item.updated_at = chrono::Utc::now();

        Ok(())
    }

    async fn custom_item_delete(&self, id: CustomItemId) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        if inner.custom_items.remove(&id).is_none() {
            return Err(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::CustomItem,
                id,
            }));
        }
        inner
            .reviews
            .retain(|(_, item, _), _| *item != ItemKey::Custom(id));
        Ok(())
    }

    // === Tenant Overrides ===

    async fn override_get(
        &self,
        tenant_id: TenantId,
        base_item_id: BaseItemId,
    ) -> CareviewResult<Option<TenantOverride>> {
        let inner = self.inner.read().await;
        Ok(inner.overrides.get(&(tenant_id, base_item_id)).cloned())
    }

    async fn override_list_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> CareviewResult<Vec<TenantOverride>> {
        let inner = self.inner.read().await;
        Ok(inner
            .overrides
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn override_upsert(&self, ovr: &TenantOverride) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .overrides
            .insert((ovr.tenant_id, ovr.base_item_id), ovr.clone());
        Ok(())
    }

    async fn override_delete(
        &self,
        tenant_id: TenantId,
        base_item_id: BaseItemId,
    ) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        if inner.overrides.remove(&(tenant_id, base_item_id)).is_none() {
            return Err(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::Override,
                id: base_item_id,
            }));
        }
        Ok(())
    }

    // === Review Status ===

    async fn review_get(
        &self,
        tenant_id: TenantId,
        item: ItemKey,
        age_group: AgeGroup,
    ) -> CareviewResult<Option<ReviewStatus>> {
        let inner = self.inner.read().await;
        Ok(inner.reviews.get(&(tenant_id, item, age_group)).cloned())
    }

    async fn review_list_by_tenant(
        &self,
        tenant_id: TenantId,
    ) -> CareviewResult<Vec<ReviewStatus>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn review_upsert(&self, status: &ReviewStatus) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        inner.reviews.insert(
            (status.tenant_id, status.item, status.age_group),
            status.clone(),
        );
        Ok(())
    }

    async fn review_delete(
        &self,
        tenant_id: TenantId,
        item: ItemKey,
        age_group: AgeGroup,
    ) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .reviews
            .remove(&(tenant_id, item, age_group))
            .is_none()
        {
            return Err(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::ReviewStatus,
                id: item.item_id(),
            }));
        }
        Ok(())
    }

    // === Promotion ===

    async fn apply_promotion(&self, promotion: &Promotion) -> CareviewResult<()> {
        let mut inner = self.inner.write().await;

        // Validate everything before touching any family, so a failure
        // leaves the store untouched.
        let custom = inner
            .custom_items
            .get(&promotion.custom_item_id)
            .ok_or(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::CustomItem,
                id: promotion.custom_item_id,
            }))?;
        if custom.tenant_id != promotion.tenant_id {
            return Err(CareviewError::Storage(StorageError::Conflict {
                entity_type: EntityType::CustomItem,
                reason: "custom item does not belong to the promoting tenant".to_string(),
            }));
        }
        if inner
            .base_items
            .contains_key(&promotion.base_item.base_item_id)
        {
            return Err(CareviewError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::BaseItem,
                reason: "already exists".to_string(),
            }));
        }
        if inner
            .base_items
            .values()
            .any(|b| b.slug == promotion.base_item.slug)
        {
            return Err(CareviewError::Storage(StorageError::DuplicateSlug {
                slug: promotion.base_item.slug.clone(),
            }));
        }

        // The custom identity disappears and the base identity appears in
        // the same critical section.
        inner.custom_items.remove(&promotion.custom_item_id);
        inner
            .base_items
            .insert(promotion.base_item.base_item_id, promotion.base_item.clone());

        // Re-key review rows from the custom identity to the new base
        // identity, preserving state, note, and reviewer.
        let old_key = ItemKey::Custom(promotion.custom_item_id);
        let new_key = ItemKey::Base(promotion.base_item.base_item_id);
        let migrated: Vec<ReviewStatus> = inner
            .reviews
            .iter()
            .filter(|((_, item, _), _)| *item == old_key)
            .map(|(_, status)| status.clone())
            .collect();
        inner.reviews.retain(|(_, item, _), _| *item != old_key);
        for mut status in migrated {
            status.item = new_key;
            inner
                .reviews
                .insert((status.tenant_id, new_key, status.age_group), status);
        }

        // Preserve the enablement linkage: a disabled custom item becomes
        // a hidden override for the promoting tenant.
        if promotion.hide_for_tenant {
            let mut ovr =
                TenantOverride::new(promotion.tenant_id, promotion.base_item.base_item_id);
            ovr.hidden = true;
            inner
                .overrides
                .insert((ovr.tenant_id, ovr.base_item_id), ovr);
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
