//! The view engine facade.
//!
//! Wires the layer store, the view cache, and the invalidator into the
//! inbound operation surface: cache-checked resolution, override and
//! review mutations, custom/base item lifecycle, and promotion.
//!
//! Authorization is the caller's job: role-in-tenant is resolved by the
//! excluded auth layer before these methods run. The engine still enforces
//! the scope checks it can make on its own (a tenant acting on another
//! tenant's custom item is `Forbidden`).

use crate::invalidator::Invalidator;
use crate::partition::{partition, status_index, ReviewPartition};
use crate::resolver::{orphaned_overrides, resolve_effective};
use careview_core::{
    AccessError, ActorId, AgeGroup, BaseItem, BaseItemId, CareviewError, CareviewResult,
    ContentPatch, CustomItemId, EffectiveItem, EntityType, FieldPatch, ItemContent, ItemKey,
    ReviewState, ReviewStatus, StorageError, TenantCustomItem, TenantId, TenantOverride,
    ValidationError, Visibility,
};
use careview_storage::{
    BaseItemUpdate, CustomItemUpdate, LayerStore, Promotion, ViewCache, ViewKey,
};
use chrono::Utc;
use std::sync::Arc;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for a tenant override. Unset fields are left unchanged;
/// a provided `patch` replaces the stored patch wholesale.
#[derive(Debug, Clone, Default)]
pub struct OverrideUpdate {
    pub hidden: Option<bool>,
    pub patch: Option<ContentPatch>,
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_content(content: &ItemContent) -> CareviewResult<()> {
    if content.name.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        }
        .into());
    }
    if let Some(link) = &content.link {
        validate_link(link)?;
    }
    Ok(())
}

fn validate_patch(patch: &ContentPatch) -> CareviewResult<()> {
    if let Some(name) = patch.name.as_set() {
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
    }
    if let FieldPatch::Set(Some(link)) = &patch.link {
        validate_link(link)?;
    }
    Ok(())
}

fn validate_link(link: &str) -> CareviewResult<()> {
    if !(link.starts_with("http://") || link.starts_with("https://")) {
        return Err(ValidationError::InvalidValue {
            field: "link".to_string(),
            reason: "must be an http(s) URL".to_string(),
        }
        .into());
    }
    Ok(())
}

// ============================================================================
// VIEW ENGINE
// ============================================================================

/// The effective-view resolution engine for all tenants.
///
/// Cheap to clone; clones share the store, the cache, and the degraded
/// flag.
#[derive(Debug)]
pub struct ViewEngine<S, C>
where
    S: LayerStore,
    C: ViewCache,
{
    store: Arc<S>,
    cache: Arc<C>,
    invalidator: Invalidator<C>,
}

impl<S, C> Clone for ViewEngine<S, C>
where
    S: LayerStore,
    C: ViewCache,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            invalidator: self.invalidator.clone(),
        }
    }
}

impl<S, C> ViewEngine<S, C>
where
    S: LayerStore,
    C: ViewCache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
        let invalidator = Invalidator::new(Arc::clone(&cache));
        Self {
            store,
            cache,
            invalidator,
        }
    }

    /// The invalidator driving this engine's cache, for callers that
    /// mutate storage out of band.
    pub fn invalidator(&self) -> &Invalidator<C> {
        &self.invalidator
    }

    /// Get a reference to the layer store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Resolve a tenant's effective view, serving from cache when a valid
    /// entry exists. Cache failures degrade to recomputation.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        visibility: Visibility,
    ) -> CareviewResult<Vec<EffectiveItem>> {
        let key = ViewKey::new(tenant_id, visibility);

        if !self.invalidator.is_degraded() {
            match self.cache.get(key).await {
                Ok(Some(view)) => return Ok(view.items),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%key, %err, "cache read failed; recomputing");
                }
            }
        }

        let bases = self.store.base_item_list().await?;
        let customs = self.store.custom_item_list_by_tenant(tenant_id).await?;
        let overrides = self.store.override_list_by_tenant(tenant_id).await?;

        // Orphaned overrides never affect the view; drop them while we
        // hold the row set. Failures here are invisible to the caller.
        for base_item_id in orphaned_overrides(&bases, &overrides) {
            if let Err(err) = self.store.override_delete(tenant_id, base_item_id).await {
                tracing::debug!(%base_item_id, %err, "orphaned override cleanup skipped");
            }
        }

        let items = resolve_effective(&bases, &customs, &overrides, visibility);

        if let Err(err) = self.cache.put(key, items.clone()).await {
            tracing::warn!(%key, %err, "cache write failed; serving uncached");
        }
        Ok(items)
    }

    /// Resolve and partition by review state, for dashboards.
    pub async fn review_summary(
        &self,
        tenant_id: TenantId,
        visibility: Visibility,
    ) -> CareviewResult<ReviewPartition> {
        let items = self.resolve(tenant_id, visibility).await?;
        let statuses = self.store.review_list_by_tenant(tenant_id).await?;
        Ok(partition(&items, &status_index(&statuses)))
    }

    // ========================================================================
    // TENANT OVERRIDES
    // ========================================================================

    /// Create or update the tenant's override for a base item. Returns the
    /// stored override, or `None` when the update left it a no-op and it
    /// was removed to keep the table sparse.
    pub async fn set_override(
        &self,
        tenant_id: TenantId,
        base_item_id: BaseItemId,
        update: OverrideUpdate,
    ) -> CareviewResult<Option<TenantOverride>> {
        self.store
            .base_item_get(base_item_id)
            .await?
            .ok_or(CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::BaseItem,
                id: base_item_id,
            }))?;
        if let Some(patch) = &update.patch {
            validate_patch(patch)?;
        }

        let mut ovr = self
            .store
            .override_get(tenant_id, base_item_id)
            .await?
            .unwrap_or_else(|| TenantOverride::new(tenant_id, base_item_id));
        if let Some(hidden) = update.hidden {
            ovr.hidden = hidden;
        }
        if let Some(patch) = update.patch {
            ovr.patch = patch;
        }
        ovr.updated_at = Utc::now();

        let stored = if ovr.is_noop() {
            match self.store.override_delete(tenant_id, base_item_id).await {
                Ok(()) => {}
                // Never persisted; nothing to remove.
                Err(CareviewError::Storage(StorageError::NotFound { .. })) => {}
                Err(err) => return Err(err),
            }
            None
        } else {
            self.store.override_upsert(&ovr).await?;
            Some(ovr)
        };

        self.invalidator.on_tenant_layer_changed(tenant_id).await;
        Ok(stored)
    }

    /// Remove the tenant's override for a base item, restoring the shared
    /// view of it. Clearing an absent override is a no-op.
    pub async fn clear_override(
        &self,
        tenant_id: TenantId,
        base_item_id: BaseItemId,
    ) -> CareviewResult<()> {
        match self.store.override_delete(tenant_id, base_item_id).await {
            Ok(()) => {}
            Err(CareviewError::Storage(StorageError::NotFound { .. })) => return Ok(()),
            Err(err) => return Err(err),
        }
        self.invalidator.on_tenant_layer_changed(tenant_id).await;
        Ok(())
    }

    // ========================================================================
    // REVIEW STATUS
    // ========================================================================

    /// Record a review transition for one (item, age-group variant). A
    /// note is only valid with `ChangesRequired`; any other transition
    /// clears the stored note. Resetting to `Pending` removes the row
    /// (absence already means pending), so the table stays sparse; the
    /// returned `None` signals the reset.
    pub async fn set_review_status(
        &self,
        tenant_id: TenantId,
        item: ItemKey,
        age_group: AgeGroup,
        state: ReviewState,
        note: Option<String>,
        reviewed_by: ActorId,
    ) -> CareviewResult<Option<ReviewStatus>> {
        if note.is_some() && state != ReviewState::ChangesRequired {
            return Err(ValidationError::ConstraintViolation {
                constraint: "review-note".to_string(),
                reason: "a note is only valid with changes-required".to_string(),
            }
            .into());
        }

        match item {
            ItemKey::Base(id) => {
                self.store.base_item_get(id).await?.ok_or(
                    CareviewError::Storage(StorageError::NotFound {
                        entity_type: EntityType::BaseItem,
                        id,
                    }),
                )?;
            }
            ItemKey::Custom(id) => {
                self.owned_custom_item(tenant_id, id, "review").await?;
            }
        }

        let stored = if state == ReviewState::Pending {
            match self.store.review_delete(tenant_id, item, age_group).await {
                Ok(()) => {}
                // Never reviewed; already at the lazy default.
                Err(CareviewError::Storage(StorageError::NotFound { .. })) => {}
                Err(err) => return Err(err),
            }
            None
        } else {
            let status = ReviewStatus::record(tenant_id, item, age_group, state, note, reviewed_by);
            self.store.review_upsert(&status).await?;
            Some(status)
        };
        self.invalidator.on_review_status_changed(tenant_id).await;
        Ok(stored)
    }

    // ========================================================================
    // TENANT CUSTOM ITEMS
    // ========================================================================

    /// Create a tenant-private item.
    pub async fn create_custom_item(
        &self,
        tenant_id: TenantId,
        age_group: AgeGroup,
        content: ItemContent,
    ) -> CareviewResult<TenantCustomItem> {
        validate_content(&content)?;
        let item = TenantCustomItem::new(tenant_id, age_group, content);
        self.store.custom_item_insert(&item).await?;
        self.invalidator.on_tenant_layer_changed(tenant_id).await;
        Ok(item)
    }

    /// Update a tenant-private item.
    pub async fn update_custom_item(
        &self,
        tenant_id: TenantId,
        custom_item_id: CustomItemId,
        update: CustomItemUpdate,
    ) -> CareviewResult<()> {
        self.owned_custom_item(tenant_id, custom_item_id, "update")
            .await?;
        if let Some(content) = &update.content {
            validate_content(content)?;
        }
        self.store.custom_item_update(custom_item_id, update).await?;
        self.invalidator.on_tenant_layer_changed(tenant_id).await;
        Ok(())
    }

    /// Delete a tenant-private item and its review rows.
    pub async fn delete_custom_item(
        &self,
        tenant_id: TenantId,
        custom_item_id: CustomItemId,
    ) -> CareviewResult<()> {
        self.owned_custom_item(tenant_id, custom_item_id, "delete")
            .await?;
        self.store.custom_item_delete(custom_item_id).await?;
        self.invalidator.on_tenant_layer_changed(tenant_id).await;
        Ok(())
    }

    // ========================================================================
    // BASE ITEMS (superuser paths)
    // ========================================================================

    /// Add an item to the shared library. The slug is derived from the
    /// display name.
    pub async fn create_base_item(
        &self,
        age_group: AgeGroup,
        content: ItemContent,
    ) -> CareviewResult<BaseItem> {
        validate_content(&content)?;
        let slug = derive_nonempty_slug(&content.name)?;
        let item = BaseItem::new(slug, age_group, content);
        self.store.base_item_insert(&item).await?;
        self.invalidator.on_base_item_changed().await;
        Ok(item)
    }

    /// Edit a shared-library item. Visible to every tenant that has not
    /// overridden the edited fields.
    pub async fn update_base_item(
        &self,
        base_item_id: BaseItemId,
        update: BaseItemUpdate,
    ) -> CareviewResult<()> {
        if let Some(content) = &update.content {
            validate_content(content)?;
        }
        self.store.base_item_update(base_item_id, update).await?;
        self.invalidator.on_base_item_changed().await;
        Ok(())
    }

    /// Remove a shared-library item, cascading every tenant's override and
    /// review rows for it.
    pub async fn delete_base_item(&self, base_item_id: BaseItemId) -> CareviewResult<()> {
        self.store.base_item_delete(base_item_id).await?;
        self.invalidator.on_base_item_changed().await;
        Ok(())
    }

    // ========================================================================
    // PROMOTION
    // ========================================================================

    /// Migrate a tenant custom item into the shared library.
    ///
    /// Atomic: the custom identity disappears and the base identity
    /// appears in one store transaction, review linkage re-keyed and the
    /// enablement flag preserved (a disabled custom item becomes a hidden
    /// override for the promoting tenant).
    pub async fn promote(
        &self,
        tenant_id: TenantId,
        custom_item_id: CustomItemId,
    ) -> CareviewResult<BaseItem> {
        let custom = self
            .owned_custom_item(tenant_id, custom_item_id, "promote")
            .await?;

        let slug = derive_nonempty_slug(&custom.content.name)?;
        let base_item = BaseItem::new(slug, custom.age_group, custom.content.clone());
        let promotion = Promotion {
            tenant_id,
            custom_item_id,
            base_item: base_item.clone(),
            hide_for_tenant: !custom.enabled,
        };
        self.store.apply_promotion(&promotion).await?;

        // The new base item is visible to every tenant; the promoting
        // tenant's layers changed too.
        self.invalidator.on_base_item_changed().await;
        self.invalidator.on_tenant_layer_changed(tenant_id).await;

        tracing::debug!(
            %custom_item_id,
            base_item_id = %base_item.base_item_id,
            slug = %base_item.slug,
            "custom item promoted into the shared library"
        );
        Ok(base_item)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    async fn owned_custom_item(
        &self,
        tenant_id: TenantId,
        custom_item_id: CustomItemId,
        action: &str,
    ) -> CareviewResult<TenantCustomItem> {
        let custom = self.store.custom_item_get(custom_item_id).await?.ok_or(
            CareviewError::Storage(StorageError::NotFound {
                entity_type: EntityType::CustomItem,
                id: custom_item_id,
            }),
        )?;
        if custom.tenant_id != tenant_id {
            return Err(AccessError::Forbidden {
                tenant_id,
                action: action.to_string(),
                resource: format!("custom-item {}", custom_item_id),
            }
            .into());
        }
        Ok(custom)
    }
}

fn derive_nonempty_slug(name: &str) -> CareviewResult<String> {
    let slug = careview_core::derive_slug(name);
    if slug.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".to_string(),
            reason: "cannot derive a slug".to_string(),
        }
        .into());
    }
    Ok(slug)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use careview_core::InstructionDoc;
    use careview_storage::{InMemoryViewCache, MemoryLayerStore};

    fn engine() -> ViewEngine<MemoryLayerStore, InMemoryViewCache> {
        ViewEngine::new(
            Arc::new(MemoryLayerStore::new()),
            Arc::new(InMemoryViewCache::default()),
        )
    }

    fn content(name: &str) -> ItemContent {
        ItemContent::new(name, "brief", InstructionDoc::plain("instructions"))
    }

    #[tokio::test]
    async fn test_create_base_item_derives_slug() {
        let engine = engine();
        let item = engine
            .create_base_item(AgeGroup::Adult, content("Sore Throat (adults)"))
            .await
            .unwrap();
        assert_eq!(item.slug, "sore-throat-adults");
    }

    #[tokio::test]
    async fn test_create_base_item_rejects_blank_name() {
        let engine = engine();
        let err = engine
            .create_base_item(AgeGroup::Adult, content("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, CareviewError::Validation(_)));
    }

    #[tokio::test]
    async fn test_set_override_requires_live_base_item() {
        let engine = engine();
        let err = engine
            .set_override(
                careview_core::new_entity_id(),
                careview_core::new_entity_id(),
                OverrideUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CareviewError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_override_rejects_blank_name_patch() {
        let engine = engine();
        let base = engine
            .create_base_item(AgeGroup::Adult, content("Earache"))
            .await
            .unwrap();

        let err = engine
            .set_override(
                careview_core::new_entity_id(),
                base.base_item_id,
                OverrideUpdate {
                    patch: Some(ContentPatch {
                        name: FieldPatch::Set("  ".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CareviewError::Validation(_)));
    }

    #[tokio::test]
    async fn test_set_override_rejects_non_http_link() {
        let engine = engine();
        let base = engine
            .create_base_item(AgeGroup::Adult, content("Earache"))
            .await
            .unwrap();

        let err = engine
            .set_override(
                careview_core::new_entity_id(),
                base.base_item_id,
                OverrideUpdate {
                    patch: Some(ContentPatch {
                        link: FieldPatch::Set(Some("javascript:alert(1)".to_string())),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CareviewError::Validation(_)));
    }

    #[tokio::test]
    async fn test_noop_override_is_removed_to_keep_table_sparse() {
        let engine = engine();
        let tenant = careview_core::new_entity_id();
        let base = engine
            .create_base_item(AgeGroup::Adult, content("Earache"))
            .await
            .unwrap();

        let stored = engine
            .set_override(
                tenant,
                base.base_item_id,
                OverrideUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(stored.is_some());

        // Un-hiding with no edits leaves a no-op, which is deleted.
        let stored = engine
            .set_override(
                tenant,
                base.base_item_id,
                OverrideUpdate {
                    hidden: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_clear_override_restores_shared_view() {
        let engine = engine();
        let tenant = careview_core::new_entity_id();
        let base = engine
            .create_base_item(AgeGroup::Adult, content("Earache"))
            .await
            .unwrap();

        engine
            .set_override(
                tenant,
                base.base_item_id,
                OverrideUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(engine
            .resolve(tenant, Visibility::Enabled)
            .await
            .unwrap()
            .is_empty());

        engine.clear_override(tenant, base.base_item_id).await.unwrap();
        let items = engine.resolve(tenant, Visibility::Enabled).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].overridden);

        // Clearing again is a no-op, not an error.
        engine.clear_override(tenant, base.base_item_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_review_note_requires_changes_required() {
        let engine = engine();
        let tenant = careview_core::new_entity_id();
        let actor = careview_core::new_entity_id();
        let base = engine
            .create_base_item(AgeGroup::Adult, content("Earache"))
            .await
            .unwrap();

        let err = engine
            .set_review_status(
                tenant,
                base.key(),
                AgeGroup::Adult,
                ReviewState::Approved,
                Some("why a note?".to_string()),
                actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CareviewError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cross_tenant_custom_item_access_is_forbidden() {
        let engine = engine();
        let owner = careview_core::new_entity_id();
        let intruder = careview_core::new_entity_id();
        let item = engine
            .create_custom_item(owner, AgeGroup::Adult, content("Travel Advice"))
            .await
            .unwrap();

        let err = engine
            .delete_custom_item(intruder, item.custom_item_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CareviewError::Access(_)));

        let err = engine
            .promote(intruder, item.custom_item_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CareviewError::Access(_)));
    }

    #[tokio::test]
    async fn test_resolve_cleans_orphaned_overrides() {
        let engine = engine();
        let tenant = careview_core::new_entity_id();
        let base = engine
            .create_base_item(AgeGroup::Adult, content("Earache"))
            .await
            .unwrap();
        engine
            .set_override(
                tenant,
                base.base_item_id,
                OverrideUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Deleting the base item cascades the override; re-create the
        // orphan by hand to simulate a backend that does not cascade.
        let mut orphan = TenantOverride::new(tenant, careview_core::new_entity_id());
        orphan.hidden = true;
        engine.store.override_upsert(&orphan).await.unwrap();

        engine.resolve(tenant, Visibility::Enabled).await.unwrap();
        let remaining = engine.store.override_list_by_tenant(tenant).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].base_item_id, base.base_item_id);
    }
}
