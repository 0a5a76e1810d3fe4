//! Core entity structures
//!
//! The four persisted record families (base items, tenant custom items,
//! tenant overrides, review status) plus the derived, never-persisted
//! effective item.

use crate::{
    ActorId, AgeGroup, BaseItemId, ContentPatch, CustomItemId, EntityId, EntityType, ItemContent,
    ItemSource, ReviewState, TenantId, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ITEM KEY
// ============================================================================

/// Shared identity scheme spanning both item families.
///
/// Review status rows and effective items are keyed by `ItemKey`, so an
/// item keeps a single identity whether it lives in the shared library or
/// in a tenant's private layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKey {
    Base(BaseItemId),
    Custom(CustomItemId),
}

impl ItemKey {
    /// The underlying item identifier.
    pub fn item_id(&self) -> EntityId {
        match self {
            ItemKey::Base(id) | ItemKey::Custom(id) => *id,
        }
    }

    pub fn source(&self) -> ItemSource {
        match self {
            ItemKey::Base(_) => ItemSource::Base,
            ItemKey::Custom(_) => ItemSource::Custom,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            ItemKey::Base(_) => EntityType::BaseItem,
            ItemKey::Custom(_) => EntityType::CustomItem,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Base(id) => write!(f, "base:{}", id),
            ItemKey::Custom(id) => write!(f, "custom:{}", id),
        }
    }
}

// ============================================================================
// PERSISTED RECORD FAMILIES
// ============================================================================

/// Shared-library item, visible to every tenant by default.
/// Mutated only by superuser actors; never tenant-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseItem {
    pub base_item_id: BaseItemId,
    /// Unique across the shared library
    pub slug: String,
    pub age_group: AgeGroup,
    pub content: ItemContent,
    /// Global enablement; a disabled base item is invisible to all tenants
    pub enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BaseItem {
    pub fn new(slug: impl Into<String>, age_group: AgeGroup, content: ItemContent) -> Self {
        let now = Utc::now();
        Self {
            base_item_id: crate::new_entity_id(),
            slug: slug.into(),
            age_group,
            content,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::Base(self.base_item_id)
    }
}

/// Tenant-authored item with the same content shape as a base item, owned
/// by exactly one tenant and invisible to the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantCustomItem {
    pub custom_item_id: CustomItemId,
    pub tenant_id: TenantId,
    pub age_group: AgeGroup,
    pub content: ItemContent,
    /// Tenant-controlled enablement toggle
    pub enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TenantCustomItem {
    pub fn new(tenant_id: TenantId, age_group: AgeGroup, content: ItemContent) -> Self {
        let now = Utc::now();
        Self {
            custom_item_id: crate::new_entity_id(),
            tenant_id,
            age_group,
            content,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::Custom(self.custom_item_id)
    }
}

/// Sparse per-(tenant, base item) patch: a hide flag plus field edits.
///
/// At most one override exists per (tenant, base item) pair. Created lazily
/// on first edit or hide; deleted once it becomes a no-op so the table
/// stays sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantOverride {
    pub tenant_id: TenantId,
    pub base_item_id: BaseItemId,
    /// Suppress the item from the tenant's default-visibility view
    pub hidden: bool,
    pub patch: ContentPatch,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TenantOverride {
    pub fn new(tenant_id: TenantId, base_item_id: BaseItemId) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            base_item_id,
            hidden: false,
            patch: ContentPatch::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A no-op override (not hidden, nothing patched) must be deleted
    /// rather than persisted.
    pub fn is_noop(&self) -> bool {
        !self.hidden && self.patch.is_empty()
    }
}

/// Clinical review state for one (tenant, item, age-group variant).
///
/// Absence of a row is equivalent to `Pending`; rows exist only once a
/// reviewer has acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub tenant_id: TenantId,
    pub item: ItemKey,
    pub age_group: AgeGroup,
    pub state: ReviewState,
    /// Reviewer note; populated only for `ChangesRequired`
    pub note: Option<String>,
    pub reviewed_by: ActorId,
    pub reviewed_at: Timestamp,
}

impl ReviewStatus {
    /// Record a review transition. The note is kept only for
    /// `ChangesRequired` and cleared on any other transition.
    pub fn record(
        tenant_id: TenantId,
        item: ItemKey,
        age_group: AgeGroup,
        state: ReviewState,
        note: Option<String>,
        reviewed_by: ActorId,
    ) -> Self {
        let note = match state {
            ReviewState::ChangesRequired => note,
            _ => None,
        };
        Self {
            tenant_id,
            item,
            age_group,
            state,
            note,
            reviewed_by,
            reviewed_at: Utc::now(),
        }
    }
}

// ============================================================================
// EFFECTIVE ITEM (DERIVED)
// ============================================================================

/// The resolved, tenant-facing view of one item after all layers merge.
///
/// Never a source of truth: computed on demand and only ever cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveItem {
    pub key: ItemKey,
    pub source: ItemSource,
    /// Present for base-sourced items; custom items carry no slug
    pub slug: Option<String>,
    pub age_group: AgeGroup,
    pub content: ItemContent,
    /// False when the tenant has hidden (base) or disabled (custom) the item
    pub enabled: bool,
    /// True when a tenant override patched at least one field
    pub overridden: bool,
}

impl EffectiveItem {
    /// Ordering key: case-insensitive display name, identifier tie-break.
    /// Keeps cached and freshly computed lists byte-identical.
    pub fn sort_key(&self) -> (String, EntityId) {
        (self.content.name.to_lowercase(), self.key.item_id())
    }
}

// =============================================================================
// TESTS
// =============================================================================
