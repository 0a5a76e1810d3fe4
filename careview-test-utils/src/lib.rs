//! CAREVIEW Test Utilities
//!
//! Centralized test infrastructure for the CAREVIEW workspace:
//! - Proptest generators for entity types
//! - Fixtures for common scenarios
//!
//! The in-memory store and cache live in `careview-storage` and are
//! re-exported here for convenience.

// Re-export the reference store and cache from their source crate
pub use careview_storage::{InMemoryViewCache, MemoryLayerStore};

// Re-export core types for convenience
pub use careview_core::{
    compute_content_hash, derive_slug, new_entity_id, AgeGroup, BaseItem, BaseItemId,
    CareviewError, CareviewResult, ContentHash, ContentPatch, CustomItemId, EffectiveItem,
    EntityType, FieldPatch, InstructionDoc, ItemContent, ItemKey, ItemSource, ReviewState,
    ReviewStatus, StorageError, TenantCustomItem, TenantId, TenantOverride, Timestamp, Visibility,
};

pub use fixtures::*;
pub use generators::*;

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use careview_core::{
        derive_slug, AgeGroup, BaseItem, BaseItemId, ContentPatch, InstructionDoc, ItemContent,
        TenantCustomItem, TenantId, TenantOverride,
    };

    /// Single-paragraph instructions.
    pub fn instructions(text: &str) -> InstructionDoc {
        InstructionDoc::plain(text)
    }

    /// Content with a name and boilerplate instruction fields.
    pub fn item_content(name: &str) -> ItemContent {
        ItemContent::new(name, "brief", instructions("instructions"))
    }

    /// An enabled adult base item with a slug derived from the name.
    pub fn base_item(name: &str) -> BaseItem {
        BaseItem::new(derive_slug(name), AgeGroup::Adult, item_content(name))
    }

    /// An enabled adult custom item for one tenant.
    pub fn custom_item(tenant_id: TenantId, name: &str) -> TenantCustomItem {
        TenantCustomItem::new(tenant_id, AgeGroup::Adult, item_content(name))
    }

    /// An override that hides a base item for a tenant.
    pub fn hidden_override(tenant_id: TenantId, base_item_id: BaseItemId) -> TenantOverride {
        let mut ovr = TenantOverride::new(tenant_id, base_item_id);
        ovr.hidden = true;
        ovr
    }

    /// An override that patches fields without hiding.
    pub fn patched_override(
        tenant_id: TenantId,
        base_item_id: BaseItemId,
        patch: ContentPatch,
    ) -> TenantOverride {
        let mut ovr = TenantOverride::new(tenant_id, base_item_id);
        ovr.patch = patch;
        ovr
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use careview_core::{
        AgeGroup, BaseItem, EffectiveItem, ItemKey, ItemSource, ReviewState, TenantCustomItem,
        TenantId, Visibility,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::fixtures;

    /// Generate arbitrary UUIDs.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate plausible item display names.
    pub fn arb_item_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,19}"
    }

    pub fn arb_age_group() -> impl Strategy<Value = AgeGroup> {
        prop_oneof![
            Just(AgeGroup::UnderFive),
            Just(AgeGroup::OverFive),
            Just(AgeGroup::Adult),
        ]
    }

    pub fn arb_review_state() -> impl Strategy<Value = ReviewState> {
        prop_oneof![
            Just(ReviewState::Pending),
            Just(ReviewState::Approved),
            Just(ReviewState::ChangesRequired),
        ]
    }

    pub fn arb_visibility() -> impl Strategy<Value = Visibility> {
        prop_oneof![Just(Visibility::Enabled), Just(Visibility::WithDisabled)]
    }

    pub fn arb_item_source() -> impl Strategy<Value = ItemSource> {
        prop_oneof![Just(ItemSource::Base), Just(ItemSource::Custom)]
    }

    /// Generate base items with arbitrary identity, name, age group, and
    /// enablement.
    pub fn arb_base_item() -> impl Strategy<Value = BaseItem> {
        (arb_uuid(), arb_item_name(), arb_age_group(), any::<bool>()).prop_map(
            |(id, name, age_group, enabled)| {
                let mut item = fixtures::base_item(&name);
                item.base_item_id = id;
                item.age_group = age_group;
                item.enabled = enabled;
                item
            },
        )
    }

    /// Generate custom items for one tenant.
    pub fn arb_custom_item(tenant_id: TenantId) -> impl Strategy<Value = TenantCustomItem> {
        (arb_uuid(), arb_item_name(), arb_age_group(), any::<bool>()).prop_map(
            move |(id, name, age_group, enabled)| {
                let mut item = fixtures::custom_item(tenant_id, &name);
                item.custom_item_id = id;
                item.age_group = age_group;
                item.enabled = enabled;
                item
            },
        )
    }

    /// Generate already-resolved effective items.
    pub fn arb_effective_item() -> impl Strategy<Value = EffectiveItem> {
        (
            arb_uuid(),
            arb_item_name(),
            arb_age_group(),
            arb_item_source(),
            any::<bool>(),
        )
            .prop_map(|(id, name, age_group, source, enabled)| {
                let (key, slug) = match source {
                    ItemSource::Base => (ItemKey::Base(id), Some(careview_core::derive_slug(&name))),
                    ItemSource::Custom => (ItemKey::Custom(id), None),
                };
                EffectiveItem {
                    key,
                    source,
                    slug,
                    age_group,
                    content: fixtures::item_content(&name),
                    enabled,
                    overridden: false,
                }
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================
