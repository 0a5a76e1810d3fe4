//! End-to-end behavior of the view engine over the in-memory store and
//! cache: resolution determinism, override precedence, invalidation
//! correctness, promotion atomicity, and the review partition.

use std::sync::Arc;

use careview_core::{
    new_entity_id, AgeGroup, CareviewError, ContentPatch, FieldPatch, InstructionDoc, ItemKey,
    ItemSource, ReviewState, StorageError, Visibility,
};
use careview_engine::{OverrideUpdate, ViewEngine};
use careview_storage::{
    BaseItemUpdate, InMemoryViewCache, LayerStore, MemoryLayerStore, ViewCache,
};
use careview_test_utils::fixtures;

type Engine = ViewEngine<MemoryLayerStore, InMemoryViewCache>;

fn engine() -> Engine {
    ViewEngine::new(
        Arc::new(MemoryLayerStore::new()),
        Arc::new(InMemoryViewCache::default()),
    )
}

async fn seed_library(engine: &Engine, names: &[&str]) -> Vec<careview_core::BaseItem> {
    let mut items = Vec::new();
    for name in names {
        items.push(
            engine
                .create_base_item(AgeGroup::Adult, fixtures::item_content(name))
                .await
                .unwrap(),
        );
    }
    items
}

#[tokio::test]
async fn resolve_is_idempotent_and_cached_lists_are_byte_identical() {
    let engine = engine();
    let tenant = new_entity_id();
    seed_library(&engine, &["Earache", "Fever", "Cough"]).await;
    engine
        .create_custom_item(tenant, AgeGroup::Adult, fixtures::item_content("Travel Advice"))
        .await
        .unwrap();

    for visibility in Visibility::ALL {
        // First call misses and populates; second call is served from
        // cache. The serialized forms must be identical.
        let fresh = engine.resolve(tenant, visibility).await.unwrap();
        let cached = engine.resolve(tenant, visibility).await.unwrap();
        assert_eq!(
            serde_json::to_string(&fresh).unwrap(),
            serde_json::to_string(&cached).unwrap()
        );
    }

    let stats = engine.cache().stats().await.unwrap();
    assert!(stats.hits >= 2);
}

#[tokio::test]
async fn override_precedence_and_live_inheritance() {
    let engine = engine();
    let tenant = new_entity_id();
    let base = seed_library(&engine, &["Earache"]).await.remove(0);

    engine
        .set_override(
            tenant,
            base.base_item_id,
            OverrideUpdate {
                patch: Some(ContentPatch {
                    brief: FieldPatch::Set("Call 111 first".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Overridden field wins.
    let items = engine.resolve(tenant, Visibility::Enabled).await.unwrap();
    assert_eq!(items[0].content.brief, "Call 111 first");
    assert!(items[0].overridden);

    // A base edit to an unpatched field is immediately visible.
    engine
        .update_base_item(
            base.base_item_id,
            BaseItemUpdate {
                content: Some({
                    let mut c = base.content.clone();
                    c.instructions = InstructionDoc::plain("Updated guidance.");
                    c
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let items = engine.resolve(tenant, Visibility::Enabled).await.unwrap();
    assert_eq!(items[0].content.brief, "Call 111 first");
    assert_eq!(items[0].content.instructions.text, "Updated guidance.");
}

#[tokio::test]
async fn scenario_override_then_base_edit() {
    let engine = engine();
    let tenant = new_entity_id();
    let earache = seed_library(&engine, &["Earache", "Fever"]).await.remove(0);

    // Tenant hides "Earache".
    engine
        .set_override(
            tenant,
            earache.base_item_id,
            OverrideUpdate {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Superuser edits the instructions afterwards.
    engine
        .update_base_item(
            earache.base_item_id,
            BaseItemUpdate {
                content: Some({
                    let mut c = earache.content.clone();
                    c.instructions = InstructionDoc::plain("New earache guidance.");
                    c
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Still excluded from the default view.
    let default_view = engine.resolve(tenant, Visibility::Enabled).await.unwrap();
    assert!(!default_view
        .iter()
        .any(|i| i.key == ItemKey::Base(earache.base_item_id)));

    // Present, with the NEW text, in the with-disabled view.
    let full_view = engine
        .resolve(tenant, Visibility::WithDisabled)
        .await
        .unwrap();
    let hidden_item = full_view
        .iter()
        .find(|i| i.key == ItemKey::Base(earache.base_item_id))
        .expect("hidden item is listed with disabled included");
    assert!(!hidden_item.enabled);
    assert_eq!(hidden_item.content.instructions.text, "New earache guidance.");
}

#[tokio::test]
async fn read_after_write_is_never_stale_for_global_and_tenant_mutations() {
    let engine = engine();
    let tenant_a = new_entity_id();
    let tenant_b = new_entity_id();
    let base = seed_library(&engine, &["Earache"]).await.remove(0);

    // Prime both tenants' caches.
    engine.resolve(tenant_a, Visibility::Enabled).await.unwrap();
    engine.resolve(tenant_b, Visibility::Enabled).await.unwrap();

    // Tenant-scoped mutation: only tenant A's next read may recompute,
    // and it must observe the override immediately.
    engine
        .set_override(
            tenant_a,
            base.base_item_id,
            OverrideUpdate {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(engine
        .resolve(tenant_a, Visibility::Enabled)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        engine
            .resolve(tenant_b, Visibility::Enabled)
            .await
            .unwrap()
            .len(),
        1
    );

    // Global mutation: every tenant's next read observes the edit.
    engine
        .update_base_item(
            base.base_item_id,
            BaseItemUpdate {
                content: Some({
                    let mut c = base.content.clone();
                    c.brief = "Seek urgent advice".to_string();
                    c
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let b_view = engine.resolve(tenant_b, Visibility::Enabled).await.unwrap();
    assert_eq!(b_view[0].content.brief, "Seek urgent advice");
}

#[tokio::test]
async fn tenant_mutation_does_not_evict_other_tenants_cache() {
    let engine = engine();
    let tenant_a = new_entity_id();
    let tenant_b = new_entity_id();
    seed_library(&engine, &["Earache"]).await;

    engine.resolve(tenant_a, Visibility::Enabled).await.unwrap();
    engine.resolve(tenant_b, Visibility::Enabled).await.unwrap();
    let before = engine.cache().stats().await.unwrap();

    engine
        .create_custom_item(tenant_a, AgeGroup::Adult, fixtures::item_content("Own item"))
        .await
        .unwrap();

    // Tenant B's entry survived and still serves hits.
    engine.resolve(tenant_b, Visibility::Enabled).await.unwrap();
    let after = engine.cache().stats().await.unwrap();
    assert_eq!(after.hits, before.hits + 1);
}

#[tokio::test]
async fn scenario_promotion_is_atomic_and_globally_visible() {
    let engine = engine();
    let tenant_1 = new_entity_id();
    let tenant_2 = new_entity_id();

    let custom = engine
        .create_custom_item(
            tenant_1,
            AgeGroup::Adult,
            fixtures::item_content("Travel Vaccination Advice"),
        )
        .await
        .unwrap();

    // Prime tenant 2's cache before promotion to exercise invalidation.
    assert!(engine
        .resolve(tenant_2, Visibility::Enabled)
        .await
        .unwrap()
        .is_empty());

    let promoted = engine.promote(tenant_1, custom.custom_item_id).await.unwrap();
    assert_eq!(promoted.slug, "travel-vaccination-advice");

    // Tenant 1 still sees the content exactly once, now base-sourced.
    let t1_view = engine.resolve(tenant_1, Visibility::Enabled).await.unwrap();
    let matches: Vec<_> = t1_view
        .iter()
        .filter(|i| i.content.name == "Travel Vaccination Advice")
        .collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].source, ItemSource::Base);
    assert_eq!(matches[0].key, ItemKey::Base(promoted.base_item_id));

    // An unrelated tenant now sees the new base item too.
    let t2_view = engine.resolve(tenant_2, Visibility::Enabled).await.unwrap();
    assert_eq!(t2_view.len(), 1);
    assert_eq!(t2_view[0].key, ItemKey::Base(promoted.base_item_id));
}

#[tokio::test]
async fn promotion_preserves_review_status_and_enablement() {
    let engine = engine();
    let tenant = new_entity_id();
    let actor = new_entity_id();

    let custom = engine
        .create_custom_item(
            tenant,
            AgeGroup::Adult,
            fixtures::item_content("Travel Vaccination Advice"),
        )
        .await
        .unwrap();
    engine
        .set_review_status(
            tenant,
            custom.key(),
            AgeGroup::Adult,
            ReviewState::Approved,
            None,
            actor,
        )
        .await
        .unwrap();
    // The tenant had switched the item off before promotion.
    engine
        .update_custom_item(
            tenant,
            custom.custom_item_id,
            careview_storage::CustomItemUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let promoted = engine.promote(tenant, custom.custom_item_id).await.unwrap();

    // Approval followed the identity across the migration.
    let migrated = engine
        .store()
        .review_get(tenant, ItemKey::Base(promoted.base_item_id), AgeGroup::Adult)
        .await
        .unwrap()
        .expect("review row migrated");
    assert_eq!(migrated.state, ReviewState::Approved);

    // Enablement is preserved: hidden for the promoting tenant, visible
    // to everyone else.
    assert!(engine
        .resolve(tenant, Visibility::Enabled)
        .await
        .unwrap()
        .is_empty());
    let other_tenant = new_entity_id();
    assert_eq!(
        engine
            .resolve(other_tenant, Visibility::Enabled)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn promotion_slug_conflict_surfaces_and_changes_nothing() {
    let engine = engine();
    let tenant = new_entity_id();
    seed_library(&engine, &["Travel Vaccination Advice"]).await;

    let custom = engine
        .create_custom_item(
            tenant,
            AgeGroup::Adult,
            fixtures::item_content("Travel Vaccination Advice"),
        )
        .await
        .unwrap();

    let err = engine
        .promote(tenant, custom.custom_item_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CareviewError::Storage(StorageError::DuplicateSlug { .. })
    ));

    // The custom item is still the tenant's live source; the library is
    // unchanged. No double visibility, no gap.
    let view = engine.resolve(tenant, Visibility::Enabled).await.unwrap();
    let matches: Vec<_> = view
        .iter()
        .filter(|i| i.content.name == "Travel Vaccination Advice")
        .collect();
    assert_eq!(matches.len(), 2); // one base (pre-existing), one custom
    assert!(matches.iter().any(|i| i.source == ItemSource::Custom));
}

#[tokio::test]
async fn scenario_review_default_and_note_lifecycle() {
    let engine = engine();
    let tenant = new_entity_id();
    let actor = new_entity_id();
    let base = seed_library(&engine, &["Earache"]).await.remove(0);

    // Never-reviewed items count as pending.
    let summary = engine
        .review_summary(tenant, Visibility::Enabled)
        .await
        .unwrap();
    let counts = summary.counts();
    assert!(counts.is_consistent());
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.approved, 0);

    // Changes-required carries a note.
    engine
        .set_review_status(
            tenant,
            base.key(),
            AgeGroup::Adult,
            ReviewState::ChangesRequired,
            Some("add safety netting advice".to_string()),
            actor,
        )
        .await
        .unwrap();
    let summary = engine
        .review_summary(tenant, Visibility::Enabled)
        .await
        .unwrap();
    assert_eq!(summary.counts().changes_required, 1);

    // Any other transition clears the note.
    let approved = engine
        .set_review_status(
            tenant,
            base.key(),
            AgeGroup::Adult,
            ReviewState::Approved,
            None,
            actor,
        )
        .await
        .unwrap()
        .expect("approved rows persist");
    assert_eq!(approved.note, None);

    // Resetting to pending removes the row; absence means pending.
    let reset = engine
        .set_review_status(
            tenant,
            base.key(),
            AgeGroup::Adult,
            ReviewState::Pending,
            None,
            actor,
        )
        .await
        .unwrap();
    assert!(reset.is_none());
    assert!(engine
        .store()
        .review_get(tenant, base.key(), AgeGroup::Adult)
        .await
        .unwrap()
        .is_none());

    let summary = engine
        .review_summary(tenant, Visibility::Enabled)
        .await
        .unwrap();
    let counts = summary.counts();
    assert!(counts.is_consistent());
    assert_eq!(counts.pending, 1);
}

#[tokio::test]
async fn partition_counts_stay_consistent_across_mutations() {
    let engine = engine();
    let tenant = new_entity_id();
    let actor = new_entity_id();
    let items = seed_library(&engine, &["Earache", "Fever", "Cough", "Rash"]).await;
    engine
        .create_custom_item(tenant, AgeGroup::Adult, fixtures::item_content("Travel Advice"))
        .await
        .unwrap();

    engine
        .set_review_status(
            tenant,
            items[0].key(),
            AgeGroup::Adult,
            ReviewState::Approved,
            None,
            actor,
        )
        .await
        .unwrap();
    engine
        .set_review_status(
            tenant,
            items[1].key(),
            AgeGroup::Adult,
            ReviewState::ChangesRequired,
            Some("needs red flags".to_string()),
            actor,
        )
        .await
        .unwrap();

    for visibility in Visibility::ALL {
        let summary = engine.review_summary(tenant, visibility).await.unwrap();
        let counts = summary.counts();
        assert!(counts.is_consistent());
        assert_eq!(counts.all, 5);
        assert_eq!(counts.approved, 1);
        assert_eq!(counts.changes_required, 1);
        assert_eq!(counts.pending, 3);
    }
}

#[tokio::test]
async fn deleting_a_base_item_drops_dependent_rows_and_views() {
    let engine = engine();
    let tenant = new_entity_id();
    let actor = new_entity_id();
    let base = seed_library(&engine, &["Earache"]).await.remove(0);

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
    engine
        .set_review_status(
            tenant,
            base.key(),
            AgeGroup::Adult,
            ReviewState::Approved,
            None,
            actor,
        )
        .await
        .unwrap();

    engine.delete_base_item(base.base_item_id).await.unwrap();

    assert!(engine
        .resolve(tenant, Visibility::WithDisabled)
        .await
        .unwrap()
        .is_empty());
    assert!(engine
        .store()
        .override_get(tenant, base.base_item_id)
        .await
        .unwrap()
        .is_none());
    assert!(engine
        .store()
        .review_get(tenant, base.key(), AgeGroup::Adult)
        .await
        .unwrap()
        .is_none());
}
