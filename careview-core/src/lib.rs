//! CAREVIEW Core - Entity Types
//!
//! Pure data structures with no behavior beyond constructors and the
//! field-merge primitives. All other crates depend on this. This crate
//! contains ONLY data types - no storage, no caching, no resolution logic.

pub mod content;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use content::{derive_slug, ContentPatch, FieldPatch, InstructionDoc, ItemContent};
pub use entities::{
    BaseItem, EffectiveItem, ItemKey, ReviewStatus, TenantCustomItem, TenantOverride,
};
pub use enums::{
    AgeGroup, AgeGroupParseError, EntityType, ItemSource, ReviewState, Visibility,
};
pub use error::{
    AccessError, CacheError, CareviewError, CareviewResult, StorageError, ValidationError,
};
pub use identity::{
    compute_content_hash, new_entity_id, ActorId, BaseItemId, ContentHash, CustomItemId, EntityId,
    TenantId, Timestamp,
};
