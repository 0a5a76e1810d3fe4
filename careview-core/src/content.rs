//! Content shape shared by base and custom items, plus the override
//! field-patch primitives.
//!
//! Overrides are sparse: every patchable field is a [`FieldPatch`], an
//! explicit two-state optional (inherit vs set). The merge of a patch onto
//! base content is enumerated once, in [`ContentPatch::apply_to`], so a new
//! content field cannot silently bypass override semantics.

use crate::{compute_content_hash, ContentHash};
use serde::{Deserialize, Serialize};

// ============================================================================
// INSTRUCTION DOCUMENT
// ============================================================================

/// Full instructions for an item: the editor document plus rendered forms.
///
/// The `document` value is opaque editor JSON owned by the (external) rich
/// text tooling. The rendered `html` and `text` forms are what the engine
/// serves; `text` also feeds the content hash used for change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionDoc {
    /// Opaque editor document (rich-text JSON)
    pub document: serde_json::Value,
    /// Rendered HTML form
    pub html: String,
    /// Rendered plain-text form
    pub text: String,
    /// SHA-256 of the rendered text
    pub content_hash: ContentHash,
}

impl InstructionDoc {
    /// Build a document, computing the content hash from the rendered text.
    pub fn new(document: serde_json::Value, html: String, text: String) -> Self {
        let content_hash = compute_content_hash(text.as_bytes());
        Self {
            document,
            html,
            text,
            content_hash,
        }
    }

    /// Build a single-paragraph document from plain text.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        let document = serde_json::json!({
            "blocks": [{ "type": "paragraph", "text": text }],
        });
        let html = format!("<p>{}</p>", text);
        Self::new(document, html, text)
    }
}

// ============================================================================
// ITEM CONTENT
// ============================================================================

/// The content fields every guidance item carries, regardless of layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemContent {
    /// Display name
    pub name: String,
    /// Brief instruction text shown in list views
    pub brief: String,
    /// Full instructions
    pub instructions: InstructionDoc,
    /// Highlighted-text annotation
    pub highlight: Option<String>,
    /// Optional external link
    pub link: Option<String>,
}

impl ItemContent {
    pub fn new(name: impl Into<String>, brief: impl Into<String>, instructions: InstructionDoc) -> Self {
        Self {
            name: name.into(),
            brief: brief.into(),
            instructions,
            highlight: None,
            link: None,
        }
    }
}

// ============================================================================
// FIELD PATCH
// ============================================================================

/// A tagged optional for one overridable field: either inherit the live base
/// value or replace it.
///
/// For fields that are themselves optional on the base item (highlight,
/// link), `Set(None)` clears the field rather than inheriting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldPatch<T> {
    /// Inherit the current base value
    Inherit,
    /// Replace the base value
    Set(T),
}

// Not derived: the derive would demand `T: Default`, which the inherit
// default never needs.
impl<T> Default for FieldPatch<T> {
    fn default() -> Self {
        FieldPatch::Inherit
    }
}

impl<T> FieldPatch<T> {
    pub fn is_inherit(&self) -> bool {
        matches!(self, FieldPatch::Inherit)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, FieldPatch::Set(_))
    }

    /// The overridden value, if any.
    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldPatch::Inherit => None,
            FieldPatch::Set(value) => Some(value),
        }
    }

    /// Resolve against the live base value.
    pub fn resolve(&self, base: &T) -> T
    where
        T: Clone,
    {
        match self {
            FieldPatch::Inherit => base.clone(),
            FieldPatch::Set(value) => value.clone(),
        }
    }
}

// ============================================================================
// CONTENT PATCH
// ============================================================================

/// Sparse per-field patch applied by a tenant override onto base content.
///
/// This is the single place where override merge semantics are enumerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPatch {
    pub name: FieldPatch<String>,
    pub brief: FieldPatch<String>,
    pub instructions: FieldPatch<InstructionDoc>,
    pub highlight: FieldPatch<Option<String>>,
    pub link: FieldPatch<Option<String>>,
}

impl ContentPatch {
    /// True when no field is overridden.
    pub fn is_empty(&self) -> bool {
        self.name.is_inherit()
            && self.brief.is_inherit()
            && self.instructions.is_inherit()
            && self.highlight.is_inherit()
            && self.link.is_inherit()
    }

    /// Merge this patch onto base content, field by field. Unset fields
    /// inherit the live base value.
    pub fn apply_to(&self, base: &ItemContent) -> ItemContent {
        ItemContent {
            name: self.name.resolve(&base.name),
            brief: self.brief.resolve(&base.brief),
            instructions: self.instructions.resolve(&base.instructions),
            highlight: self.highlight.resolve(&base.highlight),
            link: self.link.resolve(&base.link),
        }
    }
}

// ============================================================================
// SLUG DERIVATION
// ============================================================================

/// Derive a URL-safe slug from a display name: lowercased, runs of
/// non-alphanumeric characters collapsed to a single hyphen, leading and
/// trailing hyphens trimmed.
pub fn derive_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            // Lowercasing can expand to multiple chars (e.g. combining
            // marks); only the alphanumeric ones belong in a slug.
            for lower in c.to_lowercase().filter(|lc| lc.is_alphanumeric()) {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_patch_resolve() {
        let inherit: FieldPatch<String> = FieldPatch::Inherit;
        let set = FieldPatch::Set("Sore throat".to_string());
        let base = "Earache".to_string();

        assert_eq!(inherit.resolve(&base), "Earache");
        assert_eq!(set.resolve(&base), "Sore throat");
    }

    #[test]
    fn test_field_patch_set_none_clears_optional_field() {
        let clear: FieldPatch<Option<String>> = FieldPatch::Set(None);
        let base = Some("see notes".to_string());
        assert_eq!(clear.resolve(&base), None);
    }

    #[test]
    fn test_content_patch_empty_and_apply() {
        let base = ItemContent::new("Earache", "See GP if persisting", InstructionDoc::plain("Rest and fluids."));

        let empty = ContentPatch::default();
        assert!(empty.is_empty());
        assert_eq!(empty.apply_to(&base), base);

        let patch = ContentPatch {
            brief: FieldPatch::Set("Call 111".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        let merged = patch.apply_to(&base);
        assert_eq!(merged.brief, "Call 111");
        // Unset fields inherit live from the base.
        assert_eq!(merged.name, base.name);
        assert_eq!(merged.instructions, base.instructions);
    }

    #[test]
    fn test_instruction_doc_hash_tracks_text() {
        let a = InstructionDoc::plain("Rest and fluids.");
        let b = InstructionDoc::plain("Rest and fluids.");
        let c = InstructionDoc::plain("Seek urgent care.");
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.content_hash, c.content_hash);
    }

    #[test]
    fn test_derive_slug() {
        assert_eq!(derive_slug("Travel Vaccination Advice"), "travel-vaccination-advice");
        assert_eq!(derive_slug("  Earache!!  "), "earache");
        assert_eq!(derive_slug("D&V (adults)"), "d-v-adults");
        assert_eq!(derive_slug("---"), "");
        assert_eq!(derive_slug(""), "");
    }

    #[test]
    fn test_derive_slug_collapses_runs() {
        assert_eq!(derive_slug("a   ...   b"), "a-b");
    }
}
