//! Enum types for CAREVIEW entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Age-group classifier for guidance items.
///
/// Each item targets exactly one age band; review approval is tracked per
/// (item, age group) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    /// Children under five years
    UnderFive,
    /// Children five and over
    OverFive,
    /// Adults
    Adult,
}

impl AgeGroup {
    /// Stable string form, used in persisted keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::UnderFive => "under-5",
            AgeGroup::OverFive => "over-5",
            AgeGroup::Adult => "adult",
        }
    }

    /// All age groups, in display order.
    pub const ALL: [AgeGroup; 3] = [AgeGroup::UnderFive, AgeGroup::OverFive, AgeGroup::Adult];
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an [`AgeGroup`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeGroupParseError(String);

impl fmt::Display for AgeGroupParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown age group: {}", self.0)
    }
}

impl std::error::Error for AgeGroupParseError {}

impl FromStr for AgeGroup {
    type Err = AgeGroupParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "under-5" | "under5" | "under_5" => Ok(AgeGroup::UnderFive),
            "over-5" | "over5" | "over_5" => Ok(AgeGroup::OverFive),
            "adult" => Ok(AgeGroup::Adult),
            other => Err(AgeGroupParseError(other.to_string())),
        }
    }
}

/// Clinical review approval state for one (tenant, item, age group).
///
/// The absence of a persisted row is equivalent to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewState {
    /// Not yet reviewed (lazy default)
    Pending,
    /// Approved by a clinical reviewer
    Approved,
    /// Sent back with a reviewer note
    ChangesRequired,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Pending => "pending",
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequired => "changes-required",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source provenance of an effective item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemSource {
    /// Shared-library item, visible to all tenants by default
    Base,
    /// Tenant-authored item, visible only to its owner
    Custom,
}

/// Visibility mode of a resolved view.
///
/// `Enabled` is the default tenant-facing view; `WithDisabled` additionally
/// includes items the tenant has hidden or switched off. The string forms
/// feed the persisted cache-key contract and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Only items currently enabled for the tenant
    Enabled,
    /// Enabled items plus hidden/disabled ones
    WithDisabled,
}

impl Visibility {
    /// Both visibility modes; every invalidation covers both variants.
    pub const ALL: [Visibility; 2] = [Visibility::Enabled, Visibility::WithDisabled];

    /// Whether hidden/disabled items are included in this mode.
    pub fn include_disabled(self) -> bool {
        matches!(self, Visibility::WithDisabled)
    }

    /// Build from the boolean form used at the API boundary.
    pub fn from_include_disabled(include_disabled: bool) -> Self {
        if include_disabled {
            Visibility::WithDisabled
        } else {
            Visibility::Enabled
        }
    }

    /// Stable cache-key segment: `enabled` or `with-disabled`.
    pub fn cache_mode(self) -> &'static str {
        match self {
            Visibility::Enabled => "enabled",
            Visibility::WithDisabled => "with-disabled",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_mode())
    }
}

/// Entity type discriminator for polymorphic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Tenant,
    BaseItem,
    CustomItem,
    Override,
    ReviewStatus,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Tenant => "tenant",
            EntityType::BaseItem => "base-item",
            EntityType::CustomItem => "custom-item",
            EntityType::Override => "override",
            EntityType::ReviewStatus => "review-status",
        };
        f.write_str(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_group_roundtrip() {
        for group in AgeGroup::ALL {
            let parsed: AgeGroup = group.as_str().parse().expect("parse should succeed");
            assert_eq!(group, parsed);
        }
    }

    #[test]
    fn test_age_group_parse_rejects_unknown() {
        assert!("geriatric".parse::<AgeGroup>().is_err());
    }

    #[test]
    fn test_visibility_cache_mode_is_stable() {
        // Persisted contract - other subsystems depend on these strings.
        assert_eq!(Visibility::Enabled.cache_mode(), "enabled");
        assert_eq!(Visibility::WithDisabled.cache_mode(), "with-disabled");
    }

    #[test]
    fn test_visibility_from_include_disabled() {
        assert_eq!(
            Visibility::from_include_disabled(false),
            Visibility::Enabled
        );
        assert_eq!(
            Visibility::from_include_disabled(true),
            Visibility::WithDisabled
        );
        assert!(!Visibility::Enabled.include_disabled());
        assert!(Visibility::WithDisabled.include_disabled());
    }
}
