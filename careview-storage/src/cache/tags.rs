//! Cache keys and the invalidation-tag contract.
//!
//! Tag formats are persisted contract strings other subsystems depend on:
//! `tenant:{tenantId}:{enabled|with-disabled}` and the sentinel
//! `all-items`. Do not change them.

use careview_core::{TenantId, Visibility};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Global invalidation tag carried by every cache entry.
pub const ALL_ITEMS_TAG: &str = "all-items";

/// The global tag, as an owned string.
pub fn all_items_tag() -> String {
    ALL_ITEMS_TAG.to_string()
}

/// Tenant-scoped invalidation tag for one visibility mode.
pub fn tenant_tag(tenant_id: TenantId, visibility: Visibility) -> String {
    format!("tenant:{}:{}", tenant_id, visibility.cache_mode())
}

/// Cache key for one tenant's resolved view in one visibility mode.
///
/// A key cannot be constructed without a tenant id, so cross-tenant cache
/// reads are impossible by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewKey {
    pub tenant_id: TenantId,
    pub visibility: Visibility,
}

impl ViewKey {
    pub fn new(tenant_id: TenantId, visibility: Visibility) -> Self {
        Self {
            tenant_id,
            visibility,
        }
    }

    /// The tenant-scoped tag for this key.
    pub fn tenant_tag(&self) -> String {
        tenant_tag(self.tenant_id, self.visibility)
    }

    /// The full tag set for this key: exactly the tenant-scoped tag plus
    /// the global sentinel.
    pub fn tags(&self) -> [String; 2] {
        [self.tenant_tag(), all_items_tag()]
    }

    /// Both visibility-mode keys for a tenant. Invalidation always covers
    /// both variants.
    pub fn both_modes(tenant_id: TenantId) -> [ViewKey; 2] {
        [
            ViewKey::new(tenant_id, Visibility::Enabled),
            ViewKey::new(tenant_id, Visibility::WithDisabled),
        ]
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tenant_tag())
    }
}

// =============================================================================
// TESTS
// =============================================================================
