//! # Request Context
//!
//! Who is acting and for which shop. Passed explicitly into every write
//! workflow instead of being looked up from ambient session state.
//!
//! ```text
//! request handler ──► RequestContext { staff_id, shop_id }
//!                          │
//!                          ▼
//!                  attribution resolver (tally-pos)
//!                          │
//!                          ▼
//!                  Attribution { staff_id, shop_id, source } ──► Sale row
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Identity supplied by the caller. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RequestContext {
    pub staff_id: Option<String>,
    pub shop_id: Option<String>,
}

impl RequestContext {
    /// Context with nothing known (walk-up terminal, background job).
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_staff(staff_id: impl Into<String>) -> Self {
        Self {
            staff_id: Some(staff_id.into()),
            shop_id: None,
        }
    }

    pub fn with_shop(mut self, shop_id: impl Into<String>) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }
}

/// Where the shop of an [`Attribution`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttributionSource {
    /// The caller named the shop.
    Explicit,
    /// Taken from the staff member's profile.
    StaffProfile,
    /// No shop could be resolved; the first shop in the store was used.
    FirstShopFallback,
    /// No shop at all. The write proceeds unscoped.
    Unresolved,
}

/// Resolved attribution stamped onto a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Attribution {
    pub staff_id: Option<String>,
    pub shop_id: Option<String>,
    pub source: AttributionSource,
}

impl Attribution {
    pub fn unresolved(staff_id: Option<String>) -> Self {
        Self {
            staff_id,
            shop_id: None,
            source: AttributionSource::Unresolved,
        }
    }

    /// True when the shop was guessed rather than known.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self.source,
            AttributionSource::FirstShopFallback | AttributionSource::Unresolved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let ctx = RequestContext::for_staff("staff-1").with_shop("shop-1");
        assert_eq!(ctx.staff_id.as_deref(), Some("staff-1"));
        assert_eq!(ctx.shop_id.as_deref(), Some("shop-1"));
        assert_eq!(RequestContext::anonymous(), RequestContext::default());
    }

    #[test]
    fn test_fallback_flag() {
        assert!(Attribution::unresolved(None).is_fallback());
        let explicit = Attribution {
            staff_id: None,
            shop_id: Some("shop-1".to_string()),
            source: AttributionSource::Explicit,
        };
        assert!(!explicit.is_fallback());
    }
}
