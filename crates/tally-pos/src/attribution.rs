//! # Attribution
//!
//! Decides which staff member and shop a write is stamped with.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RequestContext { staff_id, shop_id }                                   │
//! │       │                                                                 │
//! │       ├── shop_id given and exists?      → Explicit                     │
//! │       │                                                                 │
//! │       ├── staff profile has a shop?      → StaffProfile                 │
//! │       │                                                                 │
//! │       ├── fallback_to_first_shop and                                    │
//! │       │   any shop exists?               → FirstShopFallback  (warn)    │
//! │       │                                                                 │
//! │       └── otherwise                      → Unresolved         (warn)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolution never fails. A lookup error is logged and the next step is
//! tried, so a flaky profile read cannot block a sale.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use tally_core::context::{Attribution, AttributionSource};
use tally_core::RequestContext;
use tally_db::{ProfileRepository, ShopRepository};

#[derive(Debug, Clone, Copy)]
pub struct AttributionResolver {
    fallback_to_first_shop: bool,
}

impl AttributionResolver {
    pub fn new(fallback_to_first_shop: bool) -> Self {
        AttributionResolver {
            fallback_to_first_shop,
        }
    }

    pub async fn resolve(&self, conn: &mut SqliteConnection, ctx: &RequestContext) -> Attribution {
        let staff_id = ctx.staff_id.clone();
        let resolved = |shop_id: String, source: AttributionSource| Attribution {
            staff_id: staff_id.clone(),
            shop_id: Some(shop_id),
            source,
        };

        if let Some(shop_id) = ctx.shop_id.as_deref() {
            match ShopRepository::new(conn).get_by_id(shop_id).await {
                Ok(Some(shop)) => return resolved(shop.id, AttributionSource::Explicit),
                Ok(None) => warn!(shop_id = %shop_id, "Requested shop does not exist"),
                Err(e) => warn!(shop_id = %shop_id, error = %e, "Shop lookup failed"),
            }
        }

        if let Some(staff) = ctx.staff_id.as_deref() {
            match ProfileRepository::new(conn).get_by_id(staff).await {
                Ok(Some(profile)) => {
                    if let Some(shop_id) = profile.shop_id {
                        return resolved(shop_id, AttributionSource::StaffProfile);
                    }
                    debug!(staff_id = %staff, "Staff profile has no shop");
                }
                Ok(None) => debug!(staff_id = %staff, "No profile for staff member"),
                Err(e) => warn!(staff_id = %staff, error = %e, "Profile lookup failed"),
            }
        }

        if self.fallback_to_first_shop {
            match ShopRepository::new(conn).first().await {
                Ok(Some(shop)) => {
                    warn!(shop_id = %shop.id, "No shop resolved, attributing to first shop");
                    return resolved(shop.id, AttributionSource::FirstShopFallback);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "First-shop lookup failed"),
            }
        }

        warn!(staff_id = ?ctx.staff_id, "Write is not attributed to any shop");
        Attribution::unresolved(ctx.staff_id.clone())
    }
}
