//! # Shop Settings
//!
//! Name, address, phone and currency of the caller's shop.
//!
//! A store with no shop at all gets a default one on first read, so the
//! settings screen always has something to show.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use ts_rs::TS;

use tally_core::validation::{validate_currency, validate_name, validate_optional_text};
use tally_core::{RequestContext, Shop};
use tally_db::{Database, ShopDetails, ShopRepository};

use crate::attribution::AttributionResolver;
use crate::error::PosResult;

pub const DEFAULT_SHOP_NAME: &str = "My Shop";
pub const DEFAULT_CURRENCY: &str = "GHS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShopSettings {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub currency: String,
}

impl ShopSettings {
    fn validate(&self) -> PosResult<ShopDetails> {
        Ok(ShopDetails {
            name: validate_name("name", &self.name, 200)?,
            address: validate_optional_text("address", self.address.as_deref(), 500)?,
            phone: validate_optional_text("phone", self.phone.as_deref(), 30)?,
            currency: validate_currency(&self.currency)?,
        })
    }
}

pub struct SettingsService {
    db: Arc<Database>,
    attribution: AttributionResolver,
}

impl SettingsService {
    pub fn new(db: Arc<Database>, attribution: AttributionResolver) -> Self {
        SettingsService { db, attribution }
    }

    /// The caller's shop, the first shop, or a newly created default shop.
    pub async fn get_shop_details(&self, ctx: &RequestContext) -> PosResult<Shop> {
        let mut conn = self.db.acquire().await?;
        self.current_shop(&mut conn, ctx).await
    }

    #[instrument(skip(self, ctx, settings))]
    pub async fn update_shop_details(&self, ctx: &RequestContext, settings: ShopSettings) -> PosResult<Shop> {
        let details = settings.validate()?;

        let mut conn = self.db.acquire().await?;
        let shop = self.current_shop(&mut conn, ctx).await?;
        let updated = ShopRepository::new(&mut conn).update(&shop.id, &details).await?;

        info!(shop_id = %updated.id, "Shop details updated");
        Ok(updated)
    }

    async fn current_shop(&self, conn: &mut SqliteConnection, ctx: &RequestContext) -> PosResult<Shop> {
        let attribution = self.attribution.resolve(conn, ctx).await;

        if let Some(shop_id) = attribution.shop_id.as_deref() {
            if let Some(shop) = ShopRepository::new(conn).get_by_id(shop_id).await? {
                return Ok(shop);
            }
        }
        if let Some(shop) = ShopRepository::new(conn).first().await? {
            return Ok(shop);
        }

        let shop = ShopRepository::new(conn)
            .insert(&ShopDetails {
                name: DEFAULT_SHOP_NAME.to_string(),
                address: None,
                phone: None,
                currency: DEFAULT_CURRENCY.to_string(),
            })
            .await?;
        info!(shop_id = %shop.id, "Created default shop");
        Ok(shop)
    }
}
