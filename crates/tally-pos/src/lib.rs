//! # tally-pos: Workflows and Services for Tally POS
//!
//! What request handlers call. Each service owns its transaction
//! boundaries; handlers never see a connection.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Service Layer                          │
//! │                                                                         │
//! │  request handler ──► RequestContext { staff_id, shop_id }               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌───────────────────────────── Pos ──────────────────────────────────┐ │
//! │  │                                                                    │ │
//! │  │  CheckoutService ─────────┐      ReceivingService                  │ │
//! │  │   complete_sale()         │       receive_purchase_order()         │ │
//! │  │        │ outbox entry     │              │                         │ │
//! │  │        ▼                  │              ▼                         │ │
//! │  │  OutboxProcessor ◄────────┘      stock + status + audit, one tx    │ │
//! │  │   loyalty accrual, exactly once                                    │ │
//! │  │                                                                    │ │
//! │  │  Catalog · Customers · Purchasing · Expenses · Settings            │ │
//! │  │  Analytics · Alerts   (reads wrapped in with_retry)                │ │
//! │  └────────────────────────────────────────────────────────────────────┘ │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  tally-db repositories ──► SQLite                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Workflows
//! - [`checkout`] - Cart to completed sale
//! - [`receiving`] - Purchase order into stock, with audit
//! - [`loyalty`] - Outbox processor for loyalty accrual
//!
//! ### Services
//! - [`catalog`] - Products, categories, bulk import
//! - [`customers`] - CRM contact records
//! - [`purchasing`] - Suppliers, purchase orders, stock audit reads
//! - [`expenses`] - Operating costs
//! - [`settings`] - Shop details
//! - [`analytics`] - Dashboard summary and advanced metrics
//! - [`alerts`] - Low-stock check
//!
//! ### Infrastructure
//! - [`attribution`] - Staff/shop resolution for writes
//! - [`config`] - TOML + environment configuration
//! - [`error`] - `PosError` and the wire error shape
//! - [`retry`] - Backoff for idempotent reads
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_pos::{Pos, PosConfig, RequestContext};
//!
//! let config = PosConfig::load_or_default(None);
//! tally_pos::telemetry::init_tracing(&config.logging);
//! let pos = Pos::open(config).await?;
//!
//! let outcome = pos
//!     .checkout
//!     .complete_sale(&RequestContext::for_staff(staff_id), request)
//!     .await?;
//! println!("Sale {} total {}", outcome.sale.id, outcome.sale.total());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alerts;
pub mod analytics;
pub mod attribution;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod customers;
pub mod error;
pub mod expenses;
pub mod loyalty;
pub mod purchasing;
pub mod receiving;
pub mod retry;
pub mod settings;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService, LoyaltyStatus};
pub use config::{ConfigError, PosConfig};
pub use error::{ErrorCode, ErrorResponse, PosError, PosResult};
pub use loyalty::{ApplyOutcome, DrainReport, OutboxProcessor};
pub use receiving::{ReceivingOutcome, ReceivingService, StockAuditDetail};
pub use retry::{with_retry, RetryPolicy};
pub use tally_core::RequestContext;

use std::sync::Arc;

use tracing::info;

use tally_db::Database;

use crate::alerts::AlertService;
use crate::analytics::AnalyticsService;
use crate::attribution::AttributionResolver;
use crate::catalog::CatalogService;
use crate::customers::CustomerService;
use crate::expenses::ExpenseService;
use crate::purchasing::PurchasingService;
use crate::settings::SettingsService;

// =============================================================================
// Service Bundle
// =============================================================================

/// Every service, wired to one database.
pub struct Pos {
    pub db: Arc<Database>,
    pub checkout: CheckoutService,
    pub receiving: ReceivingService,
    pub outbox: OutboxProcessor,
    pub catalog: CatalogService,
    pub customers: CustomerService,
    pub purchasing: PurchasingService,
    pub expenses: ExpenseService,
    pub settings: SettingsService,
    pub analytics: AnalyticsService,
    pub alerts: AlertService,
}

impl Pos {
    /// Opens the database named by `config` and builds the services.
    pub async fn open(config: PosConfig) -> PosResult<Self> {
        let db = Arc::new(Database::new(config.database.db_config()).await?);
        info!(path = %config.database.path.display(), "Database opened");
        Ok(Self::with_database(db, &config))
    }

    pub fn with_database(db: Arc<Database>, config: &PosConfig) -> Self {
        let attribution = AttributionResolver::new(config.tenancy.fallback_to_first_shop);
        let retry = RetryPolicy::from(&config.retry);

        Pos {
            checkout: CheckoutService::new(db.clone(), config),
            receiving: ReceivingService::new(db.clone()),
            outbox: OutboxProcessor::new(db.clone(), config.outbox.clone()),
            catalog: CatalogService::new(db.clone(), attribution, retry),
            customers: CustomerService::new(db.clone(), attribution, retry),
            purchasing: PurchasingService::new(db.clone(), attribution, retry),
            expenses: ExpenseService::new(db.clone(), attribution, retry),
            settings: SettingsService::new(db.clone(), attribution),
            analytics: AnalyticsService::new(db.clone(), retry),
            alerts: AlertService::new(db.clone(), retry),
            db,
        }
    }
}
