//! Test fixtures: a fresh store with one shop, one staff member and one
//! customer. In-memory by default; `file_backed` gives a pooled WAL database
//! where transactions really run on separate connections.

use std::sync::Arc;

use tempfile::TempDir;

use tally_core::{Customer, Product, RequestContext};
use tally_db::{
    CustomerRepository, Database, DbConfig, NewCustomer, NewProduct, NewSupplier,
    ProductRepository, ProfileRepository, ShopDetails, ShopRepository, SupplierRepository,
};

use crate::checkout::CheckoutService;
use crate::config::PosConfig;
use crate::loyalty::OutboxProcessor;
use crate::receiving::ReceivingService;

pub(crate) struct Fixture {
    pub db: Arc<Database>,
    pub config: PosConfig,
    pub shop_id: String,
    pub staff_id: String,
    pub customer_id: String,
    _dir: Option<TempDir>,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::seed(db, None).await
    }

    /// A database file in a temporary directory, pooled over `max_connections`.
    pub async fn file_backed(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("tally.db")).max_connections(max_connections);
        let db = Database::new(config).await.unwrap();
        Self::seed(db, Some(dir)).await
    }

    async fn seed(db: Database, dir: Option<TempDir>) -> Self {
        let mut conn = db.acquire().await.unwrap();

        let shop = ShopRepository::new(&mut conn)
            .insert(&ShopDetails {
                name: "Test Pharmacy".to_string(),
                address: Some("Ring Road".to_string()),
                phone: None,
                currency: "GHS".to_string(),
            })
            .await
            .unwrap();

        let staff = ProfileRepository::new(&mut conn)
            .insert("staff-1", Some("Kofi Boateng"), "cashier", Some(shop.id.as_str()))
            .await
            .unwrap();

        let customer = CustomerRepository::new(&mut conn)
            .insert(&NewCustomer {
                shop_id: Some(shop.id.clone()),
                full_name: "Ama Mensah".to_string(),
                phone: Some("0244000000".to_string()),
                email: None,
            })
            .await
            .unwrap();

        drop(conn);

        Fixture {
            db: Arc::new(db),
            config: PosConfig::default(),
            shop_id: shop.id,
            staff_id: staff.id,
            customer_id: customer.id,
            _dir: dir,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::for_staff(&self.staff_id)
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.db.clone(), &self.config)
    }

    pub fn receiving(&self) -> ReceivingService {
        ReceivingService::new(self.db.clone())
    }

    pub fn outbox_processor(&self) -> OutboxProcessor {
        OutboxProcessor::new(self.db.clone(), self.config.outbox.clone())
    }

    pub async fn product(&self, sku: &str, price_cents: i64, stock: i64) -> Product {
        let mut conn = self.db.acquire().await.unwrap();
        ProductRepository::new(&mut conn)
            .insert(&NewProduct {
                shop_id: Some(self.shop_id.clone()),
                category_id: None,
                name: format!("Product {sku}"),
                sku: sku.to_string(),
                price_cents,
                cost_cents: price_cents / 2,
                stock_quantity: stock,
                low_stock_threshold: 5,
            })
            .await
            .unwrap()
    }

    pub async fn supplier(&self, name: &str) -> String {
        let mut conn = self.db.acquire().await.unwrap();
        SupplierRepository::new(&mut conn)
            .insert(&NewSupplier {
                shop_id: Some(self.shop_id.clone()),
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    pub async fn stock_of(&self, product_id: &str) -> i64 {
        let mut conn = self.db.acquire().await.unwrap();
        ProductRepository::new(&mut conn)
            .get_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    pub async fn customer(&self, id: &str) -> Customer {
        let mut conn = self.db.acquire().await.unwrap();
        CustomerRepository::new(&mut conn)
            .get_by_id(id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Row count of a table, for asserting that nothing was written.
    pub async fn count(&self, table: &str) -> i64 {
        let mut conn = self.db.acquire().await.unwrap();
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    /// Runs raw SQL, e.g. to install a trigger that makes a later write fail.
    pub async fn execute(&self, sql: &str) {
        let mut conn = self.db.acquire().await.unwrap();
        sqlx::query(sql).execute(&mut *conn).await.unwrap();
    }
}
