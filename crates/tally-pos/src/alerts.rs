//! Low-stock alerts.

use std::sync::Arc;

use tracing::warn;

use tally_core::Product;
use tally_db::{Database, ProductRepository};

use crate::error::PosResult;
use crate::retry::{with_retry, RetryPolicy};

pub struct AlertService {
    db: Arc<Database>,
    retry: RetryPolicy,
}

impl AlertService {
    pub fn new(db: Arc<Database>, retry: RetryPolicy) -> Self {
        AlertService { db, retry }
    }

    /// Products at or below their low-stock threshold, emptiest first.
    pub async fn check_low_stock(&self) -> PosResult<Vec<Product>> {
        let db = &self.db;
        let low = with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(ProductRepository::new(&mut conn).list_low_stock().await?)
        })
        .await?;

        if !low.is_empty() {
            warn!(count = low.len(), "Products at or below low-stock threshold");
        }
        Ok(low)
    }
}
