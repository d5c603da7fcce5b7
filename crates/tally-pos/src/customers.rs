//! # Customer Service
//!
//! Contact records for the CRM screen. Spend and loyalty totals are read-only
//! here; only the loyalty outbox writes them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use ts_rs::TS;

use tally_core::validation::{
    validate_email, validate_id, validate_name, validate_optional_text, validate_search_query,
};
use tally_core::{Customer, RequestContext};
use tally_db::{CustomerRepository, Database, NewCustomer};

use crate::attribution::AttributionResolver;
use crate::error::PosResult;
use crate::retry::{with_retry, RetryPolicy};

const MAX_NAME_LEN: usize = 200;
const MAX_PHONE_LEN: usize = 30;
const SEARCH_LIMIT: u32 = 20;

/// Contact fields, used for both create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerContact {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

struct ValidContact {
    full_name: String,
    phone: Option<String>,
    email: Option<String>,
}

impl CustomerContact {
    fn validate(&self) -> PosResult<ValidContact> {
        Ok(ValidContact {
            full_name: validate_name("full_name", &self.full_name, MAX_NAME_LEN)?,
            phone: validate_optional_text("phone", self.phone.as_deref(), MAX_PHONE_LEN)?,
            email: validate_email(self.email.as_deref())?,
        })
    }
}

pub struct CustomerService {
    db: Arc<Database>,
    attribution: AttributionResolver,
    retry: RetryPolicy,
}

impl CustomerService {
    pub fn new(db: Arc<Database>, attribution: AttributionResolver, retry: RetryPolicy) -> Self {
        CustomerService {
            db,
            attribution,
            retry,
        }
    }

    /// All customers, newest first.
    pub async fn list_customers(&self) -> PosResult<Vec<Customer>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(CustomerRepository::new(&mut conn).list().await?)
        })
        .await
    }

    /// Substring match on name, phone or email. An empty query lists the
    /// most recent customers.
    pub async fn search_customers(&self, query: &str) -> PosResult<Vec<Customer>> {
        let query = validate_search_query(query)?;
        let db = &self.db;
        let query = query.as_str();
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(CustomerRepository::new(&mut conn)
                .search(query, SEARCH_LIMIT)
                .await?)
        })
        .await
    }

    #[instrument(skip(self, ctx, contact))]
    pub async fn create_customer(
        &self,
        ctx: &RequestContext,
        contact: CustomerContact,
    ) -> PosResult<Customer> {
        let valid = contact.validate()?;

        let mut conn = self.db.acquire().await?;
        let attribution = self.attribution.resolve(&mut conn, ctx).await;
        let customer = CustomerRepository::new(&mut conn)
            .insert(&NewCustomer {
                shop_id: attribution.shop_id,
                full_name: valid.full_name,
                phone: valid.phone,
                email: valid.email,
            })
            .await?;

        info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Replaces the contact fields of a customer.
    ///
    /// ## Errors
    /// * `Validation` - blank name, malformed email
    /// * `NotFound` - no such customer
    #[instrument(skip(self, contact))]
    pub async fn update_contact(&self, id: &str, contact: CustomerContact) -> PosResult<Customer> {
        validate_id("customer_id", id)?;
        let valid = contact.validate()?;

        let mut conn = self.db.acquire().await?;
        let customer = CustomerRepository::new(&mut conn)
            .update_contact(
                id,
                &valid.full_name,
                valid.phone.as_deref(),
                valid.email.as_deref(),
            )
            .await?;

        info!(customer_id = %customer.id, "Customer contact updated");
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;
    use crate::testing::Fixture;

    fn service(fx: &Fixture) -> CustomerService {
        CustomerService::new(fx.db.clone(), AttributionResolver::new(true), RetryPolicy::default())
    }

    fn contact(name: &str, phone: Option<&str>, email: Option<&str>) -> CustomerContact {
        CustomerContact {
            full_name: name.to_string(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_search_and_list() {
        let fx = Fixture::new().await;
        let customers = service(&fx);

        let created = customers
            .create_customer(&fx.ctx(), contact("Yaw Owusu", Some(" "), Some("yaw@example.com")))
            .await
            .unwrap();
        assert_eq!(created.phone, None);
        assert_eq!(created.shop_id.as_deref(), Some(fx.shop_id.as_str()));
        assert_eq!(created.loyalty_points, 0);

        let found = customers.search_customers("owusu").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, created.id);

        assert_eq!(customers.list_customers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_loyalty_totals() {
        let fx = Fixture::new().await;
        let customers = service(&fx);
        let mut conn = fx.db.acquire().await.unwrap();
        CustomerRepository::new(&mut conn)
            .add_loyalty(&fx.customer_id, 5000, 5)
            .await
            .unwrap();
        drop(conn);

        let updated = customers
            .update_contact(&fx.customer_id, contact("Ama K. Mensah", Some("0200000000"), None))
            .await
            .unwrap();

        assert_eq!(updated.full_name, "Ama K. Mensah");
        assert_eq!(updated.loyalty_points, 5);
        assert_eq!(updated.total_spent_cents, 5000);
    }

    #[tokio::test]
    async fn test_invalid_contact_rejected() {
        let fx = Fixture::new().await;
        let customers = service(&fx);

        let bad_email = customers
            .create_customer(&fx.ctx(), contact("Esi", None, Some("not-an-email")))
            .await;
        assert!(matches!(bad_email, Err(PosError::Validation(_))));

        let missing = customers
            .update_contact("no-such-customer", contact("Esi", None, None))
            .await;
        assert!(matches!(missing, Err(PosError::NotFound { .. })));
    }
}
