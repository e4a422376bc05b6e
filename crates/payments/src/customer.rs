//! Customer resolution
//!
//! Maps an authenticated user to a stable Stripe customer id, reusing an
//! existing customer when one is already registered under the same email.

use stripe::{CreateCustomer, Customer, CustomerId, ListCustomers};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::PaymentResult;

#[derive(Clone)]
pub struct CustomerService {
    stripe: StripeClient,
}

impl CustomerService {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    /// Find the customer registered under `email`, or create one tagged with
    /// the internal user id for traceability. Any provider error aborts the
    /// enclosing checkout before a payment row exists.
    pub async fn resolve(
        &self,
        email: &str,
        name: &str,
        user_id: Uuid,
    ) -> PaymentResult<CustomerId> {
        let mut list = ListCustomers::new();
        list.email = Some(email);
        list.limit = Some(1);

        let existing = Customer::list(self.stripe.inner(), &list).await?;
        if let Some(customer) = existing.data.into_iter().next() {
            tracing::debug!(customer_id = %customer.id, "Reusing existing Stripe customer");
            return Ok(customer.id);
        }

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("sandbox_user_id".to_string(), user_id.to_string());

        let params = CreateCustomer {
            email: Some(email),
            name: Some(name),
            metadata: Some(metadata),
            ..Default::default()
        };

        let customer = Customer::create(self.stripe.inner(), params).await?;
        tracing::info!(
            customer_id = %customer.id,
            user_id = %user_id,
            "Created Stripe customer"
        );

        Ok(customer.id)
    }
}
