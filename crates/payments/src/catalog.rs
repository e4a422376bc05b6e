//! Product catalog
//!
//! Local catalog rows plus lazy provisioning of their Stripe counterparts.
//! External product/price ids are created at most once per product: the first
//! save without ids provisions them, later saves are no-ops.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::PaymentResult;
use crate::intent::minor_units;

/// Catalog item.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stripe_product_id, stripe_price_id, active, created_at";

#[derive(Clone)]
pub struct ProductCatalog {
    stripe: StripeClient,
    pool: PgPool,
}

impl ProductCatalog {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    pub async fn list_active(&self) -> PaymentResult<Vec<Product>> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE active ORDER BY created_at DESC"
        );

        let products = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(products)
    }

    pub async fn get_active(&self, product_id: Uuid) -> PaymentResult<Option<Product>> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND active");

        let product = sqlx::query_as(&query)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn count(&self) -> PaymentResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Insert a catalog row and provision its Stripe counterpart.
    /// Provisioning failure is logged and does not block the local row; the
    /// next save retries it.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        price: Decimal,
    ) -> PaymentResult<Product> {
        let query = format!(
            r#"
            INSERT INTO products (id, name, description, price)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let product: Product = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(description)
            .bind(price)
            .fetch_one(&self.pool)
            .await?;

        match self.ensure_provisioned(&product).await {
            Ok(product) => Ok(product),
            Err(e) => {
                tracing::error!(
                    product_id = %product.id,
                    error = %e,
                    "Failed to provision product with Stripe"
                );
                Ok(product)
            }
        }
    }

    /// Create the Stripe product and BRL price for a catalog row that does
    /// not have them yet. Idempotent: rows with ids are returned unchanged,
    /// and the persistence step refuses to overwrite ids written by a
    /// concurrent provisioner.
    pub async fn ensure_provisioned(&self, product: &Product) -> PaymentResult<Product> {
        if product.stripe_product_id.is_some() {
            return Ok(product.clone());
        }

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("catalog_id".to_string(), product.id.to_string());

        let mut params = stripe::CreateProduct::new(&product.name);
        params.description = Some(&product.description);
        params.metadata = Some(metadata);
        let stripe_product = stripe::Product::create(self.stripe.inner(), params).await?;

        let mut price_params = stripe::CreatePrice::new(stripe::Currency::BRL);
        price_params.product = Some(stripe::IdOrCreate::Id(stripe_product.id.as_str()));
        price_params.unit_amount = Some(minor_units(product.price)?);
        let stripe_price = stripe::Price::create(self.stripe.inner(), price_params).await?;

        let query = format!(
            r#"
            UPDATE products
            SET stripe_product_id = $2, stripe_price_id = $3
            WHERE id = $1 AND stripe_product_id IS NULL
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let updated: Option<Product> = sqlx::query_as(&query)
            .bind(product.id)
            .bind(stripe_product.id.as_str())
            .bind(stripe_price.id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(product) => {
                tracing::info!(
                    product_id = %product.id,
                    stripe_product_id = %stripe_product.id,
                    "Provisioned product with Stripe"
                );
                Ok(product)
            }
            // Another provisioner won the race; its ids stand.
            None => {
                let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
                let current = sqlx::query_as(&query)
                    .bind(product.id)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(current)
            }
        }
    }
}
