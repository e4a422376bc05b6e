//! Sandbox bootstrap
//!
//! Seeds the demo catalog and a sandbox user with a ready-to-use bearer
//! token so the API is exercisable out of the box. Runs only when
//! SEED_SANDBOX is enabled and only against an empty catalog.

use rand::distr::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use caixa_payments::PaymentsService;

const DEMO_PRODUCTS: &[(&str, &str, &str)] = &[
    (
        "Curso Python Avançado",
        "Curso completo de Python com Django",
        "197.00",
    ),
    (
        "E-book Stripe Brasil",
        "Guia definitivo do Stripe no Brasil",
        "47.90",
    ),
    (
        "Consultoria 1h",
        "Mentoria personalizada em pagamentos",
        "250.00",
    ),
    (
        "Workshop Boletos",
        "Como implementar boletos com Stripe",
        "97.00",
    ),
];

pub async fn seed_sandbox(pool: &PgPool, payments: &PaymentsService) -> anyhow::Result<()> {
    seed_products(payments).await?;
    seed_sandbox_user(pool).await?;
    Ok(())
}

async fn seed_products(payments: &PaymentsService) -> anyhow::Result<()> {
    if payments.catalog.count().await? > 0 {
        tracing::debug!("Catalog already populated, skipping product seed");
        return Ok(());
    }

    for (name, description, price) in DEMO_PRODUCTS {
        let price: Decimal = price.parse()?;
        let product = payments.catalog.create(name, description, price).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "Seeded demo product");
    }

    Ok(())
}

/// Get-or-create the sandbox user and one bearer token for it. The token is
/// logged so it can be copied into a client; this is a sandbox, not a
/// credential store.
async fn seed_sandbox_user(pool: &PgPool) -> anyhow::Result<()> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, email, full_name)
        VALUES ($1, 'sandbox_user', 'sandbox@example.com', 'Usuário Sandbox')
        ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT token FROM api_tokens WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let token = match existing {
        Some((token,)) => token,
        None => {
            let token: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(40)
                .map(char::from)
                .collect();
            sqlx::query("INSERT INTO api_tokens (token, user_id) VALUES ($1, $2)")
                .bind(&token)
                .bind(user_id)
                .execute(pool)
                .await?;
            token
        }
    };

    tracing::info!(user_id = %user_id, token = %token, "Sandbox user ready");
    Ok(())
}
