//! Payment ledger
//!
//! Durable record of every purchase attempt. Rows are created in `pending`
//! at intent-creation time, mutated only through [`PaymentLedger::apply_transition`],
//! and never deleted.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{PaymentError, PaymentResult};
use crate::intent::PaymentRail;

/// Lifecycle status of a payment, mirroring the provider's intent vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    RequiresAction,
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "requires_action" => Ok(PaymentStatus::RequiresAction),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(PaymentError::InvalidStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One purchase attempt.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    /// Correlation key between local state and provider events.
    /// Unique and immutable once set.
    pub stripe_payment_intent_id: String,
    pub stripe_customer_id: String,
    pub amount: Decimal,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub rail: PaymentRail,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub stripe_fee: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
}

/// Fee breakdown reported by the provider for a settled payment.
#[derive(Debug, Clone, Copy)]
pub struct TransitionFinancials {
    pub stripe_fee: Decimal,
    pub net_amount: Decimal,
}

const PAYMENT_COLUMNS: &str = "id, user_id, product_id, stripe_payment_intent_id, \
     stripe_customer_id, amount, currency, rail, status, stripe_fee, net_amount, \
     created_at, updated_at, paid_at";

/// Store for payment rows. The only component allowed to mutate them.
#[derive(Clone)]
pub struct PaymentLedger {
    pool: PgPool,
}

impl PaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new row in `pending` status.
    pub async fn create(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rail: PaymentRail,
        intent_id: &str,
        customer_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> PaymentResult<Payment> {
        let query = format!(
            r#"
            INSERT INTO payments
                (id, user_id, product_id, stripe_payment_intent_id, stripe_customer_id,
                 amount, currency, rail, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(product_id)
            .bind(intent_id)
            .bind(customer_id)
            .bind(amount)
            .bind(currency)
            .bind(rail.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    PaymentError::DuplicateIntent(intent_id.to_string())
                } else {
                    PaymentError::Database(e)
                }
            })
    }

    /// Look up a payment by its provider intent id. Absence is a recoverable,
    /// logged condition for reconciliation callers: the provider may reference
    /// intents this system never created.
    pub async fn find_by_intent_id(&self, intent_id: &str) -> PaymentResult<Option<Payment>> {
        let query =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE stripe_payment_intent_id = $1");

        let payment = sqlx::query_as(&query)
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    /// Owner-scoped fetch.
    pub async fn get_for_user(
        &self,
        payment_id: Uuid,
        user_id: Uuid,
    ) -> PaymentResult<Option<Payment>> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND user_id = $2");

        let payment = sqlx::query_as(&query)
            .bind(payment_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    /// Owner-scoped list, newest first, optionally filtered by status and rail.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<PaymentStatus>,
        rail: Option<PaymentRail>,
    ) -> PaymentResult<Vec<Payment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR rail = $3)
            ORDER BY created_at DESC
            "#
        );

        let payments = sqlx::query_as(&query)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .bind(rail.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    /// Apply a status transition. This is the only mutation path for payment
    /// rows; both webhook ingestion and pull reconciliation funnel through it.
    ///
    /// Invariants enforced in a single atomic UPDATE (the per-row write lock
    /// of that statement serializes concurrent reconcilers):
    /// - `paid_at` is set on the first transition into `succeeded` and never
    ///   overwritten by a re-applied `succeeded`;
    /// - fee and net amount are written only on `succeeded` transitions and
    ///   only when provided; a later bare transition cannot clear them.
    pub async fn apply_transition(
        &self,
        payment_id: Uuid,
        new_status: PaymentStatus,
        financials: Option<TransitionFinancials>,
    ) -> PaymentResult<Payment> {
        let (fee, net) = match financials {
            Some(f) => (Some(f.stripe_fee), Some(f.net_amount)),
            None => (None, None),
        };

        let query = format!(
            r#"
            UPDATE payments
            SET status = $2,
                paid_at = CASE WHEN $2 = 'succeeded'
                               THEN COALESCE(paid_at, NOW())
                               ELSE paid_at END,
                stripe_fee = CASE WHEN $2 = 'succeeded'
                                  THEN COALESCE($3, stripe_fee)
                                  ELSE stripe_fee END,
                net_amount = CASE WHEN $2 = 'succeeded'
                                  THEN COALESCE($4, net_amount)
                                  ELSE net_amount END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let payment: Payment = sqlx::query_as(&query)
            .bind(payment_id)
            .bind(new_status.as_str())
            .bind(fee)
            .bind(net)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))?;

        tracing::info!(
            payment_id = %payment.id,
            status = %payment.status,
            "Applied payment transition"
        );

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        let all = [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::RequiresAction,
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
        ];
        for status in all {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(matches!(
            "refunded".parse::<PaymentStatus>(),
            Err(PaymentError::InvalidStatus(_))
        ));
    }
}
