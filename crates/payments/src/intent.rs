//! Payment-intent parameter construction
//!
//! Pure translation from (product, rail, customer) to the provider's
//! intent-creation parameters. Each rail carries its own confirmation and
//! expiry semantics; everything else about the intent is identical.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use stripe::{
    CreatePaymentIntent, CreatePaymentIntentPaymentMethodOptions,
    CreatePaymentIntentPaymentMethodOptionsBoleto, CreatePaymentIntentPaymentMethodOptionsPix,
    Currency, CustomerId, PaymentIntentConfirmationMethod,
};
use uuid::Uuid;

use crate::catalog::Product;
use crate::error::{PaymentError, PaymentResult};

/// PIX charges expire 24 hours after creation.
pub const PIX_EXPIRES_AFTER_SECONDS: i64 = 86_400;
/// Boleto vouchers expire 3 days after creation.
pub const BOLETO_EXPIRES_AFTER_DAYS: u32 = 3;

/// Payment method family. Unknown selectors are rejected at parse time
/// rather than silently treated as card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRail {
    Card,
    Pix,
    Boleto,
}

impl PaymentRail {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRail::Card => "card",
            PaymentRail::Pix => "pix",
            PaymentRail::Boleto => "boleto",
        }
    }
}

impl std::fmt::Display for PaymentRail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentRail {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentRail::Card),
            "pix" => Ok(PaymentRail::Pix),
            "boleto" => Ok(PaymentRail::Boleto),
            other => Err(PaymentError::InvalidRail(other.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentRail {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Convert a decimal price to integer minor units (cents), truncating at the
/// currency's native precision: 197.00 -> 19700.
pub fn minor_units(price: Decimal) -> PaymentResult<i64> {
    (price * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or(PaymentError::AmountOutOfRange(price))
}

/// Build the intent-creation parameters for one purchase attempt.
pub fn build_payment_intent(
    product: &Product,
    rail: PaymentRail,
    customer: CustomerId,
    user_id: Uuid,
) -> PaymentResult<CreatePaymentIntent<'static>> {
    let amount = minor_units(product.price)?;

    let mut params = CreatePaymentIntent::new(amount, Currency::BRL);
    params.customer = Some(customer);
    params.confirmation_method = Some(PaymentIntentConfirmationMethod::Automatic);
    params.payment_method_types = Some(vec![rail.as_str().to_string()]);

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("product_id".to_string(), product.id.to_string());
    metadata.insert("user_id".to_string(), user_id.to_string());
    metadata.insert("payment_method".to_string(), rail.as_str().to_string());
    params.metadata = Some(metadata);

    params.payment_method_options = match rail {
        PaymentRail::Card => None,
        PaymentRail::Pix => Some(CreatePaymentIntentPaymentMethodOptions {
            pix: Some(CreatePaymentIntentPaymentMethodOptionsPix {
                expires_after_seconds: Some(PIX_EXPIRES_AFTER_SECONDS),
                ..Default::default()
            }),
            ..Default::default()
        }),
        PaymentRail::Boleto => Some(CreatePaymentIntentPaymentMethodOptions {
            boleto: Some(CreatePaymentIntentPaymentMethodOptionsBoleto {
                expires_after_days: Some(BOLETO_EXPIRES_AFTER_DAYS),
                ..Default::default()
            }),
            ..Default::default()
        }),
    };

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn product(price: &str) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Curso Python Avançado".to_string(),
            description: "Curso completo".to_string(),
            price: price.parse().unwrap(),
            stripe_product_id: Some("prod_test".to_string()),
            stripe_price_id: Some("price_test".to_string()),
            active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn customer() -> CustomerId {
        "cus_test123".parse().unwrap()
    }

    #[test]
    fn converts_price_to_minor_units() {
        assert_eq!(minor_units("197.00".parse().unwrap()).unwrap(), 19700);
        assert_eq!(minor_units("47.90".parse().unwrap()).unwrap(), 4790);
        assert_eq!(minor_units("0.01".parse().unwrap()).unwrap(), 1);
    }

    #[test]
    fn card_intent_has_single_rail_and_no_options() {
        let params =
            build_payment_intent(&product("197.00"), PaymentRail::Card, customer(), Uuid::new_v4())
                .unwrap();

        assert_eq!(params.amount, 19700);
        assert_eq!(params.currency, Currency::BRL);
        assert_eq!(params.payment_method_types, Some(vec!["card".to_string()]));
        assert!(params.payment_method_options.is_none());
        assert_eq!(
            params.confirmation_method,
            Some(PaymentIntentConfirmationMethod::Automatic)
        );
    }

    #[test]
    fn pix_intent_expires_after_24_hours() {
        let params =
            build_payment_intent(&product("47.90"), PaymentRail::Pix, customer(), Uuid::new_v4())
                .unwrap();

        assert_eq!(params.payment_method_types, Some(vec!["pix".to_string()]));
        let options = params.payment_method_options.unwrap();
        assert_eq!(options.pix.unwrap().expires_after_seconds, Some(86_400));
        assert!(options.boleto.is_none());
    }

    #[test]
    fn boleto_intent_expires_after_3_days() {
        let params = build_payment_intent(
            &product("97.00"),
            PaymentRail::Boleto,
            customer(),
            Uuid::new_v4(),
        )
        .unwrap();

        assert_eq!(params.payment_method_types, Some(vec!["boleto".to_string()]));
        let options = params.payment_method_options.unwrap();
        assert_eq!(options.boleto.unwrap().expires_after_days, Some(3));
        assert!(options.pix.is_none());
    }

    #[test]
    fn carries_correlation_metadata() {
        let product = product("47.90");
        let user_id = Uuid::new_v4();
        let params =
            build_payment_intent(&product, PaymentRail::Pix, customer(), user_id).unwrap();

        let metadata = params.metadata.unwrap();
        assert_eq!(metadata["product_id"], product.id.to_string());
        assert_eq!(metadata["user_id"], user_id.to_string());
        assert_eq!(metadata["payment_method"], "pix");
    }

    #[test]
    fn unknown_rail_is_rejected() {
        assert!(matches!(
            "barter".parse::<PaymentRail>(),
            Err(PaymentError::InvalidRail(_))
        ));
    }
}
