// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge case tests across the payments core
//!
//! Covers boundary conditions that span modules: amount conversion limits,
//! rail/status vocabulary, and the webhook event-type mapping staying in
//! sync with the ledger vocabulary.

mod amount_tests {
    use crate::error::PaymentError;
    use crate::intent::minor_units;
    use rust_decimal::Decimal;

    #[test]
    fn whole_and_fractional_prices_convert_exactly() {
        assert_eq!(minor_units("197.00".parse().unwrap()).unwrap(), 19700);
        assert_eq!(minor_units("47.90".parse().unwrap()).unwrap(), 4790);
        assert_eq!(minor_units("250.00".parse().unwrap()).unwrap(), 25000);
        assert_eq!(minor_units("0.00".parse().unwrap()).unwrap(), 0);
    }

    #[test]
    fn sub_cent_precision_truncates() {
        // NUMERIC(10,2) columns never produce these, but the conversion must
        // not round up if handed one.
        assert_eq!(minor_units("47.909".parse().unwrap()).unwrap(), 4790);
        assert_eq!(minor_units("0.009".parse().unwrap()).unwrap(), 0);
    }

    #[test]
    fn amounts_beyond_i64_minor_units_are_rejected() {
        let huge: Decimal = "99999999999999999999.00".parse().unwrap();
        assert!(matches!(
            minor_units(huge),
            Err(PaymentError::AmountOutOfRange(_))
        ));
    }
}

mod vocabulary_tests {
    use crate::intent::PaymentRail;
    use crate::ledger::PaymentStatus;

    #[test]
    fn rail_round_trips_through_strings() {
        for rail in [PaymentRail::Card, PaymentRail::Pix, PaymentRail::Boleto] {
            assert_eq!(rail.as_str().parse::<PaymentRail>().unwrap(), rail);
        }
    }

    #[test]
    fn rail_serializes_as_snake_case() {
        let json = serde_json::to_string(&PaymentRail::Boleto).unwrap();
        assert_eq!(json, r#""boleto""#);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&PaymentStatus::RequiresAction).unwrap();
        assert_eq!(json, r#""requires_action""#);
    }
}

mod event_mapping_tests {
    use crate::ledger::PaymentStatus;
    use crate::webhooks::destination_status;
    use stripe::EventType;

    // Every handled event type must land on a ledger status the pull path can
    // also reach, so the two reconciliation paths never disagree about
    // vocabulary.
    #[test]
    fn webhook_destinations_are_ledger_statuses() {
        let handled = [
            EventType::PaymentIntentSucceeded,
            EventType::PaymentIntentPaymentFailed,
            EventType::PaymentIntentRequiresAction,
            EventType::PaymentIntentCanceled,
            EventType::PaymentIntentProcessing,
        ];
        for event_type in handled {
            let status = destination_status(&event_type).unwrap();
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn succeeded_is_the_only_paying_destination() {
        assert_eq!(
            destination_status(&EventType::PaymentIntentSucceeded),
            Some(PaymentStatus::Succeeded)
        );
        for event_type in [
            EventType::PaymentIntentPaymentFailed,
            EventType::PaymentIntentRequiresAction,
            EventType::PaymentIntentCanceled,
            EventType::PaymentIntentProcessing,
        ] {
            assert_ne!(
                destination_status(&event_type),
                Some(PaymentStatus::Succeeded)
            );
        }
    }
}
