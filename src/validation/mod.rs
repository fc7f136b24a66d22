use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::{NewTransaction, TransactionFilter, TransactionUpdate};

pub const TRANSACTION_ID_MAX_LEN: usize = 100;
pub const CURRENCY_LEN: usize = 3;
pub const SHORT_FIELD_MAX_LEN: usize = 50;
pub const TEXT_FIELD_MAX_LEN: usize = 255;
pub const CARD_SUFFIX_LEN: usize = 4;
pub const AMOUNT_MAX_SCALE: i64 = 2;
/// Exclusive upper bound of a NUMERIC(20, 2) amount.
pub const AMOUNT_LIMIT: i64 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| sanitize_string(&v))
        .filter(|v| !v.is_empty())
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_text(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, max_len)
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Amounts are stored as NUMERIC(20, 2) and must round-trip unchanged.
pub fn validate_amount_precision(amount: &BigDecimal) -> ValidationResult {
    if amount.with_scale(AMOUNT_MAX_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }
    if amount.abs() >= BigDecimal::from(AMOUNT_LIMIT) {
        return Err(ValidationError::new("amount", "must be less than 10^18"));
    }

    Ok(())
}

/// The business identifier is stored exactly as given, so anything the
/// caller could not have meant literally is rejected instead of rewritten.
pub fn validate_identifier(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_text(field, value, max_len)?;
    if value.trim() != value {
        return Err(ValidationError::new(
            field,
            "must not start or end with whitespace",
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::new(
            field,
            "must not contain control characters",
        ));
    }

    Ok(())
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    if currency.len() != CURRENCY_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            format!("must be {} uppercase letters", CURRENCY_LEN),
        ));
    }

    Ok(())
}

pub fn validate_card_suffix(suffix: &str) -> ValidationResult {
    if suffix.chars().count() != CARD_SUFFIX_LEN {
        return Err(ValidationError::new(
            "card_number_last4",
            format!("must be exactly {} characters", CARD_SUFFIX_LEN),
        ));
    }

    Ok(())
}

/// Strips control characters and collapses whitespace in every descriptive
/// field. The business identifier is left untouched.
pub fn sanitize_submission(submission: NewTransaction) -> NewTransaction {
    NewTransaction {
        transaction_id: submission.transaction_id,
        amount: submission.amount,
        currency: sanitize_string(&submission.currency).to_uppercase(),
        merchant_name: sanitize_optional(submission.merchant_name),
        transaction_type: sanitize_string(&submission.transaction_type),
        payment_method: sanitize_string(&submission.payment_method),
        card_number_last4: submission.card_number_last4.map(|v| sanitize_string(&v)),
        location_country: sanitize_string(&submission.location_country),
        location_city: sanitize_optional(submission.location_city),
        ip_address: sanitize_optional(submission.ip_address),
        device_type: sanitize_optional(submission.device_type),
    }
}

/// Expects an already sanitized submission.
pub fn validate_submission(submission: &NewTransaction) -> ValidationResult {
    validate_identifier("transaction_id", &submission.transaction_id, TRANSACTION_ID_MAX_LEN)?;
    validate_positive_amount(&submission.amount)?;
    validate_amount_precision(&submission.amount)?;
    validate_currency(&submission.currency)?;
    validate_text("transaction_type", &submission.transaction_type, SHORT_FIELD_MAX_LEN)?;
    validate_text("payment_method", &submission.payment_method, SHORT_FIELD_MAX_LEN)?;
    validate_text("location_country", &submission.location_country, SHORT_FIELD_MAX_LEN)?;

    if let Some(suffix) = &submission.card_number_last4 {
        validate_card_suffix(suffix)?;
    }
    if let Some(merchant) = &submission.merchant_name {
        validate_max_len("merchant_name", merchant, TEXT_FIELD_MAX_LEN)?;
    }
    if let Some(city) = &submission.location_city {
        validate_max_len("location_city", city, TEXT_FIELD_MAX_LEN)?;
    }
    if let Some(ip) = &submission.ip_address {
        validate_max_len("ip_address", ip, SHORT_FIELD_MAX_LEN)?;
    }
    if let Some(device) = &submission.device_type {
        validate_max_len("device_type", device, SHORT_FIELD_MAX_LEN)?;
    }

    Ok(())
}

pub fn validate_update(update: &TransactionUpdate) -> ValidationResult {
    if let Some(status) = &update.status {
        validate_text("status", status, SHORT_FIELD_MAX_LEN)?;
    }

    Ok(())
}

pub fn validate_filter(filter: &TransactionFilter) -> ValidationResult {
    if filter.page == 0 {
        return Err(ValidationError::new("page", "must be at least 1"));
    }
    if filter.limit == 0 || filter.limit > TransactionFilter::MAX_LIMIT {
        return Err(ValidationError::new(
            "limit",
            format!("must be between 1 and {}", TransactionFilter::MAX_LIMIT),
        ));
    }
    if let Some(min) = filter.min_risk_score {
        if !(0.0..=100.0).contains(&min) {
            return Err(ValidationError::new("min_risk_score", "must be within [0, 100]"));
        }
    }
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(ValidationError::new("start_date", "must not be after end_date"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn submission() -> NewTransaction {
        NewTransaction {
            transaction_id: "TXN1".to_string(),
            amount: BigDecimal::from_str("15000").unwrap(),
            currency: "USD".to_string(),
            merchant_name: None,
            transaction_type: "purchase".to_string(),
            payment_method: "bank_transfer".to_string(),
            card_number_last4: None,
            location_country: "RU".to_string(),
            location_city: None,
            ip_address: None,
            device_type: None,
        }
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(0)).is_err());
        assert!(validate_positive_amount(&BigDecimal::from(-1)).is_err());
    }

    #[test]
    fn validates_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("USDT").is_err());
    }

    #[test]
    fn accepts_valid_submission() {
        assert!(validate_submission(&submission()).is_ok());
    }

    #[test]
    fn card_suffix_must_be_four_characters() {
        let mut sub = submission();
        sub.card_number_last4 = Some("123".to_string());
        let err = validate_submission(&sub).unwrap_err();
        assert_eq!(err.field, "card_number_last4");

        sub.card_number_last4 = Some("1234".to_string());
        assert!(validate_submission(&sub).is_ok());
    }

    #[test]
    fn rejects_blank_identifier() {
        let mut sub = submission();
        sub.transaction_id = " \u{0007} ".to_string();
        let err = validate_submission(&sanitize_submission(sub)).unwrap_err();
        assert_eq!(err.field, "transaction_id");
    }

    #[test]
    fn identifier_is_kept_verbatim() {
        let mut sub = submission();
        sub.transaction_id = "ACME  0001".to_string();
        let clean = sanitize_submission(sub);
        assert_eq!(clean.transaction_id, "ACME  0001");
        assert!(validate_submission(&clean).is_ok());
    }

    #[test]
    fn identifier_rejects_padding_and_control_characters() {
        for bad in [" TXN1", "TXN1 ", "TXN\u{0000}1", "TXN\t1"] {
            let mut sub = submission();
            sub.transaction_id = bad.to_string();
            let err = validate_submission(&sanitize_submission(sub)).unwrap_err();
            assert_eq!(err.field, "transaction_id", "{:?}", bad);
        }
    }

    #[test]
    fn amount_must_fit_storage_precision() {
        let ok = |v: &str| validate_amount_precision(&BigDecimal::from_str(v).unwrap());
        assert!(ok("10.05").is_ok());
        assert!(ok("10.500").is_ok());
        assert!(ok("999999999999999999.99").is_ok());
        assert!(ok("0.001").is_err());
        assert!(ok("10.005").is_err());
        assert!(ok("1000000000000000000").is_err());

        let mut sub = submission();
        sub.amount = BigDecimal::from_str("0.001").unwrap();
        assert_eq!(validate_submission(&sub).unwrap_err().field, "amount");
    }

    #[test]
    fn sanitizing_drops_blank_optionals_and_uppercases_currency() {
        let mut sub = submission();
        sub.currency = " usd ".to_string();
        sub.location_city = Some("   ".to_string());
        let clean = sanitize_submission(sub);
        assert_eq!(clean.currency, "USD");
        assert_eq!(clean.location_city, None);
    }

    #[test]
    fn validates_update_status() {
        assert!(validate_update(&TransactionUpdate::default()).is_ok());
        let blank = TransactionUpdate {
            status: Some("  ".to_string()),
            is_fraud: None,
        };
        assert!(validate_update(&blank).is_err());
    }

    #[test]
    fn validates_filter_bounds() {
        assert!(validate_filter(&TransactionFilter::default()).is_ok());
        let bad = TransactionFilter {
            limit: 0,
            ..TransactionFilter::default()
        };
        assert!(validate_filter(&bad).is_err());
        let bad_score = TransactionFilter {
            min_risk_score: Some(120.0),
            ..TransactionFilter::default()
        };
        assert!(validate_filter(&bad_score).is_err());
    }
}
