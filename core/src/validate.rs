//! Request validation rules
//!
//! Validation runs before any network activity: a failure here is
//! [`SdkError::Validation`], which the resilience layer never retries and
//! never queues.

use crate::error::SdkError;
use crate::model::{PaymentRequest, RefundRequest, StatusRequest};
use rust_decimal::Decimal;

const REFERENCE_MAX_LEN: usize = 64;
const MSISDN_MIN_DIGITS: usize = 9;
const MSISDN_MAX_DIGITS: usize = 15;

/// Validate a payment initiation request
pub fn payment_request(req: &PaymentRequest) -> Result<(), SdkError> {
    msisdn(&req.msisdn)?;
    positive_amount(req.amount)?;
    currency(&req.currency)?;
    reference(&req.reference)?;
    Ok(())
}

/// Validate a refund request
pub fn refund_request(req: &RefundRequest) -> Result<(), SdkError> {
    transaction_id(&req.transaction_id)?;
    if let Some(amount) = req.amount {
        positive_amount(amount)?;
    }
    Ok(())
}

/// Validate a status lookup request
pub fn status_request(req: &StatusRequest) -> Result<(), SdkError> {
    transaction_id(&req.transaction_id)
}

/// MSISDN rule: `+` followed by 9 to 15 digits, nothing else
pub fn msisdn(raw: &str) -> Result<(), SdkError> {
    let digits = match raw.strip_prefix('+') {
        Some(rest) => rest,
        None => {
            return Err(SdkError::Validation(
                "msisdn must be in international format starting with '+'".into(),
            ))
        }
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SdkError::Validation(
            "msisdn may only contain digits after '+'".into(),
        ));
    }
    if digits.len() < MSISDN_MIN_DIGITS || digits.len() > MSISDN_MAX_DIGITS {
        return Err(SdkError::Validation(format!(
            "msisdn must have {MSISDN_MIN_DIGITS}-{MSISDN_MAX_DIGITS} digits, got {}",
            digits.len()
        )));
    }
    Ok(())
}

fn positive_amount(amount: Decimal) -> Result<(), SdkError> {
    if amount <= Decimal::ZERO {
        return Err(SdkError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn currency(code: &str) -> Result<(), SdkError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(SdkError::Validation(format!(
            "currency must be a 3-letter uppercase code, got '{code}'"
        )));
    }
    Ok(())
}

fn reference(value: &str) -> Result<(), SdkError> {
    if value.is_empty() {
        return Err(SdkError::Validation("reference must not be empty".into()));
    }
    if value.len() > REFERENCE_MAX_LEN {
        return Err(SdkError::Validation(format!(
            "reference must be at most {REFERENCE_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn transaction_id(value: &str) -> Result<(), SdkError> {
    if value.is_empty() {
        return Err(SdkError::Validation(
            "transaction_id must not be empty".into(),
        ));
    }
    Ok(())
}
