//! Masking helpers for log-safe rendering of sensitive fields
//!
//! Subscriber numbers and caller references must never appear verbatim in
//! logs. Every log line the SDK writes routes these fields through this
//! module first.

/// Mask an MSISDN, keeping the prefix (country code) and the last two digits
///
/// `+254712345678` becomes `+2547******78`. Inputs too short to mask are
/// replaced entirely.
pub fn msisdn(raw: &str) -> String {
    const KEEP_PREFIX: usize = 5; // '+' and up to four leading digits
    const KEEP_SUFFIX: usize = 2;

    if raw.len() <= KEEP_PREFIX + KEEP_SUFFIX {
        return "*".repeat(raw.len());
    }
    let masked = raw.len() - KEEP_PREFIX - KEEP_SUFFIX;
    format!(
        "{}{}{}",
        &raw[..KEEP_PREFIX],
        "*".repeat(masked),
        &raw[raw.len() - KEEP_SUFFIX..]
    )
}

/// Mask all but the last `visible` characters of a value
///
/// Useful for caller references and transaction ids in debug output.
pub fn mask_tail(raw: &str, visible: usize) -> String {
    if raw.len() <= visible {
        return raw.to_string();
    }
    format!("{}{}", "*".repeat(raw.len() - visible), &raw[raw.len() - visible..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msisdn_keeps_prefix_and_suffix() {
        assert_eq!(msisdn("+254712345678"), "+2547******78");
    }

    #[test]
    fn msisdn_short_input_fully_masked() {
        assert_eq!(msisdn("+25471"), "******");
        assert_eq!(msisdn(""), "");
    }

    #[test]
    fn mask_tail_keeps_requested_suffix() {
        assert_eq!(mask_tail("ORDER-9001", 4), "******9001");
    }

    #[test]
    fn mask_tail_short_input_unchanged() {
        assert_eq!(mask_tail("TX1", 4), "TX1");
    }
}
