//! Syntax checks for merchant ids and pincodes.
//!
//! These gate every mutation. They are never applied to data that is already stored
//! (loaded files and generated relations are trusted as-is).

/// Prefix every merchant id carries.
pub const MERCHANT_PREFIX: &str = "Merchant_";

/// Number of digits in a pincode.
pub const PINCODE_LEN: usize = 6;

/// Input rejected by the validator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Merchant id is not `Merchant_<digits>`.
    #[error("malformed merchant id {0:?} (expected `Merchant_<digits>`)")]
    MalformedMerchant(String),
    /// Pincode is not exactly six decimal digits.
    #[error("malformed pincode {0:?} (expected 6 decimal digits)")]
    MalformedPincode(String),
}

/// True iff `s` is `Merchant_` followed by one or more ASCII decimal digits.
///
/// Leading zeros are accepted (`Merchant_007`).
pub fn validate_merchant(s: &str) -> bool {
    match s.strip_prefix(MERCHANT_PREFIX) {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// True iff `s` is exactly six ASCII decimal digits.
pub fn validate_pincode(s: &str) -> bool {
    s.len() == PINCODE_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Check a (merchant, pincode) pair, reporting the first problem found.
pub fn validate_pair(merchant: &str, pincode: &str) -> Result<(), ValidationError> {
    if !validate_merchant(merchant) {
        return Err(ValidationError::MalformedMerchant(merchant.to_string()));
    }
    if !validate_pincode(pincode) {
        return Err(ValidationError::MalformedPincode(pincode.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merchant_ids() {
        assert!(validate_merchant("Merchant_1"));
        assert!(validate_merchant("Merchant_10000000"));
        assert!(validate_merchant("Merchant_007"));

        assert!(!validate_merchant("Merchant_"));
        assert!(!validate_merchant("Merchant_abc"));
        assert!(!validate_merchant("Merchant_-1"));
        assert!(!validate_merchant("Merchant_+1"));
        assert!(!validate_merchant("Merchant_1 "));
        assert!(!validate_merchant("merchant_1"));
        assert!(!validate_merchant("Shop_1"));
        assert!(!validate_merchant(""));
        // Non-ASCII digits are not decimal digits here.
        assert!(!validate_merchant("Merchant_٣"));
    }

    #[test]
    fn pincodes() {
        assert!(validate_pincode("560001"));
        assert!(validate_pincode("000000"));

        assert!(!validate_pincode("1234"));
        assert!(!validate_pincode("1234567"));
        assert!(!validate_pincode("56000a"));
        assert!(!validate_pincode(" 56000"));
        assert!(!validate_pincode(""));
        assert!(!validate_pincode("५६०००१"));
    }

    #[test]
    fn pair_reports_first_problem() {
        assert_eq!(
            validate_pair("Merchant_12", "1234"),
            Err(ValidationError::MalformedPincode("1234".into()))
        );
        assert_eq!(
            validate_pair("Merchant_abc", "123456"),
            Err(ValidationError::MalformedMerchant("Merchant_abc".into()))
        );
        assert_eq!(validate_pair("Merchant_1", "560001"), Ok(()));
    }
}
