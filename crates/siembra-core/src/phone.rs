//! Phone normalization: canonical digit-only form shared by adapters,
//! identity resolution, and the message log.

use crate::error::SiembraError;

/// Colombia country code, prefixed to bare 10-digit national numbers.
const DEFAULT_COUNTRY_PREFIX: &str = "57";

/// Normalize a raw phone string to the canonical digit-only form.
///
/// Strips every non-digit character (including `whatsapp:` prefixes and
/// `+`). A result of exactly 10 digits gets the `57` country prefix.
/// Anything outside 10..=15 digits is rejected. Idempotent.
pub fn normalize(raw: &str) -> Result<String, SiembraError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let canonical = if digits.len() == 10 {
        format!("{DEFAULT_COUNTRY_PREFIX}{digits}")
    } else {
        digits
    };

    if canonical.len() < 10 || canonical.len() > 15 {
        return Err(SiembraError::PayloadMalformed(format!(
            "phone '{raw}' normalizes to {} digits, expected 10-15",
            canonical.len()
        )));
    }

    Ok(canonical)
}

/// Last four digits of a canonical phone, used for default display names
/// and telemetry (never the full number).
pub fn last_four(phone: &str) -> &str {
    if phone.len() >= 4 {
        &phone[phone.len() - 4..]
    } else {
        phone
    }
}
