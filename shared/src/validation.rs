//! Validation and normalization helpers
//!
//! Includes Indonesia-specific phone handling for the WhatsApp gateway.

use std::collections::HashSet;

/// Characters accepted between WhatsApp recipients
const RECIPIENT_DELIMITERS: &[char] = &['|', ',', ';', '\n', '\r'];

// ============================================================================
// WhatsApp Recipients
// ============================================================================

/// Split a recipient list into distinct phone numbers.
///
/// Accepts `|`, `,`, `;` and newlines as separators. Each part is trimmed and
/// stripped of inner spaces; empty parts are dropped and the first occurrence
/// of a duplicate wins.
pub fn split_whatsapp_recipients(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    input
        .split(RECIPIENT_DELIMITERS)
        .map(|part| part.trim().replace(' ', ""))
        .filter(|number| !number.is_empty())
        .filter(|number| seen.insert(number.clone()))
        .collect()
}

/// Canonical pipe separated form of a recipient list (e.g. `6281|6282`)
pub fn normalize_whatsapp_recipients(input: &str) -> String {
    split_whatsapp_recipients(input).join("|")
}

/// Rewrite a local number (`08xx`) to the Indonesian country code (`628xx`)
pub fn to_international_phone(phone: &str) -> String {
    match phone.strip_prefix('0') {
        Some(rest) => format!("62{}", rest),
        None => phone.to_string(),
    }
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.ends_with('.') => {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

/// True when the value is empty after trimming
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
