//! Swiss phone number normalization.
//!
//! The identity provider delivers phone numbers in whatever format the
//! member typed into their profile. Local records store the national
//! convention `0XX XXX XX XX`.

/// Normalizes a Swiss phone number to the `0XX XXX XX XX` convention.
///
/// Whitespace is removed, the `+41`/`0041` country prefix is stripped and a
/// bare 9-digit subscriber number gets its leading zero back. Input that
/// does not end up as a 10-digit national number is returned as entered
/// (minus whitespace and country prefix).
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut number: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    for prefix in ["+41", "0041"] {
        if let Some(rest) = number.strip_prefix(prefix) {
            number = rest.to_string();
        }
    }

    if !number.starts_with('0') && number.len() == 9 {
        number.insert(0, '0');
    }

    if number.len() == 10 && number.starts_with('0') && number.bytes().all(|b| b.is_ascii_digit())
    {
        return format!(
            "{} {} {} {}",
            &number[..3],
            &number[3..6],
            &number[6..8],
            &number[8..10]
        );
    }

    number
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_prefix_is_stripped() {
        assert_eq!(normalize_phone("+41799871234"), "079 987 12 34");
    }

    #[test]
    fn zero_zero_prefix_is_stripped() {
        assert_eq!(normalize_phone("0041799871234"), "079 987 12 34");
    }

    #[test]
    fn national_number_is_grouped() {
        assert_eq!(normalize_phone("0799871234"), "079 987 12 34");
    }

    #[test]
    fn whitespace_is_removed_before_grouping() {
        assert_eq!(normalize_phone("079 987 12 34"), "079 987 12 34");
        assert_eq!(normalize_phone(" +41 79 987 12 34 "), "079 987 12 34");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn foreign_number_passes_through() {
        assert_eq!(normalize_phone("+33 6 12 34 56 78"), "+33612345678");
    }

    #[test]
    fn short_number_is_not_padded() {
        assert_eq!(normalize_phone("12345"), "12345");
    }
}
